//! Configuration Management
//!
//! Desired label state and application settings management

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::label_set::{Label, LabelSet};

/// Public GitHub API endpoint
pub const DEFAULT_HOST: &str = "https://api.github.com/";

/// Convention-based configuration file names searched in order
pub const CONVENTION_CONFIG_FILES: &[&str] = &[
    ".ghlabels.json",
    ".ghlabels.yaml",
    ".ghlabels.yml",
    ".github/labels.json",
    ".github/labels.yaml",
    ".github/labels.yml",
];

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

/// Label Configuration File
///
/// The desired state declared by the user: which account owns the target
/// repositories, which API endpoint serves them, and which labels they carry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Repository owner (user or organization)
    #[serde(default)]
    pub owner: String,

    /// Base URL of the GitHub API
    #[serde(default = "default_host")]
    pub host: String,

    /// Desired labels
    #[serde(default)]
    pub labels: LabelSet,
}

impl Config {
    /// Validate the configuration and bring label colors into canonical form
    ///
    /// # Errors
    /// - If the owner is empty
    /// - If the host is not an absolute http(s) URL
    /// - If a label is invalid or defined twice
    pub fn validate(&mut self) -> Result<()> {
        if self.owner.trim().is_empty() {
            return Err(Error::config_validation("Owner is required"));
        }

        self.host_url()?;
        validate_labels(&mut self.labels)
    }

    /// Replace the owner and host with command line values when given
    pub fn with_overrides(mut self, owner: Option<String>, host: Option<String>) -> Self {
        if let Some(owner) = owner {
            self.owner = owner;
        }
        if let Some(host) = host {
            self.host = host;
        }
        self
    }

    /// Parse the configured host
    ///
    /// # Errors
    /// Returns an error if the host is malformed or not http(s)
    pub fn host_url(&self) -> Result<Url> {
        parse_host(&self.host)
    }
}

/// Sync Options
///
/// Per-run switches that control how the reconciler behaves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Plan operations without calling the API
    pub dry_run: bool,

    /// Delete remote labels that are not in the desired set
    pub remove_absent: bool,

    /// What to do when the existing labels cannot be fetched
    pub on_fetch_error: FetchFailurePolicy,
}

/// Behavior when listing a repository's existing labels fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchFailurePolicy {
    /// Skip the repository and report the failure
    #[default]
    Abort,

    /// Log a warning and reconcile against an empty existing set
    ProceedEmpty,
}

/// Parse an API host URL
///
/// # Errors
/// Returns an error if the URL is malformed or its scheme is not http(s)
pub fn parse_host(host: &str) -> Result<Url> {
    let url = Url::parse(host.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::config_validation(format!(
            "Host must use http or https, got '{other}': {host}"
        ))),
    }
}

/// Validate a single label
///
/// # Errors
/// - If the name is empty
/// - If the color is not 6 hex digits (a leading # is allowed)
pub fn validate_label(label: &Label) -> Result<()> {
    if label.name.trim().is_empty() {
        return Err(Error::label_validation("Label name cannot be empty"));
    }

    if !is_valid_hex_color(&normalize_color(&label.color)) {
        return Err(Error::InvalidLabelColor(label.color.clone()));
    }

    Ok(())
}

/// Validate every label, reject duplicate names and normalize colors
///
/// # Errors
/// Returns the first validation failure found
pub fn validate_labels(labels: &mut LabelSet) -> Result<()> {
    let mut seen = HashSet::new();
    for label in labels.iter_mut() {
        validate_label(label)?;
        if !seen.insert(label.name.clone()) {
            return Err(Error::DuplicateLabel(label.name.clone()));
        }
        label.color = normalize_color(&label.color);
    }
    Ok(())
}

/// Normalize color (remove # and convert to lowercase)
pub fn normalize_color(color: &str) -> String {
    color.trim().trim_start_matches('#').to_lowercase()
}

/// Generate a starter configuration
///
/// Returns GitHub's standard label set for the given owner
pub fn default_config(owner: &str) -> Config {
    Config {
        owner: owner.to_string(),
        host: default_host(),
        labels: default_labels(),
    }
}

/// Generate default label configuration
///
/// Returns GitHub's standard label set
pub fn default_labels() -> LabelSet {
    LabelSet::from(vec![
        Label::new("bug", "#d73a4a").with_description("Something isn't working"),
        Label::new("documentation", "#0075ca")
            .with_description("Improvements or additions to documentation"),
        Label::new("duplicate", "#cfd3d7")
            .with_description("This issue or pull request already exists"),
        Label::new("enhancement", "#a2eeef").with_description("New feature or request"),
        Label::new("good first issue", "#7057ff").with_description("Good for newcomers"),
        Label::new("help wanted", "#008672").with_description("Extra attention is needed"),
        Label::new("invalid", "#e4e669").with_description("This doesn't seem right"),
        Label::new("question", "#d876e3").with_description("Further information is requested"),
        Label::new("wontfix", "#ffffff").with_description("This will not be worked on"),
    ])
}

/// Read configuration from a file without validating it
///
/// The format is detected by extension. Callers that adjust the result (for
/// example with [`Config::with_overrides`]) must call [`Config::validate`]
/// before using it.
///
/// # Errors
/// If the file is missing, unreadable, unparsable, or has an unsupported extension
pub fn read_config_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Configuration file not found: {}", path.display()),
        )
        .into());
    }

    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(serde_json::from_str(&content)?),
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
        _ => Err(Error::config_validation(
            "Configuration file must be .json, .yaml, or .yml",
        )),
    }
}

/// Load configuration from a file, detecting format by extension
///
/// # Arguments
/// - `path`: Path to the configuration file (.json, .yaml, or .yml)
///
/// # Errors
/// If file reading, parsing, or validation fails, or if the extension is unsupported
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let mut config = read_config_from_file(path)?;
    config.validate()?;
    Ok(config)
}

/// Search for a convention-based configuration file in the current directory
///
/// Searches for files in [`CONVENTION_CONFIG_FILES`] order and returns
/// the first one found.
pub fn find_convention_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_convention_config_in(&cwd)
}

/// Search for a convention-based configuration file in the given directory
pub fn find_convention_config_in(dir: &Path) -> Option<PathBuf> {
    CONVENTION_CONFIG_FILES
        .iter()
        .map(|filename| dir.join(filename))
        .find(|path| path.exists())
}

/// Validate hex color code
///
/// # Arguments
/// - `color`: Color code (6-digit hex without #)
fn is_valid_hex_color(color: &str) -> bool {
    color.len() == 6 && color.chars().all(|c| c.is_ascii_hexdigit())
}
