//! Error Handling
//!
//! Error type definitions used in ghlabels

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error types for ghlabels
#[derive(Error, Debug)]
pub enum Error {
    #[error("GitHub API error: {0}")]
    GitHubApi(#[from] octocrab::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration validation error: {0}")]
    ConfigValidation(String),

    #[error("Label validation error: {0}")]
    LabelValidation(String),

    #[error("Duplicate label in configuration: {0}")]
    DuplicateLabel(String),

    #[error("Invalid API host: {0}")]
    InvalidHost(#[from] url::ParseError),

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Unable to fetch labels for {repository}: {source}")]
    FetchLabels {
        repository: String,
        #[source]
        source: Box<Error>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid repository name: {0} (expected a bare repository name)")]
    InvalidRepositoryName(String),

    #[error("Invalid label color: {0} (expected 6-digit hex, optionally prefixed with #)")]
    InvalidLabelColor(String),

    #[error("{0}")]
    Generic(String),
}

impl Error {
    /// Create a new configuration validation error
    pub fn config_validation<S: Into<String>>(message: S) -> Self {
        Error::ConfigValidation(message.into())
    }

    /// Create a new label validation error
    pub fn label_validation<S: Into<String>>(message: S) -> Self {
        Error::LabelValidation(message.into())
    }

    /// Create an error from a free-form message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Error::Generic(message.into())
    }
}
