//! GitHub API Client
//!
//! Module for managing interactions with the GitHub API

use async_trait::async_trait;
use octocrab::Octocrab;
use serde::Serialize;
use tracing::debug;

use crate::config::parse_host;
use crate::error::{Error, Result};
use crate::label_set::{Label, LabelSet};

/// Page size used when listing labels
const PER_PAGE: u8 = 100;

/// Encode a string for use in URL path segments (RFC 3986 with UTF-8 support)
///
/// Only unreserved characters (A-Z, a-z, 0-9, -, ., _, ~) are left unencoded.
fn encode_path_segment(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            // RFC 3986 unreserved characters
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '.' | '_' | '~' => c.to_string(),
            // Everything else gets percent-encoded as UTF-8 bytes
            _ => c
                .to_string()
                .bytes()
                .map(|b| format!("%{:02X}", b))
                .collect::<String>(),
        })
        .collect()
}

/// Label operations against a remote repository
///
/// The reconciler only talks to the remote through this trait, which keeps
/// the transport swappable and lets tests record calls instead of making them.
#[async_trait]
pub trait LabelService: Send + Sync {
    /// List every label currently defined on `owner/repo`
    async fn list_labels(&self, owner: &str, repo: &str) -> Result<LabelSet>;

    /// Create `label` on `owner/repo`
    async fn create_label(&self, owner: &str, repo: &str, label: &Label) -> Result<Label>;

    /// Replace the label called `name` with `label`
    async fn update_label(&self, owner: &str, repo: &str, name: &str, label: &Label)
        -> Result<Label>;

    /// Delete the label called `name`
    async fn delete_label(&self, owner: &str, repo: &str, name: &str) -> Result<()>;
}

impl From<octocrab::models::Label> for Label {
    fn from(label: octocrab::models::Label) -> Self {
        Label {
            name: label.name,
            color: label.color,
            description: label.description,
        }
    }
}

/// Request body for `PATCH /repos/{owner}/{repo}/labels/{name}`
#[derive(Debug, Serialize)]
struct UpdateLabelBody<'a> {
    new_name: &'a str,
    color: &'a str,
    // Omitted when unset so the remote description is kept
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

/// GitHub API Client
///
/// Octocrab-backed [`LabelService`] bound to one API host
pub struct GitHubClient {
    octocrab: Octocrab,
}

impl GitHubClient {
    /// Create a new GitHub client
    ///
    /// # Arguments
    /// - `access_token`: GitHub access token
    /// - `host`: Base URL of the API (public GitHub or an Enterprise endpoint)
    ///
    /// # Errors
    /// Returns an error if the host is malformed or client initialization fails
    pub fn new(access_token: &str, host: &str) -> Result<Self> {
        let host_url = parse_host(host)?;

        let octocrab = Octocrab::builder()
            .personal_token(access_token.to_string())
            .base_uri(host_url.as_str())
            .map_err(|e| Error::generic(format!("Invalid GitHub API host {host}: {e}")))?
            .build()
            .map_err(|e| Error::generic(format!("Failed to create GitHub client: {e}")))?;

        Ok(Self { octocrab })
    }
}

#[async_trait]
impl LabelService for GitHubClient {
    async fn list_labels(&self, owner: &str, repo: &str) -> Result<LabelSet> {
        let mut labels = Vec::new();
        let mut page = 1u32;

        loop {
            let response = self
                .octocrab
                .issues(owner, repo)
                .list_labels_for_repo()
                .page(page)
                .per_page(PER_PAGE)
                .send()
                .await
                .map_err(|e| {
                    if e.to_string().contains("Not Found") {
                        Error::RepositoryNotFound(format!("{owner}/{repo}"))
                    } else {
                        Error::GitHubApi(e)
                    }
                })?;

            let count = response.items.len();
            debug!(owner, repo, page, count, "Fetched label page");
            labels.extend(response.items.into_iter().map(Label::from));

            if count < usize::from(PER_PAGE) {
                break;
            }
            page += 1;
        }

        Ok(LabelSet::from(labels))
    }

    async fn create_label(&self, owner: &str, repo: &str, label: &Label) -> Result<Label> {
        let created = self
            .octocrab
            .issues(owner, repo)
            .create_label(
                &label.name,
                &label.color,
                label.description.as_deref().unwrap_or(""),
            )
            .await?;

        Ok(created.into())
    }

    async fn update_label(
        &self,
        owner: &str,
        repo: &str,
        name: &str,
        label: &Label,
    ) -> Result<Label> {
        let route = format!(
            "/repos/{owner}/{repo}/labels/{}",
            encode_path_segment(name)
        );
        let body = UpdateLabelBody {
            new_name: &label.name,
            color: &label.color,
            description: label.description.as_deref(),
        };

        let updated: octocrab::models::Label = self.octocrab.patch(route, Some(&body)).await?;
        Ok(updated.into())
    }

    async fn delete_label(&self, owner: &str, repo: &str, name: &str) -> Result<()> {
        // URL encode the label name to handle spaces, special characters, and UTF-8
        self.octocrab
            .issues(owner, repo)
            .delete_label(encode_path_segment(name))
            .await?;

        Ok(())
    }
}
