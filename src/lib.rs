//! # ghlabels
//!
//! Declarative GitHub issue label synchronization
//!
//! ## Features
//! - Create, update and (optionally) delete labels to match a configuration file
//! - GitHub Enterprise support through a configurable API host
//! - Dry-run mode

pub mod config;
pub mod error;
pub mod github;
pub mod label_set;
pub mod sync;

pub use config::{Config, FetchFailurePolicy, SyncOptions};
pub use error::{Error, Result};
pub use github::{GitHubClient, LabelService};
pub use label_set::{Label, LabelSet};
pub use sync::{LabelSyncer, SyncOperation, SyncResult};

/// Synchronize one repository's labels with a configuration
///
/// Builds a [`GitHubClient`] for the configured host and reconciles `repo`
/// owned by `config.owner`.
///
/// # Examples
///
/// ```rust,no_run
/// use ghlabels::{config::default_config, SyncOptions};
///
/// #[tokio::main]
/// async fn main() -> ghlabels::Result<()> {
///     let mut config = default_config("my-org");
///     config.validate()?;
///
///     let options = SyncOptions {
///         remove_absent: true,
///         ..SyncOptions::default()
///     };
///
///     let result = ghlabels::sync_repository_labels("your_github_token", &config, "my-repo", options).await?;
///     println!("Sync completed: {:?}", result);
///     Ok(())
/// }
/// ```
pub async fn sync_repository_labels(
    access_token: &str,
    config: &Config,
    repo: &str,
    options: SyncOptions,
) -> Result<SyncResult> {
    let client = GitHubClient::new(access_token, &config.host)?;
    let syncer = LabelSyncer::new(client, config.owner.clone(), config.labels.clone(), options);
    syncer.sync_repository(repo).await
}
