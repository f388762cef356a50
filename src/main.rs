//! ghlabels CLI
//!
//! Command line tool for keeping GitHub repository labels in sync with a
//! configuration file

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ghlabels::{
    config::{default_config, find_convention_config, read_config_from_file},
    Config, Error, FetchFailurePolicy, GitHubClient, LabelService, LabelSyncer, Result,
    SyncOperation, SyncOptions, SyncResult,
};

/// ghlabels CLI
///
/// Declarative GitHub issue label synchronization
#[derive(Parser)]
#[command(
    name = "ghlabels",
    version,
    about = "Declarative GitHub issue label synchronization",
    long_about = "Creates, updates and optionally deletes the issue labels of GitHub \
    repositories so that they match a JSON or YAML configuration file."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// GitHub access token
    #[arg(short = 't', long, global = true)]
    access_token: Option<String>,

    /// Configuration file path (JSON/YAML)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Repository owner (overrides the configuration file)
    #[arg(long, global = true)]
    owner: Option<String>,

    /// GitHub API base URL (overrides the configuration file)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize labels
    Sync(SyncArgs),

    /// Preview synchronization content without changing anything
    Preview(SyncArgs),

    /// Output a starter configuration
    Init {
        /// Output format
        #[arg(long, default_value = "yaml", value_parser = ["json", "yaml"])]
        format: String,

        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Display current labels
    List {
        /// Repository name
        repository: String,

        /// Output format
        #[arg(long, default_value = "table", value_parser = ["table", "json", "yaml"])]
        format: String,
    },
}

#[derive(Args)]
struct SyncArgs {
    /// Repository names owned by the configured owner
    #[arg(required = true)]
    repositories: Vec<String>,

    /// Delete labels that are not in the configuration
    #[arg(long)]
    remove_absent: bool,

    /// Dry run mode (don't make actual changes)
    #[arg(long)]
    dry_run: bool,

    /// Treat a repository whose labels cannot be listed as having none
    #[arg(long)]
    continue_on_fetch_error: bool,
}

impl SyncArgs {
    fn options(&self, force_dry_run: bool) -> SyncOptions {
        SyncOptions {
            dry_run: self.dry_run || force_dry_run,
            remove_absent: self.remove_absent,
            on_fetch_error: if self.continue_on_fetch_error {
                FetchFailurePolicy::ProceedEmpty
            } else {
                FetchFailurePolicy::Abort
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Sync(args) => run_sync(&cli, args, args.options(false)).await,
        Commands::Preview(args) => run_sync(&cli, args, args.options(true)).await,
        Commands::Init { format, output } => run_init(cli.owner.as_deref(), format, output.as_ref()),
        Commands::List { repository, format } => run_list(&cli, repository, format).await,
    }
}

/// Initialize the tracing subscriber
///
/// `GHLABELS_LOG` takes precedence; otherwise warnings are shown, or debug
/// output with `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "ghlabels=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("GHLABELS_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Execute synchronization for every requested repository
async fn run_sync(cli: &Cli, args: &SyncArgs, options: SyncOptions) -> Result<()> {
    let config = load_config(cli)?;
    for repository in &args.repositories {
        validate_repository_name(repository)?;
    }
    let token = get_access_token(cli.access_token.clone())?;

    if cli.verbose {
        println!(
            "{} Synchronizing {} label(s) for owner: {}",
            "•".blue(),
            config.labels.len(),
            config.owner.cyan()
        );

        if options.dry_run {
            println!(
                "{} Running in dry-run mode (no changes will be made)",
                "!".yellow()
            );
        }
    }

    let client = GitHubClient::new(&token, &config.host)?;
    let syncer = LabelSyncer::new(client, config.owner, config.labels, options);

    let mut failed = false;
    for repository in &args.repositories {
        match syncer.sync_repository(repository).await {
            Ok(result) => {
                display_sync_result(&result, cli.verbose);
                if result.has_errors() {
                    eprintln!("\n{} Errors occurred:", "✗".red());
                    for error in &result.errors {
                        eprintln!("  {}", error.red());
                    }
                    failed = true;
                }
            }
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e.to_string().red());
                failed = true;
            }
        }
    }

    if failed {
        std::process::exit(1);
    }

    Ok(())
}

/// Execute init command
fn run_init(owner: Option<&str>, format: &str, output: Option<&PathBuf>) -> Result<()> {
    let config = default_config(owner.unwrap_or("your-org"));

    let content = match format {
        "json" => serde_json::to_string_pretty(&config)?,
        "yaml" => serde_yaml::to_string(&config)?,
        _ => return Err(Error::config_validation("Unsupported format")),
    };

    if let Some(output_path) = output {
        std::fs::write(output_path, content)?;
        println!(
            "{} Starter configuration written to: {}",
            "✓".green(),
            output_path.display().to_string().cyan()
        );
    } else {
        println!("{}", content);
    }

    Ok(())
}

/// Execute list command
async fn run_list(cli: &Cli, repository: &str, format: &str) -> Result<()> {
    validate_repository_name(repository)?;
    let config = load_config(cli)?;
    let token = get_access_token(cli.access_token.clone())?;

    let client = GitHubClient::new(&token, &config.host)?;
    let labels = client.list_labels(&config.owner, repository).await?;

    match format {
        "table" => {
            println!(
                "{:<30} {:<8} {:<50}",
                "Name".cyan(),
                "Color".cyan(),
                "Description".cyan()
            );
            println!("{}", "─".repeat(90));

            for label in &labels {
                let description = label.description.as_deref().unwrap_or("(none)");
                println!(
                    "{:<30} {:<8} {:<50}",
                    label.name,
                    format!("#{}", label.color),
                    description
                );
            }
        }
        "json" => println!("{}", serde_json::to_string_pretty(&labels)?),
        "yaml" => println!("{}", serde_yaml::to_string(&labels)?),
        _ => return Err(Error::config_validation("Unsupported format")),
    }

    Ok(())
}

/// Display synchronization results
fn display_sync_result(result: &SyncResult, verbose: bool) {
    let repository = result.repository.cyan();
    if result.dry_run && result.has_changes() {
        println!("\n{} Sync preview for {} (dry-run mode):", "•".blue(), repository);
    } else if result.has_changes() {
        println!("\n{} Sync completed for {}:", "✓".green(), repository);
    } else {
        println!("\n{} No changes required for {}", "✓".green(), repository);
    }

    println!("  Created:   {}", result.created.to_string().green());
    println!("  Updated:   {}", result.updated.to_string().yellow());
    println!("  Deleted:   {}", result.deleted.to_string().red());
    println!("  Unchanged: {}", result.unchanged.to_string().white());

    if verbose {
        println!("\n{} Detailed operations:", "•".blue());
        for (i, operation) in result.operations.iter().enumerate() {
            let prefix = format!("  {}.", i + 1);
            match operation {
                SyncOperation::Create { label } => {
                    println!(
                        "{} {} Create label: {} (#{})",
                        prefix,
                        "+".green(),
                        label.name.cyan(),
                        label.color
                    );
                }
                SyncOperation::Update { name, changes, .. } => {
                    println!("{} {} Update label: {}", prefix, "~".yellow(), name.cyan());
                    for change in changes {
                        println!("      {}", change.dimmed());
                    }
                }
                SyncOperation::Delete { name } => {
                    println!("{} {} Delete label: {}", prefix, "-".red(), name.red());
                }
                SyncOperation::NoChange { name } => {
                    println!("{} {} No change: {}", prefix, "=".white(), name.white());
                }
            }
        }
    }
}

/// Load the configuration file and apply command line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => find_convention_config().ok_or_else(|| {
            Error::config_validation(
                "No configuration file found. Use -c or --config, or create .ghlabels.yaml",
            )
        })?,
    };

    let mut config =
        read_config_from_file(&path)?.with_overrides(cli.owner.clone(), cli.host.clone());
    config.validate()?;
    Ok(config)
}

/// Repository arguments are bare names under the configured owner
fn validate_repository_name(repository: &str) -> Result<()> {
    if repository.trim().is_empty() || repository.contains('/') {
        return Err(Error::InvalidRepositoryName(repository.to_string()));
    }
    Ok(())
}

/// Get access token
fn get_access_token(arg_token: Option<String>) -> Result<String> {
    arg_token
        .or_else(|| std::env::var("GITHUB_TOKEN").ok())
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| {
            Error::config_validation(
                "GitHub access token is required. Set via --access-token, -t flag, or GITHUB_TOKEN env var",
            )
        })
}
