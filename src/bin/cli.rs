//! Listing Watch CLI
//!
//! Batch entry point for a scheduled job: one invocation checks the search
//! page once and exits. Exit code 0 means the run completed, 1 means it
//! failed and the next scheduled run may succeed, 2 means the configuration
//! must be fixed first.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use listing_watch::{
    config::Environment,
    error::{AppError, Result},
    models::Config,
    pipeline::Coordinator,
    services::notify::EmailChannel,
    storage::{ArchiveStorage, LocalStorage, SeenStore},
};

/// Listing Watch - alerts on brand-new marketplace listings
#[derive(Parser, Debug)]
#[command(name = "listing-watch", version, about = "Alerts on brand-new marketplace listings")]
struct Cli {
    /// Directory holding config.toml, the seen snapshot and the archive
    #[arg(short, long, default_value = ".")]
    storage_dir: PathBuf,

    /// Path to config file (default: {storage_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the search page once and alert on new listings (default)
    Run {
        /// Print the run report (or failure summary) as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration and environment without fetching
    Validate,

    /// Show snapshot and archive info
    Info,
}

const EXIT_RETRY: u8 = 1;
const EXIT_CONFIG: u8 = 2;

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn exit_code_for(error: &AppError) -> ExitCode {
    if error.is_retryable() {
        ExitCode::from(EXIT_RETRY)
    } else {
        ExitCode::from(EXIT_CONFIG)
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.storage_dir.join("config.toml"));
    let config = match Config::load_or_default(&config_path) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Config load failed from {}: {}", config_path.display(), e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let result = match cli.command.unwrap_or(Command::Run { json: false }) {
        Command::Run { json } => return run(&config, &cli.storage_dir, json).await,
        Command::Validate => validate(&config),
        Command::Info => info(&config, &cli.storage_dir).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            exit_code_for(&e)
        }
    }
}

async fn run(config: &Config, storage_dir: &Path, json: bool) -> ExitCode {
    log::info!("Listing watch starting...");

    let coordinator = match Environment::from_env()
        .and_then(|env| Coordinator::from_settings(config, &env, storage_dir))
    {
        Ok(coordinator) => coordinator,
        Err(e) => {
            log::error!("{}", e);
            return exit_code_for(&e);
        }
    };

    match coordinator.run().await {
        Ok(report) => {
            log::info!(
                "Done. {} new listing(s) of {} fetched; notifications: {} sent, {} failed, {} skipped",
                report.new_listings.len(),
                report.fetched,
                report.notifications.delivered,
                report.notifications.failed,
                report.notifications.skipped
            );
            log::info!("State changed: {}", report.changed());

            if json {
                match serde_json::to_string_pretty(&report) {
                    Ok(text) => println!("{text}"),
                    Err(e) => log::warn!("Could not serialize run report: {}", e),
                }
            }
            ExitCode::SUCCESS
        }
        Err(failure) => {
            log::error!("{}", failure);
            if json {
                match serde_json::to_string_pretty(&failure.summary()) {
                    Ok(text) => println!("{text}"),
                    Err(e) => log::warn!("Could not serialize failure summary: {}", e),
                }
            }
            exit_code_for(&failure.error)
        }
    }
}

fn validate(config: &Config) -> Result<()> {
    log::info!("Validating configuration...");
    config.validate()?;
    log::info!("✓ Config OK");

    let env = Environment::from_env()?;
    log::info!("✓ Search URL: {}", env.search_url);
    if let Some(creds) = &env.email {
        if let Err(e) = EmailChannel::new(creds, &config.notify) {
            log::warn!("Email channel will fail on every send: {}", e);
        }
    }
    log::info!(
        "Email channel: {}",
        if env.email.is_some() { "enabled" } else { "disabled" }
    );
    log::info!(
        "SMS channel: {}",
        if env.sms.is_some() { "enabled" } else { "disabled" }
    );

    log::info!("All validations passed!");
    Ok(())
}

async fn info(config: &Config, storage_dir: &Path) -> Result<()> {
    let storage = LocalStorage::with_config(storage_dir, &config.storage);
    log::info!("Storage directory: {}", storage_dir.display());

    let seen = storage.load_seen().await?;
    log::info!(
        "Seen snapshot: {} id(s) in {}",
        seen.len(),
        storage.seen_path().display()
    );

    let partitions = storage.partitions().await?;
    if partitions.is_empty() {
        log::info!("Archive: empty");
        return Ok(());
    }

    let mut total = 0;
    for partition in &partitions {
        total += storage.load_partition(partition).await?.len();
    }
    log::info!(
        "Archive: {} record(s) across {} day(s), {} to {}",
        total,
        partitions.len(),
        partitions[0],
        partitions[partitions.len() - 1]
    );
    Ok(())
}
