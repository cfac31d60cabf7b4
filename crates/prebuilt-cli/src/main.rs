//! prebuilt - verified installer for pre-built release artifacts

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::style::Stylize;
use tracing_subscriber::EnvFilter;

use prebuilt_cli::cmd;
use prebuilt_cli::cmd::install::InstallOptions;
use prebuilt_cli::{Cli, Commands, Settings};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let dry_run = cli.dry_run;
    let quiet = cli.quiet;
    let home = cli.home;

    match cli.command {
        Commands::Install {
            release,
            catalog,
            prefix,
            platform,
            timeout,
        } => {
            let settings = Settings::resolve(home, catalog.catalog, prefix.prefix)?;
            let opts = InstallOptions {
                version: release,
                platform,
                timeout: Duration::from_secs(timeout),
            };
            cmd::install::install(&settings, &opts, dry_run, quiet).await
        }
        Commands::Info { catalog } => {
            let settings = Settings::resolve(home, catalog.catalog, None)?;
            cmd::info::info(&settings).await
        }
        Commands::Remove { catalog, prefix } => {
            let settings = Settings::resolve(home, catalog.catalog, prefix.prefix)?;
            cmd::remove::remove(&settings, dry_run, quiet).await
        }
        Commands::Hash { files } => cmd::hash::hash(&files).await,
    }
}
