//! fxmigrate - upgrade a legacy Teams Toolkit project in place.

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use fxmigrate_core::{
    ConfirmationResponse, MigrationOutcome, ProjectMigrator, Services, UpgradeRequest,
    UserConfirmation,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "fxmigrate")]
#[command(about = "Upgrade a legacy Teams Toolkit project to the V3 layout")]
struct Args {
    /// Project root (defaults to the current directory)
    #[arg(short, long)]
    project: Option<PathBuf>,

    /// Do not ask for confirmation
    #[arg(short, long)]
    yes: bool,

    /// Only report whether the project can be upgraded
    #[arg(long)]
    check: bool,

    /// Keep the legacy .fx folder after a successful upgrade
    #[arg(long)]
    keep_legacy: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Asks on the terminal.
struct StdinConfirm;

#[async_trait]
impl UserConfirmation for StdinConfirm {
    async fn confirm(&self, request: &UpgradeRequest) -> ConfirmationResponse {
        let prompt = format!(
            "Upgrade {} from {} to {}? A backup is kept in .backup [y/N] ",
            request.project_path.display(),
            request.current_version,
            request.target_version
        );
        let mut stderr = tokio::io::stderr();
        if stderr.write_all(prompt.as_bytes()).await.is_err() || stderr.flush().await.is_err() {
            return ConfirmationResponse::decline();
        }

        let mut line = String::new();
        match BufReader::new(tokio::io::stdin()).read_line(&mut line).await {
            Ok(_) if matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes") => {
                ConfirmationResponse::accept()
            }
            _ => ConfirmationResponse::decline(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let project = match args.project {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    let migrator = ProjectMigrator::builder(&project)
        .confirmation(Arc::new(StdinConfirm))
        .services(Services::default())
        .skip_confirmation(args.yes)
        .keep_legacy_folder(args.keep_legacy)
        .build();

    if args.check {
        let check = migrator.check().await;
        println!(
            "{}: {:?} ({})",
            project.display(),
            check.state,
            check.version.as_deref().unwrap_or("no version")
        );
        std::process::exit(if check.is_eligible() { 0 } else { 1 });
    }

    match migrator.migrate().await {
        Ok(MigrationOutcome::NotApplicable(check)) => {
            info!("Nothing to do: project is {:?}", check.state);
        }
        Ok(MigrationOutcome::Cancelled { .. }) => {
            info!("Upgrade cancelled");
        }
        Ok(MigrationOutcome::Migrated(report)) => {
            info!(
                "Upgrade complete, {} paths written, backup in {}",
                report.created_paths.len(),
                report.backup_location.display()
            );
            for path in &report.created_paths {
                println!("{}", path.display());
            }
        }
        Err(e) => {
            error!("Upgrade failed: {}", e);
            std::process::exit(e.to_exit_code());
        }
    }
    Ok(())
}
