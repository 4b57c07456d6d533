//! Headless sync and export commands.
//!
//! # Environment Variables
//!
//! Same as the sync server; see `ticket_ledger_sync::config`.

use std::path::PathBuf;

use thiserror::Error;
use ticket_ledger_sync::config::{ConfigError, SyncConfig};
use ticket_ledger_sync::service::{ClientInitError, SyncError, SyncService};

/// Errors that can occur while running a sync from the CLI.
#[derive(Debug, Error)]
pub enum SyncCommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientInitError),

    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),
}

fn service() -> Result<SyncService, SyncCommandError> {
    let config = SyncConfig::from_env()?;
    for warning in &config.warnings {
        tracing::warn!("Configuration warning: {warning}");
    }
    Ok(SyncService::from_config(&config)?)
}

/// Run the resumable sync until no orders remain.
pub async fn run() -> Result<(), SyncCommandError> {
    let service = service()?;

    tracing::info!(
        checkpoint = %service.checkpoint_store().path().display(),
        "Starting sync"
    );
    let report = service.run().await?;

    tracing::info!(
        items_processed = report.items_processed,
        pages = report.pages,
        start_offset = report.start_offset,
        end_offset = report.end_offset,
        appended = report.summary.appended,
        updated = report.summary.updated,
        skipped = report.summary.skipped,
        already_applied = report.summary.already_applied,
        duplicates = report.summary.duplicates,
        "Sync complete. Total items processed: {}",
        report.items_processed
    );
    Ok(())
}

/// Export up to `limit` fulfilled orders.
pub async fn export(limit: usize, output: Option<PathBuf>) -> Result<(), SyncCommandError> {
    let service = service()?;
    let path = output.unwrap_or_else(|| service.settings().export_path.clone());

    let count = service.export_to(limit, &path).await?;

    tracing::info!("Saved {} fulfilled orders to {}", count, path.display());
    Ok(())
}
