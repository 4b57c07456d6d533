//! Checkpoint management commands.
//!
//! # Environment Variables
//!
//! - `SYNC_CHECKPOINT_PATH` - Checkpoint file (default: progress.json)

use std::path::{Path, PathBuf};

use thiserror::Error;
use ticket_ledger_sync::checkpoint::{CheckpointError, CheckpointStore};

const DEFAULT_CHECKPOINT_PATH: &str = "progress.json";

/// Errors that can occur during checkpoint operations.
#[derive(Debug, Error)]
pub enum CheckpointCommandError {
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Failed to render checkpoint: {0}")]
    Render(#[from] serde_json::Error),
}

/// Explicit path, else `SYNC_CHECKPOINT_PATH`, else `progress.json`.
pub fn resolve_path(explicit: Option<PathBuf>) -> PathBuf {
    dotenvy::dotenv().ok();

    explicit
        .or_else(|| std::env::var("SYNC_CHECKPOINT_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CHECKPOINT_PATH))
}

/// Print the saved checkpoint as JSON.
pub async fn show(path: &Path) -> Result<(), CheckpointCommandError> {
    let checkpoint = CheckpointStore::new(path).load().await;
    let json = serde_json::to_string_pretty(&checkpoint)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{json}");
    }
    Ok(())
}

/// Overwrite the checkpoint with `offset`.
pub async fn reset(path: &Path, offset: u32) -> Result<(), CheckpointCommandError> {
    let store = CheckpointStore::new(path);
    let previous = store.load().await;
    store.reset(offset).await?;

    tracing::info!(
        "Checkpoint {} reset from offset {} to {}",
        path.display(),
        previous.last_processed,
        offset
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let path = resolve_path(Some(PathBuf::from("/tmp/custom.json")));
        assert_eq!(path, PathBuf::from("/tmp/custom.json"));
    }

    #[tokio::test]
    async fn test_reset_then_show_roundtrip() {
        let path = std::env::temp_dir().join(format!(
            "tl-cli-checkpoint-{}.json",
            std::process::id()
        ));

        reset(&path, 12).await.unwrap();
        let checkpoint = CheckpointStore::new(&path).load().await;
        assert_eq!(checkpoint.last_processed, 12);
        show(&path).await.unwrap();

        let _ = tokio::fs::remove_file(&path).await;
    }
}
