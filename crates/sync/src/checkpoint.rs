//! Resume checkpoint.
//!
//! A small JSON file holding the offset of the next page to sync:
//!
//! ```json
//! { "lastProcessed": 12, "applied": ["ord-1#0", "ord-1#1"] }
//! ```
//!
//! `applied` lists the line items of the page at `lastProcessed` that have
//! already been written to the sheet, so a run interrupted mid-page does not
//! count them twice when it resumes. It is cleared whenever a page completes
//! and may be absent.
//!
//! Runs and resets hold an exclusive advisory lock on `<checkpoint>.lock`,
//! so the server and the CLI never work on the same checkpoint at once.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ticket_ledger_core::RecordKey;
use tracing::{debug, instrument, warn};

/// Errors writing the checkpoint.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to write checkpoint {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("checkpoint {path} is locked by another run")]
    Locked { path: PathBuf },
}

/// Persisted sync progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Offset of the next page to fetch.
    pub last_processed: u32,
    /// Items of the in-flight page already written to the sheet.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub applied: BTreeSet<String>,
}

impl Checkpoint {
    /// Checkpoint at `offset` with nothing applied yet.
    #[must_use]
    pub const fn at(offset: u32) -> Self {
        Self {
            last_processed: offset,
            applied: BTreeSet::new(),
        }
    }

    /// Whether `key` has already been written for the in-flight page.
    #[must_use]
    pub fn is_applied(&self, key: &RecordKey) -> bool {
        self.applied.contains(&key.to_string())
    }
}

/// Exclusive hold on a checkpoint, released when dropped.
#[derive(Debug)]
pub struct CheckpointLock {
    _file: File,
    path: PathBuf,
}

impl CheckpointLock {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// File-backed checkpoint store.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the exclusive lock on `<checkpoint>.lock` without waiting.
    ///
    /// The lock is held across processes until the returned guard drops.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointError::Locked` if another holder has it, or
    /// `CheckpointError::Io` if the lock file cannot be opened.
    pub fn lock(&self) -> Result<CheckpointLock, CheckpointError> {
        let path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| CheckpointError::Io {
                path: path.clone(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %path.display(), "Checkpoint lock acquired");
                Ok(CheckpointLock { _file: file, path })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(CheckpointError::Locked { path })
            }
            Err(source) => Err(CheckpointError::Io { path, source }),
        }
    }

    /// Read the saved checkpoint.
    ///
    /// A missing, unreadable or malformed file means "no progress" and
    /// yields offset 0.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> Checkpoint {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No checkpoint file, starting from offset 0");
                return Checkpoint::default();
            }
            Err(e) => {
                warn!(error = %e, "Checkpoint unreadable, starting from offset 0");
                return Checkpoint::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                warn!(error = %e, "Checkpoint malformed, starting from offset 0");
                Checkpoint::default()
            }
        }
    }

    /// Record that the page before `offset` is complete.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointError` if the file cannot be written.
    pub async fn save(&self, offset: u32) -> Result<Checkpoint, CheckpointError> {
        let checkpoint = Checkpoint::at(offset);
        self.write(&checkpoint).await?;
        Ok(checkpoint)
    }

    /// Add `key` to the in-flight ledger and persist it.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointError` if the file cannot be written.
    pub async fn mark_applied(
        &self,
        checkpoint: &mut Checkpoint,
        key: &RecordKey,
    ) -> Result<(), CheckpointError> {
        if checkpoint.applied.insert(key.to_string()) {
            self.write(checkpoint).await?;
        }
        Ok(())
    }

    /// Overwrite the checkpoint with `offset`, discarding any ledger.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointError::Locked` while a run holds the checkpoint, or
    /// another `CheckpointError` if the file cannot be written.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn reset(&self, offset: u32) -> Result<Checkpoint, CheckpointError> {
        let _lock = self.lock()?;
        warn!(offset, "Resetting checkpoint");
        self.save(offset).await
    }

    /// Write via a sibling temp file renamed into place.
    async fn write(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let json = serde_json::to_vec_pretty(checkpoint)?;
        let tmp = self.temp_path();

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| self.io_error(source))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| self.io_error(source))?;

        debug!(
            path = %self.path.display(),
            last_processed = checkpoint.last_processed,
            applied = checkpoint.applied.len(),
            "Checkpoint saved"
        );
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "checkpoint".into(), |n| n.to_string_lossy().into_owned());
        self.path.with_file_name(format!(".{name}.tmp"))
    }

    fn lock_path(&self) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(".lock");
        PathBuf::from(path)
    }

    fn io_error(&self, source: io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
