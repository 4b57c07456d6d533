//! Sync orchestration.
//!
//! A run resumes from the checkpoint and walks the fulfilled orders one page
//! at a time:
//!
//! ```text
//! Idle -> Fetching -> Enriching -> Reconciling -> CheckpointSaved -> Delaying
//!           ^                                                          |
//!           +----------------------------------------------------------+
//! ```
//!
//! until a page comes back empty (`Done`). Any error ends the run in
//! `Failed`; the checkpoint still points at the last completed page.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, instrument, warn};

use crate::checkpoint::{Checkpoint, CheckpointError, CheckpointStore};
use crate::config::{SyncConfig, SyncSettings};
use crate::enrich::{EnrichSettings, enrich_records};
use crate::export::{ExportError, export_fulfilled_orders};
use crate::orders::{fetch_orders_page, flatten_orders};
use crate::reconcile::{ReconcileError, ReconcileSummary, reconcile};
use crate::sheets::{SheetStore, SheetsClient, SheetsError};
use crate::webflow::{CommerceApi, WebflowClient, WebflowError};

/// Error creating the upstream API clients.
#[derive(Debug, Error)]
pub enum ClientInitError {
    #[error("failed to create Webflow client: {0}")]
    Webflow(#[from] WebflowError),
    #[error("failed to create Sheets client: {0}")]
    Sheets(#[from] SheetsError),
}

/// Errors that end a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("commerce API error: {0}")]
    Commerce(#[from] WebflowError),

    #[error("spreadsheet error: {0}")]
    Sheets(#[from] SheetsError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("export error: {0}")]
    Export(#[from] ExportError),

    #[error("a sync run is already in progress")]
    AlreadyRunning,

    #[error("sync task ended unexpectedly: {0}")]
    Interrupted(String),
}

impl From<ReconcileError> for SyncError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Sheets(e) => Self::Sheets(e),
            ReconcileError::Checkpoint(e) => Self::Checkpoint(e),
        }
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Fetching { offset: u32 },
    Enriching { offset: u32, items: usize },
    Reconciling { offset: u32, items: usize },
    CheckpointSaved { offset: u32 },
    Delaying { next_offset: u32 },
    Done { items_processed: usize },
    Failed { error: String },
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Line items read from the fetched pages, failed enrichments included.
    pub items_processed: usize,
    pub pages: u32,
    pub start_offset: u32,
    pub end_offset: u32,
    pub summary: ReconcileSummary,
}

/// Snapshot for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub running: bool,
    pub phase: SyncPhase,
    pub checkpoint: Checkpoint,
}

/// Runs syncs against a commerce API and a sheet.
///
/// Cheap to clone. At most one run is active at a time across all clones.
#[derive(Clone)]
pub struct SyncService {
    inner: Arc<SyncServiceInner>,
}

struct SyncServiceInner {
    commerce: Arc<dyn CommerceApi>,
    sheet: Arc<dyn SheetStore>,
    checkpoint: CheckpointStore,
    settings: SyncSettings,
    enrich: EnrichSettings,
    run_lock: Mutex<()>,
    running: AtomicBool,
    phase: RwLock<SyncPhase>,
}

impl SyncService {
    #[must_use]
    pub fn new(
        commerce: Arc<dyn CommerceApi>,
        sheet: Arc<dyn SheetStore>,
        settings: SyncSettings,
        enrich: EnrichSettings,
    ) -> Self {
        let checkpoint = CheckpointStore::new(settings.checkpoint_path.clone());

        Self {
            inner: Arc::new(SyncServiceInner {
                commerce,
                sheet,
                checkpoint,
                settings,
                enrich,
                run_lock: Mutex::new(()),
                running: AtomicBool::new(false),
                phase: RwLock::new(SyncPhase::Idle),
            }),
        }
    }

    /// Service backed by the Webflow and Google Sheets HTTP clients.
    ///
    /// # Errors
    ///
    /// Returns an error if either client cannot be created.
    pub fn from_config(config: &SyncConfig) -> Result<Self, ClientInitError> {
        let webflow = WebflowClient::new(&config.webflow)?;
        let sheets = SheetsClient::new(&config.sheets)?;

        let enrich = EnrichSettings {
            collections: config.webflow.collections.clone(),
            show_date_zone: config.sync.show_date_zone,
        };

        Ok(Self::new(
            Arc::new(webflow),
            Arc::new(sheets),
            config.sync.clone(),
            enrich,
        ))
    }

    #[must_use]
    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    #[must_use]
    pub fn checkpoint_store(&self) -> &CheckpointStore {
        &self.inner.checkpoint
    }

    /// Whether a run is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Current phase, run flag and saved checkpoint.
    pub async fn status(&self) -> SyncStatus {
        SyncStatus {
            running: self.is_running(),
            phase: self.inner.phase.read().await.clone(),
            checkpoint: self.inner.checkpoint.load().await,
        }
    }

    async fn set_phase(&self, phase: SyncPhase) {
        *self.inner.phase.write().await = phase;
    }

    /// Sync every remaining page, resuming from the checkpoint.
    ///
    /// The run executes on its own task: dropping the returned future (a
    /// disconnected HTTP client, say) leaves it running to completion.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::AlreadyRunning` if another run is active in this
    /// or any other process, or the first fetch, spreadsheet or checkpoint
    /// error.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let service = self.clone();
        tokio::spawn(async move { service.run_exclusive().await })
            .await
            .map_err(|e| SyncError::Interrupted(e.to_string()))?
    }

    async fn run_exclusive(&self) -> Result<SyncReport, SyncError> {
        let Ok(_guard) = self.inner.run_lock.try_lock() else {
            return Err(SyncError::AlreadyRunning);
        };
        let _checkpoint_lock = match self.inner.checkpoint.lock() {
            Ok(lock) => lock,
            Err(CheckpointError::Locked { path }) => {
                warn!(path = %path.display(), "Checkpoint locked by another process");
                return Err(SyncError::AlreadyRunning);
            }
            Err(e) => return Err(e.into()),
        };
        let _running = RunningFlag::raise(&self.inner.running);

        let result = self.run_pages().await;

        match &result {
            Ok(report) => {
                info!(
                    items_processed = report.items_processed,
                    pages = report.pages,
                    end_offset = report.end_offset,
                    "Sync complete"
                );
                self.set_phase(SyncPhase::Done {
                    items_processed: report.items_processed,
                })
                .await;
            }
            Err(e) => {
                error!(error = %e, "Sync failed");
                self.set_phase(SyncPhase::Failed {
                    error: e.to_string(),
                })
                .await;
            }
        }

        result
    }

    #[instrument(skip(self))]
    async fn run_pages(&self) -> Result<SyncReport, SyncError> {
        let inner = &self.inner;
        let settings = &inner.settings;

        let mut progress = inner.checkpoint.load().await;
        let mut offset = progress.last_processed;
        let mut report = SyncReport {
            start_offset: offset,
            ..SyncReport::default()
        };

        info!(offset, "Resuming sync");

        loop {
            self.set_phase(SyncPhase::Fetching { offset }).await;
            let orders = fetch_orders_page(
                inner.commerce.as_ref(),
                &settings.retry,
                offset,
                settings.page_size,
            )
            .await?;

            if orders.is_empty() {
                info!(offset, "No more orders");
                break;
            }

            let records = flatten_orders(&orders);
            self.set_phase(SyncPhase::Enriching {
                offset,
                items: records.len(),
            })
            .await;
            let enriched =
                enrich_records(inner.commerce.as_ref(), &settings.retry, &inner.enrich, &records)
                    .await;

            self.set_phase(SyncPhase::Reconciling {
                offset,
                items: enriched.len(),
            })
            .await;
            report.summary += reconcile(
                inner.sheet.as_ref(),
                &settings.retry,
                &inner.checkpoint,
                &mut progress,
                &enriched,
            )
            .await?;

            report.items_processed += records.len();
            report.pages += 1;
            offset = offset.saturating_add(settings.page_size);

            progress = inner.checkpoint.save(offset).await?;
            self.set_phase(SyncPhase::CheckpointSaved { offset }).await;
            info!(
                offset,
                items = records.len(),
                delay_secs = settings.page_delay.as_secs(),
                "Page complete, waiting before next page"
            );

            self.set_phase(SyncPhase::Delaying {
                next_offset: offset,
            })
            .await;
            tokio::time::sleep(settings.page_delay).await;
        }

        report.end_offset = offset;
        Ok(report)
    }

    /// Export up to `limit` fulfilled orders to the configured export file.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Export` if fetching or writing fails.
    pub async fn export(&self, limit: usize) -> Result<usize, SyncError> {
        self.export_to(limit, &self.inner.settings.export_path).await
    }

    /// Export up to `limit` fulfilled orders to `path`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Export` if fetching or writing fails.
    pub async fn export_to(&self, limit: usize, path: &Path) -> Result<usize, SyncError> {
        Ok(export_fulfilled_orders(
            self.inner.commerce.as_ref(),
            &self.inner.settings.retry,
            limit,
            path,
        )
        .await?)
    }
}

/// Clears the running flag when a run ends or its future is dropped.
struct RunningFlag<'a>(&'a AtomicBool);

impl<'a> RunningFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_serializes_with_state_tag() {
        let json = serde_json::to_value(SyncPhase::Fetching { offset: 4 }).expect("serializable");
        assert_eq!(json, serde_json::json!({"state": "fetching", "offset": 4}));

        let json = serde_json::to_value(SyncPhase::Idle).expect("serializable");
        assert_eq!(json, serde_json::json!({"state": "idle"}));
    }

    #[test]
    fn test_reconcile_error_maps_to_sync_error() {
        let err: SyncError = ReconcileError::Sheets(SheetsError::NotFound("sheet".to_string())).into();
        assert!(matches!(err, SyncError::Sheets(SheetsError::NotFound(_))));
    }

    #[test]
    fn test_already_running_display() {
        assert_eq!(
            SyncError::AlreadyRunning.to_string(),
            "a sync run is already in progress"
        );
    }
}
