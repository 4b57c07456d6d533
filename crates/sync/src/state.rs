//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::SyncConfig;
use crate::service::{ClientInitError, SyncService};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    sync: SyncService,
}

impl AppState {
    #[must_use]
    pub fn new(sync: SyncService) -> Self {
        Self {
            inner: Arc::new(AppStateInner { sync }),
        }
    }

    /// Build state with HTTP clients for both upstream APIs.
    ///
    /// # Errors
    ///
    /// Returns an error if either client cannot be created.
    pub fn from_config(config: &SyncConfig) -> Result<Self, ClientInitError> {
        Ok(Self::new(SyncService::from_config(config)?))
    }

    /// Get a reference to the sync service.
    #[must_use]
    pub fn sync(&self) -> &SyncService {
        &self.inner.sync
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("sync", &self.inner.sync)
            .finish()
    }
}
