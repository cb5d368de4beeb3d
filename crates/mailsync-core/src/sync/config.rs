//! Sync engine configuration.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Tunables for a sync run.
///
/// Passed to [`SyncEngine::new`](super::SyncEngine::new); nothing here is global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum number of recent messages considered by a full sync.
    pub full_sync_window: usize,
    /// Number of message bodies fetched concurrently.
    pub batch_size: usize,
    /// Provider search filter applied to full sync listings.
    pub filter_query: String,
    /// Page size for history requests.
    pub history_page_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            full_sync_window: 500,
            batch_size: 10,
            filter_query: "-in:spam -in:trash".to_string(),
            history_page_size: 500,
        }
    }
}

impl SyncConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the full sync window.
    #[must_use]
    pub const fn with_full_sync_window(mut self, window: usize) -> Self {
        self.full_sync_window = window;
        self
    }

    /// Set the fetch batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the full sync filter query.
    #[must_use]
    pub fn with_filter_query(mut self, filter: impl Into<String>) -> Self {
        self.filter_query = filter.into();
        self
    }

    /// Set the history page size.
    #[must_use]
    pub const fn with_history_page_size(mut self, page_size: usize) -> Self {
        self.history_page_size = page_size;
        self
    }

    /// Check that all sizes are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.full_sync_window == 0 {
            return Err(Error::Config("full_sync_window must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if self.history_page_size == 0 {
            return Err(Error::Config("history_page_size must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Filter query, or `None` when blank.
    pub(crate) fn filter(&self) -> Option<String> {
        let filter = self.filter_query.trim();
        (!filter.is_empty()).then(|| filter.to_string())
    }
}
