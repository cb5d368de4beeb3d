//! Sync run results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::ConnectionId;
use crate::remote::HistoryId;

/// Which driver a run used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    /// Bounded bulk import.
    Full,
    /// History replay since the stored cursor.
    Incremental,
}

/// Outcome of [`SyncEngine::sync_for_account`](super::SyncEngine::sync_for_account).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Messages inserted.
    pub synced_count: usize,
    /// Messages seen but already stored.
    pub skipped_count: usize,
    /// Stored messages whose read flag was written.
    pub label_update_count: u64,
    /// Non-fatal and fatal problems, in the order they happened.
    pub errors: Vec<String>,
    /// Driver that produced the result.
    pub sync_type: SyncType,
    /// Whether the run reached the point of persisting its cursor.
    pub completed: bool,
}

impl SyncReport {
    /// An empty report for the given sync type.
    #[must_use]
    pub const fn new(sync_type: SyncType) -> Self {
        Self {
            synced_count: 0,
            skipped_count: 0,
            label_update_count: 0,
            errors: Vec::new(),
            sync_type,
            completed: false,
        }
    }

    /// A report for a run that failed outright.
    #[must_use]
    pub fn failed(sync_type: SyncType, error: impl Into<String>) -> Self {
        let mut report = Self::new(sync_type);
        report.errors.push(error.into());
        report
    }

    /// Returns true if the run stopped before persisting a cursor.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !self.completed
    }
}

/// Connection and cursor overview for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Whether the account has an active connection.
    pub connected: bool,
    /// Active connection, if any.
    pub connection_id: Option<ConnectionId>,
    /// Mailbox address of the active connection.
    pub email: Option<String>,
    /// When the last run finished.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Messages imported by the last run.
    pub last_sync_count: u64,
    /// Whether a full sync has finished at least once.
    pub full_sync_completed: bool,
    /// Stored history cursor.
    pub history_cursor: Option<HistoryId>,
}

impl SyncStatus {
    /// Status of an account without a connection.
    #[must_use]
    pub const fn disconnected() -> Self {
        Self {
            connected: false,
            connection_id: None,
            email: None,
            last_synced_at: None,
            last_sync_count: 0,
            full_sync_completed: false,
            history_cursor: None,
        }
    }
}
