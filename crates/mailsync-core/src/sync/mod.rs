//! Mailbox synchronization.
//!
//! [`SyncEngine`] picks a full or incremental run per account, recovers
//! from expired history cursors by falling back to a full run, and
//! persists the resulting cursor. All work is idempotent: a run that stops
//! halfway is simply repeated by the next one.

mod config;
mod engine;
mod full;
mod incremental;
mod ingest;
mod labels;
mod report;

pub use config::SyncConfig;
pub use engine::{HISTORY_EXPIRED_NOTE, SyncEngine};
pub use labels::{ReadStateChanges, read_state_changes};
pub use report::{SyncReport, SyncStatus, SyncType};

use crate::remote::HistoryId;

/// Result of one full or incremental driver run.
#[derive(Debug)]
struct DriverOutcome {
    cursor: HistoryId,
    synced: usize,
    skipped: usize,
    label_updates: u64,
    errors: Vec<String>,
    /// False when a write failed after ingestion; the cursor must not move.
    advance_cursor: bool,
}

impl DriverOutcome {
    const fn empty(cursor: HistoryId) -> Self {
        Self {
            cursor,
            synced: 0,
            skipped: 0,
            label_updates: 0,
            errors: Vec::new(),
            advance_cursor: true,
        }
    }
}
