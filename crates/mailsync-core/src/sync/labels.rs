//! Read-state changes derived from label history.

use std::collections::BTreeMap;

use tracing::debug;

use super::SyncEngine;
use crate::Result;
use crate::account::AccountId;
use crate::remote::{HistoryEvent, HistoryRecord, RemoteMailbox, UNREAD_LABEL};
use crate::store::MailStore;

/// Messages to mark read and unread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadStateChanges {
    /// Messages whose unread label was removed last.
    pub mark_read: Vec<String>,
    /// Messages whose unread label was added last.
    pub mark_unread: Vec<String>,
}

impl ReadStateChanges {
    /// Returns true if there is nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mark_read.is_empty() && self.mark_unread.is_empty()
    }
}

/// Computes read-state changes from history records.
///
/// When a message has several unread-label events, the last one in
/// history order wins. Events for other labels are ignored.
#[must_use]
pub fn read_state_changes(records: &[HistoryRecord]) -> ReadStateChanges {
    let mut final_state: BTreeMap<&str, bool> = BTreeMap::new();

    for event in records.iter().flat_map(|r| &r.events) {
        let (message, label_ids, is_read) = match event {
            HistoryEvent::MessageAdded(_) => continue,
            HistoryEvent::LabelsAdded { message, label_ids } => (message, label_ids, false),
            HistoryEvent::LabelsRemoved { message, label_ids } => (message, label_ids, true),
        };

        if label_ids.iter().any(|l| l == UNREAD_LABEL) {
            final_state.insert(message.id.as_str(), is_read);
        }
    }

    let mut changes = ReadStateChanges::default();
    for (id, is_read) in final_state {
        if is_read {
            changes.mark_read.push(id.to_string());
        } else {
            changes.mark_unread.push(id.to_string());
        }
    }
    changes
}

impl<R, S> SyncEngine<R, S>
where
    R: RemoteMailbox,
    S: MailStore,
{
    /// Apply read-state changes with one batched write per direction.
    ///
    /// Returns the number of stored messages matched.
    pub(super) async fn apply_label_changes(
        &self,
        account: AccountId,
        records: &[HistoryRecord],
    ) -> Result<u64> {
        let changes = read_state_changes(records);
        if changes.is_empty() {
            return Ok(0);
        }

        let mut updated = 0;
        if !changes.mark_read.is_empty() {
            updated += self
                .store
                .set_read_state(account, &changes.mark_read, true)
                .await?;
        }
        if !changes.mark_unread.is_empty() {
            updated += self
                .store
                .set_read_state(account, &changes.mark_unread, false)
                .await?;
        }

        debug!(
            "Applied read state for account {account}: {} read, {} unread, {updated} rows",
            changes.mark_read.len(),
            changes.mark_unread.len()
        );
        Ok(updated)
    }
}
