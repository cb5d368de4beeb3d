//! Incremental sync driver.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::{DriverOutcome, SyncEngine};
use crate::Result;
use crate::account::AccountId;
use crate::remote::{
    HistoryEvent, HistoryEventType, HistoryId, HistoryRecord, HistoryRequest, RemoteMailbox,
};
use crate::store::MailStore;

impl<R, S> SyncEngine<R, S>
where
    R: RemoteMailbox,
    S: MailStore,
{
    /// Replay history since `start`, importing new messages and applying
    /// read-state changes.
    ///
    /// An expired `start` surfaces as [`Error::HistoryExpired`](crate::Error::HistoryExpired)
    /// before anything is written. A failed read-state write is recorded
    /// in the outcome and holds the cursor so the history is replayed.
    pub(super) async fn incremental_sync(
        &self,
        account: AccountId,
        start: HistoryId,
    ) -> Result<DriverOutcome> {
        let (cursor, records) = self.collect_history(account, start).await?;

        let added = added_message_ids(&records);
        let existing = self.store.existing_message_ids(account, &added).await?;
        let new_ids: Vec<String> = added
            .iter()
            .filter(|id| !existing.contains(*id))
            .cloned()
            .collect();
        debug!(
            "Incremental sync for account {account}: {} records, {} added, {} new",
            records.len(),
            added.len(),
            new_ids.len()
        );

        let mut ingest = self.ingest_messages(account, &new_ids).await;
        let cursor = ingest.latest_history_id.map_or(cursor, |latest| latest.max(cursor));
        if !ingest.errors.is_empty() {
            warn!(
                "{} ingest errors for account {account}; cursor moves to {cursor}, messages left out are only imported by a full sync",
                ingest.errors.len()
            );
        }

        // Label changes may target messages that were already stored
        let (label_updates, advance_cursor) =
            match self.apply_label_changes(account, &records).await {
                Ok(updated) => (updated, true),
                Err(err) => {
                    warn!("Failed to apply label changes for account {account}: {err}");
                    ingest
                        .errors
                        .push(format!("Failed to apply label changes: {err}"));
                    (0, false)
                }
            };

        Ok(DriverOutcome {
            cursor,
            synced: ingest.synced,
            skipped: existing.len() + ingest.skipped,
            label_updates,
            errors: ingest.errors,
            advance_cursor,
        })
    }

    /// Page through history until exhausted.
    ///
    /// Returns the highest history id reported and every record in order.
    async fn collect_history(
        &self,
        account: AccountId,
        start: HistoryId,
    ) -> Result<(HistoryId, Vec<HistoryRecord>)> {
        let mut request = HistoryRequest {
            start,
            max_results: self.config.history_page_size,
            page_token: None,
            event_types: HistoryEventType::SYNC.to_vec(),
        };
        let mut highest = start;
        let mut records = Vec::new();
        let mut pages = 0_usize;

        loop {
            let page = self.remote.list_history(account, &request).await?;
            pages += 1;

            highest = page
                .records
                .iter()
                .map(|r| r.id)
                .fold(highest.max(page.history_id), HistoryId::max);
            records.extend(page.records);

            match page.next_page_token {
                Some(token) if !token.is_empty() => request.page_token = Some(token),
                _ => break,
            }
        }

        debug!(
            "Read {pages} history pages for account {account}, {} records, cursor {highest}",
            records.len()
        );
        Ok((highest, records))
    }
}

/// Ids of added messages, deduplicated in first-seen order.
fn added_message_ids(records: &[HistoryRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for event in records.iter().flat_map(|r| &r.events) {
        match event {
            HistoryEvent::MessageAdded(message) => {
                if seen.insert(message.id.as_str()) {
                    ids.push(message.id.clone());
                }
            }
            HistoryEvent::LabelsAdded { .. } | HistoryEvent::LabelsRemoved { .. } => {}
        }
    }

    ids
}
