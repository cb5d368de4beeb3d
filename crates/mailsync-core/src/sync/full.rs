//! Full sync driver.

use std::collections::HashSet;

use tracing::{debug, info};

use super::{DriverOutcome, SyncEngine};
use crate::Result;
use crate::account::AccountId;
use crate::remote::{ListQuery, RemoteMailbox};
use crate::store::MailStore;

impl<R, S> SyncEngine<R, S>
where
    R: RemoteMailbox,
    S: MailStore,
{
    /// Import up to `full_sync_window` of the most recent messages.
    ///
    /// Older messages are left out on purpose; later incremental runs only
    /// pick up new activity.
    pub(super) async fn full_sync(&self, account: AccountId) -> Result<DriverOutcome> {
        let query = ListQuery {
            max_results: self.config.full_sync_window,
            filter: self.config.filter(),
        };
        let mut refs = self.remote.list_messages(account, &query).await?;
        refs.truncate(self.config.full_sync_window);

        if refs.is_empty() {
            let profile = self.remote.profile(account).await?;
            info!(
                "Mailbox for account {account} is empty, starting at history {}",
                profile.history_id
            );
            return Ok(DriverOutcome::empty(profile.history_id));
        }

        let mut seen = HashSet::new();
        let ids: Vec<String> = refs
            .into_iter()
            .map(|r| r.id)
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let existing = self.store.existing_message_ids(account, &ids).await?;
        let new_ids: Vec<String> = ids
            .iter()
            .filter(|id| !existing.contains(*id))
            .cloned()
            .collect();
        debug!(
            "Full sync for account {account}: {} listed, {} new",
            ids.len(),
            new_ids.len()
        );

        let ingest = self.ingest_messages(account, &new_ids).await;

        let cursor = match ingest.latest_history_id {
            Some(cursor) => cursor,
            None => self.remote.profile(account).await?.history_id,
        };

        Ok(DriverOutcome {
            cursor,
            synced: ingest.synced,
            skipped: existing.len() + ingest.skipped,
            label_updates: 0,
            errors: ingest.errors,
            advance_cursor: true,
        })
    }
}
