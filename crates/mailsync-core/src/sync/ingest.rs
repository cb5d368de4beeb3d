//! Shared message ingestion used by both sync drivers.

use futures::future::join_all;
use tracing::{debug, warn};

use super::SyncEngine;
use crate::Result;
use crate::account::AccountId;
use crate::normalize::{header_value, normalize};
use crate::participants::resolve_participants;
use crate::remote::{HistoryId, RemoteMailbox, RemoteMessage};
use crate::store::{EMAIL_CHANNEL, MailStore, NewMessage, NewThread};

/// Counters collected while ingesting a list of new message ids.
#[derive(Debug, Default)]
pub(super) struct IngestOutcome {
    pub synced: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    /// Highest history id among successfully fetched messages.
    pub latest_history_id: Option<HistoryId>,
}

impl<R, S> SyncEngine<R, S>
where
    R: RemoteMailbox,
    S: MailStore,
{
    /// Fetch, group by thread and store the given messages.
    ///
    /// Fetch failures and per-thread storage failures are recorded and
    /// skipped; they never abort the remaining work.
    pub(super) async fn ingest_messages(&self, account: AccountId, ids: &[String]) -> IngestOutcome {
        let mut outcome = IngestOutcome::default();
        let batch_count = ids.len().div_ceil(self.config.batch_size);

        for (index, batch) in ids.chunks(self.config.batch_size).enumerate() {
            debug!(
                "Fetching batch {}/{batch_count} ({} messages) for account {account}",
                index + 1,
                batch.len()
            );

            let results = join_all(batch.iter().map(|id| self.remote.get_message(account, id))).await;

            let mut groups: Vec<(String, Vec<RemoteMessage>)> = Vec::new();
            for (id, result) in batch.iter().zip(results) {
                match result {
                    Ok(message) => {
                        outcome.latest_history_id = outcome.latest_history_id.max(message.history_id);
                        let key = message.thread_key().to_string();
                        match groups.iter_mut().find(|(k, _)| *k == key) {
                            Some((_, messages)) => messages.push(message),
                            None => groups.push((key, vec![message])),
                        }
                    }
                    Err(err) => {
                        warn!("Failed to fetch message {id} for account {account}: {err}");
                        outcome.errors.push(format!("Failed to fetch message {id}: {err}"));
                    }
                }
            }

            for (thread_key, messages) in groups {
                match self.store_thread(account, &thread_key, &messages).await {
                    Ok((synced, skipped)) => {
                        outcome.synced += synced;
                        outcome.skipped += skipped;
                    }
                    Err(err) => {
                        warn!("Failed to store thread {thread_key} for account {account}: {err}");
                        outcome
                            .errors
                            .push(format!("Failed to store thread {thread_key}: {err}"));
                    }
                }
            }
        }

        outcome
    }

    /// Store one thread group. Returns `(inserted, skipped)`.
    async fn store_thread(
        &self,
        account: AccountId,
        thread_key: &str,
        messages: &[RemoteMessage],
    ) -> Result<(usize, usize)> {
        let subject = messages
            .first()
            .and_then(|m| m.payload.as_ref())
            .and_then(|p| header_value(p, "Subject"))
            .unwrap_or_default()
            .trim()
            .to_string();

        let thread = self
            .store
            .find_or_create_thread(&NewThread {
                owner: account,
                remote_thread_id: thread_key.to_string(),
                channel: EMAIL_CHANNEL.to_string(),
                subject,
                participants: resolve_participants(messages),
            })
            .await?;

        let mut synced = 0;
        let mut skipped = 0;
        for message in messages {
            // A concurrent run or an earlier batch may have stored it already
            if self.store.message_exists(account, &message.id).await? {
                skipped += 1;
                continue;
            }

            let new_message =
                NewMessage::from_normalized(account, thread.id, &message.id, normalize(message));
            if self.store.insert_message(&new_message).await? {
                synced += 1;
            } else {
                skipped += 1;
            }
        }

        Ok((synced, skipped))
    }
}
