//! Sync orchestration.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::report::{SyncReport, SyncStatus, SyncType};
use super::{DriverOutcome, SyncConfig};
use crate::account::AccountId;
use crate::remote::{HistoryId, RemoteMailbox};
use crate::store::{MailStore, SyncState};
use crate::{Error, Result};

/// Recorded in the report when an expired cursor forced a full sync.
pub const HISTORY_EXPIRED_NOTE: &str = "History cursor expired, fell back to full sync";

/// Synchronizes remote mailboxes into a local store.
pub struct SyncEngine<R, S> {
    pub(super) remote: Arc<R>,
    pub(super) store: Arc<S>,
    pub(super) config: SyncConfig,
}

impl<R, S> SyncEngine<R, S>
where
    R: RemoteMailbox,
    S: MailStore,
{
    /// Create an engine over the given remote mailbox and store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn new(remote: Arc<R>, store: Arc<S>, config: SyncConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            remote,
            store,
            config,
        })
    }

    /// The engine's configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one sync for an account.
    ///
    /// Never fails: every problem ends up in [`SyncReport::errors`].
    pub async fn sync_for_account(&self, account: AccountId) -> SyncReport {
        let state = match self.load_state(account).await {
            Ok(state) => state,
            Err(err) => {
                warn!("Sync for account {account} aborted: {err}");
                return SyncReport::failed(SyncType::Full, err.to_string());
            }
        };

        let report = match state.resume_cursor() {
            Some(cursor) => self.run_incremental(account, state, cursor).await,
            None => self.run_full(account, state, Vec::new()).await,
        };

        if report.completed {
            info!(
                "Sync for account {account} finished ({:?}): {} synced, {} skipped, {} label updates, {} errors",
                report.sync_type,
                report.synced_count,
                report.skipped_count,
                report.label_update_count,
                report.errors.len()
            );
        } else {
            warn!(
                "Sync for account {account} failed ({:?}): {:?}",
                report.sync_type, report.errors
            );
        }
        report
    }

    /// Report connection and cursor state for an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn sync_status(&self, account: AccountId) -> Result<SyncStatus> {
        let Some(connection) = self.store.active_connection(account).await? else {
            return Ok(SyncStatus::disconnected());
        };

        let state = self
            .store
            .load_sync_state(connection.id)
            .await?
            .unwrap_or_else(|| SyncState::new(connection.id));

        Ok(SyncStatus {
            connected: true,
            connection_id: Some(connection.id),
            email: Some(connection.email),
            last_synced_at: state.last_synced_at,
            last_sync_count: state.last_sync_count,
            full_sync_completed: state.full_sync_completed,
            history_cursor: state.history_cursor,
        })
    }

    async fn load_state(&self, account: AccountId) -> Result<SyncState> {
        let connection = self
            .store
            .active_connection(account)
            .await?
            .ok_or(Error::NoActiveConnection(account))?;

        debug!(
            "Syncing account {account} via connection {} ({})",
            connection.id, connection.email
        );

        Ok(self
            .store
            .load_sync_state(connection.id)
            .await?
            .unwrap_or_else(|| SyncState::new(connection.id)))
    }

    async fn run_incremental(
        &self,
        account: AccountId,
        state: SyncState,
        cursor: HistoryId,
    ) -> SyncReport {
        info!("Starting incremental sync for account {account} from history {cursor}");

        match self.incremental_sync(account, cursor).await {
            Ok(mut outcome) => {
                outcome.cursor = outcome.cursor.max(cursor);
                self.finish(SyncType::Incremental, state, outcome, Vec::new())
                    .await
            }
            Err(Error::HistoryExpired) => {
                warn!("History {cursor} expired for account {account}, falling back to full sync");
                self.run_full(account, state, vec![HISTORY_EXPIRED_NOTE.to_string()])
                    .await
            }
            Err(err) => SyncReport::failed(SyncType::Incremental, err.to_string()),
        }
    }

    async fn run_full(
        &self,
        account: AccountId,
        state: SyncState,
        mut errors: Vec<String>,
    ) -> SyncReport {
        info!(
            "Starting full sync for account {account} (window {})",
            self.config.full_sync_window
        );

        match self.full_sync(account).await {
            Ok(outcome) => self.finish(SyncType::Full, state, outcome, errors).await,
            Err(err) => {
                errors.push(err.to_string());
                let mut report = SyncReport::new(SyncType::Full);
                report.errors = errors;
                report
            }
        }
    }

    async fn finish(
        &self,
        sync_type: SyncType,
        mut state: SyncState,
        outcome: DriverOutcome,
        mut errors: Vec<String>,
    ) -> SyncReport {
        errors.extend(outcome.errors);

        if !outcome.advance_cursor {
            warn!(
                "Keeping cursor for connection {} after a failed write",
                state.connection_id
            );
            return SyncReport {
                synced_count: outcome.synced,
                skipped_count: outcome.skipped,
                label_update_count: outcome.label_updates,
                errors,
                sync_type,
                completed: false,
            };
        }

        state.history_cursor = Some(outcome.cursor);
        state.full_sync_completed = true;
        state.last_synced_at = Some(Utc::now());
        state.last_sync_count = u64::try_from(outcome.synced).unwrap_or(u64::MAX);

        let completed = match self.store.save_sync_state(&state).await {
            Ok(()) => true,
            Err(err) => {
                warn!("Failed to save sync state for connection {}: {err}", state.connection_id);
                errors.push(format!("Failed to save sync state: {err}"));
                false
            }
        };

        SyncReport {
            synced_count: outcome.synced,
            skipped_count: outcome.skipped,
            label_update_count: outcome.label_updates,
            errors,
            sync_type,
            completed,
        }
    }
}
