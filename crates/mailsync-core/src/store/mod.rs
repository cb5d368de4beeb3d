//! Local persistence for threads, messages and sync state.
//!
//! The sync engine only depends on the traits here. [`SqliteStore`] is the
//! bundled implementation.

mod model;
mod sqlite;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::Result;
use crate::account::{AccountId, Connection, ConnectionId, Provider};

pub use model::{
    EMAIL_CHANNEL, MessageId, NewMessage, NewThread, StoredMessage, SyncState, Thread, ThreadId,
};
pub use sqlite::SqliteStore;

/// Thread persistence.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Returns the thread for `(owner, remote_thread_id)`, creating it if needed.
    ///
    /// An existing thread is returned unchanged.
    async fn find_or_create_thread(&self, thread: &NewThread) -> Result<Thread>;

    /// Looks up a thread by provider id.
    async fn get_thread(&self, owner: AccountId, remote_thread_id: &str) -> Result<Option<Thread>>;
}

/// Message persistence.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Returns true if the message is already stored.
    async fn message_exists(&self, owner: AccountId, remote_message_id: &str) -> Result<bool>;

    /// Returns the subset of `remote_message_ids` already stored.
    async fn existing_message_ids(
        &self,
        owner: AccountId,
        remote_message_ids: &[String],
    ) -> Result<HashSet<String>>;

    /// Inserts a message. Returns false if it already existed.
    async fn insert_message(&self, message: &NewMessage) -> Result<bool>;

    /// Sets the read flag on every stored message in `remote_message_ids`.
    ///
    /// Returns the number of stored rows matched. Unknown ids are ignored.
    async fn set_read_state(
        &self,
        owner: AccountId,
        remote_message_ids: &[String],
        is_read: bool,
    ) -> Result<u64>;

    /// Looks up a message by provider id.
    async fn get_message(
        &self,
        owner: AccountId,
        remote_message_id: &str,
    ) -> Result<Option<StoredMessage>>;

    /// Counts stored messages for an account.
    async fn count_messages(&self, owner: AccountId) -> Result<u64>;
}

/// Connection and cursor persistence.
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    /// Returns the account's active connection.
    async fn active_connection(&self, account: AccountId) -> Result<Option<Connection>>;

    /// Registers a new active connection, deactivating previous ones.
    async fn register_connection(
        &self,
        account: AccountId,
        provider: Provider,
        email: &str,
    ) -> Result<Connection>;

    /// Deactivates all connections of an account. Returns how many changed.
    async fn deactivate_connections(&self, account: AccountId) -> Result<u64>;

    /// Loads the sync state of a connection.
    async fn load_sync_state(&self, connection: ConnectionId) -> Result<Option<SyncState>>;

    /// Inserts or replaces the sync state of a connection.
    async fn save_sync_state(&self, state: &SyncState) -> Result<()>;
}

/// Everything the sync engine needs from local storage.
pub trait MailStore: ThreadStore + MessageStore + SyncStateStore {}

impl<T: ThreadStore + MessageStore + SyncStateStore> MailStore for T {}
