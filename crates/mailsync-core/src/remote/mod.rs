//! Remote mailbox client interface.
//!
//! The sync engine talks to the provider only through [`RemoteMailbox`].
//! `mailsync-gmail` implements it over the Gmail REST API; tests use
//! in-memory fakes.

mod model;

use async_trait::async_trait;

use crate::account::AccountId;

pub use model::{
    AccountProfile, Header, HistoryEvent, HistoryEventType, HistoryId, HistoryPage, HistoryRecord,
    HistoryRequest, ListQuery, MessagePart, MessageRef, PartBody, RemoteMessage, SENT_LABEL,
    UNREAD_LABEL,
};

/// Errors reported by a remote mailbox.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The start cursor passed to a history request is too old.
    #[error("history cursor is no longer valid")]
    HistoryExpired,

    /// The requested message does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Credentials were rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The provider answered with an error status.
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response excerpt.
        message: String,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Access to a provider mailbox for one account at a time.
#[async_trait]
pub trait RemoteMailbox: Send + Sync {
    /// Lists the most recent messages matching the query, newest first.
    async fn list_messages(
        &self,
        account: AccountId,
        query: &ListQuery,
    ) -> Result<Vec<MessageRef>, RemoteError>;

    /// Fetches a message with headers and MIME tree.
    async fn get_message(&self, account: AccountId, id: &str)
    -> Result<RemoteMessage, RemoteError>;

    /// Fetches one page of history starting at `request.start`.
    ///
    /// Returns [`RemoteError::HistoryExpired`] when the start cursor is too old.
    async fn list_history(
        &self,
        account: AccountId,
        request: &HistoryRequest,
    ) -> Result<HistoryPage, RemoteError>;

    /// Returns account-level sync metadata.
    async fn profile(&self, account: AccountId) -> Result<AccountProfile, RemoteError>;
}
