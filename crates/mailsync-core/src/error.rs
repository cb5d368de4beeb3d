//! Error types for the core library.

use thiserror::Error;

use crate::account::AccountId;
use crate::remote::RemoteError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Remote mailbox operation failed.
    #[error("Remote mailbox error: {0}")]
    Remote(RemoteError),

    /// The stored history cursor is too old for the provider to replay.
    #[error("History cursor expired")]
    HistoryExpired,

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The account has no active provider connection.
    #[error("No active mailbox connection for account {0}")]
    NoActiveConnection(AccountId),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential storage error.
    #[error("Credential error: {0}")]
    Credential(#[from] crate::credentials::CredentialError),
}

impl From<RemoteError> for Error {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::HistoryExpired => Self::HistoryExpired,
            other => Self::Remote(other),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
