//! Account and provider connection types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for the account that owns synced threads and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub i64);

impl AccountId {
    /// Create a new account ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a provider connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub i64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mailbox provider behind a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Gmail REST API.
    #[default]
    Gmail,
}

impl Provider {
    /// Identifier used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gmail => "gmail",
        }
    }

    /// Parse a stored identifier.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "gmail" => Some(Self::Gmail),
            _ => None,
        }
    }
}

/// A linked mailbox for an account.
///
/// Sync state is keyed by the connection, so reconnecting a mailbox
/// starts from a clean cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Connection ID.
    pub id: ConnectionId,
    /// Owning account.
    pub account_id: AccountId,
    /// Provider type.
    pub provider: Provider,
    /// Mailbox address.
    pub email: String,
    /// Whether this is the account's active connection.
    pub is_active: bool,
    /// When the connection was registered.
    pub created_at: DateTime<Utc>,
}
