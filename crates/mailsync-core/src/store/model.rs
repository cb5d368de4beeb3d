//! Stored thread, message and sync state records.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::{AccountId, ConnectionId};
use crate::normalize::NormalizedMessage;
use crate::remote::HistoryId;

/// Channel tag for threads imported from a mailbox.
pub const EMAIL_CHANNEL: &str = "email";

/// Local thread row ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub i64);

/// Local message row ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

/// Thread to find or create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewThread {
    /// Owning account.
    pub owner: AccountId,
    /// Provider thread id.
    pub remote_thread_id: String,
    /// Source channel tag.
    pub channel: String,
    /// Thread subject.
    pub subject: String,
    /// Participant emails.
    pub participants: BTreeSet<String>,
}

/// A stored conversation thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    /// Row ID.
    pub id: ThreadId,
    /// Owning account.
    pub owner: AccountId,
    /// Provider thread id.
    pub remote_thread_id: String,
    /// Source channel tag.
    pub channel: String,
    /// Thread subject.
    pub subject: String,
    /// Participant emails, fixed when the thread was created.
    pub participants: BTreeSet<String>,
    /// When the thread was created locally.
    pub created_at: DateTime<Utc>,
}

/// Message to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Owning account.
    pub owner: AccountId,
    /// Parent thread.
    pub thread_id: ThreadId,
    /// Provider message id.
    pub remote_message_id: String,
    /// Subject.
    pub subject: String,
    /// Plain text body.
    pub body_text: Option<String>,
    /// HTML body.
    pub body_html: Option<String>,
    /// Preview text.
    pub snippet: String,
    /// Sender email.
    pub from_email: String,
    /// Sender display name.
    pub from_name: Option<String>,
    /// Recipient emails.
    pub to: Vec<String>,
    /// CC emails.
    pub cc: Vec<String>,
    /// Provider receipt time.
    pub sent_at: DateTime<Utc>,
    /// Received rather than sent.
    pub is_inbound: bool,
    /// Read state.
    pub is_read: bool,
    /// Attachment presence.
    pub has_attachments: bool,
    /// Provider label snapshot.
    pub labels: Vec<String>,
}

impl NewMessage {
    /// Builds an insertable message from its normalized form.
    #[must_use]
    pub fn from_normalized(
        owner: AccountId,
        thread_id: ThreadId,
        remote_message_id: impl Into<String>,
        normalized: NormalizedMessage,
    ) -> Self {
        Self {
            owner,
            thread_id,
            remote_message_id: remote_message_id.into(),
            subject: normalized.subject,
            body_text: normalized.body_text,
            body_html: normalized.body_html,
            snippet: normalized.snippet,
            from_email: normalized.from.email,
            from_name: normalized.from.name,
            to: normalized.to,
            cc: normalized.cc,
            sent_at: normalized.sent_at,
            is_inbound: normalized.is_inbound,
            is_read: normalized.is_read,
            has_attachments: normalized.has_attachments,
            labels: normalized.labels,
        }
    }
}

/// A stored message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// Row ID.
    pub id: MessageId,
    /// Owning account.
    pub owner: AccountId,
    /// Parent thread.
    pub thread_id: ThreadId,
    /// Provider message id.
    pub remote_message_id: String,
    /// Subject.
    pub subject: String,
    /// Plain text body.
    pub body_text: Option<String>,
    /// HTML body.
    pub body_html: Option<String>,
    /// Preview text.
    pub snippet: String,
    /// Sender email.
    pub from_email: String,
    /// Sender display name.
    pub from_name: Option<String>,
    /// Recipient emails.
    pub to: Vec<String>,
    /// CC emails.
    pub cc: Vec<String>,
    /// Provider receipt time.
    pub sent_at: DateTime<Utc>,
    /// Received rather than sent.
    pub is_inbound: bool,
    /// Read state.
    pub is_read: bool,
    /// Attachment presence.
    pub has_attachments: bool,
    /// Provider label snapshot taken at import.
    pub labels: Vec<String>,
}

/// Per-connection sync cursor and bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Connection this state belongs to.
    pub connection_id: ConnectionId,
    /// Last persisted history cursor.
    pub history_cursor: Option<HistoryId>,
    /// Whether a full sync has finished at least once.
    pub full_sync_completed: bool,
    /// When the last run finished.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Messages imported by the last run.
    pub last_sync_count: u64,
}

impl SyncState {
    /// Creates the state for a connection that has never synced.
    #[must_use]
    pub const fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            history_cursor: None,
            full_sync_completed: false,
            last_synced_at: None,
            last_sync_count: 0,
        }
    }

    /// Cursor to resume incremental sync from, if incremental sync is allowed.
    #[must_use]
    pub fn resume_cursor(&self) -> Option<HistoryId> {
        self.history_cursor.filter(|_| self.full_sync_completed)
    }
}
