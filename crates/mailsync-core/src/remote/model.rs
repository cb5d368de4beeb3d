//! Remote mailbox data types.
//!
//! Message shapes follow the Gmail `users.messages` resource so the REST
//! client can deserialize responses straight into them.

use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Label marking a message as unread.
pub const UNREAD_LABEL: &str = "UNREAD";

/// Label marking a message as sent by the mailbox owner.
pub const SENT_LABEL: &str = "SENT";

/// Position in the provider's change history.
///
/// Gmail issues history ids as decimal strings that only ever grow, so
/// they are ordered numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HistoryId(u64);

impl HistoryId {
    /// Creates a history id from its numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for HistoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for HistoryId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl TryFrom<String> for HistoryId {
    type Error = ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HistoryId> for String {
    fn from(id: HistoryId) -> Self {
        id.to_string()
    }
}

/// Reference to a remote message, as returned by list and history calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    /// Remote message id.
    pub id: String,
    /// Remote thread id, if the provider groups messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl MessageRef {
    /// Creates a reference without thread information.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            thread_id: None,
        }
    }
}

/// Full remote message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    /// Remote message id.
    pub id: String,
    /// Remote thread id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Provider labels at fetch time.
    #[serde(default)]
    pub label_ids: Vec<String>,
    /// Short preview text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// History position of the last change to this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_id: Option<HistoryId>,
    /// Receipt time in epoch milliseconds, as a decimal string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_date: Option<String>,
    /// MIME tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<MessagePart>,
}

impl RemoteMessage {
    /// Thread grouping key, falling back to the message id for providers
    /// without threads.
    #[must_use]
    pub fn thread_key(&self) -> &str {
        self.thread_id
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.id)
    }

    /// Returns true if the message carries the given label.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.label_ids.iter().any(|l| l == label)
    }
}

/// One node of a message's MIME tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    /// Part id within the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_id: Option<String>,
    /// MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Attachment filename; empty for inline parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Part headers.
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Part body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<PartBody>,
    /// Child parts for multipart types.
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

/// A message header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

impl Header {
    /// Creates a header.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Body of a MIME part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    /// Body size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Inline data, base64url encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Attachment id for bodies fetched separately.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,
}

/// Account-level sync metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    /// Mailbox address.
    #[serde(default)]
    pub email_address: String,
    /// Current history position of the mailbox.
    pub history_id: HistoryId,
}

/// Kinds of history events a sync asks the provider for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryEventType {
    /// A message was added to the mailbox.
    MessageAdded,
    /// Labels were added to a message.
    LabelAdded,
    /// Labels were removed from a message.
    LabelRemoved,
}

impl HistoryEventType {
    /// All event types consumed by incremental sync.
    pub const SYNC: [Self; 3] = [Self::MessageAdded, Self::LabelAdded, Self::LabelRemoved];

    /// Gmail `historyTypes` parameter value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MessageAdded => "messageAdded",
            Self::LabelAdded => "labelAdded",
            Self::LabelRemoved => "labelRemoved",
        }
    }
}

/// A single change reported in a history record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    /// A new message appeared.
    MessageAdded(MessageRef),
    /// Labels were added to an existing message.
    LabelsAdded {
        /// Affected message.
        message: MessageRef,
        /// Labels added.
        label_ids: Vec<String>,
    },
    /// Labels were removed from an existing message.
    LabelsRemoved {
        /// Affected message.
        message: MessageRef,
        /// Labels removed.
        label_ids: Vec<String>,
    },
}

/// One entry of the provider's change history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    /// History position of this record.
    pub id: HistoryId,
    /// Changes in this record, grouped by kind: added messages first,
    /// then added labels, then removed labels.
    pub events: Vec<HistoryEvent>,
}

/// One page of history results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPage {
    /// Current history position of the mailbox.
    pub history_id: HistoryId,
    /// Records on this page.
    pub records: Vec<HistoryRecord>,
    /// Token for the next page, if any.
    pub next_page_token: Option<String>,
}

/// Parameters for listing recent messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Maximum number of ids to return.
    pub max_results: usize,
    /// Provider search filter.
    pub filter: Option<String>,
}

/// Parameters for one history page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    /// Cursor to replay from.
    pub start: HistoryId,
    /// Page size.
    pub max_results: usize,
    /// Continuation token from the previous page.
    pub page_token: Option<String>,
    /// Event kinds to include.
    pub event_types: Vec<HistoryEventType>,
}
