//! Gmail JSON response shapes that don't map directly onto core types.

use mailsync_core::remote::{HistoryEvent, HistoryId, HistoryPage, HistoryRecord, MessageRef};
use serde::Deserialize;

/// `users.messages.list` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    pub next_page_token: Option<String>,
}

/// `users.history.list` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryList {
    #[serde(default)]
    history: Vec<WireHistoryRecord>,
    history_id: HistoryId,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireHistoryRecord {
    id: HistoryId,
    #[serde(default)]
    messages_added: Vec<MessageChange>,
    #[serde(default)]
    labels_added: Vec<LabelChange>,
    #[serde(default)]
    labels_removed: Vec<LabelChange>,
}

#[derive(Debug, Deserialize)]
struct MessageChange {
    message: MessageRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabelChange {
    message: MessageRef,
    #[serde(default)]
    label_ids: Vec<String>,
}

impl From<WireHistoryRecord> for HistoryRecord {
    fn from(record: WireHistoryRecord) -> Self {
        let added = record
            .messages_added
            .into_iter()
            .map(|c| HistoryEvent::MessageAdded(c.message));
        let labels_added = record
            .labels_added
            .into_iter()
            .map(|c| HistoryEvent::LabelsAdded {
                message: c.message,
                label_ids: c.label_ids,
            });
        let labels_removed = record
            .labels_removed
            .into_iter()
            .map(|c| HistoryEvent::LabelsRemoved {
                message: c.message,
                label_ids: c.label_ids,
            });

        // Gmail reports changes per kind, so there is no finer order to keep
        Self {
            id: record.id,
            events: added.chain(labels_added).chain(labels_removed).collect(),
        }
    }
}

impl From<HistoryList> for HistoryPage {
    fn from(list: HistoryList) -> Self {
        Self {
            history_id: list.history_id,
            records: list.history.into_iter().map(Into::into).collect(),
            next_page_token: list.next_page_token.filter(|t| !t.is_empty()),
        }
    }
}
