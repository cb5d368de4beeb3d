//! Normalization of raw remote messages into canonical records.
//!
//! Everything here is infallible: a message with broken headers or
//! undecodable bodies still normalizes, with the broken pieces left empty,
//! so one bad message never aborts a sync batch.

mod address;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Utc};

use crate::remote::{MessagePart, RemoteMessage, SENT_LABEL, UNREAD_LABEL};

pub use address::{ParsedAddress, parse_address, parse_address_list};

/// Gmail encodes body data as base64url, with or without padding.
const BODY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Canonical view of a remote message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMessage {
    /// Subject header, empty if missing.
    pub subject: String,
    /// Provider preview text.
    pub snippet: String,
    /// First `text/plain` body.
    pub body_text: Option<String>,
    /// First `text/html` body.
    pub body_html: Option<String>,
    /// Sender.
    pub from: ParsedAddress,
    /// Deduplicated `To` emails.
    pub to: Vec<String>,
    /// Deduplicated `Cc` emails.
    pub cc: Vec<String>,
    /// Whether any part is a non-empty attachment.
    pub has_attachments: bool,
    /// Provider receipt time.
    pub sent_at: DateTime<Utc>,
    /// Whether the message lacks the unread label.
    pub is_read: bool,
    /// Whether the message was received rather than sent.
    pub is_inbound: bool,
    /// Label snapshot.
    pub labels: Vec<String>,
}

/// Normalizes a remote message.
#[must_use]
pub fn normalize(message: &RemoteMessage) -> NormalizedMessage {
    let payload = message.payload.as_ref();
    let header = |name: &str| payload.and_then(|p| header_value(p, name));

    let (body_text, body_html) = payload.map_or((None, None), extract_bodies);

    NormalizedMessage {
        subject: header("Subject").unwrap_or_default().trim().to_string(),
        snippet: message.snippet.clone().unwrap_or_default(),
        body_text,
        body_html,
        from: header("From").map(parse_address).unwrap_or_default(),
        to: header("To").map(address_emails).unwrap_or_default(),
        cc: header("Cc").map(address_emails).unwrap_or_default(),
        has_attachments: payload.is_some_and(has_attachments),
        sent_at: sent_at(message.internal_date.as_deref()),
        is_read: !message.has_label(UNREAD_LABEL),
        is_inbound: !message.has_label(SENT_LABEL),
        labels: message.label_ids.clone(),
    }
}

/// Looks up a header on the top-level part, ignoring case.
#[must_use]
pub fn header_value<'a>(part: &'a MessagePart, name: &str) -> Option<&'a str> {
    part.headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// Returns true if the part or any nested part carries a named, non-empty body.
#[must_use]
pub fn has_attachments(part: &MessagePart) -> bool {
    let is_attachment = part.filename.as_deref().is_some_and(|f| !f.is_empty())
        && part.body.as_ref().is_some_and(|b| b.size > 0);

    is_attachment || part.parts.iter().any(has_attachments)
}

fn address_emails(raw: &str) -> Vec<String> {
    parse_address_list(raw)
        .into_iter()
        .map(|a| a.email)
        .collect()
}

fn extract_bodies(part: &MessagePart) -> (Option<String>, Option<String>) {
    let mut text = None;
    let mut html = None;
    collect_bodies(part, &mut text, &mut html);
    (text, html)
}

fn collect_bodies(part: &MessagePart, text: &mut Option<String>, html: &mut Option<String>) {
    if text.is_some() && html.is_some() {
        return;
    }

    let mime_type = part
        .mime_type
        .as_deref()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let slot = match mime_type.as_str() {
        "text/plain" => Some(&mut *text),
        "text/html" => Some(&mut *html),
        _ => None,
    };

    if let Some(slot) = slot
        && slot.is_none()
        && let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref())
        && !data.is_empty()
    {
        *slot = decode_body(data);
    }

    for child in &part.parts {
        collect_bodies(child, text, html);
    }
}

fn decode_body(data: &str) -> Option<String> {
    BODY_ENGINE
        .decode(data.trim())
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

fn sent_at(internal_date: Option<&str>) -> DateTime<Utc> {
    internal_date
        .and_then(|d| d.trim().parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}
