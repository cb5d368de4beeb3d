//! Error types for Gmail API operations.

use mailsync_core::RemoteError;

/// Result type alias for Gmail API operations.
pub type Result<T> = std::result::Result<T, GmailError>;

/// Gmail API error types.
#[derive(Debug, thiserror::Error)]
pub enum GmailError {
    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Token was rejected or the caller lacks access.
    #[error("Unauthorized ({status}): {message}")]
    Unauthorized {
        /// HTTP status code.
        status: u16,
        /// Response excerpt.
        message: String,
    },

    /// Resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success status.
    #[error("Gmail API error (status {status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response excerpt.
        message: String,
    },

    /// No access token is available for the account.
    #[error("Token unavailable: {0}")]
    Token(String),
}

/// Longest response excerpt kept in errors.
const MAX_MESSAGE_LEN: usize = 300;

impl GmailError {
    /// Builds an error from a non-success response.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = excerpt(body);
        match status {
            401 | 403 => Self::Unauthorized { status, message },
            404 => Self::NotFound(message),
            _ => Self::Status { status, message },
        }
    }
}

/// Prefers Google's `error.message` field over the raw body.
fn excerpt(body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());

    if message.len() <= MAX_MESSAGE_LEN {
        return message;
    }
    let mut end = MAX_MESSAGE_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &message[..end])
}

impl From<GmailError> for RemoteError {
    fn from(err: GmailError) -> Self {
        match err {
            GmailError::Http(e) => Self::Transport(e.to_string()),
            GmailError::Json(e) => Self::Decode(e.to_string()),
            GmailError::Unauthorized { message, .. } => Self::Unauthorized(message),
            GmailError::Token(message) => Self::Unauthorized(message),
            GmailError::NotFound(message) => Self::NotFound(message),
            GmailError::Status { status, message } => Self::Api { status, message },
        }
    }
}
