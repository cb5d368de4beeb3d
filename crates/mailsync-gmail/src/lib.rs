//! # mailsync-gmail
//!
//! Gmail REST API client for `MailSync`.
//!
//! [`GmailClient`] implements [`mailsync_core::RemoteMailbox`] on top of
//! `users.messages.list`, `users.messages.get`, `users.history.list` and
//! `users.getProfile`, with bearer tokens supplied by a [`TokenProvider`].
//!
//! ## Retries
//!
//! Rate limiting (`429`) and server errors (`5xx`) are retried with
//! exponential backoff, honouring `Retry-After` when the server sends it.
//! A `404` from the history endpoint is reported as
//! [`RemoteError::HistoryExpired`](mailsync_core::RemoteError::HistoryExpired)
//! so the sync engine can fall back to a full sync.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod token;
mod wire;

pub use client::{DEFAULT_BASE_URL, GmailClient, MAX_PAGE_SIZE, RetryPolicy};
pub use error::{GmailError, Result};
pub use token::{StaticTokenProvider, TokenProvider};
