//! # mailsync-core
//!
//! Mailbox synchronization engine for `MailSync`.
//!
//! This crate provides:
//! - Normalization of raw provider messages into canonical records
//! - Conversation participant resolution
//! - Local storage (`SQLite`) for threads, messages and sync cursors
//! - The [`RemoteMailbox`] seam that provider clients implement
//! - Full and incremental sync with history-cursor recovery
//! - Secure token storage via the system keyring

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod credentials;
mod error;
pub mod normalize;
pub mod participants;
pub mod remote;
pub mod store;
pub mod sync;

pub use account::{AccountId, Connection, ConnectionId, Provider};
pub use credentials::{CredentialError, CredentialResult};
pub use error::{Error, Result};
pub use normalize::{NormalizedMessage, normalize};
pub use participants::resolve_participants;
pub use remote::{HistoryId, RemoteError, RemoteMailbox};
pub use store::{MailStore, SqliteStore, SyncState};
pub use sync::{SyncConfig, SyncEngine, SyncReport, SyncStatus, SyncType};
