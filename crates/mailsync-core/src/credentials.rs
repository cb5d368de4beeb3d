//! Secure token storage using the system keyring.
//!
//! Access tokens are stored per connection using the platform's native
//! credential storage:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use keyring::Entry;
use tracing::{debug, warn};

use crate::account::ConnectionId;

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "mailsync";

/// Credential type identifier for Gmail access tokens.
const GMAIL_TOKEN_CREDENTIAL: &str = "gmail_token";

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Generates the keyring entry key for a connection's credential.
fn credential_key(connection: ConnectionId, credential_type: &str) -> String {
    format!("{SERVICE_NAME}_{credential_type}_{}", connection.0)
}

fn token_entry(connection: ConnectionId) -> CredentialResult<Entry> {
    let key = credential_key(connection, GMAIL_TOKEN_CREDENTIAL);
    Ok(Entry::new(SERVICE_NAME, &key)?)
}

/// Stores an access token for a connection.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn store_access_token(connection: ConnectionId, token: &str) -> CredentialResult<()> {
    token_entry(connection)?.set_password(token)?;
    debug!("Stored access token for connection {connection}");
    Ok(())
}

/// Retrieves the access token for a connection.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn get_access_token(connection: ConnectionId) -> CredentialResult<Option<String>> {
    match token_entry(connection)?.get_password() {
        Ok(token) => Ok(Some(token)),
        Err(keyring::Error::NoEntry) => {
            debug!("No access token found for connection {connection}");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Deletes the access token for a connection.
///
/// A missing entry is not an error.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn delete_access_token(connection: ConnectionId) -> CredentialResult<()> {
    match token_entry(connection)?.delete_credential() {
        Ok(()) => {
            debug!("Deleted access token for connection {connection}");
            Ok(())
        }
        Err(keyring::Error::NoEntry) => {
            debug!("No access token to delete for connection {connection}");
            Ok(())
        }
        Err(e) => {
            warn!("Failed to delete access token: {e}");
            Err(e.into())
        }
    }
}
