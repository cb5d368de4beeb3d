//! Keyring-backed access tokens.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mailsync_core::credentials::get_access_token;
use mailsync_core::store::SyncStateStore;
use mailsync_core::{AccountId, SqliteStore};
use mailsync_gmail::{GmailError, TokenProvider};

/// Looks up the token stored for an account's active connection.
///
/// Tokens are cached for the life of the process.
pub struct KeyringTokens {
    store: Arc<SqliteStore>,
    cache: Mutex<HashMap<AccountId, String>>,
}

impl KeyringTokens {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, account: AccountId) -> Option<String> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(&account).cloned())
    }
}

#[async_trait]
impl TokenProvider for KeyringTokens {
    async fn access_token(&self, account: AccountId) -> mailsync_gmail::Result<String> {
        if let Some(token) = self.cached(account) {
            return Ok(token);
        }

        let connection = self
            .store
            .active_connection(account)
            .await
            .map_err(|e| GmailError::Token(e.to_string()))?
            .ok_or_else(|| GmailError::Token(format!("no active connection for account {account}")))?;

        let token = tokio::task::spawn_blocking(move || get_access_token(connection.id))
            .await
            .map_err(|e| GmailError::Token(e.to_string()))?
            .map_err(|e| GmailError::Token(e.to_string()))?
            .ok_or_else(|| {
                GmailError::Token(format!("no token stored for connection {}", connection.id))
            })?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(account, token.clone());
        }
        Ok(token)
    }
}
