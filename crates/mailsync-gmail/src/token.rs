//! Access token sources.

use async_trait::async_trait;
use mailsync_core::AccountId;

use crate::error::Result;

/// Supplies a bearer token for an account.
///
/// Called once per request, so implementations that refresh or look up
/// tokens should cache.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a valid access token for the account.
    async fn access_token(&self, account: AccountId) -> Result<String>;
}

/// Uses the same token for every account.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Creates a provider for a fixed token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self, _account: AccountId) -> Result<String> {
        Ok(self.token.clone())
    }
}
