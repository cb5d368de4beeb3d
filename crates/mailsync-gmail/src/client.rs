//! Gmail REST client.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mailsync_core::remote::{
    AccountProfile, HistoryPage, HistoryRequest, ListQuery, MessageRef, RemoteMessage,
};
use mailsync_core::{AccountId, RemoteError, RemoteMailbox};
use reqwest::header::{ACCEPT, HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{GmailError, Result};
use crate::token::TokenProvider;
use crate::wire::{HistoryList, MessageList};

/// Gmail API root for the authenticated user.
pub const DEFAULT_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Largest page Gmail returns for list and history calls.
pub const MAX_PAGE_SIZE: usize = 500;

/// Backoff settings for rate-limited and failed requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay, including `Retry-After`.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given retry count and base delay.
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    /// Sets the maximum single delay.
    #[must_use]
    pub const fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

/// Gmail API client.
#[derive(Clone)]
pub struct GmailClient {
    http_client: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    retry: RetryPolicy,
}

impl fmt::Debug for GmailClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GmailClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl GmailClient {
    /// Creates a client against the public Gmail API.
    #[must_use]
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            tokens,
            retry: RetryPolicy::default(),
        }
    }

    /// Points the client at another API root (e.g. a test server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the HTTP client, e.g. to configure timeouts or proxies.
    #[must_use]
    pub fn with_http_client(mut self, http_client: Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Lists message ids newest first, following pages until `max_results`
    /// ids are collected or the listing ends.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    pub async fn list_message_ids(
        &self,
        account: AccountId,
        query: &ListQuery,
    ) -> Result<Vec<MessageRef>> {
        let mut refs = Vec::new();
        let mut page_token: Option<String> = None;

        while refs.len() < query.max_results {
            let page_size = (query.max_results - refs.len()).min(MAX_PAGE_SIZE);
            let mut params = vec![("maxResults", page_size.to_string())];
            if let Some(filter) = query.filter.as_deref().filter(|f| !f.is_empty()) {
                params.push(("q", filter.to_string()));
            }
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let page: MessageList = self.get_json(account, "messages", &params).await?;
            debug!("Listed {} message ids for account {account}", page.messages.len());
            refs.extend(page.messages);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        refs.truncate(query.max_results);
        Ok(refs)
    }

    /// Fetches one message in `full` format.
    ///
    /// # Errors
    ///
    /// Returns [`GmailError::NotFound`] if the message no longer exists.
    pub async fn fetch_message(&self, account: AccountId, id: &str) -> Result<RemoteMessage> {
        let path = format!("messages/{id}");
        self.get_json(account, &path, &[("format", "full".to_string())])
            .await
            .map_err(|err| match err {
                GmailError::NotFound(_) => GmailError::NotFound(format!("message {id}")),
                other => other,
            })
    }

    /// Fetches one page of history.
    ///
    /// # Errors
    ///
    /// Returns [`GmailError::NotFound`] if the start cursor has expired.
    pub async fn history_page(
        &self,
        account: AccountId,
        request: &HistoryRequest,
    ) -> Result<HistoryPage> {
        let mut params = vec![
            ("startHistoryId", request.start.to_string()),
            ("maxResults", request.max_results.min(MAX_PAGE_SIZE).to_string()),
        ];
        params.extend(
            request
                .event_types
                .iter()
                .map(|t| ("historyTypes", t.as_str().to_string())),
        );
        if let Some(token) = &request.page_token {
            params.push(("pageToken", token.clone()));
        }

        let list: HistoryList = self.get_json(account, "history", &params).await?;
        Ok(list.into())
    }

    /// Fetches the mailbox profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_profile(&self, account: AccountId) -> Result<AccountProfile> {
        self.get_json(account, "profile", &[]).await
    }

    /// GET a JSON resource, retrying rate limits and server errors.
    async fn get_json<T: DeserializeOwned>(
        &self,
        account: AccountId,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let token = self.tokens.access_token(account).await?;
        let url = format!("{}/{path}", self.base_url);
        let mut delay = self.retry.base_delay;
        let mut attempt = 0;

        loop {
            let response = self
                .http_client
                .get(&url)
                .bearer_auth(&token)
                .header(ACCEPT, "application/json")
                .query(params)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                let body = response.text().await?;
                return Ok(serde_json::from_str(&body)?);
            }

            if is_retryable(status) && attempt < self.retry.max_retries {
                let wait = retry_after(response.headers())
                    .unwrap_or(delay)
                    .min(self.retry.max_delay);
                attempt += 1;
                warn!(
                    "Gmail {path} returned {status}, retry {attempt}/{} in {wait:?}",
                    self.retry.max_retries
                );
                tokio::time::sleep(wait).await;
                delay = (delay * 2).min(self.retry.max_delay);
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(GmailError::from_status(status.as_u16(), &body));
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Parses a `Retry-After` header given in seconds.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[async_trait]
impl RemoteMailbox for GmailClient {
    async fn list_messages(
        &self,
        account: AccountId,
        query: &ListQuery,
    ) -> std::result::Result<Vec<MessageRef>, RemoteError> {
        Ok(self.list_message_ids(account, query).await?)
    }

    async fn get_message(
        &self,
        account: AccountId,
        id: &str,
    ) -> std::result::Result<RemoteMessage, RemoteError> {
        Ok(self.fetch_message(account, id).await?)
    }

    async fn list_history(
        &self,
        account: AccountId,
        request: &HistoryRequest,
    ) -> std::result::Result<HistoryPage, RemoteError> {
        match self.history_page(account, request).await {
            Ok(page) => Ok(page),
            Err(GmailError::NotFound(_)) => Err(RemoteError::HistoryExpired),
            Err(err) => Err(err.into()),
        }
    }

    async fn profile(&self, account: AccountId) -> std::result::Result<AccountProfile, RemoteError> {
        Ok(self.get_profile(account).await?)
    }
}
