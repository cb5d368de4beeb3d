//! Integration tests for the sync engine.
//!
//! These tests drive [`SyncEngine`] against an in-memory mailbox and an
//! in-memory `SQLite` store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mailsync_core::remote::{
    AccountProfile, Header, HistoryEvent, HistoryPage, HistoryRecord, HistoryRequest, ListQuery,
    MessagePart, MessageRef, PartBody, RemoteMessage,
};
use mailsync_core::store::{
    MessageStore, NewMessage, NewThread, StoredMessage, SyncState, SyncStateStore, Thread,
    ThreadStore,
};
use mailsync_core::sync::HISTORY_EXPIRED_NOTE;
use mailsync_core::{
    AccountId, Connection, ConnectionId, Error, HistoryId, MailStore, Provider, RemoteError,
    RemoteMailbox, SqliteStore, SyncConfig, SyncEngine, SyncType,
};

const ACCOUNT: AccountId = AccountId::new(1);

#[derive(Default)]
struct FakeState {
    /// Oldest first; listing returns newest first.
    messages: Vec<RemoteMessage>,
    /// History pages served in order for each `list_history` walk.
    history: Vec<HistoryPage>,
    profile_history: u64,
    history_expired: bool,
    history_error: Option<RemoteError>,
    failing: HashSet<String>,
    list_calls: usize,
    get_calls: usize,
    history_calls: usize,
    profile_calls: usize,
    history_starts: Vec<HistoryId>,
}

/// Mailbox double with scripted history.
#[derive(Default)]
struct FakeMailbox {
    state: Mutex<FakeState>,
}

impl FakeMailbox {
    fn with_messages(messages: Vec<RemoteMessage>) -> Arc<Self> {
        let mailbox = Self::default();
        {
            let mut state = mailbox.state.lock().unwrap();
            state.profile_history = messages
                .iter()
                .filter_map(|m| m.history_id)
                .map(HistoryId::get)
                .max()
                .unwrap_or(1);
            state.messages = messages;
        }
        Arc::new(mailbox)
    }

    fn add_message(&self, message: RemoteMessage) {
        self.state.lock().unwrap().messages.push(message);
    }

    /// Replace the scripted history with pages holding the given records.
    fn set_history(&self, history_id: u64, pages: Vec<Vec<HistoryRecord>>) {
        let mut state = self.state.lock().unwrap();
        let count = pages.len();
        state.history = pages
            .into_iter()
            .enumerate()
            .map(|(i, records)| HistoryPage {
                history_id: HistoryId::new(history_id),
                records,
                next_page_token: (i + 1 < count).then(|| format!("page-{}", i + 1)),
            })
            .collect();
    }

    fn expire_history(&self) {
        self.state.lock().unwrap().history_expired = true;
    }

    fn fail_message(&self, id: &str) {
        self.state.lock().unwrap().failing.insert(id.to_string());
    }

    fn remote_calls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.list_calls + state.get_calls + state.history_calls + state.profile_calls
    }
}

#[async_trait]
impl RemoteMailbox for FakeMailbox {
    async fn list_messages(
        &self,
        _account: AccountId,
        query: &ListQuery,
    ) -> Result<Vec<MessageRef>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        Ok(state
            .messages
            .iter()
            .rev()
            .take(query.max_results)
            .map(|m| MessageRef {
                id: m.id.clone(),
                thread_id: m.thread_id.clone(),
            })
            .collect())
    }

    async fn get_message(&self, _account: AccountId, id: &str) -> Result<RemoteMessage, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.get_calls += 1;
        if state.failing.contains(id) {
            return Err(RemoteError::Api {
                status: 500,
                message: "backend error".to_string(),
            });
        }
        state
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    async fn list_history(
        &self,
        _account: AccountId,
        request: &HistoryRequest,
    ) -> Result<HistoryPage, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.history_calls += 1;
        state.history_starts.push(request.start);
        if state.history_expired {
            return Err(RemoteError::HistoryExpired);
        }
        if let Some(err) = state.history_error.clone() {
            return Err(err);
        }

        let index = match request.page_token.as_deref() {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| RemoteError::Api {
                    status: 400,
                    message: format!("bad page token {token}"),
                })?,
        };

        Ok(state.history.get(index).cloned().unwrap_or(HistoryPage {
            history_id: request.start,
            records: Vec::new(),
            next_page_token: None,
        }))
    }

    async fn profile(&self, _account: AccountId) -> Result<AccountProfile, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.profile_calls += 1;
        Ok(AccountProfile {
            email_address: "me@example.com".to_string(),
            history_id: HistoryId::new(state.profile_history),
        })
    }
}

/// `SqliteStore` that can be told to fail thread creation or read-state writes.
struct FlakyStore {
    inner: SqliteStore,
    failing_thread: Option<String>,
    fail_read_state: AtomicBool,
}

fn write_error() -> Error {
    Error::Database(sqlx::Error::PoolClosed)
}

#[async_trait]
impl ThreadStore for FlakyStore {
    async fn find_or_create_thread(&self, thread: &NewThread) -> mailsync_core::Result<Thread> {
        if self.failing_thread.as_deref() == Some(thread.remote_thread_id.as_str()) {
            return Err(write_error());
        }
        self.inner.find_or_create_thread(thread).await
    }

    async fn get_thread(
        &self,
        owner: AccountId,
        remote_thread_id: &str,
    ) -> mailsync_core::Result<Option<Thread>> {
        self.inner.get_thread(owner, remote_thread_id).await
    }
}

#[async_trait]
impl MessageStore for FlakyStore {
    async fn message_exists(&self, owner: AccountId, id: &str) -> mailsync_core::Result<bool> {
        self.inner.message_exists(owner, id).await
    }

    async fn existing_message_ids(
        &self,
        owner: AccountId,
        ids: &[String],
    ) -> mailsync_core::Result<HashSet<String>> {
        self.inner.existing_message_ids(owner, ids).await
    }

    async fn insert_message(&self, message: &NewMessage) -> mailsync_core::Result<bool> {
        self.inner.insert_message(message).await
    }

    async fn set_read_state(
        &self,
        owner: AccountId,
        ids: &[String],
        is_read: bool,
    ) -> mailsync_core::Result<u64> {
        if self.fail_read_state.load(Ordering::SeqCst) {
            return Err(write_error());
        }
        self.inner.set_read_state(owner, ids, is_read).await
    }

    async fn get_message(
        &self,
        owner: AccountId,
        id: &str,
    ) -> mailsync_core::Result<Option<StoredMessage>> {
        self.inner.get_message(owner, id).await
    }

    async fn count_messages(&self, owner: AccountId) -> mailsync_core::Result<u64> {
        self.inner.count_messages(owner).await
    }
}

#[async_trait]
impl SyncStateStore for FlakyStore {
    async fn active_connection(
        &self,
        account: AccountId,
    ) -> mailsync_core::Result<Option<Connection>> {
        self.inner.active_connection(account).await
    }

    async fn register_connection(
        &self,
        account: AccountId,
        provider: Provider,
        email: &str,
    ) -> mailsync_core::Result<Connection> {
        self.inner.register_connection(account, provider, email).await
    }

    async fn deactivate_connections(&self, account: AccountId) -> mailsync_core::Result<u64> {
        self.inner.deactivate_connections(account).await
    }

    async fn load_sync_state(
        &self,
        connection: ConnectionId,
    ) -> mailsync_core::Result<Option<SyncState>> {
        self.inner.load_sync_state(connection).await
    }

    async fn save_sync_state(&self, state: &SyncState) -> mailsync_core::Result<()> {
        self.inner.save_sync_state(state).await
    }
}

async fn flaky_store(failing_thread: Option<&str>) -> Arc<FlakyStore> {
    let inner = SqliteStore::in_memory().await.unwrap();
    inner
        .register_connection(ACCOUNT, Provider::Gmail, "me@example.com")
        .await
        .unwrap();
    Arc::new(FlakyStore {
        inner,
        failing_thread: failing_thread.map(str::to_string),
        fail_read_state: AtomicBool::new(false),
    })
}

fn message(id: &str, thread: &str, history: u64, labels: &[&str]) -> RemoteMessage {
    RemoteMessage {
        id: id.to_string(),
        thread_id: Some(thread.to_string()),
        label_ids: labels.iter().map(|l| (*l).to_string()).collect(),
        snippet: Some(format!("Snippet of {id}")),
        history_id: Some(HistoryId::new(history)),
        internal_date: Some("1700000000000".to_string()),
        payload: Some(MessagePart {
            mime_type: Some("text/plain".to_string()),
            headers: vec![
                Header::new("Subject", format!("Subject {thread}")),
                Header::new("From", format!("Sender {id} <{id}@example.com>")),
                Header::new("To", "me@example.com"),
            ],
            body: Some(PartBody {
                size: 5,
                // "hello"
                data: Some("aGVsbG8".to_string()),
                attachment_id: None,
            }),
            ..MessagePart::default()
        }),
    }
}

fn unread_removed(id: &str, record: u64) -> HistoryRecord {
    HistoryRecord {
        id: HistoryId::new(record),
        events: vec![HistoryEvent::LabelsRemoved {
            message: MessageRef::new(id),
            label_ids: vec!["UNREAD".to_string()],
        }],
    }
}

fn unread_added(id: &str, record: u64) -> HistoryRecord {
    HistoryRecord {
        id: HistoryId::new(record),
        events: vec![HistoryEvent::LabelsAdded {
            message: MessageRef::new(id),
            label_ids: vec!["UNREAD".to_string()],
        }],
    }
}

fn added(id: &str, thread: &str, record: u64) -> HistoryRecord {
    HistoryRecord {
        id: HistoryId::new(record),
        events: vec![HistoryEvent::MessageAdded(MessageRef {
            id: id.to_string(),
            thread_id: Some(thread.to_string()),
        })],
    }
}

async fn connected_store() -> Arc<SqliteStore> {
    let store = SqliteStore::in_memory().await.unwrap();
    store
        .register_connection(ACCOUNT, Provider::Gmail, "me@example.com")
        .await
        .unwrap();
    Arc::new(store)
}

fn engine<S: MailStore>(mailbox: &Arc<FakeMailbox>, store: &Arc<S>) -> SyncEngine<FakeMailbox, S> {
    engine_with(mailbox, store, SyncConfig::default())
}

fn engine_with<S: MailStore>(
    mailbox: &Arc<FakeMailbox>,
    store: &Arc<S>,
    config: SyncConfig,
) -> SyncEngine<FakeMailbox, S> {
    SyncEngine::new(Arc::clone(mailbox), Arc::clone(store), config).unwrap()
}

async fn cursor(store: &SqliteStore) -> Option<HistoryId> {
    let connection = store.active_connection(ACCOUNT).await.unwrap().unwrap();
    store
        .load_sync_state(connection.id)
        .await
        .unwrap()
        .and_then(|s| s.history_cursor)
}

fn three_messages() -> Vec<RemoteMessage> {
    vec![
        message("m1", "t1", 100, &["INBOX", "UNREAD"]),
        message("m2", "t1", 110, &["INBOX"]),
        message("m3", "t2", 120, &["INBOX", "UNREAD"]),
    ]
}

#[tokio::test]
async fn test_first_sync_is_full() {
    let mailbox = FakeMailbox::with_messages(three_messages());
    let store = connected_store().await;
    let engine = engine(&mailbox, &store);

    let report = engine.sync_for_account(ACCOUNT).await;

    assert_eq!(report.sync_type, SyncType::Full);
    assert!(report.completed);
    assert_eq!(report.synced_count, 3);
    assert_eq!(report.skipped_count, 0);
    assert!(report.errors.is_empty());
    assert_eq!(store.count_messages(ACCOUNT).await.unwrap(), 3);
    assert_eq!(cursor(&store).await, Some(HistoryId::new(120)));

    let thread = store.get_thread(ACCOUNT, "t1").await.unwrap().unwrap();
    assert_eq!(thread.subject, "Subject t1");
    assert_eq!(thread.channel, "email");
    let participants: Vec<&str> = thread.participants.iter().map(String::as_str).collect();
    assert_eq!(
        participants,
        ["m1@example.com", "m2@example.com", "me@example.com"]
    );

    let stored = store.get_message(ACCOUNT, "m1").await.unwrap().unwrap();
    assert_eq!(stored.thread_id, thread.id);
    assert_eq!(stored.body_text.as_deref(), Some("hello"));
    assert!(!stored.is_read);
    assert!(store.get_message(ACCOUNT, "m2").await.unwrap().unwrap().is_read);
}

#[tokio::test]
async fn test_second_sync_is_incremental_and_idempotent() {
    let mailbox = FakeMailbox::with_messages(three_messages());
    let store = connected_store().await;
    let engine = engine(&mailbox, &store);

    engine.sync_for_account(ACCOUNT).await;
    let report = engine.sync_for_account(ACCOUNT).await;

    assert_eq!(report.sync_type, SyncType::Incremental);
    assert!(report.completed);
    assert_eq!(report.synced_count, 0);
    assert_eq!(store.count_messages(ACCOUNT).await.unwrap(), 3);
    assert_eq!(mailbox.state.lock().unwrap().history_starts, [HistoryId::new(120)]);
}

#[tokio::test]
async fn test_repeated_full_sync_inserts_no_duplicates() {
    let mailbox = FakeMailbox::with_messages(three_messages());
    let store = connected_store().await;
    let engine = engine(&mailbox, &store);
    engine.sync_for_account(ACCOUNT).await;

    // Forget that the full sync finished so the next run is full again
    let connection = store.active_connection(ACCOUNT).await.unwrap().unwrap();
    let mut state = store.load_sync_state(connection.id).await.unwrap().unwrap();
    state.full_sync_completed = false;
    store.save_sync_state(&state).await.unwrap();

    let report = engine.sync_for_account(ACCOUNT).await;

    assert_eq!(report.sync_type, SyncType::Full);
    assert_eq!(report.synced_count, 0);
    assert_eq!(report.skipped_count, 3);
    assert_eq!(store.count_messages(ACCOUNT).await.unwrap(), 3);
    // Only the listing was repeated; nothing was fetched again
    assert_eq!(mailbox.state.lock().unwrap().get_calls, 3);
}

#[tokio::test]
async fn test_incremental_imports_new_message_into_existing_thread() {
    let mailbox = FakeMailbox::with_messages(three_messages());
    let store = connected_store().await;
    let engine = engine(&mailbox, &store);
    engine.sync_for_account(ACCOUNT).await;

    mailbox.add_message(message("m4", "t1", 130, &["INBOX", "UNREAD"]));
    mailbox.set_history(135, vec![vec![added("m4", "t1", 130)]]);

    let report = engine.sync_for_account(ACCOUNT).await;

    assert_eq!(report.sync_type, SyncType::Incremental);
    assert_eq!(report.synced_count, 1);
    assert_eq!(cursor(&store).await, Some(HistoryId::new(135)));

    let thread = store.get_thread(ACCOUNT, "t1").await.unwrap().unwrap();
    let stored = store.get_message(ACCOUNT, "m4").await.unwrap().unwrap();
    assert_eq!(stored.thread_id, thread.id);
    // Participants are fixed when the thread is created
    assert!(!thread.participants.contains("m4@example.com"));
}

#[tokio::test]
async fn test_history_pages_are_followed() {
    let mailbox = FakeMailbox::with_messages(three_messages());
    let store = connected_store().await;
    let engine = engine(&mailbox, &store);
    engine.sync_for_account(ACCOUNT).await;

    mailbox.add_message(message("m4", "t3", 130, &["INBOX"]));
    mailbox.add_message(message("m5", "t3", 140, &["INBOX"]));
    mailbox.set_history(
        150,
        vec![vec![added("m4", "t3", 130)], vec![added("m5", "t3", 140)]],
    );

    let report = engine.sync_for_account(ACCOUNT).await;

    assert_eq!(report.synced_count, 2);
    assert_eq!(mailbox.state.lock().unwrap().history_calls, 2);
    assert_eq!(cursor(&store).await, Some(HistoryId::new(150)));
}

#[tokio::test]
async fn test_label_changes_update_read_state() {
    let mailbox = FakeMailbox::with_messages(three_messages());
    let store = connected_store().await;
    let engine = engine(&mailbox, &store);
    engine.sync_for_account(ACCOUNT).await;

    mailbox.set_history(
        130,
        vec![vec![
            unread_removed("m1", 121),
            unread_added("m2", 122),
            unread_removed("unknown", 123),
        ]],
    );

    let report = engine.sync_for_account(ACCOUNT).await;

    assert_eq!(report.sync_type, SyncType::Incremental);
    assert_eq!(report.label_update_count, 2);
    assert!(store.get_message(ACCOUNT, "m1").await.unwrap().unwrap().is_read);
    assert!(!store.get_message(ACCOUNT, "m2").await.unwrap().unwrap().is_read);
    assert!(store.get_message(ACCOUNT, "unknown").await.unwrap().is_none());

    // Replaying the same history leaves the same state
    let replay = engine.sync_for_account(ACCOUNT).await;
    assert!(replay.completed);
    assert!(store.get_message(ACCOUNT, "m1").await.unwrap().unwrap().is_read);
    assert!(!store.get_message(ACCOUNT, "m2").await.unwrap().unwrap().is_read);
}

#[tokio::test]
async fn test_last_label_event_wins() {
    let mailbox = FakeMailbox::with_messages(three_messages());
    let store = connected_store().await;
    let engine = engine(&mailbox, &store);
    engine.sync_for_account(ACCOUNT).await;

    mailbox.set_history(
        130,
        vec![vec![unread_removed("m3", 121)], vec![unread_added("m3", 125)]],
    );

    let report = engine.sync_for_account(ACCOUNT).await;

    assert_eq!(report.label_update_count, 1);
    assert!(!store.get_message(ACCOUNT, "m3").await.unwrap().unwrap().is_read);
}

#[tokio::test]
async fn test_expired_history_falls_back_to_full_sync() {
    let mailbox = FakeMailbox::with_messages(three_messages());
    let store = connected_store().await;
    let engine = engine(&mailbox, &store);
    engine.sync_for_account(ACCOUNT).await;

    mailbox.expire_history();
    mailbox.add_message(message("m4", "t4", 200, &["INBOX"]));

    let report = engine.sync_for_account(ACCOUNT).await;

    assert_eq!(report.sync_type, SyncType::Full);
    assert!(report.completed);
    assert_eq!(report.errors, [HISTORY_EXPIRED_NOTE]);
    assert_eq!(report.synced_count, 1);
    assert_eq!(report.skipped_count, 3);
    assert_eq!(store.count_messages(ACCOUNT).await.unwrap(), 4);
    assert_eq!(cursor(&store).await, Some(HistoryId::new(200)));
}

#[tokio::test]
async fn test_fetch_failure_is_recorded_and_skipped() {
    let mailbox = FakeMailbox::with_messages(three_messages());
    mailbox.fail_message("m2");
    let store = connected_store().await;
    let engine = engine(&mailbox, &store);

    let report = engine.sync_for_account(ACCOUNT).await;

    assert!(report.completed);
    assert_eq!(report.synced_count, 2);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("Failed to fetch message m2"));
    assert!(store.get_message(ACCOUNT, "m2").await.unwrap().is_none());
    assert_eq!(cursor(&store).await, Some(HistoryId::new(120)));
}

#[tokio::test]
async fn test_no_connection_makes_no_remote_calls() {
    let mailbox = FakeMailbox::with_messages(three_messages());
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let engine = engine(&mailbox, &store);

    let report = engine.sync_for_account(ACCOUNT).await;

    assert!(report.is_failure());
    assert_eq!(report.synced_count, 0);
    assert_eq!(
        report.errors,
        ["No active mailbox connection for account 1"]
    );
    assert_eq!(mailbox.remote_calls(), 0);
}

#[tokio::test]
async fn test_empty_mailbox_uses_profile_cursor() {
    let mailbox = FakeMailbox::with_messages(Vec::new());
    mailbox.state.lock().unwrap().profile_history = 77;
    let store = connected_store().await;
    let engine = engine(&mailbox, &store);

    let report = engine.sync_for_account(ACCOUNT).await;

    assert!(report.completed);
    assert_eq!(report.synced_count, 0);
    assert_eq!(cursor(&store).await, Some(HistoryId::new(77)));
}

#[tokio::test]
async fn test_cursor_never_moves_backwards() {
    let mailbox = FakeMailbox::with_messages(three_messages());
    let store = connected_store().await;
    let engine = engine(&mailbox, &store);
    engine.sync_for_account(ACCOUNT).await;

    mailbox.set_history(90, vec![vec![]]);
    let report = engine.sync_for_account(ACCOUNT).await;

    assert!(report.completed);
    assert_eq!(cursor(&store).await, Some(HistoryId::new(120)));
}

#[tokio::test]
async fn test_message_without_thread_gets_own_thread() {
    let mut lone = message("solo", "", 50, &["INBOX"]);
    lone.thread_id = None;
    let mailbox = FakeMailbox::with_messages(vec![lone]);
    let store = connected_store().await;
    let engine = engine(&mailbox, &store);

    let report = engine.sync_for_account(ACCOUNT).await;

    assert_eq!(report.synced_count, 1);
    assert!(store.get_thread(ACCOUNT, "solo").await.unwrap().is_some());
}

#[tokio::test]
async fn test_sync_status() {
    let mailbox = FakeMailbox::with_messages(three_messages());
    let empty = Arc::new(SqliteStore::in_memory().await.unwrap());
    let status = engine(&mailbox, &empty).sync_status(ACCOUNT).await.unwrap();
    assert!(!status.connected);
    assert!(status.connection_id.is_none());

    let store = connected_store().await;
    let engine = engine(&mailbox, &store);
    let before = engine.sync_status(ACCOUNT).await.unwrap();
    assert!(before.connected);
    assert_eq!(before.email.as_deref(), Some("me@example.com"));
    assert!(!before.full_sync_completed);
    assert!(before.last_synced_at.is_none());

    engine.sync_for_account(ACCOUNT).await;
    let after = engine.sync_status(ACCOUNT).await.unwrap();
    assert!(after.full_sync_completed);
    assert_eq!(after.last_sync_count, 3);
    assert_eq!(after.history_cursor, Some(HistoryId::new(120)));
    assert!(after.last_synced_at.is_some());
}

#[tokio::test]
async fn test_reconnect_starts_full_sync_again() {
    let mailbox = FakeMailbox::with_messages(three_messages());
    let store = connected_store().await;
    let engine = engine(&mailbox, &store);
    engine.sync_for_account(ACCOUNT).await;

    store
        .register_connection(ACCOUNT, Provider::Gmail, "me@example.com")
        .await
        .unwrap();
    let report = engine.sync_for_account(ACCOUNT).await;

    assert_eq!(report.sync_type, SyncType::Full);
    assert_eq!(report.synced_count, 0);
    assert_eq!(report.skipped_count, 3);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let mailbox = FakeMailbox::with_messages(Vec::new());
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());

    let result = SyncEngine::new(mailbox, store, SyncConfig::new().with_batch_size(0));
    assert!(result.is_err());
}

#[tokio::test]
async fn test_full_sync_window_bounds_import() {
    let messages = (0..53)
        .map(|i| message(&format!("m{i}"), &format!("t{i}"), 100 + i, &["INBOX"]))
        .collect();
    let mailbox = FakeMailbox::with_messages(messages);
    let store = connected_store().await;
    let config = SyncConfig::new()
        .with_full_sync_window(3)
        .with_batch_size(2);
    let engine = engine_with(&mailbox, &store, config);

    let report = engine.sync_for_account(ACCOUNT).await;

    assert!(report.completed);
    assert_eq!(report.synced_count, 3);
    assert_eq!(mailbox.state.lock().unwrap().get_calls, 3);
    assert_eq!(store.count_messages(ACCOUNT).await.unwrap(), 3);
    for id in ["m52", "m51", "m50"] {
        assert!(store.get_message(ACCOUNT, id).await.unwrap().is_some());
    }
    for i in 0..50 {
        let id = format!("m{i}");
        assert!(store.get_message(ACCOUNT, &id).await.unwrap().is_none());
    }
    assert_eq!(cursor(&store).await, Some(HistoryId::new(152)));
}

#[tokio::test]
async fn test_thread_spanning_batches_is_stored_once() {
    // Listed newest first: [m4, m3] then [m2, m1]; t1 appears in both batches
    let mailbox = FakeMailbox::with_messages(vec![
        message("m1", "t1", 100, &["INBOX"]),
        message("m2", "t1", 110, &["INBOX"]),
        message("m3", "t2", 115, &["INBOX"]),
        message("m4", "t1", 120, &["INBOX"]),
    ]);
    let store = connected_store().await;
    let engine = engine_with(&mailbox, &store, SyncConfig::new().with_batch_size(2));

    let report = engine.sync_for_account(ACCOUNT).await;

    assert!(report.completed);
    assert_eq!(report.synced_count, 4);
    assert_eq!(mailbox.state.lock().unwrap().get_calls, 4);

    let thread = store.get_thread(ACCOUNT, "t1").await.unwrap().unwrap();
    for id in ["m1", "m2", "m4"] {
        let stored = store.get_message(ACCOUNT, id).await.unwrap().unwrap();
        assert_eq!(stored.thread_id, thread.id);
    }
    // Created by the first batch, which only held m4
    assert!(thread.participants.contains("m4@example.com"));
    assert!(!thread.participants.contains("m1@example.com"));
}

#[tokio::test]
async fn test_thread_group_failure_does_not_stop_other_groups() {
    let mailbox = FakeMailbox::with_messages(three_messages());
    let store = flaky_store(Some("t1")).await;
    let engine = engine(&mailbox, &store);

    let report = engine.sync_for_account(ACCOUNT).await;

    assert!(report.completed);
    assert_eq!(report.synced_count, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("Failed to store thread t1: "));
    assert!(store.get_message(ACCOUNT, "m3").await.unwrap().is_some());
    assert!(store.get_message(ACCOUNT, "m1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_history_api_failure_does_not_fall_back() {
    let mailbox = FakeMailbox::with_messages(three_messages());
    let store = connected_store().await;
    let engine = engine(&mailbox, &store);
    engine.sync_for_account(ACCOUNT).await;

    mailbox.state.lock().unwrap().history_error = Some(RemoteError::Api {
        status: 500,
        message: "backend error".to_string(),
    });
    mailbox.add_message(message("m4", "t4", 200, &["INBOX"]));

    let report = engine.sync_for_account(ACCOUNT).await;

    assert_eq!(report.sync_type, SyncType::Incremental);
    assert!(report.is_failure());
    assert_eq!(report.synced_count, 0);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("status 500"));
    // No full listing was attempted
    assert_eq!(mailbox.state.lock().unwrap().list_calls, 1);
    assert!(store.get_message(ACCOUNT, "m4").await.unwrap().is_none());
    assert_eq!(cursor(&store).await, Some(HistoryId::new(120)));
}

#[tokio::test]
async fn test_label_write_failure_keeps_run_counts() {
    let mailbox = FakeMailbox::with_messages(three_messages());
    let store = flaky_store(None).await;
    let engine = engine(&mailbox, &store);
    engine.sync_for_account(ACCOUNT).await;

    mailbox.add_message(message("m4", "t1", 130, &["INBOX"]));
    mailbox.set_history(135, vec![vec![added("m4", "t1", 130), unread_removed("m1", 131)]]);
    store.fail_read_state.store(true, Ordering::SeqCst);

    let report = engine.sync_for_account(ACCOUNT).await;

    assert_eq!(report.sync_type, SyncType::Incremental);
    assert!(report.is_failure());
    assert_eq!(report.synced_count, 1);
    assert_eq!(report.label_update_count, 0);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("Failed to apply label changes: "));
    assert_eq!(store.count_messages(ACCOUNT).await.unwrap(), 4);
    // Cursor is held so the label history is replayed
    assert_eq!(cursor(&store.inner).await, Some(HistoryId::new(120)));

    store.fail_read_state.store(false, Ordering::SeqCst);
    let replay = engine.sync_for_account(ACCOUNT).await;

    assert!(replay.completed);
    assert_eq!(replay.synced_count, 0);
    assert_eq!(replay.skipped_count, 1);
    assert_eq!(replay.label_update_count, 1);
    assert!(store.get_message(ACCOUNT, "m1").await.unwrap().unwrap().is_read);
    assert_eq!(cursor(&store.inner).await, Some(HistoryId::new(135)));
}

#[tokio::test]
async fn test_incremental_fetch_failure_still_advances_cursor() {
    let mailbox = FakeMailbox::with_messages(three_messages());
    let store = connected_store().await;
    let engine = engine(&mailbox, &store);
    engine.sync_for_account(ACCOUNT).await;

    mailbox.add_message(message("m4", "t3", 130, &["INBOX"]));
    mailbox.add_message(message("m5", "t3", 140, &["INBOX"]));
    mailbox.fail_message("m4");
    mailbox.set_history(145, vec![vec![added("m4", "t3", 130), added("m5", "t3", 140)]]);

    let report = engine.sync_for_account(ACCOUNT).await;

    assert!(report.completed);
    assert_eq!(report.synced_count, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("Failed to fetch message m4"));
    assert!(store.get_message(ACCOUNT, "m4").await.unwrap().is_none());
    assert_eq!(cursor(&store).await, Some(HistoryId::new(145)));
}
