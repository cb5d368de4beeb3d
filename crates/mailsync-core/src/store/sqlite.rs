//! `SQLite` storage for synced mail.

use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::debug;

use super::model::{MessageId, NewMessage, NewThread, StoredMessage, SyncState, Thread, ThreadId};
use super::{MessageStore, SyncStateStore, ThreadStore};
use crate::Result;
use crate::account::{AccountId, Connection, ConnectionId, Provider};

/// Upper bound on ids bound into a single `IN (...)` clause.
const MAX_IDS_PER_QUERY: usize = 500;

/// Repository holding threads, messages, connections and sync state.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the store at the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        // A single long-lived connection: each in-memory connection is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS connections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                provider TEXT NOT NULL,
                email TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS sync_states (
                connection_id INTEGER PRIMARY KEY REFERENCES connections(id),
                history_cursor TEXT,
                full_sync_completed INTEGER NOT NULL DEFAULT 0,
                last_synced_at TEXT,
                last_sync_count INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS threads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                remote_thread_id TEXT NOT NULL,
                channel TEXT NOT NULL,
                subject TEXT NOT NULL DEFAULT '',
                participants TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                UNIQUE(owner_id, remote_thread_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                thread_id INTEGER NOT NULL REFERENCES threads(id),
                remote_message_id TEXT NOT NULL,
                subject TEXT NOT NULL DEFAULT '',
                body_text TEXT,
                body_html TEXT,
                snippet TEXT NOT NULL DEFAULT '',
                from_email TEXT NOT NULL DEFAULT '',
                from_name TEXT,
                to_emails TEXT NOT NULL DEFAULT '[]',
                cc_emails TEXT NOT NULL DEFAULT '[]',
                sent_at TEXT NOT NULL,
                is_inbound INTEGER NOT NULL DEFAULT 1,
                is_read INTEGER NOT NULL DEFAULT 0,
                has_attachments INTEGER NOT NULL DEFAULT 0,
                labels TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                UNIQUE(owner_id, remote_message_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_messages_thread
            ON messages(thread_id)
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_connections_account
            ON connections(account_id, is_active)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ThreadStore for SqliteStore {
    async fn find_or_create_thread(&self, thread: &NewThread) -> Result<Thread> {
        let participants = serde_json::to_string(&thread.participants)?;

        let inserted = sqlx::query(
            r"
            INSERT INTO threads
                (owner_id, remote_thread_id, channel, subject, participants, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(owner_id, remote_thread_id) DO NOTHING
            ",
        )
        .bind(thread.owner.0)
        .bind(&thread.remote_thread_id)
        .bind(&thread.channel)
        .bind(&thread.subject)
        .bind(&participants)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            debug!(
                "Created thread {} for account {}",
                thread.remote_thread_id, thread.owner
            );
        }

        let row = sqlx::query(
            r"
            SELECT id, owner_id, remote_thread_id, channel, subject, participants, created_at
            FROM threads
            WHERE owner_id = ? AND remote_thread_id = ?
            ",
        )
        .bind(thread.owner.0)
        .bind(&thread.remote_thread_id)
        .fetch_one(&self.pool)
        .await?;

        row_to_thread(&row)
    }

    async fn get_thread(&self, owner: AccountId, remote_thread_id: &str) -> Result<Option<Thread>> {
        let row = sqlx::query(
            r"
            SELECT id, owner_id, remote_thread_id, channel, subject, participants, created_at
            FROM threads
            WHERE owner_id = ? AND remote_thread_id = ?
            ",
        )
        .bind(owner.0)
        .bind(remote_thread_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_thread).transpose()
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn message_exists(&self, owner: AccountId, remote_message_id: &str) -> Result<bool> {
        let row = sqlx::query(
            r"
            SELECT 1 FROM messages
            WHERE owner_id = ? AND remote_message_id = ?
            LIMIT 1
            ",
        )
        .bind(owner.0)
        .bind(remote_message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn existing_message_ids(
        &self,
        owner: AccountId,
        remote_message_ids: &[String],
    ) -> Result<HashSet<String>> {
        let mut existing = HashSet::new();

        for chunk in remote_message_ids.chunks(MAX_IDS_PER_QUERY) {
            let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
                "SELECT remote_message_id FROM messages WHERE owner_id = ",
            );
            query.push_bind(owner.0);
            query.push(" AND remote_message_id IN (");
            {
                let mut ids = query.separated(", ");
                for id in chunk {
                    ids.push_bind(id.as_str());
                }
            }
            query.push(")");

            let rows = query.build().fetch_all(&self.pool).await?;
            existing.extend(rows.iter().map(|row| row.get::<String, _>("remote_message_id")));
        }

        Ok(existing)
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<bool> {
        let to = serde_json::to_string(&message.to)?;
        let cc = serde_json::to_string(&message.cc)?;
        let labels = serde_json::to_string(&message.labels)?;

        let result = sqlx::query(
            r"
            INSERT INTO messages
                (owner_id, thread_id, remote_message_id, subject, body_text, body_html,
                 snippet, from_email, from_name, to_emails, cc_emails, sent_at,
                 is_inbound, is_read, has_attachments, labels, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(owner_id, remote_message_id) DO NOTHING
            ",
        )
        .bind(message.owner.0)
        .bind(message.thread_id.0)
        .bind(&message.remote_message_id)
        .bind(&message.subject)
        .bind(&message.body_text)
        .bind(&message.body_html)
        .bind(&message.snippet)
        .bind(&message.from_email)
        .bind(&message.from_name)
        .bind(&to)
        .bind(&cc)
        .bind(message.sent_at.to_rfc3339())
        .bind(message.is_inbound)
        .bind(message.is_read)
        .bind(message.has_attachments)
        .bind(&labels)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_read_state(
        &self,
        owner: AccountId,
        remote_message_ids: &[String],
        is_read: bool,
    ) -> Result<u64> {
        let mut matched = 0;

        for chunk in remote_message_ids.chunks(MAX_IDS_PER_QUERY) {
            let mut query: QueryBuilder<'_, Sqlite> =
                QueryBuilder::new("UPDATE messages SET is_read = ");
            query.push_bind(is_read);
            query.push(" WHERE owner_id = ");
            query.push_bind(owner.0);
            query.push(" AND remote_message_id IN (");
            {
                let mut ids = query.separated(", ");
                for id in chunk {
                    ids.push_bind(id.as_str());
                }
            }
            query.push(")");

            matched += query.build().execute(&self.pool).await?.rows_affected();
        }

        Ok(matched)
    }

    async fn get_message(
        &self,
        owner: AccountId,
        remote_message_id: &str,
    ) -> Result<Option<StoredMessage>> {
        let row = sqlx::query(
            r"
            SELECT id, owner_id, thread_id, remote_message_id, subject, body_text, body_html,
                   snippet, from_email, from_name, to_emails, cc_emails, sent_at,
                   is_inbound, is_read, has_attachments, labels
            FROM messages
            WHERE owner_id = ? AND remote_message_id = ?
            ",
        )
        .bind(owner.0)
        .bind(remote_message_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_message).transpose()
    }

    async fn count_messages(&self, owner: AccountId) -> Result<u64> {
        let row = sqlx::query(r"SELECT COUNT(*) AS count FROM messages WHERE owner_id = ?")
            .bind(owner.0)
            .fetch_one(&self.pool)
            .await?;

        let count: i64 = row.get("count");
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

#[async_trait]
impl SyncStateStore for SqliteStore {
    async fn active_connection(&self, account: AccountId) -> Result<Option<Connection>> {
        let row = sqlx::query(
            r"
            SELECT id, account_id, provider, email, is_active, created_at
            FROM connections
            WHERE account_id = ? AND is_active = 1
            ORDER BY id DESC
            LIMIT 1
            ",
        )
        .bind(account.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_connection))
    }

    async fn register_connection(
        &self,
        account: AccountId,
        provider: Provider,
        email: &str,
    ) -> Result<Connection> {
        let created_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE connections SET is_active = 0 WHERE account_id = ?")
            .bind(account.0)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            r"
            INSERT INTO connections (account_id, provider, email, is_active, created_at)
            VALUES (?, ?, ?, 1, ?)
            ",
        )
        .bind(account.0)
        .bind(provider.as_str())
        .bind(email)
        .bind(created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let connection = Connection {
            id: ConnectionId(result.last_insert_rowid()),
            account_id: account,
            provider,
            email: email.to_string(),
            is_active: true,
            created_at,
        };
        debug!(
            "Registered connection {} for account {}",
            connection.id, account
        );
        Ok(connection)
    }

    async fn deactivate_connections(&self, account: AccountId) -> Result<u64> {
        let result =
            sqlx::query("UPDATE connections SET is_active = 0 WHERE account_id = ? AND is_active = 1")
                .bind(account.0)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    async fn load_sync_state(&self, connection: ConnectionId) -> Result<Option<SyncState>> {
        let row = sqlx::query(
            r"
            SELECT connection_id, history_cursor, full_sync_completed,
                   last_synced_at, last_sync_count
            FROM sync_states
            WHERE connection_id = ?
            ",
        )
        .bind(connection.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_sync_state))
    }

    async fn save_sync_state(&self, state: &SyncState) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO sync_states
                (connection_id, history_cursor, full_sync_completed,
                 last_synced_at, last_sync_count, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(connection_id) DO UPDATE SET
                history_cursor = excluded.history_cursor,
                full_sync_completed = excluded.full_sync_completed,
                last_synced_at = excluded.last_synced_at,
                last_sync_count = excluded.last_sync_count,
                updated_at = excluded.updated_at
            ",
        )
        .bind(state.connection_id.0)
        .bind(state.history_cursor.map(|c| c.to_string()))
        .bind(state.full_sync_completed)
        .bind(state.last_synced_at.map(|t| t.to_rfc3339()))
        .bind(i64::try_from(state.last_sync_count).unwrap_or(i64::MAX))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}

fn row_to_thread(row: &SqliteRow) -> Result<Thread> {
    let participants: String = row.get("participants");
    let created_at: String = row.get("created_at");

    Ok(Thread {
        id: ThreadId(row.get("id")),
        owner: AccountId(row.get("owner_id")),
        remote_thread_id: row.get("remote_thread_id"),
        channel: row.get("channel"),
        subject: row.get("subject"),
        participants: serde_json::from_str::<BTreeSet<String>>(&participants)?,
        created_at: parse_timestamp(&created_at),
    })
}

fn row_to_message(row: &SqliteRow) -> Result<StoredMessage> {
    let to: String = row.get("to_emails");
    let cc: String = row.get("cc_emails");
    let labels: String = row.get("labels");
    let sent_at: String = row.get("sent_at");

    Ok(StoredMessage {
        id: MessageId(row.get("id")),
        owner: AccountId(row.get("owner_id")),
        thread_id: ThreadId(row.get("thread_id")),
        remote_message_id: row.get("remote_message_id"),
        subject: row.get("subject"),
        body_text: row.get("body_text"),
        body_html: row.get("body_html"),
        snippet: row.get("snippet"),
        from_email: row.get("from_email"),
        from_name: row.get("from_name"),
        to: serde_json::from_str(&to)?,
        cc: serde_json::from_str(&cc)?,
        sent_at: parse_timestamp(&sent_at),
        is_inbound: row.get::<bool, _>("is_inbound"),
        is_read: row.get::<bool, _>("is_read"),
        has_attachments: row.get::<bool, _>("has_attachments"),
        labels: serde_json::from_str(&labels)?,
    })
}

fn row_to_connection(row: &SqliteRow) -> Connection {
    let provider: String = row.get("provider");
    let created_at: String = row.get("created_at");

    Connection {
        id: ConnectionId(row.get("id")),
        account_id: AccountId(row.get("account_id")),
        provider: Provider::parse(&provider).unwrap_or_default(),
        email: row.get("email"),
        is_active: row.get::<bool, _>("is_active"),
        created_at: parse_timestamp(&created_at),
    }
}

fn row_to_sync_state(row: &SqliteRow) -> SyncState {
    let cursor: Option<String> = row.get("history_cursor");
    let last_synced_at: Option<String> = row.get("last_synced_at");
    let last_sync_count: i64 = row.get("last_sync_count");

    SyncState {
        connection_id: ConnectionId(row.get("connection_id")),
        history_cursor: cursor.and_then(|c| c.parse().ok()),
        full_sync_completed: row.get::<bool, _>("full_sync_completed"),
        last_synced_at: last_synced_at.as_deref().map(parse_timestamp),
        last_sync_count: u64::try_from(last_sync_count).unwrap_or_default(),
    }
}
