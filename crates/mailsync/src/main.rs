//! `MailSync` - incremental Gmail sync into a local `SQLite` store.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod settings;
mod tokens;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mailsync_core::credentials::{delete_access_token, store_access_token};
use mailsync_core::store::SyncStateStore;
use mailsync_core::{AccountId, Provider, SqliteStore, SyncEngine};
use mailsync_gmail::GmailClient;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::Settings;
use tokens::KeyringTokens;

#[derive(Parser, Debug)]
#[command(name = "mailsync", version)]
#[command(about = "Incremental Gmail sync into a local SQLite store")]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Link a Gmail mailbox to an account
    Connect {
        /// Account that will own the synced mail
        #[arg(long)]
        account: i64,
        /// Mailbox address
        #[arg(long)]
        email: String,
        /// OAuth bearer token with Gmail read scope
        #[arg(long)]
        token: String,
    },
    /// Unlink the account's mailbox and forget its token
    Disconnect {
        #[arg(long)]
        account: i64,
    },
    /// Run one sync and print the report
    Sync {
        #[arg(long)]
        account: i64,
    },
    /// Print connection and cursor state
    Status {
        #[arg(long)]
        account: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr so stdout stays machine readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailsync=info,mailsync_core=info,mailsync_gmail=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings_path = cli.config.unwrap_or_else(Settings::default_path);
    let settings = Settings::load(&settings_path).await?;

    let db_path = settings.database_path().await?;
    let store = Arc::new(
        SqliteStore::new(&db_path.to_string_lossy())
            .await
            .with_context(|| format!("opening database {}", db_path.display()))?,
    );

    match cli.command {
        Command::Connect {
            account,
            email,
            token,
        } => {
            let account = AccountId::new(account);
            let connection = store
                .register_connection(account, Provider::Gmail, &email)
                .await?;
            let id = connection.id;
            tokio::task::spawn_blocking(move || store_access_token(id, &token)).await??;
            info!("Connected {email} to account {account} (connection {id})");
            print_json(&connection)?;
        }
        Command::Disconnect { account } => {
            let account = AccountId::new(account);
            let active = store.active_connection(account).await?;
            let deactivated = store.deactivate_connections(account).await?;
            if let Some(connection) = active {
                tokio::task::spawn_blocking(move || delete_access_token(connection.id)).await??;
            }
            info!("Deactivated {deactivated} connection(s) for account {account}");
        }
        Command::Sync { account } => {
            let engine = build_engine(&settings, Arc::clone(&store))?;
            let report = engine.sync_for_account(AccountId::new(account)).await;
            print_json(&report)?;
            if report.is_failure() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Status { account } => {
            let engine = build_engine(&settings, Arc::clone(&store))?;
            let status = engine.sync_status(AccountId::new(account)).await?;
            print_json(&status)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn build_engine(
    settings: &Settings,
    store: Arc<SqliteStore>,
) -> anyhow::Result<SyncEngine<GmailClient, SqliteStore>> {
    let mut client = GmailClient::new(Arc::new(KeyringTokens::new(Arc::clone(&store))));
    if let Some(base) = &settings.gmail_api_base {
        client = client.with_base_url(base);
    }

    SyncEngine::new(Arc::new(client), store, settings.sync.clone())
        .context("invalid sync configuration")
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
