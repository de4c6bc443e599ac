//! SQLite persistence for the screening pipeline.
//!
//! Repositories operate on `&mut SqliteConnection` so a caller can run a
//! whole ingestion on one transaction handle and commit once.

pub mod repos;

pub use repos::*;

use screening_core::ScreeningResult;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Connection pool plus schema bootstrap.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Connect to the given SQLite database, creating the file if missing.
    pub async fn connect(database_url: &str) -> ScreeningResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Ok(Self { pool })
    }

    /// In-memory store for tests. Single connection so the database
    /// lives as long as the pool.
    pub async fn in_memory() -> ScreeningResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.init_tables().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin(&self) -> ScreeningResult<sqlx::Transaction<'_, sqlx::Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Create all tables the core reads and writes.
    pub async fn init_tables(&self) -> ScreeningResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                risk_score REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                from_account TEXT NOT NULL,
                to_account TEXT NOT NULL,
                amount REAL NOT NULL,
                timestamp TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'processed'
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS account_links (
                id TEXT PRIMARY KEY,
                account_a TEXT NOT NULL,
                account_b TEXT NOT NULL,
                link_strength INTEGER NOT NULL DEFAULT 1,
                UNIQUE(account_a, account_b)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS alerts (
                id TEXT PRIMARY KEY,
                transaction_id TEXT NOT NULL,
                rule_triggered TEXT NOT NULL,
                severity TEXT NOT NULL,
                reason TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS risk_audits (
                id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL,
                old_score REAL NOT NULL,
                new_score REAL NOT NULL,
                reason TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS txn_queue (
                id TEXT PRIMARY KEY,
                txn_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                retries INTEGER NOT NULL DEFAULT 0,
                lease_expires_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        tracing::debug!("screening schema ready");
        Ok(())
    }
}
