//! # SQLite database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool, or create an atomic transaction
//! as the need arises and call through to the functions without any other changes.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod pins;
pub mod transactions;
pub mod virtual_accounts;
pub mod wallets;

const SQLITE_DB_URL: &str = "sqlite://data/vtu_ledger.db";

pub fn db_url() -> String {
    let result = env::var("VTU_DATABASE_URL").unwrap_or_else(|_| {
        info!("VTU_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

/// Create the ledger tables if they do not exist. Run once at startup (and by the test harness against in-memory
/// databases).
pub async fn create_schema(pool: &SqlitePool) -> Result<(), SqlxError> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS wallets (
        user_id       INTEGER PRIMARY KEY,
        balance       INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0),
        total_spent   INTEGER NOT NULL DEFAULT 0,
        bonus_balance INTEGER NOT NULL DEFAULT 0,
        created_at    TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at    TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS transactions (
        id                 INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id            INTEGER NOT NULL,
        amount             INTEGER NOT NULL,
        fee                INTEGER NOT NULL DEFAULT 0,
        tx_type            TEXT NOT NULL,
        status             TEXT NOT NULL DEFAULT 'Pending',
        reference          TEXT NOT NULL UNIQUE,
        provider           TEXT,
        provider_reference TEXT UNIQUE,
        provider_status    TEXT,
        metadata           TEXT NOT NULL DEFAULT '{}',
        created_at         TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at         TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS transactions_status_created ON transactions (status, created_at);
    CREATE INDEX IF NOT EXISTS transactions_user_created ON transactions (user_id, created_at DESC);

    CREATE TABLE IF NOT EXISTS recharge_pins (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        transaction_id INTEGER NOT NULL REFERENCES transactions (id),
        network        TEXT NOT NULL,
        denomination   INTEGER NOT NULL,
        pin            TEXT NOT NULL,
        serial         TEXT NOT NULL,
        created_at     TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS recharge_pins_tx ON recharge_pins (transaction_id);

    CREATE TABLE IF NOT EXISTS virtual_accounts (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id           INTEGER NOT NULL,
        provider          TEXT NOT NULL,
        account_reference TEXT NOT NULL UNIQUE,
        account_number    TEXT NOT NULL,
        bank_name         TEXT NOT NULL,
        created_at        TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS virtual_accounts_user ON virtual_accounts (user_id);
"#;
