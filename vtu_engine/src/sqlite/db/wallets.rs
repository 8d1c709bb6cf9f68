use sqlx::SqliteConnection;
use vtu_common::Kobo;

use crate::{db_types::Wallet, traits::LedgerError};

pub async fn fetch_wallet(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<Wallet>, LedgerError> {
    let wallet =
        sqlx::query_as("SELECT * FROM wallets WHERE user_id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(wallet)
}

/// Credit the wallet, creating it on first credit (upsert). Always succeeds for a non-negative amount.
pub async fn upsert_credit(user_id: i64, amount: Kobo, conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
            INSERT INTO wallets (user_id, balance) VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
            SET balance = balance + excluded.balance, updated_at = CURRENT_TIMESTAMP;
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .execute(conn)
    .await?;
    Ok(())
}

/// Conditionally debit the wallet and bump `total_spent`. Returns `false` (and mutates nothing) if the balance
/// does not cover the amount, or the wallet does not exist. The balance check and the debit are one statement, so
/// concurrent debits cannot overdraw.
pub async fn debit_if_sufficient(
    user_id: i64,
    amount: Kobo,
    conn: &mut SqliteConnection,
) -> Result<bool, LedgerError> {
    let result = sqlx::query(
        r#"
            UPDATE wallets
            SET balance = balance - $1, total_spent = total_spent + $1, updated_at = CURRENT_TIMESTAMP
            WHERE user_id = $2 AND balance >= $1;
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Credit back a reversed purchase and roll `total_spent` back down.
pub async fn refund(user_id: i64, amount: Kobo, conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    let result = sqlx::query(
        r#"
            UPDATE wallets
            SET balance = balance + $1, total_spent = total_spent - $1, updated_at = CURRENT_TIMESTAMP
            WHERE user_id = $2;
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .execute(conn)
    .await?;
    if result.rows_affected() != 1 {
        return Err(LedgerError::WalletNotFound(user_id));
    }
    Ok(())
}
