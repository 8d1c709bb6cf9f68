use sqlx::SqliteConnection;

use crate::{
    db_types::{NewVirtualAccount, VirtualAccount},
    traits::LedgerError,
};

/// Insert the gateway-assigned dedicated account, or return the existing row if the account reference is already
/// on file. Idempotent so a retried "create account" flow never duplicates the mapping.
pub async fn idempotent_insert(
    account: NewVirtualAccount,
    conn: &mut SqliteConnection,
) -> Result<VirtualAccount, LedgerError> {
    let existing = fetch_by_reference(&account.account_reference, &mut *conn).await?;
    if let Some(existing) = existing {
        return Ok(existing);
    }
    let row = sqlx::query_as(
        r#"
            INSERT INTO virtual_accounts (user_id, provider, account_reference, account_number, bank_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(account.user_id)
    .bind(account.provider)
    .bind(account.account_reference)
    .bind(account.account_number)
    .bind(account.bank_name)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn fetch_by_reference(
    account_reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<VirtualAccount>, LedgerError> {
    let row = sqlx::query_as("SELECT * FROM virtual_accounts WHERE account_reference = $1")
        .bind(account_reference)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}
