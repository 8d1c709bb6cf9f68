use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;
use vtu_common::Kobo;

use crate::{
    db_types::{NewFunding, NewPurchase, Reference, Transaction, TxStatus, VirtualAccountCredit},
    traits::LedgerError,
};

/// Insert a new `Pending` funding row. The amount is the expected gross; it is replaced by the verified net at
/// finalization.
pub async fn insert_funding(funding: NewFunding, conn: &mut SqliteConnection) -> Result<Transaction, LedgerError> {
    let reference = funding.reference.clone();
    let tx: Transaction = sqlx::query_as(
        r#"
            INSERT INTO transactions (user_id, amount, tx_type, status, reference, provider, metadata)
            VALUES ($1, $2, 'Funding', 'Pending', $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(funding.user_id)
    .bind(funding.amount)
    .bind(funding.reference)
    .bind(funding.gateway)
    .bind(funding.metadata)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => LedgerError::ReferenceAlreadyExists(reference),
        _ => LedgerError::from(e),
    })?;
    debug!("🗃️ Funding [{}] recorded as pending with id {}", tx.reference, tx.id);
    Ok(tx)
}

/// Insert a new `Pending` purchase row. The wallet debit happens separately (same database transaction).
pub async fn insert_purchase(purchase: NewPurchase, conn: &mut SqliteConnection) -> Result<Transaction, LedgerError> {
    let reference = purchase.reference.clone();
    let tx: Transaction = sqlx::query_as(
        r#"
            INSERT INTO transactions (user_id, amount, tx_type, status, reference, provider, metadata)
            VALUES ($1, $2, $3, 'Pending', $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(purchase.user_id)
    .bind(purchase.amount)
    .bind(purchase.tx_type)
    .bind(purchase.reference)
    .bind(purchase.provider)
    .bind(purchase.metadata)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => LedgerError::ReferenceAlreadyExists(reference),
        _ => LedgerError::from(e),
    })?;
    debug!("🗃️ Purchase [{}] recorded as pending with id {}", tx.reference, tx.id);
    Ok(tx)
}

/// Insert a dedicated-account inflow directly in `Success` state. Returns `None` when the unique constraint on the
/// derived reference (or the provider reference) fires, i.e. the transfer was already processed. This is the
/// "unique constraint as lock" finalization strategy.
pub async fn insert_va_credit(
    credit: &VirtualAccountCredit,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, LedgerError> {
    let reference = credit.derived_reference();
    let fee = credit.gross - credit.net;
    let result = sqlx::query_as(
        r#"
            INSERT INTO transactions
                (user_id, amount, fee, tx_type, status, reference, provider, provider_reference, provider_status, metadata)
            VALUES ($1, $2, $3, 'Funding', 'Success', $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(credit.user_id)
    .bind(credit.net)
    .bind(fee)
    .bind(reference)
    .bind(&credit.gateway)
    .bind(&credit.provider_id)
    .bind(&credit.provider_status)
    .bind(&credit.metadata)
    .fetch_one(conn)
    .await;
    match result {
        Ok(tx) => Ok(Some(tx)),
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Move a `Pending` funding row to `Success`, replacing the expected amount with the verified net and recording
/// the fee. Returns `None` if the row was not in `Pending` state (another finalizer won) or does not exist; the
/// caller disambiguates with [`fetch_by_reference`].
pub async fn finalize_funding_success(
    reference: &Reference,
    net: Kobo,
    fee: Kobo,
    provider_reference: Option<&str>,
    provider_status: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, LedgerError> {
    let tx = sqlx::query_as(
        r#"
            UPDATE transactions
            SET status = 'Success',
                amount = $1,
                fee = $2,
                provider_reference = COALESCE($3, provider_reference),
                provider_status = COALESCE($4, provider_status),
                updated_at = CURRENT_TIMESTAMP
            WHERE reference = $5 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(net)
    .bind(fee)
    .bind(provider_reference)
    .bind(provider_status)
    .bind(reference)
    .fetch_optional(conn)
    .await?;
    Ok(tx)
}

/// Move a `Pending` row to the given terminal status without touching amounts. Used for purchase finalization,
/// reversals and abandoned-funding failure. Same conditional-update contract as [`finalize_funding_success`].
pub async fn finalize_status(
    reference: &Reference,
    status: TxStatus,
    provider_reference: Option<&str>,
    provider_status: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, LedgerError> {
    if !status.is_terminal() {
        return Err(LedgerError::IllegalStatusTransition(format!(
            "Cannot finalize {reference} to non-terminal status {status}"
        )));
    }
    let tx = sqlx::query_as(
        r#"
            UPDATE transactions
            SET status = $1,
                provider_reference = COALESCE($2, provider_reference),
                provider_status = COALESCE($3, provider_status),
                updated_at = CURRENT_TIMESTAMP
            WHERE reference = $4 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(provider_reference)
    .bind(provider_status)
    .bind(reference)
    .fetch_optional(conn)
    .await?;
    Ok(tx)
}

/// Record the upstream order id on a still-pending row. Not a status change.
pub async fn record_provider_reference(
    reference: &Reference,
    provider_reference: &str,
    provider_status: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
            UPDATE transactions
            SET provider_reference = $1,
                provider_status = COALESCE($2, provider_status),
                updated_at = CURRENT_TIMESTAMP
            WHERE reference = $3 AND status = 'Pending';
        "#,
    )
    .bind(provider_reference)
    .bind(provider_status)
    .bind(reference)
    .execute(conn)
    .await?;
    Ok(())
}

/// Merge the delivered token into the row metadata.
pub async fn attach_delivered_token(
    reference: &Reference,
    token: &str,
    conn: &mut SqliteConnection,
) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
            UPDATE transactions
            SET metadata = json_set(metadata, '$.delivered_token', $1), updated_at = CURRENT_TIMESTAMP
            WHERE reference = $2;
        "#,
    )
    .bind(token)
    .bind(reference)
    .execute(conn)
    .await?;
    Ok(())
}

/// Flip a reversed purchase back to `Success`. Conditional on the row still being `Reversed`, so a concurrent
/// correction attempt cannot apply twice. Part of the audited refund-correction path.
pub async fn reopen_refunded_as_success(
    reference: &Reference,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, LedgerError> {
    let tx = sqlx::query_as(
        r#"
            UPDATE transactions
            SET status = 'Success',
                metadata = json_set(metadata, '$.refund_corrected', 1),
                updated_at = CURRENT_TIMESTAMP
            WHERE reference = $1 AND status = 'Reversed'
            RETURNING *;
        "#,
    )
    .bind(reference)
    .fetch_optional(conn)
    .await?;
    Ok(tx)
}

/// Insert the compensating debit record for a refund correction.
pub async fn insert_compensation(
    original: &Transaction,
    conn: &mut SqliteConnection,
) -> Result<Transaction, LedgerError> {
    let reference = Reference(format!("COR-{}", original.reference));
    let metadata = serde_json::json!({ "corrects": original.reference.as_str() });
    let tx = sqlx::query_as(
        r#"
            INSERT INTO transactions (user_id, amount, tx_type, status, reference, provider, provider_status, metadata)
            VALUES ($1, $2, $3, 'Success', $4, $5, 'refund-correction', $6)
            RETURNING *;
        "#,
    )
    .bind(original.user_id)
    .bind(original.amount)
    .bind(original.tx_type)
    .bind(&reference)
    .bind(&original.provider)
    .bind(metadata)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => LedgerError::ReferenceAlreadyExists(reference),
        _ => LedgerError::from(e),
    })?;
    Ok(tx)
}

pub async fn fetch_by_reference(
    reference: &Reference,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, LedgerError> {
    let tx = sqlx::query_as("SELECT * FROM transactions WHERE reference = $1")
        .bind(reference)
        .fetch_optional(conn)
        .await?;
    Ok(tx)
}

/// All `Pending` rows created before the cutoff, oldest first. The sweep's work queue; `limit` bounds upstream
/// call volume per run.
pub async fn fetch_stale_pending(
    cutoff: DateTime<Utc>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, LedgerError> {
    let rows = sqlx::query_as(
        r#"
            SELECT * FROM transactions
            WHERE status = 'Pending' AND created_at < $1
            ORDER BY created_at ASC
            LIMIT $2;
        "#,
    )
    .bind(cutoff)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn history(
    user_id: i64,
    offset: i64,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, LedgerError> {
    let rows = sqlx::query_as(
        r#"
            SELECT * FROM transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3;
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
