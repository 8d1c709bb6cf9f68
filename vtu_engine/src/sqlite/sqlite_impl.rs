//! `SqliteDatabase` is the concrete SQLite implementation of [`LedgerDatabase`].
//!
//! Every mutation that spans the transactions table and the wallets table runs inside a single sqlx transaction,
//! so a crash between the two writes cannot leave a partially applied ledger state. Finalization uses conditional
//! updates scoped to "status is still Pending" (or the unique constraint on the derived reference, for
//! dedicated-account inflows), which is what makes the webhook path, the sweep and the status check safe to race.
use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use sqlx::SqlitePool;
use vtu_common::Kobo;

use super::db::{db_url, new_pool, pins, transactions, virtual_accounts, wallets};
use crate::{
    db_types::{
        NewFunding,
        NewPurchase,
        NewRechargePin,
        NewVirtualAccount,
        RechargePin,
        Reference,
        Transaction,
        TxStatus,
        TxType,
        VirtualAccount,
        VirtualAccountCredit,
        Wallet,
    },
    traits::{FinalizeOutcome, LedgerDatabase, LedgerError, RedebitOutcome},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl LedgerDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_funding(&self, funding: NewFunding) -> Result<Transaction, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::insert_funding(funding, &mut conn).await
    }

    async fn credit_funding(
        &self,
        reference: &Reference,
        gross: Kobo,
        net: Kobo,
        provider_reference: Option<&str>,
        provider_status: Option<&str>,
    ) -> Result<FinalizeOutcome, LedgerError> {
        let fee = gross - net;
        let mut tx = self.pool.begin().await?;
        let updated =
            transactions::finalize_funding_success(reference, net, fee, provider_reference, provider_status, &mut tx)
                .await?;
        let row = match updated {
            Some(row) => row,
            None => {
                // Lost the race, or the reference is unknown. Nothing was changed; just report which.
                let existing = transactions::fetch_by_reference(reference, &mut tx).await?;
                tx.rollback().await?;
                return Ok(match existing {
                    Some(_) => FinalizeOutcome::AlreadyFinalized,
                    None => FinalizeOutcome::NotFound,
                });
            },
        };
        wallets::upsert_credit(row.user_id, net, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Funding [{reference}] finalized. {net} credited to wallet of user {}", row.user_id);
        Ok(FinalizeOutcome::Finalized(row))
    }

    async fn credit_virtual_account(&self, credit: VirtualAccountCredit) -> Result<FinalizeOutcome, LedgerError> {
        let reference = credit.derived_reference();
        let mut tx = self.pool.begin().await?;
        let inserted = transactions::insert_va_credit(&credit, &mut tx).await?;
        let row = match inserted {
            Some(row) => row,
            None => {
                tx.rollback().await?;
                debug!("🗃️ Transfer [{reference}] was already processed. Duplicate suppressed.");
                return Ok(FinalizeOutcome::AlreadyFinalized);
            },
        };
        wallets::upsert_credit(credit.user_id, credit.net, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Transfer [{reference}] credited {} to wallet of user {}", credit.net, credit.user_id);
        Ok(FinalizeOutcome::Finalized(row))
    }

    async fn fail_funding(
        &self,
        reference: &Reference,
        provider_status: Option<&str>,
    ) -> Result<FinalizeOutcome, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let updated =
            transactions::finalize_status(reference, TxStatus::Failed, None, provider_status, &mut conn).await?;
        match updated {
            Some(row) => {
                debug!("🗃️ Funding [{reference}] marked as failed. No money was collected.");
                Ok(FinalizeOutcome::Finalized(row))
            },
            None => match transactions::fetch_by_reference(reference, &mut conn).await? {
                Some(_) => Ok(FinalizeOutcome::AlreadyFinalized),
                None => Ok(FinalizeOutcome::NotFound),
            },
        }
    }

    async fn debit_for_purchase(&self, purchase: NewPurchase) -> Result<Transaction, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let debited = wallets::debit_if_sufficient(purchase.user_id, purchase.amount, &mut tx).await?;
        if !debited {
            // Disambiguate "no wallet" from "not enough money". Either way, nothing was mutated.
            let wallet = wallets::fetch_wallet(purchase.user_id, &mut tx).await?;
            tx.rollback().await?;
            return Err(match wallet {
                Some(_) => LedgerError::InsufficientBalance,
                None => LedgerError::WalletNotFound(purchase.user_id),
            });
        }
        let row = transactions::insert_purchase(purchase, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Purchase [{}] debited {} from wallet of user {}", row.reference, row.amount, row.user_id);
        Ok(row)
    }

    async fn finalize_purchase(
        &self,
        reference: &Reference,
        provider_reference: Option<&str>,
        provider_status: Option<&str>,
        delivered_token: Option<&str>,
    ) -> Result<FinalizeOutcome, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let updated =
            transactions::finalize_status(reference, TxStatus::Success, provider_reference, provider_status, &mut tx)
                .await?;
        let mut row = match updated {
            Some(row) => row,
            None => {
                let existing = transactions::fetch_by_reference(reference, &mut tx).await?;
                tx.rollback().await?;
                return Ok(match existing {
                    Some(_) => FinalizeOutcome::AlreadyFinalized,
                    None => FinalizeOutcome::NotFound,
                });
            },
        };
        if let Some(token) = delivered_token {
            transactions::attach_delivered_token(reference, token, &mut tx).await?;
            row.metadata["delivered_token"] = serde_json::Value::String(token.to_string());
        }
        tx.commit().await?;
        debug!("🗃️ Purchase [{reference}] finalized as delivered.");
        Ok(FinalizeOutcome::Finalized(row))
    }

    async fn reverse_purchase(
        &self,
        reference: &Reference,
        provider_status: Option<&str>,
    ) -> Result<FinalizeOutcome, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let updated =
            transactions::finalize_status(reference, TxStatus::Reversed, None, provider_status, &mut tx).await?;
        let row = match updated {
            Some(row) => row,
            None => {
                let existing = transactions::fetch_by_reference(reference, &mut tx).await?;
                tx.rollback().await?;
                return Ok(match existing {
                    Some(_) => FinalizeOutcome::AlreadyFinalized,
                    None => FinalizeOutcome::NotFound,
                });
            },
        };
        if row.tx_type.is_funding() {
            tx.rollback().await?;
            return Err(LedgerError::IllegalStatusTransition(format!(
                "Funding [{reference}] cannot be reversed; use fail_funding"
            )));
        }
        wallets::refund(row.user_id, row.amount, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Purchase [{reference}] reversed. {} refunded to wallet of user {}", row.amount, row.user_id);
        Ok(FinalizeOutcome::Finalized(row))
    }

    async fn redebit_corrected_purchase(
        &self,
        reference: &Reference,
        window: Duration,
    ) -> Result<RedebitOutcome, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let row = match transactions::fetch_by_reference(reference, &mut tx).await? {
            Some(row) => row,
            None => return Err(LedgerError::TransactionNotFound(reference.clone())),
        };
        let correctable = row.status == TxStatus::Reversed
            && row.tx_type != TxType::Funding
            && Utc::now() - row.updated_at <= window;
        if !correctable {
            tx.rollback().await?;
            info!(
                "🗃️ Refund correction for [{reference}] declined: status {} updated at {}",
                row.status, row.updated_at
            );
            return Ok(RedebitOutcome::NotCorrectable);
        }
        let debited = wallets::debit_if_sufficient(row.user_id, row.amount, &mut tx).await?;
        if !debited {
            tx.rollback().await?;
            warn!(
                "🗃️ Refund correction for [{reference}] needs {} but the wallet no longer covers it. Flagging for \
                 manual handling.",
                row.amount
            );
            return Ok(RedebitOutcome::InsufficientBalance);
        }
        let original = match transactions::reopen_refunded_as_success(reference, &mut tx).await? {
            Some(original) => original,
            None => {
                // A concurrent corrector got here first; the conditional update saw a non-Reversed status.
                tx.rollback().await?;
                return Ok(RedebitOutcome::NotCorrectable);
            },
        };
        let compensation = transactions::insert_compensation(&original, &mut tx).await?;
        tx.commit().await?;
        info!(
            "🗃️ Refund correction applied for [{reference}]: re-debited {} as [{}]",
            original.amount, compensation.reference
        );
        Ok(RedebitOutcome::Corrected { original, compensation })
    }

    async fn record_provider_reference(
        &self,
        reference: &Reference,
        provider_reference: &str,
        provider_status: Option<&str>,
    ) -> Result<(), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::record_provider_reference(reference, provider_reference, provider_status, &mut conn).await
    }

    async fn store_pins(&self, transaction_id: i64, new_pins: &[NewRechargePin]) -> Result<Vec<RechargePin>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let stored = pins::insert_pins(transaction_id, new_pins, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ {} pins stored for transaction {transaction_id}", stored.len());
        Ok(stored)
    }

    async fn fetch_transaction(&self, reference: &Reference) -> Result<Option<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_by_reference(reference, &mut conn).await
    }

    async fn fetch_stale_pending(&self, cutoff: DateTime<Utc>, limit: i64) -> Result<Vec<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_stale_pending(cutoff, limit, &mut conn).await
    }

    async fn fetch_wallet(&self, user_id: i64) -> Result<Option<Wallet>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        wallets::fetch_wallet(user_id, &mut conn).await
    }

    async fn history(&self, user_id: i64, offset: i64, limit: i64) -> Result<Vec<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::history(user_id, offset, limit, &mut conn).await
    }

    async fn fetch_pins(&self, transaction_id: i64) -> Result<Vec<RechargePin>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        pins::fetch_pins(transaction_id, &mut conn).await
    }

    async fn save_virtual_account(&self, account: NewVirtualAccount) -> Result<VirtualAccount, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        virtual_accounts::idempotent_insert(account, &mut conn).await
    }

    async fn virtual_account_owner(&self, account_reference: &str) -> Result<Option<VirtualAccount>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        virtual_accounts::fetch_by_reference(account_reference, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), LedgerError> {
        self.pool.close().await;
        Ok(())
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using `VTU_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        super::db::create_schema(&pool).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
