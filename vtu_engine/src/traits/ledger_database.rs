use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use vtu_common::Kobo;

use crate::{
    db_types::{
        NewFunding,
        NewPurchase,
        NewRechargePin,
        NewVirtualAccount,
        RechargePin,
        Reference,
        Transaction,
        VirtualAccount,
        VirtualAccountCredit,
        Wallet,
    },
    traits::data_objects::{FinalizeOutcome, RedebitOutcome},
};

/// The storage contract for the wallet ledger.
///
/// Every method that touches money is atomic: the transaction-row mutation and the wallet mutation commit together
/// or not at all. Finalizing methods are also idempotent under concurrency; at most one caller observes
/// [`FinalizeOutcome::Finalized`] for a given reference, no matter how many webhook deliveries, sweep runs and
/// status checks race on it. No method performs outbound network calls.
#[allow(async_fn_in_trait)]
pub trait LedgerDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    // ----------------------------------------- funding -----------------------------------------------------------

    /// Record a new funding attempt as a `Pending` ledger row. No wallet mutation happens here.
    async fn create_funding(&self, funding: NewFunding) -> Result<Transaction, LedgerError>;

    /// Finalize a funding row: `Pending` -> `Success` plus a wallet credit of `net`, in one atomic transaction.
    ///
    /// Uses a conditional update scoped to "status is still Pending" and inspects the affected-row count, so two
    /// concurrent finalizers cannot both credit the wallet. The caller supplies the net amount (fee policy already
    /// applied) and the verified gross for the ledger fee column.
    async fn credit_funding(
        &self,
        reference: &Reference,
        gross: Kobo,
        net: Kobo,
        provider_reference: Option<&str>,
        provider_status: Option<&str>,
    ) -> Result<FinalizeOutcome, LedgerError>;

    /// Record an inbound dedicated-account transfer for which no pending row exists.
    ///
    /// The insert itself is the lock: the row is created directly in `Success` with the deterministic
    /// `VA-IN-<provider id>` reference, and a uniqueness violation means the transfer was already processed
    /// ([`FinalizeOutcome::AlreadyFinalized`], not an error). Wallet credit happens in the same atomic transaction,
    /// upserting the wallet if the user has never been credited before.
    async fn credit_virtual_account(&self, credit: VirtualAccountCredit) -> Result<FinalizeOutcome, LedgerError>;

    /// Mark a funding row as `Failed` without touching the wallet (nothing was ever collected). Conditional on the
    /// row still being `Pending`.
    async fn fail_funding(&self, reference: &Reference, provider_status: Option<&str>)
        -> Result<FinalizeOutcome, LedgerError>;

    // ----------------------------------------- purchases ---------------------------------------------------------

    /// Atomically check `balance >= amount`, debit the wallet, bump `total_spent` and create the `Pending` row.
    /// Fails with [`LedgerError::InsufficientBalance`] without any mutation if the balance does not cover the
    /// amount.
    async fn debit_for_purchase(&self, purchase: NewPurchase) -> Result<Transaction, LedgerError>;

    /// `Pending` -> `Success` for a purchase. Only the ledger row changes (the wallet was already debited at
    /// purchase time); the delivered token, if any, is merged into the row metadata.
    async fn finalize_purchase(
        &self,
        reference: &Reference,
        provider_reference: Option<&str>,
        provider_status: Option<&str>,
        delivered_token: Option<&str>,
    ) -> Result<FinalizeOutcome, LedgerError>;

    /// `Pending` -> `Reversed` for a purchase, crediting the debited amount back and decrementing `total_spent`
    /// in the same atomic transaction. This is the refund path; `Failed` is reserved for rows where no money
    /// moved, like abandoned fundings.
    async fn reverse_purchase(
        &self,
        reference: &Reference,
        provider_status: Option<&str>,
    ) -> Result<FinalizeOutcome, LedgerError>;

    /// The audited refund-correction exception: a purchase already `Reversed`+refunded whose provider later reports
    /// success. Flips the original row back to `Success` and records a compensating `COR-<reference>` debit, both
    /// in one atomic transaction, but only while the wallet still covers the re-debit and the row is younger than
    /// `window`.
    async fn redebit_corrected_purchase(
        &self,
        reference: &Reference,
        window: chrono::Duration,
    ) -> Result<RedebitOutcome, LedgerError>;

    /// Record the upstream order id (and raw status) on a still-`Pending` purchase that was accepted
    /// asynchronously, so later re-queries know what to ask the provider about. Not a finalization.
    async fn record_provider_reference(
        &self,
        reference: &Reference,
        provider_reference: &str,
        provider_status: Option<&str>,
    ) -> Result<(), LedgerError>;

    /// Attach delivered pins to a successful pin-printing transaction. Pins are immutable once stored.
    async fn store_pins(&self, transaction_id: i64, pins: &[NewRechargePin]) -> Result<Vec<RechargePin>, LedgerError>;

    // ----------------------------------------- reads & lookups ---------------------------------------------------

    async fn fetch_transaction(&self, reference: &Reference) -> Result<Option<Transaction>, LedgerError>;

    /// All `Pending` rows created before `cutoff`, oldest first, bounded by `limit`. The sweep's work queue.
    async fn fetch_stale_pending(&self, cutoff: DateTime<Utc>, limit: i64) -> Result<Vec<Transaction>, LedgerError>;

    async fn fetch_wallet(&self, user_id: i64) -> Result<Option<Wallet>, LedgerError>;

    /// Paginated transaction history, newest first.
    async fn history(&self, user_id: i64, offset: i64, limit: i64) -> Result<Vec<Transaction>, LedgerError>;

    async fn fetch_pins(&self, transaction_id: i64) -> Result<Vec<RechargePin>, LedgerError>;

    // ----------------------------------------- virtual accounts --------------------------------------------------

    /// Persist the gateway-assigned dedicated account for a user. Idempotent on `account_reference`.
    async fn save_virtual_account(&self, account: NewVirtualAccount) -> Result<VirtualAccount, LedgerError>;

    /// Resolve the owner of a dedicated account reference. The association step for inbound transfer webhooks.
    async fn virtual_account_owner(&self, account_reference: &str) -> Result<Option<VirtualAccount>, LedgerError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Cannot insert transaction, since reference {0} already exists")]
    ReferenceAlreadyExists(Reference),
    #[error("The wallet balance does not cover the requested debit")]
    InsufficientBalance,
    #[error("The requested transaction {0} does not exist")]
    TransactionNotFound(Reference),
    #[error("The wallet for user {0} does not exist")]
    WalletNotFound(i64),
    #[error("Illegal status transition: {0}")]
    IllegalStatusTransition(String),
    #[error("Metadata could not be serialized: {0}")]
    BadMetadata(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}
