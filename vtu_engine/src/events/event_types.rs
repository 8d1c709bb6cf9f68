use vtu_common::Kobo;

use crate::db_types::Transaction;

/// Emitted after a wallet credit has been committed (funding webhook, dedicated-account inflow, or sweep).
/// Consumed by the fire-and-forget notifier; failures there never roll back the ledger.
#[derive(Debug, Clone)]
pub struct WalletCreditedEvent {
    pub user_id: i64,
    pub amount: Kobo,
    pub transaction: Transaction,
}

impl WalletCreditedEvent {
    pub fn new(transaction: Transaction) -> Self {
        Self { user_id: transaction.user_id, amount: transaction.amount, transaction }
    }
}

/// Emitted whenever a transaction reaches a terminal state, whichever path got it there.
#[derive(Debug, Clone)]
pub struct TransactionFinalizedEvent {
    pub transaction: Transaction,
}

impl TransactionFinalizedEvent {
    pub fn new(transaction: Transaction) -> Self {
        Self { transaction }
    }
}
