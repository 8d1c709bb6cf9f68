use std::fmt::Debug;

use crate::{
    db_types::{RechargePin, Reference, Transaction, Wallet},
    traits::{LedgerDatabase, LedgerError},
};

/// Read-only wallet queries. Nothing here mutates the ledger.
pub struct WalletApi<B> {
    db: B,
}

impl<B> Debug for WalletApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletApi")
    }
}

impl<B: Clone> Clone for WalletApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

impl<B> WalletApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> WalletApi<B>
where B: LedgerDatabase
{
    pub async fn balance(&self, user_id: i64) -> Result<Option<Wallet>, LedgerError> {
        self.db.fetch_wallet(user_id).await
    }

    pub async fn history(&self, user_id: i64, offset: i64, limit: i64) -> Result<Vec<Transaction>, LedgerError> {
        self.db.history(user_id, offset, limit).await
    }

    pub async fn transaction(&self, reference: &Reference) -> Result<Option<Transaction>, LedgerError> {
        self.db.fetch_transaction(reference).await
    }

    pub async fn pins(&self, transaction_id: i64) -> Result<Vec<RechargePin>, LedgerError> {
        self.db.fetch_pins(transaction_id).await
    }
}
