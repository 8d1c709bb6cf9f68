//! The flow APIs sitting between the HTTP layer and the ledger.
//!
//! Each API owns one concern: [`FundingFlowApi`] moves money into wallets, [`PurchaseApi`] moves it out,
//! [`ReconcileApi`] chases whatever the first two left in flight, and [`WalletApi`] is read-only. They share the
//! same contract with storage: the [`crate::traits::LedgerDatabase`] does the atomic bookkeeping, the adapters do
//! the talking, and these APIs decide what the ledger should look like afterwards.
mod funding_flow_api;
mod purchase_api;
mod reconcile_api;
mod registries;
mod wallet_api;

use thiserror::Error;
use vtu_common::Kobo;

use crate::{
    db_types::Reference,
    traits::{FulfillmentError, GatewayError, LedgerError},
};

pub use funding_flow_api::FundingFlowApi;
pub use purchase_api::{PurchaseApi, PurchaseOrder, PurchaseReceipt};
pub use reconcile_api::ReconcileApi;
pub use registries::{GatewayRegistry, ProviderRegistry};
pub use wallet_api::WalletApi;

/// Errors surfaced by the flow APIs.
#[derive(Debug, Clone, Error)]
pub enum FlowError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("Fulfillment error: {0}")]
    Fulfillment(#[from] FulfillmentError),
    #[error("No payment gateway is registered under the tag '{0}'")]
    UnsupportedGateway(String),
    #[error("No fulfillment provider is registered under the tag '{0}'")]
    UnsupportedProvider(String),
    #[error("Inbound transfer could not be matched to a wallet: {0}")]
    UnmatchedInflow(String),
    #[error("The transaction {0} does not exist")]
    TransactionNotFound(Reference),
    #[error("The transaction cannot be reconciled: {0}")]
    NotReconcilable(String),
    #[error("The amount {0} is too small to fund a wallet")]
    AmountTooSmall(Kobo),
}
