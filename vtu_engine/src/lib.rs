//! VTU Ledger Engine
//!
//! The core of a digital-goods reseller backend: a wallet ledger with atomic balance mutation, an idempotent
//! fulfillment state machine, and a multi-source reconciliation layer. It is HTTP-agnostic; the server crate wires
//! it to routes, webhook handlers and the background sweep.
//!
//! The library is divided into three main sections:
//! 1. Storage ([`mod@sqlite`] behind the [`traits::LedgerDatabase`] contract). All money movement happens here, in
//!    single atomic database transactions, with conditional updates guaranteeing at most one winner per
//!    finalization no matter how many webhook deliveries, sweeps and status checks race.
//! 2. Upstream adapter contracts ([`mod@traits`]): payment gateways and fulfillment providers, normalized into
//!    closed result and error types at the adapter boundary so the flows never parse provider payloads.
//! 3. The flow APIs ([`mod@api`]): funding, purchases, reconciliation and reads. These compose storage and
//!    adapters into the actual business flows.
//!
//! The engine also emits events (wallet credited, transaction finalized) through a small fire-and-forget hook
//! system, so notification concerns never sit inside a money-moving code path.
pub mod api;
pub mod db_types;
pub mod events;
pub mod fees;
pub mod helpers;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;

pub use api::{
    FlowError,
    FundingFlowApi,
    GatewayRegistry,
    ProviderRegistry,
    PurchaseApi,
    PurchaseOrder,
    PurchaseReceipt,
    ReconcileApi,
    WalletApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{LedgerDatabase, LedgerError};
