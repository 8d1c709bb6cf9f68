//! Contracts between the reconciliation core and its collaborators.
//!
//! [`LedgerDatabase`] is the storage-side contract: every mutation it exposes is atomic and idempotent, so the
//! webhook path, the sweep and the synchronous status check can all race on the same transaction safely.
//!
//! [`PaymentGateway`] and [`FulfillmentProvider`] are the upstream-side contracts. They surface typed outcomes with
//! an explicit error classification; orchestration code branches on the classification and never inspects message
//! strings.

mod data_objects;
mod fulfillment;
mod ledger_database;
mod payment_gateway;

pub use data_objects::{FinalizeOutcome, RedebitOutcome, SweepOutcome, SweepReport};
pub use fulfillment::{
    FulfillmentError,
    FulfillmentProvider,
    FulfillmentStatus,
    PurchaseOutcome,
    PurchaseRequest,
    ServiceKind,
};
pub use ledger_database::{LedgerDatabase, LedgerError};
pub use payment_gateway::{
    CheckoutSession,
    DedicatedAccount,
    DedicatedAccountRequest,
    GatewayError,
    GatewayVerification,
    InitializePayment,
    PaymentGateway,
    VerifiedStatus,
    VerifyTarget,
};
