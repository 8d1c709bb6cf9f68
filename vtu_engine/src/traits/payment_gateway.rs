use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vtu_common::Kobo;

//--------------------------------------   VerifyTarget    -----------------------------------------------------------
/// What to verify a transaction by. An explicit tag, never inferred from the shape of the string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyTarget {
    /// The upstream's own numeric/opaque transaction id.
    ById(String),
    /// Our internally generated reference, as passed at initialization.
    ByReference(String),
}

impl VerifyTarget {
    pub fn value(&self) -> &str {
        match self {
            VerifyTarget::ById(s) | VerifyTarget::ByReference(s) => s.as_str(),
        }
    }
}

//--------------------------------------  VerifiedStatus   -----------------------------------------------------------
/// Normalized upstream payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifiedStatus {
    Successful,
    Failed,
    Pending,
}

//-------------------------------------- GatewayVerification --------------------------------------------------------
/// Result of a read-only `verify` call against a gateway. `verify` is idempotent and side-effect-free upstream, so
/// every reconciliation path may call it as often as it likes.
#[derive(Debug, Clone)]
pub struct GatewayVerification {
    pub status: VerifiedStatus,
    /// Gross amount actually collected, as reported by the gateway. This, not the webhook payload, is what gets
    /// credited (after fees).
    pub amount_paid: Kobo,
    /// The upstream-assigned transaction id.
    pub provider_id: String,
    /// Raw upstream status string, stored on the ledger row for audit.
    pub raw_status: String,
}

//-------------------------------------- InitializePayment ----------------------------------------------------------
#[derive(Debug, Clone)]
pub struct InitializePayment {
    pub user_id: i64,
    pub amount: Kobo,
    pub email: String,
    pub reference: String,
}

/// A checkout session handed back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub checkout_url: String,
    pub reference: String,
}

//-------------------------------------- Dedicated accounts ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct DedicatedAccountRequest {
    pub user_id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// BVN or similar KYC handle, where the gateway requires one.
    pub kyc_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DedicatedAccount {
    pub account_reference: String,
    pub account_number: String,
    pub bank_name: String,
}

//--------------------------------------   GatewayError    -----------------------------------------------------------
/// Closed error classification for gateway calls, built once at the adapter boundary.
///
/// The distinction that matters to callers: [`GatewayError::Transient`] means the truth is unknown (retry later,
/// never reverse anything on the strength of it), [`GatewayError::NotFound`] means the upstream has no record (an
/// abandoned checkout, distinguishable from a definitive failure), and [`GatewayError::Rejected`] is a definitive
/// business failure.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Transient gateway failure: {0}")]
    Transient(String),
    #[error("The transaction is not known to the gateway")]
    NotFound,
    #[error("The gateway rejected the request: {0}")]
    Rejected(String),
    #[error("Gateway authentication failed: {0}")]
    Auth(String),
    #[error("Unexpected gateway response: {0}")]
    Unknown(String),
}

//--------------------------------------   PaymentGateway   ----------------------------------------------------------
/// One payment gateway (card / bank transfer / dedicated virtual account collection), normalized.
///
/// Transport, auth-token caching and retry/backoff live behind this trait; auth expiry in particular is refreshed
/// and retried once transparently, so callers never see a stale-token failure for a healthy gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Stable lowercase identifier, e.g. `"paystack"`. Stored on ledger rows so the sweep can route re-queries.
    fn tag(&self) -> &'static str;

    /// Create a checkout session for the given amount and internal reference.
    async fn initialize(&self, request: InitializePayment) -> Result<CheckoutSession, GatewayError>;

    /// Re-query the authoritative status of a transaction. Read-only and idempotent.
    async fn verify(&self, target: VerifyTarget) -> Result<GatewayVerification, GatewayError>;

    /// Create a dedicated virtual account assigned to this user.
    async fn create_dedicated_account(
        &self,
        request: DedicatedAccountRequest,
    ) -> Result<DedicatedAccount, GatewayError>;
}
