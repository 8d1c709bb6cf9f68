//! Request and response objects for the public routes.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vtu_common::Kobo;
use vtu_engine::{
    db_types::{RechargePin, Transaction},
    PurchaseReceipt,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    success: bool,
    message: String,
}

impl JsonResponse {
    pub fn success<S: Into<String>>(message: S) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failure<S: Into<String>>(message: S) -> Self {
        Self { success: false, message: message.into() }
    }
}

/// Body of `POST /wallet/{user_id}/fund`. The amount is gross kobo; the fee policy decides the net credit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundRequest {
    pub amount: Kobo,
    pub email: String,
    /// Gateway tag. Falls back to the configured default when absent.
    pub gateway: Option<String>,
}

/// Body of `POST /wallet/{user_id}/virtual-account`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualAccountRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// BVN or equivalent, where the gateway demands KYC before assigning an account.
    pub kyc_id: Option<String>,
    pub gateway: Option<String>,
}

/// Body of `POST /purchase/{user_id}/{service}`. Deliberately has no amount field; pricing comes from the
/// provider catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequestBody {
    pub item_code: String,
    pub recipient: String,
    pub provider: Option<String>,
    #[serde(default)]
    pub extras: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationParams {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// Wire form of a purchase receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub status: String,
    pub transaction: Transaction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub pins: Vec<RechargePin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<PurchaseReceipt> for PurchaseResponse {
    fn from(receipt: PurchaseReceipt) -> Self {
        match receipt {
            PurchaseReceipt::Delivered { transaction, token, pins } => {
                Self { status: "delivered".into(), transaction, token, pins, reason: None }
            },
            PurchaseReceipt::Processing { transaction } => {
                Self { status: "processing".into(), transaction, token: None, pins: Vec::new(), reason: None }
            },
            PurchaseReceipt::Failed { transaction, reason } => {
                Self { status: "failed".into(), transaction, token: None, pins: Vec::new(), reason: Some(reason) }
            },
        }
    }
}
