use std::{fmt::Display, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use vtu_common::Kobo;

use crate::db_types::{ConversionError, NewRechargePin, TxType};

//--------------------------------------    ServiceKind    -----------------------------------------------------------
/// The service verticals a fulfillment provider can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Airtime,
    Data,
    Electricity,
    Cable,
    Education,
    RechargePin,
}

impl ServiceKind {
    pub fn tx_type(&self) -> TxType {
        match self {
            ServiceKind::Airtime => TxType::Airtime,
            ServiceKind::Data => TxType::Data,
            ServiceKind::Electricity => TxType::Electricity,
            ServiceKind::Cable => TxType::Cable,
            ServiceKind::Education => TxType::Education,
            ServiceKind::RechargePin => TxType::RechargePin,
        }
    }
}

impl Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceKind::Airtime => write!(f, "airtime"),
            ServiceKind::Data => write!(f, "data"),
            ServiceKind::Electricity => write!(f, "electricity"),
            ServiceKind::Cable => write!(f, "cable"),
            ServiceKind::Education => write!(f, "education"),
            ServiceKind::RechargePin => write!(f, "recharge-pin"),
        }
    }
}

impl FromStr for ServiceKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "airtime" => Ok(Self::Airtime),
            "data" => Ok(Self::Data),
            "electricity" => Ok(Self::Electricity),
            "cable" => Ok(Self::Cable),
            "education" => Ok(Self::Education),
            "recharge-pin" => Ok(Self::RechargePin),
            s => Err(ConversionError(format!("Invalid service kind: {s}"))),
        }
    }
}

//--------------------------------------  PurchaseRequest  -----------------------------------------------------------
/// Provider-facing purchase parameters. `item_code` is the provider's catalog key (plan code, meter type, exam
/// body, ...); `recipient` is the phone number, meter number or similar delivery target.
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub service: ServiceKind,
    pub item_code: String,
    pub recipient: String,
    pub amount: Kobo,
    /// Free-form provider extras (quantity for pin printing, subscriber name, ...).
    pub extras: Value,
}

//--------------------------------------  PurchaseOutcome  -----------------------------------------------------------
/// Business-level outcome of a purchase call.
///
/// `Accepted` is deliberate: a provider may take the order without delivering yet. The correct caller action is to
/// leave the ledger row `Pending` and let reconciliation finish the job; it is neither a success nor a failure.
#[derive(Debug, Clone)]
pub enum PurchaseOutcome {
    /// Delivered synchronously. `token` carries the electricity token / exam pin text where the vertical has one.
    Delivered { order_id: String, raw_status: String, token: Option<String>, pins: Vec<NewRechargePin> },
    /// Accepted upstream but not yet delivered.
    Accepted { order_id: String, raw_status: String },
}

//-------------------------------------- FulfillmentStatus ----------------------------------------------------------
/// Normalized result of a status re-query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentStatus {
    Delivered { token: Option<String> },
    Failed { raw_status: String },
    Pending,
}

//-------------------------------------- FulfillmentError  -----------------------------------------------------------
/// Closed error classification for fulfillment calls, built once at the adapter boundary.
///
/// Only [`FulfillmentError::Rejected`] may trigger an automatic wallet refund. A [`FulfillmentError::Transient`]
/// timeout can hide an upstream success, and refunding on it would hand out free goods.
#[derive(Debug, Clone, Error)]
pub enum FulfillmentError {
    #[error("Transient provider failure: {0}")]
    Transient(String),
    #[error("The order is not known to the provider")]
    NotFound,
    #[error("The provider rejected the purchase: {0}")]
    Rejected(String),
    #[error("The requested item is not in the provider's catalog: {0}")]
    UnknownItem(String),
    #[error("Unexpected provider response: {0}")]
    Unknown(String),
}

//-------------------------------------- FulfillmentProvider --------------------------------------------------------
/// One upstream fulfillment provider, normalized across all service verticals it supports.
#[async_trait]
pub trait FulfillmentProvider: Send + Sync {
    /// Stable lowercase identifier, e.g. `"vtpass"`.
    fn tag(&self) -> &'static str;

    /// The authoritative price for a catalog item, from a freshly fetched catalog. Client-supplied prices are
    /// never trusted; an unknown `item_code` is [`FulfillmentError::UnknownItem`].
    async fn price_for(&self, service: ServiceKind, item_code: &str) -> Result<Kobo, FulfillmentError>;

    /// Place a purchase. `idempotency_key` is our ledger reference; providers that support idempotent submission
    /// receive it as their request id.
    async fn purchase(
        &self,
        request: PurchaseRequest,
        idempotency_key: &str,
    ) -> Result<PurchaseOutcome, FulfillmentError>;

    /// Re-query the status of a previously placed order. Read-only.
    async fn query_status(&self, order_id: &str) -> Result<FulfillmentStatus, FulfillmentError>;
}
