use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Type};
use thiserror::Error;
use vtu_common::Kobo;

//--------------------------------------      Wallet       -----------------------------------------------------------
/// One wallet per user. The balance is only ever mutated inside a database transaction that also moves a ledger
/// row to a terminal state (or creates the pending debit row). Wallets are created lazily by upsert on the first
/// credit.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: i64,
    pub balance: Kobo,
    pub total_spent: Kobo,
    /// Promotional pool. Not touched by the reconciliation flows.
    pub bonus_balance: Kobo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      TxType       -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TxType {
    Funding,
    Airtime,
    Data,
    Electricity,
    Cable,
    Education,
    RechargePin,
}

impl TxType {
    /// Human-traceable prefix used when generating internal references.
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            TxType::Funding => "FND",
            TxType::Airtime => "AIR",
            TxType::Data => "DAT",
            TxType::Electricity => "ELC",
            TxType::Cable => "CAB",
            TxType::Education => "EDU",
            TxType::RechargePin => "PIN",
        }
    }

    pub fn is_funding(&self) -> bool {
        matches!(self, TxType::Funding)
    }
}

impl Display for TxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxType::Funding => write!(f, "Funding"),
            TxType::Airtime => write!(f, "Airtime"),
            TxType::Data => write!(f, "Data"),
            TxType::Electricity => write!(f, "Electricity"),
            TxType::Cable => write!(f, "Cable"),
            TxType::Education => write!(f, "Education"),
            TxType::RechargePin => write!(f, "RechargePin"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(pub String);

impl FromStr for TxType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Funding" => Ok(Self::Funding),
            "Airtime" => Ok(Self::Airtime),
            "Data" => Ok(Self::Data),
            "Electricity" => Ok(Self::Electricity),
            "Cable" => Ok(Self::Cable),
            "Education" => Ok(Self::Education),
            "RechargePin" => Ok(Self::RechargePin),
            s => Err(ConversionError(format!("Invalid transaction type: {s}"))),
        }
    }
}

//--------------------------------------      TxStatus     -----------------------------------------------------------
/// Lifecycle of a ledger entry. `Pending` is the only non-terminal state. Once a row reaches `Success`, `Failed` or
/// `Reversed` it stays there, with the single audited exception of the refund-correction path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
    Reversed,
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

impl Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxStatus::Pending => write!(f, "Pending"),
            TxStatus::Success => write!(f, "Success"),
            TxStatus::Failed => write!(f, "Failed"),
            TxStatus::Reversed => write!(f, "Reversed"),
        }
    }
}

impl FromStr for TxStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Success" => Ok(Self::Success),
            "Failed" => Ok(Self::Failed),
            "Reversed" => Ok(Self::Reversed),
            s => Err(ConversionError(format!("Invalid transaction status: {s}"))),
        }
    }
}

//--------------------------------------     Reference     -----------------------------------------------------------
/// An internally generated, globally unique transaction reference.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Reference(pub String);

impl FromStr for Reference {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for Reference {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Reference {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the reference carries the given type's prefix.
    pub fn has_prefix(&self, tx_type: TxType) -> bool {
        self.0.starts_with(tx_type.reference_prefix())
    }
}

//--------------------------------------    Transaction    -----------------------------------------------------------
/// The ledger entry and single source of truth for any money movement or purchase attempt.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    /// Net amount credited (funding) or debited (purchase), in kobo.
    pub amount: Kobo,
    pub fee: Kobo,
    pub tx_type: TxType,
    pub status: TxStatus,
    pub reference: Reference,
    /// Which upstream handles this row, e.g. "paystack" or "vtpass". Used by the sweep to route re-queries.
    pub provider: Option<String>,
    /// Upstream-assigned id. Unique when present; the idempotency key for inbound webhooks.
    pub provider_reference: Option<String>,
    /// Raw upstream status string. Advisory only.
    pub provider_status: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_pending(&self) -> bool {
        self.status == TxStatus::Pending
    }
}

//--------------------------------------    NewFunding     -----------------------------------------------------------
/// A funding attempt about to be written as a `Pending` ledger row.
#[derive(Debug, Clone)]
pub struct NewFunding {
    pub user_id: i64,
    /// Expected gross amount, before fees. The net credit is computed from the verified amount at finalization.
    pub amount: Kobo,
    pub reference: Reference,
    pub gateway: String,
    pub metadata: Value,
}

//--------------------------------------    NewPurchase    -----------------------------------------------------------
/// A purchase about to be debited. The amount is the authoritative catalog price, never the client-supplied one.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub user_id: i64,
    pub amount: Kobo,
    pub tx_type: TxType,
    pub reference: Reference,
    pub provider: String,
    pub metadata: Value,
}

//-------------------------------------- VirtualAccountCredit -------------------------------------------------------
/// An inbound bank transfer into a dedicated virtual account. There is no pre-existing pending row for these, so the
/// ledger insert itself is the idempotency lock (`VA-IN-<provider id>` reference, unique constraint).
#[derive(Debug, Clone)]
pub struct VirtualAccountCredit {
    pub user_id: i64,
    /// Gross amount received, before fees.
    pub gross: Kobo,
    /// Net amount to credit, per the fee policy.
    pub net: Kobo,
    pub gateway: String,
    /// The upstream transfer id. The derived reference is `VA-IN-<provider_id>`.
    pub provider_id: String,
    pub provider_status: Option<String>,
    pub metadata: Value,
}

impl VirtualAccountCredit {
    pub fn derived_reference(&self) -> Reference {
        Reference(format!("VA-IN-{}", self.provider_id))
    }
}

//--------------------------------------    RechargePin    -----------------------------------------------------------
/// A single purchased PIN/serial pair. Owned by exactly one transaction and immutable once created.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RechargePin {
    pub id: i64,
    pub transaction_id: i64,
    pub network: String,
    pub denomination: Kobo,
    pub pin: String,
    pub serial: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRechargePin {
    pub network: String,
    pub denomination: Kobo,
    pub pin: String,
    pub serial: String,
}

//--------------------------------------  VirtualAccount   -----------------------------------------------------------
/// Maps a gateway-assigned dedicated account back to a user. This is the join key for inbound transfer webhooks
/// that carry no user-supplied reference.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct VirtualAccount {
    pub id: i64,
    pub user_id: i64,
    pub provider: String,
    pub account_reference: String,
    pub account_number: String,
    pub bank_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewVirtualAccount {
    pub user_id: i64,
    pub provider: String,
    pub account_reference: String,
    pub account_number: String,
    pub bank_name: String,
}
