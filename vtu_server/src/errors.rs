use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;
use vtu_engine::{
    traits::{FulfillmentError, GatewayError, LedgerError},
    FlowError,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize the server. {0}")]
    InitializeError(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Insufficient wallet balance")]
    InsufficientBalance,
    #[error("Upstream failure: {0}")]
    UpstreamError(String),
    #[error("Backend error: {0}")]
    BackendError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InitializeError(_) | Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientBalance => StatusCode::PAYMENT_REQUIRED,
            Self::UpstreamError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({"error": self.to_string()}))
    }
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InsufficientBalance => Self::InsufficientBalance,
            LedgerError::TransactionNotFound(_) | LedgerError::WalletNotFound(_) => Self::NotFound(e.to_string()),
            LedgerError::ReferenceAlreadyExists(_) => Self::InvalidRequest(e.to_string()),
            _ => Self::BackendError(e.to_string()),
        }
    }
}

impl From<FlowError> for ServerError {
    fn from(e: FlowError) -> Self {
        match e {
            FlowError::Ledger(le) => le.into(),
            FlowError::UnsupportedGateway(_) | FlowError::UnsupportedProvider(_) | FlowError::AmountTooSmall(_) => {
                Self::InvalidRequest(e.to_string())
            },
            FlowError::TransactionNotFound(_) => Self::NotFound(e.to_string()),
            FlowError::NotReconcilable(m) | FlowError::UnmatchedInflow(m) => Self::InvalidRequest(m),
            FlowError::Fulfillment(FulfillmentError::UnknownItem(item)) => {
                Self::InvalidRequest(format!("Unknown item: {item}"))
            },
            FlowError::Gateway(GatewayError::NotFound) | FlowError::Fulfillment(FulfillmentError::NotFound) => {
                Self::NotFound("The upstream has no record of this transaction".into())
            },
            FlowError::Gateway(ge) => Self::UpstreamError(ge.to_string()),
            FlowError::Fulfillment(fe) => Self::UpstreamError(fe.to_string()),
        }
    }
}
