//! The public wallet and purchase routes.
//!
//! Handlers are thin: validate the request shape, call the matching flow, map the result onto HTTP. All ledger
//! and upstream semantics live in the engine.
use actix_web::{get, post, web, HttpResponse};
use log::*;
use vtu_engine::{
    db_types::Reference,
    traits::{DedicatedAccountRequest, RedebitOutcome, ServiceKind},
    FundingFlowApi,
    PurchaseApi,
    PurchaseOrder,
    ReconcileApi,
    SqliteDatabase,
    WalletApi,
};

use crate::{
    config::ServerConfig,
    data_objects::{FundRequest, PaginationParams, PurchaseRequestBody, PurchaseResponse, VirtualAccountRequest},
    errors::ServerError,
};

const MAX_HISTORY_PAGE: i64 = 100;

#[get("/health")]
pub async fn health() -> HttpResponse {
    trace!("🌐️ Health check");
    HttpResponse::Ok().body("👍️\n")
}

/// Start a checkout funding. Returns the gateway's checkout session for the client to complete.
#[post("/wallet/{user_id}/fund")]
pub async fn fund_wallet(
    path: web::Path<i64>,
    body: web::Json<FundRequest>,
    funding: web::Data<FundingFlowApi<SqliteDatabase>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    let body = body.into_inner();
    let gateway = body.gateway.unwrap_or_else(|| config.default_gateway.clone());
    let session = funding.initialize_funding(user_id, body.amount, &body.email, &gateway).await?;
    Ok(HttpResponse::Ok().json(session))
}

/// Assign a dedicated virtual account to the user for transfer-based funding.
#[post("/wallet/{user_id}/virtual-account")]
pub async fn create_virtual_account(
    path: web::Path<i64>,
    body: web::Json<VirtualAccountRequest>,
    funding: web::Data<FundingFlowApi<SqliteDatabase>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    let body = body.into_inner();
    let gateway = body.gateway.unwrap_or_else(|| config.default_gateway.clone());
    let request = DedicatedAccountRequest {
        user_id,
        email: body.email,
        first_name: body.first_name,
        last_name: body.last_name,
        kyc_id: body.kyc_id,
    };
    let account = funding.create_virtual_account(&gateway, request).await?;
    Ok(HttpResponse::Ok().json(account))
}

#[get("/wallet/{user_id}")]
pub async fn wallet_balance(
    path: web::Path<i64>,
    wallets: web::Data<WalletApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    let wallet = wallets
        .balance(user_id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("No wallet for user {user_id}")))?;
    Ok(HttpResponse::Ok().json(wallet))
}

#[get("/wallet/{user_id}/transactions")]
pub async fn wallet_history(
    path: web::Path<i64>,
    query: web::Query<PaginationParams>,
    wallets: web::Data<WalletApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    let offset = query.offset.unwrap_or(0).max(0);
    let limit = query.limit.unwrap_or(50).clamp(1, MAX_HISTORY_PAGE);
    let history = wallets.history(user_id, offset, limit).await?;
    Ok(HttpResponse::Ok().json(history))
}

/// Transaction detail with an inline status check: a still-pending row is reconciled against its upstream before
/// the response is built, so a user refreshing the page acts as their own reconciliation trigger.
#[get("/wallet/{user_id}/transactions/{reference}")]
pub async fn transaction_detail(
    path: web::Path<(i64, String)>,
    reconcile: web::Data<ReconcileApi<SqliteDatabase>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    let (user_id, reference) = path.into_inner();
    let reference = Reference(reference);
    let tx = reconcile
        .reconcile_one(&reference, config.funding_abandon_window)
        .await?
        .filter(|tx| tx.user_id == user_id)
        .ok_or_else(|| ServerError::NotFound(format!("No transaction [{reference}]")))?;
    Ok(HttpResponse::Ok().json(tx))
}

/// The PINs bought in a recharge-pin purchase. Ownership is checked against the path; authn is upstream of this
/// server.
#[get("/wallet/{user_id}/transactions/{reference}/pins")]
pub async fn transaction_pins(
    path: web::Path<(i64, String)>,
    wallets: web::Data<WalletApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let (user_id, reference) = path.into_inner();
    let reference = Reference(reference);
    let tx = wallets
        .transaction(&reference)
        .await?
        .filter(|tx| tx.user_id == user_id)
        .ok_or_else(|| ServerError::NotFound(format!("No transaction [{reference}]")))?;
    let pins = wallets.pins(tx.id).await?;
    Ok(HttpResponse::Ok().json(pins))
}

/// Buy a digital good. The path segment names the service ("airtime", "data", "electricity", "cable",
/// "education", "recharge-pin").
#[post("/purchase/{user_id}/{service}")]
pub async fn purchase(
    path: web::Path<(i64, String)>,
    body: web::Json<PurchaseRequestBody>,
    purchases: web::Data<PurchaseApi<SqliteDatabase>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    let (user_id, service) = path.into_inner();
    let service = service
        .parse::<ServiceKind>()
        .map_err(|_| ServerError::InvalidRequest(format!("Unknown service '{service}'")))?;
    let body = body.into_inner();
    let provider = body.provider.unwrap_or_else(|| config.default_provider.clone());
    let order = PurchaseOrder {
        service,
        item_code: body.item_code,
        recipient: body.recipient,
        extras: body.extras,
    };
    let receipt = purchases.purchase(user_id, &provider, order).await?;
    Ok(HttpResponse::Ok().json(PurchaseResponse::from(receipt)))
}

/// Operator endpoint: re-debit a refund that a later provider report contradicted.
#[post("/operator/transactions/{reference}/correct-refund")]
pub async fn correct_refund(
    path: web::Path<String>,
    purchases: web::Data<PurchaseApi<SqliteDatabase>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    let reference = Reference(path.into_inner());
    let outcome = purchases.correct_refund(&reference, config.refund_correction_window).await?;
    let response = match outcome {
        RedebitOutcome::Corrected { compensation, .. } => serde_json::json!({
            "outcome": "corrected",
            "compensation_reference": compensation.reference,
            "amount": compensation.amount,
        }),
        RedebitOutcome::InsufficientBalance => serde_json::json!({ "outcome": "insufficient_balance" }),
        RedebitOutcome::NotCorrectable => serde_json::json!({ "outcome": "not_correctable" }),
    };
    Ok(HttpResponse::Ok().json(response))
}
