//! Gateway webhook endpoints.
//!
//! All three handlers follow the same discipline:
//! * The signature middleware has already authenticated the payload.
//! * The payload is only ever treated as a hint. Settlement re-verifies against the gateway before any wallet
//!   mutation, so a forged-but-signed payload can at worst trigger a verification round-trip.
//! * The response is 200 as soon as the event is classified. The settlement itself runs on a spawned task;
//!   gateways that see slow or non-200 responses retry aggressively, and every retry is absorbed by the
//!   idempotent settlement path anyway.
use actix_web::{post, web, HttpResponse};
use log::*;
use serde_json::Value;
use vtu_engine::{
    db_types::Reference,
    traits::{VerifiedStatus, VerifyTarget},
    FundingFlowApi,
    GatewayRegistry,
    ReconcileApi,
    SqliteDatabase,
};

use crate::{config::ServerConfig, data_objects::JsonResponse};

/// What a webhook payload boils down to, after gateway-specific parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// Something happened to a checkout funding. The reference is ours; settlement re-verifies.
    FundingUpdate { reference: Reference },
    /// Money arrived in a dedicated virtual account. Both ids are the gateway's.
    VirtualAccountInflow { account_reference: String, provider_id: String },
    /// A recognized event that carries nothing we can act on.
    Ignored(String),
    /// A money event we could not associate with anything. Operator attention required.
    Unmatched(String),
}

pub fn parse_paystack_event(payload: &Value) -> GatewayEvent {
    let event = payload["event"].as_str().unwrap_or_default();
    if event != "charge.success" {
        return GatewayEvent::Ignored(event.to_string());
    }
    let data = &payload["data"];
    if data["authorization"]["channel"].as_str() == Some("dedicated_nuban") {
        let account_reference = data["customer"]["customer_code"].as_str().unwrap_or_default().to_string();
        let provider_id = match &data["id"] {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            _ => String::new(),
        };
        if account_reference.is_empty() || provider_id.is_empty() {
            return GatewayEvent::Unmatched(format!("dedicated account credit without ids: {data}"));
        }
        return GatewayEvent::VirtualAccountInflow { account_reference, provider_id };
    }
    match data["reference"].as_str().and_then(|r| r.parse::<Reference>().ok()) {
        Some(reference) if reference.has_prefix(vtu_engine::db_types::TxType::Funding) => {
            GatewayEvent::FundingUpdate { reference }
        },
        Some(reference) => GatewayEvent::Unmatched(format!("charge.success with foreign reference [{reference}]")),
        None => GatewayEvent::Unmatched("charge.success without a reference".to_string()),
    }
}

pub fn parse_flutterwave_event(payload: &Value) -> GatewayEvent {
    let event = payload["event"].as_str().unwrap_or_default();
    if event != "charge.completed" {
        return GatewayEvent::Ignored(event.to_string());
    }
    let data = &payload["data"];
    let tx_ref = data["tx_ref"].as_str().unwrap_or_default();
    if data["payment_type"].as_str() == Some("bank_transfer") && !tx_ref.starts_with("FND-") {
        // Transfers into reserved accounts arrive as bank_transfer charges whose tx_ref is the account's
        // order reference, which is what we stored as the account reference.
        let provider_id = match &data["id"] {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            _ => String::new(),
        };
        if tx_ref.is_empty() || provider_id.is_empty() {
            return GatewayEvent::Unmatched(format!("bank transfer without ids: {data}"));
        }
        return GatewayEvent::VirtualAccountInflow {
            account_reference: tx_ref.to_string(),
            provider_id,
        };
    }
    match tx_ref.parse::<Reference>().ok() {
        Some(reference) if reference.has_prefix(vtu_engine::db_types::TxType::Funding) => {
            GatewayEvent::FundingUpdate { reference }
        },
        _ => GatewayEvent::Unmatched(format!("charge.completed with foreign tx_ref [{tx_ref}]")),
    }
}

pub fn parse_monnify_event(payload: &Value) -> GatewayEvent {
    let event = payload["eventType"].as_str().unwrap_or_default();
    if event != "SUCCESSFUL_TRANSACTION" {
        return GatewayEvent::Ignored(event.to_string());
    }
    let data = &payload["eventData"];
    if data["product"]["type"].as_str() == Some("RESERVED_ACCOUNT") {
        let account_reference = data["product"]["reference"].as_str().unwrap_or_default().to_string();
        let provider_id = data["transactionReference"].as_str().unwrap_or_default().to_string();
        if account_reference.is_empty() || provider_id.is_empty() {
            return GatewayEvent::Unmatched(format!("reserved account credit without ids: {data}"));
        }
        return GatewayEvent::VirtualAccountInflow { account_reference, provider_id };
    }
    match data["paymentReference"].as_str().and_then(|r| r.parse::<Reference>().ok()) {
        Some(reference) if reference.has_prefix(vtu_engine::db_types::TxType::Funding) => {
            GatewayEvent::FundingUpdate { reference }
        },
        _ => GatewayEvent::Unmatched("SUCCESSFUL_TRANSACTION with foreign payment reference".to_string()),
    }
}

#[post("")]
pub async fn paystack_webhook(
    body: web::Json<Value>,
    funding: web::Data<FundingFlowApi<SqliteDatabase>>,
    gateways: web::Data<GatewayRegistry>,
) -> HttpResponse {
    dispatch("paystack", parse_paystack_event(&body), &funding, &gateways)
}

#[post("")]
pub async fn flutterwave_webhook(
    body: web::Json<Value>,
    funding: web::Data<FundingFlowApi<SqliteDatabase>>,
    gateways: web::Data<GatewayRegistry>,
) -> HttpResponse {
    dispatch("flutterwave", parse_flutterwave_event(&body), &funding, &gateways)
}

#[post("")]
pub async fn monnify_webhook(
    body: web::Json<Value>,
    funding: web::Data<FundingFlowApi<SqliteDatabase>>,
    gateways: web::Data<GatewayRegistry>,
) -> HttpResponse {
    dispatch("monnify", parse_monnify_event(&body), &funding, &gateways)
}

/// The order update callback from VTpass. It carries our own request id (the ledger reference) and a claimed
/// terminal status.
pub fn parse_vtpass_callback(payload: &Value) -> Option<Reference> {
    if payload["type"].as_str() != Some("transaction-update") {
        return None;
    }
    payload["data"]["requestId"].as_str().filter(|id| !id.is_empty()).map(|id| Reference(id.to_string()))
}

/// VTpass order update callback.
///
/// These callbacks are unsigned, so the claimed status is never acted on directly. The callback is only a
/// reconciliation trigger: the spawned task re-queries VTpass for the authoritative status before any ledger
/// mutation, and a row that is not ours or not pending is left alone.
#[post("")]
pub async fn vtpass_callback(
    body: web::Json<Value>,
    reconcile: web::Data<ReconcileApi<SqliteDatabase>>,
    config: web::Data<ServerConfig>,
) -> HttpResponse {
    match parse_vtpass_callback(&body) {
        Some(reference) => {
            let api = reconcile.get_ref().clone();
            let window = config.funding_abandon_window;
            tokio::spawn(async move {
                match api.reconcile_one(&reference, window).await {
                    Ok(Some(tx)) => debug!("📬️ VTpass callback reconciled [{reference}]: now {}", tx.status),
                    Ok(None) => warn!("📬️ VTpass callback for unknown reference [{reference}]"),
                    Err(e) => warn!("📬️ VTpass callback reconciliation of [{reference}] failed: {e}"),
                }
            });
        },
        None => debug!("📬️ Ignoring VTpass callback without a transaction update"),
    }
    // The acknowledgement format VTpass expects before it stops re-delivering.
    HttpResponse::Ok().json(serde_json::json!({ "response": "success" }))
}

/// Classify, acknowledge, and hand the real work to a spawned task.
fn dispatch(
    tag: &'static str,
    event: GatewayEvent,
    funding: &web::Data<FundingFlowApi<SqliteDatabase>>,
    gateways: &web::Data<GatewayRegistry>,
) -> HttpResponse {
    match event {
        GatewayEvent::Ignored(event) => {
            debug!("📬️ Ignoring {tag} event '{event}'");
        },
        GatewayEvent::Unmatched(detail) => {
            error!("📬️ Unmatched {tag} webhook. Operator attention required. {detail}");
        },
        GatewayEvent::FundingUpdate { reference } => {
            let api = funding.get_ref().clone();
            tokio::spawn(async move {
                match api.settle_funding(&reference).await {
                    Ok(outcome) => debug!("📬️ Webhook settlement of [{reference}] on {tag}: {outcome:?}"),
                    Err(e) => warn!("📬️ Webhook settlement of [{reference}] on {tag} failed: {e}"),
                }
            });
        },
        GatewayEvent::VirtualAccountInflow { account_reference, provider_id } => {
            let api = funding.get_ref().clone();
            let gateways = gateways.get_ref().clone();
            tokio::spawn(async move {
                settle_inflow(tag, &api, &gateways, account_reference, provider_id).await;
            });
        },
    }
    HttpResponse::Ok().json(JsonResponse::success("ok"))
}

/// Verify an inbound transfer with its gateway, then credit the owning wallet. The amount in the webhook body is
/// never used; only the verified amount counts.
async fn settle_inflow(
    tag: &'static str,
    funding: &FundingFlowApi<SqliteDatabase>,
    gateways: &GatewayRegistry,
    account_reference: String,
    provider_id: String,
) {
    let Some(gateway) = gateways.get(tag) else {
        error!("📬️ No gateway registered under '{tag}'; transfer {provider_id} cannot be verified");
        return;
    };
    let verification = match gateway.verify(VerifyTarget::ById(provider_id.clone())).await {
        Ok(v) => v,
        Err(e) => {
            warn!("📬️ Could not verify transfer {provider_id} on {tag}: {e}. The sweep cannot recover this; the gateway will retry the webhook.");
            return;
        },
    };
    if verification.status != VerifiedStatus::Successful {
        warn!(
            "📬️ Transfer {provider_id} on {tag} verified as {:?} ({}); not crediting",
            verification.status, verification.raw_status
        );
        return;
    }
    let metadata = serde_json::json!({ "account_reference": account_reference, "via": "webhook" });
    if let Err(e) = funding
        .process_virtual_account_credit(
            tag,
            &account_reference,
            verification.amount_paid,
            verification.provider_id,
            Some(verification.raw_status),
            metadata,
        )
        .await
    {
        warn!("📬️ Could not credit transfer {provider_id} on {tag}: {e}");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn paystack_checkout_success_maps_to_a_funding_update() {
        let payload = json!({
            "event": "charge.success",
            "data": { "id": 4099260516u64, "reference": "FND-20250810-QX41QKUBSZ", "status": "success" }
        });
        let event = parse_paystack_event(&payload);
        assert_eq!(event, GatewayEvent::FundingUpdate { reference: Reference("FND-20250810-QX41QKUBSZ".into()) });
    }

    #[test]
    fn paystack_dedicated_account_credit_maps_to_an_inflow() {
        let payload = json!({
            "event": "charge.success",
            "data": {
                "id": 4099260517u64,
                "reference": "rnd-gateway-ref",
                "authorization": { "channel": "dedicated_nuban" },
                "customer": { "customer_code": "CUS_xr58yrr2ujlft9k" }
            }
        });
        let event = parse_paystack_event(&payload);
        assert_eq!(event, GatewayEvent::VirtualAccountInflow {
            account_reference: "CUS_xr58yrr2ujlft9k".into(),
            provider_id: "4099260517".into()
        });
    }

    #[test]
    fn paystack_foreign_references_raise_the_operator_alarm() {
        let payload = json!({
            "event": "charge.success",
            "data": { "id": 1, "reference": "somebody-elses-ref" }
        });
        assert!(matches!(parse_paystack_event(&payload), GatewayEvent::Unmatched(_)));
    }

    #[test]
    fn paystack_other_events_are_ignored() {
        let payload = json!({ "event": "subscription.create", "data": {} });
        assert_eq!(parse_paystack_event(&payload), GatewayEvent::Ignored("subscription.create".into()));
    }

    #[test]
    fn flutterwave_checkout_completion_maps_to_a_funding_update() {
        let payload = json!({
            "event": "charge.completed",
            "data": { "id": 285959875, "tx_ref": "FND-20250810-AAAA11BBBB", "status": "successful" }
        });
        let event = parse_flutterwave_event(&payload);
        assert_eq!(event, GatewayEvent::FundingUpdate { reference: Reference("FND-20250810-AAAA11BBBB".into()) });
    }

    #[test]
    fn flutterwave_bank_transfers_map_to_an_inflow() {
        let payload = json!({
            "event": "charge.completed",
            "data": {
                "id": 285959876,
                "tx_ref": "URF_1650000000000_12345",
                "payment_type": "bank_transfer",
                "status": "successful"
            }
        });
        let event = parse_flutterwave_event(&payload);
        assert_eq!(event, GatewayEvent::VirtualAccountInflow {
            account_reference: "URF_1650000000000_12345".into(),
            provider_id: "285959876".into()
        });
    }

    #[test]
    fn monnify_reserved_account_credit_maps_to_an_inflow() {
        let payload = json!({
            "eventType": "SUCCESSFUL_TRANSACTION",
            "eventData": {
                "transactionReference": "MNFY|8|20250810|000001",
                "paymentReference": "MNFY|8|20250810|000001",
                "product": { "type": "RESERVED_ACCOUNT", "reference": "va-42" }
            }
        });
        let event = parse_monnify_event(&payload);
        assert_eq!(event, GatewayEvent::VirtualAccountInflow {
            account_reference: "va-42".into(),
            provider_id: "MNFY|8|20250810|000001".into()
        });
    }

    #[test]
    fn monnify_checkout_payment_maps_to_a_funding_update() {
        let payload = json!({
            "eventType": "SUCCESSFUL_TRANSACTION",
            "eventData": {
                "transactionReference": "MNFY|8|20250810|000002",
                "paymentReference": "FND-20250810-ZZZZ99YYYY",
                "product": { "type": "WEB_SDK", "reference": "FND-20250810-ZZZZ99YYYY" }
            }
        });
        let event = parse_monnify_event(&payload);
        assert_eq!(event, GatewayEvent::FundingUpdate { reference: Reference("FND-20250810-ZZZZ99YYYY".into()) });
    }

    #[test]
    fn vtpass_transaction_updates_yield_our_reference() {
        let payload = json!({
            "type": "transaction-update",
            "data": {
                "code": "040",
                "requestId": "DAT-20250810-K2M4P6R8T0",
                "content": { "transactions": { "status": "reversed" } }
            }
        });
        assert_eq!(parse_vtpass_callback(&payload), Some(Reference("DAT-20250810-K2M4P6R8T0".into())));
    }

    #[test]
    fn vtpass_other_callback_types_are_dropped() {
        assert_eq!(parse_vtpass_callback(&json!({ "type": "variations-update", "data": {} })), None);
        assert_eq!(parse_vtpass_callback(&json!({ "type": "transaction-update", "data": {} })), None);
    }

    #[test]
    fn monnify_other_events_are_ignored() {
        let payload = json!({ "eventType": "SUCCESSFUL_DISBURSEMENT", "eventData": {} });
        assert_eq!(parse_monnify_event(&payload), GatewayEvent::Ignored("SUCCESSFUL_DISBURSEMENT".into()));
    }
}
