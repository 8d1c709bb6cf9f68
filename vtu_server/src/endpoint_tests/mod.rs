//! Route tests against a real in-memory ledger, with the upstream adapters mocked out.
mod mocks;

use std::sync::Arc;

use actix_web::{
    body::BoxBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    http::StatusCode,
    test,
    web,
    App,
    Error,
};
use mocks::{MockGateway, MockProvider};
use serde_json::{json, Value};
use vtu_common::{Kobo, Secret};
use vtu_engine::{
    events::EventProducers,
    db_types::VirtualAccountCredit,
    traits::{CheckoutSession, GatewayVerification, LedgerDatabase, PurchaseOutcome, VerifiedStatus},
    FundingFlowApi,
    GatewayRegistry,
    ProviderRegistry,
    PurchaseApi,
    ReconcileApi,
    SqliteDatabase,
    WalletApi,
};

use crate::{
    config::ServerConfig,
    helpers::hmac_sha512_hex,
    middleware::{SignatureScheme, WebhookSignatureFactory},
    routes,
    server::ServerContext,
    webhook_routes,
};

const WEBHOOK_SECRET: &str = "test-webhook-secret";

// A single connection, or each pooled connection would get its own empty in-memory database.
async fn test_context(gateway: MockGateway, provider: MockProvider) -> (ServerContext, SqliteDatabase) {
    let db = SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("in-memory database");
    let mut gateways = GatewayRegistry::new();
    gateways.register(Arc::new(gateway));
    let mut providers = ProviderRegistry::new();
    providers.register(Arc::new(provider));
    let producers = EventProducers::default();
    let funding = FundingFlowApi::new(db.clone(), gateways.clone(), producers.clone());
    let purchases = PurchaseApi::new(db.clone(), providers, producers);
    let reconcile = ReconcileApi::new(db.clone(), funding.clone(), purchases.clone());
    let wallets = WalletApi::new(db.clone());
    let config = ServerConfig {
        paystack_webhook_secret: Secret::new(WEBHOOK_SECRET.to_string()),
        ..Default::default()
    };
    (ServerContext { config, gateways, funding, purchases, reconcile, wallets }, db)
}

fn test_app(
    ctx: ServerContext,
) -> App<
    impl ServiceFactory<ServiceRequest, Config = (), Response = ServiceResponse<BoxBody>, Error = Error, InitError = ()>,
> {
    let paystack_sig = WebhookSignatureFactory::new(
        SignatureScheme::HmacSha512 { header: "x-paystack-signature" },
        ctx.config.paystack_webhook_secret.clone(),
        ctx.config.skip_webhook_signature_checks,
    );
    App::new()
        .app_data(web::Data::new(ctx.config.clone()))
        .app_data(web::Data::new(ctx.gateways.clone()))
        .app_data(web::Data::new(ctx.funding.clone()))
        .app_data(web::Data::new(ctx.purchases.clone()))
        .app_data(web::Data::new(ctx.reconcile.clone()))
        .app_data(web::Data::new(ctx.wallets.clone()))
        .service(routes::health)
        .service(routes::fund_wallet)
        .service(routes::create_virtual_account)
        .service(routes::wallet_balance)
        .service(routes::wallet_history)
        .service(routes::transaction_detail)
        .service(routes::transaction_pins)
        .service(routes::purchase)
        .service(routes::correct_refund)
        .service(web::scope("/webhooks/paystack").wrap(paystack_sig).service(webhook_routes::paystack_webhook))
}

fn paystack_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_tag().returning(|| "paystack");
    gateway
}

fn vtpass_provider() -> MockProvider {
    let mut provider = MockProvider::new();
    provider.expect_tag().returning(|| "vtpass");
    provider
}

async fn seed_wallet(db: &SqliteDatabase, user_id: i64, amount: Kobo) {
    let credit = VirtualAccountCredit {
        user_id,
        gross: amount,
        net: amount,
        gateway: "paystack".to_string(),
        provider_id: format!("seed-{user_id}"),
        provider_status: None,
        metadata: json!({}),
    };
    db.credit_virtual_account(credit).await.expect("seed credit");
}

#[actix_web::test]
async fn health_check_works() {
    let (ctx, _db) = test_context(paystack_gateway(), vtpass_provider()).await;
    let app = test::init_service(test_app(ctx)).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = test::read_body(response).await;
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn funding_round_trip_through_checkout_and_status_check() {
    let mut gateway = paystack_gateway();
    gateway.expect_initialize().returning(|req| {
        Ok(CheckoutSession { checkout_url: "https://checkout.test/abc123".into(), reference: req.reference })
    });
    gateway.expect_verify().returning(|_| {
        Ok(GatewayVerification {
            status: VerifiedStatus::Successful,
            amount_paid: Kobo::from_naira(2_000),
            provider_id: "PS-881".into(),
            raw_status: "success".into(),
        })
    });
    let (ctx, _db) = test_context(gateway, vtpass_provider()).await;
    let app = test::init_service(test_app(ctx)).await;

    let req = test::TestRequest::post()
        .uri("/wallet/1/fund")
        .set_json(json!({ "amount": 200_000, "email": "ada@example.com" }))
        .to_request();
    let session: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(session["checkout_url"], "https://checkout.test/abc123");
    let reference = session["reference"].as_str().expect("reference in session");

    // Nothing is credited until settlement; there is no wallet yet.
    let req = test::TestRequest::get().uri("/wallet/1").to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The detail read runs the inline status check, which verifies and credits.
    let req = test::TestRequest::get().uri(&format!("/wallet/1/transactions/{reference}")).to_request();
    let tx: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(tx["status"], "Success");

    // 2,000 naira gross, 40 naira flat fee.
    let req = test::TestRequest::get().uri("/wallet/1").to_request();
    let wallet: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(wallet["balance"], 196_000);
}

#[actix_web::test]
async fn underfunded_checkout_requests_are_rejected() {
    let (ctx, _db) = test_context(paystack_gateway(), vtpass_provider()).await;
    let app = test::init_service(test_app(ctx)).await;
    let req = test::TestRequest::post()
        .uri("/wallet/1/fund")
        .set_json(json!({ "amount": 3_000, "email": "ada@example.com" }))
        .to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn purchases_debit_the_catalog_price() {
    let mut provider = vtpass_provider();
    provider.expect_price_for().returning(|_, _| Ok(Kobo::from_naira(500)));
    provider.expect_purchase().returning(|_, key| {
        Ok(PurchaseOutcome::Delivered {
            order_id: key.to_string(),
            raw_status: "delivered".into(),
            token: None,
            pins: Vec::new(),
        })
    });
    let (ctx, db) = test_context(paystack_gateway(), provider).await;
    seed_wallet(&db, 7, Kobo::from_naira(10_000)).await;
    let app = test::init_service(test_app(ctx)).await;

    let req = test::TestRequest::post()
        .uri("/purchase/7/airtime")
        .set_json(json!({ "item_code": "mtn:500", "recipient": "08031234567" }))
        .to_request();
    let receipt: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(receipt["status"], "delivered");
    assert_eq!(receipt["transaction"]["amount"], 50_000);

    let req = test::TestRequest::get().uri("/wallet/7").to_request();
    let wallet: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(wallet["balance"], 950_000);
}

#[actix_web::test]
async fn purchases_beyond_the_balance_are_refused() {
    let mut provider = vtpass_provider();
    provider.expect_price_for().returning(|_, _| Ok(Kobo::from_naira(500)));
    let (ctx, db) = test_context(paystack_gateway(), provider).await;
    seed_wallet(&db, 8, Kobo::from_naira(100)).await;
    let app = test::init_service(test_app(ctx)).await;

    let req = test::TestRequest::post()
        .uri("/purchase/8/airtime")
        .set_json(json!({ "item_code": "mtn:500", "recipient": "08031234567" }))
        .to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
}

#[actix_web::test]
async fn unknown_service_segments_are_rejected() {
    let (ctx, _db) = test_context(paystack_gateway(), vtpass_provider()).await;
    let app = test::init_service(test_app(ctx)).await;
    let req = test::TestRequest::post()
        .uri("/purchase/1/lottery")
        .set_json(json!({ "item_code": "x", "recipient": "y" }))
        .to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn webhooks_with_a_valid_signature_are_accepted() {
    let (ctx, _db) = test_context(paystack_gateway(), vtpass_provider()).await;
    let app = test::init_service(test_app(ctx)).await;
    let body = serde_json::to_vec(&json!({ "event": "subscription.create", "data": {} })).unwrap();
    let signature = hmac_sha512_hex(WEBHOOK_SECRET, &body);
    let req = test::TestRequest::post()
        .uri("/webhooks/paystack")
        .insert_header(("x-paystack-signature", signature))
        .insert_header(("content-type", "application/json"))
        .set_payload(body)
        .to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[actix_web::test]
async fn webhooks_with_a_bad_signature_get_an_empty_401() {
    let (ctx, _db) = test_context(paystack_gateway(), vtpass_provider()).await;
    let app = test::init_service(test_app(ctx)).await;
    let body = serde_json::to_vec(&json!({ "event": "charge.success", "data": {} })).unwrap();
    let req = test::TestRequest::post()
        .uri("/webhooks/paystack")
        .insert_header(("x-paystack-signature", "deadbeef"))
        .insert_header(("content-type", "application/json"))
        .set_payload(body)
        .to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = test::read_body(response).await;
    assert!(body.is_empty());
}

#[actix_web::test]
async fn unsigned_webhooks_get_an_empty_401() {
    let (ctx, _db) = test_context(paystack_gateway(), vtpass_provider()).await;
    let app = test::init_service(test_app(ctx)).await;
    let req = test::TestRequest::post()
        .uri("/webhooks/paystack")
        .insert_header(("content-type", "application/json"))
        .set_payload("{}")
        .to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn history_pagination_defaults_are_applied() {
    let (ctx, db) = test_context(paystack_gateway(), vtpass_provider()).await;
    seed_wallet(&db, 3, Kobo::from_naira(1_000)).await;
    let app = test::init_service(test_app(ctx)).await;
    let req = test::TestRequest::get().uri("/wallet/3/transactions").to_request();
    let history: Value = test::call_and_read_body_json(&app, req).await;
    let rows = history.as_array().expect("an array of transactions");
    assert_eq!(rows.len(), 1);
    assert!(rows[0]["reference"].as_str().unwrap().starts_with("VA-IN-"));
}
