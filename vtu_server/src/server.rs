//! Server assembly: adapters, flow APIs, event handlers, background sweep, and the actix application itself.
use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use vtu_engine::{
    events::{EventHandlers, EventHooks},
    FundingFlowApi,
    GatewayRegistry,
    ProviderRegistry,
    PurchaseApi,
    ReconcileApi,
    SqliteDatabase,
    WalletApi,
};
use vtu_providers::{
    ClubKonnect,
    ClubKonnectConfig,
    Flutterwave,
    FlutterwaveConfig,
    Monnify,
    MonnifyConfig,
    Paystack,
    PaystackConfig,
    Vtpass,
    VtpassConfig,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    middleware::{SignatureScheme, WebhookSignatureFactory},
    routes,
    sweep_worker::start_sweep_worker,
    webhook_routes,
};

const DB_POOL_SIZE: u32 = 16;
const EVENT_BUFFER_SIZE: usize = 25;

/// Everything a worker thread needs to serve requests. Cheap to clone; the database pool and the adapter clients
/// are all shared behind `Arc`s.
#[derive(Clone)]
pub struct ServerContext {
    pub config: ServerConfig,
    pub gateways: GatewayRegistry,
    pub funding: FundingFlowApi<SqliteDatabase>,
    pub purchases: PurchaseApi<SqliteDatabase>,
    pub reconcile: ReconcileApi<SqliteDatabase>,
    pub wallets: WalletApi<SqliteDatabase>,
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let context = build_context(config.clone()).await?;
    let _sweeper = start_sweep_worker(context.reconcile.clone(), &config);
    let srv = create_server_instance(context)?;
    srv.await.map_err(|e| ServerError::BackendError(e.to_string()))
}

/// Wire the database, the upstream adapters and the flow APIs together and start the event handlers.
pub async fn build_context(config: ServerConfig) -> Result<ServerContext, ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, DB_POOL_SIZE)
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not open {}: {e}", config.database_url)))?;
    let gateways = build_gateways()?;
    let providers = build_providers()?;
    info!("🛒️ Gateways: {gateways:?}. Providers: {providers:?}");
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, notification_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let funding = FundingFlowApi::new(db.clone(), gateways.clone(), producers.clone());
    let purchases = PurchaseApi::new(db.clone(), providers, producers);
    let reconcile = ReconcileApi::new(db.clone(), funding.clone(), purchases.clone());
    let wallets = WalletApi::new(db);
    Ok(ServerContext { config, gateways, funding, purchases, reconcile, wallets })
}

fn build_gateways() -> Result<GatewayRegistry, ServerError> {
    let mut registry = GatewayRegistry::new();
    let paystack =
        Paystack::new(PaystackConfig::new_from_env_or_default()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let flutterwave = Flutterwave::new(FlutterwaveConfig::new_from_env_or_default())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let monnify =
        Monnify::new(MonnifyConfig::new_from_env_or_default()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    registry.register(Arc::new(paystack)).register(Arc::new(flutterwave)).register(Arc::new(monnify));
    Ok(registry)
}

fn build_providers() -> Result<ProviderRegistry, ServerError> {
    let mut registry = ProviderRegistry::new();
    let vtpass =
        Vtpass::new(VtpassConfig::new_from_env_or_default()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let clubkonnect = ClubKonnect::new(ClubKonnectConfig::new_from_env_or_default())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    registry.register(Arc::new(vtpass)).register(Arc::new(clubkonnect));
    Ok(registry)
}

/// The notifier. Fire-and-forget by construction: these run on their own task off an event channel and can never
/// roll back a committed ledger mutation.
fn notification_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_wallet_credited(|event| {
        Box::pin(async move {
            info!("📬️💰️ User {} was credited {} ([{}])", event.user_id, event.amount, event.transaction.reference);
        })
    });
    hooks.on_transaction_finalized(|event| {
        Box::pin(async move {
            let tx = &event.transaction;
            info!("📬️ Transaction [{}] finalized as {} ({} {})", tx.reference, tx.status, tx.tx_type, tx.amount);
        })
    });
    hooks
}

pub fn create_server_instance(context: ServerContext) -> Result<Server, ServerError> {
    let config = context.config.clone();
    let srv = HttpServer::new(move || {
        let paystack_sig = WebhookSignatureFactory::new(
            SignatureScheme::HmacSha512 { header: "x-paystack-signature" },
            context.config.paystack_webhook_secret.clone(),
            context.config.skip_webhook_signature_checks,
        );
        let monnify_sig = WebhookSignatureFactory::new(
            SignatureScheme::HmacSha512 { header: "monnify-signature" },
            context.config.monnify_webhook_secret.clone(),
            context.config.skip_webhook_signature_checks,
        );
        let flutterwave_sig = WebhookSignatureFactory::new(
            SignatureScheme::StaticToken { header: "verif-hash" },
            context.config.flutterwave_verif_hash.clone(),
            context.config.skip_webhook_signature_checks,
        );
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("vtu::access_log"))
            .app_data(web::Data::new(context.config.clone()))
            .app_data(web::Data::new(context.gateways.clone()))
            .app_data(web::Data::new(context.funding.clone()))
            .app_data(web::Data::new(context.purchases.clone()))
            .app_data(web::Data::new(context.reconcile.clone()))
            .app_data(web::Data::new(context.wallets.clone()))
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
            .service(
                web::scope("/webhooks/flutterwave")
                    .wrap(flutterwave_sig)
                    .service(webhook_routes::flutterwave_webhook),
            )
            .service(web::scope("/webhooks/monnify").wrap(monnify_sig).service(webhook_routes::monnify_webhook))
            .service(web::scope("/webhooks/vtpass").service(webhook_routes::vtpass_callback))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))
    .map_err(|e| ServerError::InitializeError(format!("Could not bind {}:{}. {e}", config.host, config.port)))?;
    Ok(srv.run())
}
