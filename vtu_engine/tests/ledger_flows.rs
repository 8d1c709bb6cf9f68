//! End-to-end flow tests against a real SQLite ledger, with scripted gateway and provider fakes standing in for
//! the upstreams.
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use serde_json::json;
use vtu_common::Kobo;
use vtu_engine::{
    db_types::{NewRechargePin, TxStatus, TxType},
    events::EventProducers,
    traits::{
        CheckoutSession,
        DedicatedAccount,
        DedicatedAccountRequest,
        FulfillmentError,
        FulfillmentProvider,
        FulfillmentStatus,
        GatewayError,
        GatewayVerification,
        InitializePayment,
        PaymentGateway,
        PurchaseOutcome,
        PurchaseRequest,
        ServiceKind,
        SweepOutcome,
        VerifiedStatus,
        VerifyTarget,
    },
    FlowError,
    FundingFlowApi,
    GatewayRegistry,
    LedgerDatabase,
    LedgerError,
    ProviderRegistry,
    PurchaseApi,
    PurchaseOrder,
    PurchaseReceipt,
    ReconcileApi,
    SqliteDatabase,
    WalletApi,
};

const fn naira(n: i64) -> Kobo {
    Kobo::from_naira(n)
}

//--------------------------------------  scripted upstream fakes  ---------------------------------------------------

#[derive(Clone)]
struct TestGateway {
    verification: Arc<Mutex<Result<GatewayVerification, GatewayError>>>,
}

impl TestGateway {
    fn new() -> Self {
        Self { verification: Arc::new(Mutex::new(Err(GatewayError::NotFound))) }
    }

    fn verify_success(&self, amount_paid: Kobo) {
        *self.verification.lock().unwrap() = Ok(GatewayVerification {
            status: VerifiedStatus::Successful,
            amount_paid,
            provider_id: "gw-12345".to_string(),
            raw_status: "success".to_string(),
        });
    }

    fn verify_failed(&self) {
        *self.verification.lock().unwrap() = Ok(GatewayVerification {
            status: VerifiedStatus::Failed,
            amount_paid: Kobo::default(),
            provider_id: "gw-12345".to_string(),
            raw_status: "abandoned".to_string(),
        });
    }

    fn verify_error(&self, e: GatewayError) {
        *self.verification.lock().unwrap() = Err(e);
    }
}

#[async_trait]
impl PaymentGateway for TestGateway {
    fn tag(&self) -> &'static str {
        "testpay"
    }

    async fn initialize(&self, request: InitializePayment) -> Result<CheckoutSession, GatewayError> {
        Ok(CheckoutSession {
            checkout_url: format!("https://pay.test/checkout/{}", request.reference),
            reference: request.reference,
        })
    }

    async fn verify(&self, _target: VerifyTarget) -> Result<GatewayVerification, GatewayError> {
        self.verification.lock().unwrap().clone()
    }

    async fn create_dedicated_account(
        &self,
        request: DedicatedAccountRequest,
    ) -> Result<DedicatedAccount, GatewayError> {
        Ok(DedicatedAccount {
            account_reference: format!("acct-ref-{}", request.user_id),
            account_number: "0123456789".to_string(),
            bank_name: "Test Bank".to_string(),
        })
    }
}

#[derive(Clone)]
struct TestProvider {
    purchase_result: Arc<Mutex<Result<PurchaseOutcome, FulfillmentError>>>,
    status_result: Arc<Mutex<Result<FulfillmentStatus, FulfillmentError>>>,
}

impl TestProvider {
    fn new() -> Self {
        Self {
            purchase_result: Arc::new(Mutex::new(Err(FulfillmentError::Transient("not scripted".into())))),
            status_result: Arc::new(Mutex::new(Ok(FulfillmentStatus::Pending))),
        }
    }

    fn on_purchase(&self, result: Result<PurchaseOutcome, FulfillmentError>) {
        *self.purchase_result.lock().unwrap() = result;
    }

    fn on_status(&self, result: Result<FulfillmentStatus, FulfillmentError>) {
        *self.status_result.lock().unwrap() = result;
    }
}

#[async_trait]
impl FulfillmentProvider for TestProvider {
    fn tag(&self) -> &'static str {
        "testvtu"
    }

    async fn price_for(&self, _service: ServiceKind, item_code: &str) -> Result<Kobo, FulfillmentError> {
        match item_code {
            "mtn-1gb" => Ok(naira(500)),
            "ikeja-prepaid" => Ok(naira(5_000)),
            _ => Err(FulfillmentError::UnknownItem(item_code.to_string())),
        }
    }

    async fn purchase(
        &self,
        _request: PurchaseRequest,
        _idempotency_key: &str,
    ) -> Result<PurchaseOutcome, FulfillmentError> {
        self.purchase_result.lock().unwrap().clone()
    }

    async fn query_status(&self, _order_id: &str) -> Result<FulfillmentStatus, FulfillmentError> {
        self.status_result.lock().unwrap().clone()
    }
}

//--------------------------------------  harness  -------------------------------------------------------------------

struct Harness {
    db: SqliteDatabase,
    gateway: TestGateway,
    provider: TestProvider,
    funding: FundingFlowApi<SqliteDatabase>,
    purchases: PurchaseApi<SqliteDatabase>,
    reconcile: ReconcileApi<SqliteDatabase>,
    wallets: WalletApi<SqliteDatabase>,
}

async fn harness() -> Harness {
    let _ = env_logger::try_init();
    // A single connection keeps every handle on the same in-memory database.
    let db = SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("Error creating database");
    let gateway = TestGateway::new();
    let provider = TestProvider::new();
    let mut gateways = GatewayRegistry::new();
    gateways.register(Arc::new(gateway.clone()));
    let mut providers = ProviderRegistry::new();
    providers.register(Arc::new(provider.clone()));
    let funding = FundingFlowApi::new(db.clone(), gateways, EventProducers::default());
    let purchases = PurchaseApi::new(db.clone(), providers, EventProducers::default());
    let reconcile = ReconcileApi::new(db.clone(), funding.clone(), purchases.clone());
    let wallets = WalletApi::new(db.clone());
    Harness { db, gateway, provider, funding, purchases, reconcile, wallets }
}

impl Harness {
    /// Put money in a wallet through the dedicated-account path.
    async fn seed_wallet(&self, user_id: i64, gross: Kobo, transfer_id: &str) {
        let request = DedicatedAccountRequest {
            user_id,
            email: format!("user{user_id}@example.com"),
            first_name: "Ada".to_string(),
            last_name: "Obi".to_string(),
            kyc_id: None,
        };
        let account = self.funding.create_virtual_account("testpay", request).await.expect("Error creating account");
        self.funding
            .process_virtual_account_credit(
                "testpay",
                &account.account_reference,
                gross,
                transfer_id.to_string(),
                Some("successful".to_string()),
                json!({}),
            )
            .await
            .expect("Error crediting transfer");
    }

    async fn balance(&self, user_id: i64) -> Kobo {
        self.wallets.balance(user_id).await.expect("Error fetching wallet").map(|w| w.balance).unwrap_or_default()
    }
}

//--------------------------------------  funding  -------------------------------------------------------------------

#[tokio::test]
async fn funding_credit_applies_fee_policy() {
    let h = harness().await;
    let session = h.funding.initialize_funding(1, naira(2_000), "ada@example.com", "testpay").await.unwrap();
    assert!(session.checkout_url.contains(&session.reference));
    h.gateway.verify_success(naira(2_000));
    let reference = session.reference.parse().unwrap();
    let outcome = h.funding.settle_funding(&reference).await.unwrap();
    assert_eq!(outcome, SweepOutcome::Credited);
    // Flat fee tier: 2,000 gross nets 1,960.
    assert_eq!(h.balance(1).await, naira(1_960));
    let tx = h.wallets.transaction(&reference).await.unwrap().unwrap();
    assert_eq!(tx.status, TxStatus::Success);
    assert_eq!(tx.amount, naira(1_960));
    assert_eq!(tx.fee, naira(40));
    assert_eq!(tx.provider_reference.as_deref(), Some("gw-12345"));
}

#[tokio::test]
async fn only_one_racing_finalizer_credits() {
    let h = harness().await;
    let session = h.funding.initialize_funding(1, naira(50_000), "ada@example.com", "testpay").await.unwrap();
    h.gateway.verify_success(naira(50_000));
    let reference: vtu_engine::db_types::Reference = session.reference.parse().unwrap();
    let f1 = h.funding.clone();
    let f2 = h.funding.clone();
    let r1 = reference.clone();
    let r2 = reference.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { f1.settle_funding(&r1).await.unwrap() }),
        tokio::spawn(async move { f2.settle_funding(&r2).await.unwrap() }),
    );
    let outcomes = [a.unwrap(), b.unwrap()];
    assert_eq!(outcomes.iter().filter(|o| **o == SweepOutcome::Credited).count(), 1);
    assert_eq!(outcomes.iter().filter(|o| **o == SweepOutcome::LostRace).count(), 1);
    // Percentage tier: exactly one 2% fee was taken.
    assert_eq!(h.balance(1).await, naira(49_000));
}

#[tokio::test]
async fn failed_funding_never_touches_the_wallet() {
    let h = harness().await;
    let session = h.funding.initialize_funding(1, naira(1_000), "ada@example.com", "testpay").await.unwrap();
    h.gateway.verify_failed();
    let reference = session.reference.parse().unwrap();
    let outcome = h.funding.settle_funding(&reference).await.unwrap();
    assert_eq!(outcome, SweepOutcome::Failed);
    assert!(h.wallets.balance(1).await.unwrap().is_none());
    let tx = h.wallets.transaction(&reference).await.unwrap().unwrap();
    assert_eq!(tx.status, TxStatus::Failed);
}

#[tokio::test]
async fn tiny_funding_amounts_are_rejected_up_front() {
    let h = harness().await;
    let err = h.funding.initialize_funding(1, Kobo::from(3_000), "ada@example.com", "testpay").await.unwrap_err();
    assert!(matches!(err, FlowError::AmountTooSmall(_)));
}

#[tokio::test]
async fn duplicate_transfer_deliveries_credit_once() {
    let h = harness().await;
    h.seed_wallet(7, naira(50_000), "tr-001").await;
    assert_eq!(h.balance(7).await, naira(49_000));
    // Same upstream transfer id delivered again; the derived reference collides and the insert is suppressed.
    let account = h.db.virtual_account_owner("acct-ref-7").await.unwrap().unwrap();
    let outcome = h
        .funding
        .process_virtual_account_credit(
            "testpay",
            &account.account_reference,
            naira(50_000),
            "tr-001".to_string(),
            Some("successful".to_string()),
            json!({}),
        )
        .await
        .unwrap();
    assert!(!outcome.is_finalized());
    assert_eq!(h.balance(7).await, naira(49_000));
}

#[tokio::test]
async fn transfers_to_unknown_accounts_are_refused() {
    let h = harness().await;
    let err = h
        .funding
        .process_virtual_account_credit("testpay", "no-such-account", naira(100), "tr-x".to_string(), None, json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::UnmatchedInflow(_)));
}

//--------------------------------------  purchases  -----------------------------------------------------------------

#[tokio::test]
async fn purchase_debits_catalog_price_and_delivers() {
    let h = harness().await;
    h.seed_wallet(1, naira(10_000), "tr-010").await;
    let before = h.balance(1).await;
    h.provider.on_purchase(Ok(PurchaseOutcome::Delivered {
        order_id: "ord-77".to_string(),
        raw_status: "delivered".to_string(),
        token: None,
        pins: vec![],
    }));
    let order = PurchaseOrder {
        service: ServiceKind::Data,
        item_code: "mtn-1gb".to_string(),
        recipient: "08030001111".to_string(),
        extras: json!({}),
    };
    let receipt = h.purchases.purchase(1, "testvtu", order).await.unwrap();
    let tx = match receipt {
        PurchaseReceipt::Delivered { transaction, .. } => transaction,
        other => panic!("Expected delivery, got {other:?}"),
    };
    assert_eq!(tx.status, TxStatus::Success);
    assert_eq!(tx.tx_type, TxType::Data);
    assert_eq!(tx.amount, naira(500));
    assert_eq!(h.balance(1).await, before - naira(500));
    let wallet = h.wallets.balance(1).await.unwrap().unwrap();
    assert_eq!(wallet.total_spent, naira(500));
}

#[tokio::test]
async fn electricity_token_lands_in_the_receipt_and_ledger() {
    let h = harness().await;
    h.seed_wallet(1, naira(50_000), "tr-011").await;
    h.provider.on_purchase(Ok(PurchaseOutcome::Delivered {
        order_id: "ord-78".to_string(),
        raw_status: "delivered".to_string(),
        token: Some("1234-5678-9012-3456".to_string()),
        pins: vec![],
    }));
    let order = PurchaseOrder {
        service: ServiceKind::Electricity,
        item_code: "ikeja-prepaid".to_string(),
        recipient: "04123456789".to_string(),
        extras: json!({}),
    };
    let receipt = h.purchases.purchase(1, "testvtu", order).await.unwrap();
    let PurchaseReceipt::Delivered { transaction, token, .. } = receipt else {
        panic!("Expected delivery");
    };
    assert_eq!(token.as_deref(), Some("1234-5678-9012-3456"));
    assert_eq!(transaction.metadata["delivered_token"], json!("1234-5678-9012-3456"));
}

#[tokio::test]
async fn pin_purchase_stores_the_pins() {
    let h = harness().await;
    h.seed_wallet(1, naira(10_000), "tr-012").await;
    let pins = vec![
        NewRechargePin {
            network: "mtn".to_string(),
            denomination: naira(200),
            pin: "1111222233334444".to_string(),
            serial: "SN-0001".to_string(),
        },
        NewRechargePin {
            network: "mtn".to_string(),
            denomination: naira(200),
            pin: "5555666677778888".to_string(),
            serial: "SN-0002".to_string(),
        },
    ];
    h.provider.on_purchase(Ok(PurchaseOutcome::Delivered {
        order_id: "ord-79".to_string(),
        raw_status: "delivered".to_string(),
        token: None,
        pins,
    }));
    let order = PurchaseOrder {
        service: ServiceKind::RechargePin,
        item_code: "mtn-1gb".to_string(),
        recipient: "self".to_string(),
        extras: json!({ "quantity": 2 }),
    };
    let receipt = h.purchases.purchase(1, "testvtu", order).await.unwrap();
    let PurchaseReceipt::Delivered { transaction, pins, .. } = receipt else {
        panic!("Expected delivery");
    };
    assert_eq!(pins.len(), 2);
    let stored = h.wallets.pins(transaction.id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].serial, "SN-0001");
}

#[tokio::test]
async fn insufficient_balance_blocks_the_purchase_without_a_ledger_row() {
    let h = harness().await;
    h.seed_wallet(1, naira(300), "tr-013").await;
    let before = h.balance(1).await;
    let order = PurchaseOrder {
        service: ServiceKind::Data,
        item_code: "mtn-1gb".to_string(),
        recipient: "08030001111".to_string(),
        extras: json!({}),
    };
    let err = h.purchases.purchase(1, "testvtu", order).await.unwrap_err();
    assert!(matches!(err, FlowError::Ledger(LedgerError::InsufficientBalance)));
    assert_eq!(h.balance(1).await, before);
    // Only the seeding transfer is on the books.
    let history = h.wallets.history(1, 0, 10).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn unknown_items_are_rejected_before_any_debit() {
    let h = harness().await;
    h.seed_wallet(1, naira(10_000), "tr-014").await;
    let before = h.balance(1).await;
    let order = PurchaseOrder {
        service: ServiceKind::Data,
        item_code: "no-such-plan".to_string(),
        recipient: "08030001111".to_string(),
        extras: json!({}),
    };
    let err = h.purchases.purchase(1, "testvtu", order).await.unwrap_err();
    assert!(matches!(err, FlowError::Fulfillment(FulfillmentError::UnknownItem(_))));
    assert_eq!(h.balance(1).await, before);
}

#[tokio::test]
async fn rejected_purchase_is_refunded() {
    let h = harness().await;
    h.seed_wallet(1, naira(10_000), "tr-015").await;
    let before = h.balance(1).await;
    h.provider.on_purchase(Err(FulfillmentError::Rejected("invalid recipient".to_string())));
    let order = PurchaseOrder {
        service: ServiceKind::Airtime,
        item_code: "mtn-1gb".to_string(),
        recipient: "0000".to_string(),
        extras: json!({}),
    };
    let receipt = h.purchases.purchase(1, "testvtu", order).await.unwrap();
    let PurchaseReceipt::Failed { transaction, reason } = receipt else {
        panic!("Expected failure");
    };
    assert_eq!(reason, "invalid recipient");
    // A refunded purchase is Reversed, not Failed: money moved and came back.
    assert_eq!(transaction.status, TxStatus::Reversed);
    assert_eq!(h.balance(1).await, before);
    let wallet = h.wallets.balance(1).await.unwrap().unwrap();
    assert!(wallet.total_spent.is_zero());
}

#[tokio::test]
async fn transient_purchase_error_keeps_the_money_debited() {
    let h = harness().await;
    h.seed_wallet(1, naira(10_000), "tr-016").await;
    let before = h.balance(1).await;
    h.provider.on_purchase(Err(FulfillmentError::Transient("upstream timeout".to_string())));
    let order = PurchaseOrder {
        service: ServiceKind::Data,
        item_code: "mtn-1gb".to_string(),
        recipient: "08030001111".to_string(),
        extras: json!({}),
    };
    let receipt = h.purchases.purchase(1, "testvtu", order).await.unwrap();
    let PurchaseReceipt::Processing { transaction } = receipt else {
        panic!("Expected a pending outcome");
    };
    assert_eq!(transaction.status, TxStatus::Pending);
    assert_eq!(h.balance(1).await, before - naira(500));
}

//--------------------------------------  reconciliation  ------------------------------------------------------------

/// A cutoff in the future makes freshly inserted rows eligible, sidestepping timestamp granularity.
fn immediately() -> Duration {
    Duration::seconds(-5)
}

#[tokio::test]
async fn sweep_confirms_a_purchase_the_submit_call_lost() {
    let h = harness().await;
    h.seed_wallet(1, naira(10_000), "tr-020").await;
    h.provider.on_purchase(Err(FulfillmentError::Transient("upstream timeout".to_string())));
    let order = PurchaseOrder {
        service: ServiceKind::Data,
        item_code: "mtn-1gb".to_string(),
        recipient: "08030001111".to_string(),
        extras: json!({}),
    };
    let receipt = h.purchases.purchase(1, "testvtu", order).await.unwrap();
    let PurchaseReceipt::Processing { transaction } = receipt else { panic!("Expected pending") };
    h.provider.on_status(Ok(FulfillmentStatus::Delivered { token: None }));
    let report = h.reconcile.sweep(immediately(), Duration::hours(24), 50).await.unwrap();
    assert_eq!(report.count_of(SweepOutcome::Delivered), 1);
    assert_eq!(report.errors, 0);
    let tx = h.wallets.transaction(&transaction.reference).await.unwrap().unwrap();
    assert_eq!(tx.status, TxStatus::Success);
}

#[tokio::test]
async fn sweep_reverses_a_purchase_the_provider_failed() {
    let h = harness().await;
    h.seed_wallet(1, naira(10_000), "tr-021").await;
    let before = h.balance(1).await;
    h.provider.on_purchase(Err(FulfillmentError::Transient("upstream timeout".to_string())));
    let order = PurchaseOrder {
        service: ServiceKind::Data,
        item_code: "mtn-1gb".to_string(),
        recipient: "08030001111".to_string(),
        extras: json!({}),
    };
    let receipt = h.purchases.purchase(1, "testvtu", order).await.unwrap();
    let PurchaseReceipt::Processing { transaction } = receipt else { panic!("Expected pending") };
    h.provider.on_status(Ok(FulfillmentStatus::Failed { raw_status: "TRANSACTION FAILED".to_string() }));
    let report = h.reconcile.sweep(immediately(), Duration::hours(24), 50).await.unwrap();
    assert_eq!(report.count_of(SweepOutcome::Reversed), 1);
    assert_eq!(h.balance(1).await, before);
    let tx = h.wallets.transaction(&transaction.reference).await.unwrap().unwrap();
    assert_eq!(tx.status, TxStatus::Reversed);
}

#[tokio::test]
async fn sweep_defers_when_the_provider_is_unreachable() {
    let h = harness().await;
    h.seed_wallet(1, naira(10_000), "tr-022").await;
    h.provider.on_purchase(Err(FulfillmentError::Transient("upstream timeout".to_string())));
    let order = PurchaseOrder {
        service: ServiceKind::Data,
        item_code: "mtn-1gb".to_string(),
        recipient: "08030001111".to_string(),
        extras: json!({}),
    };
    let receipt = h.purchases.purchase(1, "testvtu", order).await.unwrap();
    let PurchaseReceipt::Processing { transaction } = receipt else { panic!("Expected pending") };
    h.provider.on_status(Err(FulfillmentError::Transient("still down".to_string())));
    let report = h.reconcile.sweep(immediately(), Duration::hours(24), 50).await.unwrap();
    assert_eq!(report.count_of(SweepOutcome::Deferred), 1);
    // Deferral must not move money or state.
    let tx = h.wallets.transaction(&transaction.reference).await.unwrap().unwrap();
    assert_eq!(tx.status, TxStatus::Pending);
}

#[tokio::test]
async fn sweep_abandons_a_funding_the_gateway_never_saw() {
    let h = harness().await;
    let session = h.funding.initialize_funding(1, naira(1_000), "ada@example.com", "testpay").await.unwrap();
    h.gateway.verify_error(GatewayError::NotFound);
    // Window already lapsed, so the attempt is written off on the first sweep.
    let report = h.reconcile.sweep(immediately(), immediately(), 50).await.unwrap();
    assert_eq!(report.count_of(SweepOutcome::Failed), 1);
    let reference = session.reference.parse().unwrap();
    let tx = h.wallets.transaction(&reference).await.unwrap().unwrap();
    assert_eq!(tx.status, TxStatus::Failed);
    assert!(h.wallets.balance(1).await.unwrap().is_none());
}

#[tokio::test]
async fn sweep_gives_a_fresh_unseen_funding_more_time() {
    let h = harness().await;
    let session = h.funding.initialize_funding(1, naira(1_000), "ada@example.com", "testpay").await.unwrap();
    h.gateway.verify_error(GatewayError::NotFound);
    let report = h.reconcile.sweep(immediately(), Duration::hours(24), 50).await.unwrap();
    assert_eq!(report.count_of(SweepOutcome::StillPending), 1);
    let reference = session.reference.parse().unwrap();
    let tx = h.wallets.transaction(&reference).await.unwrap().unwrap();
    assert_eq!(tx.status, TxStatus::Pending);
}

#[tokio::test]
async fn inline_status_check_settles_a_pending_funding() {
    let h = harness().await;
    let session = h.funding.initialize_funding(1, naira(2_000), "ada@example.com", "testpay").await.unwrap();
    h.gateway.verify_success(naira(2_000));
    let reference = session.reference.parse().unwrap();
    let tx = h.reconcile.reconcile_one(&reference, Duration::hours(24)).await.unwrap().unwrap();
    assert_eq!(tx.status, TxStatus::Success);
    assert_eq!(h.balance(1).await, naira(1_960));
}

#[tokio::test]
async fn sweep_batch_limit_is_respected() {
    let h = harness().await;
    for _ in 0..3 {
        let _ = h.funding.initialize_funding(1, naira(1_000), "ada@example.com", "testpay").await.unwrap();
    }
    h.gateway.verify_error(GatewayError::Transient("down".to_string()));
    let report = h.reconcile.sweep(immediately(), Duration::hours(24), 2).await.unwrap();
    assert_eq!(report.processed(), 2);
}

//--------------------------------------  refund correction  ---------------------------------------------------------

#[tokio::test]
async fn refund_correction_redebits_within_the_window() {
    let h = harness().await;
    h.seed_wallet(1, naira(10_000), "tr-030").await;
    h.provider.on_purchase(Err(FulfillmentError::Rejected("provider said no".to_string())));
    let order = PurchaseOrder {
        service: ServiceKind::Data,
        item_code: "mtn-1gb".to_string(),
        recipient: "08030001111".to_string(),
        extras: json!({}),
    };
    let receipt = h.purchases.purchase(1, "testvtu", order).await.unwrap();
    let PurchaseReceipt::Failed { transaction, .. } = receipt else { panic!("Expected failure") };
    let refunded = h.balance(1).await;
    let outcome = h.purchases.correct_refund(&transaction.reference, Duration::hours(24)).await.unwrap();
    let vtu_engine::traits::RedebitOutcome::Corrected { original, compensation } = outcome else {
        panic!("Expected a correction");
    };
    assert_eq!(original.status, TxStatus::Success);
    assert_eq!(compensation.reference.as_str(), format!("COR-{}", transaction.reference));
    assert_eq!(h.balance(1).await, refunded - naira(500));
    // Corrections are one-shot.
    let again = h.purchases.correct_refund(&transaction.reference, Duration::hours(24)).await.unwrap();
    assert!(matches!(again, vtu_engine::traits::RedebitOutcome::NotCorrectable));
}

#[tokio::test]
async fn refund_correction_declined_when_the_balance_is_spent() {
    let h = harness().await;
    h.seed_wallet(1, naira(1_000), "tr-031").await;
    h.provider.on_purchase(Err(FulfillmentError::Rejected("provider said no".to_string())));
    let order = PurchaseOrder {
        service: ServiceKind::Data,
        item_code: "mtn-1gb".to_string(),
        recipient: "08030001111".to_string(),
        extras: json!({}),
    };
    let receipt = h.purchases.purchase(1, "testvtu", order).await.unwrap();
    let PurchaseReceipt::Failed { transaction, .. } = receipt else { panic!("Expected failure") };
    // Spend the refund before the correction lands.
    h.provider.on_purchase(Ok(PurchaseOutcome::Delivered {
        order_id: "ord-90".to_string(),
        raw_status: "delivered".to_string(),
        token: None,
        pins: vec![],
    }));
    let order = PurchaseOrder {
        service: ServiceKind::Data,
        item_code: "mtn-1gb".to_string(),
        recipient: "08030001111".to_string(),
        extras: json!({}),
    };
    let _ = h.purchases.purchase(1, "testvtu", order).await.unwrap();
    let outcome = h.purchases.correct_refund(&transaction.reference, Duration::hours(24)).await.unwrap();
    assert!(matches!(outcome, vtu_engine::traits::RedebitOutcome::InsufficientBalance));
    let tx = h.wallets.transaction(&transaction.reference).await.unwrap().unwrap();
    assert_eq!(tx.status, TxStatus::Reversed);
}

#[tokio::test]
async fn refund_correction_declined_outside_the_window() {
    let h = harness().await;
    h.seed_wallet(1, naira(10_000), "tr-032").await;
    h.provider.on_purchase(Err(FulfillmentError::Rejected("provider said no".to_string())));
    let order = PurchaseOrder {
        service: ServiceKind::Data,
        item_code: "mtn-1gb".to_string(),
        recipient: "08030001111".to_string(),
        extras: json!({}),
    };
    let receipt = h.purchases.purchase(1, "testvtu", order).await.unwrap();
    let PurchaseReceipt::Failed { transaction, .. } = receipt else { panic!("Expected failure") };
    // A negative window is unambiguously lapsed regardless of timestamp granularity.
    let outcome = h.purchases.correct_refund(&transaction.reference, Duration::seconds(-1)).await.unwrap();
    assert!(matches!(outcome, vtu_engine::traits::RedebitOutcome::NotCorrectable));
}
