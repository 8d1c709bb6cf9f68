use async_trait::async_trait;
use mockall::mock;
use vtu_common::Kobo;
use vtu_engine::traits::{
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
    VerifyTarget,
};

mock! {
    pub Gateway {}

    #[async_trait]
    impl PaymentGateway for Gateway {
        fn tag(&self) -> &'static str;
        async fn initialize(&self, request: InitializePayment) -> Result<CheckoutSession, GatewayError>;
        async fn verify(&self, target: VerifyTarget) -> Result<GatewayVerification, GatewayError>;
        async fn create_dedicated_account(
            &self,
            request: DedicatedAccountRequest,
        ) -> Result<DedicatedAccount, GatewayError>;
    }
}

mock! {
    pub Provider {}

    #[async_trait]
    impl FulfillmentProvider for Provider {
        fn tag(&self) -> &'static str;
        async fn price_for(&self, service: ServiceKind, item_code: &str) -> Result<Kobo, FulfillmentError>;
        async fn purchase(
            &self,
            request: PurchaseRequest,
            idempotency_key: &str,
        ) -> Result<PurchaseOutcome, FulfillmentError>;
        async fn query_status(&self, order_id: &str) -> Result<FulfillmentStatus, FulfillmentError>;
    }
}
