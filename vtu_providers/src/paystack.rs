//! Paystack payment gateway adapter.
//!
//! Card and bank-transfer checkouts plus dedicated virtual accounts (their "dedicated NUBAN" product). Paystack
//! amounts are already in kobo, which makes it the one upstream that needs no unit conversion.
use async_trait::async_trait;
use log::*;
use reqwest::{header::HeaderValue, Method};
use serde::Deserialize;
use serde_json::json;
use vtu_common::Kobo;
use vtu_engine::traits::{
    CheckoutSession,
    DedicatedAccount,
    DedicatedAccountRequest,
    GatewayError,
    GatewayVerification,
    InitializePayment,
    PaymentGateway,
    VerifiedStatus,
    VerifyTarget,
};

use crate::{
    config::PaystackConfig,
    transport::{gateway_error, RestClient},
};

#[derive(Clone)]
pub struct Paystack {
    config: PaystackConfig,
    client: RestClient,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitData {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct TxData {
    id: u64,
    status: String,
    amount: i64,
    gateway_response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomerData {
    customer_code: String,
}

#[derive(Debug, Deserialize)]
struct NubanData {
    account_number: String,
    bank: NubanBank,
}

#[derive(Debug, Deserialize)]
struct NubanBank {
    name: String,
}

impl Paystack {
    pub fn new(config: PaystackConfig) -> Result<Self, GatewayError> {
        let mut headers = RestClient::json_headers();
        let auth = format!("Bearer {}", config.secret_key.reveal());
        let val = HeaderValue::from_str(&auth).map_err(|e| GatewayError::Unknown(e.to_string()))?;
        headers.insert("Authorization", val);
        let client =
            RestClient::new(config.base_url.clone(), headers).map_err(|e| GatewayError::Unknown(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T, GatewayError> {
        if !envelope.status {
            return Err(GatewayError::Rejected(envelope.message));
        }
        envelope.data.ok_or_else(|| GatewayError::Unknown("missing data in successful response".to_string()))
    }
}

fn normalize_verification(tx: TxData) -> GatewayVerification {
    let status = match tx.status.as_str() {
        "success" => VerifiedStatus::Successful,
        "failed" | "reversed" => VerifiedStatus::Failed,
        // "abandoned", "ongoing", "pending", "queued" and friends: the checkout may still complete.
        _ => VerifiedStatus::Pending,
    };
    GatewayVerification {
        status,
        amount_paid: Kobo::from(tx.amount),
        provider_id: tx.id.to_string(),
        raw_status: tx.gateway_response.unwrap_or(tx.status),
    }
}

#[async_trait]
impl PaymentGateway for Paystack {
    fn tag(&self) -> &'static str {
        "paystack"
    }

    async fn initialize(&self, request: InitializePayment) -> Result<CheckoutSession, GatewayError> {
        let body = json!({
            "email": request.email,
            "amount": request.amount.value(),
            "reference": request.reference,
        });
        let envelope: Envelope<InitData> = self
            .client
            .send(Method::POST, "/transaction/initialize", &[], Some(&body), None)
            .await
            .map_err(gateway_error)?;
        let data = Self::unwrap_envelope(envelope)?;
        debug!("💳️ Paystack checkout created for [{}]", data.reference);
        Ok(CheckoutSession { checkout_url: data.authorization_url, reference: data.reference })
    }

    async fn verify(&self, target: VerifyTarget) -> Result<GatewayVerification, GatewayError> {
        let path = match &target {
            VerifyTarget::ByReference(r) => format!("/transaction/verify/{r}"),
            VerifyTarget::ById(id) => format!("/transaction/{id}"),
        };
        let envelope: Envelope<TxData> =
            self.client.send::<_, ()>(Method::GET, &path, &[], None, None).await.map_err(gateway_error)?;
        let data = Self::unwrap_envelope(envelope)?;
        trace!("💳️ Paystack reports {} for {}", data.status, target.value());
        Ok(normalize_verification(data))
    }

    async fn create_dedicated_account(
        &self,
        request: DedicatedAccountRequest,
    ) -> Result<DedicatedAccount, GatewayError> {
        let body = json!({
            "email": request.email,
            "first_name": request.first_name,
            "last_name": request.last_name,
        });
        let envelope: Envelope<CustomerData> =
            self.client.send(Method::POST, "/customer", &[], Some(&body), None).await.map_err(gateway_error)?;
        let customer = Self::unwrap_envelope(envelope)?;
        let mut body = json!({
            "customer": customer.customer_code,
            "preferred_bank": self.config.preferred_bank,
        });
        if let Some(bvn) = &request.kyc_id {
            body["bvn"] = json!(bvn);
        }
        let envelope: Envelope<NubanData> = self
            .client
            .send(Method::POST, "/dedicated_account", &[], Some(&body), None)
            .await
            .map_err(gateway_error)?;
        let nuban = Self::unwrap_envelope(envelope)?;
        info!("💳️ Paystack assigned account {} at {} to user {}", nuban.account_number, nuban.bank.name, request.user_id);
        Ok(DedicatedAccount {
            account_reference: customer.customer_code,
            account_number: nuban.account_number,
            bank_name: nuban.bank.name,
        })
    }
}
