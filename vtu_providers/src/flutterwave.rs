//! Flutterwave payment gateway adapter.
//!
//! Flutterwave speaks naira decimals on the wire, so amounts are converted at this boundary and nowhere else.
//! Verification supports both their numeric transaction id (what webhooks carry) and our own `tx_ref`.
use async_trait::async_trait;
use log::*;
use reqwest::{header::HeaderValue, Method};
use serde::Deserialize;
use serde_json::{json, Value};
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
    config::FlutterwaveConfig,
    transport::{gateway_error, kobo_from_naira_value, naira_string, RestClient},
};

#[derive(Clone)]
pub struct Flutterwave {
    config: FlutterwaveConfig,
    client: RestClient,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    message: String,
    data: Option<Value>,
}

impl Flutterwave {
    pub fn new(config: FlutterwaveConfig) -> Result<Self, GatewayError> {
        let mut headers = RestClient::json_headers();
        let auth = format!("Bearer {}", config.secret_key.reveal());
        let val = HeaderValue::from_str(&auth).map_err(|e| GatewayError::Unknown(e.to_string()))?;
        headers.insert("Authorization", val);
        let client =
            RestClient::new(config.base_url.clone(), headers).map_err(|e| GatewayError::Unknown(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn unwrap_envelope(envelope: Envelope) -> Result<Value, GatewayError> {
        if envelope.status != "success" {
            return Err(GatewayError::Rejected(envelope.message));
        }
        envelope.data.ok_or_else(|| GatewayError::Unknown("missing data in successful response".to_string()))
    }
}

fn normalize_verification(data: &Value) -> Result<GatewayVerification, GatewayError> {
    let raw_status = data["status"].as_str().unwrap_or_default().to_string();
    let status = match raw_status.as_str() {
        "successful" => VerifiedStatus::Successful,
        "failed" | "cancelled" => VerifiedStatus::Failed,
        _ => VerifiedStatus::Pending,
    };
    // charged_amount can exceed amount when fees are passed on; amount is what the customer meant to pay and
    // what settlement credits from.
    let amount_paid = kobo_from_naira_value(&data["amount"])
        .ok_or_else(|| GatewayError::Unknown(format!("unparseable amount: {}", data["amount"])))?;
    let provider_id = match &data["id"] {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => return Err(GatewayError::Unknown(format!("unparseable transaction id: {other}"))),
    };
    Ok(GatewayVerification { status, amount_paid, provider_id, raw_status })
}

#[async_trait]
impl PaymentGateway for Flutterwave {
    fn tag(&self) -> &'static str {
        "flutterwave"
    }

    async fn initialize(&self, request: InitializePayment) -> Result<CheckoutSession, GatewayError> {
        let body = json!({
            "tx_ref": request.reference,
            "amount": naira_string(request.amount),
            "currency": "NGN",
            "redirect_url": self.config.redirect_url,
            "customer": { "email": request.email },
        });
        let envelope: Envelope =
            self.client.send(Method::POST, "/v3/payments", &[], Some(&body), None).await.map_err(gateway_error)?;
        let data = Self::unwrap_envelope(envelope)?;
        let link = data["link"]
            .as_str()
            .ok_or_else(|| GatewayError::Unknown("payment response carried no checkout link".to_string()))?;
        debug!("💳️ Flutterwave checkout created for [{}]", request.reference);
        Ok(CheckoutSession { checkout_url: link.to_string(), reference: request.reference })
    }

    async fn verify(&self, target: VerifyTarget) -> Result<GatewayVerification, GatewayError> {
        let envelope: Envelope = match &target {
            VerifyTarget::ById(id) => {
                let path = format!("/v3/transactions/{id}/verify");
                self.client.send::<_, ()>(Method::GET, &path, &[], None, None).await.map_err(gateway_error)?
            },
            VerifyTarget::ByReference(r) => {
                let params = [("tx_ref", r.clone())];
                self.client
                    .send::<_, ()>(Method::GET, "/v3/transactions/verify_by_reference", &params, None, None)
                    .await
                    .map_err(gateway_error)?
            },
        };
        let data = Self::unwrap_envelope(envelope)?;
        normalize_verification(&data)
    }

    async fn create_dedicated_account(
        &self,
        request: DedicatedAccountRequest,
    ) -> Result<DedicatedAccount, GatewayError> {
        let mut body = json!({
            "email": request.email,
            "is_permanent": true,
            "tx_ref": format!("va-{}", request.user_id),
            "firstname": request.first_name,
            "lastname": request.last_name,
        });
        if let Some(bvn) = &request.kyc_id {
            body["bvn"] = json!(bvn);
        }
        let envelope: Envelope = self
            .client
            .send(Method::POST, "/v3/virtual-account-numbers", &[], Some(&body), None)
            .await
            .map_err(gateway_error)?;
        let data = Self::unwrap_envelope(envelope)?;
        let account_reference = data["order_ref"]
            .as_str()
            .ok_or_else(|| GatewayError::Unknown("virtual account response carried no order_ref".to_string()))?;
        let account_number = data["account_number"]
            .as_str()
            .ok_or_else(|| GatewayError::Unknown("virtual account response carried no account number".to_string()))?;
        let bank_name = data["bank_name"].as_str().unwrap_or("Unknown bank");
        info!("💳️ Flutterwave assigned account {account_number} at {bank_name} to user {}", request.user_id);
        Ok(DedicatedAccount {
            account_reference: account_reference.to_string(),
            account_number: account_number.to_string(),
            bank_name: bank_name.to_string(),
        })
    }
}
