//! Monnify payment gateway adapter.
//!
//! Monnify authenticates with short-lived bearer tokens obtained from a login endpoint. The token is cached and
//! refreshed proactively a margin before expiry; a 401 slipping through anyway invalidates the cache and the call
//! is retried once with a fresh token, so callers never see a stale-token failure for a healthy gateway.
use std::sync::Arc;

use async_trait::async_trait;
use base64::prelude::*;
use chrono::{DateTime, Duration, Utc};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Method,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
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
    config::MonnifyConfig,
    transport::{gateway_error, kobo_from_naira_value, naira_string, RestClient, TransportError},
};

/// Refresh this long before the reported expiry, so a token never dies mid-request.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Clone)]
pub struct Monnify {
    config: MonnifyConfig,
    client: RestClient,
    token: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "requestSuccessful")]
    request_successful: bool,
    #[serde(rename = "responseMessage")]
    response_message: String,
    #[serde(rename = "responseBody")]
    response_body: Option<Value>,
}

impl Monnify {
    pub fn new(config: MonnifyConfig) -> Result<Self, GatewayError> {
        let client = RestClient::new(config.base_url.clone(), RestClient::json_headers())
            .map_err(|e| GatewayError::Unknown(e.to_string()))?;
        Ok(Self { config, client, token: Arc::new(RwLock::new(None)) })
    }

    async fn login(&self) -> Result<CachedToken, GatewayError> {
        let credentials =
            BASE64_STANDARD.encode(format!("{}:{}", self.config.api_key, self.config.secret_key.reveal()));
        let mut headers = HeaderMap::with_capacity(1);
        let val =
            HeaderValue::from_str(&format!("Basic {credentials}")).map_err(|e| GatewayError::Unknown(e.to_string()))?;
        headers.insert("Authorization", val);
        let envelope: Envelope = self
            .client
            .send(Method::POST, "/api/v1/auth/login", &[], Some(&json!({})), Some(headers))
            .await
            .map_err(gateway_error)?;
        let body = Self::unwrap_envelope(envelope)?;
        let token = body["accessToken"]
            .as_str()
            .ok_or_else(|| GatewayError::Auth("login response carried no access token".to_string()))?
            .to_string();
        let expires_in = body["expiresIn"].as_i64().unwrap_or(3600);
        debug!("💳️ Monnify access token refreshed, valid for {expires_in}s");
        Ok(CachedToken { token, expires_at: Utc::now() + Duration::seconds(expires_in) })
    }

    async fn bearer(&self, force_refresh: bool) -> Result<String, GatewayError> {
        if !force_refresh {
            if let Some(cached) = self.token.read().await.as_ref() {
                if cached.is_fresh() {
                    return Ok(cached.token.clone());
                }
            }
        }
        let fresh = self.login().await?;
        let token = fresh.token.clone();
        *self.token.write().await = Some(fresh);
        Ok(token)
    }

    /// Send an authenticated request, retrying exactly once with a fresh token if the cached one is rejected.
    async fn send_authed(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, GatewayError> {
        let mut force_refresh = false;
        loop {
            let token = self.bearer(force_refresh).await?;
            let mut headers = HeaderMap::with_capacity(1);
            let val = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| GatewayError::Unknown(e.to_string()))?;
            headers.insert("Authorization", val);
            let result = self.client.send::<Envelope, Value>(method.clone(), path, &[], body, Some(headers)).await;
            match result {
                Ok(envelope) => return Self::unwrap_envelope(envelope),
                Err(TransportError::Http { status: 401, .. }) if !force_refresh => {
                    debug!("💳️ Monnify rejected the cached token; refreshing and retrying once");
                    force_refresh = true;
                },
                Err(e) => return Err(gateway_error(e)),
            }
        }
    }

    fn unwrap_envelope(envelope: Envelope) -> Result<Value, GatewayError> {
        if !envelope.request_successful {
            return Err(GatewayError::Rejected(envelope.response_message));
        }
        envelope
            .response_body
            .ok_or_else(|| GatewayError::Unknown("missing responseBody in successful response".to_string()))
    }
}

fn normalize_verification(body: &Value) -> Result<GatewayVerification, GatewayError> {
    let raw_status = body["paymentStatus"].as_str().unwrap_or_default().to_string();
    let status = match raw_status.as_str() {
        "PAID" | "OVERPAID" => VerifiedStatus::Successful,
        "FAILED" | "CANCELLED" | "EXPIRED" | "REVERSED" => VerifiedStatus::Failed,
        _ => VerifiedStatus::Pending,
    };
    let amount_paid = kobo_from_naira_value(&body["amountPaid"])
        .or_else(|| kobo_from_naira_value(&body["amount"]))
        .ok_or_else(|| GatewayError::Unknown(format!("unparseable amount: {}", body["amountPaid"])))?;
    let provider_id = body["transactionReference"]
        .as_str()
        .ok_or_else(|| GatewayError::Unknown("missing transactionReference".to_string()))?
        .to_string();
    Ok(GatewayVerification { status, amount_paid, provider_id, raw_status })
}

#[async_trait]
impl PaymentGateway for Monnify {
    fn tag(&self) -> &'static str {
        "monnify"
    }

    async fn initialize(&self, request: InitializePayment) -> Result<CheckoutSession, GatewayError> {
        let body = json!({
            "amount": naira_string(request.amount),
            "customerEmail": request.email,
            "paymentReference": request.reference,
            "paymentDescription": "Wallet funding",
            "currencyCode": "NGN",
            "contractCode": self.config.contract_code,
        });
        let data = self.send_authed(Method::POST, "/api/v1/merchant/transactions/init-transaction", Some(&body)).await?;
        let checkout_url = data["checkoutUrl"]
            .as_str()
            .ok_or_else(|| GatewayError::Unknown("init response carried no checkout URL".to_string()))?;
        debug!("💳️ Monnify checkout created for [{}]", request.reference);
        Ok(CheckoutSession { checkout_url: checkout_url.to_string(), reference: request.reference })
    }

    async fn verify(&self, target: VerifyTarget) -> Result<GatewayVerification, GatewayError> {
        let data = match &target {
            // Transaction references contain characters that must be escaped in a path segment.
            VerifyTarget::ById(id) => {
                let path = format!("/api/v2/transactions/{}", url_encode(id));
                self.send_authed(Method::GET, &path, None).await?
            },
            VerifyTarget::ByReference(r) => {
                let path = format!("/api/v1/merchant/transactions/query?paymentReference={}", url_encode(r));
                self.send_authed(Method::GET, &path, None).await?
            },
        };
        normalize_verification(&data)
    }

    async fn create_dedicated_account(
        &self,
        request: DedicatedAccountRequest,
    ) -> Result<DedicatedAccount, GatewayError> {
        let account_reference = format!("va-{}", request.user_id);
        let mut body = json!({
            "accountReference": account_reference,
            "accountName": format!("{} {}", request.first_name, request.last_name),
            "currencyCode": "NGN",
            "contractCode": self.config.contract_code,
            "customerEmail": request.email,
            "customerName": format!("{} {}", request.first_name, request.last_name),
            "getAllAvailableBanks": false,
            "preferredBanks": ["035"],
        });
        if let Some(bvn) = &request.kyc_id {
            body["bvn"] = json!(bvn);
        }
        let data = self.send_authed(Method::POST, "/api/v2/bank-transfer/reserved-accounts", Some(&body)).await?;
        let account = data["accounts"]
            .as_array()
            .and_then(|accounts| accounts.first())
            .ok_or_else(|| GatewayError::Unknown("reservation response carried no accounts".to_string()))?;
        let account_number = account["accountNumber"]
            .as_str()
            .ok_or_else(|| GatewayError::Unknown("reserved account carried no account number".to_string()))?;
        let bank_name = account["bankName"].as_str().unwrap_or("Unknown bank");
        info!("💳️ Monnify reserved account {account_number} at {bank_name} for user {}", request.user_id);
        Ok(DedicatedAccount {
            account_reference,
            account_number: account_number.to_string(),
            bank_name: bank_name.to_string(),
        })
    }
}

/// Minimal percent-encoding for path/query values. Upstream references are alphanumeric with separators, so only
/// the usual suspects need escaping.
fn url_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
