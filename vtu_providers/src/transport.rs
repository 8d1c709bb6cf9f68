//! Shared REST plumbing for the adapters.
//!
//! Every upstream call funnels through [`RestClient::send`], which applies the per-attempt timeout, a small
//! bounded retry for transport-level failures, and the first layer of error classification. Business-level
//! classification (was the payment rejected or merely unknown?) stays in the adapters, which know their upstream's
//! payload conventions.
use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF_MS: u64 = 250;

/// Transport-level failure classification. Adapters translate these into the engine's gateway and fulfillment
/// error types.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    /// Connection failures, timeouts and 5xx responses after retries. The request may or may not have been
    /// processed upstream.
    #[error("Transient transport failure: {0}")]
    Transient(String),
    /// A non-5xx error status. The upstream processed the request and said no.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Could not deserialize response: {0}")]
    Json(String),
}

#[derive(Clone)]
pub struct RestClient {
    base_url: String,
    client: Arc<Client>,
}

impl RestClient {
    pub fn new(base_url: String, headers: HeaderMap) -> Result<Self, TransportError> {
        let client = Client::builder()
            .default_headers(headers)
            .timeout(ATTEMPT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Initialization(e.to_string()))?;
        Ok(Self { base_url, client: Arc::new(client) })
    }

    pub fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a request and deserialize the response body.
    ///
    /// Connection errors, timeouts and 5xx responses are retried with exponential backoff, up to
    /// [`MAX_ATTEMPTS`] attempts in total. Retries are only safe because every mutating call in this crate carries
    /// an idempotent request id; adapters must keep it that way.
    pub async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<&B>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, TransportError> {
        let url = self.url(path);
        let mut last_failure = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                let delay = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt - 2));
                debug!("🌐️ Retrying {url} in {delay:?} (attempt {attempt}/{MAX_ATTEMPTS}): {last_failure}");
                tokio::time::sleep(delay).await;
            }
            let mut req = self.client.request(method.clone(), &url);
            if !params.is_empty() {
                req = req.query(params);
            }
            if let Some(body) = body {
                req = req.json(body);
            }
            if let Some(headers) = &extra_headers {
                req = req.headers(headers.clone());
            }
            let response = match req.send().await {
                Ok(response) => response,
                Err(e) => {
                    last_failure = e.to_string();
                    continue;
                },
            };
            let status = response.status();
            if status.is_server_error() {
                last_failure = format!("server returned {status}");
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(TransportError::Http { status: status.as_u16(), body });
            }
            trace!("🌐️ {method} {url} -> {status}");
            return response.json::<T>().await.map_err(|e| TransportError::Json(e.to_string()));
        }
        Err(TransportError::Transient(last_failure))
    }
}

/// The single point where transport failures become gateway errors.
pub fn gateway_error(e: TransportError) -> vtu_engine::traits::GatewayError {
    use vtu_engine::traits::GatewayError;
    match e {
        TransportError::Transient(m) => GatewayError::Transient(m),
        TransportError::Http { status: 401 | 403, body } => GatewayError::Auth(body),
        TransportError::Http { status: 404, .. } => GatewayError::NotFound,
        TransportError::Http { status, body } => GatewayError::Rejected(format!("HTTP {status}: {body}")),
        TransportError::Json(m) | TransportError::Initialization(m) => GatewayError::Unknown(m),
    }
}

/// The single point where transport failures become fulfillment errors.
pub fn fulfillment_error(e: TransportError) -> vtu_engine::traits::FulfillmentError {
    use vtu_engine::traits::FulfillmentError;
    match e {
        TransportError::Transient(m) => FulfillmentError::Transient(m),
        TransportError::Http { status: 404, .. } => FulfillmentError::NotFound,
        TransportError::Http { status, body } => FulfillmentError::Rejected(format!("HTTP {status}: {body}")),
        TransportError::Json(m) | TransportError::Initialization(m) => FulfillmentError::Unknown(m),
    }
}

/// Render a kobo amount as the "NNN.NN" naira decimal string some upstreams insist on.
pub fn naira_string(amount: vtu_common::Kobo) -> String {
    let kobo = amount.value();
    format!("{}.{:02}", kobo / 100, kobo % 100)
}

/// Parse an upstream naira amount (integer or decimal JSON number) into kobo.
///
/// JSON numbers arrive as f64, where a two-decimal amount like 2540.55 scales to 254054.999... rather than
/// 254055. Rounding to the nearest kobo recovers the exact amount; upstreams never quote sub-kobo fractions.
pub fn kobo_from_naira_value(value: &serde_json::Value) -> Option<vtu_common::Kobo> {
    let naira = value.as_f64()?;
    Some(vtu_common::Kobo::from((naira * 100.0).round() as i64))
}
