//! VTpass fulfillment adapter: airtime, data, electricity, cable TV, education and recharge-pin printing.
//!
//! Catalog keys take the form `serviceID:suffix`. For variation-priced services (data, cable, education, pins) the
//! suffix is the VTpass variation code and the price comes from a fresh catalog fetch. For amount-denominated
//! services (airtime, electricity) the suffix is the naira amount itself.
//!
//! Every purchase is submitted with our ledger reference as the `request_id`, which VTpass treats as idempotent:
//! resubmitting after a timeout can never deliver twice. Response code `000` with a delivered transaction is the
//! only synchronous success; `099` means "processing" and is reported as accepted, never as failure.
use async_trait::async_trait;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Method,
};
use serde_json::{json, Value};
use vtu_common::Kobo;
use vtu_engine::{
    db_types::NewRechargePin,
    traits::{FulfillmentError, FulfillmentProvider, FulfillmentStatus, PurchaseOutcome, PurchaseRequest, ServiceKind},
};

use crate::{
    config::VtpassConfig,
    transport::{fulfillment_error, naira_string, RestClient},
};

#[derive(Clone)]
pub struct Vtpass {
    config: VtpassConfig,
    client: RestClient,
}

impl Vtpass {
    pub fn new(config: VtpassConfig) -> Result<Self, FulfillmentError> {
        let mut headers = RestClient::json_headers();
        let val = HeaderValue::from_str(&config.api_key).map_err(|e| FulfillmentError::Unknown(e.to_string()))?;
        headers.insert("api-key", val);
        let client = RestClient::new(config.base_url.clone(), headers)
            .map_err(|e| FulfillmentError::Unknown(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// GET requests authenticate with the public key, POST requests with the secret key.
    fn read_headers(&self) -> Result<HeaderMap, FulfillmentError> {
        let mut headers = HeaderMap::with_capacity(1);
        let val =
            HeaderValue::from_str(&self.config.public_key).map_err(|e| FulfillmentError::Unknown(e.to_string()))?;
        headers.insert("public-key", val);
        Ok(headers)
    }

    fn write_headers(&self) -> Result<HeaderMap, FulfillmentError> {
        let mut headers = HeaderMap::with_capacity(1);
        let val = HeaderValue::from_str(self.config.secret_key.reveal())
            .map_err(|e| FulfillmentError::Unknown(e.to_string()))?;
        headers.insert("secret-key", val);
        Ok(headers)
    }

    async fn variation_price(&self, service_id: &str, variation_code: &str) -> Result<Kobo, FulfillmentError> {
        let params = [("serviceID", service_id.to_string())];
        let response: Value = self
            .client
            .send::<_, ()>(Method::GET, "/api/service-variations", &params, None, Some(self.read_headers()?))
            .await
            .map_err(fulfillment_error)?;
        let variations = response["content"]["variations"]
            .as_array()
            .ok_or_else(|| FulfillmentError::Unknown("catalog response carried no variations".to_string()))?;
        let found = variations
            .iter()
            .find(|v| v["variation_code"].as_str() == Some(variation_code))
            .ok_or_else(|| FulfillmentError::UnknownItem(format!("{service_id}:{variation_code}")))?;
        parse_catalog_amount(&found["variation_amount"])
            .ok_or_else(|| FulfillmentError::Unknown(format!("unparseable catalog price for {variation_code}")))
    }
}

/// Split a catalog key into serviceID and suffix.
fn split_item_code(item_code: &str) -> Result<(&str, &str), FulfillmentError> {
    item_code.split_once(':').ok_or_else(|| FulfillmentError::UnknownItem(item_code.to_string()))
}

fn uses_variations(service: ServiceKind) -> bool {
    matches!(service, ServiceKind::Data | ServiceKind::Cable | ServiceKind::Education | ServiceKind::RechargePin)
}

/// Catalog amounts arrive as naira strings ("1000.00") or numbers, depending on the endpoint.
fn parse_catalog_amount(value: &Value) -> Option<Kobo> {
    let naira = match value {
        Value::String(s) => s.parse::<f64>().ok()?,
        other => other.as_f64()?,
    };
    Some(Kobo::from((naira * 100.0).round() as i64))
}

fn extract_pins(content: &Value, service_id: &str, denomination: Kobo) -> Vec<NewRechargePin> {
    let network = service_id.split('-').next().unwrap_or(service_id).to_string();
    content["cards"]
        .as_array()
        .map(|cards| {
            cards
                .iter()
                .filter_map(|card| {
                    let pin = card["Pin"].as_str().or_else(|| card["pin"].as_str())?;
                    let serial = card["Serial"].as_str().or_else(|| card["serial"].as_str())?;
                    Some(NewRechargePin {
                        network: network.clone(),
                        denomination,
                        pin: pin.to_string(),
                        serial: serial.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn extract_token(content: &Value) -> Option<String> {
    content["purchased_code"]
        .as_str()
        .filter(|s| !s.is_empty())
        .or_else(|| content["token"].as_str().filter(|s| !s.is_empty()))
        .map(|s| s.to_string())
}

/// Normalize a `/api/pay` response into the engine's purchase outcome.
fn normalize_pay_response(
    response: &Value,
    request_id: &str,
    service_id: &str,
    amount: Kobo,
) -> Result<PurchaseOutcome, FulfillmentError> {
    let code = response["code"].as_str().unwrap_or_default();
    let content = &response["content"];
    let tx_status = content["transactions"]["status"].as_str().unwrap_or_default();
    match (code, tx_status) {
        ("000", "delivered") => Ok(PurchaseOutcome::Delivered {
            order_id: request_id.to_string(),
            raw_status: tx_status.to_string(),
            token: extract_token(content),
            pins: extract_pins(content, service_id, amount),
        }),
        ("000", _) | ("099", _) => {
            Ok(PurchaseOutcome::Accepted { order_id: request_id.to_string(), raw_status: format!("{code}:{tx_status}") })
        },
        ("016", _) => Err(FulfillmentError::Rejected("TRANSACTION FAILED".to_string())),
        ("010", _) | ("012", _) => Err(FulfillmentError::UnknownItem(service_id.to_string())),
        ("011", _) | ("017", _) | ("018", _) => {
            Err(FulfillmentError::Rejected(response["response_description"].as_str().unwrap_or(code).to_string()))
        },
        _ => Err(FulfillmentError::Unknown(format!(
            "code {code}: {}",
            response["response_description"].as_str().unwrap_or_default()
        ))),
    }
}

/// Normalize a `/api/requery` response into the engine's status type.
fn normalize_requery_response(response: &Value) -> Result<FulfillmentStatus, FulfillmentError> {
    let code = response["code"].as_str().unwrap_or_default();
    let content = &response["content"];
    let tx_status = content["transactions"]["status"].as_str().unwrap_or_default();
    match (code, tx_status) {
        ("000", "delivered") => Ok(FulfillmentStatus::Delivered { token: extract_token(content) }),
        ("000", "reversed") | ("000", "failed") | ("016", _) => {
            Ok(FulfillmentStatus::Failed { raw_status: format!("{code}:{tx_status}") })
        },
        ("000", _) | ("099", _) => Ok(FulfillmentStatus::Pending),
        // An unknown request id on requery is NOT a failure; the submit may never have reached them.
        ("011", _) => Err(FulfillmentError::NotFound),
        _ => Err(FulfillmentError::Unknown(format!(
            "code {code}: {}",
            response["response_description"].as_str().unwrap_or_default()
        ))),
    }
}

#[async_trait]
impl FulfillmentProvider for Vtpass {
    fn tag(&self) -> &'static str {
        "vtpass"
    }

    async fn price_for(&self, service: ServiceKind, item_code: &str) -> Result<Kobo, FulfillmentError> {
        let (service_id, suffix) = split_item_code(item_code)?;
        if uses_variations(service) {
            self.variation_price(service_id, suffix).await
        } else {
            let naira: i64 =
                suffix.parse().map_err(|_| FulfillmentError::UnknownItem(item_code.to_string()))?;
            if naira <= 0 {
                return Err(FulfillmentError::UnknownItem(item_code.to_string()));
            }
            Ok(Kobo::from_naira(naira))
        }
    }

    async fn purchase(
        &self,
        request: PurchaseRequest,
        idempotency_key: &str,
    ) -> Result<PurchaseOutcome, FulfillmentError> {
        let (service_id, suffix) = split_item_code(&request.item_code)?;
        let mut body = json!({
            "request_id": idempotency_key,
            "serviceID": service_id,
            "amount": naira_string(request.amount),
            "phone": request.recipient,
            "billersCode": request.recipient,
        });
        if uses_variations(request.service) {
            body["variation_code"] = json!(suffix);
        }
        if let Some(quantity) = request.extras.get("quantity") {
            body["quantity"] = quantity.clone();
        }
        debug!("🔌️ VTpass purchase [{idempotency_key}] for {service_id} submitted");
        let response: Value = self
            .client
            .send(Method::POST, "/api/pay", &[], Some(&body), Some(self.write_headers()?))
            .await
            .map_err(fulfillment_error)?;
        normalize_pay_response(&response, idempotency_key, service_id, request.amount)
    }

    async fn query_status(&self, order_id: &str) -> Result<FulfillmentStatus, FulfillmentError> {
        let body = json!({ "request_id": order_id });
        let response: Value = self
            .client
            .send(Method::POST, "/api/requery", &[], Some(&body), Some(self.write_headers()?))
            .await
            .map_err(fulfillment_error)?;
        trace!("🔌️ VTpass requery for [{order_id}]: code {}", response["code"]);
        normalize_requery_response(&response)
    }
}
