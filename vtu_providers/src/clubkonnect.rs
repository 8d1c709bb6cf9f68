//! ClubKonnect fulfillment adapter (airtime and data bundles).
//!
//! ClubKonnect is a legacy API: every operation is a GET with credentials and parameters in the query string, and
//! the response is a small JSON object whose `status` field carries an upper-snake order state. Our ledger
//! reference rides along as `RequestID`, which deduplicates resubmissions on their side and is what the status
//! query keys on.
//!
//! Catalog keys take the form `network:amount` for airtime (naira denomination) and `network:plan_code` for data,
//! where `network` is ClubKonnect's two-digit network code.
use async_trait::async_trait;
use log::*;
use reqwest::Method;
use serde_json::Value;
use vtu_common::Kobo;
use vtu_engine::traits::{
    FulfillmentError,
    FulfillmentProvider,
    FulfillmentStatus,
    PurchaseOutcome,
    PurchaseRequest,
    ServiceKind,
};

use crate::{
    config::ClubKonnectConfig,
    transport::{fulfillment_error, RestClient},
};

#[derive(Clone)]
pub struct ClubKonnect {
    config: ClubKonnectConfig,
    client: RestClient,
}

impl ClubKonnect {
    pub fn new(config: ClubKonnectConfig) -> Result<Self, FulfillmentError> {
        let client = RestClient::new(config.base_url.clone(), RestClient::json_headers())
            .map_err(|e| FulfillmentError::Unknown(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn credentials(&self) -> [(&'static str, String); 2] {
        [("UserID", self.config.user_id.clone()), ("APIKey", self.config.api_key.reveal().to_string())]
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, FulfillmentError> {
        let mut all = self.credentials().to_vec();
        all.extend(params.iter().map(|(k, v)| (*k, v.clone())));
        self.client.send::<Value, ()>(Method::GET, path, &all, None, None).await.map_err(fulfillment_error)
    }

    async fn data_plan_price(&self, network: &str, plan_code: &str) -> Result<Kobo, FulfillmentError> {
        let catalog = self.get("/APIDatabundlePlansV1.asp", &[]).await?;
        find_plan_price(&catalog, network, plan_code)
            .ok_or_else(|| FulfillmentError::UnknownItem(format!("{network}:{plan_code}")))
    }
}

fn split_item_code(item_code: &str) -> Result<(&str, &str), FulfillmentError> {
    item_code.split_once(':').ok_or_else(|| FulfillmentError::UnknownItem(item_code.to_string()))
}

/// Walk the nested plan catalog: `MOBILE_NETWORK` maps network names to arrays of `{ ID, PRODUCT: [...] }`.
fn find_plan_price(catalog: &Value, network: &str, plan_code: &str) -> Option<Kobo> {
    let networks = catalog["MOBILE_NETWORK"].as_object()?;
    for entries in networks.values() {
        for entry in entries.as_array()?.iter() {
            if entry["ID"].as_str() != Some(network) {
                continue;
            }
            for product in entry["PRODUCT"].as_array()? {
                if product["PRODUCT_ID"].as_str() == Some(plan_code) {
                    let naira = product["PRODUCT_AMOUNT"].as_str()?.parse::<f64>().ok()?;
                    return Some(Kobo::from((naira * 100.0).round() as i64));
                }
            }
        }
    }
    None
}

/// Normalize an order response. The same state machine covers submission and requery; only the caller-side
/// interpretation of the non-terminal states differs.
fn order_state(response: &Value) -> OrderState {
    let status = response["status"].as_str().unwrap_or_default();
    match status {
        "ORDER_COMPLETED" => OrderState::Completed,
        "ORDER_RECEIVED" | "ORDER_PROCESSING" | "ORDER_ONHOLD" => OrderState::InFlight(status.to_string()),
        "ORDER_FAILED" | "ORDER_CANCELLED" => OrderState::Failed(status.to_string()),
        other => OrderState::Error(if other.is_empty() {
            format!("unrecognized response: {response}")
        } else {
            other.to_string()
        }),
    }
}

enum OrderState {
    Completed,
    InFlight(String),
    Failed(String),
    Error(String),
}

fn order_id_of(response: &Value, fallback: &str) -> String {
    match &response["orderid"] {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => fallback.to_string(),
    }
}

fn normalize_submission(response: &Value, request_id: &str) -> Result<PurchaseOutcome, FulfillmentError> {
    match order_state(response) {
        OrderState::Completed => Ok(PurchaseOutcome::Delivered {
            order_id: order_id_of(response, request_id),
            raw_status: "ORDER_COMPLETED".to_string(),
            token: None,
            pins: Vec::new(),
        }),
        OrderState::InFlight(raw) => {
            Ok(PurchaseOutcome::Accepted { order_id: order_id_of(response, request_id), raw_status: raw })
        },
        OrderState::Failed(raw) => Err(FulfillmentError::Rejected(raw)),
        OrderState::Error(m) => Err(FulfillmentError::Unknown(m)),
    }
}

fn normalize_query(response: &Value) -> Result<FulfillmentStatus, FulfillmentError> {
    match order_state(response) {
        OrderState::Completed => Ok(FulfillmentStatus::Delivered { token: None }),
        OrderState::InFlight(_) => Ok(FulfillmentStatus::Pending),
        OrderState::Failed(raw) => Ok(FulfillmentStatus::Failed { raw_status: raw }),
        OrderState::Error(m) if m.contains("INVALID_ORDERID") || m.contains("INVALID_REQUESTID") => {
            Err(FulfillmentError::NotFound)
        },
        OrderState::Error(m) => Err(FulfillmentError::Unknown(m)),
    }
}

#[async_trait]
impl FulfillmentProvider for ClubKonnect {
    fn tag(&self) -> &'static str {
        "clubkonnect"
    }

    async fn price_for(&self, service: ServiceKind, item_code: &str) -> Result<Kobo, FulfillmentError> {
        let (network, suffix) = split_item_code(item_code)?;
        match service {
            ServiceKind::Airtime => {
                let naira: i64 = suffix.parse().map_err(|_| FulfillmentError::UnknownItem(item_code.to_string()))?;
                if naira <= 0 {
                    return Err(FulfillmentError::UnknownItem(item_code.to_string()));
                }
                Ok(Kobo::from_naira(naira))
            },
            ServiceKind::Data => self.data_plan_price(network, suffix).await,
            _ => Err(FulfillmentError::UnknownItem(format!("{service} is not offered here"))),
        }
    }

    async fn purchase(
        &self,
        request: PurchaseRequest,
        idempotency_key: &str,
    ) -> Result<PurchaseOutcome, FulfillmentError> {
        let (network, suffix) = split_item_code(&request.item_code)?;
        let (path, mut params) = match request.service {
            ServiceKind::Airtime => (
                "/APIAirtimeV1.asp",
                vec![
                    ("MobileNetwork", network.to_string()),
                    ("Amount", (request.amount.value() / 100).to_string()),
                ],
            ),
            ServiceKind::Data => {
                ("/APIDatabundleV1.asp", vec![("MobileNetwork", network.to_string()), ("DataPlan", suffix.to_string())])
            },
            _ => return Err(FulfillmentError::UnknownItem(format!("{} is not offered here", request.service))),
        };
        params.push(("MobileNumber", request.recipient.clone()));
        params.push(("RequestID", idempotency_key.to_string()));
        debug!("🔌️ ClubKonnect order [{idempotency_key}] submitted for network {network}");
        let response = self.get(path, &params).await?;
        normalize_submission(&response, idempotency_key)
    }

    async fn query_status(&self, order_id: &str) -> Result<FulfillmentStatus, FulfillmentError> {
        let params = [("RequestID", order_id.to_string())];
        let response = self.get("/APIQueryV1.asp", &params).await?;
        trace!("🔌️ ClubKonnect reports {} for [{order_id}]", response["status"]);
        normalize_query(&response)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn completed_orders_deliver_synchronously() {
        let response = json!({ "orderid": "9876543", "statuscode": "200", "status": "ORDER_COMPLETED" });
        let outcome = normalize_submission(&response, "AIR-20250101-ABC").unwrap();
        let PurchaseOutcome::Delivered { order_id, .. } = outcome else { panic!("Expected delivery") };
        assert_eq!(order_id, "9876543");
    }

    #[test]
    fn received_orders_are_accepted_with_their_order_id() {
        let response = json!({ "orderid": "9876544", "statuscode": "100", "status": "ORDER_RECEIVED" });
        let outcome = normalize_submission(&response, "DAT-20250101-ABC").unwrap();
        let PurchaseOutcome::Accepted { order_id, raw_status } = outcome else { panic!("Expected acceptance") };
        assert_eq!(order_id, "9876544");
        assert_eq!(raw_status, "ORDER_RECEIVED");
    }

    #[test]
    fn cancelled_orders_are_rejected() {
        let response = json!({ "status": "ORDER_CANCELLED" });
        assert!(matches!(
            normalize_submission(&response, "AIR-20250101-ABC"),
            Err(FulfillmentError::Rejected(_))
        ));
    }

    #[test]
    fn credential_failures_are_not_rejections() {
        // INVALID_CREDENTIALS must never trigger a refund path.
        let response = json!({ "status": "INVALID_CREDENTIALS" });
        assert!(matches!(normalize_submission(&response, "AIR-20250101-ABC"), Err(FulfillmentError::Unknown(_))));
    }

    #[test]
    fn queries_map_the_order_state_machine() {
        let delivered = json!({ "status": "ORDER_COMPLETED" });
        assert_eq!(normalize_query(&delivered).unwrap(), FulfillmentStatus::Delivered { token: None });
        let pending = json!({ "status": "ORDER_PROCESSING" });
        assert_eq!(normalize_query(&pending).unwrap(), FulfillmentStatus::Pending);
        let failed = json!({ "status": "ORDER_FAILED" });
        assert!(matches!(normalize_query(&failed).unwrap(), FulfillmentStatus::Failed { .. }));
        let unknown = json!({ "status": "INVALID_REQUESTID" });
        assert!(matches!(normalize_query(&unknown), Err(FulfillmentError::NotFound)));
    }

    #[test]
    fn plan_prices_come_from_the_nested_catalog() {
        let catalog = json!({
            "MOBILE_NETWORK": {
                "MTN": [{
                    "ID": "01",
                    "PRODUCT": [
                        { "PRODUCT_ID": "1000", "PRODUCT_NAME": "1GB (SME)", "PRODUCT_AMOUNT": "465" },
                        { "PRODUCT_ID": "2000", "PRODUCT_NAME": "2GB (SME)", "PRODUCT_AMOUNT": "930" }
                    ]
                }],
                "Glo": [{ "ID": "02", "PRODUCT": [] }]
            }
        });
        assert_eq!(find_plan_price(&catalog, "01", "2000"), Some(Kobo::from_naira(930)));
        assert_eq!(find_plan_price(&catalog, "01", "9999"), None);
        assert_eq!(find_plan_price(&catalog, "05", "1000"), None);
    }
}
