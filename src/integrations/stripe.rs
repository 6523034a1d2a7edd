use std::collections::HashMap;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

const STRIPE_PAYMENT_INTENTS_URL: &str = "https://api.stripe.com/v1/payment_intents";
const STRIPE_CUSTOMERS_URL: &str = "https://api.stripe.com/v1/customers";

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Customer {
    pub id: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create the processor-side customer that saved cards attach to.
    async fn create_customer(
        &self,
        profile_id: Uuid,
        email: &str,
        name: Option<&str>,
    ) -> AppResult<Customer>;

    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
        order_id: Uuid,
        customer_id: Option<&str>,
    ) -> AppResult<PaymentIntent>;
}

pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: Option<String>,
}

impl StripeGateway {
    pub fn new(client: reqwest::Client, secret_key: Option<String>) -> Self {
        Self { client, secret_key }
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        idempotency_key: String,
        form: &[(&str, &str)],
    ) -> AppResult<T> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or(AppError::ServiceUnavailable("payments are not configured"))?;

        let response = self
            .client
            .post(url)
            .basic_auth(secret_key, None::<&str>)
            .header("Idempotency-Key", idempotency_key)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("payment request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| status.to_string());
            return Err(AppError::Upstream(format!("payment processor: {message}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::Upstream(format!("invalid payment response: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

/// Form fields for a payment intent. Cards are kept for the customer when one is known.
pub fn payment_intent_form<'a>(
    amount: &'a str,
    currency: &'a str,
    order_id: &'a str,
    customer_id: Option<&'a str>,
) -> Vec<(&'a str, &'a str)> {
    let mut form = vec![
        ("amount", amount),
        ("currency", currency),
        ("automatic_payment_methods[enabled]", "true"),
        ("metadata[order_id]", order_id),
    ];
    if let Some(customer_id) = customer_id {
        form.push(("customer", customer_id));
        form.push(("setup_future_usage", "on_session"));
    }
    form
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_customer(
        &self,
        profile_id: Uuid,
        email: &str,
        name: Option<&str>,
    ) -> AppResult<Customer> {
        let profile_id = profile_id.to_string();
        let mut form = vec![("email", email), ("metadata[profile_id]", profile_id.as_str())];
        if let Some(name) = name {
            form.push(("name", name));
        }
        self.post_form(STRIPE_CUSTOMERS_URL, format!("customer-{profile_id}"), &form)
            .await
    }

    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
        order_id: Uuid,
        customer_id: Option<&str>,
    ) -> AppResult<PaymentIntent> {
        let amount = amount.to_string();
        let order_id = order_id.to_string();
        let form = payment_intent_form(&amount, currency, &order_id, customer_id);
        self.post_form(STRIPE_PAYMENT_INTENTS_URL, format!("order-{order_id}"), &form)
            .await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing or malformed signature header")]
    Malformed,
    #[error("signature timestamp outside tolerance")]
    Expired,
    #[error("no matching signature")]
    Mismatch,
}

/// Check a `Stripe-Signature` header of the form `t=<unix>,v1=<hex>[,v1=<hex>...]`
/// against the raw request body.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    let ts: i64 = timestamp.parse().map_err(|_| SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now_unix - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });
    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntentObject {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub last_payment_error: Option<PaymentError>,
}

impl PaymentIntentObject {
    pub fn order_id(&self) -> Option<Uuid> {
        self.metadata
            .get("order_id")
            .and_then(|id| Uuid::parse_str(id).ok())
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentError {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentMethodObject {
    pub id: String,
    pub customer: Option<String>,
    pub card: Option<CardDetails>,
}

#[derive(Debug, Deserialize)]
pub struct CardDetails {
    pub brand: Option<String>,
    pub last4: Option<String>,
    pub exp_month: Option<i32>,
    pub exp_year: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, ts: i64, payload: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{ts}.").as_bytes());
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;

    #[test]
    fn accepts_valid_signature() {
        let ts = 1_700_000_000;
        let header = format!("t={ts},v1={}", sign(SECRET, ts, BODY));
        assert_eq!(verify_signature(BODY, &header, SECRET, ts + 10), Ok(()));
    }

    #[test]
    fn accepts_when_any_v1_matches() {
        let ts = 1_700_000_000;
        let header = format!("t={ts},v1=deadbeef,v1={},v0=abc", sign(SECRET, ts, BODY));
        assert_eq!(verify_signature(BODY, &header, SECRET, ts), Ok(()));
    }

    #[test]
    fn rejects_tampered_body() {
        let ts = 1_700_000_000;
        let header = format!("t={ts},v1={}", sign(SECRET, ts, BODY));
        assert_eq!(
            verify_signature(b"{}", &header, SECRET, ts),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_timestamp() {
        let ts = 1_700_000_000;
        let header = format!("t={ts},v1={}", sign(SECRET, ts, BODY));
        assert_eq!(
            verify_signature(BODY, &header, SECRET, ts + SIGNATURE_TOLERANCE_SECS + 1),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn rejects_malformed_header() {
        assert_eq!(
            verify_signature(BODY, "garbage", SECRET, 0),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(BODY, "t=abc,v1=00", SECRET, 0),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(BODY, "t=5", SECRET, 5),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn intents_for_known_customers_keep_the_card() {
        let form = payment_intent_form("4500", "aud", "order-1", Some("cus_123"));
        assert!(form.contains(&("customer", "cus_123")));
        assert!(form.contains(&("setup_future_usage", "on_session")));
        assert!(form.contains(&("metadata[order_id]", "order-1")));

        let guest = payment_intent_form("4500", "aud", "order-1", None);
        assert!(guest.iter().all(|(key, _)| *key != "customer"));
    }

    #[test]
    fn reads_order_id_from_metadata() {
        let order_id = Uuid::new_v4();
        let intent: PaymentIntentObject = serde_json::from_value(serde_json::json!({
            "id": "pi_1",
            "amount": 4500,
            "currency": "aud",
            "metadata": { "order_id": order_id.to_string() },
            "last_payment_error": null
        }))
        .unwrap();
        assert_eq!(intent.order_id(), Some(order_id));
    }
}
