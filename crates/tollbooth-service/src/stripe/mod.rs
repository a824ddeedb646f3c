//! Stripe API client.
//!
//! Form-encoded calls against the Stripe REST API, narrowed into the typed
//! structs in [`types`]. The client also verifies webhook signatures using
//! Stripe's `t=...,v1=...` scheme over the raw payload bytes.

pub mod types;

use std::time::Duration;

use reqwest::Client;

use async_trait::async_trait;
use tollbooth_core::UserId;

use crate::billing::{BillingError, BillingReporter, CustomerHandle, SubscriptionHandle};
use crate::crypto::{constant_time_eq, hmac_sha256_hex};
use types::{Customer, StripeErrorResponse, Subscription, UsageRecordAck};

/// Tolerated clock skew between the signature timestamp and now.
const SIGNATURE_TOLERANCE_SECS: i64 = 600;

/// Error type for Stripe operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error: {error_type} - {message}")]
    Api {
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },
}

/// Webhook signature verification failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The signature header could not be parsed.
    #[error("malformed signature header")]
    Malformed,

    /// The signature timestamp is outside the tolerance window.
    #[error("signature timestamp outside tolerance")]
    Expired,

    /// No candidate signature matched the payload.
    #[error("signature mismatch")]
    Mismatch,
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    price_id: Option<String>,
    base_url: String,
}

impl StripeClient {
    /// Stripe API base URL.
    const BASE_URL: &'static str = "https://api.stripe.com/v1";

    /// Create a new Stripe client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Stripe secret API key (`sk_test_...` or `sk_live_...`)
    /// * `price_id` - The fixed metered price new subscriptions bind to
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, price_id: Option<String>) -> Result<Self, StripeError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            price_id,
            base_url: Self::BASE_URL.to_string(),
        })
    }

    /// Point the client at a different base URL (test servers).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create a new Stripe customer, tagged with our user ID.
    pub async fn create_customer(
        &self,
        email: &str,
        user_id: &UserId,
    ) -> Result<Customer, StripeError> {
        let params = [
            ("email", email.to_string()),
            ("metadata[user_id]", user_id.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/customers", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Create a subscription bound to a single metered price.
    ///
    /// The response includes the subscription items inline; the caller reads
    /// the first item's ID as the usage-reporting handle.
    pub async fn create_metered_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
    ) -> Result<Subscription, StripeError> {
        let params = [
            ("customer", customer_id.to_string()),
            ("items[0][price]", price_id.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/subscriptions", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Increment the current period's usage for a subscription item.
    ///
    /// Stripe offers no idempotency here without an explicit idempotency
    /// key; a retry double-counts, so callers must attempt this at most once
    /// per completed request.
    pub async fn create_usage_record(
        &self,
        subscription_item_id: &str,
        quantity: u64,
    ) -> Result<UsageRecordAck, StripeError> {
        let params = [
            ("quantity", quantity.to_string()),
            ("action", "increment".to_string()),
        ];

        let response = self
            .client
            .post(format!(
                "{}/subscription_items/{}/usage_records",
                self.base_url, subscription_item_id
            ))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Decode a success body, or map Stripe's error envelope.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        if response.status().is_success() {
            return Ok(response.json().await?);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match serde_json::from_str::<StripeErrorResponse>(&body) {
            Ok(err) => Err(StripeError::Api {
                error_type: err.error.error_type,
                message: err.error.message,
                code: err.error.code,
            }),
            Err(_) => Err(StripeError::Api {
                error_type: "http_error".to_string(),
                message: format!("unexpected status {status}"),
                code: None,
            }),
        }
    }
}

#[async_trait]
impl BillingReporter for StripeClient {
    async fn create_customer(
        &self,
        email: &str,
        user_id: &UserId,
    ) -> Result<CustomerHandle, BillingError> {
        let customer = StripeClient::create_customer(self, email, user_id)
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        Ok(CustomerHandle {
            customer_id: customer.id,
            email: customer.email.unwrap_or_else(|| email.to_string()),
        })
    }

    async fn create_metered_subscription(
        &self,
        customer_id: &str,
    ) -> Result<SubscriptionHandle, BillingError> {
        let price_id = self.price_id.clone().ok_or_else(|| {
            BillingError::Configuration("no default metered price configured".into())
        })?;

        let subscription = StripeClient::create_metered_subscription(self, customer_id, &price_id)
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        let item = subscription.items.data.into_iter().next().ok_or_else(|| {
            BillingError::Provider("subscription created without items".to_string())
        })?;

        Ok(SubscriptionHandle {
            subscription_id: subscription.id,
            subscription_item_id: item.id,
            status: subscription.status,
            price_id: item.price.id,
        })
    }

    async fn report_usage(
        &self,
        subscription_item_id: &str,
        units: u64,
    ) -> Result<(), BillingError> {
        let ack = self
            .create_usage_record(subscription_item_id, units)
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        tracing::debug!(
            usage_record = %ack.id,
            quantity = %ack.quantity,
            "Stripe usage record created"
        );

        Ok(())
    }
}

/// Verify a Stripe webhook signature over the exact payload bytes received.
///
/// The header has the form `t=<unix>,v1=<hex>[,v1=<hex>...]`; the signed
/// message is `"{t}.{payload}"`. Verification fails if the timestamp falls
/// outside the tolerance window or no `v1` candidate matches.
///
/// # Errors
///
/// Returns a [`SignatureError`] describing why verification failed.
pub fn verify_webhook_signature(
    secret: &str,
    payload: &[u8],
    signature_header: &str,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse().map_err(|_| SignatureError::Malformed)?);
            }
            Some(("v1", value)) => candidates.push(value),
            _ => {} // Ignore unknown schemes (e.g. v0), per Stripe's docs.
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }

    let age = chrono::Utc::now().timestamp() - timestamp;
    if age.abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    // Signed message is the raw bytes, prefixed by the timestamp. Building
    // it as bytes keeps the payload untouched by any string re-encoding.
    let mut message = Vec::with_capacity(payload.len() + 16);
    message.extend_from_slice(timestamp.to_string().as_bytes());
    message.push(b'.');
    message.extend_from_slice(payload);

    let expected = hmac_sha256_hex(secret, &message);

    if candidates.iter().any(|c| constant_time_eq(c, &expected)) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Build a signature header for a payload (test utilities).
///
/// Produces the same `t=...,v1=...` format Stripe sends, signed with
/// `secret` at the given timestamp.
#[must_use]
pub fn sign_payload(secret: &str, payload: &[u8], timestamp: i64) -> String {
    let mut message = Vec::with_capacity(payload.len() + 16);
    message.extend_from_slice(timestamp.to_string().as_bytes());
    message.push(b'.');
    message.extend_from_slice(payload);

    format!("t={timestamp},v1={}", hmac_sha256_hex(secret, &message))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    #[test]
    fn valid_signature_verifies() {
        let payload = br#"{"id":"evt_1","type":"invoice.paid"}"#;
        let header = sign_payload(SECRET, payload, chrono::Utc::now().timestamp());

        assert_eq!(verify_webhook_signature(SECRET, payload, &header), Ok(()));
    }

    #[test]
    fn tampered_payload_fails() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign_payload(SECRET, payload, chrono::Utc::now().timestamp());

        assert_eq!(
            verify_webhook_signature(SECRET, br#"{"id":"evt_2"}"#, &header),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn wrong_secret_fails() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign_payload("whsec_other", payload, chrono::Utc::now().timestamp());

        assert_eq!(
            verify_webhook_signature(SECRET, payload, &header),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn stale_timestamp_fails() {
        let payload = br#"{"id":"evt_1"}"#;
        let stale = chrono::Utc::now().timestamp() - SIGNATURE_TOLERANCE_SECS - 60;
        let header = sign_payload(SECRET, payload, stale);

        assert_eq!(
            verify_webhook_signature(SECRET, payload, &header),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn malformed_headers_fail() {
        let payload = b"{}";
        for header in ["", "v1=abc", "t=notanumber,v1=abc", "t=123"] {
            assert_eq!(
                verify_webhook_signature(SECRET, payload, header),
                Err(SignatureError::Malformed),
                "header {header:?}"
            );
        }
    }

    #[test]
    fn extra_unknown_schemes_are_ignored() {
        let payload = br#"{"id":"evt_1"}"#;
        let ts = chrono::Utc::now().timestamp();
        let header = format!("{},v0=deadbeef", sign_payload(SECRET, payload, ts));

        assert_eq!(verify_webhook_signature(SECRET, payload, &header), Ok(()));
    }
}
