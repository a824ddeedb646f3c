//! Stripe webhook handler.
//!
//! Signature verification is mandatory. The handler observes billing
//! lifecycle events and acknowledges them; the usage ledger is the local
//! source of truth and is never rewritten from webhook data.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::{self, types::WebhookEvent};

/// Webhook acknowledgement.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the event was received and verified.
    pub received: bool,
}

/// Handle a Stripe webhook delivery.
///
/// The raw body bytes are verified against the `stripe-signature` header
/// before any parsing. A missing secret is a deployment fault, not a caller
/// fault, and maps to a server error so Stripe retries the delivery.
///
/// Once the signature checks out, the delivery is acknowledged no matter
/// what the payload contains; an envelope this service cannot parse is a
/// provider-side schema change, not a failed delivery, and erroring would
/// only make Stripe retry it forever.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let secret = state
        .config
        .stripe_webhook_secret
        .as_deref()
        .ok_or_else(|| ApiError::Configuration("webhook secret not configured".into()))?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Stripe signature".into()))?;

    stripe::verify_webhook_signature(secret, &body, signature).map_err(|e| {
        tracing::warn!(error = %e, "Rejected Stripe webhook");
        ApiError::BadRequest("Invalid webhook signature".into())
    })?;

    match serde_json::from_slice::<WebhookEvent>(&body) {
        Ok(event) => observe_event(&event),
        Err(e) => {
            tracing::warn!(error = %e, "Acknowledged webhook with unparseable payload");
        }
    }

    Ok(Json(WebhookResponse { received: true }))
}

/// Log the lifecycle events this service tracks.
fn observe_event(event: &WebhookEvent) {
    match event.event_type.as_str() {
        "invoice.paid" => {
            let (customer, amount) = invoice_summary(event);
            tracing::info!(
                event = %event.id,
                customer = %customer,
                amount_paid = %amount,
                "Invoice paid"
            );
        }
        "customer.subscription.updated" | "customer.subscription.deleted" => {
            let status = event
                .data
                .object
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            tracing::info!(
                event = %event.id,
                event_type = %event.event_type,
                status = %status,
                "Subscription lifecycle event"
            );
        }
        other => {
            tracing::debug!(event = %event.id, event_type = %other, "Ignoring webhook event");
        }
    }
}

/// Pull the customer ID and paid amount out of an invoice event.
fn invoice_summary(event: &WebhookEvent) -> (&str, i64) {
    let customer = event
        .data
        .object
        .get("customer")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");

    let amount = event
        .data
        .object
        .get("amount_paid")
        .and_then(serde_json::Value::as_i64)
        .unwrap_or(0);

    (customer, amount)
}
