//! Stripe API types.
//!
//! Only the fields this service reads are modeled; responses are narrowed to
//! these structs at the boundary and never passed deeper as raw JSON.

use serde::Deserialize;

/// Stripe customer object.
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    /// Stripe customer ID.
    pub id: String,
    /// Customer email.
    #[serde(default)]
    pub email: Option<String>,
}

/// Stripe subscription object.
#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    /// Subscription ID.
    pub id: String,
    /// Status (active, incomplete, past_due, ...).
    #[serde(default)]
    pub status: String,
    /// Subscription items.
    pub items: StripeList<SubscriptionItem>,
}

/// One item of a subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    /// Subscription item ID.
    pub id: String,
    /// The price the item is bound to.
    pub price: Price,
}

/// Stripe price object (narrowed to its ID).
#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    /// Price ID.
    pub id: String,
}

/// Acknowledgement of a usage record submission.
#[derive(Debug, Clone, Deserialize)]
pub struct UsageRecordAck {
    /// Usage record ID.
    pub id: String,
    /// Quantity the period was incremented by.
    pub quantity: u64,
}

/// Stripe list response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    /// Data items.
    pub data: Vec<T>,
    /// Whether there are more items.
    #[serde(default)]
    pub has_more: bool,
}

/// Stripe error response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// The error payload.
    pub error: StripeApiError,
}

/// Stripe error payload.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeApiError {
    /// Error type (e.g. `invalid_request_error`).
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Machine-readable code, when present.
    #[serde(default)]
    pub code: Option<String>,
}

/// Stripe webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event ID.
    pub id: String,
    /// Event type (e.g. "invoice.paid").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: WebhookEventData,
}

/// Webhook event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// The event object, kept raw; the reconciler only inspects a few fields.
    pub object: serde_json::Value,
}
