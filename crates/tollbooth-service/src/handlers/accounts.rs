//! Account provisioning handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::pipeline::{self, ProvisionReceipt};
use crate::state::AppState;

/// Provisioning response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionResponse {
    /// The created billing customer.
    pub customer: CustomerBody,
    /// The created metered subscription.
    pub subscription: SubscriptionBody,
    /// The subscription item that usage reports target.
    pub subscription_item: SubscriptionItemBody,
}

/// Customer section of the provisioning response.
#[derive(Debug, Serialize)]
pub struct CustomerBody {
    /// Billing provider customer ID.
    pub id: String,
    /// Email the customer was created with.
    pub email: String,
}

/// Subscription section of the provisioning response.
#[derive(Debug, Serialize)]
pub struct SubscriptionBody {
    /// Billing provider subscription ID.
    pub id: String,
    /// Subscription status as reported by the provider.
    pub status: String,
}

/// Subscription item section of the provisioning response.
#[derive(Debug, Serialize)]
pub struct SubscriptionItemBody {
    /// Subscription item ID.
    pub id: String,
    /// The metered price the item is bound to.
    pub price: String,
}

impl From<ProvisionReceipt> for ProvisionResponse {
    fn from(receipt: ProvisionReceipt) -> Self {
        Self {
            customer: CustomerBody {
                id: receipt.customer.customer_id,
                email: receipt.customer.email,
            },
            subscription: SubscriptionBody {
                id: receipt.subscription.subscription_id,
                status: receipt.subscription.status,
            },
            subscription_item: SubscriptionItemBody {
                id: receipt.subscription.subscription_item_id,
                price: receipt.subscription.price_id,
            },
        }
    }
}

/// Provision a billing customer and metered subscription for the caller.
pub async fn create_stripe_customer(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ProvisionResponse>, ApiError> {
    let receipt = pipeline::provision_account(&state, &auth).await?;

    Ok(Json(receipt.into()))
}
