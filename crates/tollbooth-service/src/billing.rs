//! The billing reporter boundary.
//!
//! The pipeline talks to the billing provider through [`BillingReporter`],
//! which returns narrow, explicitly-typed handles rather than the provider's
//! raw response shapes. [`crate::stripe::StripeClient`] is the production
//! implementation; tests substitute recording fakes.

use async_trait::async_trait;

use tollbooth_core::UserId;

/// A provisioned billing customer.
#[derive(Debug, Clone)]
pub struct CustomerHandle {
    /// Provider customer ID (`cus_...`).
    pub customer_id: String,
    /// The email the customer was created with.
    pub email: String,
}

/// A provisioned metered subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    /// Provider subscription ID (`sub_...`).
    pub subscription_id: String,
    /// The subscription item incremental usage is reported against (`si_...`).
    pub subscription_item_id: String,
    /// Provider-reported subscription status (e.g. "active").
    pub status: String,
    /// The metered price the subscription is bound to.
    pub price_id: String,
}

/// Errors from the billing provider boundary.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// A required identifier or secret is not configured.
    #[error("billing configuration error: {0}")]
    Configuration(String),

    /// The provider rejected the call or was unreachable.
    #[error("billing provider error: {0}")]
    Provider(String),
}

/// Creates customers/subscriptions and reports incremental metered usage.
#[async_trait]
pub trait BillingReporter: Send + Sync {
    /// Create a billing customer for a user.
    ///
    /// # Errors
    ///
    /// `Configuration` if billing is not configured, `Provider` otherwise.
    async fn create_customer(
        &self,
        email: &str,
        user_id: &UserId,
    ) -> Result<CustomerHandle, BillingError>;

    /// Create a subscription bound to the single fixed metered price.
    ///
    /// # Errors
    ///
    /// `Configuration` if no default metered price is configured.
    async fn create_metered_subscription(
        &self,
        customer_id: &str,
    ) -> Result<SubscriptionHandle, BillingError>;

    /// Increment the current billing period's usage by `units`.
    ///
    /// Not idempotent against the provider: a retry double-counts. Callers
    /// invoke this at most once per completed request and never with zero
    /// units.
    ///
    /// # Errors
    ///
    /// `Provider` on any rejection or transport failure.
    async fn report_usage(&self, subscription_item_id: &str, units: u64)
        -> Result<(), BillingError>;
}
