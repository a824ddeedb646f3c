//! Application state.
//!
//! All provider clients are constructed once at startup from configuration
//! and injected as trait objects, so tests substitute fakes and no handler
//! reaches for ambient globals.

use std::sync::Arc;

use tollbooth_store::Store;

use crate::auth::{JwksVerifier, TokenVerifier};
use crate::billing::BillingReporter;
use crate::config::ServiceConfig;
use crate::llm::{CompletionClient, CompletionGateway};
use crate::stripe::StripeClient;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend (accounts + usage ledger).
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Bearer-token verifier.
    pub verifier: Arc<dyn TokenVerifier>,

    /// Completion provider client, absent when no credential is configured.
    pub gateway: Option<Arc<dyn CompletionGateway>>,

    /// Billing reporter, absent when Stripe is not configured.
    pub billing: Option<Arc<dyn BillingReporter>>,
}

impl AppState {
    /// Create application state with production clients built from config.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let verifier: Arc<dyn TokenVerifier> = Arc::new(JwksVerifier::new(
            config.auth_base_url.clone(),
            config.auth_audience.clone(),
        ));

        let gateway: Option<Arc<dyn CompletionGateway>> =
            config.completion_api_key.as_ref().and_then(|key| {
                match CompletionClient::new(
                    key,
                    config.completion_api_url.clone(),
                    config.completion_model.clone(),
                ) {
                    Ok(client) => {
                        tracing::info!(model = %config.completion_model, "Completion provider enabled");
                        Some(Arc::new(client) as Arc<dyn CompletionGateway>)
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to create completion client");
                        None
                    }
                }
            });

        if gateway.is_none() {
            tracing::warn!("Completion provider not configured - /runLLM will fail");
        }

        let billing: Option<Arc<dyn BillingReporter>> =
            config.stripe_api_key.as_ref().and_then(|key| {
                match StripeClient::new(key, config.stripe_price_id.clone()) {
                    Ok(client) => {
                        tracing::info!("Stripe integration enabled");
                        Some(Arc::new(client) as Arc<dyn BillingReporter>)
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to create Stripe client");
                        None
                    }
                }
            });

        if billing.is_none() {
            tracing::warn!("Stripe not configured - usage will not be billed");
        }

        Self {
            store,
            config,
            verifier,
            gateway,
            billing,
        }
    }

    /// Assemble state from explicit parts (used by tests to inject fakes).
    #[must_use]
    pub fn with_parts(
        store: Arc<dyn Store>,
        config: ServiceConfig,
        verifier: Arc<dyn TokenVerifier>,
        gateway: Option<Arc<dyn CompletionGateway>>,
        billing: Option<Arc<dyn BillingReporter>>,
    ) -> Self {
        Self {
            store,
            config,
            verifier,
            gateway,
            billing,
        }
    }
}
