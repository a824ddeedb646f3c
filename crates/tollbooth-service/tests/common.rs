//! Common test utilities for tollbooth integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;

use tollbooth_core::{Account, BillingProfile, UserId};
use tollbooth_store::{MemoryStore, Store};

use tollbooth_service::auth::StaticVerifier;
use tollbooth_service::billing::{
    BillingError, BillingReporter, CustomerHandle, SubscriptionHandle,
};
use tollbooth_service::llm::{Completion, CompletionError, CompletionGateway};
use tollbooth_service::{create_router, AppState, ServiceConfig};

/// Bearer token the harness registers for the test user.
pub const USER_TOKEN: &str = "test-token-user";

/// Bearer token for a user whose credential carries no verified email.
pub const NO_EMAIL_TOKEN: &str = "test-token-no-email";

/// Webhook signing secret the harness configures when asked to.
pub const WEBHOOK_SECRET: &str = "whsec_harness_secret";

/// Completion gateway fake driven by a schedule of token counts.
pub struct FakeGateway {
    schedule: Mutex<VecDeque<u64>>,
    fallback: u64,
    calls: AtomicUsize,
}

impl FakeGateway {
    /// Every completion reports the same token count.
    pub fn new(tokens: u64) -> Arc<Self> {
        Arc::new(Self {
            schedule: Mutex::new(VecDeque::new()),
            fallback: tokens,
            calls: AtomicUsize::new(0),
        })
    }

    /// Completions report these token counts in order, then the last one.
    pub fn with_schedule(tokens: Vec<u64>) -> Arc<Self> {
        let fallback = tokens.last().copied().unwrap_or(0);
        Arc::new(Self {
            schedule: Mutex::new(tokens.into()),
            fallback,
            calls: AtomicUsize::new(0),
        })
    }

    /// How many completions have been served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionGateway for FakeGateway {
    async fn complete(&self, prompt: &str) -> Result<Completion, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tokens_used = self
            .schedule
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);

        Ok(Completion {
            output: format!("echo: {prompt}"),
            tokens_used,
            model: "test-model".to_string(),
        })
    }
}

/// Billing reporter fake that records every call.
pub struct RecordingReporter {
    fail_reports: bool,
    customers_created: AtomicUsize,
    reports: Mutex<Vec<(String, u64)>>,
}

impl RecordingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_reports: false,
            customers_created: AtomicUsize::new(0),
            reports: Mutex::new(Vec::new()),
        })
    }

    /// A reporter whose `report_usage` always fails.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_reports: true,
            customers_created: AtomicUsize::new(0),
            reports: Mutex::new(Vec::new()),
        })
    }

    /// Usage reports received so far, as (subscription item, units) pairs.
    pub fn reports(&self) -> Vec<(String, u64)> {
        self.reports.lock().unwrap().clone()
    }

    /// How many customers have been created.
    pub fn customers_created(&self) -> usize {
        self.customers_created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BillingReporter for RecordingReporter {
    async fn create_customer(
        &self,
        email: &str,
        _user_id: &UserId,
    ) -> Result<CustomerHandle, BillingError> {
        self.customers_created.fetch_add(1, Ordering::SeqCst);
        Ok(CustomerHandle {
            customer_id: "cus_test".to_string(),
            email: email.to_string(),
        })
    }

    async fn create_metered_subscription(
        &self,
        _customer_id: &str,
    ) -> Result<SubscriptionHandle, BillingError> {
        Ok(SubscriptionHandle {
            subscription_id: "sub_test".to_string(),
            subscription_item_id: "si_test".to_string(),
            status: "active".to_string(),
            price_id: "price_test".to_string(),
        })
    }

    async fn report_usage(
        &self,
        subscription_item_id: &str,
        units: u64,
    ) -> Result<(), BillingError> {
        if self.fail_reports {
            return Err(BillingError::Provider("simulated outage".to_string()));
        }
        self.reports
            .lock()
            .unwrap()
            .push((subscription_item_id.to_string(), units));
        Ok(())
    }
}

/// Builder for the integration test server.
pub struct HarnessBuilder {
    gateway: Option<Arc<dyn CompletionGateway>>,
    billing: Option<Arc<dyn BillingReporter>>,
    webhook_secret: Option<String>,
    provisioned: bool,
}

impl HarnessBuilder {
    pub fn gateway(mut self, gateway: Arc<FakeGateway>) -> Self {
        self.gateway = Some(gateway as Arc<dyn CompletionGateway>);
        self
    }

    pub fn billing(mut self, reporter: Arc<RecordingReporter>) -> Self {
        self.billing = Some(reporter as Arc<dyn BillingReporter>);
        self
    }

    pub fn webhook_secret(mut self) -> Self {
        self.webhook_secret = Some(WEBHOOK_SECRET.to_string());
        self
    }

    /// Seed the test user's account with completed billing provisioning.
    pub fn provisioned(mut self) -> Self {
        self.provisioned = true;
        self
    }

    pub fn build(self) -> TestHarness {
        let user_id: UserId = "u_integration".parse().expect("valid user id");
        let store = Arc::new(MemoryStore::new());

        if self.provisioned {
            store
                .put_account(&Account::new(user_id.clone()))
                .expect("seed account");
            store
                .set_billing_profile(
                    &user_id,
                    BillingProfile {
                        customer_id: "cus_seeded".into(),
                        subscription_id: "sub_seeded".into(),
                        subscription_item_id: "si_seeded".into(),
                    },
                )
                .expect("seed billing profile");
        }

        let verifier = StaticVerifier::new()
            .with_token(
                USER_TOKEN,
                user_id.clone(),
                Some("user@example.com".to_string()),
            )
            .with_token(
                NO_EMAIL_TOKEN,
                "u_no_email".parse().expect("valid user id"),
                None,
            );

        let config = ServiceConfig {
            stripe_webhook_secret: self.webhook_secret,
            ..ServiceConfig::default()
        };

        let state = AppState::with_parts(
            store.clone(),
            config,
            Arc::new(verifier),
            self.gateway,
            self.billing,
        );

        let router: Router = create_router(state);
        let server = TestServer::new(router).expect("Failed to create test server");

        TestHarness {
            server,
            store,
            user_id,
        }
    }
}

/// Everything an integration test needs: a server, the backing store, and
/// the identity the registered tokens resolve to.
pub struct TestHarness {
    pub server: TestServer,
    pub store: Arc<MemoryStore>,
    pub user_id: UserId,
}

impl TestHarness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            gateway: None,
            billing: None,
            webhook_secret: None,
            provisioned: false,
        }
    }

    /// The authorization header for the test user.
    pub fn user_auth_header(&self) -> String {
        format!("Bearer {USER_TOKEN}")
    }
}
