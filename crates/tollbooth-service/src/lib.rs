//! Tollbooth HTTP API service.
//!
//! This crate provides the HTTP surface for the tollbooth gateway:
//!
//! - `POST /runLLM` - the metered completion pipeline
//! - `POST /createStripeCustomer` - billing account provisioning
//! - `POST /stripeWebhook` - subscription lifecycle event intake
//!
//! # Authentication
//!
//! End-user requests carry a bearer token verified through a pluggable
//! [`auth::TokenVerifier`]; the production verifier validates RS256 JWTs
//! against the identity provider's JWKS. The webhook endpoint authenticates
//! with a Stripe signature header instead.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result

pub mod auth;
pub mod billing;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod stripe;

pub use billing::{BillingError, BillingReporter, CustomerHandle, SubscriptionHandle};
pub use config::ServiceConfig;
pub use error::ApiError;
pub use llm::{Completion, CompletionError, CompletionGateway};
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{StripeClient, StripeError};
