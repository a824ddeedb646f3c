//! Account provisioning integration tests.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{RecordingReporter, TestHarness, NO_EMAIL_TOKEN};
use tollbooth_store::Store;

#[tokio::test]
async fn provisioning_creates_customer_and_subscription() {
    let reporter = RecordingReporter::new();
    let harness = TestHarness::builder().billing(reporter.clone()).build();

    let response = harness
        .server
        .post("/createStripeCustomer")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({}))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["customer"]["id"], "cus_test");
    assert_eq!(body["customer"]["email"], "user@example.com");
    assert_eq!(body["subscription"]["id"], "sub_test");
    assert_eq!(body["subscription"]["status"], "active");
    assert_eq!(body["subscriptionItem"]["id"], "si_test");
    assert_eq!(body["subscriptionItem"]["price"], "price_test");

    assert_eq!(reporter.customers_created(), 1);

    // All three identifiers landed on the stored account.
    let account = harness
        .store
        .get_account(&harness.user_id)
        .unwrap()
        .expect("account persisted");
    assert_eq!(account.subscription_item_id(), Some("si_test"));
}

#[tokio::test]
async fn provisioning_twice_is_rejected() {
    let reporter = RecordingReporter::new();
    let harness = TestHarness::builder().billing(reporter.clone()).build();

    harness
        .server
        .post("/createStripeCustomer")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({}))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .post("/createStripeCustomer")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "already_provisioned");

    // No second Stripe customer was created.
    assert_eq!(reporter.customers_created(), 1);
}

#[tokio::test]
async fn provisioning_without_verified_email_is_rejected() {
    let reporter = RecordingReporter::new();
    let harness = TestHarness::builder().billing(reporter.clone()).build();

    let response = harness
        .server
        .post("/createStripeCustomer")
        .add_header("authorization", format!("Bearer {NO_EMAIL_TOKEN}"))
        .json(&json!({}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "missing_email");
    assert_eq!(reporter.customers_created(), 0);
}

#[tokio::test]
async fn provisioning_without_billing_configured_is_a_server_error() {
    let harness = TestHarness::builder().build();

    let response = harness
        .server
        .post("/createStripeCustomer")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({}))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "configuration_error");
}

#[tokio::test]
async fn provisioning_without_auth_fails() {
    let harness = TestHarness::builder()
        .billing(RecordingReporter::new())
        .build();

    let response = harness
        .server
        .post("/createStripeCustomer")
        .json(&json!({}))
        .await;

    response.assert_status_unauthorized();
}
