//! The request orchestrator.
//!
//! Two linear pipelines run here. The completion pipeline:
//!
//! ```text
//! validate -> load account -> check subscription -> complete
//!          -> record usage -> convert units -> report usage -> respond
//! ```
//!
//! Authentication happens upstream in the [`crate::auth::AuthUser`]
//! extractor. Everything before the completion call is side-effect free and
//! aborts cleanly. After the completion, the ledger write must succeed or
//! the request fails; the billing report may fail without failing the
//! request, and it is attempted at most once because Stripe's usage
//! endpoint is not idempotent. Any retry strategy belongs to an
//! out-of-band reconciliation job, never this path.
//!
//! The provisioning pipeline:
//!
//! ```text
//! check existing -> create customer -> create subscription -> persist
//! ```
//!
//! with an early exit when billing identifiers already exist, which is the
//! guard against creating duplicate Stripe customers for one user.

use serde::Serialize;

use tollbooth_core::{units_for, Account, BillingProfile, UserId};

use crate::auth::AuthUser;
use crate::billing::{BillingError, CustomerHandle, SubscriptionHandle};
use crate::error::ApiError;
use crate::state::AppState;

/// Outcome of the billing-report step, surfaced as a value so response
/// construction (and tests) can branch on it deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Usage was reported; the period was incremented by this many units.
    Reported(u64),
    /// Zero units; the reporter was never invoked.
    Skipped,
    /// The report call failed; the failure was absorbed and logged.
    Failed,
}

impl ReportOutcome {
    /// Units actually reported to the billing provider.
    #[must_use]
    pub fn units_reported(self) -> u64 {
        match self {
            Self::Reported(units) => units,
            Self::Skipped | Self::Failed => 0,
        }
    }
}

/// Result of one completed request through the pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReceipt {
    /// The generated text.
    pub output: String,
    /// Provider-reported token consumption.
    pub tokens_used: u64,
    /// Units reported to billing (0 when the report was skipped or failed).
    pub units_reported: u64,
    /// The model that produced the output.
    pub model: String,
}

/// Result of a completed provisioning request.
#[derive(Debug, Clone)]
pub struct ProvisionReceipt {
    /// The created billing customer.
    pub customer: CustomerHandle,
    /// The created metered subscription.
    pub subscription: SubscriptionHandle,
}

/// Run one metered completion request for an authenticated user.
///
/// # Errors
///
/// Fails per the taxonomy in [`ApiError`]; see the module docs for which
/// steps abort cleanly and which leave durable state behind.
pub async fn run_completion(
    state: &AppState,
    user_id: &UserId,
    prompt: Option<&str>,
) -> Result<CompletionReceipt, ApiError> {
    // VALIDATING_INPUT: no side effects yet.
    let prompt = prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::Validation("prompt must be a non-empty string".into()))?;

    // LOADING_ACCOUNT / CHECKING_SUBSCRIPTION: precondition gates.
    let account = state
        .store
        .get_account(user_id)?
        .ok_or(ApiError::AccountNotFound)?;

    let subscription_item_id = account
        .subscription_item_id()
        .ok_or(ApiError::SubscriptionRequired)?
        .to_string();

    // COMPLETING: the one step whose failure must leave all state untouched.
    let gateway = state
        .gateway
        .as_ref()
        .ok_or_else(|| ApiError::Configuration("completion provider not configured".into()))?;

    let completion = gateway
        .complete(prompt)
        .await
        .map_err(|e| ApiError::Provider(e.to_string()))?;

    // RECORDING_USAGE: the ledger is the audit trail; losing this record is
    // worse than losing the billing report, so a failed append fails the
    // request even though the completion already succeeded.
    let record = state
        .store
        .append_usage(user_id, completion.tokens_used, &completion.model)
        .map_err(|e| ApiError::Persistence(e.to_string()))?;

    // CONVERTING_UNITS / REPORTING_USAGE.
    let units = units_for(completion.tokens_used);
    let outcome = report_units(state, &subscription_item_id, units).await;

    tracing::info!(
        user_id = %user_id,
        record_id = %record.id,
        tokens = %completion.tokens_used,
        units = %units,
        reported = ?outcome,
        model = %completion.model,
        "Completion recorded"
    );

    Ok(CompletionReceipt {
        output: completion.output,
        tokens_used: completion.tokens_used,
        units_reported: outcome.units_reported(),
        model: completion.model,
    })
}

/// Report converted units, absorbing every failure into the outcome value.
async fn report_units(state: &AppState, subscription_item_id: &str, units: u64) -> ReportOutcome {
    if units == 0 {
        return ReportOutcome::Skipped;
    }

    let Some(billing) = state.billing.as_ref() else {
        tracing::warn!(
            subscription_item = %subscription_item_id,
            units = %units,
            "Billing not configured; usage recorded but not reported"
        );
        return ReportOutcome::Failed;
    };

    match billing.report_usage(subscription_item_id, units).await {
        Ok(()) => ReportOutcome::Reported(units),
        Err(e) => {
            // Deliberately absorbed: the caller already consumed the tokens
            // and holds the output. No retry here; retrying would risk
            // double-billing on a non-idempotent endpoint.
            tracing::warn!(
                subscription_item = %subscription_item_id,
                units = %units,
                error = %e,
                "Billing report failed; usage remains recorded in the ledger"
            );
            ReportOutcome::Failed
        }
    }
}

/// Provision a billing customer and metered subscription for a user.
///
/// # Errors
///
/// `AlreadyProvisioned` when billing identifiers exist, `MissingEmail` when
/// the credential carries no verified email, `Configuration`/`Provider` for
/// billing failures, `Persistence` for store failures.
pub async fn provision_account(
    state: &AppState,
    auth: &AuthUser,
) -> Result<ProvisionReceipt, ApiError> {
    let email = auth.email.as_deref().ok_or(ApiError::MissingEmail)?;

    // CHECK_EXISTING: the guard against duplicate billing customers.
    let existing = state.store.get_account(&auth.user_id)?;
    if existing.as_ref().is_some_and(Account::is_provisioned) {
        return Err(ApiError::AlreadyProvisioned);
    }

    let billing = state
        .billing
        .as_ref()
        .ok_or_else(|| ApiError::Configuration("billing provider not configured".into()))?;

    // CREATE_CUSTOMER / CREATE_SUBSCRIPTION.
    let customer = billing
        .create_customer(email, &auth.user_id)
        .await
        .map_err(billing_to_api)?;

    let subscription = billing
        .create_metered_subscription(&customer.customer_id)
        .await
        .map_err(billing_to_api)?;

    // PERSIST: all three identifiers land in one atomic profile write.
    if existing.is_none() {
        state
            .store
            .put_account(&Account::new(auth.user_id.clone()))
            .map_err(|e| ApiError::Persistence(e.to_string()))?;
    }

    state
        .store
        .set_billing_profile(
            &auth.user_id,
            BillingProfile {
                customer_id: customer.customer_id.clone(),
                subscription_id: subscription.subscription_id.clone(),
                subscription_item_id: subscription.subscription_item_id.clone(),
            },
        )
        .map_err(|e| ApiError::Persistence(e.to_string()))?;

    tracing::info!(
        user_id = %auth.user_id,
        customer = %customer.customer_id,
        subscription = %subscription.subscription_id,
        "Account provisioned"
    );

    Ok(ProvisionReceipt {
        customer,
        subscription,
    })
}

fn billing_to_api(err: BillingError) -> ApiError {
    match err {
        BillingError::Configuration(msg) => ApiError::Configuration(msg),
        BillingError::Provider(msg) => ApiError::Provider(msg),
    }
}
