//! API error taxonomy and HTTP responses.
//!
//! Callers branch on the error kind, never on message text. Every error
//! renders as `{"error": <code>, "message": <description>}`; internal causes
//! are logged but never leaked into the body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or invalid bearer credential.
    #[error("unauthorized")]
    Unauthorized,

    /// Malformed request body (e.g. missing or empty prompt).
    #[error("validation error: {0}")]
    Validation(String),

    /// The caller has no account; the provisioning endpoint must be called first.
    #[error("account not found")]
    AccountNotFound,

    /// The caller's account has no metered subscription.
    #[error("subscription required")]
    SubscriptionRequired,

    /// Billing identifiers already present; provisioning must not run twice.
    #[error("account already provisioned")]
    AlreadyProvisioned,

    /// The bearer credential carries no verified email address.
    #[error("credential has no verified email")]
    MissingEmail,

    /// A downstream provider (LLM or billing) failed or is unreachable.
    #[error("provider error: {0}")]
    Provider(String),

    /// A durable store read or write failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A required secret or identifier is not configured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Bad request outside the validation taxonomy (e.g. webhook signature).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "Missing or invalid credential".to_string(),
            ),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            Self::AccountNotFound => (
                StatusCode::NOT_FOUND,
                "account_not_found",
                "No account exists for this user; call /createStripeCustomer first".to_string(),
            ),
            Self::SubscriptionRequired => (
                StatusCode::BAD_REQUEST,
                "subscription_required",
                "Account has no metered subscription; call /createStripeCustomer first"
                    .to_string(),
            ),
            Self::AlreadyProvisioned => (
                StatusCode::BAD_REQUEST,
                "already_provisioned",
                "Billing is already provisioned for this account".to_string(),
            ),
            Self::MissingEmail => (
                StatusCode::BAD_REQUEST,
                "missing_email",
                "Credential carries no verified email address".to_string(),
            ),
            Self::Provider(msg) => (StatusCode::BAD_GATEWAY, "provider_error", msg.clone()),
            Self::Persistence(msg) => {
                tracing::error!(error = %msg, "Store operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "persistence_error",
                    "A storage operation failed".to_string(),
                )
            }
            Self::Configuration(msg) => {
                tracing::error!(error = %msg, "Missing configuration");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    "The service is not configured for this operation".to_string(),
                )
            }
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: code,
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<tollbooth_store::StoreError> for ApiError {
    fn from(err: tollbooth_store::StoreError) -> Self {
        match err {
            tollbooth_store::StoreError::NotFound => Self::Internal("record not found".into()),
            tollbooth_store::StoreError::Database(msg)
            | tollbooth_store::StoreError::Serialization(msg) => Self::Persistence(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn unauthorized_maps_to_401() {
        let (status, body) = body_json(ApiError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "authentication_error");
    }

    #[tokio::test]
    async fn account_not_found_maps_to_404() {
        let (status, body) = body_json(ApiError::AccountNotFound).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "account_not_found");
    }

    #[tokio::test]
    async fn internal_error_message_is_generic() {
        let (status, body) = body_json(ApiError::Internal("secret detail".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["message"].as_str().unwrap().contains("secret detail"));
    }

    #[tokio::test]
    async fn configuration_error_is_a_server_error() {
        let (status, body) = body_json(ApiError::Configuration("no price".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "configuration_error");
    }
}
