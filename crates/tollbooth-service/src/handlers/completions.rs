//! Metered completion handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::pipeline::{self, CompletionReceipt};
use crate::state::AppState;

/// Completion request body.
///
/// `prompt` is optional at the serde layer so a missing field and an empty
/// field both reach the pipeline's validation step and map to the same
/// validation error instead of a generic deserialization failure.
#[derive(Debug, Deserialize)]
pub struct RunLlmRequest {
    /// The prompt to complete.
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Run one metered completion for the authenticated caller.
pub async fn run_llm(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<RunLlmRequest>,
) -> Result<Json<CompletionReceipt>, ApiError> {
    let receipt = pipeline::run_completion(&state, &auth.user_id, body.prompt.as_deref()).await?;

    Ok(Json(receipt))
}
