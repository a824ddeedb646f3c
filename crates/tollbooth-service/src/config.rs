//! Service configuration.
//!
//! Every secret is optional at load time; a missing secret degrades the
//! dependent operation to a configuration error instead of failing startup.

use serde::Deserialize;
use std::path::Path;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to the persistent data directory (default: "/data/tollbooth").
    /// Only used by the RocksDB backend.
    pub data_dir: String,

    /// Identity provider base URL for JWT validation.
    pub auth_base_url: String,

    /// Expected JWT audience (default: "tollbooth").
    pub auth_audience: String,

    /// Completion provider base URL (OpenAI-compatible).
    pub completion_api_url: String,

    /// Completion provider API key (optional).
    pub completion_api_key: Option<String>,

    /// Model to request from the completion provider.
    pub completion_model: String,

    /// Stripe secret API key (optional).
    pub stripe_api_key: Option<String>,

    /// Stripe price ID of the fixed metered price (optional).
    pub stripe_price_id: Option<String>,

    /// Stripe webhook signing secret (optional).
    pub stripe_webhook_secret: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
    #[serde(default)]
    price_id: Option<String>,
    #[serde(default)]
    webhook_secret: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        // Try to load Stripe secrets from file first, then fall back to env vars
        let (stripe_api_key, stripe_price_id, stripe_webhook_secret) = load_stripe_secrets();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/tollbooth".into()),
            auth_base_url: std::env::var("AUTH_BASE_URL")
                .unwrap_or_else(|_| "https://securetoken.example.com".into()),
            auth_audience: std::env::var("AUTH_AUDIENCE").unwrap_or_else(|_| "tollbooth".into()),
            completion_api_url: std::env::var("COMPLETION_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            completion_api_key: std::env::var("COMPLETION_API_KEY").ok(),
            completion_model: std::env::var("COMPLETION_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".into()),
            stripe_api_key,
            stripe_price_id,
            stripe_webhook_secret,
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
        }
    }
}

/// Load Stripe secrets from file or environment.
fn load_stripe_secrets() -> (Option<String>, Option<String>, Option<String>) {
    let secret_paths = [".secrets/stripe.json", "../.secrets/stripe.json"];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return merged_with_env(secrets);
        }
    }

    tracing::debug!("Stripe secrets file not found, using environment variables");
    (
        std::env::var("STRIPE_API_KEY").ok(),
        std::env::var("STRIPE_PRICE_ID").ok(),
        std::env::var("STRIPE_WEBHOOK_SECRET").ok(),
    )
}

/// Merge file-sourced secrets with environment fallbacks.
///
/// The file wins for any field it carries; the environment fills the gaps.
fn merged_with_env(secrets: StripeSecrets) -> (Option<String>, Option<String>, Option<String>) {
    let price_id = secrets
        .price_id
        .or_else(|| std::env::var("STRIPE_PRICE_ID").ok());
    let webhook_secret = secrets
        .webhook_secret
        .or_else(|| std::env::var("STRIPE_WEBHOOK_SECRET").ok());

    (Some(secrets.api_key), price_id, webhook_secret)
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/tollbooth".into(),
            auth_base_url: "https://securetoken.example.com".into(),
            auth_audience: "tollbooth".into(),
            completion_api_url: "https://api.openai.com/v1".into(),
            completion_api_key: None,
            completion_model: "gpt-4o-mini".into(),
            stripe_api_key: None,
            stripe_price_id: None,
            stripe_webhook_secret: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_file_fields_win_and_env_fills_the_gaps() {
        std::env::set_var("STRIPE_PRICE_ID", "price_env");
        std::env::set_var("STRIPE_WEBHOOK_SECRET", "whsec_env");

        let (api_key, price_id, webhook_secret) = merged_with_env(StripeSecrets {
            api_key: "sk_file".into(),
            price_id: Some("price_file".into()),
            webhook_secret: None,
        });

        assert_eq!(api_key.as_deref(), Some("sk_file"));
        assert_eq!(price_id.as_deref(), Some("price_file"));
        assert_eq!(webhook_secret.as_deref(), Some("whsec_env"));

        std::env::remove_var("STRIPE_PRICE_ID");
        std::env::remove_var("STRIPE_WEBHOOK_SECRET");
    }
}
