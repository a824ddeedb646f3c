//! Bearer-token authentication.
//!
//! Identity verification is an external collaborator: an opaque bearer
//! credential maps to a stable user id and a verified email. The mapping
//! lives behind [`TokenVerifier`] so the service wiring can inject the JWKS
//! verifier in production and a static table in tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;

use tollbooth_core::UserId;

use crate::error::ApiError;
use crate::state::AppState;

/// How long to cache JWKS keys before refreshing.
const JWKS_CACHE_DURATION: Duration = Duration::from_secs(3600);

/// Timeout for JWKS fetch requests.
const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// The identity a bearer credential resolves to.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// The stable user ID.
    pub user_id: UserId,
    /// The credential's verified email address, if it carries one.
    pub email: Option<String>,
}

/// Maps an opaque bearer credential to a verified identity.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for any missing, malformed, expired,
    /// or otherwise invalid credential.
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, ApiError>;
}

/// An authenticated user extracted from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user ID.
    pub user_id: UserId,
    /// The verified email, if the credential carries one.
    pub email: Option<String>,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized)?;

        let identity = state.verifier.verify(token).await?;

        Ok(AuthUser {
            user_id: identity.user_id,
            email: identity.email,
        })
    }
}

// ============================================================================
// JWKS verifier (production)
// ============================================================================

/// JWT claims expected from the identity provider.
#[derive(Debug, Clone, Deserialize)]
struct JwtClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[allow(dead_code)]
    exp: i64,
}

/// JWKS (JSON Web Key Set) response structure.
#[derive(Debug, Clone, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

/// Single JSON Web Key.
#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kty: String,
    kid: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

struct KeyCache {
    keys: HashMap<String, DecodingKey>,
    default_key: Option<DecodingKey>,
    last_updated: Option<Instant>,
}

impl KeyCache {
    fn is_expired(&self) -> bool {
        self.last_updated
            .map_or(true, |at| at.elapsed() >= JWKS_CACHE_DURATION)
    }

    fn lookup(&self, kid: Option<&str>) -> Option<DecodingKey> {
        match kid {
            Some(kid) => self.keys.get(kid).cloned(),
            None => self.default_key.clone(),
        }
    }
}

/// Validates RS256 JWTs against the identity provider's JWKS endpoint.
///
/// Keys are fetched lazily and cached for an hour; the HTTP client is built
/// once so fetches reuse connections.
pub struct JwksVerifier {
    client: reqwest::Client,
    base_url: String,
    audience: String,
    cache: RwLock<KeyCache>,
}

impl JwksVerifier {
    /// Create a verifier for the given identity provider.
    #[must_use]
    pub fn new(base_url: impl Into<String>, audience: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(JWKS_FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into(),
            audience: audience.into(),
            cache: RwLock::new(KeyCache {
                keys: HashMap::new(),
                default_key: None,
                last_updated: None,
            }),
        }
    }

    async fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey, ApiError> {
        {
            let cache = self.cache.read().await;
            if !cache.is_expired() {
                if let Some(key) = cache.lookup(kid) {
                    return Ok(key);
                }
            }
        }

        let jwks = self.fetch_jwks().await?;

        let mut cache = self.cache.write().await;
        cache.keys.clear();
        cache.default_key = None;
        cache.last_updated = Some(Instant::now());

        for jwk in &jwks.keys {
            if let Some(key) = jwk_to_decoding_key(jwk) {
                if let Some(ref key_kid) = jwk.kid {
                    cache.keys.insert(key_kid.clone(), key.clone());
                }
                if cache.default_key.is_none() {
                    cache.default_key = Some(key);
                }
            }
        }

        cache.lookup(kid).ok_or(ApiError::Unauthorized)
    }

    async fn fetch_jwks(&self) -> Result<Jwks, ApiError> {
        let jwks_url = format!("{}/.well-known/jwks.json", self.base_url);

        tracing::debug!(url = %jwks_url, "Fetching JWKS");

        let response = self.client.get(&jwks_url).send().await.map_err(|e| {
            tracing::error!(error = %e, url = %jwks_url, "Failed to fetch JWKS");
            ApiError::Provider("Failed to fetch authentication keys".into())
        })?;

        if !response.status().is_success() {
            tracing::error!(
                status = %response.status(),
                url = %jwks_url,
                "JWKS fetch returned non-success status"
            );
            return Err(ApiError::Provider(
                "Failed to fetch authentication keys".into(),
            ));
        }

        response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse JWKS response");
            ApiError::Provider("Failed to parse authentication keys".into())
        })
    }
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, ApiError> {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!(error = %e, "Failed to decode JWT header");
            ApiError::Unauthorized
        })?;

        let key = self.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.base_url]);

        let token_data = decode::<JwtClaims>(token, &key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "JWT validation failed");
            ApiError::Unauthorized
        })?;

        let claims = token_data.claims;
        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| ApiError::Unauthorized)?;

        // Only surface the email when the provider has verified it; the
        // provisioning flow must not create billing customers for
        // unverified addresses.
        let email = claims.email.filter(|_| claims.email_verified);

        Ok(VerifiedIdentity { user_id, email })
    }
}

fn jwk_to_decoding_key(jwk: &Jwk) -> Option<DecodingKey> {
    if jwk.kty != "RSA" {
        tracing::debug!(kty = %jwk.kty, "Skipping non-RSA JWK");
        return None;
    }

    let n = jwk.n.as_ref()?;
    let e = jwk.e.as_ref()?;

    DecodingKey::from_rsa_components(n, e).ok()
}

// ============================================================================
// Static verifier (tests, local development)
// ============================================================================

/// A verifier backed by a fixed token table.
#[derive(Debug, Default)]
pub struct StaticVerifier {
    identities: HashMap<String, VerifiedIdentity>,
}

impl StaticVerifier {
    /// Create an empty verifier (rejects everything).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token that resolves to the given identity.
    #[must_use]
    pub fn with_token(
        mut self,
        token: impl Into<String>,
        user_id: UserId,
        email: Option<String>,
    ) -> Self {
        self.identities
            .insert(token.into(), VerifiedIdentity { user_id, email });
        self
    }
}

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, ApiError> {
        self.identities
            .get(token)
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_verifier_resolves_known_tokens() {
        let user: UserId = "u_auth_1".parse().unwrap();
        let verifier = StaticVerifier::new().with_token(
            "tok-1",
            user.clone(),
            Some("person@example.com".into()),
        );

        let identity = verifier.verify("tok-1").await.unwrap();
        assert_eq!(identity.user_id, user);
        assert_eq!(identity.email.as_deref(), Some("person@example.com"));
    }

    #[tokio::test]
    async fn static_verifier_rejects_unknown_tokens() {
        let verifier = StaticVerifier::new();
        assert!(matches!(
            verifier.verify("nope").await,
            Err(ApiError::Unauthorized)
        ));
    }
}
