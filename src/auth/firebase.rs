use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::FirebaseConfig;

/// Identity proven by a Firebase ID token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity token rejected: {0}")]
    Rejected(String),

    #[error("Signing keys unavailable: {0}")]
    KeysUnavailable(String),
}

/// Verifies client-side sign-in tokens
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_id_token(&self, token: &str) -> Result<VerifiedIdentity, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
}

/// Shortest gap between two key fetches triggered by unknown key ids
const MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(60);

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Firebase ID token verifier backed by Google's published securetoken keys
pub struct FirebaseVerifier {
    project_id: String,
    jwks_url: String,
    cache_ttl: Duration,
    http: reqwest::Client,
    cache: RwLock<Option<CachedKeys>>,
}

impl FirebaseVerifier {
    pub fn new(config: &FirebaseConfig, http: reqwest::Client) -> Self {
        Self {
            project_id: config.project_id.clone(),
            jwks_url: config.jwks_url.clone(),
            cache_ttl: Duration::from_secs(config.jwks_cache_secs),
            http,
            cache: RwLock::new(None),
        }
    }

    fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id)
    }

    /// Key for `kid` from the cached set, if the set is still fresh and has it
    fn cached_key(&self, kid: &str, cache: &Option<CachedKeys>) -> Option<Result<DecodingKey, IdentityError>> {
        let cached = cache
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < self.cache_ttl)?;
        cached.keys.find(kid).map(|jwk| {
            DecodingKey::from_jwk(jwk).map_err(|e| IdentityError::KeysUnavailable(e.to_string()))
        })
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, IdentityError> {
        if let Some(key) = self.cached_key(kid, &*self.cache.read().await) {
            return key;
        }

        // Refetches are serialized behind the write lock
        let mut cache = self.cache.write().await;
        if let Some(key) = self.cached_key(kid, &cache) {
            return key;
        }

        // Google rotates keys, so an unknown kid may be new. A set fetched
        // moments ago is trusted to be current.
        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() < self.cache_ttl.min(MIN_REFETCH_INTERVAL) {
                return Err(IdentityError::Rejected(format!("unknown key id '{}'", kid)));
            }
        }

        let keys = self.fetch_keys().await?;
        let key = keys
            .find(kid)
            .ok_or_else(|| IdentityError::Rejected(format!("unknown key id '{}'", kid)))
            .and_then(|jwk| {
                DecodingKey::from_jwk(jwk).map_err(|e| IdentityError::KeysUnavailable(e.to_string()))
            });

        *cache = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });

        key
    }

    async fn fetch_keys(&self) -> Result<JwkSet, IdentityError> {
        tracing::debug!("Fetching Firebase signing keys from {}", self.jwks_url);

        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| IdentityError::KeysUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::KeysUnavailable(format!(
                "key endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| IdentityError::KeysUnavailable(e.to_string()))
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify_id_token(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        if self.project_id.is_empty() {
            return Err(IdentityError::Rejected("Firebase project is not configured".to_string()));
        }

        let header = decode_header(token).map_err(|e| IdentityError::Rejected(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(IdentityError::Rejected(format!("unexpected algorithm {:?}", header.alg)));
        }
        let kid = header
            .kid
            .ok_or_else(|| IdentityError::Rejected("token has no key id".to_string()))?;

        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_issuer(&[self.issuer()]);

        let claims = decode::<FirebaseClaims>(token, &key, &validation)
            .map_err(|e| IdentityError::Rejected(e.to_string()))?
            .claims;

        if claims.sub.is_empty() {
            return Err(IdentityError::Rejected("token subject is empty".to_string()));
        }

        Ok(VerifiedIdentity {
            uid: claims.sub,
            email: claims.email,
            email_verified: claims.email_verified,
            name: claims.name,
        })
    }
}
