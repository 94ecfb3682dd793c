//! Service-account OAuth for the Google APIs used here (Cloud Storage, BigQuery).

use std::time::{Duration, Instant};

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::GoogleConfig;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum GoogleAuthError {
    #[error("No service-account credentials configured")]
    MissingCredentials,

    #[error("Invalid service-account key: {0}")]
    InvalidKey(String),

    #[error("Token exchange failed: {0}")]
    Exchange(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub project_id: Option<String>,
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, GoogleAuthError> {
        serde_json::from_str(json).map_err(|e| GoogleAuthError::InvalidKey(e.to_string()))
    }

    /// Inline JSON wins over the key file
    pub fn from_config(config: &GoogleConfig) -> Result<Self, GoogleAuthError> {
        if let Some(json) = config.credentials_json.as_deref().filter(|s| !s.trim().is_empty()) {
            return Self::from_json(json);
        }
        let path = config
            .credentials_file
            .as_deref()
            .ok_or(GoogleAuthError::MissingCredentials)?;
        let json = std::fs::read_to_string(path)
            .map_err(|e| GoogleAuthError::InvalidKey(format!("{}: {}", path, e)))?;
        Self::from_json(&json)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Exchanges a signed service-account assertion for short-lived access tokens
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    token_url: String,
    http: reqwest::Client,
    cached: RwLock<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey, token_url: &str, http: reqwest::Client) -> Result<Self, GoogleAuthError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| GoogleAuthError::InvalidKey(e.to_string()))?;
        let token_url = key.token_uri.clone().unwrap_or_else(|| token_url.to_string());

        Ok(Self {
            key,
            signing_key,
            token_url,
            http,
            cached: RwLock::new(None),
        })
    }

    pub fn project_id(&self) -> Option<&str> {
        self.key.project_id.as_deref()
    }

    pub async fn access_token(&self) -> Result<String, GoogleAuthError> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref() {
                if Instant::now() + REFRESH_MARGIN < token.expires_at {
                    return Ok(token.value.clone());
                }
            }
        }

        let fresh = self.exchange().await?;
        let value = fresh.access_token.clone();
        *self.cached.write().await = Some(CachedToken {
            value: fresh.access_token,
            expires_at: Instant::now() + Duration::from_secs(fresh.expires_in),
        });

        Ok(value)
    }

    fn assertion(&self) -> Result<String, GoogleAuthError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.token_url,
            iat: now,
            exp: now + 3600,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| GoogleAuthError::InvalidKey(e.to_string()))
    }

    async fn exchange(&self) -> Result<TokenResponse, GoogleAuthError> {
        let assertion = self.assertion()?;

        let response = self
            .http
            .post(&self.token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| GoogleAuthError::Exchange(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GoogleAuthError::Exchange(format!("{}: {}", status, body)));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| GoogleAuthError::Exchange(e.to_string()))?;

        tracing::debug!("Obtained Google access token for {}", self.key.client_email);
        Ok(token)
    }
}
