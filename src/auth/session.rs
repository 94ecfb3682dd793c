use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::Role;
use crate::config::SessionConfig;

const ISSUER: &str = "portfolio-ops";

/// Claims carried by the session cookie
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Firebase uid
    pub sub: String,
    pub email: Option<String>,
    pub role: Role,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session secret is not configured")]
    InvalidSecret,

    #[error("Session token generation failed: {0}")]
    TokenGeneration(String),

    #[error("Session expired")]
    Expired,

    #[error("Invalid session token: {0}")]
    Invalid(String),
}

/// Issues and verifies the server-side session token
pub struct SessionManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    cookie_name: String,
    lifetime: Duration,
    secure_cookie: bool,
}

impl SessionManager {
    pub fn new(config: &SessionConfig) -> Result<Self, SessionError> {
        if config.secret.is_empty() {
            return Err(SessionError::InvalidSecret);
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            cookie_name: config.cookie_name.clone(),
            lifetime: Duration::hours(config.lifetime_hours as i64),
            secure_cookie: config.secure_cookie,
        })
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn issue(&self, uid: &str, email: Option<&str>, role: Role) -> Result<IssuedSession, SessionError> {
        let now = Utc::now();
        let expires_at = now + self.lifetime;
        let claims = SessionClaims {
            sub: uid.to_string(),
            email: email.map(str::to_string),
            role,
            iss: ISSUER.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| SessionError::TokenGeneration(e.to_string()))?;

        let expires_at = Utc.timestamp_opt(claims.exp, 0).single().unwrap_or(expires_at);
        Ok(IssuedSession { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.leeway = 0;

        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid(e.to_string()),
            })
    }

    /// Token from the session cookie, falling back to a Bearer header
    pub fn extract_token(&self, headers: &HeaderMap) -> Option<String> {
        let from_cookie = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty());

        from_cookie.or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty())
        })
    }

    pub fn cookie(&self, session: &IssuedSession) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
            self.cookie_name,
            session.token,
            self.lifetime.num_seconds(),
            if self.secure_cookie { "; Secure" } else { "" }
        )
    }

    pub fn clear_cookie(&self) -> String {
        format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
            self.cookie_name,
            if self.secure_cookie { "; Secure" } else { "" }
        )
    }
}
