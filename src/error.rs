// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 415 Unsupported Media Type
    UnsupportedMediaType(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (external service issues)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::UnsupportedMediaType(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::BadGateway(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code()
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        ApiError::PayloadTooLarge(message.into())
    }

    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        ApiError::UnsupportedMediaType(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<crate::database::DatabaseError> for ApiError {
    fn from(err: crate::database::DatabaseError) -> Self {
        use crate::database::DatabaseError;
        match err {
            DatabaseError::Sqlx(sqlx::Error::PoolTimedOut) | DatabaseError::Sqlx(sqlx::Error::Io(_)) => {
                tracing::error!("Database unavailable: {}", err);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
            DatabaseError::Migration(msg) => {
                tracing::error!("Migration error: {}", msg);
                ApiError::service_unavailable("Service is being updated, please try again later")
            }
        }
    }
}

impl From<crate::auth::IdentityError> for ApiError {
    fn from(err: crate::auth::IdentityError) -> Self {
        use crate::auth::IdentityError;
        match err {
            IdentityError::Rejected(msg) => {
                tracing::warn!("Identity token rejected: {}", msg);
                ApiError::unauthorized("Identity token is invalid or expired")
            }
            IdentityError::KeysUnavailable(msg) => {
                tracing::error!("Identity keys unavailable: {}", msg);
                ApiError::service_unavailable("Sign-in is temporarily unavailable")
            }
        }
    }
}

impl From<crate::auth::SessionError> for ApiError {
    fn from(err: crate::auth::SessionError) -> Self {
        use crate::auth::SessionError;
        match err {
            SessionError::Expired => ApiError::unauthorized("Session expired"),
            SessionError::Invalid(_) => ApiError::unauthorized("Invalid session"),
            SessionError::InvalidSecret | SessionError::TokenGeneration(_) => {
                tracing::error!("Session signing failed: {}", err);
                ApiError::internal_server_error("Could not create session")
            }
        }
    }
}

impl From<crate::storage::StorageError> for ApiError {
    fn from(err: crate::storage::StorageError) -> Self {
        use crate::storage::StorageError;
        match err {
            StorageError::NotFound(path) => ApiError::not_found(format!("Object '{}' not found", path)),
            StorageError::InvalidPath(msg) => ApiError::bad_request(msg),
            StorageError::Auth(e) => {
                tracing::error!("Storage credentials error: {}", e);
                ApiError::service_unavailable("Storage is temporarily unavailable")
            }
            StorageError::Upstream(msg) => {
                tracing::error!("Storage upstream error: {}", msg);
                ApiError::bad_gateway("Storage request failed")
            }
        }
    }
}

impl From<crate::lineage::LineageError> for ApiError {
    fn from(err: crate::lineage::LineageError) -> Self {
        use crate::lineage::LineageError;
        match err {
            LineageError::InvalidRelation(msg) => ApiError::bad_request(msg),
            LineageError::Database(e) => e.into(),
        }
    }
}

impl From<crate::images::ImageError> for ApiError {
    fn from(err: crate::images::ImageError) -> Self {
        use crate::images::ImageError;
        match err {
            ImageError::UnsupportedFormat(msg) => ApiError::unsupported_media_type(msg),
            ImageError::InvalidOptions(msg) => ApiError::bad_request(msg),
            ImageError::Decode(msg) => ApiError::unsupported_media_type(format!("Could not decode image: {}", msg)),
            ImageError::Encode(msg) => {
                tracing::error!("Image encode error: {}", msg);
                ApiError::internal_server_error("Image processing failed")
            }
        }
    }
}

impl From<crate::n8n::N8nError> for ApiError {
    fn from(err: crate::n8n::N8nError) -> Self {
        tracing::error!("n8n relay error: {}", err);
        match err {
            crate::n8n::N8nError::Timeout => ApiError::bad_gateway("Image transformation timed out"),
            _ => ApiError::bad_gateway("Image transformation failed"),
        }
    }
}

impl From<crate::billing::BillingError> for ApiError {
    fn from(err: crate::billing::BillingError) -> Self {
        use crate::billing::BillingError;
        match err {
            BillingError::InvalidQuery(msg) => ApiError::bad_request(msg),
            BillingError::InvalidTable(_) => {
                tracing::error!("Billing misconfigured: {}", err);
                ApiError::service_unavailable("Billing export is not configured")
            }
            BillingError::Auth(e) => {
                tracing::error!("Billing credentials error: {}", e);
                ApiError::service_unavailable("Billing is temporarily unavailable")
            }
            BillingError::Upstream(_) | BillingError::Incomplete | BillingError::Malformed(_) => {
                tracing::error!("BigQuery error: {}", err);
                ApiError::bad_gateway("Billing query failed")
            }
        }
    }
}

impl From<crate::github::GithubError> for ApiError {
    fn from(err: crate::github::GithubError) -> Self {
        use crate::github::GithubError;
        match err {
            GithubError::NotConfigured => ApiError::service_unavailable("GitHub activity is not configured"),
            GithubError::NotFound(user) => ApiError::not_found(format!("GitHub user '{}' not found", user)),
            GithubError::RateLimited => ApiError::service_unavailable("GitHub rate limit reached"),
            GithubError::Upstream(msg) => {
                tracing::error!("GitHub error: {}", msg);
                ApiError::bad_gateway("GitHub request failed")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
