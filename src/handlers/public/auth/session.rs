use axum::{
    extract::State,
    http::header,
    response::{AppendHeaders, IntoResponse},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::database::models::{NewUser, User};
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub id_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

/// POST /api/auth/session - Exchange a Firebase ID token for a session cookie
///
/// Expected Input:
/// ```json
/// { "idToken": "eyJhbGciOiJSUzI1NiIs..." }
/// ```
///
/// Expected Output (Success), with `Set-Cookie: __session=...`:
/// ```json
/// {
///   "success": true,
///   "data": {
///     "user": { "uid": "...", "email": "...", "role": "viewer", ... },
///     "expiresAt": "2024-03-22T10:00:00Z"
///   }
/// }
/// ```
pub async fn session_create(
    State(state): State<AppState>,
    Json(payload): Json<SessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.id_token.trim().is_empty() {
        return Err(ApiError::bad_request("idToken is required"));
    }

    let identity = state.identity.verify_id_token(payload.id_token.trim()).await?;

    let bootstrap_admin = identity.email_verified
        && identity
            .email
            .as_deref()
            .map(|email| state.config.is_admin_email(email))
            .unwrap_or(false);
    let initial_role = if bootstrap_admin {
        Role::Admin
    } else {
        state.config.session.default_role
    };

    let user = state
        .users
        .upsert_login(&NewUser {
            uid: identity.uid,
            email: identity.email,
            display_name: identity.name,
            role: initial_role,
        })
        .await?;

    if user.disabled {
        tracing::warn!("Sign in refused for disabled account {}", user.uid);
        return Err(ApiError::forbidden("Account is disabled"));
    }

    let session = state.sessions.issue(&user.uid, user.email.as_deref(), user.role)?;
    tracing::info!("Session started for {} as {}", user.uid, user.role);

    Ok((
        AppendHeaders([(header::SET_COOKIE, state.sessions.cookie(&session))]),
        ApiResponse::success(SessionResponse {
            user,
            expires_at: session.expires_at,
        }),
    ))
}

/// DELETE /api/auth/session - Clear the session cookie
pub async fn session_delete(State(state): State<AppState>) -> impl IntoResponse {
    (
        AppendHeaders([(header::SET_COOKIE, state.sessions.clear_cookie())]),
        ApiResponse::success(serde_json::json!({ "signedOut": true })),
    )
}
