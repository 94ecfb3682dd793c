use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::gate::{self, GateDecision};
use crate::auth::Role;
use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated caller, inserted into request extensions by [`role_gate`]
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub uid: String,
    pub email: Option<String>,
    pub role: Role,
}

/// Resolve the caller behind the session cookie or Bearer header.
///
/// `Ok(None)` means no usable session. A valid token whose user row is gone
/// or disabled is an error, and the stored role replaces the token's role.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Option<SessionUser>, ApiError> {
    let Some(token) = state.sessions.extract_token(headers) else {
        return Ok(None);
    };

    let claims = match state.sessions.verify(&token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!("Ignoring session token: {}", e);
            return Ok(None);
        }
    };

    let user = state
        .users
        .find(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::forbidden("Account no longer exists"))?;

    if user.disabled {
        tracing::warn!("Disabled account {} presented a session", user.uid);
        return Err(ApiError::forbidden("Account is disabled"));
    }

    if user.role != claims.role {
        tracing::debug!("Session for {} carries {}, database has {}", user.uid, claims.role, user.role);
    }

    Ok(Some(SessionUser {
        uid: user.uid,
        email: user.email,
        role: user.role,
    }))
}

/// Enforces the gate table on every request. Public paths pass untouched.
pub async fn role_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if gate::required_role(&path).is_none() {
        return next.run(request).await;
    }

    let user = match authenticate(&state, request.headers()).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    let decision = gate::decide(&path, user.as_ref().map(|u| u.role));
    tracing::debug!("Gate {} for {}", decision, path);

    match (decision, user) {
        (GateDecision::Allow, Some(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        (GateDecision::Forbidden { required, actual }, Some(user)) => {
            tracing::warn!("{} ({}) denied {}: requires {}", user.uid, actual, path, required);
            ApiError::forbidden(format!("Requires {} role", required)).into_response()
        }
        _ => unauthenticated(&path, request.uri().query()),
    }
}

fn unauthenticated(path: &str, query: Option<&str>) -> Response {
    if gate::is_api_path(path) {
        return ApiError::unauthorized("Sign in required").into_response();
    }

    let target = match query {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    let next: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    (StatusCode::SEE_OTHER, [(header::LOCATION, format!("/login?next={}", next))]).into_response()
}
