use axum::{extract::State, Extension};
use serde::Serialize;

use crate::auth::Role;
use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, SessionUser, RULES};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoAmI {
    #[serde(flatten)]
    pub session: SessionUser,
    pub profile: Option<User>,
    /// Gated prefixes this caller may enter
    pub allowed: Vec<&'static str>,
}

pub fn allowed_prefixes(role: Role) -> Vec<&'static str> {
    RULES
        .iter()
        .filter(|rule| role.satisfies(rule.role))
        .map(|rule| rule.prefix)
        .collect()
}

/// GET /api/auth/whoami - Current caller with fresh profile data
///
/// Expected Output:
/// ```json
/// {
///   "success": true,
///   "data": {
///     "uid": "f1r3b4s3uid",
///     "email": "me@example.com",
///     "role": "editor",
///     "profile": { "displayName": "Me", "lastLoginAt": "...", ... },
///     "allowed": ["/dashboard", "/dashboard/images", "/api/images", ...]
///   }
/// }
/// ```
pub async fn whoami(
    State(state): State<AppState>,
    Extension(session): Extension<SessionUser>,
) -> ApiResult<WhoAmI> {
    let profile = state.users.find(&session.uid).await?;
    Ok(ApiResponse::success(WhoAmI {
        allowed: allowed_prefixes(session.role),
        session,
        profile,
    }))
}
