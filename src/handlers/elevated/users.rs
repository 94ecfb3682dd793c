use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::auth::Role;
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, SessionUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct DisabledRequest {
    pub disabled: bool,
}

/// GET /api/admin/users - Every dashboard user, oldest first
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    let users = state.users.list().await?;
    Ok(ApiResponse::success(users))
}

/// PUT /api/admin/users/:uid/role - Change a user's role
///
/// Expected Input:
/// ```json
/// { "role": "editor" }
/// ```
/// Admins cannot lower their own role.
pub async fn set_role(
    State(state): State<AppState>,
    Extension(admin): Extension<SessionUser>,
    Path(uid): Path<String>,
    Json(request): Json<RoleRequest>,
) -> ApiResult<User> {
    if uid == admin.uid && !request.role.satisfies(admin.role) {
        return Err(ApiError::conflict("You cannot lower your own role"));
    }

    let user = state
        .users
        .set_role(&uid, request.role)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User '{}' not found", uid)))?;

    tracing::info!("{} set role of {} to {}", admin.uid, uid, request.role);
    Ok(ApiResponse::success(user))
}

/// PUT /api/admin/users/:uid/disabled - Disable or re-enable a user
///
/// Takes effect on the user's next request; the gate re-reads the row.
pub async fn set_disabled(
    State(state): State<AppState>,
    Extension(admin): Extension<SessionUser>,
    Path(uid): Path<String>,
    Json(request): Json<DisabledRequest>,
) -> ApiResult<User> {
    if uid == admin.uid && request.disabled {
        return Err(ApiError::conflict("You cannot disable your own account"));
    }

    let user = state
        .users
        .set_disabled(&uid, request.disabled)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User '{}' not found", uid)))?;

    tracing::info!(
        "{} {} {}",
        admin.uid,
        if request.disabled { "disabled" } else { "enabled" },
        uid
    );
    Ok(ApiResponse::success(user))
}
