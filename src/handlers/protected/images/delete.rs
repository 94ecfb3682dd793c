use axum::{
    extract::{Path, State},
    Extension,
};
use serde::Serialize;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, SessionUser};
use crate::state::AppState;
use crate::storage::StorageError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub path: String,
    pub relations_removed: u64,
}

/// DELETE /api/images/*path - Remove an object and every relation it takes part in
///
/// Relations are removed even when the object is already gone from storage.
/// Only a path with neither an object nor relations is a 404.
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(path): Path<String>,
) -> ApiResult<DeleteResult> {
    let object_existed = match state.storage.delete(&path).await {
        Ok(()) => true,
        Err(StorageError::NotFound(_)) => false,
        Err(e) => return Err(e.into()),
    };
    let relations_removed = state.lineage.forget(&path).await?;

    if !object_existed {
        if relations_removed == 0 {
            return Err(ApiError::not_found(format!("Object '{}' not found", path)));
        }
        tracing::warn!("{} was already gone from storage, removed {} stale relations", path, relations_removed);
    }
    tracing::info!("{} deleted {}", user.uid, path);

    Ok(ApiResponse::success(DeleteResult {
        path,
        relations_removed,
    }))
}
