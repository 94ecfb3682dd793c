use axum::extract::{Query, State};
use serde::Deserialize;

use crate::lineage::Stage;
use crate::middleware::{ApiResponse, ApiResult};
use crate::storage::StoredObject;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// `gallery`, `n8n-compatible`, ... ; every stage when absent
    pub stage: Option<Stage>,
}

/// GET /api/images?stage= - Objects in one pipeline stage, or all of them
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<StoredObject>> {
    let objects = match query.stage {
        Some(stage) => state.storage.list(stage.prefix()).await?,
        None => state.storage.list("").await?,
    };
    Ok(ApiResponse::success(objects))
}
