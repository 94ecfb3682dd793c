use axum::extract::{Path, State};

use crate::lineage::Lineage;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /api/lineage/*path - Chain from the root object to `path`, plus direct derivatives
///
/// Expected Output:
/// ```json
/// {
///   "success": true,
///   "data": {
///     "path": "optimized/gallery-3f2a-cat-800w.webp",
///     "chain": [
///       { "path": "gallery/3f2a-cat.png", "stage": "gallery", "url": "...", "relation": null },
///       { "path": "optimized/gallery-3f2a-cat-800w.webp", "stage": "optimized", "relation": "optimization", ... }
///     ],
///     "children": [],
///     "truncated": false
///   }
/// }
/// ```
pub async fn lineage_get(State(state): State<AppState>, Path(path): Path<String>) -> ApiResult<Lineage> {
    let lineage = state.lineage.chain(&path).await?;
    Ok(ApiResponse::success(lineage))
}
