use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::handlers::protected::blocking;
use crate::images::{self, paths, OptimizeOptions, OutputFormat};
use crate::lineage::RelationKind;
use crate::middleware::{ApiResponse, ApiResult, SessionUser};
use crate::state::AppState;
use crate::storage::StoredObject;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRequest {
    pub path: String,
    pub format: Option<OutputFormat>,
    pub quality: Option<u8>,
    pub max_width: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeResult {
    pub source: String,
    pub object: StoredObject,
    pub width: u32,
    pub height: u32,
    pub original_bytes: usize,
    pub bytes: usize,
    pub ratio: f64,
    pub sha256: String,
}

/// POST /api/images/optimize - Re-encode a stored image into `optimized/`
///
/// Expected Input:
/// ```json
/// { "path": "gallery/3f2a-cat.png", "format": "webp", "quality": 80, "maxWidth": 1280 }
/// ```
/// `format`, `quality` and `maxWidth` fall back to the configured defaults.
pub async fn optimize(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<OptimizeRequest>,
) -> ApiResult<OptimizeResult> {
    let defaults = &state.config.images;
    let options = OptimizeOptions {
        format: request.format.unwrap_or(OutputFormat::Webp),
        quality: request.quality.unwrap_or(defaults.default_quality),
        max_width: Some(request.max_width.unwrap_or(defaults.max_width)),
    };

    let source = state.storage.get(&request.path).await?;
    let processed = blocking(move || images::optimize(&source.bytes, &options)).await?;

    let target = paths::optimized_path(&request.path, processed.format, processed.width);
    if target == request.path {
        return Err(ApiError::bad_request(format!("'{}' would overwrite itself", request.path)));
    }
    let sha256 = processed.sha256();
    let ratio = processed.ratio();
    let (width, height, original_bytes, bytes) = (
        processed.width,
        processed.height,
        processed.original_bytes,
        processed.bytes.len(),
    );

    let object = state
        .storage
        .put(&target, processed.bytes, processed.format.content_type())
        .await?;

    state
        .lineage
        .record(
            &request.path,
            &target,
            RelationKind::Optimization,
            json!({
                "format": processed.format,
                "quality": processed.format.is_lossy().then_some(options.quality),
                "width": width,
                "height": height,
                "originalWidth": processed.original_width,
                "originalHeight": processed.original_height,
                "originalBytes": original_bytes,
                "bytes": bytes,
                "sha256": sha256,
                "requestedBy": user.uid,
            }),
        )
        .await?;

    tracing::info!(
        "Optimized {} -> {} ({} -> {} bytes)",
        request.path,
        target,
        original_bytes,
        bytes
    );

    Ok(ApiResponse::created(OptimizeResult {
        source: request.path,
        object,
        width,
        height,
        original_bytes,
        bytes,
        ratio,
        sha256,
    }))
}
