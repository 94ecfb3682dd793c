use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handlers::protected::blocking;
use crate::images::{self, paths};
use crate::lineage::{RelationKind, Stage};
use crate::middleware::{ApiResponse, ApiResult, SessionUser};
use crate::state::AppState;
use crate::storage::StoredObject;

#[derive(Debug, Deserialize)]
pub struct TransformRequest {
    pub path: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResult {
    pub source: String,
    pub compatible: StoredObject,
    pub generated: StoredObject,
}

/// POST /api/n8n/transform - Run a stored image through the n8n workflow
///
/// The source is first converted to the PNG the workflow expects
/// (`n8n-compatible/`), then the workflow's output is stored under
/// `n8n-generated/`. Both hops are recorded as lineage relations.
///
/// Expected Input:
/// ```json
/// { "path": "gallery/3f2a-cat.jpg", "params": { "style": "watercolor" } }
/// ```
pub async fn transform(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<TransformRequest>,
) -> ApiResult<TransformResult> {
    let n8n = state
        .n8n
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("n8n webhook is not configured"))?;
    let params = if request.params.is_null() { json!({}) } else { request.params };

    let compatible_path = paths::n8n_compatible_path(&request.path);
    if Stage::of_path(&request.path) == Stage::N8nCompatible || compatible_path == request.path {
        return Err(ApiError::bad_request(format!(
            "'{}' is already an n8n input, transform its source instead",
            request.path
        )));
    }

    let source = state.storage.get(&request.path).await?;
    let max_dimension = state.config.images.n8n_max_dimension;
    let converted = blocking(move || images::to_n8n_compatible(&source.bytes, max_dimension)).await?;

    let (width, height) = (converted.width, converted.height);
    let compatible = state
        .storage
        .put(&compatible_path, converted.bytes.clone(), converted.content_type())
        .await?;
    state
        .lineage
        .record(
            &request.path,
            &compatible_path,
            RelationKind::N8nConversion,
            json!({ "width": width, "height": height, "maxDimension": max_dimension }),
        )
        .await?;

    let file_name = compatible_path.rsplit('/').next().unwrap_or(&compatible_path);
    let generated = n8n
        .transform(&converted.bytes, file_name, converted.content_type(), &params)
        .await?;

    let content_type = match images::sniff_content_type(&generated.bytes) {
        Some(sniffed) => sniffed.to_string(),
        None if generated.content_type.starts_with("image/") => generated.content_type.clone(),
        None => return Err(ApiError::bad_gateway("n8n returned something that is not an image")),
    };

    let generated_path = paths::n8n_generated_path(
        &compatible_path,
        paths::extension_for_content_type(&content_type),
    );
    let size = generated.bytes.len();
    let generated = state
        .storage
        .put(&generated_path, generated.bytes, &content_type)
        .await?;
    state
        .lineage
        .record(
            &compatible_path,
            &generated_path,
            RelationKind::N8nGeneration,
            json!({ "params": params, "bytes": size, "requestedBy": user.uid }),
        )
        .await?;

    tracing::info!("n8n produced {} from {}", generated_path, request.path);

    Ok(ApiResponse::created(TransformResult {
        source: request.path,
        compatible,
        generated,
    }))
}
