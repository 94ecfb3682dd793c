use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /files/*path - Stream a stored object.
///
/// Public URLs of the in-process store point here; with a bucket configured
/// the same objects are also reachable through their download URLs.
pub async fn file_get(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let object = state.storage.get(&path).await?;
    let content_type = object
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=300".to_string()),
        ],
        object.bytes,
    ))
}
