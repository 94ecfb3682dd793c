// handlers/protected/mod.rs - Handlers behind the role gate
//
// Every route here matches a gate rule, so a `SessionUser` is always present
// in request extensions by the time a handler runs.

pub mod auth;
pub mod billing;
pub mod dashboard;
pub mod images;
pub mod lineage;
pub mod n8n;

use crate::error::ApiError;

/// Run CPU-bound image work off the async executor
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, crate::images::ImageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| {
            tracing::error!("Image task failed: {}", e);
            ApiError::internal_server_error("Image processing failed")
        })?
        .map_err(ApiError::from)
}
