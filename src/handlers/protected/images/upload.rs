use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Extension,
};
use serde::Serialize;
use serde_json::json;

use crate::error::ApiError;
use crate::images::{paths, sniff_content_type};
use crate::lineage::RelationKind;
use crate::middleware::{ApiResponse, ApiResult, SessionUser};
use crate::state::AppState;
use crate::storage::{validate_path, StoredObject};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub object: StoredObject,
    /// Source the upload was recorded against, when one was named
    pub original: Option<String>,
}

struct UploadForm {
    file_name: String,
    bytes: Vec<u8>,
    original: Option<String>,
}

fn multipart_error(context: &str, err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Upload exceeds the configured size limit")
    } else {
        ApiError::bad_request(format!("{}: {}", context, err.body_text()))
    }
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut original = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Malformed multipart body", e))?
    {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or("image").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error("Could not read file", e))?;
                file = Some((name, bytes.to_vec()));
            }
            Some("original") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error("Could not read original", e))?;
                let text = text.trim().to_string();
                if !text.is_empty() {
                    original = Some(text);
                }
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or_else(|| ApiError::bad_request("Missing 'file' field"))?;
    if bytes.is_empty() {
        return Err(ApiError::bad_request("Uploaded file is empty"));
    }

    Ok(UploadForm {
        file_name,
        bytes,
        original,
    })
}

/// POST /api/images - Multipart upload into the gallery
///
/// Fields:
/// - `file` (required): JPEG, PNG or WebP data
/// - `original` (optional): storage path the file was produced from;
///   recorded as an `upload` relation
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    multipart: Multipart,
) -> ApiResult<UploadResult> {
    let form = read_form(multipart).await?;

    let content_type = sniff_content_type(&form.bytes)
        .ok_or_else(|| ApiError::unsupported_media_type("Only JPEG, PNG and WebP uploads are accepted"))?;

    if let Some(original) = form.original.as_deref() {
        validate_path(original)?;
    }

    let path = paths::gallery_path(&form.file_name);
    let size = form.bytes.len();
    let object = state.storage.put(&path, form.bytes, content_type).await?;
    tracing::info!("{} uploaded {} ({} bytes)", user.uid, path, size);

    if let Some(original) = form.original.as_deref() {
        state
            .lineage
            .record(
                original,
                &path,
                RelationKind::Upload,
                json!({ "fileName": form.file_name, "bytes": size, "uploadedBy": user.uid }),
            )
            .await?;
    }

    Ok(ApiResponse::created(UploadResult {
        object,
        original: form.original,
    }))
}
