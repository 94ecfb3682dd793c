use axum::{http::Uri, Extension};
use serde::Serialize;

use crate::auth::Role;
use crate::middleware::{required_role, ApiResponse, ApiResult, SessionUser};

/// What the view layer needs to render a dashboard page
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDescriptor {
    pub page: String,
    pub required_role: Option<Role>,
    pub user: SessionUser,
    /// Dashboard sections the caller may navigate to
    pub sections: Vec<&'static str>,
}

const SECTIONS: &[&str] = &["/dashboard", "/dashboard/lineage", "/dashboard/images", "/dashboard/billing"];

/// GET /dashboard[/*page]
pub async fn page(uri: Uri, Extension(user): Extension<SessionUser>) -> ApiResult<PageDescriptor> {
    let path = uri.path();
    let sections = SECTIONS
        .iter()
        .copied()
        .filter(|section| required_role(section).map(|role| user.role.satisfies(role)).unwrap_or(true))
        .collect();

    Ok(ApiResponse::success(PageDescriptor {
        page: path.trim_start_matches('/').trim_end_matches('/').to_string(),
        required_role: required_role(path),
        sections,
        user,
    }))
}
