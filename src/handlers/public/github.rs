use axum::extract::State;

use crate::github::Activity;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /api/github/activity - Landing page widgets (cached upstream summary)
pub async fn github_activity(State(state): State<AppState>) -> ApiResult<Activity> {
    let activity = state.github.activity().await?;
    Ok(ApiResponse::success(activity))
}
