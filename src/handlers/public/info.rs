use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

const DEFAULT_AFTER_LOGIN: &str = "/dashboard";

pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "portfolio-ops",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Portfolio backend and operations dashboard API",
            "endpoints": {
                "health": "/health (public)",
                "github": "/api/github/activity (public)",
                "session": "/api/auth/session (public - POST signs in, DELETE signs out)",
                "whoami": "/api/auth/whoami (viewer)",
                "lineage": "/api/lineage/*path (viewer)",
                "images": "/api/images[/optimize|/*path] (editor)",
                "n8n": "/api/n8n/transform (editor)",
                "billing": "/api/billing/usage (admin)",
                "admin": "/api/admin/users (admin)",
                "dashboard": "/dashboard[/*page] (viewer and up)",
            }
        }
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    let Some(database) = state.database.as_ref() else {
        return (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "not configured" }
            })),
        );
    };

    match database.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "ok" }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": { "status": "degraded", "timestamp": now }
                })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

/// Only same-site absolute paths are followed after sign in
fn safe_next(next: Option<&str>) -> &str {
    match next {
        // Browsers drop tabs and newlines inside URLs, so "/\t/host" would become "//host"
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(|c| c.is_control()) =>
        {
            path
        }
        _ => DEFAULT_AFTER_LOGIN,
    }
}

/// GET /login - Page descriptor for the sign-in view
pub async fn login_page(Query(query): Query<LoginQuery>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "page": "login",
            "next": safe_next(query.next.as_deref()),
            "session": "/api/auth/session",
        }
    }))
}
