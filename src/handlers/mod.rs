// handlers/mod.rs - three access tiers
//
// Public (no session) → Protected (session, role per gate rule) → Elevated (admin).
// The tiers are an organisation of the code; access itself is decided by
// the role gate in front of the router, keyed on path prefix.
pub mod elevated;
pub mod protected;
pub mod public;

#[cfg(test)]
mod tests;

use axum::{extract::DefaultBodyLimit, middleware, Router};
use axum::http::{header, HeaderValue, Method};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::middleware::role_gate;
use crate::state::AppState;

/// The complete HTTP surface
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.server.max_upload_bytes;
    let cors = cors_layer(&state.config);

    let app = Router::new()
        .merge(public_routes())
        .merge(auth_routes())
        .merge(image_routes())
        .merge(lineage_routes())
        .merge(n8n_routes())
        .merge(billing_routes())
        .merge(admin_routes())
        .merge(dashboard_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(state.clone(), role_gate))
        .layer(cors);

    let app = if state.config.server.enable_request_logging {
        app.layer(TraceLayer::new_for_http())
    } else {
        app
    };

    app.with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

fn public_routes() -> Router<AppState> {
    use axum::routing::{get, post};

    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/login", get(public::login_page))
        .route("/files/*path", get(public::file_get))
        .route("/api/github/activity", get(public::github_activity))
        .route(
            "/api/auth/session",
            post(public::auth::session_create).delete(public::auth::session_delete),
        )
}

fn auth_routes() -> Router<AppState> {
    use axum::routing::get;

    Router::new().route("/api/auth/whoami", get(protected::auth::whoami))
}

fn image_routes() -> Router<AppState> {
    use axum::routing::{delete, get, post};
    use protected::images;

    Router::new()
        .route("/api/images", get(images::list).post(images::upload))
        .route("/api/images/optimize", post(images::optimize))
        .route("/api/images/*path", delete(images::delete))
}

fn lineage_routes() -> Router<AppState> {
    use axum::routing::get;

    Router::new().route("/api/lineage/*path", get(protected::lineage::lineage_get))
}

fn n8n_routes() -> Router<AppState> {
    use axum::routing::post;

    Router::new().route("/api/n8n/transform", post(protected::n8n::transform))
}

fn billing_routes() -> Router<AppState> {
    use axum::routing::get;

    Router::new().route("/api/billing/usage", get(protected::billing::usage))
}

fn admin_routes() -> Router<AppState> {
    use axum::routing::{get, put};
    use elevated::users;

    Router::new()
        .route("/api/admin/users", get(users::list))
        .route("/api/admin/users/:uid/role", put(users::set_role))
        .route("/api/admin/users/:uid/disabled", put(users::set_disabled))
}

fn dashboard_routes() -> Router<AppState> {
    use axum::routing::get;

    Router::new()
        .route("/dashboard", get(protected::dashboard::page))
        .route("/dashboard/*page", get(protected::dashboard::page))
}
