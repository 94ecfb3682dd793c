use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};

use crate::auth::Role;
use crate::config::AppConfig;
use crate::database::UserStore;
use crate::images::tests::sample_png;
use crate::images::{self, paths, OptimizeOptions, OutputFormat};
use crate::lineage::RelationKind;
use crate::storage::ObjectStore;
use crate::testing::{body_json, spawn_webhook, StaticIdentityVerifier, TestApp};

const BOUNDARY: &str = "portfolio-ops-test-boundary";

fn multipart_upload(file_name: &str, bytes: &[u8], original: Option<&str>) -> Body {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            b = BOUNDARY,
            f = file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");
    if let Some(original) = original {
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"original\"\r\n\r\n{o}\r\n",
                b = BOUNDARY,
                o = original
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    Body::from(body)
}

async fn upload(app: &TestApp, cookie: &str, original: Option<&str>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/images")
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(multipart_upload("Cat Photo.png", &sample_png(16, 8), original))
        .unwrap();
    let response = app.send(request).await;
    let status = response.status();
    (status, body_json(response).await)
}

fn chain_stages(body: &Value) -> Vec<String> {
    body["data"]["chain"]
        .as_array()
        .unwrap()
        .iter()
        .map(|node| node["stage"].as_str().unwrap().to_string())
        .collect()
}

async fn optimize_png(app: &TestApp, cookie: &str, path: &str) -> (StatusCode, Value) {
    app.json(
        Method::POST,
        "/api/images/optimize",
        Some(cookie),
        Some(json!({ "path": path, "format": "png", "maxWidth": 8 })),
    )
    .await
}

#[tokio::test]
async fn public_routes_need_no_session() {
    let app = TestApp::new();
    let (status, body) = app.json(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "portfolio-ops");

    let (status, body) = app.json(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["database"], "not configured");
}

#[tokio::test]
async fn anonymous_api_call_is_401() {
    let app = TestApp::new();
    let (status, body) = app.json(Method::GET, "/api/images", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn anonymous_page_redirects_to_login() {
    let app = TestApp::new();
    let request = Request::builder().uri("/dashboard/images").body(Body::empty()).unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login?next=%2Fdashboard%2Fimages");
}

#[tokio::test]
async fn garbage_session_counts_as_anonymous() {
    let app = TestApp::new();
    let (status, _) = app
        .json(Method::GET, "/api/auth/whoami", Some("__session=not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn viewer_is_forbidden_from_editor_routes() {
    let app = TestApp::new();
    let cookie = app.sign_in("viewer-1", Role::Viewer).await;

    let (status, body) = app.json(Method::GET, "/api/images", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Requires editor role");

    let (status, body) = app.json(Method::GET, "/api/auth/whoami", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["uid"], "viewer-1");
    assert_eq!(body["data"]["role"], "viewer");
    assert_eq!(body["data"]["profile"]["email"], "viewer-1@example.com");
}

#[tokio::test]
async fn database_role_overrides_token_role() {
    let app = TestApp::new();
    let cookie = app.sign_in("demoted", Role::Admin).await;
    app.users.set_role("demoted", Role::Viewer).await.unwrap();

    let (status, _) = app.json(Method::GET, "/api/admin/users", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.json(Method::GET, "/dashboard", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["role"], "viewer");
    assert_eq!(body["data"]["sections"], json!(["/dashboard", "/dashboard/lineage"]));
}

#[tokio::test]
async fn disabled_or_missing_user_is_forbidden() {
    let app = TestApp::new();
    let cookie = app.sign_in("gone", Role::Editor).await;
    app.users.set_disabled("gone", true).await.unwrap();

    let (status, body) = app.json(Method::GET, "/api/lineage/gallery/a.png", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Account is disabled");

    let stray = {
        let session = app.state.sessions.issue("never-signed-in", None, Role::Admin).unwrap();
        format!("__session={}", session.token)
    };
    let (status, _) = app.json(Method::GET, "/api/lineage/gallery/a.png", Some(&stray), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn upload_optimize_lineage_and_delete() {
    let app = TestApp::new();
    let cookie = app.sign_in("editor-1", Role::Editor).await;

    let (status, body) = upload(&app, &cookie, Some("uploads/cat.heic")).await;
    assert_eq!(status, StatusCode::CREATED);
    let gallery = body["data"]["object"]["path"].as_str().unwrap().to_string();
    assert!(gallery.starts_with("gallery/"));
    assert!(gallery.ends_with("-cat-photo.png"));
    assert_eq!(body["data"]["object"]["stage"], "gallery");

    let (status, body) = app
        .json(
            Method::POST,
            "/api/images/optimize",
            Some(&cookie),
            Some(json!({ "path": gallery, "format": "png", "maxWidth": 8 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["width"], 8);
    assert_eq!(body["data"]["height"], 4);
    let optimized = body["data"]["object"]["path"].as_str().unwrap().to_string();
    assert!(optimized.starts_with("optimized/"));
    assert!(optimized.ends_with("-8w.png"));

    let (status, body) = app
        .json(Method::GET, &format!("/api/lineage/{}", optimized), Some(&cookie), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chain_stages(&body), vec!["original", "gallery", "optimized"]);
    assert_eq!(body["data"]["chain"][2]["relation"], "optimization");
    assert_eq!(body["data"]["truncated"], false);

    let (status, body) = app
        .json(Method::GET, "/api/images?stage=optimized", Some(&cookie), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .json(Method::DELETE, &format!("/api/images/{}", gallery), Some(&cookie), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["relationsRemoved"], 2);
    assert_eq!(app.lineage_store.len().await, 0);

    let (_, body) = app
        .json(Method::GET, &format!("/api/lineage/{}", optimized), Some(&cookie), None)
        .await;
    assert_eq!(body["data"]["chain"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn uploaded_files_are_served_publicly() {
    let app = TestApp::new();
    let cookie = app.sign_in("editor-2", Role::Editor).await;
    let (_, body) = upload(&app, &cookie, None).await;
    let url = body["data"]["object"]["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/files/gallery/"));

    let response = app.send(Request::builder().uri(url).body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
}

#[tokio::test]
async fn non_image_upload_is_rejected() {
    let app = TestApp::new();
    let cookie = app.sign_in("editor-3", Role::Editor).await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/images")
        .header(header::COOKIE, &cookie)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(multipart_upload("notes.txt", b"plain text, not pixels", None))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn unconfigured_integrations_report_unavailable() {
    let app = TestApp::new();
    let cookie = app.sign_in("admin-1", Role::Admin).await;

    let (status, _) = app
        .json(Method::POST, "/api/n8n/transform", Some(&cookie), Some(json!({ "path": "gallery/a.png" })))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = app.json(Method::GET, "/api/billing/usage", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn admin_manages_roles_but_not_their_own() {
    let app = TestApp::new();
    let admin = app.sign_in("admin-1", Role::Admin).await;
    let viewer = app.sign_in("viewer-1", Role::Viewer).await;

    let (status, body) = app
        .json(Method::PUT, "/api/admin/users/viewer-1/role", Some(&admin), Some(json!({ "role": "editor" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "editor");

    // Promotion applies to the existing session immediately
    let (status, _) = app.json(Method::GET, "/api/images", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json(Method::PUT, "/api/admin/users/admin-1/role", Some(&admin), Some(json!({ "role": "viewer" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .json(Method::PUT, "/api/admin/users/admin-1/disabled", Some(&admin), Some(json!({ "disabled": true })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .json(Method::PUT, "/api/admin/users/nobody/role", Some(&admin), Some(json!({ "role": "editor" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.json(Method::GET, "/api/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn sign_in_sets_cookie_and_bootstraps_admins() {
    let mut config = AppConfig::development();
    config.session.admin_emails = vec!["Owner@Example.com".to_string()];
    let identity = StaticIdentityVerifier::default()
        .with("owner-token", "owner", "owner@example.com")
        .with("guest-token", "guest", "guest@example.com");
    let app = TestApp::with_config(config, identity);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/session")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "idToken": "owner-token" }).to_string()))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("__session="));
    assert!(set_cookie.contains("HttpOnly"));
    let body = body_json(response).await;
    assert_eq!(body["data"]["user"]["role"], "admin");

    let cookie = set_cookie.split(';').next().unwrap().to_string();
    let (status, _) = app.json(Method::GET, "/api/admin/users", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .json(Method::POST, "/api/auth/session", None, Some(json!({ "idToken": "guest-token" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["role"], "viewer");

    let (status, _) = app
        .json(Method::POST, "/api/auth/session", None, Some(json!({ "idToken": "forged" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sign_out_clears_cookie() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/auth/session")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn optimizing_copies_at_different_stages_keeps_both() {
    let app = TestApp::new();
    let cookie = app.sign_in("editor-4", Role::Editor).await;
    let (_, body) = upload(&app, &cookie, None).await;
    let gallery = body["data"]["object"]["path"].as_str().unwrap().to_string();

    // An n8n input shares the gallery file's stem
    let compatible = paths::n8n_compatible_path(&gallery);
    app.storage.put(&compatible, sample_png(16, 8), "image/png").await.unwrap();
    app.state
        .lineage
        .record(&gallery, &compatible, RelationKind::N8nConversion, json!({}))
        .await
        .unwrap();

    let (status, body) = optimize_png(&app, &cookie, &gallery).await;
    assert_eq!(status, StatusCode::CREATED);
    let from_gallery = body["data"]["object"]["path"].as_str().unwrap().to_string();

    let (status, body) = optimize_png(&app, &cookie, &compatible).await;
    assert_eq!(status, StatusCode::CREATED);
    let from_compatible = body["data"]["object"]["path"].as_str().unwrap().to_string();

    assert_ne!(from_gallery, from_compatible);
    let (_, body) = app
        .json(Method::GET, "/api/images?stage=optimized", Some(&cookie), None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = app
        .json(Method::GET, &format!("/api/lineage/{}", from_gallery), Some(&cookie), None)
        .await;
    assert_eq!(chain_stages(&body), vec!["gallery", "optimized"]);

    let (_, body) = app
        .json(Method::GET, &format!("/api/lineage/{}", from_compatible), Some(&cookie), None)
        .await;
    assert_eq!(chain_stages(&body), vec!["gallery", "n8n-compatible", "optimized"]);
}

#[tokio::test]
async fn png_output_does_not_claim_a_quality() {
    let app = TestApp::new();
    let cookie = app.sign_in("editor-5", Role::Editor).await;
    let (_, body) = upload(&app, &cookie, None).await;
    let gallery = body["data"]["object"]["path"].as_str().unwrap().to_string();

    let (_, body) = optimize_png(&app, &cookie, &gallery).await;
    let optimized = body["data"]["object"]["path"].as_str().unwrap().to_string();
    let (_, body) = app
        .json(Method::GET, &format!("/api/lineage/{}", optimized), Some(&cookie), None)
        .await;
    assert_eq!(body["data"]["chain"][1]["metadata"]["quality"], Value::Null);
    assert_eq!(body["data"]["chain"][1]["metadata"]["format"], "png");
}

#[tokio::test]
async fn deleting_a_missing_object_still_clears_its_relations() {
    let app = TestApp::new();
    let cookie = app.sign_in("editor-6", Role::Editor).await;
    app.state
        .lineage
        .record("gallery/gone-cat.png", "optimized/gallery-gone-cat-8w.png", RelationKind::Optimization, json!({}))
        .await
        .unwrap();

    let (status, body) = app
        .json(Method::DELETE, "/api/images/gallery/gone-cat.png", Some(&cookie), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["relationsRemoved"], 1);
    assert_eq!(app.lineage_store.len().await, 0);

    let (status, _) = app
        .json(Method::DELETE, "/api/images/gallery/gone-cat.png", Some(&cookie), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn n8n_transform_records_both_hops() {
    let jpeg = images::optimize(
        &sample_png(12, 12),
        &OptimizeOptions { format: OutputFormat::Jpeg, quality: 80, max_width: None },
    )
    .unwrap()
    .bytes;
    let received = Arc::new(std::sync::Mutex::new(None::<Value>));
    let seen = received.clone();
    // Labels its reply as PNG while sending JPEG bytes
    let webhook = Router::new().route(
        "/webhook/transform",
        post(move |Json(body): Json<Value>| {
            let jpeg = jpeg.clone();
            let seen = seen.clone();
            async move {
                *seen.lock().unwrap() = Some(body);
                ([(header::CONTENT_TYPE, "image/png")], jpeg).into_response()
            }
        }),
    );
    let app = TestApp::with_n8n(&spawn_webhook(webhook).await);
    let cookie = app.sign_in("editor-7", Role::Editor).await;

    let (_, body) = upload(&app, &cookie, Some("uploads/cat.heic")).await;
    let gallery = body["data"]["object"]["path"].as_str().unwrap().to_string();

    let (status, body) = app
        .json(
            Method::POST,
            "/api/n8n/transform",
            Some(&cookie),
            Some(json!({ "path": gallery, "params": { "style": "ink" } })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let compatible = body["data"]["compatible"]["path"].as_str().unwrap().to_string();
    let generated = body["data"]["generated"]["path"].as_str().unwrap().to_string();
    assert_eq!(compatible, paths::n8n_compatible_path(&gallery));
    assert!(generated.starts_with("n8n-generated/"));
    assert!(generated.ends_with(".jpg"));
    assert_eq!(body["data"]["generated"]["contentType"], "image/jpeg");

    let sent = received.lock().unwrap().clone().unwrap();
    assert_eq!(sent["mimeType"], "image/png");
    assert_eq!(sent["params"]["style"], "ink");
    assert_eq!(sent["fileName"].as_str().unwrap(), compatible.rsplit('/').next().unwrap());

    let (status, body) = app
        .json(Method::GET, &format!("/api/lineage/{}", generated), Some(&cookie), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chain_stages(&body), vec!["original", "gallery", "n8n-compatible", "n8n-generated"]);
    assert_eq!(body["data"]["chain"][2]["relation"], "n8n-conversion");
    assert_eq!(body["data"]["chain"][3]["relation"], "n8n-generation");
    assert_eq!(body["data"]["chain"][3]["metadata"]["params"]["style"], "ink");
}

#[tokio::test]
async fn n8n_reply_that_is_not_an_image_is_a_bad_gateway() {
    let webhook = Router::new().route(
        "/webhook/transform",
        post(|| async { Json(json!({ "data": STANDARD.encode("just words"), "mimeType": "text/plain" })) }),
    );
    let app = TestApp::with_n8n(&spawn_webhook(webhook).await);
    let cookie = app.sign_in("editor-8", Role::Editor).await;
    let (_, body) = upload(&app, &cookie, None).await;
    let gallery = body["data"]["object"]["path"].as_str().unwrap().to_string();

    let (status, body) = app
        .json(Method::POST, "/api/n8n/transform", Some(&cookie), Some(json!({ "path": gallery })))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "BAD_GATEWAY");
    assert!(app.storage.list("n8n-generated/").await.unwrap().is_empty());
}

#[tokio::test]
async fn n8n_input_is_not_transformed_over_itself() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let webhook = Router::new().route(
        "/webhook/transform",
        post(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { StatusCode::INTERNAL_SERVER_ERROR }
        }),
    );
    let app = TestApp::with_n8n(&spawn_webhook(webhook).await);
    let cookie = app.sign_in("editor-9", Role::Editor).await;

    let input = "n8n-compatible/gallery-abc-cat.png";
    let original_bytes = sample_png(10, 10);
    app.storage.put(input, original_bytes.clone(), "image/png").await.unwrap();

    let (status, _) = app
        .json(Method::POST, "/api/n8n/transform", Some(&cookie), Some(json!({ "path": input })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.storage.get(input).await.unwrap().bytes, original_bytes);
    assert_eq!(app.storage.list("n8n-compatible/").await.unwrap().len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(app.lineage_store.len().await, 0);
}

#[tokio::test]
async fn billing_grouping_ignores_case() {
    let app = TestApp::new();
    let cookie = app.sign_in("admin-2", Role::Admin).await;

    // Parsing succeeds, then the missing export answers 503
    let (status, _) = app
        .json(Method::GET, "/api/billing/usage?groupBy=SKU", Some(&cookie), None)
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = app
        .json(Method::GET, "/api/billing/usage?groupBy=region", Some(&cookie), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
