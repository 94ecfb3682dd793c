//! In-memory collaborators and a router harness for unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tower::ServiceExt;

use crate::auth::{IdentityError, IdentityVerifier, Role, SessionManager, VerifiedIdentity};
use crate::config::AppConfig;
use crate::database::models::{ImageRelation, NewRelation, NewUser, User};
use crate::database::{DatabaseError, UserStore};
use crate::github::GithubClient;
use crate::lineage::{LineageService, LineageStore, Stage};
use crate::n8n::N8nClient;
use crate::state::{AppState, LOCAL_FILES_BASE};
use crate::storage::{MemoryObjectStore, ObjectStore};

#[derive(Default)]
pub struct MemoryLineageStore {
    rows: RwLock<(i64, BTreeMap<String, ImageRelation>)>,
}

impl MemoryLineageStore {
    pub async fn len(&self) -> usize {
        self.rows.read().await.1.len()
    }
}

#[async_trait]
impl LineageStore for MemoryLineageStore {
    async fn upsert(&self, relation: &NewRelation) -> Result<ImageRelation, DatabaseError> {
        let mut guard = self.rows.write().await;
        let (next_id, rows) = &mut *guard;
        let now = Utc::now();

        let (id, created_at) = match rows.get(&relation.child_path) {
            Some(existing) => (existing.id, existing.created_at),
            None => {
                *next_id += 1;
                (*next_id, now)
            }
        };

        let row = ImageRelation {
            id,
            child_path: relation.child_path.clone(),
            parent_path: relation.parent_path.clone(),
            relation: relation.relation,
            child_stage: Stage::of_path(&relation.child_path),
            parent_stage: Stage::of_path(&relation.parent_path),
            metadata: relation.metadata.clone(),
            created_at,
            updated_at: now,
        };
        rows.insert(row.child_path.clone(), row.clone());
        Ok(row)
    }

    async fn parent_of(&self, child_path: &str) -> Result<Option<ImageRelation>, DatabaseError> {
        Ok(self.rows.read().await.1.get(child_path).cloned())
    }

    async fn children_of(&self, parent_path: &str) -> Result<Vec<ImageRelation>, DatabaseError> {
        let guard = self.rows.read().await;
        let mut children: Vec<ImageRelation> = guard
            .1
            .values()
            .filter(|row| row.parent_path == parent_path)
            .cloned()
            .collect();
        children.sort_by_key(|row| row.id);
        Ok(children)
    }

    async fn delete_for_path(&self, path: &str) -> Result<u64, DatabaseError> {
        let mut guard = self.rows.write().await;
        let before = guard.1.len();
        guard
            .1
            .retain(|child, row| child != path && row.parent_path != path);
        Ok((before - guard.1.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<BTreeMap<String, User>>,
}

impl MemoryUserStore {
    pub async fn insert(&self, uid: &str, email: Option<&str>, role: Role) -> User {
        let now = Utc::now();
        let user = User {
            uid: uid.to_string(),
            email: email.map(str::to_string),
            display_name: None,
            role,
            disabled: false,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        self.users.write().await.insert(uid.to_string(), user.clone());
        user
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn upsert_login(&self, user: &NewUser) -> Result<User, DatabaseError> {
        let mut users = self.users.write().await;
        let now = Utc::now();
        let row = users.entry(user.uid.clone()).or_insert_with(|| User {
            uid: user.uid.clone(),
            email: None,
            display_name: None,
            role: user.role,
            disabled: false,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        });
        row.email = user.email.clone();
        if user.display_name.is_some() {
            row.display_name = user.display_name.clone();
        }
        row.last_login_at = Some(now);
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn find(&self, uid: &str) -> Result<Option<User>, DatabaseError> {
        Ok(self.users.read().await.get(uid).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, DatabaseError> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|user| user.created_at);
        Ok(users)
    }

    async fn set_role(&self, uid: &str, role: Role) -> Result<Option<User>, DatabaseError> {
        Ok(self.users.write().await.get_mut(uid).map(|user| {
            user.role = role;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn set_disabled(&self, uid: &str, disabled: bool) -> Result<Option<User>, DatabaseError> {
        Ok(self.users.write().await.get_mut(uid).map(|user| {
            user.disabled = disabled;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }
}

/// Accepts a fixed set of ID tokens
#[derive(Default)]
pub struct StaticIdentityVerifier {
    identities: HashMap<String, VerifiedIdentity>,
}

impl StaticIdentityVerifier {
    pub fn with(mut self, token: &str, uid: &str, email: &str) -> Self {
        self.identities.insert(
            token.to_string(),
            VerifiedIdentity {
                uid: uid.to_string(),
                email: Some(email.to_string()),
                email_verified: true,
                name: None,
            },
        );
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentityVerifier {
    async fn verify_id_token(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        self.identities
            .get(token)
            .cloned()
            .ok_or_else(|| IdentityError::Rejected("unknown test token".to_string()))
    }
}

/// Router over in-memory collaborators
pub struct TestApp {
    pub state: AppState,
    pub users: Arc<MemoryUserStore>,
    pub lineage_store: Arc<MemoryLineageStore>,
    pub storage: Arc<MemoryObjectStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::development(), StaticIdentityVerifier::default())
    }

    pub fn with_config(config: AppConfig, identity: StaticIdentityVerifier) -> Self {
        let users = Arc::new(MemoryUserStore::default());
        let lineage_store = Arc::new(MemoryLineageStore::default());
        let storage = Arc::new(MemoryObjectStore::new(LOCAL_FILES_BASE));
        let object_store: Arc<dyn ObjectStore> = storage.clone();

        let state = AppState {
            sessions: Arc::new(SessionManager::new(&config.session).expect("session config")),
            identity: Arc::new(identity),
            users: users.clone(),
            storage: object_store.clone(),
            lineage: Arc::new(LineageService::new(lineage_store.clone(), object_store)),
            database: None,
            n8n: N8nClient::new(&config.n8n).ok().map(Arc::new),
            billing: None,
            github: Arc::new(GithubClient::new(&config.github, reqwest::Client::new())),
            config: Arc::new(config),
        };

        Self {
            state,
            users,
            lineage_store,
            storage,
        }
    }

    /// Same as `new`, with the n8n relay pointed at `webhook_url`
    pub fn with_n8n(webhook_url: &str) -> Self {
        let mut config = AppConfig::development();
        config.n8n.webhook_url = Some(webhook_url.to_string());
        config.n8n.timeout_secs = 5;
        Self::with_config(config, StaticIdentityVerifier::default())
    }

    pub fn router(&self) -> Router {
        crate::handlers::router(self.state.clone())
    }

    /// Seed a user and return a `Cookie` header value carrying their session
    pub async fn sign_in(&self, uid: &str, role: Role) -> String {
        let email = format!("{}@example.com", uid);
        self.users.insert(uid, Some(email.as_str()), role).await;
        let session = self
            .state
            .sessions
            .issue(uid, None, role)
            .expect("issue session");
        format!("{}={}", self.state.sessions.cookie_name(), session.token)
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router().oneshot(request).await.expect("router is infallible")
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.send(request).await;
        let status = response.status();
        (status, body_json(response).await)
    }
}

/// Serve `app` on an ephemeral local port and return its `/webhook/transform` URL
pub async fn spawn_webhook(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind webhook");
    let addr = listener.local_addr().expect("webhook address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("webhook server");
    });
    format!("http://{}/webhook/transform", addr)
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}
