use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::auth::{FirebaseVerifier, IdentityVerifier, SessionError, SessionManager};
use crate::billing::{BillingClient, BillingError};
use crate::config::AppConfig;
use crate::database::{DatabaseError, DatabaseManager, PgLineageStore, PgUserStore, UserStore};
use crate::github::GithubClient;
use crate::google::{GoogleAuthError, ServiceAccountAuth, ServiceAccountKey};
use crate::lineage::LineageService;
use crate::n8n::{N8nClient, N8nError};
use crate::storage::{GcsObjectStore, MemoryObjectStore, ObjectStore, StorageError};

/// Path the in-process store serves objects under
pub const LOCAL_FILES_BASE: &str = "/files";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Google(#[from] GoogleAuthError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    N8n(#[from] N8nError),

    #[error("HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Collaborators shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<SessionManager>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub users: Arc<dyn UserStore>,
    pub storage: Arc<dyn ObjectStore>,
    pub lineage: Arc<LineageService>,
    pub database: Option<Arc<DatabaseManager>>,
    pub n8n: Option<Arc<N8nClient>>,
    pub billing: Option<Arc<BillingClient>>,
    pub github: Arc<GithubClient>,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> Result<Self, StartupError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("portfolio-ops/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        let database = Arc::new(DatabaseManager::connect_lazy(&config.database)?);
        let google = google_auth(&config, &http)?;

        let storage: Arc<dyn ObjectStore> = match (&config.google.storage_bucket, &google) {
            (Some(bucket), Some(auth)) => {
                tracing::info!("Using storage bucket {}", bucket);
                Arc::new(GcsObjectStore::new(
                    bucket,
                    &config.google.storage_api_base,
                    &config.google.storage_public_base,
                    auth.clone(),
                    http.clone(),
                )?)
            }
            (Some(bucket), None) => {
                tracing::warn!("Bucket {} configured without credentials, using in-process storage", bucket);
                Arc::new(MemoryObjectStore::new(LOCAL_FILES_BASE))
            }
            (None, _) => {
                tracing::warn!("No storage bucket configured, using in-process storage");
                Arc::new(MemoryObjectStore::new(LOCAL_FILES_BASE))
            }
        };

        let billing = match (&config.google.billing_table, &google) {
            (Some(table), Some(auth)) => {
                let project = config
                    .google
                    .billing_project
                    .clone()
                    .or_else(|| auth.project_id().map(str::to_string))
                    .unwrap_or_default();
                Some(Arc::new(BillingClient::new(
                    &project,
                    table,
                    &config.google.bigquery_api_base,
                    auth.clone(),
                    http.clone(),
                )?))
            }
            _ => None,
        };

        let n8n = match N8nClient::new(&config.n8n) {
            Ok(client) => Some(Arc::new(client)),
            Err(N8nError::NotConfigured) => None,
            Err(e) => return Err(e.into()),
        };

        let pool = database.pool().clone();
        let lineage = LineageService::new(Arc::new(PgLineageStore::new(pool.clone())), storage.clone());

        Ok(Self {
            sessions: Arc::new(SessionManager::new(&config.session)?),
            identity: Arc::new(FirebaseVerifier::new(&config.firebase, http.clone())),
            users: Arc::new(PgUserStore::new(pool)),
            storage,
            lineage: Arc::new(lineage),
            database: Some(database),
            n8n,
            billing,
            github: Arc::new(GithubClient::new(&config.github, http)),
            config: Arc::new(config),
        })
    }
}

fn google_auth(config: &AppConfig, http: &reqwest::Client) -> Result<Option<Arc<ServiceAccountAuth>>, StartupError> {
    match ServiceAccountKey::from_config(&config.google) {
        Ok(key) => {
            let auth = ServiceAccountAuth::new(key, &config.google.token_url, http.clone())?;
            Ok(Some(Arc::new(auth)))
        }
        Err(GoogleAuthError::MissingCredentials) => {
            tracing::info!("No Google service account configured, storage and billing run locally or not at all");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
