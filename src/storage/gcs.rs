use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{validate_path, ObjectData, ObjectStore, StorageError, StoredObject};
use crate::google::ServiceAccountAuth;
use crate::lineage::Stage;

/// Firebase Storage bucket accessed through the Cloud Storage JSON API
pub struct GcsObjectStore {
    bucket: String,
    api_base: Url,
    public_base: Url,
    auth: Arc<ServiceAccountAuth>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectResource {
    name: String,
    size: Option<String>,
    content_type: Option<String>,
    updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectResource>,
    next_page_token: Option<String>,
}

impl GcsObjectStore {
    pub fn new(
        bucket: &str,
        api_base: &str,
        public_base: &str,
        auth: Arc<ServiceAccountAuth>,
        http: reqwest::Client,
    ) -> Result<Self, StorageError> {
        let parse = |base: &str| {
            Url::parse(base).map_err(|e| StorageError::Upstream(format!("invalid storage base '{}': {}", base, e)))
        };

        Ok(Self {
            bucket: bucket.to_string(),
            api_base: parse(api_base)?,
            public_base: parse(public_base)?,
            auth,
            http,
        })
    }

    /// `<base>/<segments...>` with each segment percent-encoded, object names included
    fn endpoint(base: &Url, segments: &[&str]) -> Url {
        let mut url = base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segments);
        }
        url
    }

    fn object_url(&self, path: &str) -> Url {
        Self::endpoint(&self.api_base, &["storage", "v1", "b", &self.bucket, "o", path])
    }

    fn describe(&self, resource: ObjectResource) -> StoredObject {
        StoredObject {
            stage: Stage::of_path(&resource.name),
            size: resource.size.and_then(|s| s.parse().ok()).unwrap_or(0),
            content_type: resource.content_type,
            updated_at: resource.updated,
            url: self.public_url(&resource.name),
            path: resource.name,
        }
    }

    async fn authorized(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StorageError> {
        let token = self.auth.access_token().await?;
        request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| StorageError::Upstream(e.to_string()))
    }

    async fn check(path: &str, response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(path.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StorageError::Upstream(format!("{} for '{}': {}", status, path, body)))
            }
        }
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredObject, StorageError> {
        validate_path(path)?;

        let mut url = Self::endpoint(&self.api_base, &["upload", "storage", "v1", "b", &self.bucket, "o"]);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", path);

        let request = self
            .http
            .post(url)
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes);
        let response = Self::check(path, self.authorized(request).await?).await?;

        let resource = response
            .json::<ObjectResource>()
            .await
            .map_err(|e| StorageError::Upstream(e.to_string()))?;

        tracing::info!("Uploaded gs://{}/{}", self.bucket, path);
        Ok(self.describe(resource))
    }

    async fn get(&self, path: &str) -> Result<ObjectData, StorageError> {
        validate_path(path)?;

        let mut url = self.object_url(path);
        url.query_pairs_mut().append_pair("alt", "media");

        let response = Self::check(path, self.authorized(self.http.get(url)).await?).await?;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Upstream(e.to_string()))?;

        Ok(ObjectData {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        validate_path(path)?;
        Self::check(path, self.authorized(self.http.delete(self.object_url(path))).await?).await?;
        tracing::info!("Deleted gs://{}/{}", self.bucket, path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let base = Self::endpoint(&self.api_base, &["storage", "v1", "b", &self.bucket, "o"]);
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = base.clone();
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("prefix", prefix);
                if let Some(token) = page_token.as_deref() {
                    query.append_pair("pageToken", token);
                }
            }

            let response = Self::check(prefix, self.authorized(self.http.get(url)).await?).await?;
            let page = response
                .json::<ObjectList>()
                .await
                .map_err(|e| StorageError::Upstream(e.to_string()))?;

            objects.extend(page.items.into_iter().map(|item| self.describe(item)));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(objects)
    }

    fn public_url(&self, path: &str) -> String {
        let mut url = Self::endpoint(&self.public_base, &["v0", "b", &self.bucket, "o", path]);
        url.query_pairs_mut().append_pair("alt", "media");
        url.into()
    }
}
