use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::N8nConfig;

#[derive(Debug, Error)]
pub enum N8nError {
    #[error("n8n webhook is not configured")]
    NotConfigured,

    #[error("n8n webhook timed out")]
    Timeout,

    #[error("n8n webhook returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("n8n response could not be used: {0}")]
    InvalidResponse(String),

    #[error("n8n request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for N8nError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            N8nError::Timeout
        } else {
            N8nError::Request(err.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// JSON shapes the workflow may answer with instead of raw image bytes
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookReply {
    data: Option<String>,
    mime_type: Option<String>,
    url: Option<String>,
}

pub struct N8nClient {
    webhook_url: String,
    secret: Option<(String, String)>,
    http: reqwest::Client,
}

impl N8nClient {
    pub fn new(config: &N8nConfig) -> Result<Self, N8nError> {
        let webhook_url = config.webhook_url.clone().ok_or(N8nError::NotConfigured)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| N8nError::Request(e.to_string()))?;

        Ok(Self {
            webhook_url,
            secret: config
                .secret
                .clone()
                .map(|value| (config.secret_header.clone(), value)),
            http,
        })
    }

    /// Send one image through the workflow and return the variant it produced
    pub async fn transform(
        &self,
        bytes: &[u8],
        file_name: &str,
        mime_type: &str,
        params: &Value,
    ) -> Result<GeneratedImage, N8nError> {
        let payload = json!({
            "fileName": file_name,
            "mimeType": mime_type,
            "data": STANDARD.encode(bytes),
            "params": params,
        });

        let mut request = self.http.post(&self.webhook_url).json(&payload);
        if let Some((name, value)) = &self.secret {
            request = request.header(name.as_str(), value.as_str());
        }

        tracing::info!("Relaying '{}' ({} bytes) to n8n", file_name, bytes.len());
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(N8nError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.starts_with("image/") {
            let bytes = response.bytes().await?.to_vec();
            return Ok(GeneratedImage { bytes, content_type });
        }

        let reply: WebhookReply = response
            .json()
            .await
            .map_err(|e| N8nError::InvalidResponse(e.to_string()))?;
        self.resolve_reply(reply).await
    }

    async fn resolve_reply(&self, reply: WebhookReply) -> Result<GeneratedImage, N8nError> {
        if let Some(data) = reply.data {
            let bytes = STANDARD
                .decode(data.trim())
                .map_err(|e| N8nError::InvalidResponse(format!("bad base64 payload: {}", e)))?;
            return Ok(GeneratedImage {
                bytes,
                content_type: reply.mime_type.unwrap_or_else(|| "image/png".to_string()),
            });
        }

        if let Some(url) = reply.url {
            let response = self.http.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(N8nError::InvalidResponse(format!(
                    "generated image download returned {}",
                    response.status()
                )));
            }
            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .or(reply.mime_type)
                .unwrap_or_else(|| "image/png".to_string());
            let bytes = response.bytes().await?.to_vec();
            return Ok(GeneratedImage { bytes, content_type });
        }

        Err(N8nError::InvalidResponse("reply has neither data nor url".to_string()))
    }
}
