use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::GithubConfig;

const TOP_REPOS: usize = 6;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("GitHub username is not configured")]
    NotConfigured,

    #[error("GitHub user '{0}' not found")]
    NotFound(String),

    #[error("GitHub rate limit reached")]
    RateLimited,

    #[error("GitHub request failed: {0}")]
    Upstream(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    pub repo: EventRepo,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRepo {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repo {
    pub name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub fork: bool,
    pub pushed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepoSummary {
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub language: Option<String>,
    pub stars: u64,
    pub pushed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LanguageCount {
    pub language: String,
    pub repos: usize,
}

/// What the landing page widgets render
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub username: String,
    pub recent_pushes: usize,
    pub commits: u64,
    pub active_repos: Vec<String>,
    pub top_repos: Vec<RepoSummary>,
    pub languages: Vec<LanguageCount>,
    pub last_active: Option<DateTime<Utc>>,
}

/// Condense raw events and repositories into widget data
pub fn summarize(username: &str, events: &[Event], repos: &[Repo]) -> Activity {
    let pushes: Vec<&Event> = events.iter().filter(|e| e.kind == "PushEvent").collect();

    let commits = pushes
        .iter()
        .map(|e| {
            e.payload
                .get("size")
                .and_then(|v| v.as_u64())
                .or_else(|| e.payload.get("commits").and_then(|c| c.as_array()).map(|c| c.len() as u64))
                .unwrap_or(0)
        })
        .sum();

    let mut active_repos: Vec<String> = Vec::new();
    for event in events {
        if !active_repos.contains(&event.repo.name) {
            active_repos.push(event.repo.name.clone());
        }
    }

    let mut owned: Vec<&Repo> = repos.iter().filter(|r| !r.fork).collect();
    owned.sort_by(|a, b| {
        b.stargazers_count
            .cmp(&a.stargazers_count)
            .then_with(|| b.pushed_at.cmp(&a.pushed_at))
    });
    let top_repos = owned
        .iter()
        .take(TOP_REPOS)
        .map(|r| RepoSummary {
            name: r.name.clone(),
            description: r.description.clone(),
            url: r.html_url.clone(),
            language: r.language.clone(),
            stars: r.stargazers_count,
            pushed_at: r.pushed_at,
        })
        .collect();

    let mut by_language: HashMap<&str, usize> = HashMap::new();
    for repo in &owned {
        if let Some(language) = repo.language.as_deref() {
            *by_language.entry(language).or_default() += 1;
        }
    }
    let mut languages: Vec<LanguageCount> = by_language
        .into_iter()
        .map(|(language, repos)| LanguageCount { language: language.to_string(), repos })
        .collect();
    languages.sort_by(|a, b| b.repos.cmp(&a.repos).then_with(|| a.language.cmp(&b.language)));

    Activity {
        username: username.to_string(),
        recent_pushes: pushes.len(),
        commits,
        active_repos,
        top_repos,
        languages,
        last_active: events.iter().map(|e| e.created_at).max(),
    }
}

pub struct GithubClient {
    username: String,
    token: Option<String>,
    api_base: String,
    ttl: Duration,
    http: reqwest::Client,
    cache: RwLock<Option<(Instant, Activity)>>,
}

impl GithubClient {
    pub fn new(config: &GithubConfig, http: reqwest::Client) -> Self {
        Self {
            username: config.username.clone(),
            token: config.token.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            ttl: Duration::from_secs(config.cache_ttl_secs),
            http,
            cache: RwLock::new(None),
        }
    }

    /// Cached activity summary for the configured user
    pub async fn activity(&self) -> Result<Activity, GithubError> {
        if self.username.is_empty() {
            return Err(GithubError::NotConfigured);
        }

        if let Some((fetched_at, activity)) = self.cache.read().await.as_ref() {
            if fetched_at.elapsed() < self.ttl {
                return Ok(activity.clone());
            }
        }

        let events_url = format!("{}/users/{}/events/public?per_page=100", self.api_base, self.username);
        let repos_url = format!("{}/users/{}/repos?sort=pushed&per_page=100", self.api_base, self.username);
        let (events, repos) = futures::try_join!(
            self.fetch::<Vec<Event>>(&events_url),
            self.fetch::<Vec<Repo>>(&repos_url)
        )?;

        let activity = summarize(&self.username, &events, &repos);
        *self.cache.write().await = Some((Instant::now(), activity.clone()));
        tracing::debug!("Refreshed GitHub activity for {}", self.username);

        Ok(activity)
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, GithubError> {
        let mut request = self
            .http
            .get(url)
            .header(header::USER_AGENT, "portfolio-ops")
            .header(header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GithubError::Upstream(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| GithubError::Upstream(e.to_string())),
            StatusCode::NOT_FOUND => Err(GithubError::NotFound(self.username.clone())),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => Err(GithubError::RateLimited),
            status => Err(GithubError::Upstream(format!("{} from {}", status, url))),
        }
    }
}
