//! Cloud Billing usage read from the BigQuery billing export.

pub mod query;

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::google::{GoogleAuthError, ServiceAccountAuth};

pub use query::{build_sql, BillingQuery, BillingTable, GroupBy};

const QUERY_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Invalid billing query: {0}")]
    InvalidQuery(String),

    #[error("Invalid billing export table '{0}'")]
    InvalidTable(String),

    #[error(transparent)]
    Auth(#[from] GoogleAuthError),

    #[error("BigQuery request failed: {0}")]
    Upstream(String),

    #[error("BigQuery job did not complete within the request timeout")]
    Incomplete,

    #[error("Unexpected BigQuery response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageRow {
    pub key: String,
    pub cost: Decimal,
    pub credits: Decimal,
    pub net: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub query: BillingQuery,
    pub rows: Vec<UsageRow>,
    pub total_cost: Decimal,
    pub total_credits: Decimal,
    pub total_net: Decimal,
    pub currency: Option<String>,
}

impl UsageReport {
    pub fn new(query: BillingQuery, rows: Vec<UsageRow>) -> Self {
        let total_cost: Decimal = rows.iter().map(|r| r.cost).sum();
        let total_credits: Decimal = rows.iter().map(|r| r.credits).sum();
        let currency = rows.first().map(|r| r.currency.clone());
        Self {
            query,
            total_net: total_cost + total_credits,
            total_cost,
            total_credits,
            currency,
            rows,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    rows: Vec<TableRow>,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    v: Value,
}

fn cell_str(row: &TableRow, index: usize) -> Option<&str> {
    row.f.get(index).and_then(|cell| cell.v.as_str())
}

fn cell_decimal(row: &TableRow, index: usize) -> Result<Decimal, BillingError> {
    match cell_str(row, index) {
        None => Ok(Decimal::ZERO),
        Some(raw) => Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .map_err(|e| BillingError::Malformed(format!("column {} value '{}': {}", index, raw, e))),
    }
}

fn parse_rows(response: QueryResponse) -> Result<Vec<UsageRow>, BillingError> {
    if !response.job_complete {
        return Err(BillingError::Incomplete);
    }

    response
        .rows
        .iter()
        .map(|row| {
            let cost = cell_decimal(row, 1)?;
            let credits = cell_decimal(row, 2)?;
            Ok(UsageRow {
                key: cell_str(row, 0).unwrap_or("(unknown)").to_string(),
                cost,
                credits,
                net: cost + credits,
                currency: cell_str(row, 3).unwrap_or("USD").to_string(),
            })
        })
        .collect()
}

pub struct BillingClient {
    project: String,
    table: BillingTable,
    api_base: String,
    auth: Arc<ServiceAccountAuth>,
    http: reqwest::Client,
}

impl BillingClient {
    pub fn new(
        project: &str,
        table: &str,
        api_base: &str,
        auth: Arc<ServiceAccountAuth>,
        http: reqwest::Client,
    ) -> Result<Self, BillingError> {
        Ok(Self {
            project: project.to_string(),
            table: BillingTable::parse(table)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            auth,
            http,
        })
    }

    pub fn table(&self) -> &BillingTable {
        &self.table
    }

    pub async fn usage(&self, query: BillingQuery) -> Result<UsageReport, BillingError> {
        query.validate()?;

        let body = json!({
            "query": build_sql(&self.table, &query),
            "useLegacySql": false,
            "parameterMode": "NAMED",
            "timeoutMs": QUERY_TIMEOUT_MS,
            "queryParameters": [
                date_parameter("start", query.start),
                date_parameter("end", query.end),
            ],
        });

        let url = format!("{}/bigquery/v2/projects/{}/queries", self.api_base, self.project);
        let token = self.auth.access_token().await?;

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| BillingError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BillingError::Upstream(format!("{}: {}", status, text)));
        }

        let parsed = response
            .json::<QueryResponse>()
            .await
            .map_err(|e| BillingError::Malformed(e.to_string()))?;

        let rows = parse_rows(parsed)?;
        tracing::info!(
            "Billing usage {}..{} by {:?}: {} rows",
            query.start,
            query.end,
            query.group_by,
            rows.len()
        );

        Ok(UsageReport::new(query, rows))
    }
}

fn date_parameter(name: &str, value: chrono::NaiveDate) -> Value {
    json!({
        "name": name,
        "parameterType": { "type": "DATE" },
        "parameterValue": { "value": value.format("%Y-%m-%d").to_string() },
    })
}
