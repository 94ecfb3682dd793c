use axum::extract::{Query, State};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::billing::{BillingQuery, GroupBy, UsageReport};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageParams {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub group_by: Option<GroupBy>,
}

impl UsageParams {
    /// Month to date by service unless told otherwise
    pub fn into_query(self, today: NaiveDate) -> BillingQuery {
        let group_by = self.group_by.unwrap_or(GroupBy::Service);
        let default = BillingQuery::month_to_date(today, group_by);
        BillingQuery {
            start: self.start.unwrap_or(default.start),
            end: self.end.unwrap_or(default.end),
            group_by,
        }
    }
}

/// GET /api/billing/usage?start=2024-03-01&end=2024-03-17&groupBy=service
pub async fn usage(
    State(state): State<AppState>,
    Query(params): Query<UsageParams>,
) -> ApiResult<UsageReport> {
    let billing = state
        .billing
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Billing export is not configured"))?;

    let query = params.into_query(Utc::now().date_naive());
    let report = billing.usage(query).await?;
    Ok(ApiResponse::success(report))
}
