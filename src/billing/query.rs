use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

use super::BillingError;

const MAX_RANGE_DAYS: i64 = 366;

/// Grouping key. Parsing ignores case, both from the CLI and from query strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Service,
    Sku,
    Project,
    Day,
}

impl GroupBy {
    fn key_expression(self) -> &'static str {
        match self {
            GroupBy::Service => "service.description",
            GroupBy::Sku => "CONCAT(service.description, ' / ', sku.description)",
            GroupBy::Project => "IFNULL(project.id, '(no project)')",
            GroupBy::Day => "FORMAT_DATE('%Y-%m-%d', DATE(usage_start_time))",
        }
    }

    fn order_clause(self) -> &'static str {
        match self {
            GroupBy::Day => "key ASC",
            _ => "cost DESC",
        }
    }
}

impl FromStr for GroupBy {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "service" => Ok(GroupBy::Service),
            "sku" => Ok(GroupBy::Sku),
            "project" => Ok(GroupBy::Project),
            "day" => Ok(GroupBy::Day),
            other => Err(BillingError::InvalidQuery(format!(
                "unknown grouping '{}', expected service, sku, project or day",
                other
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for GroupBy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub group_by: GroupBy,
}

impl BillingQuery {
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.start > self.end {
            return Err(BillingError::InvalidQuery(format!(
                "start {} is after end {}",
                self.start, self.end
            )));
        }
        let days = (self.end - self.start).num_days() + 1;
        if days > MAX_RANGE_DAYS {
            return Err(BillingError::InvalidQuery(format!(
                "range of {} days exceeds {} days",
                days, MAX_RANGE_DAYS
            )));
        }
        Ok(())
    }

    /// First of the month through `today`
    pub fn month_to_date(today: NaiveDate, group_by: GroupBy) -> Self {
        let start = today.with_day0(0).unwrap_or(today);
        Self { start, end: today, group_by }
    }
}

/// `project.dataset.table` of the Cloud Billing export, checked before it is
/// spliced into SQL (identifiers cannot be query parameters)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingTable {
    project: String,
    dataset: String,
    table: String,
}

impl BillingTable {
    pub fn parse(value: &str) -> Result<Self, BillingError> {
        let parts: Vec<&str> = value.trim().trim_matches('`').split('.').collect();
        let [project, dataset, table] = parts.as_slice() else {
            return Err(BillingError::InvalidTable(value.to_string()));
        };

        let project_ok = !project.is_empty()
            && project
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == ':');
        let ident_ok = |s: &str| {
            !s.is_empty()
                && s.len() <= 1024
                && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        };

        if !project_ok || !ident_ok(*dataset) || !ident_ok(*table) {
            return Err(BillingError::InvalidTable(value.to_string()));
        }

        Ok(Self {
            project: project.to_string(),
            dataset: dataset.to_string(),
            table: table.to_string(),
        })
    }

    pub fn qualified(&self) -> String {
        format!("`{}.{}.{}`", self.project, self.dataset, self.table)
    }
}

/// Standard SQL over the billing export. Dates are bound as `@start` / `@end`.
pub fn build_sql(table: &BillingTable, query: &BillingQuery) -> String {
    format!(
        "SELECT\n  {key} AS key,\n  SUM(cost) AS cost,\n  SUM(IFNULL((SELECT SUM(c.amount) FROM UNNEST(credits) c), 0)) AS credits,\n  ANY_VALUE(currency) AS currency\nFROM {table}\nWHERE DATE(usage_start_time) BETWEEN @start AND @end\nGROUP BY key\nORDER BY {order}",
        key = query.group_by.key_expression(),
        table = table.qualified(),
        order = query.group_by.order_clause(),
    )
}
