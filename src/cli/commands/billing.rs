use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use serde_json::json;

use crate::billing::{build_sql, BillingQuery, BillingTable, GroupBy};
use crate::cli::utils::print_json;
use crate::cli::OutputFormat;
use crate::config::config;

#[derive(Subcommand)]
pub enum BillingCommands {
    #[command(about = "Print the BigQuery SQL the usage endpoint would run")]
    Sql {
        #[arg(long, help = "First day (YYYY-MM-DD), defaults to the first of this month")]
        start: Option<NaiveDate>,

        #[arg(long, help = "Last day (YYYY-MM-DD), defaults to today")]
        end: Option<NaiveDate>,

        #[arg(long, default_value = "service", help = "service, sku, project or day")]
        group_by: GroupBy,

        #[arg(long, help = "Billing export table, overrides BILLING_TABLE")]
        table: Option<String>,
    },
}

pub fn handle(cmd: BillingCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        BillingCommands::Sql { start, end, group_by, table } => {
            let table = table
                .or_else(|| config().google.billing_table.clone())
                .ok_or_else(|| anyhow::anyhow!("no billing table: pass --table or set BILLING_TABLE"))?;
            let table = BillingTable::parse(&table)?;

            let today = Utc::now().date_naive();
            let defaults = BillingQuery::month_to_date(today, group_by);
            let query = BillingQuery {
                start: start.unwrap_or(defaults.start),
                end: end.unwrap_or(defaults.end),
                group_by,
            };
            query.validate()?;

            let sql = build_sql(&table, &query);
            match output_format {
                OutputFormat::Json => print_json(&json!({
                    "sql": sql,
                    "parameters": { "start": query.start, "end": query.end },
                }))?,
                OutputFormat::Text => {
                    println!("-- @start = {}, @end = {}", query.start, query.end);
                    println!("{}", sql);
                }
            }
            Ok(())
        }
    }
}
