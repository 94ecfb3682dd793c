use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::DatabaseManager;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let database = DatabaseManager::connect_lazy(&config().database)?;
    database.migrate().await?;
    database.close().await;
    output_success(&output_format, "Migrations applied", None)
}
