use portfolio_ops::config::config;
use portfolio_ops::handlers;
use portfolio_ops::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SESSION_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config();
    config.validate()?;
    tracing::info!("Starting portfolio-ops in {:?} mode", config.environment);

    let state = AppState::from_config(config.clone())?;
    let app = handlers::router(state);

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
