use market_research::{api::start_server, config::ResearchConfig, pipeline::ResearchPipeline};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Loads .env as well
    let config = ResearchConfig::from_env()?;

    if let Err(e) = config.check_credentials() {
        warn!("{}", e);
        warn!("Research requests will be rejected until the credentials are set");
    }

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("Market Research Orchestrator - API Server");
    info!(port = api_port, model = %config.model, "Starting");

    let pipeline = Arc::new(ResearchPipeline::from_config(config)?);

    start_server(pipeline, api_port).await?;

    Ok(())
}
