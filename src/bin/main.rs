use clap::Parser;
use market_research::{
    config::ResearchConfig, pipeline::ResearchPipeline, progress::LogProgress,
    report::render_markdown,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Market research report generator for a business idea
#[derive(Parser, Debug)]
#[command(name = "research")]
#[command(version)]
struct Args {
    /// Business idea, e.g. "Gym in Coimbatore"
    idea: String,

    /// Overall run deadline in seconds (defaults to RESEARCH_DEADLINE_SECS)
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Write the markdown report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ResearchConfig::from_env()?;
    info!(?config, "Configuration loaded");

    let pipeline = ResearchPipeline::from_config(config)?;
    let outcome = pipeline
        .run(
            &args.idea,
            args.deadline_secs.map(Duration::from_secs),
            &LogProgress,
        )
        .await?;

    for advisory in &outcome.advisories {
        warn!(kind = ?advisory.kind, "{}", advisory.message);
    }

    let markdown = render_markdown(&outcome.report);
    match args.output {
        Some(path) => {
            std::fs::write(&path, markdown)?;
            info!(path = %path.display(), run_id = %outcome.run_id, "Report written");
        }
        None => println!("{}", markdown),
    }

    Ok(())
}
