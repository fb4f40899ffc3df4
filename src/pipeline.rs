//! Research pipeline
//!
//! INPUT → PRECONDITIONS → PARSE → ORCHESTRATE → ASSEMBLE → AUDIT
//!
//! Only precondition failures leave this module as errors. Everything after
//! the gate completes with a report, degraded or not.

use crate::audit::{RunLog, RunRecord, StageAudit};
use crate::backend::{GroqClient, TextBackend};
use crate::config::ResearchConfig;
use crate::error::ResearchError;
use crate::models::{Advisory, AdvisoryKind, RunOutcome, Stage, StageStatus};
use crate::orchestrator::{market_research_graph, StageOrchestrator};
use crate::progress::{event, ProgressReporter};
use crate::query::QueryParser;
use crate::report::ReportAssembler;
use crate::sources::{create_default_sources, SourceSet};
use crate::synthesis::SynthesisEngine;
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

pub const MISSING_LOCATION_ADVISORY: &str = "No location detected in your business idea. \
     Including a location (e.g., 'in Coimbatore') will give you more realistic, location-specific research.";

pub struct ResearchPipeline {
    config: ResearchConfig,
    orchestrator: StageOrchestrator,
    run_log: RunLog,
}

impl ResearchPipeline {
    /// Production wiring: SerpApi adapters and the Groq backend
    pub fn from_config(config: ResearchConfig) -> Result<Self> {
        let sources = create_default_sources(&config)?;
        let backend: Arc<dyn TextBackend> = Arc::new(GroqClient::from_config(&config)?);
        Self::with_components(config, sources, backend)
    }

    pub fn with_components(
        config: ResearchConfig,
        sources: SourceSet,
        backend: Arc<dyn TextBackend>,
    ) -> Result<Self> {
        let engine = SynthesisEngine::new(backend, &config);
        let orchestrator = StageOrchestrator::new(market_research_graph()?, sources, engine);

        Ok(Self {
            config,
            orchestrator,
            run_log: RunLog::new(),
        })
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    pub fn run_log(&self) -> &RunLog {
        &self.run_log
    }

    /// Research one business idea end to end.
    ///
    /// `deadline` bounds the whole run; the configured default applies when
    /// it is `None`.
    pub async fn run(
        &self,
        raw_text: &str,
        deadline: Option<Duration>,
        progress: &dyn ProgressReporter,
    ) -> Result<RunOutcome> {
        self.config.check_credentials()?;
        if raw_text.trim().is_empty() {
            return Err(ResearchError::InvalidQuery(
                "Please enter a business idea".to_string(),
            ));
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let budget = deadline.unwrap_or(self.config.run_deadline);
        // A budget past the clock's range is no bound at all
        let deadline = tokio::time::Instant::now().checked_add(budget);

        progress.report(event("Analyzing business idea", None, 0.0));
        let query = QueryParser::parse(raw_text);

        info!(
            run_id = %run_id,
            business_type = %query.business_type,
            location = ?query.location,
            deadline_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
            "Research run started"
        );

        let mut advisories = Vec::new();
        if !query.has_location() {
            warn!(run_id = %run_id, "No location in business idea");
            advisories.push(Advisory {
                kind: AdvisoryKind::MissingLocation,
                message: MISSING_LOCATION_ADVISORY.to_string(),
            });
        }

        let run = self.orchestrator.run(&query, deadline, progress).await;

        let degraded: Vec<&Stage> = run
            .stages
            .iter()
            .filter(|stage| stage.status == StageStatus::Degraded)
            .collect();
        if !degraded.is_empty() {
            advisories.push(Advisory {
                kind: AdvisoryKind::DegradedStages,
                message: format!(
                    "Some sections are based on incomplete data: {}.",
                    degraded
                        .iter()
                        .map(|stage| stage.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            });
        }

        progress.report(event("Compiling final report", None, 0.95));
        let report = ReportAssembler::assemble(&query, &run.stages);
        let execution_time_ms = start.elapsed().as_millis() as u64;

        self.run_log
            .record(RunRecord {
                run_id,
                query: query.clone(),
                report_title: report.title().to_string(),
                stages: run
                    .stages
                    .iter()
                    .map(|stage| StageAudit {
                        stage: stage.name,
                        status: stage.status,
                        input_digest: stage.input_digest.clone(),
                        notes: stage.notes.clone(),
                        execution_time_ms: stage.execution_time_ms,
                    })
                    .collect(),
                started_at,
                finished_at: Utc::now(),
                execution_time_ms,
            })
            .await?;

        info!(
            run_id = %run_id,
            degraded = degraded.len(),
            elapsed_ms = execution_time_ms,
            "Research run complete"
        );
        progress.report(event("Report complete!", None, 1.0));

        Ok(RunOutcome {
            run_id,
            query,
            report,
            stages: run.stages,
            sources: run.sources,
            advisories,
            execution_time_ms,
        })
    }
}
