//! Stage orchestrator
//!
//! Runs the stage graph one dependency level at a time. Stages within a
//! level, and the sources within a stage, run concurrently. Every stage
//! reaches a terminal status; source and synthesis failures only degrade.

use crate::audit::compute_digest;
use crate::models::{Query, SourceId, SourceResult, Stage, StageName};
use crate::progress::{event, ProgressReporter};
use crate::sources::SourceSet;
use crate::synthesis::{Synthesis, SynthesisEngine};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub mod context;
pub mod graph;
mod prompts;

pub use context::{InputSnapshot, StageSnapshot};
pub use graph::{market_research_graph, StageGraph, StageSpec};

/// Fraction of overall progress reached before the first stage starts
pub const PROGRESS_START: f32 = 0.1;
/// Fraction of overall progress reached once every stage is terminal
pub const PROGRESS_END: f32 = 0.9;

/// Diagnostic stored for a source abandoned at the run deadline
pub const ABANDONED: &str = "abandoned: run deadline exceeded";

/// Result of one orchestrated run
#[derive(Debug, Clone)]
pub struct OrchestrationRun {
    /// In graph declaration order
    pub stages: Vec<Stage>,
    /// In resolution order
    pub sources: Vec<SourceResult>,
}

/// Logical clock shared by everything resolving within one run
struct RunClock(AtomicU64);

impl RunClock {
    fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    fn tick(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

struct RunContext<'a> {
    query: &'a Query,
    deadline: Option<Instant>,
    clock: RunClock,
    finished: AtomicUsize,
    total: usize,
    progress: &'a dyn ProgressReporter,
}

impl RunContext<'_> {
    fn fraction(&self, finished: usize) -> f32 {
        if self.total == 0 {
            return PROGRESS_END;
        }
        PROGRESS_START + (PROGRESS_END - PROGRESS_START) * finished as f32 / self.total as f32
    }
}

pub struct StageOrchestrator {
    graph: StageGraph,
    sources: SourceSet,
    engine: SynthesisEngine,
}

impl StageOrchestrator {
    pub fn new(graph: StageGraph, sources: SourceSet, engine: SynthesisEngine) -> Self {
        Self {
            graph,
            sources,
            engine,
        }
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    /// Drive every stage to `Done` or `Degraded`.
    ///
    /// Adapters still outstanding at `deadline` are abandoned and recorded
    /// as `Error`; synthesis past the deadline falls back immediately.
    pub async fn run(
        &self,
        query: &Query,
        deadline: Option<Instant>,
        progress: &dyn ProgressReporter,
    ) -> OrchestrationRun {
        let ctx = RunContext {
            query,
            deadline,
            clock: RunClock::new(),
            finished: AtomicUsize::new(0),
            total: self.graph.len(),
            progress,
        };

        let mut completed: HashMap<StageName, Stage> = HashMap::with_capacity(self.graph.len());
        let mut sources: Vec<SourceResult> = Vec::new();

        for (depth, level) in self.graph.levels().into_iter().enumerate() {
            debug!(
                level = depth,
                stages = ?level.iter().map(|spec| spec.name).collect::<Vec<_>>(),
                "Starting stage level"
            );

            let outcomes = join_all(
                level
                    .iter()
                    .map(|spec| self.run_stage(spec, &ctx, &completed)),
            )
            .await;

            for (stage, resolved) in outcomes {
                sources.extend(resolved);
                completed.insert(stage.name, stage);
            }
        }

        sources.sort_by_key(|result| result.resolved_seq());

        let stages = self
            .graph
            .stages()
            .iter()
            .filter_map(|spec| completed.remove(&spec.name))
            .collect();

        OrchestrationRun { stages, sources }
    }

    async fn run_stage(
        &self,
        spec: &StageSpec,
        ctx: &RunContext<'_>,
        completed: &HashMap<StageName, Stage>,
    ) -> (Stage, Vec<SourceResult>) {
        let start = std::time::Instant::now();
        ctx.progress.report(event(
            spec.name.activity(),
            Some(spec.name),
            ctx.fraction(ctx.finished.load(Ordering::SeqCst)),
        ));

        let resolved = join_all(
            spec.source_inputs()
                .map(|id| async move { self.fetch_source(id, ctx).await.stamped(ctx.clock.tick()) }),
        )
        .await;

        let by_id: HashMap<SourceId, SourceResult> = resolved
            .iter()
            .map(|result| (result.source_id(), result.clone()))
            .collect();

        let snapshot = StageSnapshot::build(spec, ctx.query, &by_id, completed);
        let mut stage = Stage::pending(spec.name, spec.inputs.clone());
        stage.input_digest = compute_digest(&snapshot);
        stage.notes = snapshot.notes();
        stage.started_seq = ctx.clock.tick();

        let synthesis = self
            .engine
            .synthesize(&spec.template, &snapshot.bindings(), ctx.deadline)
            .await;

        stage.finished_seq = ctx.clock.tick();
        stage.synthesized = synthesis.is_generated();
        if let Synthesis::Fallback { reason, .. } = &synthesis {
            stage.notes.push(format!("synthesis failed: {}", reason));
        }
        stage.output_text = synthesis.into_text();
        stage.status = context::resolve_status(&stage.notes);
        stage.execution_time_ms = start.elapsed().as_millis() as u64;

        if stage.notes.is_empty() {
            info!(
                stage = %stage.name,
                execution_time_ms = stage.execution_time_ms,
                "Stage complete"
            );
        } else {
            warn!(
                stage = %stage.name,
                notes = ?stage.notes,
                "Stage degraded"
            );
        }

        let finished = ctx.finished.fetch_add(1, Ordering::SeqCst) + 1;
        ctx.progress.report(event(
            format!("Finished {}", spec.name.as_str().replace('_', " ")),
            Some(spec.name),
            ctx.fraction(finished),
        ));

        (stage, resolved)
    }

    async fn fetch_source(&self, id: SourceId, ctx: &RunContext<'_>) -> SourceResult {
        let adapter = self.sources.get(id);
        let params = graph::source_params(id, ctx.query);

        let result = match ctx.deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, adapter.fetch(&params)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(source = %id, "Source abandoned at run deadline");
                        SourceResult::error(id, ABANDONED)
                    }
                }
            }
            None => adapter.fetch(&params).await,
        };

        debug!(source = %id, status = ?result.status(), "Source resolved");
        result
    }
}
