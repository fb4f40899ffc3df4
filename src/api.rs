//! REST API server for the research pipeline
//!
//! Thin presentation layer: every endpoint delegates to `ResearchPipeline`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{Advisory, ProgressEvent, StageName, StageStatus};
use crate::pipeline::ResearchPipeline;
use crate::progress::CollectingProgress;
use crate::report::render_markdown;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResearchRequest {
    pub query: String,
    pub deadline_secs: Option<u64>,
}

/// =============================
/// Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StageSummary {
    pub stage: StageName,
    pub status: StageStatus,
    pub notes: Vec<String>,
    pub execution_time_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ResearchResponse {
    pub run_id: Uuid,
    pub title: String,
    pub markdown: String,
    pub report: crate::models::Report,
    pub advisories: Vec<Advisory>,
    pub stages: Vec<StageSummary>,
    pub progress: Vec<ProgressEvent>,
    pub execution_time_ms: u64,
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<ResearchPipeline>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Research Endpoint
/// =============================

async fn run_research(
    State(state): State<ApiState>,
    Json(req): Json<ResearchRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!(query = %req.query, deadline_secs = ?req.deadline_secs, "Received research request");

    let progress = CollectingProgress::new();
    let deadline = req.deadline_secs.map(Duration::from_secs);

    match state.pipeline.run(&req.query, deadline, &progress).await {
        Ok(outcome) => {
            let response = ResearchResponse {
                run_id: outcome.run_id,
                title: outcome.report.title().to_string(),
                markdown: render_markdown(&outcome.report),
                advisories: outcome.advisories,
                stages: outcome
                    .stages
                    .iter()
                    .map(|stage| StageSummary {
                        stage: stage.name,
                        status: stage.status,
                        notes: stage.notes.clone(),
                        execution_time_ms: stage.execution_time_ms,
                    })
                    .collect(),
                progress: progress.events(),
                execution_time_ms: outcome.execution_time_ms,
                report: outcome.report,
            };
            (StatusCode::OK, Json(ApiResponse::success(response)))
        }
        Err(e) if e.is_fatal() => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(e.to_string())),
        ),
        Err(e) => {
            error!(error = %e, "Research run failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("Research failed: {}", e))),
            )
        }
    }
}

/// =============================
/// Audit Endpoint
/// =============================

async fn get_run(
    State(state): State<ApiState>,
    Path(run_id): Path<Uuid>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.pipeline.run_log().get(run_id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(ApiResponse::success(record))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Run {} not found", run_id))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(pipeline: Arc<ResearchPipeline>) -> Router {
    let state = ApiState { pipeline };

    Router::new()
        .route("/health", get(health))
        .route("/api/research", post(run_research))
        .route("/api/runs/:run_id", get(get_run))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    pipeline: Arc<ResearchPipeline>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(pipeline);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
