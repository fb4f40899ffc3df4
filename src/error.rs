//! Error types for the market research orchestrator

use thiserror::Error;

/// Result type alias for research operations
pub type Result<T> = std::result::Result<T, ResearchError>;

#[derive(Error, Debug)]
pub enum ResearchError {

    // =============================
    // Fatal, pre-run errors
    // =============================

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid stage graph: {0}")]
    InvalidGraph(String),

    // =============================
    // Contained errors (mapped to statuses at their boundary)
    // =============================

    #[error("Source error: {0}")]
    Source(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Template error: {0}")]
    Template(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ResearchError {
    /// Errors that must stop a run before any stage executes
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ResearchError::PreconditionFailed(_)
                | ResearchError::InvalidQuery(_)
                | ResearchError::Config(_)
                | ResearchError::InvalidGraph(_)
        )
    }
}
