//! Market Research Orchestrator
//!
//! Turns a one-line business idea into a structured market research report:
//! - Parses the idea into a business type and an optional location
//! - Fetches search-provider data through failure-contained source adapters
//! - Runs a fixed DAG of synthesis stages, each seeing only its declared inputs
//! - Assembles a fixed-order report, degraded rather than aborted on failures
//! - Keeps an auditable record of what every stage ran on
//!
//! PIPELINE:
//! INPUT → PARSE → FETCH → SYNTHESIZE (per stage level) → ASSEMBLE

pub mod api;
pub mod audit;
pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod query;
pub mod report;
pub mod sources;
pub mod synthesis;

#[cfg(test)]
mod testing;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use pipeline::ResearchPipeline;
pub use query::QueryParser;
