//! Core data models for the research pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Query =================
//

/// Structured form of the user's business idea. Derived once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub raw_text: String,
    pub business_type: String,
    pub location: Option<String>,
}

impl Query {
    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }

    /// "Gym in Coimbatore" style label, or just the business type
    pub fn subject(&self) -> String {
        match &self.location {
            Some(location) => format!("{} in {}", self.business_type, location),
            None => self.business_type.clone(),
        }
    }
}

//
// ================= Sources =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    LocalBusiness,
    WebSearch,
    TrendSignal,
    News,
    Demographic,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::LocalBusiness => "local_business",
            SourceId::WebSearch => "web_search",
            SourceId::TrendSignal => "trend_signal",
            SourceId::News => "news",
            SourceId::Demographic => "demographic",
        }
    }

    /// Human wording used in fallback text
    pub fn label(&self) -> &'static str {
        match self {
            SourceId::LocalBusiness => "local business lookup",
            SourceId::WebSearch => "web search",
            SourceId::TrendSignal => "search trend lookup",
            SourceId::News => "local news lookup",
            SourceId::Demographic => "demographic lookup",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Ok,
    Empty,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalBusiness {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: Option<f64>,
    pub reviews: Option<u64>,
    pub category: Option<String>,
    pub hours: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub source: Option<String>,
    pub date: Option<String>,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendSignal {
    pub keyword: String,
    pub direction: TrendDirection,
    pub current_interest: u32,
    pub peak_interest: u32,
    pub rising_terms: Vec<String>,
    pub top_terms: Vec<String>,
}

/// One normalized record from a list-shaped source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Business(LocalBusiness),
    SearchHit(SearchHit),
    News(NewsItem),
    Trend(TrendSignal),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Payload {
    Records(Vec<Record>),
    Text(String),
}

/// Normalized, failure-contained result of one adapter call.
///
/// Fields are private so that an `Error` result can only ever carry a
/// diagnostic text payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceResult {
    source_id: SourceId,
    status: SourceStatus,
    payload: Payload,
    fetched_at: DateTime<Utc>,
    #[serde(default)]
    resolved_seq: u64,
}

impl SourceResult {
    /// Records found; an empty list resolves to `Empty`
    pub fn records(source_id: SourceId, records: Vec<Record>) -> Self {
        let status = if records.is_empty() {
            SourceStatus::Empty
        } else {
            SourceStatus::Ok
        };

        Self {
            source_id,
            status,
            payload: Payload::Records(records),
            fetched_at: Utc::now(),
            resolved_seq: 0,
        }
    }

    /// Reachable source that had nothing to say; `reason` is shown downstream
    pub fn empty(source_id: SourceId, reason: impl Into<String>) -> Self {
        Self {
            source_id,
            status: SourceStatus::Empty,
            payload: Payload::Text(reason.into()),
            fetched_at: Utc::now(),
            resolved_seq: 0,
        }
    }

    pub fn error(source_id: SourceId, diagnostic: impl Into<String>) -> Self {
        Self {
            source_id,
            status: SourceStatus::Error,
            payload: Payload::Text(diagnostic.into()),
            fetched_at: Utc::now(),
            resolved_seq: 0,
        }
    }

    pub fn source_id(&self) -> SourceId {
        self.source_id
    }

    pub fn status(&self) -> SourceStatus {
        self.status
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Logical-clock stamp assigned when the orchestrator recorded this result
    pub fn resolved_seq(&self) -> u64 {
        self.resolved_seq
    }

    pub(crate) fn stamped(mut self, seq: u64) -> Self {
        self.resolved_seq = seq;
        self
    }

    pub fn record_list(&self) -> &[Record] {
        match &self.payload {
            Payload::Records(records) => records,
            Payload::Text(_) => &[],
        }
    }

    /// Diagnostic or reason text for `Empty`/`Error` results
    pub fn message(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            Payload::Records(_) => None,
        }
    }
}

//
// ================= Stages =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    LocalMarket,
    Trends,
    Competitor,
    MarketAssessment,
    Recommendations,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::LocalMarket => "local_market",
            StageName::Trends => "trends",
            StageName::Competitor => "competitor",
            StageName::MarketAssessment => "market_assessment",
            StageName::Recommendations => "recommendations",
        }
    }

    /// Progress wording shown while the stage runs
    pub fn activity(&self) -> &'static str {
        match self {
            StageName::LocalMarket => "Gathering local market data",
            StageName::Trends => "Identifying market trends",
            StageName::Competitor => "Analyzing competitors",
            StageName::MarketAssessment => "Conducting market analysis",
            StageName::Recommendations => "Drafting recommendations",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared dependency of a stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum InputRef {
    Source(SourceId),
    Stage(StageName),
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputRef::Source(id) => write!(f, "source:{}", id),
            InputRef::Stage(name) => write!(f, "stage:{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Done,
    Degraded,
}

impl StageStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StageStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub name: StageName,
    pub declared_inputs: Vec<InputRef>,
    pub status: StageStatus,
    pub output_text: String,
    /// Why the stage degraded, one line per cause
    pub notes: Vec<String>,
    /// False when `output_text` is a synthesis diagnostic rather than analysis
    pub synthesized: bool,
    /// SHA-256 of the input snapshot the stage ran on
    pub input_digest: String,
    pub started_seq: u64,
    pub finished_seq: u64,
    pub execution_time_ms: u64,
}

impl Stage {
    pub fn pending(name: StageName, declared_inputs: Vec<InputRef>) -> Self {
        Self {
            name,
            declared_inputs,
            status: StageStatus::Pending,
            output_text: String::new(),
            notes: Vec::new(),
            synthesized: false,
            input_digest: String::new(),
            started_seq: 0,
            finished_seq: 0,
            execution_time_ms: 0,
        }
    }
}

//
// ================= Report =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    pub heading: String,
    pub body: String,
}

/// Final document. Sections can only be appended while the assembler builds it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    title: String,
    sections: Vec<Section>,
    generated_at: DateTime<Utc>,
}

impl Report {
    pub(crate) fn new(title: String, generated_at: DateTime<Utc>) -> Self {
        Self {
            title,
            sections: Vec::new(),
            generated_at,
        }
    }

    pub(crate) fn push_section(&mut self, heading: impl Into<String>, body: impl Into<String>) {
        self.sections.push(Section {
            heading: heading.into(),
            body: body.into(),
        });
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn section(&self, heading: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.heading == heading)
    }
}

//
// ================= Run I/O =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryKind {
    MissingLocation,
    DegradedStages,
}

/// Non-blocking notice for the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Advisory {
    pub kind: AdvisoryKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    pub label: String,
    pub stage: Option<StageName>,
    /// Completion fraction in `0.0..=1.0`
    pub fraction: f32,
}

/// Everything a completed run hands back to the caller
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub query: Query,
    pub report: Report,
    pub stages: Vec<Stage>,
    pub sources: Vec<SourceResult>,
    pub advisories: Vec<Advisory>,
    pub execution_time_ms: u64,
}

impl RunOutcome {
    pub fn stage(&self, name: StageName) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }
}
