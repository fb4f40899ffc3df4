//! Offline adapters and backends shared by the orchestration tests

use crate::backend::{GenerationRequest, TextBackend};
use crate::error::ResearchError;
use crate::models::{LocalBusiness, NewsItem, Record, SearchHit, SourceId, SourceResult, TrendDirection, TrendSignal};
use crate::sources::{SourceAdapter, SourceParams, SourceSet};
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn listings(names: &[&str]) -> Vec<Record> {
    names
        .iter()
        .map(|name| {
            Record::Business(LocalBusiness {
                name: name.to_string(),
                address: Some("Coimbatore".to_string()),
                phone: None,
                website: None,
                rating: Some(4.2),
                reviews: Some(120),
                category: None,
                hours: None,
                description: None,
            })
        })
        .collect()
}

fn sample_records(id: SourceId) -> Vec<Record> {
    match id {
        SourceId::LocalBusiness => listings(&["Iron Gym"]),
        SourceId::WebSearch | SourceId::Demographic => vec![Record::SearchHit(SearchHit {
            title: format!("{} result", id),
            link: "https://example.com".to_string(),
            snippet: Some("figures".to_string()),
        })],
        SourceId::News => vec![Record::News(NewsItem {
            title: "New fitness centre opens".to_string(),
            link: "https://example.com/news".to_string(),
            source: Some("Local Times".to_string()),
            date: None,
            snippet: None,
        })],
        SourceId::TrendSignal => vec![Record::Trend(TrendSignal {
            keyword: "Gym".to_string(),
            direction: TrendDirection::Increasing,
            current_interest: 80,
            peak_interest: 100,
            rising_terms: vec![],
            top_terms: vec![],
        })],
    }
}

/// Returns a canned result, optionally after a delay, and counts calls
pub struct StaticAdapter {
    id: SourceId,
    result: SourceResult,
    delay: Duration,
    calls: AtomicUsize,
    seen: Mutex<Vec<SourceParams>>,
}

impl StaticAdapter {
    pub fn returning(result: SourceResult) -> Arc<Self> {
        Arc::new(Self {
            id: result.source_id(),
            result,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn healthy(id: SourceId) -> Arc<Self> {
        Self::returning(SourceResult::records(id, sample_records(id)))
    }

    pub fn slow(id: SourceId, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id,
            result: SourceResult::records(id, sample_records(id)),
            delay,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SourceParams> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceAdapter for StaticAdapter {
    fn id(&self) -> SourceId {
        self.id
    }

    fn description(&self) -> &'static str {
        "canned test data"
    }

    async fn fetch(&self, params: &SourceParams) -> SourceResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(params.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

/// Healthy adapters for every source, with `overrides` swapped in by id
pub fn source_set(overrides: Vec<Arc<StaticAdapter>>) -> SourceSet {
    let pick = |id: SourceId| -> Arc<dyn SourceAdapter> {
        match overrides.iter().find(|a| a.id == id) {
            Some(adapter) => adapter.clone(),
            None => StaticAdapter::healthy(id),
        }
    };

    SourceSet {
        local_business: pick(SourceId::LocalBusiness),
        web_search: pick(SourceId::WebSearch),
        trend_signal: pick(SourceId::TrendSignal),
        news: pick(SourceId::News),
        demographic: pick(SourceId::Demographic),
    }
}

/// Echoes the rendered prompt; stalls or fails for system prompts containing a marker
#[derive(Default)]
pub struct EchoBackend {
    pub stall_on: Option<&'static str>,
    pub fail_on: Option<&'static str>,
    calls: AtomicUsize,
}

impl EchoBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stalling_on(marker: &'static str) -> Arc<Self> {
        Arc::new(Self {
            stall_on: Some(marker),
            ..Self::default()
        })
    }

    pub fn failing_on(marker: &'static str) -> Arc<Self> {
        Arc::new(Self {
            fail_on: Some(marker),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextBackend for EchoBackend {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_on.is_some_and(|m| request.system.contains(m)) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.fail_on.is_some_and(|m| request.system.contains(m)) {
            return Err(ResearchError::Synthesis("model overloaded".to_string()));
        }
        Ok(format!("analysis of: {}", request.prompt))
    }
}
