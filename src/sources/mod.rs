//! Source adapters
//!
//! Each adapter wraps exactly one external capability and never fails past
//! its boundary: transport and parsing problems come back as a
//! `SourceResult` with `Error` status, "nothing found" as `Empty`.

use crate::config::ResearchConfig;
use crate::models::{SourceId, SourceResult};
use crate::Result;
use std::sync::Arc;

pub mod serpapi;

pub use serpapi::{
    DemographicAdapter, LocalBusinessAdapter, NewsAdapter, SerpApiClient, TrendSignalAdapter,
    WebSearchAdapter,
};

/// Top-N caps applied to list-shaped payloads
pub const MAX_LISTINGS: usize = 10;
pub const MAX_SEARCH_HITS: usize = 5;
pub const MAX_NEWS_ITEMS: usize = 5;
pub const MAX_DEMOGRAPHIC_HITS: usize = 5;
pub const MAX_TREND_TERMS: usize = 5;

/// Placeholder used when a location-bound source gets no location
pub const NO_LOCATION_PLACEHOLDER: &str =
    "No specific location was provided, so location-specific data could not be gathered.";

/// Parameters for one adapter call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceParams {
    pub query: String,
    pub location: Option<String>,
    pub topic: Option<String>,
}

impl SourceParams {
    /// Plain query-string parameters
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            location: None,
            topic: None,
        }
    }

    /// `(location, topic)` parameters; the query string is derived from both
    pub fn located(location: Option<String>, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        let query = match &location {
            Some(location) => format!("{} {}", topic, location),
            None => topic.clone(),
        };

        Self {
            query,
            location,
            topic: Some(topic),
        }
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }
}

/// One external data capability
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    fn id(&self) -> SourceId;
    fn description(&self) -> &'static str;

    /// Infallible by contract: every failure is folded into the result
    async fn fetch(&self, params: &SourceParams) -> SourceResult;
}

/// The fixed set of adapters a pipeline runs with
#[derive(Clone)]
pub struct SourceSet {
    pub local_business: Arc<dyn SourceAdapter>,
    pub web_search: Arc<dyn SourceAdapter>,
    pub trend_signal: Arc<dyn SourceAdapter>,
    pub news: Arc<dyn SourceAdapter>,
    pub demographic: Arc<dyn SourceAdapter>,
}

impl SourceSet {
    pub fn get(&self, id: SourceId) -> &Arc<dyn SourceAdapter> {
        match id {
            SourceId::LocalBusiness => &self.local_business,
            SourceId::WebSearch => &self.web_search,
            SourceId::TrendSignal => &self.trend_signal,
            SourceId::News => &self.news,
            SourceId::Demographic => &self.demographic,
        }
    }

    pub fn list(&self) -> Vec<(SourceId, &'static str)> {
        [
            &self.local_business,
            &self.web_search,
            &self.trend_signal,
            &self.news,
            &self.demographic,
        ]
        .iter()
        .map(|adapter| (adapter.id(), adapter.description()))
        .collect()
    }
}

/// Create the SerpApi-backed adapter set from configuration
pub fn create_default_sources(config: &ResearchConfig) -> Result<SourceSet> {
    let client = SerpApiClient::new(
        config.serpapi_api_key.clone(),
        config.serpapi_base_url.clone(),
        config.http_timeout,
    )?;

    Ok(SourceSet {
        local_business: Arc::new(LocalBusinessAdapter::new(client.clone())),
        web_search: Arc::new(WebSearchAdapter::new(client.clone())),
        trend_signal: Arc::new(TrendSignalAdapter::new(client.clone())),
        news: Arc::new(NewsAdapter::new(client.clone())),
        demographic: Arc::new(DemographicAdapter::new(client)),
    })
}
