//! SerpApi-backed adapters
//!
//! One pooled HTTP client, five capabilities. The raw provider JSON never
//! leaves this module: every adapter normalizes into typed records.

use super::{
    SourceAdapter, SourceParams, MAX_DEMOGRAPHIC_HITS, MAX_LISTINGS, MAX_NEWS_ITEMS,
    MAX_SEARCH_HITS, MAX_TREND_TERMS, NO_LOCATION_PLACEHOLDER,
};
use crate::error::ResearchError;
use crate::models::{
    LocalBusiness, NewsItem, Record, SearchHit, SourceId, SourceResult, TrendDirection,
    TrendSignal,
};
use crate::Result;
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// What the provider answered, before normalization
#[derive(Debug)]
pub enum ProviderReply {
    Data(Value),
    /// Provider reachable, query matched nothing
    NoResults(String),
}

#[derive(Clone)]
pub struct SerpApiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl SerpApiClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Run one provider search with the given engine parameters
    pub async fn search(&self, params: &[(&str, String)]) -> Result<ProviderReply> {
        let url = format!("{}/search.json", self.base_url);

        let mut query: Vec<(&str, String)> = params.to_vec();
        query.push(("api_key", self.api_key.clone()));

        let response = self
            .client
            .get(url)
            .query(&query)
            .send()
            .await
            .map_err(|e| ResearchError::Source(format!("search request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| ResearchError::Source(format!("invalid JSON response: {}", e)))?;

        classify_reply(status.is_success(), status.as_u16(), body)
    }
}

/// Sort a provider body into data, "no results", or failure
fn classify_reply(success: bool, status: u16, body: Value) -> Result<ProviderReply> {
    if let Some(message) = body.get("error").and_then(Value::as_str) {
        let lowered = message.to_lowercase();
        if lowered.contains("hasn't returned any results") || lowered.contains("no results") {
            return Ok(ProviderReply::NoResults(message.to_string()));
        }
        return Err(ResearchError::Source(format!(
            "provider returned {}: {}",
            status, message
        )));
    }

    if !success {
        return Err(ResearchError::Source(format!(
            "provider returned {}: {}",
            status, body
        )));
    }

    Ok(ProviderReply::Data(body))
}

//
// ================= JSON helpers =================
//

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn number_field(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    }
}

/// `source` is a plain string on older responses, `{ "name": .. }` on newer ones
fn news_source(item: &Value) -> Option<String> {
    str_field(item, "source").or_else(|| {
        item.get("source")
            .and_then(|source| str_field(source, "name"))
    })
}

pub fn parse_local_results(body: &Value) -> Vec<Record> {
    body.get("local_results")
        .and_then(Value::as_array)
        .map(|places| {
            places
                .iter()
                .filter_map(|place| {
                    let name = str_field(place, "title")?;
                    Some(Record::Business(LocalBusiness {
                        name,
                        address: str_field(place, "address"),
                        phone: str_field(place, "phone"),
                        website: str_field(place, "website"),
                        rating: number_field(place, "rating"),
                        reviews: number_field(place, "reviews").map(|r| r as u64),
                        category: str_field(place, "type"),
                        hours: str_field(place, "hours"),
                        description: str_field(place, "description"),
                    }))
                })
                .take(MAX_LISTINGS)
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_organic_results(body: &Value, cap: usize) -> Vec<Record> {
    body.get("organic_results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(|result| {
                    Some(Record::SearchHit(SearchHit {
                        title: str_field(result, "title")?,
                        link: str_field(result, "link").unwrap_or_default(),
                        snippet: str_field(result, "snippet"),
                    }))
                })
                .take(cap)
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_news_results(body: &Value) -> Vec<Record> {
    body.get("news_results")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(Record::News(NewsItem {
                        title: str_field(item, "title")?,
                        link: str_field(item, "link").unwrap_or_default(),
                        source: news_source(item),
                        date: str_field(item, "date"),
                        snippet: str_field(item, "snippet"),
                    }))
                })
                .take(MAX_NEWS_ITEMS)
                .collect()
        })
        .unwrap_or_default()
}

/// Interest values from a 12-month timeseries, oldest first
fn interest_series(body: &Value) -> Vec<u32> {
    body.get("interest_over_time")
        .and_then(|v| v.get("timeline_data"))
        .and_then(Value::as_array)
        .map(|points| {
            points
                .iter()
                .filter_map(|point| {
                    let first = point.get("values")?.as_array()?.first()?;
                    first
                        .get("extracted_value")
                        .and_then(Value::as_f64)
                        .or_else(|| number_field(first, "value"))
                        .map(|v| v.max(0.0) as u32)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn related_terms(related: Option<&Value>, bucket: &str) -> Vec<String> {
    related
        .and_then(|body| body.get("related_queries"))
        .and_then(|queries| queries.get(bucket))
        .and_then(Value::as_array)
        .map(|terms| {
            terms
                .iter()
                .filter_map(|term| str_field(term, "query"))
                .take(MAX_TREND_TERMS)
                .collect()
        })
        .unwrap_or_default()
}

/// Summarize a trends timeseries; `None` when the series is empty
pub fn parse_trend(keyword: &str, timeseries: &Value, related: Option<&Value>) -> Option<TrendSignal> {
    let series = interest_series(timeseries);
    let current = *series.last()?;
    let peak = series.iter().copied().max().unwrap_or(current);

    // Compare against the point six samples back (or the oldest one)
    let baseline = series[series.len().saturating_sub(6)];
    let direction = if current > baseline {
        TrendDirection::Increasing
    } else if current < baseline {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    Some(TrendSignal {
        keyword: keyword.to_string(),
        direction,
        current_interest: current,
        peak_interest: peak,
        rising_terms: related_terms(related, "rising"),
        top_terms: related_terms(related, "top"),
    })
}

fn contained(id: SourceId, context: &str, outcome: Result<SourceResult>, started: Instant) -> SourceResult {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(result) => {
            debug!(source = %id, status = ?result.status(), elapsed_ms, "Source lookup finished");
            result
        }
        Err(e) => {
            warn!(source = %id, error = %e, elapsed_ms, "Source lookup failed");
            SourceResult::error(id, format!("Error {}: {}", context, e))
        }
    }
}

//
// ================= Adapters =================
//

/// Local business listings (maps search)
pub struct LocalBusinessAdapter {
    api: SerpApiClient,
}

impl LocalBusinessAdapter {
    pub fn new(api: SerpApiClient) -> Self {
        Self { api }
    }

    async fn lookup(&self, params: &SourceParams) -> Result<SourceResult> {
        if params.location.is_none() {
            return Ok(SourceResult::empty(
                SourceId::LocalBusiness,
                format!(
                    "{} Include a location in the business idea (e.g., 'coffee shop in Boston').",
                    NO_LOCATION_PLACEHOLDER
                ),
            ));
        }

        let reply = self
            .api
            .search(&[
                ("engine", "google_maps".to_string()),
                ("type", "search".to_string()),
                ("q", params.query.clone()),
            ])
            .await?;

        Ok(match reply {
            ProviderReply::Data(body) => {
                SourceResult::records(SourceId::LocalBusiness, parse_local_results(&body))
            }
            ProviderReply::NoResults(message) => SourceResult::empty(
                SourceId::LocalBusiness,
                format!("No local businesses found for {}. ({})", params.query, message),
            ),
        })
    }
}

#[async_trait::async_trait]
impl SourceAdapter for LocalBusinessAdapter {
    fn id(&self) -> SourceId {
        SourceId::LocalBusiness
    }

    fn description(&self) -> &'static str {
        "Search for local businesses and places in a specific location"
    }

    async fn fetch(&self, params: &SourceParams) -> SourceResult {
        let started = Instant::now();
        contained(self.id(), "searching local data", self.lookup(params).await, started)
    }
}

/// General web search (organic results)
pub struct WebSearchAdapter {
    api: SerpApiClient,
}

impl WebSearchAdapter {
    pub fn new(api: SerpApiClient) -> Self {
        Self { api }
    }

    async fn lookup(&self, params: &SourceParams) -> Result<SourceResult> {
        let reply = self
            .api
            .search(&[
                ("engine", "google".to_string()),
                ("q", params.query.clone()),
                ("num", "10".to_string()),
            ])
            .await?;

        Ok(match reply {
            ProviderReply::Data(body) => SourceResult::records(
                SourceId::WebSearch,
                parse_organic_results(&body, MAX_SEARCH_HITS),
            ),
            ProviderReply::NoResults(message) => SourceResult::empty(SourceId::WebSearch, message),
        })
    }
}

#[async_trait::async_trait]
impl SourceAdapter for WebSearchAdapter {
    fn id(&self) -> SourceId {
        SourceId::WebSearch
    }

    fn description(&self) -> &'static str {
        "Search the web for information about markets, companies, and trends"
    }

    async fn fetch(&self, params: &SourceParams) -> SourceResult {
        let started = Instant::now();
        contained(self.id(), "searching web", self.lookup(params).await, started)
    }
}

/// Search-interest trend over the last 12 months
pub struct TrendSignalAdapter {
    api: SerpApiClient,
}

impl TrendSignalAdapter {
    pub fn new(api: SerpApiClient) -> Self {
        Self { api }
    }

    async fn lookup(&self, params: &SourceParams) -> Result<SourceResult> {
        let reply = self
            .api
            .search(&[
                ("engine", "google_trends".to_string()),
                ("q", params.query.clone()),
                ("date", "today 12-m".to_string()),
                ("data_type", "TIMESERIES".to_string()),
            ])
            .await?;

        let timeseries = match reply {
            ProviderReply::Data(body) => body,
            ProviderReply::NoResults(message) => {
                return Ok(SourceResult::empty(SourceId::TrendSignal, message));
            }
        };

        // Related queries only enrich the signal; their failure is tolerated
        let related = match self
            .api
            .search(&[
                ("engine", "google_trends".to_string()),
                ("q", params.query.clone()),
                ("date", "today 12-m".to_string()),
                ("data_type", "RELATED_QUERIES".to_string()),
            ])
            .await
        {
            Ok(ProviderReply::Data(body)) => Some(body),
            Ok(ProviderReply::NoResults(_)) => None,
            Err(e) => {
                debug!(error = %e, "Related queries unavailable");
                None
            }
        };

        Ok(match parse_trend(&params.query, &timeseries, related.as_ref()) {
            Some(signal) => SourceResult::records(SourceId::TrendSignal, vec![Record::Trend(signal)]),
            None => SourceResult::empty(SourceId::TrendSignal, "No trend data found"),
        })
    }
}

#[async_trait::async_trait]
impl SourceAdapter for TrendSignalAdapter {
    fn id(&self) -> SourceId {
        SourceId::TrendSignal
    }

    fn description(&self) -> &'static str {
        "Analyze search-interest trends for a business idea"
    }

    async fn fetch(&self, params: &SourceParams) -> SourceResult {
        let started = Instant::now();
        contained(self.id(), "analyzing search trends", self.lookup(params).await, started)
    }
}

/// Local news about a topic in a location
pub struct NewsAdapter {
    api: SerpApiClient,
}

impl NewsAdapter {
    pub fn new(api: SerpApiClient) -> Self {
        Self { api }
    }

    async fn lookup(&self, params: &SourceParams) -> Result<SourceResult> {
        if params.location.is_none() {
            return Ok(SourceResult::empty(
                SourceId::News,
                "No specific location provided for local news analysis.",
            ));
        }

        let reply = self
            .api
            .search(&[
                ("engine", "google".to_string()),
                ("q", format!("{} news", params.query)),
                ("tbm", "nws".to_string()),
                ("num", MAX_NEWS_ITEMS.to_string()),
            ])
            .await?;

        Ok(match reply {
            ProviderReply::Data(body) => {
                SourceResult::records(SourceId::News, parse_news_results(&body))
            }
            ProviderReply::NoResults(message) => SourceResult::empty(SourceId::News, message),
        })
    }
}

#[async_trait::async_trait]
impl SourceAdapter for NewsAdapter {
    fn id(&self) -> SourceId {
        SourceId::News
    }

    fn description(&self) -> &'static str {
        "Get local news about a specific topic in a location"
    }

    async fn fetch(&self, params: &SourceParams) -> SourceResult {
        let started = Instant::now();
        contained(self.id(), "getting local news", self.lookup(params).await, started)
    }
}

/// Demographic snippets for a location
pub struct DemographicAdapter {
    api: SerpApiClient,
}

impl DemographicAdapter {
    pub fn new(api: SerpApiClient) -> Self {
        Self { api }
    }

    async fn lookup(&self, params: &SourceParams) -> Result<SourceResult> {
        let Some(location) = params.location.as_deref() else {
            return Ok(SourceResult::empty(SourceId::Demographic, NO_LOCATION_PLACEHOLDER));
        };

        let reply = self
            .api
            .search(&[
                ("engine", "google".to_string()),
                ("q", format!("{} demographics population statistics", location)),
                ("num", MAX_DEMOGRAPHIC_HITS.to_string()),
            ])
            .await?;

        Ok(match reply {
            ProviderReply::Data(body) => SourceResult::records(
                SourceId::Demographic,
                parse_organic_results(&body, MAX_DEMOGRAPHIC_HITS),
            ),
            ProviderReply::NoResults(message) => SourceResult::empty(SourceId::Demographic, message),
        })
    }
}

#[async_trait::async_trait]
impl SourceAdapter for DemographicAdapter {
    fn id(&self) -> SourceId {
        SourceId::Demographic
    }

    fn description(&self) -> &'static str {
        "Get demographic data for a location"
    }

    async fn fetch(&self, params: &SourceParams) -> SourceResult {
        let started = Instant::now();
        contained(self.id(), "getting demographic data", self.lookup(params).await, started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceStatus;
    use serde_json::json;

    fn offline_client() -> SerpApiClient {
        // Port 9 (discard) on localhost: connections are refused immediately
        SerpApiClient::new(
            "test-key".to_string(),
            "http://127.0.0.1:9".to_string(),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_local_results_caps_listings() {
        let places: Vec<Value> = (0..15)
            .map(|i| {
                json!({
                    "title": format!("Gym {}", i),
                    "address": "RS Puram, Coimbatore",
                    "rating": 4.5,
                    "reviews": 120,
                    "type": "Gym",
                })
            })
            .collect();
        let body = json!({ "local_results": places });

        let records = parse_local_results(&body);
        assert_eq!(records.len(), MAX_LISTINGS);

        match &records[0] {
            Record::Business(business) => {
                assert_eq!(business.name, "Gym 0");
                assert_eq!(business.rating, Some(4.5));
                assert_eq!(business.reviews, Some(120));
                assert_eq!(business.category.as_deref(), Some("Gym"));
                assert!(business.phone.is_none());
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_parse_local_results_skips_untitled_places() {
        let body = json!({
            "local_results": [
                { "address": "no title here" },
                { "title": "Fitness One", "reviews": "1,204" }
            ]
        });

        let records = parse_local_results(&body);
        assert_eq!(records.len(), 1);
        if let Record::Business(business) = &records[0] {
            assert_eq!(business.reviews, Some(1204));
        }
    }

    #[test]
    fn test_parse_news_accepts_both_source_shapes() {
        let body = json!({
            "news_results": [
                { "title": "A", "link": "https://a", "source": "The Hindu" },
                { "title": "B", "link": "https://b", "source": { "name": "Times of India" } }
            ]
        });

        let records = parse_news_results(&body);
        let sources: Vec<Option<String>> = records
            .iter()
            .map(|r| match r {
                Record::News(item) => item.source.clone(),
                _ => None,
            })
            .collect();

        assert_eq!(
            sources,
            vec![Some("The Hindu".to_string()), Some("Times of India".to_string())]
        );
    }

    #[test]
    fn test_parse_organic_results_caps() {
        let results: Vec<Value> = (0..8)
            .map(|i| json!({ "title": format!("Result {}", i), "link": "https://x", "snippet": "s" }))
            .collect();
        let body = json!({ "organic_results": results });

        assert_eq!(parse_organic_results(&body, MAX_SEARCH_HITS).len(), 5);
        assert!(parse_organic_results(&json!({}), MAX_SEARCH_HITS).is_empty());
    }

    #[test]
    fn test_parse_trend_direction_and_terms() {
        let points: Vec<Value> = [40, 42, 45, 50, 61, 48, 55, 70]
            .iter()
            .map(|v| json!({ "date": "d", "values": [{ "query": "gym", "extracted_value": v }] }))
            .collect();
        let timeseries = json!({ "interest_over_time": { "timeline_data": points } });
        let related = json!({
            "related_queries": {
                "rising": [{ "query": "gym near me" }, { "query": "crossfit" }],
                "top": [{ "query": "gym membership" }]
            }
        });

        let signal = parse_trend("gym", &timeseries, Some(&related)).unwrap();
        assert_eq!(signal.direction, TrendDirection::Increasing);
        assert_eq!(signal.current_interest, 70);
        assert_eq!(signal.peak_interest, 70);
        assert_eq!(signal.rising_terms, vec!["gym near me", "crossfit"]);
        assert_eq!(signal.top_terms, vec!["gym membership"]);
    }

    #[test]
    fn test_parse_trend_short_and_empty_series() {
        let timeseries = json!({ "interest_over_time": { "timeline_data": [
            { "values": [{ "value": "30" }] },
            { "values": [{ "value": "20" }] }
        ]}});
        let signal = parse_trend("bakery", &timeseries, None).unwrap();
        assert_eq!(signal.direction, TrendDirection::Decreasing);
        assert_eq!(signal.peak_interest, 30);
        assert!(signal.rising_terms.is_empty());

        assert!(parse_trend("bakery", &json!({}), None).is_none());
    }

    #[test]
    fn test_classify_reply() {
        let no_results = classify_reply(
            true,
            200,
            json!({ "error": "Google hasn't returned any results for this query." }),
        )
        .unwrap();
        assert!(matches!(no_results, ProviderReply::NoResults(_)));

        let invalid_key = classify_reply(false, 401, json!({ "error": "Invalid API key." }));
        assert!(invalid_key.is_err());

        let data = classify_reply(true, 200, json!({ "organic_results": [] })).unwrap();
        assert!(matches!(data, ProviderReply::Data(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_contained() {
        let adapter = WebSearchAdapter::new(offline_client());
        let result = adapter.fetch(&SourceParams::query("gym market size")).await;

        assert_eq!(result.status(), SourceStatus::Error);
        assert!(result.record_list().is_empty());
        assert!(result.message().unwrap().starts_with("Error searching web"));
    }

    #[tokio::test]
    async fn test_location_bound_sources_without_location_are_empty() {
        let news = NewsAdapter::new(offline_client());
        let result = news.fetch(&SourceParams::located(None, "Online pet store")).await;
        assert_eq!(result.status(), SourceStatus::Empty);

        let demographic = DemographicAdapter::new(offline_client());
        let result = demographic.fetch(&SourceParams::query("ignored")).await;
        assert_eq!(result.status(), SourceStatus::Empty);
        assert_eq!(result.message(), Some(NO_LOCATION_PLACEHOLDER));

        let listings = LocalBusinessAdapter::new(offline_client());
        let result = listings.fetch(&SourceParams::query("Online pet store")).await;
        assert_eq!(result.status(), SourceStatus::Empty);
    }
}
