//! Stage input snapshots
//!
//! Turns resolved source results and upstream stage outputs into the exact
//! text a stage is allowed to see. Missing data is spelled out so the
//! backend is never handed silence it could fill with invented figures.

use super::graph::{binding_name, StageSpec, LOCATION_NOT_PROVIDED};
use crate::models::{
    InputRef, LocalBusiness, NewsItem, Query, Record, SearchHit, SourceResult, SourceStatus,
    Stage, StageStatus, TrendDirection, TrendSignal,
};
use crate::synthesis::ContextBindings;
use serde::Serialize;
use std::collections::HashMap;

/// One declared input as the stage saw it
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InputSnapshot {
    pub input: InputRef,
    pub usable: bool,
    pub text: String,
    /// Set when the input forces the stage into `Degraded`
    pub note: Option<String>,
}

/// Everything one stage ran on; hashed into the stage's input digest
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StageSnapshot {
    pub query: Query,
    pub inputs: Vec<InputSnapshot>,
}

impl StageSnapshot {
    /// Build from the declared inputs only; `sources` and `stages` may hold more
    pub fn build(
        spec: &StageSpec,
        query: &Query,
        sources: &HashMap<crate::models::SourceId, SourceResult>,
        stages: &HashMap<crate::models::StageName, Stage>,
    ) -> Self {
        let inputs = spec
            .inputs
            .iter()
            .map(|input| match input {
                InputRef::Source(id) => match sources.get(id) {
                    Some(result) => source_snapshot(*input, result),
                    None => missing_snapshot(*input),
                },
                InputRef::Stage(name) => match stages.get(name) {
                    Some(stage) if stage.status.is_terminal() => stage_snapshot(*input, stage),
                    _ => missing_snapshot(*input),
                },
            })
            .collect();

        Self {
            query: query.clone(),
            inputs,
        }
    }

    pub fn notes(&self) -> Vec<String> {
        self.inputs.iter().filter_map(|i| i.note.clone()).collect()
    }

    pub fn bindings(&self) -> ContextBindings {
        let mut bindings = ContextBindings::new()
            .bind("business_idea", self.query.raw_text.clone())
            .bind("business_type", self.query.business_type.clone())
            .bind(
                "location",
                self.query
                    .location
                    .clone()
                    .unwrap_or_else(|| LOCATION_NOT_PROVIDED.to_string()),
            );

        for input in &self.inputs {
            bindings.insert(binding_name(input.input), input.text.clone());
        }

        bindings
    }
}

fn source_snapshot(input: InputRef, result: &SourceResult) -> InputSnapshot {
    let label = result.source_id().label();
    match result.status() {
        SourceStatus::Ok => InputSnapshot {
            input,
            usable: true,
            text: render_records(result.record_list()),
            note: None,
        },
        SourceStatus::Empty => {
            let detail = result.message().unwrap_or("the query matched nothing");
            InputSnapshot {
                input,
                usable: false,
                text: format!(
                    "No data found: the {} returned no results. {} \
                     State that this information is unavailable instead of estimating it.",
                    label, detail
                ),
                note: Some(format!("{} returned no data", label)),
            }
        }
        SourceStatus::Error => {
            let diagnostic = result.message().unwrap_or("unknown error");
            InputSnapshot {
                input,
                usable: false,
                text: format!(
                    "Data unavailable: the {} failed ({}). \
                     Do not invent figures for this area; say the data could not be retrieved.",
                    label, diagnostic
                ),
                note: Some(format!("{} failed: {}", label, diagnostic)),
            }
        }
    }
}

fn stage_snapshot(input: InputRef, stage: &Stage) -> InputSnapshot {
    // An upstream diagnostic is passed on verbatim but degrades the consumer
    let note = if stage.synthesized {
        None
    } else {
        Some(format!("upstream stage {} produced no analysis", stage.name))
    };

    InputSnapshot {
        input,
        usable: stage.synthesized,
        text: stage.output_text.clone(),
        note,
    }
}

fn missing_snapshot(input: InputRef) -> InputSnapshot {
    InputSnapshot {
        input,
        usable: false,
        text: format!(
            "Data unavailable: {} did not resolve during this run.",
            input
        ),
        note: Some(format!("{} did not resolve", input)),
    }
}

/// Status a stage resolves to given its snapshot and synthesis outcome
pub fn resolve_status(notes: &[String]) -> StageStatus {
    if notes.is_empty() {
        StageStatus::Done
    } else {
        StageStatus::Degraded
    }
}

//
// ================= Record rendering =================
//

pub fn render_records(records: &[Record]) -> String {
    let businesses: Vec<&LocalBusiness> = records
        .iter()
        .filter_map(|r| match r {
            Record::Business(b) => Some(b),
            _ => None,
        })
        .collect();

    let mut out = String::new();
    if !businesses.is_empty() {
        out.push_str(&format!(
            "Found {} local businesses matching the query.\n\n",
            businesses.len()
        ));
    }

    let mut business_index = 0;
    for record in records {
        match record {
            Record::Business(business) => {
                business_index += 1;
                out.push_str(&render_business(business_index, business));
            }
            Record::SearchHit(hit) => out.push_str(&render_hit(hit)),
            Record::News(item) => out.push_str(&render_news(item)),
            Record::Trend(signal) => out.push_str(&render_trend(signal)),
        }
    }

    out.trim_end().to_string()
}

fn render_business(index: usize, business: &LocalBusiness) -> String {
    let mut out = format!("### {}. {}\n", index, business.name);
    if let Some(address) = &business.address {
        out.push_str(&format!("**Address:** {}\n", address));
    }
    if let Some(phone) = &business.phone {
        out.push_str(&format!("**Phone:** {}\n", phone));
    }
    if let Some(website) = &business.website {
        out.push_str(&format!("**Website:** {}\n", website));
    }
    if let Some(rating) = business.rating {
        out.push_str(&format!(
            "**Rating:** {} ({} reviews)\n",
            rating,
            business.reviews.unwrap_or(0)
        ));
    }
    if let Some(category) = &business.category {
        out.push_str(&format!("**Type:** {}\n", category));
    }
    if let Some(hours) = &business.hours {
        out.push_str(&format!("**Hours:** {}\n", hours));
    }
    if let Some(description) = &business.description {
        out.push_str(&format!("**Description:** {}\n", description));
    }
    out.push('\n');
    out
}

fn render_hit(hit: &SearchHit) -> String {
    match &hit.snippet {
        Some(snippet) => format!("- {}: {} ({})\n", hit.title, snippet, hit.link),
        None => format!("- {} ({})\n", hit.title, hit.link),
    }
}

fn render_news(item: &NewsItem) -> String {
    let origin = match (&item.source, &item.date) {
        (Some(source), Some(date)) => format!(" [{}, {}]", source, date),
        (Some(source), None) => format!(" [{}]", source),
        (None, Some(date)) => format!(" [{}]", date),
        (None, None) => String::new(),
    };
    let snippet = item
        .snippet
        .as_deref()
        .map(|s| format!(": {}", s))
        .unwrap_or_default();

    format!("- {}{}{}\n", item.title, origin, snippet)
}

fn render_trend(signal: &TrendSignal) -> String {
    let direction = match signal.direction {
        TrendDirection::Increasing => "increasing",
        TrendDirection::Decreasing => "decreasing",
        TrendDirection::Stable => "stable",
    };

    let mut out = format!(
        "Search interest in '{}' over the last 12 months is {} (current {}/100, peak {}/100).\n",
        signal.keyword, direction, signal.current_interest, signal.peak_interest
    );
    if !signal.rising_terms.is_empty() {
        out.push_str(&format!("Rising related searches: {}\n", signal.rising_terms.join(", ")));
    }
    if !signal.top_terms.is_empty() {
        out.push_str(&format!("Top related searches: {}\n", signal.top_terms.join(", ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SourceId, StageName};
    use crate::orchestrator::graph::market_research_graph;
    use crate::query::QueryParser;

    fn business(name: &str) -> Record {
        Record::Business(LocalBusiness {
            name: name.to_string(),
            address: Some("Gandhipuram, Coimbatore".to_string()),
            phone: None,
            website: None,
            rating: Some(4.4),
            reviews: Some(210),
            category: Some("Gym".to_string()),
            hours: None,
            description: None,
        })
    }

    #[test]
    fn test_render_listings() {
        let text = render_records(&[business("Iron Gym"), business("Fit Hub")]);

        assert!(text.starts_with("Found 2 local businesses"));
        assert!(text.contains("### 1. Iron Gym"));
        assert!(text.contains("### 2. Fit Hub"));
        assert!(text.contains("**Rating:** 4.4 (210 reviews)"));
        assert!(!text.contains("**Phone:**"));
    }

    #[test]
    fn test_snapshot_distinguishes_empty_from_error() {
        let graph = market_research_graph().unwrap();
        let spec = graph.spec(StageName::LocalMarket).unwrap();
        let query = QueryParser::parse("Gym in Coimbatore");

        let mut sources = HashMap::new();
        sources.insert(
            SourceId::LocalBusiness,
            SourceResult::records(SourceId::LocalBusiness, vec![]),
        );
        sources.insert(
            SourceId::Demographic,
            SourceResult::error(SourceId::Demographic, "connection refused"),
        );

        let snapshot = StageSnapshot::build(spec, &query, &sources, &HashMap::new());
        let bindings = snapshot.bindings();

        assert!(bindings.get("local_data").unwrap().starts_with("No data found"));
        assert!(bindings.get("demographic_data").unwrap().starts_with("Data unavailable"));
        assert!(bindings.get("demographic_data").unwrap().contains("connection refused"));
        assert_eq!(snapshot.notes().len(), 2);
        assert_eq!(resolve_status(&snapshot.notes()), StageStatus::Degraded);
    }

    #[test]
    fn test_snapshot_only_contains_declared_inputs() {
        let graph = market_research_graph().unwrap();
        let spec = graph.spec(StageName::Competitor).unwrap();
        let query = QueryParser::parse("Gym in Coimbatore");

        let mut local_market = Stage::pending(StageName::LocalMarket, vec![]);
        local_market.status = StageStatus::Done;
        local_market.synthesized = true;
        local_market.output_text = "Ten gyms nearby".to_string();

        let mut trends = Stage::pending(StageName::Trends, vec![]);
        trends.status = StageStatus::Done;
        trends.synthesized = true;
        trends.output_text = "Rising interest".to_string();

        let mut stages = HashMap::new();
        stages.insert(StageName::LocalMarket, local_market);
        stages.insert(StageName::Trends, trends);

        let snapshot = StageSnapshot::build(spec, &query, &HashMap::new(), &stages);
        assert_eq!(snapshot.inputs.len(), 1);

        let bindings = snapshot.bindings();
        assert_eq!(bindings.get("local_market"), Some("Ten gyms nearby"));
        assert!(bindings.get("trend_analysis").is_none());
        assert!(snapshot.notes().is_empty());
    }

    #[test]
    fn test_missing_location_placeholder() {
        let graph = market_research_graph().unwrap();
        let spec = graph.spec(StageName::Trends).unwrap();
        let query = QueryParser::parse("Online pet store");

        let snapshot = StageSnapshot::build(spec, &query, &HashMap::new(), &HashMap::new());
        assert_eq!(snapshot.bindings().get("location"), Some(LOCATION_NOT_PROVIDED));
    }
}
