//! Stage dependency graph
//!
//! The only place that knows which stage consumes what. Validated once at
//! construction: every referenced stage exists, there are no cycles, and
//! every template placeholder is backed by a declared input.

use super::prompts;
use crate::error::ResearchError;
use crate::models::{InputRef, Query, SourceId, StageName};
use crate::sources::SourceParams;
use crate::synthesis::PromptTemplate;
use crate::Result;
use std::collections::{HashMap, HashSet};

/// Bindings every stage receives from the parsed query
pub const QUERY_BINDINGS: &[&str] = &["business_idea", "business_type", "location"];

/// Text bound to `{location}` when the query has none
pub const LOCATION_NOT_PROVIDED: &str = "location not provided";

#[derive(Debug, Clone)]
pub struct StageSpec {
    pub name: StageName,
    pub inputs: Vec<InputRef>,
    pub template: PromptTemplate,
}

impl StageSpec {
    pub fn new(name: StageName, inputs: Vec<InputRef>, template: PromptTemplate) -> Self {
        Self {
            name,
            inputs,
            template,
        }
    }

    pub fn source_inputs(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.inputs.iter().filter_map(|input| match input {
            InputRef::Source(id) => Some(*id),
            InputRef::Stage(_) => None,
        })
    }

    pub fn stage_inputs(&self) -> impl Iterator<Item = StageName> + '_ {
        self.inputs.iter().filter_map(|input| match input {
            InputRef::Stage(name) => Some(*name),
            InputRef::Source(_) => None,
        })
    }
}

/// Template binding name for a declared input
pub fn binding_name(input: InputRef) -> &'static str {
    match input {
        InputRef::Source(SourceId::LocalBusiness) => "local_data",
        InputRef::Source(SourceId::Demographic) => "demographic_data",
        InputRef::Source(SourceId::TrendSignal) => "trends_data",
        InputRef::Source(SourceId::News) => "news_data",
        InputRef::Source(SourceId::WebSearch) => "web_research",
        InputRef::Stage(StageName::LocalMarket) => "local_market",
        InputRef::Stage(StageName::Trends) => "trend_analysis",
        InputRef::Stage(StageName::Competitor) => "competitor_analysis",
        InputRef::Stage(StageName::MarketAssessment) => "market_analysis",
        InputRef::Stage(StageName::Recommendations) => "recommendations",
    }
}

/// Adapter parameters for one source, derived from the parsed query
pub fn source_params(id: SourceId, query: &Query) -> SourceParams {
    let location = query.location.clone();
    match id {
        SourceId::LocalBusiness => SourceParams::query(query.subject()).with_location(location),
        SourceId::Demographic => SourceParams::located(location, "demographics"),
        SourceId::TrendSignal => SourceParams::query(query.business_type.clone()),
        SourceId::News => SourceParams::located(location, query.business_type.clone()),
        SourceId::WebSearch => SourceParams::query(format!(
            "{} industry market size growth rate",
            query.business_type
        )),
    }
}

/// Validated DAG of stages, grouped into dependency levels
#[derive(Debug, Clone)]
pub struct StageGraph {
    stages: Vec<StageSpec>,
    levels: Vec<Vec<usize>>,
}

impl StageGraph {
    pub fn new(stages: Vec<StageSpec>) -> Result<Self> {
        let index: HashMap<StageName, usize> = stages
            .iter()
            .enumerate()
            .map(|(i, spec)| (spec.name, i))
            .collect();

        if index.len() != stages.len() {
            return Err(ResearchError::InvalidGraph(
                "stage names must be unique".to_string(),
            ));
        }

        for spec in &stages {
            for dependency in spec.stage_inputs() {
                if dependency == spec.name {
                    return Err(ResearchError::InvalidGraph(format!(
                        "stage {} depends on itself",
                        spec.name
                    )));
                }
                if !index.contains_key(&dependency) {
                    return Err(ResearchError::InvalidGraph(format!(
                        "stage {} depends on unknown stage {}",
                        spec.name, dependency
                    )));
                }
            }

            let declared: HashSet<&str> = spec
                .inputs
                .iter()
                .map(|input| binding_name(*input))
                .chain(QUERY_BINDINGS.iter().copied())
                .collect();
            let undeclared: Vec<&str> = spec
                .template
                .placeholders()
                .into_iter()
                .filter(|name| !declared.contains(name))
                .collect();
            if !undeclared.is_empty() {
                return Err(ResearchError::InvalidGraph(format!(
                    "stage {} reads undeclared inputs: {}",
                    spec.name,
                    undeclared.join(", ")
                )));
            }
        }

        let levels = dependency_levels(&stages, &index)?;
        Ok(Self { stages, levels })
    }

    /// Stages grouped so that every stage's dependencies sit in earlier groups
    pub fn levels(&self) -> Vec<Vec<&StageSpec>> {
        self.levels
            .iter()
            .map(|level| level.iter().map(|&i| &self.stages[i]).collect())
            .collect()
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    pub fn spec(&self, name: StageName) -> Option<&StageSpec> {
        self.stages.iter().find(|spec| spec.name == name)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Kahn's algorithm, one level at a time
fn dependency_levels(
    stages: &[StageSpec],
    index: &HashMap<StageName, usize>,
) -> Result<Vec<Vec<usize>>> {
    let mut remaining: Vec<usize> = stages
        .iter()
        .map(|spec| spec.stage_inputs().collect::<HashSet<_>>().len())
        .collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); stages.len()];
    for (i, spec) in stages.iter().enumerate() {
        for dependency in spec.stage_inputs().collect::<HashSet<_>>() {
            dependents[index[&dependency]].push(i);
        }
    }

    let mut levels = Vec::new();
    let mut current: Vec<usize> = (0..stages.len()).filter(|&i| remaining[i] == 0).collect();
    let mut placed = 0;

    while !current.is_empty() {
        placed += current.len();
        let mut next = Vec::new();
        for &i in &current {
            for &dependent in &dependents[i] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        next.sort_unstable();
        levels.push(current);
        current = next;
    }

    if placed != stages.len() {
        return Err(ResearchError::InvalidGraph(
            "stage graph contains a cycle".to_string(),
        ));
    }

    Ok(levels)
}

/// The market research graph
pub fn market_research_graph() -> Result<StageGraph> {
    use InputRef::{Source, Stage};

    StageGraph::new(vec![
        StageSpec::new(
            StageName::LocalMarket,
            vec![Source(SourceId::LocalBusiness), Source(SourceId::Demographic)],
            prompts::LOCAL_MARKET,
        ),
        StageSpec::new(
            StageName::Trends,
            vec![Source(SourceId::TrendSignal), Source(SourceId::News)],
            prompts::TRENDS,
        ),
        StageSpec::new(
            StageName::Competitor,
            vec![Stage(StageName::LocalMarket)],
            prompts::COMPETITOR,
        ),
        StageSpec::new(
            StageName::MarketAssessment,
            vec![
                Stage(StageName::LocalMarket),
                Stage(StageName::Trends),
                Source(SourceId::WebSearch),
            ],
            prompts::MARKET_ASSESSMENT,
        ),
        StageSpec::new(
            StageName::Recommendations,
            vec![
                Stage(StageName::MarketAssessment),
                Stage(StageName::Competitor),
                Stage(StageName::Trends),
            ],
            prompts::RECOMMENDATIONS,
        ),
    ])
}
