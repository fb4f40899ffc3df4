//! Report assembly
//!
//! Pure and total: stage outputs go in, a fixed-order report comes out.

use crate::models::{Query, Report, Stage, StageName};
use chrono::{DateTime, Utc};

pub const EXECUTIVE_SUMMARY: &str = "Executive Summary";
pub const CONCLUSION: &str = "Conclusion";

/// Stage-backed sections, in report order
pub const STAGE_SECTIONS: &[(StageName, &str)] = &[
    (StageName::MarketAssessment, "Market Assessment"),
    (StageName::Competitor, "Competitor Analysis"),
    (StageName::Trends, "Market Trends"),
    (StageName::Recommendations, "Recommendations"),
];

pub struct ReportAssembler;

impl ReportAssembler {
    pub fn assemble(query: &Query, stages: &[Stage]) -> Report {
        Self::assemble_at(query, stages, Utc::now())
    }

    pub fn assemble_at(query: &Query, stages: &[Stage], generated_at: DateTime<Utc>) -> Report {
        let mut report = Report::new(
            format!("Market Research Report: {}", query.subject()),
            generated_at,
        );

        report.push_section(
            EXECUTIVE_SUMMARY,
            format!(
                "This report provides a comprehensive market analysis for the business idea: **{}**.\n\
                 The analysis includes market size estimation, competitor analysis, trend identification, \
                 and overall market assessment.",
                query.raw_text
            ),
        );

        for (name, heading) in STAGE_SECTIONS {
            let body = match stages.iter().find(|stage| stage.name == *name) {
                Some(stage) if stage.status.is_terminal() => stage.output_text.clone(),
                _ => format!(
                    "Section unavailable: the {} stage did not produce output for this run.",
                    name.as_str().replace('_', " ")
                ),
            };
            report.push_section(*heading, body);
        }

        report.push_section(
            CONCLUSION,
            "This report provides initial insights to guide business planning. \
             Further in-depth research is recommended for specific areas of interest identified in this report.",
        );

        report
    }
}

/// Markdown rendering for the presentation layers
pub fn render_markdown(report: &Report) -> String {
    let mut out = format!("# {}\n\n", report.title());

    for section in report.sections() {
        out.push_str(&format!("## {}\n{}\n\n", section.heading, section.body.trim()));
    }

    out.push_str(&format!(
        "*Generated on: {}*\n",
        report.generated_at().format("%Y-%m-%d")
    ));
    out
}
