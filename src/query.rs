//! Query Parser
//!
//! Splits a free-text business idea into a business type and an optional
//! location using a fixed set of locative connectors:
//! - "<X> in <Y>"
//! - "<X> at <Y>"
//! - "<X> for <Y>"
//!
//! Pure and total: an idea without a location is a valid result.

use crate::models::Query;
use lazy_static::lazy_static;
use regex::Regex;

/// Connectors in priority order
const CONNECTORS: &[&str] = &["in", "at", "for"];

/// Captures that look like a location but are only a determiner/pronoun
const STOPWORDS: &[&str] = &["the", "a", "an", "my", "our", "your", "their"];

lazy_static! {
    static ref CONNECTOR_RE: Regex = Regex::new(r"(?i)\b(in|at|for)\s+").unwrap();
    static ref LOCATION_RE: Regex =
        Regex::new(r"^[\p{L}\s]+(?:,\s*[\p{L}\s]+)?").unwrap();
}

/// One "<connector> <location>" occurrence inside a text
#[derive(Debug, Clone, PartialEq, Eq)]
struct Locative {
    connector: String,
    start: usize,
    location: String,
}

pub struct QueryParser;

impl QueryParser {
    /// Parse a raw business idea
    pub fn parse(raw_text: &str) -> Query {
        let (business_type, location) = match Self::split(raw_text) {
            Some((business_type, location)) => (business_type, Some(location)),
            None => (raw_text.to_string(), None),
        };

        Query {
            raw_text: raw_text.to_string(),
            business_type,
            location,
        }
    }

    /// Extract only the location
    pub fn extract_location(raw_text: &str) -> Option<String> {
        Self::split(raw_text).map(|(_, location)| location)
    }

    fn split(text: &str) -> Option<(String, String)> {
        let usable: Vec<Locative> = locatives(text)
            .into_iter()
            .filter(|l| !business_type_for(text, l).is_empty())
            .collect();

        // First connector in priority order wins
        let preferred = CONNECTORS.iter().find_map(|connector| {
            usable
                .iter()
                .find(|l| l.connector == *connector)
                .cloned()
        })?;

        let business_type = business_type_for(text, &preferred);

        // A business type that would itself split again ("consulting for
        // startups" out of "consulting for startups in Texas") falls back to
        // the leftmost split, whose prefix can never split again.
        if Self::has_usable_locative(&business_type) {
            let leftmost = usable.iter().min_by_key(|l| l.start)?;
            let fallback = business_type_for(text, leftmost);
            if Self::has_usable_locative(&fallback) {
                return None;
            }
            return Some((fallback, leftmost.location.clone()));
        }

        Some((business_type, preferred.location))
    }

    fn has_usable_locative(text: &str) -> bool {
        locatives(text)
            .iter()
            .any(|l| !business_type_for(text, l).is_empty())
    }
}

/// All acceptable locatives, in text order
fn locatives(text: &str) -> Vec<Locative> {
    CONNECTOR_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let connector = caps.get(1)?.as_str().to_lowercase();
            let location = LOCATION_RE
                .find(&text[whole.end()..])
                .map(|m| m.as_str().trim().to_string())?;

            if !is_acceptable_location(&location) {
                return None;
            }

            Some(Locative {
                connector,
                start: whole.start(),
                location,
            })
        })
        .collect()
}

fn is_acceptable_location(location: &str) -> bool {
    if location.is_empty() {
        return false;
    }
    let lowered = location.to_lowercase();
    !STOPWORDS.iter().any(|stop| *stop == lowered)
}

/// Text before the locative; when that is empty, retry removing
/// "<connector> <location>" for each connector in priority order.
fn business_type_for(text: &str, locative: &Locative) -> String {
    let prefix = text[..locative.start].trim();
    if !prefix.is_empty() {
        return prefix.to_string();
    }

    for connector in CONNECTORS {
        // Matched against the original text so offsets stay on char boundaries
        let Some(needle) = locative_pattern(connector, &locative.location) else {
            continue;
        };
        if let Some(found) = needle.find(text) {
            let remainder = text[..found.start()].trim();
            if !remainder.is_empty() {
                return remainder.to_string();
            }
        }
    }

    String::new()
}

fn locative_pattern(connector: &str, location: &str) -> Option<Regex> {
    Regex::new(&format!(
        r"(?i)\b{}\s+{}",
        connector,
        regex::escape(location)
    ))
    .ok()
}
