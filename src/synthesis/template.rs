//! Prompt templates with named bindings

use crate::error::ResearchError;
use crate::Result;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::BTreeMap;

lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\{([a-z_][a-z0-9_]*)\}").unwrap();
}

/// Instruction text with `{binding}` placeholders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub system: &'static str,
    pub body: &'static str,
}

impl PromptTemplate {
    /// Placeholder names in order of first appearance
    pub fn placeholders(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::new();
        for caps in PLACEHOLDER_RE.captures_iter(self.body) {
            if let Some(name) = caps.get(1).map(|m| m.as_str()) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Fill every placeholder; a missing binding is an error
    pub fn render(&self, bindings: &ContextBindings) -> Result<String> {
        let mut missing: Vec<String> = Vec::new();

        let rendered = PLACEHOLDER_RE.replace_all(self.body, |caps: &Captures| {
            let name = &caps[1];
            match bindings.get(name) {
                Some(value) => value.to_string(),
                None => {
                    missing.push(name.to_string());
                    caps[0].to_string()
                }
            }
        });

        if !missing.is_empty() {
            return Err(ResearchError::Template(format!(
                "template '{}' is missing bindings: {}",
                self.name,
                missing.join(", ")
            )));
        }

        Ok(rendered.into_owned())
    }
}

/// Named values substituted into a template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextBindings {
    values: BTreeMap<String, String>,
}

impl ContextBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: PromptTemplate = PromptTemplate {
        name: "test",
        system: "system",
        body: "Idea: {business_idea}\nData: {local_data}\nAgain: {business_idea}\nJSON stays: {\"a\": 1}",
    };

    #[test]
    fn test_placeholders() {
        assert_eq!(TEMPLATE.placeholders(), vec!["business_idea", "local_data"]);
    }

    #[test]
    fn test_render_fills_every_occurrence() {
        let bindings = ContextBindings::new()
            .bind("business_idea", "Gym in Coimbatore")
            .bind("local_data", "3 gyms");

        let rendered = TEMPLATE.render(&bindings).unwrap();
        assert_eq!(
            rendered,
            "Idea: Gym in Coimbatore\nData: 3 gyms\nAgain: Gym in Coimbatore\nJSON stays: {\"a\": 1}"
        );
    }

    #[test]
    fn test_render_does_not_expand_values() {
        let bindings = ContextBindings::new()
            .bind("business_idea", "{local_data}")
            .bind("local_data", "x");

        let rendered = TEMPLATE.render(&bindings).unwrap();
        assert!(rendered.starts_with("Idea: {local_data}\n"));
    }

    #[test]
    fn test_missing_binding_is_an_error() {
        let bindings = ContextBindings::new().bind("business_idea", "Gym");
        let err = TEMPLATE.render(&bindings).unwrap_err();
        assert!(err.to_string().contains("local_data"));
    }
}
