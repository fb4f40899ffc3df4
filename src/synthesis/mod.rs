//! Synthesis engine
//!
//! Renders a stage's template with its gathered context and calls the
//! text-generation backend. Backend errors and timeouts become a fixed
//! diagnostic text; nothing propagates past this boundary.

use crate::backend::{GenerationRequest, TextBackend};
use crate::config::ResearchConfig;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

pub mod template;
pub use template::{ContextBindings, PromptTemplate};

const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Outcome of one synthesis call
#[derive(Debug, Clone, PartialEq)]
pub enum Synthesis {
    Generated(String),
    /// Diagnostic text substituted for the missing generation
    Fallback { text: String, reason: String },
}

impl Synthesis {
    pub fn text(&self) -> &str {
        match self {
            Synthesis::Generated(text) => text,
            Synthesis::Fallback { text, .. } => text,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, Synthesis::Generated(_))
    }

    pub fn into_text(self) -> String {
        match self {
            Synthesis::Generated(text) => text,
            Synthesis::Fallback { text, .. } => text,
        }
    }
}

/// The fixed text a stage carries when generation failed
pub fn diagnostic_text(template_name: &str, reason: &str) -> String {
    format!(
        "[Analysis unavailable: the text-generation service could not produce the '{}' section ({}). \
         Treat this part of the research as missing rather than as a finding.]",
        template_name, reason
    )
}

pub struct SynthesisEngine {
    backend: Arc<dyn TextBackend>,
    timeout: Duration,
    retries: u32,
    backoff: Duration,
    temperature: f32,
    max_tokens: u32,
}

impl SynthesisEngine {
    pub fn new(backend: Arc<dyn TextBackend>, config: &ResearchConfig) -> Self {
        Self {
            backend,
            timeout: config.synthesis_timeout,
            retries: config.synthesis_retries,
            backoff: config.retry_backoff,
            temperature: config.temperature,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Generate text for `template`; never fails.
    ///
    /// The whole call, retries included, is bounded by the configured
    /// timeout and by `deadline` when one is given.
    pub async fn synthesize(
        &self,
        template: &PromptTemplate,
        bindings: &ContextBindings,
        deadline: Option<Instant>,
    ) -> Synthesis {
        let prompt = match template.render(bindings) {
            Ok(prompt) => prompt,
            Err(e) => return self.fallback(template, &e.to_string()),
        };

        let budget = match remaining_budget(self.timeout, deadline) {
            Some(budget) => budget,
            None => return self.fallback(template, "run deadline exceeded"),
        };

        let request = GenerationRequest {
            system: template.system.to_string(),
            prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        match tokio::time::timeout(budget, self.generate_with_retry(template, &request)).await {
            Ok(Ok(text)) => {
                debug!(template = template.name, chars = text.len(), "Synthesis complete");
                Synthesis::Generated(text)
            }
            Ok(Err(e)) => self.fallback(template, &e.to_string()),
            Err(_) => self.fallback(
                template,
                &format!("timed out after {} ms", budget.as_millis()),
            ),
        }
    }

    async fn generate_with_retry(
        &self,
        template: &PromptTemplate,
        request: &GenerationRequest,
    ) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.backend.generate(request).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        template = template.name,
                        backend = self.backend.name(),
                        attempt,
                        error = %e,
                        "Synthesis attempt failed, retrying"
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn fallback(&self, template: &PromptTemplate, reason: &str) -> Synthesis {
        warn!(
            template = template.name,
            backend = self.backend.name(),
            reason,
            "Synthesis failed, substituting diagnostic"
        );
        Synthesis::Fallback {
            text: diagnostic_text(template.name, reason),
            reason: reason.to_string(),
        }
    }
}

/// Smaller of the per-call timeout and the time left before `deadline`
fn remaining_budget(timeout: Duration, deadline: Option<Instant>) -> Option<Duration> {
    match deadline {
        Some(deadline) => {
            let left = deadline.checked_duration_since(Instant::now())?;
            if left.is_zero() {
                None
            } else {
                Some(left.min(timeout))
            }
        }
        None => Some(timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResearchError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    const TEMPLATE: PromptTemplate = PromptTemplate {
        name: "competitor",
        system: "You are a competitive intelligence specialist.",
        body: "Analyze competitors for {business_idea}.",
    };

    struct ScriptedBackend {
        failures_before_success: u32,
        calls: AtomicU32,
        delay: Duration,
    }

    #[async_trait]
    impl TextBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if call < self.failures_before_success {
                Err(ResearchError::Synthesis("backend unavailable".to_string()))
            } else {
                Ok(format!("generated: {}", request.prompt))
            }
        }
    }

    fn engine(backend: Arc<ScriptedBackend>, retries: u32, timeout: Duration) -> SynthesisEngine {
        let mut config = ResearchConfig::new("k", "k");
        config.synthesis_retries = retries;
        config.synthesis_timeout = timeout;
        config.retry_backoff = Duration::from_millis(1);
        SynthesisEngine::new(backend, &config)
    }

    fn backend(failures: u32, delay: Duration) -> Arc<ScriptedBackend> {
        Arc::new(ScriptedBackend {
            failures_before_success: failures,
            calls: AtomicU32::new(0),
            delay,
        })
    }

    fn bindings() -> ContextBindings {
        ContextBindings::new().bind("business_idea", "Gym in Coimbatore")
    }

    #[tokio::test]
    async fn test_returns_generated_text_verbatim() {
        let engine = engine(backend(0, Duration::ZERO), 0, Duration::from_secs(5));
        let result = engine.synthesize(&TEMPLATE, &bindings(), None).await;

        assert!(result.is_generated());
        assert_eq!(
            result.text(),
            "generated: Analyze competitors for Gym in Coimbatore."
        );
    }

    #[tokio::test]
    async fn test_single_retry_recovers() {
        let backend = backend(1, Duration::ZERO);
        let engine = engine(backend.clone(), 1, Duration::from_secs(5));
        let result = engine.synthesize(&TEMPLATE, &bindings(), None).await;

        assert!(result.is_generated());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_backend_failure_becomes_diagnostic() {
        let backend = backend(u32::MAX, Duration::ZERO);
        let engine = engine(backend.clone(), 1, Duration::from_secs(5));
        let result = engine.synthesize(&TEMPLATE, &bindings(), None).await;

        assert!(!result.is_generated());
        assert!(result.text().contains("Analysis unavailable"));
        assert!(result.text().contains("competitor"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_becomes_diagnostic() {
        let engine = engine(backend(0, Duration::from_millis(500)), 0, Duration::from_millis(20));
        let result = engine.synthesize(&TEMPLATE, &bindings(), None).await;

        match result {
            Synthesis::Fallback { reason, .. } => assert!(reason.contains("timed out")),
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expired_deadline_skips_backend() {
        let backend = backend(0, Duration::ZERO);
        let engine = engine(backend.clone(), 0, Duration::from_secs(5));
        let deadline = Instant::now() - Duration::from_millis(1);

        let result = engine.synthesize(&TEMPLATE, &bindings(), Some(deadline)).await;

        assert!(!result.is_generated());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_binding_becomes_diagnostic() {
        let backend = backend(0, Duration::ZERO);
        let engine = engine(backend.clone(), 0, Duration::from_secs(5));
        let result = engine.synthesize(&TEMPLATE, &ContextBindings::new(), None).await;

        assert!(!result.is_generated());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }
}
