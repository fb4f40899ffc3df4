//! Run configuration
//!
//! Loaded once (from `.env` + process environment) before the first run and
//! shared immutably with every component afterwards.

use crate::error::ResearchError;
use crate::Result;
use std::env;
use std::fmt;
use std::time::Duration;

pub const GROQ_API_KEY_VAR: &str = "GROQ_API_KEY";
pub const SERPAPI_API_KEY_VAR: &str = "SERPAPI_API_KEY";

const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_SERPAPI_BASE_URL: &str = "https://serpapi.com";

/// Immutable configuration for a research pipeline
#[derive(Clone)]
pub struct ResearchConfig {
    pub groq_api_key: String,
    pub serpapi_api_key: String,
    pub model: String,
    pub groq_base_url: String,
    pub serpapi_base_url: String,
    /// Per-request timeout for search-provider calls
    pub http_timeout: Duration,
    /// Upper bound for one synthesis call, retries included
    pub synthesis_timeout: Duration,
    pub synthesis_retries: u32,
    pub retry_backoff: Duration,
    /// Default run deadline when the caller does not supply one
    pub run_deadline: Duration,
    pub temperature: f32,
}

impl ResearchConfig {
    /// Build a config from explicit credentials with default tuning
    pub fn new(groq_api_key: impl Into<String>, serpapi_api_key: impl Into<String>) -> Self {
        Self {
            groq_api_key: groq_api_key.into(),
            serpapi_api_key: serpapi_api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            groq_base_url: DEFAULT_GROQ_BASE_URL.to_string(),
            serpapi_base_url: DEFAULT_SERPAPI_BASE_URL.to_string(),
            http_timeout: Duration::from_secs(30),
            synthesis_timeout: Duration::from_secs(60),
            synthesis_retries: 1,
            retry_backoff: Duration::from_millis(500),
            run_deadline: Duration::from_secs(300),
            temperature: 0.2,
        }
    }

    /// Load from `.env` and the process environment.
    ///
    /// Missing credentials are NOT an error here; they are reported by
    /// [`ResearchConfig::check_credentials`] right before a run starts.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Self::new(
            env::var(GROQ_API_KEY_VAR).unwrap_or_default(),
            env::var(SERPAPI_API_KEY_VAR).unwrap_or_default(),
        );

        if let Ok(model) = env::var("RESEARCH_MODEL") {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        if let Ok(url) = env::var("GROQ_BASE_URL") {
            config.groq_base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(url) = env::var("SERPAPI_BASE_URL") {
            config.serpapi_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(secs) = parse_var::<u64>("RESEARCH_HTTP_TIMEOUT_SECS")? {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>("RESEARCH_SYNTHESIS_TIMEOUT_SECS")? {
            config.synthesis_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse_var::<u32>("RESEARCH_SYNTHESIS_RETRIES")? {
            config.synthesis_retries = retries;
        }
        if let Some(secs) = parse_var::<u64>("RESEARCH_DEADLINE_SECS")? {
            config.run_deadline = Duration::from_secs(secs);
        }
        if let Some(temperature) = parse_var::<f32>("RESEARCH_TEMPERATURE")? {
            config.temperature = temperature;
        }

        Ok(config)
    }

    /// Precondition gate: every credential must be present
    pub fn check_credentials(&self) -> Result<()> {
        let missing: Vec<&str> = [
            (GROQ_API_KEY_VAR, &self.groq_api_key),
            (SERPAPI_API_KEY_VAR, &self.serpapi_api_key),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ResearchError::PreconditionFailed(format!(
                "{} is missing. Add it to your environment or .env file.",
                missing.join(" and ")
            )))
        }
    }
}

impl fmt::Debug for ResearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResearchConfig")
            .field("groq_api_key", &redact(&self.groq_api_key))
            .field("serpapi_api_key", &redact(&self.serpapi_api_key))
            .field("model", &self.model)
            .field("groq_base_url", &self.groq_base_url)
            .field("serpapi_base_url", &self.serpapi_base_url)
            .field("http_timeout", &self.http_timeout)
            .field("synthesis_timeout", &self.synthesis_timeout)
            .field("synthesis_retries", &self.synthesis_retries)
            .field("run_deadline", &self.run_deadline)
            .field("temperature", &self.temperature)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ResearchError::Config(format!("{} has an invalid value: {}", name, raw))),
        _ => Ok(None),
    }
}
