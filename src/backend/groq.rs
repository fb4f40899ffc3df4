//! Groq chat-completions client
//!
//! Talks to the OpenAI-compatible endpoint with a long-lived reqwest::Client
//! for connection pooling.

use super::{GenerationRequest, TextBackend};
use crate::config::ResearchConfig;
use crate::error::ResearchError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

/// Reusable Groq client (connection-pooled)
pub struct GroqClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GroqClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    pub fn from_config(config: &ResearchConfig) -> Result<Self> {
        Self::new(
            config.groq_api_key.clone(),
            config.groq_base_url.clone(),
            config.model.clone(),
        )
    }

    fn build_request(&self, request: &GenerationRequest) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.prompt.clone(),
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait]
impl TextBackend for GroqClient {
    fn name(&self) -> &'static str {
        "groq"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(ResearchError::Synthesis(
                "GROQ_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request(request);

        info!(model = %self.model, prompt_chars = request.prompt.len(), "Calling Groq API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Groq API request failed: {}", e);
                ResearchError::Synthesis(format!("Groq API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Groq API error response: {}", error_text);
            return Err(ResearchError::Synthesis(format!(
                "Groq API returned {}: {}",
                status, error_text
            )));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Groq response: {}", e);
            ResearchError::Synthesis(format!("Groq parse error: {}", e))
        })?;

        let answer = first_answer(&chat)?;

        if let Some(usage) = &chat.usage {
            info!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Groq response received"
            );
        }

        Ok(answer)
    }
}

fn first_answer(chat: &ChatResponse) -> Result<String> {
    let choice = chat
        .choices
        .first()
        .ok_or_else(|| ResearchError::Synthesis("No response from Groq API".to_string()))?;

    let text = choice.message.content.trim();
    if text.is_empty() {
        return Err(ResearchError::Synthesis(format!(
            "Empty response from Groq (finish_reason: {})",
            choice.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(text.to_string())
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
