//! Text-generation backend
//!
//! Treated as a black box: prompt in, text out, may fail. The synthesis
//! engine is the only caller.

use crate::Result;
use async_trait::async_trait;

pub mod groq;
pub use groq::GroqClient;

/// A fully rendered prompt
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait TextBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}
