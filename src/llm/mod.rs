mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ModelError {
    #[display("request failed: {_0}")]
    Request(reqwest::Error),
    #[display("provider returned {status}: {message}")]
    Provider { status: u16, message: String },
    #[display("provider returned no content")]
    EmptyResponse,
    #[display("not configured: {reason}")]
    NotConfigured { reason: String },
}

/// Chat-style text completion backend used for decisions and generated text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError>;
}
