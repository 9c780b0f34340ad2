use super::{CompletionRequest, LanguageModel, ModelError};
use crate::settings::Llm;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl OpenAiClient {
    pub fn new(config: &Llm) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ModelError::Request)?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

fn build_body<'a>(model: &'a str, request: &'a CompletionRequest) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(2);
    if !request.system.is_empty() {
        messages.push(ChatMessage {
            role: "system",
            content: &request.system,
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: &request.prompt,
    });

    ChatRequest {
        model,
        messages,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    }
}

fn provider_error(status: u16, body: &str) -> ModelError {
    let message = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if body.chars().count() > 200 => {
            format!("{}...", body.chars().take(200).collect::<String>())
        }
        Err(_) => body.to_string(),
    };
    ModelError::Provider { status, message }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError> {
        let Some(api_key) = &self.api_key else {
            return Err(ModelError::NotConfigured {
                reason: "LLM_API_KEY is not set".into(),
            });
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(header::AUTHORIZATION, format!("Bearer {api_key}"))
            .json(&build_body(&self.model, &request))
            .send()
            .await
            .map_err(ModelError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error(status.as_u16(), &body));
        }

        let parsed: ChatResponse = response.json().await.map_err(ModelError::Request)?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ModelError::EmptyResponse)
    }
}
