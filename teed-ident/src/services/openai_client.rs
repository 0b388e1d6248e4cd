//! OpenAI chat completions client
//!
//! Text and URL prompts use the text model with `response_format: json_object`.
//! Photos go to the vision model as an `image_url` data URL.

use async_trait::async_trait;
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use serde::Deserialize;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use teed_common::config::ProvidersConfig;

use super::model::{ModelError, ModelReply, ModelRequest, ProductModel};
use super::usage::{UsageEvent, UsageRecorder};
use crate::config::{ApiKeyKind, ApiKeys};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const USER_AGENT: &str = concat!("teed-ident/", env!("CARGO_PKG_VERSION"));
const REQUESTS_PER_SECOND: u32 = 5;
const MAX_TOKENS: u32 = 1000;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

pub struct OpenAiClient {
    http_client: reqwest::Client,
    base_url: String,
    vision_model: String,
    text_model: String,
    keys: Arc<ApiKeys>,
    usage: Option<UsageRecorder>,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl OpenAiClient {
    pub fn new(config: &ProvidersConfig, keys: Arc<ApiKeys>, usage: Option<UsageRecorder>) -> Result<Self, ModelError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ModelError::NetworkError(e.to_string()))?;

        let quota = Quota::per_second(NonZeroU32::new(REQUESTS_PER_SECOND).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            http_client,
            base_url: config
                .openai_base_url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            vision_model: config.openai_vision_model.clone(),
            text_model: config.openai_text_model.clone(),
            keys,
            usage,
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    fn build_body(&self, request: &ModelRequest, model: &str) -> Value {
        let user_content = match &request.image {
            Some(image) => json!([
                { "type": "text", "text": request.prompt },
                { "type": "image_url", "image_url": { "url": image.data_url(), "detail": "high" } }
            ]),
            None => json!(request.prompt),
        };

        let mut body = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": user_content }
            ],
            "temperature": 0.2,
            "max_tokens": MAX_TOKENS,
        });
        if request.json {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }

    async fn send(&self, request: &ModelRequest, model: &str) -> Result<ModelReply, ModelError> {
        let key = self
            .keys
            .get(ApiKeyKind::OpenAi)
            .await
            .ok_or_else(|| ModelError::MissingKey(ApiKeyKind::OpenAi.to_string()))?;

        self.rate_limiter.until_ready().await;

        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model = %model, operation = request.operation, "Calling OpenAI");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(key)
            .json(&self.build_body(request, model))
            .send()
            .await
            .map_err(|e| ModelError::NetworkError(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ModelError::ApiError(status.as_u16(), truncate(&error_text, 300)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::ParseError(e.without_url().to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ModelError::ParseError("empty completion".to_string()))?;
        let usage = parsed.usage.unwrap_or(ChatUsage {
            prompt_tokens: 0,
            completion_tokens: 0,
        });

        Ok(ModelReply {
            text,
            model: parsed.model.unwrap_or_else(|| model.to_string()),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }
}

#[async_trait]
impl ProductModel for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply, ModelError> {
        let model = if request.image.is_some() {
            self.vision_model.as_str()
        } else {
            self.text_model.as_str()
        };

        let started = Instant::now();
        let result = self.send(request, model).await;

        if let Some(usage) = &self.usage {
            if !matches!(result, Err(ModelError::MissingKey(_))) {
                let (input_tokens, output_tokens) = match &result {
                    Ok(reply) => (reply.input_tokens, reply.output_tokens),
                    Err(_) => (0, 0),
                };
                usage
                    .record(UsageEvent {
                        provider: "openai",
                        model,
                        operation: request.operation,
                        input_tokens,
                        output_tokens,
                        duration: started.elapsed(),
                        error: result.as_ref().err().map(|e| e.to_string()),
                    })
                    .await;
            }
        }

        result
    }
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push('…');
        cut
    }
}
