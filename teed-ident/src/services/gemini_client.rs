//! Gemini `generateContent` client

use async_trait::async_trait;
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use serde::Deserialize;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use teed_common::config::ProvidersConfig;

use super::model::{ModelError, ModelReply, ModelRequest, ProductModel};
use super::openai_client::truncate;
use super::usage::{UsageEvent, UsageRecorder};
use crate::config::{ApiKeyKind, ApiKeys};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const USER_AGENT: &str = concat!("teed-ident/", env!("CARGO_PKG_VERSION"));
const REQUESTS_PER_SECOND: u32 = 5;
/// Google APIs read the key from this header, which keeps it out of URLs and error text
pub(crate) const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

pub struct GeminiClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    keys: Arc<ApiKeys>,
    usage: Option<UsageRecorder>,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl GeminiClient {
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
                .gemini_base_url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.gemini_model.clone(),
            keys,
            usage,
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    fn build_body(request: &ModelRequest) -> Value {
        let mut parts = vec![json!({ "text": request.prompt })];
        if let Some(image) = &request.image {
            parts.push(json!({
                "inline_data": { "mime_type": image.mime, "data": image.base64 }
            }));
        }

        let mut generation_config = json!({ "temperature": 0.2 });
        if request.json {
            generation_config["responseMimeType"] = json!("application/json");
        }

        json!({
            "system_instruction": { "parts": [{ "text": request.system }] },
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": generation_config,
        })
    }

    async fn send(&self, request: &ModelRequest) -> Result<ModelReply, ModelError> {
        let key = self
            .keys
            .get(ApiKeyKind::Gemini)
            .await
            .ok_or_else(|| ModelError::MissingKey(ApiKeyKind::Gemini.to_string()))?;

        self.rate_limiter.until_ready().await;

        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        tracing::debug!(model = %self.model, operation = request.operation, "Calling Gemini");

        let response = self
            .http_client
            .post(&url)
            .header(API_KEY_HEADER, key.as_str())
            .json(&Self::build_body(request))
            .send()
            .await
            .map_err(|e| ModelError::NetworkError(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ModelError::ApiError(status.as_u16(), truncate(&error_text, 300)));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ModelError::ParseError(e.without_url().to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ModelError::ParseError("empty completion".to_string()));
        }

        let (input_tokens, output_tokens) = parsed
            .usage_metadata
            .map(|u| (u.prompt_token_count, u.candidates_token_count))
            .unwrap_or((0, 0));

        Ok(ModelReply {
            text,
            model: self.model.clone(),
            input_tokens,
            output_tokens,
        })
    }
}

#[async_trait]
impl ProductModel for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply, ModelError> {
        let started = Instant::now();
        let result = self.send(request).await;

        if let Some(usage) = &self.usage {
            if !matches!(result, Err(ModelError::MissingKey(_))) {
                let (input_tokens, output_tokens) = match &result {
                    Ok(reply) => (reply.input_tokens, reply.output_tokens),
                    Err(_) => (0, 0),
                };
                usage
                    .record(UsageEvent {
                        provider: "gemini",
                        model: &self.model,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_with_image() {
        let image = super::super::input::decode_image(
            "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=",
        )
        .unwrap();
        let request = ModelRequest::text("identify_image", "sys", "what is this").with_image(image);
        let body = GeminiClient::build_body(&request);

        assert_eq!(body["system_instruction"]["parts"][0]["text"], "sys");
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }
}
