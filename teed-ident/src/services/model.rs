//! Hosted model abstraction
//!
//! The AI stage and the link finder talk to a [`ProductModel`]. Concrete
//! providers live in `openai_client` and `gemini_client`; [`ModelChain`]
//! tries them in configured order.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use super::input::ImagePayload;

/// Hosted model errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{0} is not configured")]
    MissingKey(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("No model provider available")]
    NoProvider,
}

/// One prompt for a hosted model
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Recorded in `api_usage.operation`
    pub operation: &'static str,
    pub system: String,
    pub prompt: String,
    pub image: Option<ImagePayload>,
    /// Ask the provider for a JSON object response
    pub json: bool,
}

impl ModelRequest {
    pub fn text(operation: &'static str, system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            operation,
            system: system.into(),
            prompt: prompt.into(),
            image: None,
            json: true,
        }
    }

    pub fn with_image(mut self, image: ImagePayload) -> Self {
        self.image = Some(image);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    pub text: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A hosted model that can answer identification prompts
#[async_trait]
pub trait ProductModel: Send + Sync {
    /// Provider name for logs and usage rows
    fn name(&self) -> &str;

    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply, ModelError>;
}

/// Tries each model in order until one answers
pub struct ModelChain {
    models: Vec<Arc<dyn ProductModel>>,
}

impl ModelChain {
    pub fn new(models: Vec<Arc<dyn ProductModel>>) -> Self {
        Self { models }
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[async_trait]
impl ProductModel for ModelChain {
    fn name(&self) -> &str {
        self.models.first().map(|m| m.name()).unwrap_or("none")
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply, ModelError> {
        let mut last_error = ModelError::NoProvider;
        for (index, model) in self.models.iter().enumerate() {
            match model.complete(request).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    if index + 1 < self.models.len() {
                        warn!(
                            provider = model.name(),
                            operation = request.operation,
                            error = %e,
                            "Model call failed, trying fallback provider"
                        );
                    }
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}
