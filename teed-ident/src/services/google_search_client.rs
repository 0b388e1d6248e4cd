//! Google Custom Search JSON API client

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use teed_common::config::ProvidersConfig;
use thiserror::Error;

use super::gemini_client::API_KEY_HEADER;
use super::openai_client::truncate;
use super::usage::{UsageEvent, UsageRecorder, GOOGLE_SEARCH_MODEL};
use crate::config::{ApiKeyKind, ApiKeys};

pub const GOOGLE_SEARCH_BASE_URL: &str = "https://www.googleapis.com/customsearch/v1";
const USER_AGENT: &str = concat!("teed-ident/", env!("CARGO_PKG_VERSION"));
const REQUESTS_PER_SECOND: u32 = 2;
/// API maximum per request
const MAX_RESULTS: u8 = 10;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{0} is not configured")]
    MissingKey(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// One organic result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default, rename = "displayLink")]
    pub display_link: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchResult>,
}

pub struct GoogleSearchClient {
    http_client: reqwest::Client,
    base_url: String,
    keys: Arc<ApiKeys>,
    usage: Option<UsageRecorder>,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl GoogleSearchClient {
    pub fn new(config: &ProvidersConfig, keys: Arc<ApiKeys>, usage: Option<UsageRecorder>) -> Result<Self, SearchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| SearchError::NetworkError(e.to_string()))?;

        let quota = Quota::per_second(NonZeroU32::new(REQUESTS_PER_SECOND).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            http_client,
            base_url: config
                .google_search_base_url
                .clone()
                .unwrap_or_else(|| GOOGLE_SEARCH_BASE_URL.to_string()),
            keys,
            usage,
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    /// Run one query; `num` is clamped to 1..=10
    pub async fn search(&self, query: &str, num: u8) -> Result<Vec<SearchResult>, SearchError> {
        let key = self
            .keys
            .get(ApiKeyKind::GoogleSearch)
            .await
            .ok_or_else(|| SearchError::MissingKey(ApiKeyKind::GoogleSearch.to_string()))?;
        let engine = self
            .keys
            .get(ApiKeyKind::GoogleSearchEngine)
            .await
            .ok_or_else(|| SearchError::MissingKey(ApiKeyKind::GoogleSearchEngine.to_string()))?;

        let started = Instant::now();
        let result = self.send(&key, &engine, query, num.clamp(1, MAX_RESULTS)).await;

        if let Some(usage) = &self.usage {
            usage
                .record(UsageEvent {
                    provider: "google_search",
                    model: GOOGLE_SEARCH_MODEL,
                    operation: "web_search",
                    input_tokens: 0,
                    output_tokens: 0,
                    duration: started.elapsed(),
                    error: result.as_ref().err().map(|e| e.to_string()),
                })
                .await;
        }

        result
    }

    async fn send(&self, key: &str, engine: &str, query: &str, num: u8) -> Result<Vec<SearchResult>, SearchError> {
        self.rate_limiter.until_ready().await;

        tracing::debug!(query = %query, num, "Querying Google Custom Search");

        let num = num.to_string();
        let response = self
            .http_client
            .get(&self.base_url)
            .header(API_KEY_HEADER, key)
            .query(&[("cx", engine), ("q", query), ("num", num.as_str())])
            .send()
            .await
            .map_err(|e| SearchError::NetworkError(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError(status.as_u16(), truncate(&error_text, 300)));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.without_url().to_string()))?;

        tracing::debug!(results = parsed.items.len(), "Search results received");
        Ok(parsed.items)
    }
}
