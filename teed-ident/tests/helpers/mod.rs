//! Test Helper Utilities
//!
//! Shared utilities for testing teed-ident

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::path::PathBuf;
use teed_common::config::TomlConfig;
use teed_ident::{build_router, AppState};
use tempfile::TempDir;
use tower::ServiceExt;

/// Router plus the state behind it
///
/// `_dir` holds the TOML file written by the settings endpoint and must
/// outlive the test.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub pool: SqlitePool,
    pub toml_path: PathBuf,
    _dir: TempDir,
}

/// Config with every provider pointed at `base_url` and dummy keys set
pub fn provider_config(base_url: &str) -> TomlConfig {
    let mut config = TomlConfig::default();
    config.openai_api_key = Some("test-openai-key".to_string());
    config.gemini_api_key = Some("test-gemini-key".to_string());
    config.google_search_api_key = Some("test-search-key".to_string());
    config.google_search_engine_id = Some("test-engine".to_string());
    config.providers.openai_base_url = Some(base_url.to_string());
    config.providers.gemini_base_url = Some(base_url.to_string());
    config.providers.google_search_base_url = Some(format!("{}/customsearch/v1", base_url));
    // Same 2:5 ratio as the compiled defaults, scaled down
    config.providers.request_timeout_ms = 1_000;
    config.identification.stage_timeout_ms = 2_500;
    config
}

/// Build an app over an in-memory database
pub async fn create_test_app(config: TomlConfig) -> TestApp {
    let dir = TempDir::new().unwrap();
    let toml_path = dir.path().join("teed-ident.toml");
    let pool = teed_common::db::connect_in_memory().await.unwrap();

    let state = AppState::initialize(pool.clone(), &config, toml_path.clone())
        .await
        .unwrap();

    TestApp {
        router: build_router(state.clone()),
        state,
        pool,
        toml_path,
        _dir: dir,
    }
}

/// Send a request and decode the JSON body (Null when empty)
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, headers, json)
}

pub async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let (status, _, json) = send(router, Method::POST, uri, Some(body), &[]).await;
    (status, json)
}

pub async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, _, json) = send(router, Method::GET, uri, None, &[]).await;
    (status, json)
}

pub fn text_input(text: &str) -> Value {
    json!({ "input": { "type": "text", "value": text } })
}

/// OpenAI chat completion carrying `content`
pub fn openai_reply(content: &str) -> Value {
    json!({
        "model": "gpt-4o-mini",
        "choices": [{ "message": { "role": "assistant", "content": content } }],
        "usage": { "prompt_tokens": 120, "completion_tokens": 40 }
    })
}

/// Gemini generateContent reply carrying `text`
pub fn gemini_reply(text: &str) -> Value {
    json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }],
        "usageMetadata": { "promptTokenCount": 100, "candidatesTokenCount": 30 }
    })
}

/// Rows in `api_usage` for one provider
pub async fn usage_rows(pool: &SqlitePool, provider: &str) -> Vec<(String, String)> {
    sqlx::query_as::<_, (String, String)>(
        "SELECT operation, status FROM api_usage WHERE provider = ? ORDER BY id",
    )
    .bind(provider)
    .fetch_all(pool)
    .await
    .unwrap()
}
