//! Settings API endpoint
//!
//! Provides POST /api/settings/api_keys/:provider for provider credentials

use crate::config::ApiKeyKind;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Request payload for setting a provider key
#[derive(Debug, Deserialize)]
pub struct SetApiKeyRequest {
    pub api_key: String,
}

/// Response payload for API key configuration
#[derive(Debug, Serialize)]
pub struct SetApiKeyResponse {
    /// Whether the operation succeeded
    pub success: bool,
    /// Human-readable status message
    pub message: String,
}

/// POST /api/settings/api_keys/:provider handler
///
/// `provider` is one of `openai`, `gemini`, `google_search`,
/// `google_search_engine`.
///
/// **Request:** `{"api_key": "your-key"}`
/// **Response:** `{"success": true, "message": "..."}`
///
/// **Behavior:**
/// 1. Validate provider and key (non-empty, non-whitespace)
/// 2. Write to database (authoritative)
/// 3. Swap the key into the live key store
/// 4. Sync to TOML (best-effort backup)
///
/// **Errors:**
/// - 400 Bad Request: unknown provider, or empty or whitespace-only key
/// - 500 Internal Server Error: Database write failure
pub async fn set_api_key(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(payload): Json<SetApiKeyRequest>,
) -> ApiResult<Json<SetApiKeyResponse>> {
    let kind = ApiKeyKind::from_provider(&provider)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown provider: {}", provider)))?;

    if !crate::config::is_valid_key(&payload.api_key) {
        return Err(ApiError::BadRequest(
            "API key cannot be empty or whitespace-only".to_string(),
        ));
    }
    let key = payload.api_key.trim().to_string();

    if let Err(e) = crate::db::settings::set_api_key(&state.db, kind, key.clone()).await {
        let message = format!("Failed to save {} to database: {}", kind, e);
        state.note_error(message.clone()).await;
        return Err(ApiError::Internal(message));
    }
    state.api_keys.set(kind, key.clone()).await;

    info!(provider = %provider, "{} configured via API", kind);

    let mut settings = HashMap::new();
    settings.insert(kind.setting_key().to_string(), key);

    if let Err(e) = crate::config::sync_settings_to_toml(settings, &state.toml_path).await {
        warn!("TOML sync failed (database write succeeded): {}", e);
    }

    Ok(Json(SetApiKeyResponse {
        success: true,
        message: format!("{} configured successfully", kind),
    }))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/api/settings/api_keys/:provider", post(set_api_key))
}
