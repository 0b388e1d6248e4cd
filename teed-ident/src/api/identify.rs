//! Identification endpoint

use axum::{extract::State, routing::post, Json, Router};

use crate::services::input::prepare;
use crate::types::{IdentificationOutcome, IdentifyRequest};
use crate::{ApiResult, AppState};

/// POST /api/identify
///
/// **Request:** `{"input": {"type": "text", "value": "callaway paradym driver"}, "context": "...", "category_hint": "golf"}`
///
/// Validation failures (empty text, bad URL, undecodable or oversized image)
/// are 400. Stage failures never fail the request; they are listed in
/// `stage_errors`.
pub async fn identify(
    State(state): State<AppState>,
    Json(payload): Json<IdentifyRequest>,
) -> ApiResult<Json<IdentificationOutcome>> {
    let request = prepare(&payload)?;
    let outcome = state.resolver.identify(&request).await;

    if outcome.candidates.is_empty() {
        if let Some(failure) = outcome.stage_errors.last() {
            state
                .note_error(format!("identify: {} stage: {}", failure.stage, failure.message))
                .await;
        }
    }

    Ok(Json(outcome))
}

pub fn identify_routes() -> Router<AppState> {
    Router::new().route("/api/identify", post(identify))
}
