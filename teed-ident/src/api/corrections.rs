//! Corrections endpoint

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::services::corrections::{CorrectedProduct, CorrectionReceipt, OriginalGuess};
use crate::services::input::prepare_input;
use crate::types::IdentifyInput;
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CorrectionRequest {
    /// The input that was misidentified, as sent to `/api/identify`
    pub input: IdentifyInput,
    /// What the service proposed, if anything
    #[serde(default)]
    pub original: OriginalGuess,
    pub corrected: CorrectedProduct,
}

/// POST /api/corrections
///
/// 201 with the stored correction, or 200 with `stored: false` when the
/// corrected product equals the original guess.
pub async fn record_correction(
    State(state): State<AppState>,
    Json(payload): Json<CorrectionRequest>,
) -> ApiResult<(StatusCode, Json<CorrectionReceipt>)> {
    let (_, key) = prepare_input(&payload.input)?;
    let receipt = state
        .corrections
        .record(payload.input.kind(), &key, &payload.original, &payload.corrected)
        .await?;

    if receipt.stored {
        info!(
            input = payload.input.kind(),
            change = %receipt.change_summary,
            "Correction recorded"
        );
        Ok((StatusCode::CREATED, Json(receipt)))
    } else {
        Ok((StatusCode::OK, Json(receipt)))
    }
}

pub fn correction_routes() -> Router<AppState> {
    Router::new().route("/api/corrections", post(record_correction))
}
