//! Telemetry listing

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::models::TelemetryRecord;
use crate::services::telemetry::MAX_RECENT;
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    20
}

/// GET /api/telemetry/recent?limit=20
///
/// Newest first; `limit` is clamped to 1..=100.
pub async fn recent_telemetry(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> ApiResult<Json<Vec<TelemetryRecord>>> {
    let rows = state.telemetry.recent(query.limit.min(MAX_RECENT)).await?;
    Ok(Json(rows))
}

pub fn telemetry_routes() -> Router<AppState> {
    Router::new().route("/api/telemetry/recent", get(recent_telemetry))
}
