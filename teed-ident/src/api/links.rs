//! Purchase link endpoint

use axum::{extract::State, routing::post, Json, Router};

use crate::services::link_finder::{LinkRequest, LinkResult};
use crate::{ApiError, ApiResult, AppState};

/// POST /api/links
///
/// **Request:** `{"name": "R7 Driver", "brand": "TaylorMade", "category": "golf", "used": true}`
///
/// Always answers with at least one link; model failures fall back to a
/// Google Shopping search.
pub async fn find_links(
    State(state): State<AppState>,
    Json(payload): Json<LinkRequest>,
) -> ApiResult<Json<LinkResult>> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Product name is required".to_string()));
    }
    Ok(Json(state.link_finder.find_links(&payload).await))
}

pub fn link_routes() -> Router<AppState> {
    Router::new().route("/api/links", post(find_links))
}
