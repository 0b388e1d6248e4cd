//! Identification telemetry
//!
//! One row per outcome. Write failures are logged, never surfaced.

use chrono::Utc;
use sqlx::SqlitePool;
use teed_common::Result;
use tracing::warn;

use crate::db::telemetry as telemetry_db;
use crate::models::TelemetryRecord;
use crate::types::IdentificationOutcome;
use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Upper bound for `recent` listings
pub const MAX_RECENT: u32 = 100;

/// Stored input keys are cut to this many characters
pub const MAX_KEY_CHARS: usize = 200;

#[derive(Clone)]
pub struct TelemetryRecorder {
    db: SqlitePool,
}

impl TelemetryRecorder {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn record_outcome(&self, input_kind: &str, input_key: &str, outcome: &IdentificationOutcome) {
        let record = TelemetryRecord {
            request_id: outcome.request_id,
            input_kind: input_kind.to_string(),
            input_key: input_key.chars().take(MAX_KEY_CHARS).collect(),
            stage_reached: outcome.stage_reached,
            duration_ms: outcome.elapsed_ms,
            final_confidence: outcome.top_confidence(),
            candidate_count: outcome.candidates.len(),
            clarification_needed: outcome.clarification_needed,
            stage_errors: outcome.stage_errors.clone(),
            created_at: Utc::now(),
        };

        let result = retry_on_lock("telemetry insert", DEFAULT_MAX_LOCK_WAIT_MS, || {
            telemetry_db::insert_telemetry(&self.db, &record)
        })
        .await;
        if let Err(e) = result {
            warn!(request_id = %record.request_id, error = %e, "Failed to record telemetry");
        }
    }

    /// Most recent outcomes, newest first; `limit` is clamped to 1..=100
    pub async fn recent(&self, limit: u32) -> Result<Vec<TelemetryRecord>> {
        telemetry_db::recent_telemetry(&self.db, limit.clamp(1, MAX_RECENT)).await
    }
}
