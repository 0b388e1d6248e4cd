//! Telemetry and API usage database operations

use sqlx::{Row, SqlitePool};
use teed_common::{Error, Result};

use super::{parse_json, parse_timestamp, parse_uuid, to_json};
use crate::models::{ApiUsageRecord, TelemetryRecord};
use crate::types::StageKind;

/// Input keys are truncated before storage
pub const MAX_STORED_KEY_LEN: usize = 200;

/// Persist one identification outcome
pub async fn insert_telemetry(pool: &SqlitePool, record: &TelemetryRecord) -> Result<()> {
    let stage_errors = to_json("stage_errors", &record.stage_errors)?;
    let input_key: String = record.input_key.chars().take(MAX_STORED_KEY_LEN).collect();

    sqlx::query(
        r#"
        INSERT INTO identification_telemetry (
            request_id, input_kind, input_key, stage_reached, duration_ms,
            final_confidence, candidate_count, clarification_needed, stage_errors, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.request_id.to_string())
    .bind(&record.input_kind)
    .bind(&input_key)
    .bind(record.stage_reached.map(|s| s.as_str()))
    .bind(record.duration_ms as i64)
    .bind(record.final_confidence as f64)
    .bind(record.candidate_count as i64)
    .bind(record.clarification_needed)
    .bind(&stage_errors)
    .bind(record.created_at.to_rfc3339())
    .execute(pool)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

/// Most recent outcomes, newest first
pub async fn recent_telemetry(pool: &SqlitePool, limit: u32) -> Result<Vec<TelemetryRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT request_id, input_kind, input_key, stage_reached, duration_ms,
               final_confidence, candidate_count, clarification_needed, stage_errors, created_at
        FROM identification_telemetry
        ORDER BY created_at DESC, rowid DESC
        LIMIT ?
        "#,
    )
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let request_id: String = row.get("request_id");
            let stage_reached: Option<String> = row.get("stage_reached");
            let duration_ms: i64 = row.get("duration_ms");
            let final_confidence: f64 = row.get("final_confidence");
            let candidate_count: i64 = row.get("candidate_count");
            let stage_errors: String = row.get("stage_errors");
            let created_at: String = row.get("created_at");

            Ok(TelemetryRecord {
                request_id: parse_uuid(&request_id)?,
                input_kind: row.get("input_kind"),
                input_key: row.get("input_key"),
                stage_reached: stage_reached.as_deref().and_then(StageKind::parse),
                duration_ms: duration_ms.max(0) as u64,
                final_confidence: final_confidence as f32,
                candidate_count: candidate_count.max(0) as usize,
                clarification_needed: row.get("clarification_needed"),
                stage_errors: parse_json("stage_errors", &stage_errors)?,
                created_at: parse_timestamp("created_at", &created_at)?,
            })
        })
        .collect()
}

/// Persist one external API call
pub async fn insert_api_usage(pool: &SqlitePool, record: &ApiUsageRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO api_usage (
            provider, model, operation, input_tokens, output_tokens,
            cost_cents, duration_ms, status, error_message, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.provider)
    .bind(&record.model)
    .bind(&record.operation)
    .bind(record.input_tokens as i64)
    .bind(record.output_tokens as i64)
    .bind(record.cost_cents as i64)
    .bind(record.duration_ms as i64)
    .bind(record.status.as_str())
    .bind(&record.error_message)
    .bind(record.created_at.to_rfc3339())
    .execute(pool)
    .await
    .map_err(Error::Database)?;

    Ok(())
}
