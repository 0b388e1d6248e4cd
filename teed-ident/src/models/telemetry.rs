//! Telemetry and external API usage rows

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::types::{StageFailure, StageKind};

/// One identification outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub request_id: Uuid,
    pub input_kind: String,
    pub input_key: String,
    pub stage_reached: Option<StageKind>,
    pub duration_ms: u64,
    pub final_confidence: f32,
    pub candidate_count: usize,
    pub clarification_needed: bool,
    pub stage_errors: Vec<StageFailure>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageStatus {
    Success,
    Error,
}

impl UsageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageStatus::Success => "success",
            UsageStatus::Error => "error",
        }
    }
}

/// One call to an external provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiUsageRecord {
    pub provider: String,
    pub model: String,
    pub operation: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_cents: u32,
    pub duration_ms: u64,
    pub status: UsageStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}
