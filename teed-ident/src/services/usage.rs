//! External API usage accounting
//!
//! Every provider call is written to `api_usage` with an estimated cost.
//! Accounting failures are logged and never reach the caller.

use chrono::Utc;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{debug, warn};

use crate::db::telemetry as telemetry_db;
use crate::models::{ApiUsageRecord, UsageStatus};
use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Model name recorded for Custom Search queries
pub const GOOGLE_SEARCH_MODEL: &str = "google-custom-search";

/// $5 per 1000 queries
const GOOGLE_SEARCH_COST_CENTS: f64 = 0.5;

/// USD per million tokens (input, output)
const MODEL_PRICING: &[(&str, f64, f64)] = &[
    ("gpt-4o", 2.50, 10.00),
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4-turbo", 10.00, 30.00),
    ("gpt-4", 30.00, 60.00),
    ("gemini-1.5-flash", 0.075, 0.30),
    ("gemini-1.5-pro", 1.25, 5.00),
];

/// Estimated cost of one call in whole cents
///
/// Unknown models cost 0.
pub fn estimate_cost_cents(model: &str, input_tokens: u32, output_tokens: u32) -> u32 {
    if model == GOOGLE_SEARCH_MODEL {
        return GOOGLE_SEARCH_COST_CENTS.round() as u32;
    }

    let Some((_, input_price, output_price)) = MODEL_PRICING.iter().find(|(name, _, _)| *name == model) else {
        debug!(model, "No pricing for model");
        return 0;
    };

    let input_cost = input_tokens as f64 / 1_000_000.0 * input_price * 100.0;
    let output_cost = output_tokens as f64 / 1_000_000.0 * output_price * 100.0;
    (input_cost + output_cost).round() as u32
}

/// One finished provider call, before costing
#[derive(Debug, Clone)]
pub struct UsageEvent<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub operation: &'a str,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub duration: Duration,
    pub error: Option<String>,
}

/// Writes `api_usage` rows
#[derive(Clone)]
pub struct UsageRecorder {
    db: SqlitePool,
}

impl UsageRecorder {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn record(&self, event: UsageEvent<'_>) {
        let record = ApiUsageRecord {
            provider: event.provider.to_string(),
            model: event.model.to_string(),
            operation: event.operation.to_string(),
            input_tokens: event.input_tokens,
            output_tokens: event.output_tokens,
            cost_cents: estimate_cost_cents(event.model, event.input_tokens, event.output_tokens),
            duration_ms: event.duration.as_millis() as u64,
            status: if event.error.is_some() {
                UsageStatus::Error
            } else {
                UsageStatus::Success
            },
            error_message: event.error,
            created_at: Utc::now(),
        };

        let result = retry_on_lock("api usage insert", DEFAULT_MAX_LOCK_WAIT_MS, || {
            telemetry_db::insert_api_usage(&self.db, &record)
        })
        .await;
        if let Err(e) = result {
            warn!(provider = %record.provider, error = %e, "Failed to record API usage");
        }
    }
}
