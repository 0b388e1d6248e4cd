//! Human corrections
//!
//! A correction pins the right answer to an input key. Lookups for the same
//! key, or a near-identical text/URL key, return it before any other stage
//! runs.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use teed_common::{Error, Result};
use tracing::{info, warn};
use uuid::Uuid;

use super::library::ProductLibrary;
use crate::db::corrections as corrections_db;
use crate::models::{CorrectionRecord, CorrectionType};
use crate::text::normalize_text;
use crate::types::{Candidate, CandidateSource, Category};
use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Stored and queried keys shorter than this never near-match
pub const MIN_NEAR_KEY_LEN: usize = 4;

pub const CORRECTION_REASON: &str = "human-verified correction";

static MODEL_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[a-z]*\d+[a-z]*").expect("model token pattern is valid"));

/// What the pipeline proposed before the human stepped in
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OriginalGuess {
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// The human-verified answer
#[derive(Debug, Clone, Deserialize)]
pub struct CorrectedProduct {
    #[serde(default)]
    pub brand: Option<String>,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Result of `record`
#[derive(Debug, Clone, Serialize)]
pub struct CorrectionReceipt {
    pub stored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction_type: Option<CorrectionType>,
    pub change_summary: String,
}

pub struct CorrectionService {
    db: SqlitePool,
    library: Arc<ProductLibrary>,
}

impl CorrectionService {
    pub fn new(db: SqlitePool, library: Arc<ProductLibrary>) -> Self {
        Self { db, library }
    }

    /// Store a correction for `input_key`
    ///
    /// Nothing is written when the corrected product equals the original.
    pub async fn record(
        &self,
        input_kind: &str,
        input_key: &str,
        original: &OriginalGuess,
        corrected: &CorrectedProduct,
    ) -> Result<CorrectionReceipt> {
        let corrected_name = corrected.name.trim();
        if corrected_name.is_empty() {
            return Err(Error::InvalidInput("Corrected name is required".to_string()));
        }
        let corrected_brand = non_blank(corrected.brand.as_deref());
        let original_category = non_blank(original.category.as_deref()).map(|c| Category::from_label(&c));
        let corrected_category = non_blank(corrected.category.as_deref())
            .map(|c| Category::from_label(&c))
            .or(original_category)
            .unwrap_or_default();

        let change = describe_change(
            original,
            corrected_name,
            corrected_brand.as_deref(),
            corrected_category,
            original_category,
        );
        let Some((correction_type, change_summary)) = change else {
            return Ok(CorrectionReceipt {
                stored: false,
                correction_id: None,
                correction_type: None,
                change_summary: "No changes detected".to_string(),
            });
        };

        let record = CorrectionRecord {
            id: Uuid::new_v4(),
            input_kind: input_kind.to_string(),
            input_key: input_key.to_string(),
            original_brand: non_blank(original.brand.as_deref()),
            original_name: non_blank(original.name.as_deref()),
            original_category,
            corrected_brand,
            corrected_name: corrected_name.to_string(),
            corrected_category,
            correction_type,
            change_summary,
            model_keywords: model_keywords(corrected_name, original.name.as_deref().unwrap_or("")),
            created_at: Utc::now(),
        };

        retry_on_lock("correction insert", DEFAULT_MAX_LOCK_WAIT_MS, || {
            corrections_db::insert_correction(&self.db, &record)
        })
        .await?;

        info!(
            input_kind,
            correction_type = record.correction_type.as_str(),
            summary = %record.change_summary,
            "Correction stored"
        );

        if let Err(e) = self.library.learn(&to_candidate(&record)).await {
            warn!(error = %e, "Failed to learn corrected product");
        }

        Ok(CorrectionReceipt {
            stored: true,
            correction_id: Some(record.id),
            correction_type: Some(record.correction_type),
            change_summary: record.change_summary,
        })
    }

    /// Latest correction for this key, exact match first
    pub async fn lookup(&self, input_kind: &str, input_key: &str, allow_near: bool) -> Result<Option<Candidate>> {
        if let Some(record) = corrections_db::find_exact(&self.db, input_kind, input_key).await? {
            return Ok(Some(to_candidate(&record)));
        }
        if !allow_near || input_key.chars().count() < MIN_NEAR_KEY_LEN {
            return Ok(None);
        }
        let near = corrections_db::find_near(&self.db, input_kind, input_key, MIN_NEAR_KEY_LEN).await?;
        Ok(near.map(|record| to_candidate(&record).with_reason(format!("similar to \"{}\"", record.input_key))))
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn changed(before: Option<&str>, after: Option<&str>) -> bool {
    before.map(normalize_text) != after.map(normalize_text)
}

/// Correction type and `"before" → "after"` summary, or `None` when nothing changed
fn describe_change(
    original: &OriginalGuess,
    corrected_name: &str,
    corrected_brand: Option<&str>,
    corrected_category: Category,
    original_category: Option<Category>,
) -> Option<(CorrectionType, String)> {
    let original_name = non_blank(original.name.as_deref());
    let original_brand = non_blank(original.brand.as_deref());

    let mut kinds = Vec::new();
    let mut parts = Vec::new();

    if changed(original_name.as_deref(), Some(corrected_name)) {
        kinds.push(CorrectionType::Name);
        parts.push(format!(
            "\"{}\" → \"{}\"",
            original_name.as_deref().unwrap_or("unknown"),
            corrected_name
        ));
    }
    if changed(original_brand.as_deref(), corrected_brand) {
        kinds.push(CorrectionType::Brand);
        parts.push(format!(
            "Brand: \"{}\" → \"{}\"",
            original_brand.as_deref().unwrap_or("unknown"),
            corrected_brand.unwrap_or("unknown")
        ));
    }
    if original_category.is_some_and(|c| c != corrected_category) {
        kinds.push(CorrectionType::Category);
        parts.push(format!(
            "Category: {} → {}",
            original_category.map(|c| c.as_str()).unwrap_or("unknown"),
            corrected_category
        ));
    }

    let correction_type = match kinds.as_slice() {
        [] => return None,
        [single] => *single,
        _ => CorrectionType::Combination,
    };
    Some((correction_type, parts.join(", ")))
}

/// Search tokens from both names, model-number-like tokens included
fn model_keywords(corrected_name: &str, original_name: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    let mut push = |word: String| {
        if !keywords.contains(&word) {
            keywords.push(word);
        }
    };

    for name in [corrected_name, original_name] {
        for part in name.split(|c: char| c.is_whitespace() || c == '-' || c == '_') {
            let cleaned: String = part
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if cleaned.len() >= 2 {
                push(cleaned);
            }
        }
        for m in MODEL_TOKEN.find_iter(name) {
            push(m.as_str().to_lowercase());
        }
    }
    keywords
}

fn to_candidate(record: &CorrectionRecord) -> Candidate {
    Candidate::new(
        record.corrected_brand.clone(),
        record.corrected_name.clone(),
        record.corrected_category,
        1.0,
        CandidateSource::Library,
    )
    .with_reason(CORRECTION_REASON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use teed_common::db::connect_in_memory;

    async fn service() -> (CorrectionService, Arc<ProductLibrary>) {
        let pool = connect_in_memory().await.unwrap();
        let library = Arc::new(ProductLibrary::load(pool.clone(), 0.75).await.unwrap());
        (CorrectionService::new(pool, library.clone()), library)
    }

    fn guess(brand: &str, name: &str, category: &str) -> OriginalGuess {
        OriginalGuess {
            brand: Some(brand.to_string()),
            name: Some(name.to_string()),
            category: Some(category.to_string()),
        }
    }

    fn fix(brand: &str, name: &str) -> CorrectedProduct {
        CorrectedProduct {
            brand: Some(brand.to_string()),
            name: name.to_string(),
            category: None,
        }
    }

    #[test]
    fn test_model_keywords() {
        let keywords = model_keywords("P790 Irons", "T-100 Irons");
        assert_eq!(keywords, vec!["p790", "irons", "100"]);
    }

    #[test]
    fn test_describe_name_only() {
        let original = guess("Titleist", "T100 Irons", "golf");
        let (kind, summary) =
            describe_change(&original, "T150 Irons", Some("Titleist"), Category::Golf, Some(Category::Golf)).unwrap();
        assert_eq!(kind, CorrectionType::Name);
        assert_eq!(summary, "\"T100 Irons\" → \"T150 Irons\"");
    }

    #[test]
    fn test_describe_combination() {
        let original = guess("Ping", "G430 Driver", "golf");
        let (kind, summary) =
            describe_change(&original, "Paradym Driver", Some("Callaway"), Category::Golf, Some(Category::Golf)).unwrap();
        assert_eq!(kind, CorrectionType::Combination);
        assert_eq!(summary, "\"G430 Driver\" → \"Paradym Driver\", Brand: \"Ping\" → \"Callaway\"");
    }

    #[tokio::test]
    async fn test_unchanged_is_not_stored() {
        let (service, _) = service().await;
        let receipt = service
            .record("text", "ping g430", &guess("Ping", "G430 Driver", "golf"), &fix("PING", "g430 driver"))
            .await
            .unwrap();
        assert!(!receipt.stored);
        assert_eq!(receipt.change_summary, "No changes detected");
        assert!(service.lookup("text", "ping g430", true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_then_lookup() {
        let (service, library) = service().await;
        let receipt = service
            .record(
                "text",
                "callaway driver",
                &guess("Ping", "G430 Driver", "golf"),
                &fix("Callaway", "Paradym Ai Smoke Driver"),
            )
            .await
            .unwrap();
        assert!(receipt.stored);
        assert_eq!(receipt.correction_type, Some(CorrectionType::Combination));

        let exact = service.lookup("text", "callaway driver", true).await.unwrap().unwrap();
        assert_eq!(exact.confidence, 1.0);
        assert_eq!(exact.source, CandidateSource::Library);
        assert_eq!(exact.brand.as_deref(), Some("Callaway"));
        assert_eq!(exact.category, Category::Golf);
        assert_eq!(exact.reasons, vec![CORRECTION_REASON]);

        let near = service.lookup("text", "my callaway driver 10.5", true).await.unwrap().unwrap();
        assert_eq!(near.name, "Paradym Ai Smoke Driver");

        assert!(service.lookup("text", "my callaway driver 10.5", false).await.unwrap().is_none());
        assert!(service.lookup("url", "callaway driver", true).await.unwrap().is_none());

        // corrected product is learned
        assert_eq!(library.len().await, 1);
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let (service, _) = service().await;
        let err = service
            .record("text", "x", &OriginalGuess::default(), &fix("Nike", "  "))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
