//! Human corrections to identification results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Category;

/// Which fields a correction changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionType {
    Name,
    Brand,
    Category,
    Combination,
}

impl CorrectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionType::Name => "name",
            CorrectionType::Brand => "brand",
            CorrectionType::Category => "category",
            CorrectionType::Combination => "combination",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "name" => CorrectionType::Name,
            "brand" => CorrectionType::Brand,
            "category" => CorrectionType::Category,
            _ => CorrectionType::Combination,
        }
    }
}

/// Stored correction row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionRecord {
    pub id: Uuid,
    pub input_kind: String,
    pub input_key: String,
    pub original_brand: Option<String>,
    pub original_name: Option<String>,
    pub original_category: Option<Category>,
    pub corrected_brand: Option<String>,
    pub corrected_name: String,
    pub corrected_category: Category,
    pub correction_type: CorrectionType,
    pub change_summary: String,
    pub model_keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
}
