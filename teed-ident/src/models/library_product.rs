//! Product library entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Candidate, CandidateSource, Category};

/// How an entry got into the library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductOrigin {
    Seed,
    Ai,
    Web,
    Correction,
}

impl ProductOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductOrigin::Seed => "seed",
            ProductOrigin::Ai => "ai",
            ProductOrigin::Web => "web",
            ProductOrigin::Correction => "correction",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "ai" => ProductOrigin::Ai,
            "web" => ProductOrigin::Web,
            "correction" => ProductOrigin::Correction,
            _ => ProductOrigin::Seed,
        }
    }

    pub fn from_source(source: CandidateSource) -> Self {
        match source {
            CandidateSource::Ai => ProductOrigin::Ai,
            CandidateSource::Web => ProductOrigin::Web,
            CandidateSource::Library => ProductOrigin::Correction,
        }
    }
}

/// A previously seen brand/product pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibraryProduct {
    pub id: Uuid,
    pub brand: String,
    pub name: String,
    pub category: Category,
    pub model_number: Option<String>,
    pub aliases: Vec<String>,
    pub keywords: Vec<String>,
    pub origin: ProductOrigin,
    pub confidence: f32,
    pub times_seen: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LibraryProduct {
    pub fn new(brand: impl Into<String>, name: impl Into<String>, category: Category, origin: ProductOrigin) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            brand: brand.into(),
            name: name.into(),
            category,
            model_number: None,
            aliases: Vec::new(),
            keywords: Vec::new(),
            origin,
            confidence: 1.0,
            times_seen: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// "Brand Name" as people would type it
    pub fn full_name(&self) -> String {
        format!("{} {}", self.brand, self.name)
    }

    pub fn to_candidate(&self, confidence: f32) -> Candidate {
        let mut candidate = Candidate::new(
            Some(self.brand.clone()),
            self.name.clone(),
            self.category,
            confidence,
            CandidateSource::Library,
        );
        candidate.model = self.model_number.clone();
        candidate
    }
}

/// Entry of the JSON seed file loaded at startup
#[derive(Debug, Clone, Deserialize)]
pub struct SeedProduct {
    pub brand: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub model_number: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl From<SeedProduct> for LibraryProduct {
    fn from(seed: SeedProduct) -> Self {
        let category = seed
            .category
            .as_deref()
            .map(Category::from_label)
            .unwrap_or_default();
        let mut product = LibraryProduct::new(seed.brand, seed.name, category, ProductOrigin::Seed);
        product.model_number = seed.model_number;
        product.aliases = seed.aliases;
        product.keywords = seed.keywords;
        product
    }
}
