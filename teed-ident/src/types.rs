//! Core identification types
//!
//! Candidates, inputs and the outcome returned to callers. Every confidence
//! stored in these types is clamped to [0, 1].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::text::parser::ClarificationQuestion;

/// Clamp a confidence into [0, 1]; NaN becomes 0
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Product category (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Golf,
    Tennis,
    Cycling,
    Running,
    Snow,
    Surf,
    Fitness,
    Activewear,
    Wearables,
    Supplements,
    Tech,
    Audio,
    Gaming,
    Photography,
    Fashion,
    Apparel,
    Footwear,
    Eyewear,
    Bags,
    Watches,
    Beauty,
    Makeup,
    Skincare,
    Haircare,
    Grooming,
    Home,
    Kitchen,
    Bedding,
    Office,
    Outdoor,
    Travel,
    Edc,
    Music,
    Hobbies,
    Books,
    Coffee,
    Food,
    Automotive,
    Baby,
    Pet,
    Other,
}

/// Free-form labels that map onto a category
const CATEGORY_SYNONYMS: &[(&str, Category)] = &[
    ("electronics", Category::Tech),
    ("technology", Category::Tech),
    ("computer", Category::Tech),
    ("computers", Category::Tech),
    ("laptop", Category::Tech),
    ("phone", Category::Tech),
    ("phones", Category::Tech),
    ("headphones", Category::Audio),
    ("earbuds", Category::Audio),
    ("speaker", Category::Audio),
    ("speakers", Category::Audio),
    ("camera", Category::Photography),
    ("cameras", Category::Photography),
    ("shoes", Category::Footwear),
    ("sneakers", Category::Footwear),
    ("boots", Category::Footwear),
    ("clothing", Category::Apparel),
    ("clothes", Category::Apparel),
    ("sunglasses", Category::Eyewear),
    ("glasses", Category::Eyewear),
    ("jewelry", Category::Fashion),
    ("accessories", Category::Fashion),
    ("handbag", Category::Bags),
    ("backpack", Category::Bags),
    ("luggage", Category::Travel),
    ("cosmetics", Category::Makeup),
    ("fragrance", Category::Beauty),
    ("perfume", Category::Beauty),
    ("furniture", Category::Home),
    ("decor", Category::Home),
    ("cookware", Category::Kitchen),
    ("kitchenware", Category::Kitchen),
    ("appliances", Category::Kitchen),
    ("camping", Category::Outdoor),
    ("hiking", Category::Outdoor),
    ("knife", Category::Edc),
    ("knives", Category::Edc),
    ("instrument", Category::Music),
    ("instruments", Category::Music),
    ("guitar", Category::Music),
    ("toys", Category::Hobbies),
    ("games", Category::Gaming),
    ("nutrition", Category::Supplements),
    ("gym", Category::Fitness),
    ("bike", Category::Cycling),
    ("bicycle", Category::Cycling),
    ("ski", Category::Snow),
    ("snowboard", Category::Snow),
    ("skiing", Category::Snow),
    ("smartwatch", Category::Wearables),
    ("dog", Category::Pet),
    ("cat", Category::Pet),
    ("car", Category::Automotive),
    ("shaving", Category::Grooming),
];

impl Category {
    pub const ALL: [Category; 41] = [
        Category::Golf,
        Category::Tennis,
        Category::Cycling,
        Category::Running,
        Category::Snow,
        Category::Surf,
        Category::Fitness,
        Category::Activewear,
        Category::Wearables,
        Category::Supplements,
        Category::Tech,
        Category::Audio,
        Category::Gaming,
        Category::Photography,
        Category::Fashion,
        Category::Apparel,
        Category::Footwear,
        Category::Eyewear,
        Category::Bags,
        Category::Watches,
        Category::Beauty,
        Category::Makeup,
        Category::Skincare,
        Category::Haircare,
        Category::Grooming,
        Category::Home,
        Category::Kitchen,
        Category::Bedding,
        Category::Office,
        Category::Outdoor,
        Category::Travel,
        Category::Edc,
        Category::Music,
        Category::Hobbies,
        Category::Books,
        Category::Coffee,
        Category::Food,
        Category::Automotive,
        Category::Baby,
        Category::Pet,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Golf => "golf",
            Category::Tennis => "tennis",
            Category::Cycling => "cycling",
            Category::Running => "running",
            Category::Snow => "snow",
            Category::Surf => "surf",
            Category::Fitness => "fitness",
            Category::Activewear => "activewear",
            Category::Wearables => "wearables",
            Category::Supplements => "supplements",
            Category::Tech => "tech",
            Category::Audio => "audio",
            Category::Gaming => "gaming",
            Category::Photography => "photography",
            Category::Fashion => "fashion",
            Category::Apparel => "apparel",
            Category::Footwear => "footwear",
            Category::Eyewear => "eyewear",
            Category::Bags => "bags",
            Category::Watches => "watches",
            Category::Beauty => "beauty",
            Category::Makeup => "makeup",
            Category::Skincare => "skincare",
            Category::Haircare => "haircare",
            Category::Grooming => "grooming",
            Category::Home => "home",
            Category::Kitchen => "kitchen",
            Category::Bedding => "bedding",
            Category::Office => "office",
            Category::Outdoor => "outdoor",
            Category::Travel => "travel",
            Category::Edc => "edc",
            Category::Music => "music",
            Category::Hobbies => "hobbies",
            Category::Books => "books",
            Category::Coffee => "coffee",
            Category::Food => "food",
            Category::Automotive => "automotive",
            Category::Baby => "baby",
            Category::Pet => "pet",
            Category::Other => "other",
        }
    }

    /// Map a free-form label onto a category
    ///
    /// Tries the exact name, then known synonyms, then any word of the label
    /// ("golf equipment" -> golf). Anything unrecognized is `Other`.
    pub fn from_label(label: &str) -> Category {
        let label = label.trim().to_lowercase();
        if label.is_empty() {
            return Category::Other;
        }

        if let Some(category) = Self::exact(&label) {
            return category;
        }
        if let Some(category) = Self::synonym(&label) {
            return category;
        }

        let words = label
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty());
        for word in words {
            if let Some(category) = Self::exact(word).or_else(|| Self::synonym(word)) {
                if category != Category::Other {
                    return category;
                }
            }
        }

        Category::Other
    }

    fn exact(label: &str) -> Option<Category> {
        Self::ALL.iter().copied().find(|c| c.as_str() == label)
    }

    fn synonym(label: &str) -> Option<Category> {
        CATEGORY_SYNONYMS
            .iter()
            .find(|(name, _)| *name == label)
            .map(|(_, category)| *category)
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Other
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Category::from_label(s))
    }
}

/// Where a candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Library,
    Ai,
    Web,
}

impl CandidateSource {
    /// Tie-break order when confidences are equal (lower wins)
    pub fn priority(&self) -> u8 {
        match self {
            CandidateSource::Library => 0,
            CandidateSource::Ai => 1,
            CandidateSource::Web => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateSource::Library => "library",
            CandidateSource::Ai => "ai",
            CandidateSource::Web => "web",
        }
    }
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed identification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub brand: Option<String>,
    pub name: String,
    pub category: Category,
    pub confidence: f32,
    pub source: CandidateSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Short human-readable notes on why this candidate was proposed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

impl Candidate {
    pub fn new(
        brand: Option<String>,
        name: impl Into<String>,
        category: Category,
        confidence: f32,
        source: CandidateSource,
    ) -> Self {
        Self {
            brand: brand.filter(|b| !b.trim().is_empty()),
            name: name.into(),
            category,
            confidence: clamp_confidence(confidence),
            source,
            model: None,
            color: None,
            url: None,
            image_url: None,
            reasons: Vec::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    /// Key used to merge duplicates across stages: normalized brand + name
    pub fn merge_key(&self) -> String {
        let brand = self
            .brand
            .as_deref()
            .map(crate::text::normalize_text)
            .unwrap_or_default();
        format!("{}|{}", brand, crate::text::normalize_text(&self.name))
    }

    /// "Brand Name", or just the name when the brand is unknown
    pub fn display_name(&self) -> String {
        match &self.brand {
            Some(brand) => format!("{} {}", brand, self.name),
            None => self.name.clone(),
        }
    }
}

/// Raw caller input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum IdentifyInput {
    Text(String),
    Url(String),
    /// Base64 payload or `data:` URL
    Image(String),
}

impl IdentifyInput {
    pub fn kind(&self) -> &'static str {
        match self {
            IdentifyInput::Text(_) => "text",
            IdentifyInput::Url(_) => "url",
            IdentifyInput::Image(_) => "image",
        }
    }
}

/// Body of `POST /api/identify`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyRequest {
    pub input: IdentifyInput,
    /// Extra description from the caller ("it's in my golf bag")
    #[serde(default)]
    pub context: Option<String>,
    /// Category label the caller believes applies
    #[serde(default)]
    pub category_hint: Option<String>,
}

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Correction,
    Library,
    Ai,
    Web,
}

impl StageKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "correction" => Some(StageKind::Correction),
            "library" => Some(StageKind::Library),
            "ai" => Some(StageKind::Ai),
            "web" => Some(StageKind::Web),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Correction => "correction",
            StageKind::Library => "library",
            StageKind::Ai => "ai",
            StageKind::Web => "web",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage that failed or timed out; the pipeline moved on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: StageKind,
    pub message: String,
}

/// Result of one identification request
#[derive(Debug, Clone, Serialize)]
pub struct IdentificationOutcome {
    pub request_id: Uuid,
    pub candidates: Vec<Candidate>,
    pub clarification_needed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<ClarificationQuestion>,
    /// Last stage that ran
    pub stage_reached: Option<StageKind>,
    pub stage_errors: Vec<StageFailure>,
    pub elapsed_ms: u64,
}

impl IdentificationOutcome {
    pub fn top_confidence(&self) -> f32 {
        self.candidates.first().map(|c| c.confidence).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_label() {
        assert_eq!(Category::from_label("golf"), Category::Golf);
        assert_eq!(Category::from_label("  Golf Equipment "), Category::Golf);
        assert_eq!(Category::from_label("Electronics"), Category::Tech);
        assert_eq!(Category::from_label("running shoes"), Category::Running);
        assert_eq!(Category::from_label("trail sneakers"), Category::Footwear);
        assert_eq!(Category::from_label("spaceship parts"), Category::Other);
        assert_eq!(Category::from_label(""), Category::Other);
    }

    #[test]
    fn test_category_serde_lowercase() {
        let json = serde_json::to_string(&Category::Edc).unwrap();
        assert_eq!(json, "\"edc\"");
        let parsed: Category = serde_json::from_str("\"photography\"").unwrap();
        assert_eq!(parsed, Category::Photography);
    }

    #[test]
    fn test_candidate_confidence_clamped() {
        let high = Candidate::new(None, "Thing", Category::Other, 1.7, CandidateSource::Ai);
        assert_eq!(high.confidence, 1.0);
        let low = Candidate::new(None, "Thing", Category::Other, -0.2, CandidateSource::Ai);
        assert_eq!(low.confidence, 0.0);
        let nan = Candidate::new(None, "Thing", Category::Other, f32::NAN, CandidateSource::Ai);
        assert_eq!(nan.confidence, 0.0);
    }

    #[test]
    fn test_blank_brand_dropped() {
        let c = Candidate::new(Some("  ".into()), "Thing", Category::Other, 0.5, CandidateSource::Web);
        assert!(c.brand.is_none());
    }

    #[test]
    fn test_merge_key_ignores_case_and_spacing() {
        let a = Candidate::new(Some("TaylorMade".into()), "Qi10  Driver", Category::Golf, 0.9, CandidateSource::Ai);
        let b = Candidate::new(Some("taylormade".into()), "qi10 driver.", Category::Golf, 0.5, CandidateSource::Web);
        assert_eq!(a.merge_key(), b.merge_key());
    }

    #[test]
    fn test_identify_input_tagged_json() {
        let input: IdentifyInput =
            serde_json::from_str(r#"{"type":"url","value":"https://nike.com/t/x"}"#).unwrap();
        assert_eq!(input, IdentifyInput::Url("https://nike.com/t/x".into()));
        assert_eq!(input.kind(), "url");
    }
}
