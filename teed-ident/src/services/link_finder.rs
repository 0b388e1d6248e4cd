//! Purchase link recommendations
//!
//! New products point at official stores and mainstream retailers; used and
//! vintage ones at second-hand marketplaces. The model builds search URLs;
//! when it fails or returns nothing usable, the caller gets a Google Shopping
//! search instead.

use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use super::model::{ModelRequest, ProductModel};
use super::prompts::strip_code_fences;
use crate::text::tokenize;

const MAX_RECOMMENDATIONS: usize = 4;
const FALLBACK_PRIORITY: u8 = 10;
/// Products older than this many years count as vintage
const VINTAGE_AGE_YEARS: i32 = 5;

const VINTAGE_KEYWORDS: &[&str] = &[
    "vintage",
    "retro",
    "classic",
    "old",
    "original",
    "legacy",
    "discontinued",
    "rare",
];
const OLD_TAYLORMADE_MODELS: &[&str] = &["r7", "r9", "r11", "r1", "burner", "rocketballz"];

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("year pattern is valid"));

const SYSTEM_PROMPT: &str = r#"You find the best places to buy a product online. Recommend genuine,
useful sources rather than defaulting to Amazon.

- New products: official brand stores, Amazon, category specialists (REI, PGA Tour
  Superstore, Best Buy, B&H Photo, Sweetwater, Sephora, Nordstrom).
- Used or vintage products: eBay and specialist pre-owned markets (2nd Swing Golf,
  Reverb, Grailed, Poshmark, Swappa, Back Market). Vintage items are rarely on Amazon.

Build real search URLs with the query URL-encoded, never bare homepages.
Respond with JSON only:
{
  "recommendations": [
    {"url": "https://www.ebay.com/sch/i.html?_nkw=...", "source": "ebay",
     "reason": "Best marketplace for used golf clubs", "label": "Find on eBay",
     "priority": 1, "affiliatable": true}
  ],
  "reasoning": "Vintage driver, so pre-owned markets come first"
}
Give 2 to 4 recommendations; priority 1 is the best."#;

/// Product to find purchase links for
#[derive(Debug, Clone, Deserialize)]
pub struct LinkRequest {
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Caller wants used condition
    #[serde(default)]
    pub used: bool,
    /// Overrides age detection when set
    #[serde(default)]
    pub vintage: Option<bool>,
}

impl LinkRequest {
    fn description(&self) -> String {
        match self.brand.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            Some(brand) => format!("{} {}", brand, self.name.trim()),
            None => self.name.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecommendation {
    pub url: String,
    /// "manufacturer", "amazon", "ebay", "specialty", "google"...
    pub source: String,
    pub reason: String,
    pub label: String,
    /// 1 is best
    pub priority: u8,
    pub affiliatable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductAge {
    pub is_vintage: bool,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkResult {
    pub recommendations: Vec<LinkRecommendation>,
    pub primary_link: LinkRecommendation,
    pub reasoning: String,
    pub product_age: ProductAge,
    /// True when the model was not used or failed
    pub fallback: bool,
}

pub struct LinkFinder {
    model: Arc<dyn ProductModel>,
}

impl LinkFinder {
    pub fn new(model: Arc<dyn ProductModel>) -> Self {
        Self { model }
    }

    /// Recommend where to buy a product
    ///
    /// Always returns at least one link.
    pub async fn find_links(&self, request: &LinkRequest) -> LinkResult {
        let description = request.description();
        let age = detect_product_age(&request.name, request.brand.as_deref());
        let vintage = request.vintage.unwrap_or(age.is_vintage);

        match self.ask_model(request, &description, vintage).await {
            Ok((recommendations, reasoning)) if !recommendations.is_empty() => {
                let primary_link = recommendations[0].clone();
                LinkResult {
                    recommendations,
                    primary_link,
                    reasoning,
                    product_age: age,
                    fallback: false,
                }
            }
            Ok(_) => {
                warn!(product = %description, "Model returned no usable links");
                fallback_result(&description, age)
            }
            Err(e) => {
                warn!(product = %description, error = %e, "Link recommendation failed");
                fallback_result(&description, age)
            }
        }
    }

    async fn ask_model(
        &self,
        request: &LinkRequest,
        description: &str,
        vintage: bool,
    ) -> Result<(Vec<LinkRecommendation>, String), String> {
        let mut prompt = format!("Find the best places to buy this product:\n\nProduct: \"{}\"\n", description);
        if let Some(category) = request.category.as_deref().filter(|c| !c.trim().is_empty()) {
            prompt.push_str(&format!("Category: {}\n", category.trim()));
        }
        if vintage {
            prompt.push_str("This is a vintage or older product\n");
        }
        if request.used {
            prompt.push_str("The buyer wants used condition\n");
        }
        prompt.push_str("\nProvide real search URLs, not homepages.");

        let reply = self
            .model
            .complete(&ModelRequest::text("find_links", SYSTEM_PROMPT, prompt))
            .await
            .map_err(|e| e.to_string())?;
        parse_recommendations(&reply.text)
    }
}

/// Parse and sanitize the model's recommendations, best first
///
/// Entries without an http(s) URL are dropped. Missing fields get defaults:
/// source "unknown", label "Find Product", priority 5, affiliatable true.
pub fn parse_recommendations(text: &str) -> Result<(Vec<LinkRecommendation>, String), String> {
    let value: Value =
        serde_json::from_str(strip_code_fences(text)).map_err(|e| format!("model reply is not JSON: {}", e))?;

    let str_field = |entry: &Value, key: &str| entry.get(key).and_then(Value::as_str).map(str::trim).unwrap_or("").to_string();

    let mut recommendations: Vec<LinkRecommendation> = value
        .get("recommendations")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let url = str_field(entry, "url");
                    let parsed = reqwest::Url::parse(&url).ok()?;
                    if !matches!(parsed.scheme(), "http" | "https") {
                        return None;
                    }
                    let non_empty = |s: String, default: &str| if s.is_empty() { default.to_string() } else { s };
                    Some(LinkRecommendation {
                        url,
                        source: non_empty(str_field(entry, "source"), "unknown"),
                        reason: str_field(entry, "reason"),
                        label: non_empty(str_field(entry, "label"), "Find Product"),
                        priority: entry
                            .get("priority")
                            .and_then(Value::as_u64)
                            .filter(|p| *p > 0)
                            .map(|p| p.min(u64::from(u8::MAX)) as u8)
                            .unwrap_or(5),
                        affiliatable: entry.get("affiliatable").and_then(Value::as_bool).unwrap_or(true),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    recommendations.sort_by_key(|r| r.priority);
    recommendations.truncate(MAX_RECOMMENDATIONS);

    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .filter(|r| !r.trim().is_empty())
        .unwrap_or("Generated purchase recommendations")
        .to_string();

    Ok((recommendations, reasoning))
}

/// Google Shopping search for a product description
pub fn shopping_search_link(description: &str) -> LinkRecommendation {
    let url = reqwest::Url::parse_with_params("https://www.google.com/search", &[("tbm", "shop"), ("q", description)])
        .map(|u| u.to_string())
        .unwrap_or_else(|_| "https://www.google.com/search?tbm=shop".to_string());
    LinkRecommendation {
        url,
        source: "google".to_string(),
        reason: "Fallback search".to_string(),
        label: "Find on Google Shopping".to_string(),
        priority: FALLBACK_PRIORITY,
        affiliatable: false,
    }
}

fn fallback_result(description: &str, age: ProductAge) -> LinkResult {
    let link = shopping_search_link(description);
    LinkResult {
        recommendations: vec![link.clone()],
        primary_link: link,
        reasoning: "Using fallback search".to_string(),
        product_age: age,
        fallback: true,
    }
}

/// Guess whether a product is vintage from its name and brand
pub fn detect_product_age(name: &str, brand: Option<&str>) -> ProductAge {
    detect_product_age_in(name, brand, chrono::Utc::now().year())
}

fn detect_product_age_in(name: &str, brand: Option<&str>, current_year: i32) -> ProductAge {
    let lower = name.to_lowercase();

    if let Some(year) = YEAR
        .captures(&lower)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok())
    {
        let age = current_year - year;
        if age > VINTAGE_AGE_YEARS {
            return ProductAge {
                is_vintage: true,
                confidence: 0.9,
                reason: Some(format!("Product from {} ({} years old)", year, age)),
            };
        }
    }

    let words = tokenize(&lower);
    if let Some(keyword) = VINTAGE_KEYWORDS.iter().find(|k| words.iter().any(|w| w == *k)) {
        return ProductAge {
            is_vintage: true,
            confidence: 0.7,
            reason: Some(format!("Contains vintage indicator \"{}\"", keyword)),
        };
    }

    if brand.map(|b| b.to_lowercase().contains("taylormade")).unwrap_or(false) {
        if let Some(model) = OLD_TAYLORMADE_MODELS.iter().find(|m| words.iter().any(|w| w == *m)) {
            return ProductAge {
                is_vintage: true,
                confidence: 0.8,
                reason: Some(format!("Old TaylorMade model {}", model)),
            };
        }
    }

    ProductAge {
        is_vintage: false,
        confidence: 0.9,
        reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::model::testing::ScriptedModel;

    fn request(name: &str, brand: Option<&str>) -> LinkRequest {
        LinkRequest {
            name: name.to_string(),
            brand: brand.map(str::to_string),
            category: Some("golf".to_string()),
            used: false,
            vintage: None,
        }
    }

    #[test]
    fn test_detect_product_age() {
        let by_year = detect_product_age_in("1998 Titleist 975D driver", None, 2026);
        assert!(by_year.is_vintage);
        assert_eq!(by_year.reason.as_deref(), Some("Product from 1998 (28 years old)"));

        assert!(!detect_product_age_in("2024 Qi10 driver", None, 2026).is_vintage);
        assert!(detect_product_age_in("Classic Wayfarer", None, 2026).is_vintage);
        // "old" must be a whole word
        assert!(!detect_product_age_in("Gold Rush putter", None, 2026).is_vintage);

        let burner = detect_product_age_in("Burner driver", Some("TaylorMade"), 2026);
        assert!(burner.is_vintage);
        assert_eq!(burner.confidence, 0.8);
        assert!(!detect_product_age_in("Burner driver", Some("Callaway"), 2026).is_vintage);
    }

    #[test]
    fn test_parse_recommendations_sorts_and_sanitizes() {
        let reply = r#"{
            "recommendations": [
                {"url": "https://www.2ndswing.com/search?query=r7", "source": "specialty", "priority": 2, "affiliatable": false},
                {"url": "javascript:alert(1)", "priority": 1},
                {"url": "https://www.ebay.com/sch/i.html?_nkw=taylormade+r7", "source": "ebay", "label": "Find on eBay", "priority": 1}
            ],
            "reasoning": "Old driver"
        }"#;
        let (recs, reasoning) = parse_recommendations(reply).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].source, "ebay");
        assert!(recs[0].affiliatable);
        assert_eq!(recs[1].label, "Find Product");
        assert_eq!(reasoning, "Old driver");
    }

    #[test]
    fn test_shopping_search_link_encodes_query() {
        let link = shopping_search_link("Arc'teryx Beta LT & more");
        assert!(link.url.starts_with("https://www.google.com/search?tbm=shop&q="));
        assert!(!link.url.contains(' '));
        assert!(link.url.contains("%26"));
        assert!(!link.affiliatable);
    }

    #[tokio::test]
    async fn test_model_links_used() {
        let model = Arc::new(ScriptedModel::new(
            "openai",
            vec![Ok(r#"{"recommendations":[{"url":"https://www.ebay.com/sch/i.html?_nkw=r7","source":"ebay","priority":1}]}"#.to_string())],
        ));
        let finder = LinkFinder::new(model.clone());
        let result = finder.find_links(&request("R7 Driver", Some("TaylorMade"))).await;

        assert!(!result.fallback);
        assert_eq!(result.primary_link.source, "ebay");
        assert!(result.product_age.is_vintage);
        let prompt = model.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("vintage"));
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_shopping_search() {
        let finder = LinkFinder::new(Arc::new(ScriptedModel::new("openai", vec![Err(503)])));
        let result = finder.find_links(&request("Qi10 Driver", Some("TaylorMade"))).await;

        assert!(result.fallback);
        assert_eq!(result.recommendations.len(), 1);
        assert_eq!(result.primary_link.source, "google");
        assert!(result.primary_link.url.contains("TaylorMade+Qi10+Driver"));
    }
}
