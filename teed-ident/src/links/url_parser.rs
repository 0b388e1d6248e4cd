//! Product URL parsing
//!
//! Picks the path segment most likely to be the product slug, turns it into
//! a readable name and scores how much the URL alone tells us.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use serde::Serialize;
use thiserror::Error;

use super::domains::{clean_host, lookup_domain};
use crate::text::brands::{COLORS, BRANDS};
use crate::types::Category;

/// Segments that usually precede (or, for `dp`, follow) a product slug
const PRODUCT_PATH_INDICATORS: &[&str] = &[
    "p", "product", "products", "pd", "dp", "item", "items", "detail", "details", "view", "gp",
];

/// Segments that are never product slugs
const NON_PRODUCT_PATHS: &[&str] = &[
    "shop", "buy", "store", "category", "categories", "collection", "collections", "men", "women",
    "mens", "womens", "kids", "sale", "new", "featured", "search", "cart", "checkout", "account",
    "help", "about",
];

/// Single words that are certainly categories
const PURE_CATEGORY_WORDS: &[&str] = &[
    "men", "women", "mens", "womens", "unisex", "boys", "girls", "kids", "children", "tops",
    "bottoms", "pants", "shorts", "joggers", "jackets", "hoodies", "shirts", "shoes", "sneakers",
    "boots", "sandals", "running", "training", "accessories", "bags", "hats", "socks", "new",
    "sale", "featured", "clearance", "outlet", "golf", "tennis", "yoga", "hiking", "outdoor",
    "gym", "fitness",
];

static CATEGORY_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:",
        r"(?:men|women|mens|womens|unisex|boys|girls|kids|children|youth|adult)s?",
        r"|tops|bottoms|pants|shorts|joggers|jackets|hoodies|sweaters|shirts|tees|t-shirts|dresses|skirts|jeans|leggings|activewear",
        r"|shoes|sneakers|boots|sandals|slippers|running|training|casual|dress|athletic",
        r"|accessories|bags|hats|caps|belts|socks|gloves|scarves|sunglasses|watches|jewelry",
        r"|new|sale|featured|trending|bestsellers|bestselling|clearance|outlet|arrivals|latest",
        r"|golf|tennis|yoga|hiking|outdoor|gym|fitness|sports",
        r")$"
    ))
    .expect("category segment pattern is valid")
});

static ID_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:prod\d+|[a-z]{2,4}\d{5,}|sku[-_]?\d+|b0[a-z0-9]{8,10})$")
        .expect("id pattern is valid")
});
static SKU_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z]{2,3}-[a-z0-9]{4,7}$").expect("sku style pattern is valid"));
static FILE_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(?:html?|aspx?|php|jsp)$").expect("extension pattern is valid"));

/// Model number / SKU / ASIN patterns, most specific first
static MODEL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(B0[A-Z0-9]{8,10})\b",
        r"(?i)\b([A-Z]{2,4}\d{4,8})\b",
        r"(?i)\b([A-Z]{2,3}-\d{3,6})\b",
        r"(?i)\b([A-Z]{1,2}\d{2,4}[A-Z]{1,3})\b",
        r"\b(\d{5,10})\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("model pattern is valid"))
    .collect()
});

static COLOR_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b({})\b", COLORS.join("|"))).expect("color pattern is valid")
});
static DEMANDWARE_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)dwvar.*?_color[=_]([^&_]+)").expect("color param pattern is valid"));
static SIZE_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bsize[=_]?([\d.]+)\b").expect("size pattern is valid"));

static MULTI_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_]{2,}").expect("valid"));
static SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_+]").expect("valid"));
static CAMEL_CASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z])([A-Z])").expect("valid"));
static DIGIT_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)([a-zA-Z])").expect("valid"));
static URL_ARTIFACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:html|htm|aspx?|php|jsp)\b").expect("valid"));
static SKU_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+[A-Z]{2,3}\d{3,}$").expect("valid"));
static SIZE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?:xs|s|m|l|xl|xxl|2xl|3xl)\s*$").expect("valid"));

#[derive(Debug, Error, PartialEq)]
pub enum UrlError {
    #[error("Invalid URL: {0}")]
    Invalid(String),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("URL has no host")]
    MissingHost,
}

/// Everything derivable from a product URL without fetching it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedUrl {
    pub url: String,
    pub host: String,
    pub path: String,
    pub brand: Option<String>,
    pub category: Category,
    pub is_retailer: bool,
    pub slug: Option<String>,
    pub product_name: Option<String>,
    pub model_number: Option<String>,
    pub sku: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub confidence: f32,
}

impl ParsedUrl {
    /// Lookup key: host without `www.` plus path, no query or fragment
    pub fn input_key(&self) -> String {
        format!("{}{}", self.host, self.path.trim_end_matches('/')).to_lowercase()
    }

    /// Search query for library and web stages
    pub fn search_query(&self) -> String {
        let parts: Vec<&str> = [self.brand.as_deref(), self.product_name.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            self.slug.clone().unwrap_or_else(|| self.host.clone())
        } else {
            parts.join(" ")
        }
    }
}

/// Parse a product page URL
///
/// A missing scheme is taken as https. Anything other than http(s) is rejected.
pub fn parse_product_url(raw: &str) -> Result<ParsedUrl, UrlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Invalid("empty URL".to_string()));
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&with_scheme).map_err(|e| UrlError::Invalid(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::UnsupportedScheme(url.scheme().to_string()));
    }
    let host = clean_host(url.host_str().ok_or(UrlError::MissingHost)?);
    let domain = lookup_domain(&host);

    let parts: Vec<String> = url
        .path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(|s| s.replace("%20", "-"))
                .collect()
        })
        .unwrap_or_default();
    let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let param = |names: &[&str]| {
        params
            .iter()
            .find(|(k, v)| names.contains(&k.as_str()) && !v.trim().is_empty())
            .map(|(_, v)| v.clone())
    };

    let slug = extract_product_slug(&parts);

    let is_retailer = domain.map(|d| d.is_retailer).unwrap_or(false);
    let domain_brand = domain.and_then(|d| d.brand).map(str::to_string);
    let brand = domain_brand
        .clone()
        .or_else(|| slug.as_deref().and_then(brand_from_slug).map(|b| b.name.to_string()));

    let product_name = humanize_product_slug(slug.as_deref(), brand.as_deref());

    let path = url.path().to_string();
    let model_number = MODEL_PATTERNS
        .iter()
        .find_map(|p| p.captures(&path).and_then(|c| c.get(1)).map(|m| m.as_str().to_string()));
    let sku = param(&["sku", "productId", "id", "pid", "skuId"]);

    let query = url.query().unwrap_or("");
    let color = param(&["color"])
        .filter(|c| c.chars().any(|ch| ch.is_alphabetic()))
        .map(|c| humanize_color_code(&c))
        .or_else(|| COLOR_WORD.captures(&path).map(|c| humanize_color_code(&c[1])))
        .or_else(|| DEMANDWARE_COLOR.captures(query).map(|c| humanize_color_code(&c[1])));
    let size = param(&["size"]).or_else(|| {
        SIZE_PARAM
            .captures(&format!("{}?{}", path, query))
            .map(|c| c[1].to_string())
    });

    let category = match domain.map(|d| d.category) {
        Some(category) if category != Category::Other => category,
        _ => brand
            .as_deref()
            .and_then(|b| BRANDS.iter().find(|e| e.name.eq_ignore_ascii_case(b)))
            .map(|e| e.category)
            .or_else(|| {
                product_name
                    .as_deref()
                    .and_then(|n| crate::text::parse_text(n).category)
            })
            .unwrap_or(Category::Other),
    };

    let confidence = url_confidence(
        domain_brand.is_some() && !is_retailer,
        slug.is_some(),
        product_name.is_some(),
        model_number.is_some(),
    );

    Ok(ParsedUrl {
        url: url.to_string(),
        host,
        path,
        brand,
        category,
        is_retailer,
        slug,
        product_name,
        model_number,
        sku,
        color,
        size,
        confidence,
    })
}

fn url_confidence(brand_site: bool, has_slug: bool, has_name: bool, has_model: bool) -> f32 {
    let mut confidence = 0.3;
    if brand_site {
        confidence += 0.25;
    }
    if has_slug {
        confidence += 0.15;
    }
    if has_name {
        confidence += 0.15;
    }
    if has_model {
        confidence += 0.1;
    }
    f32::min(confidence, 0.85)
}

fn clean_slug(segment: &str) -> String {
    FILE_EXTENSION.replace(segment, "").trim().to_string()
}

fn is_indicator(segment: &str) -> bool {
    PRODUCT_PATH_INDICATORS.contains(&segment.to_lowercase().as_str())
}

/// Higher scores are more likely to be a product name
fn score_slug_candidate(segment: &str) -> i32 {
    let cleaned = clean_slug(segment);
    let lower = cleaned.to_lowercase();
    let mut score: i32 = 0;

    if PURE_CATEGORY_WORDS.contains(&lower.as_str()) {
        score -= 50;
    }
    if CATEGORY_SEGMENT.is_match(&cleaned) {
        score -= 30;
    }
    if ID_LIKE.is_match(&cleaned) {
        score -= 20;
    }
    if SKU_STYLE.is_match(&cleaned) {
        score -= 30;
    }
    if lower.starts_with("ref=") {
        score -= 50;
    }

    if cleaned.contains('-') {
        let hyphens = cleaned.matches('-').count() as i32;
        score += 20 + (hyphens * 5).min(25);
    }
    score += (cleaned.chars().count() as i32).min(50);

    let has_lower = cleaned.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = cleaned.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        score += 10;
    }

    let has_digit = cleaned.chars().any(|c| c.is_ascii_digit());
    if has_digit && cleaned.contains('-') && has_letter_run(&cleaned, 3) {
        score += 10;
    }

    score
}

fn has_letter_run(s: &str, len: usize) -> bool {
    let mut run = 0;
    for c in s.chars() {
        if c.is_alphabetic() {
            run += 1;
            if run >= len {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Pick the product slug from the path
///
/// Segments next to a product indicator win when present (Amazon puts the
/// name before `dp`). Otherwise the best scoring slug-like segment is used.
fn extract_product_slug(parts: &[String]) -> Option<String> {
    for (i, part) in parts.iter().enumerate() {
        if !is_indicator(part) {
            continue;
        }

        let mut candidates: Vec<(&String, i32)> = Vec::new();
        if i > 0 && !is_indicator(&parts[i - 1]) {
            candidates.push((&parts[i - 1], score_slug_candidate(&parts[i - 1])));
        }
        for candidate in parts.iter().skip(i + 1).take(4) {
            if candidate.starts_with('_') || is_indicator(candidate) {
                continue;
            }
            candidates.push((candidate, score_slug_candidate(candidate)));
        }

        if let Some((best, _)) = candidates.into_iter().max_by_key(|(_, score)| *score) {
            return Some(clean_slug(best));
        }
    }

    parts
        .iter()
        .filter(|p| !NON_PRODUCT_PATHS.contains(&p.to_lowercase().as_str()) && p.len() > 3)
        .filter(|p| p.chars().any(|c| c.is_ascii_alphabetic()))
        .map(|p| (p, score_slug_candidate(p)))
        .filter(|(_, score)| *score > 0)
        .max_by_key(|(_, score)| *score)
        .map(|(p, _)| clean_slug(p))
}

/// Brand named at the start of a retailer slug
fn brand_from_slug(slug: &str) -> Option<&'static crate::text::brands::BrandEntry> {
    let normalized = format!(" {} ", slug.replace(['-', '_', '+'], " ").to_lowercase());
    BRANDS
        .iter()
        .filter(|b| b.name.chars().count() > 2)
        .filter(|b| {
            let name = format!(" {} ", b.name.to_lowercase().replace('-', " "));
            normalized.starts_with(&name)
                || b.aliases
                    .iter()
                    .filter(|a| a.len() > 2)
                    .any(|a| normalized.starts_with(&format!(" {} ", a)))
        })
        .max_by_key(|b| b.name.len())
}

/// Turn a slug into a product name, dropping a leading brand
pub fn humanize_product_slug(slug: Option<&str>, brand: Option<&str>) -> Option<String> {
    let slug = slug?;
    if slug.chars().count() < 3 {
        return None;
    }

    let spaced = MULTI_SEPARATOR.replace_all(slug, " - ");
    let spaced = SEPARATOR.replace_all(&spaced, " ");
    let spaced = CAMEL_CASE.replace_all(&spaced, "$1 $2");
    let spaced = DIGIT_LETTER.replace_all(&spaced, "$1 $2");
    let spaced = URL_ARTIFACT.replace_all(&spaced, "");

    let mut humanized = spaced
        .split_whitespace()
        .map(|word| {
            if word == word.to_uppercase() && word.chars().count() <= 5 {
                word.to_string()
            } else {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first
                        .to_uppercase()
                        .chain(chars.flat_map(char::to_lowercase))
                        .collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    humanized = SKU_SUFFIX.replace(&humanized, "").into_owned();
    humanized = SIZE_SUFFIX.replace(&humanized, "").into_owned();

    if let Some(brand) = brand {
        let brand_words = brand.replace('-', " ").to_lowercase();
        if humanized.to_lowercase().starts_with(&brand_words) {
            humanized = humanized
                .chars()
                .skip(brand_words.chars().count())
                .collect::<String>()
                .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '–' | '—' | '|' | ':'))
                .to_string();
        }
    }

    let humanized = humanized.trim().to_string();
    if humanized.chars().count() < 3 {
        None
    } else {
        Some(humanized)
    }
}

fn humanize_color_code(code: &str) -> String {
    let known = match code.to_lowercase().as_str() {
        "blk" => Some("Black"),
        "wht" => Some("White"),
        "nvy" => Some("Navy"),
        "gry" => Some("Gray"),
        "red" => Some("Red"),
        "blu" => Some("Blue"),
        "grn" => Some("Green"),
        "brn" => Some("Brown"),
        "pnk" => Some("Pink"),
        "prp" => Some("Purple"),
        "org" => Some("Orange"),
        "ylw" => Some("Yellow"),
        "slv" => Some("Silver"),
        "gld" => Some("Gold"),
        _ => None,
    };
    if let Some(name) = known {
        return name.to_string();
    }
    if code.len() > 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        return crate::text::title_case(code);
    }
    code.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brand_site_product_page() {
        let parsed = parse_product_url(
            "https://www.nike.com/t/pegasus-41-mens-road-running-shoes-abc123/FD2722-002",
        )
        .unwrap();

        assert_eq!(parsed.host, "nike.com");
        assert_eq!(parsed.brand.as_deref(), Some("Nike"));
        assert!(!parsed.is_retailer);
        assert_eq!(
            parsed.product_name.as_deref(),
            Some("Pegasus 41 Mens Road Running Shoes")
        );
        assert_eq!(parsed.model_number.as_deref(), Some("FD2722"));
        assert!((parsed.confidence - 0.85).abs() < 1e-6);
        assert_eq!(parsed.category, Category::Footwear);
    }

    #[test]
    fn test_amazon_slug_before_dp() {
        let parsed =
            parse_product_url("https://www.amazon.com/Callaway-Paradym-Driver/dp/B0BQJ4ZJ7K?ref=abc")
                .unwrap();

        assert!(parsed.is_retailer);
        assert_eq!(parsed.slug.as_deref(), Some("Callaway-Paradym-Driver"));
        assert_eq!(parsed.brand.as_deref(), Some("Callaway"));
        assert_eq!(parsed.product_name.as_deref(), Some("Paradym Driver"));
        assert_eq!(parsed.model_number.as_deref(), Some("B0BQJ4ZJ7K"));
        assert_eq!(parsed.category, Category::Golf);
        // Retailer: no brand-site bonus
        assert!((parsed.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_indicator_skips_category_segments() {
        let parsed = parse_product_url(
            "https://shop.lululemon.com/p/womens-leggings/Align-Pant-2/_/prod2020012?color=0001",
        )
        .unwrap();

        assert_eq!(parsed.brand.as_deref(), Some("Lululemon"));
        assert_eq!(parsed.slug.as_deref(), Some("Align-Pant-2"));
        assert_eq!(parsed.product_name.as_deref(), Some("Align Pant 2"));
        assert!(parsed.color.is_none());
    }

    #[test]
    fn test_color_param_and_key() {
        let parsed =
            parse_product_url("patagonia.com/product/better-sweater-jacket/25528.html?color=NVY#reviews")
                .unwrap();
        assert_eq!(parsed.color.as_deref(), Some("Navy"));
        assert_eq!(parsed.input_key(), "patagonia.com/product/better-sweater-jacket/25528.html");
        assert_eq!(parsed.search_query(), "Patagonia Better Sweater Jacket");
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(matches!(
            parse_product_url("ftp://files.example.com/a"),
            Err(UrlError::UnsupportedScheme(_))
        ));
        assert!(matches!(parse_product_url("not a url at all"), Err(UrlError::Invalid(_))));
        assert!(matches!(parse_product_url("   "), Err(UrlError::Invalid(_))));
    }

    #[test]
    fn test_unknown_domain_base_confidence() {
        let parsed = parse_product_url("https://example.org/").unwrap();
        assert!(parsed.brand.is_none());
        assert!(parsed.product_name.is_none());
        assert_eq!(parsed.confidence, 0.3);
        assert_eq!(parsed.category, Category::Other);
    }

    #[test]
    fn test_humanize_strips_brand_prefix() {
        assert_eq!(
            humanize_product_slug(Some("taylormade-qi10-max-driver"), Some("TaylorMade")).as_deref(),
            Some("Qi10 Max Driver")
        );
        assert_eq!(humanize_product_slug(Some("ab"), None), None);
    }
}
