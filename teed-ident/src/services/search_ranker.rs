//! Web search result ranking
//!
//! ```text
//! confidence = min(cap, 0.5 x domain trust + 0.5 x keyword overlap)
//! ```
//! Domain trust comes from the domain table: the brand's own site 1.0, a
//! known retailer 0.8, anything else 0.4. Keyword overlap is the share of
//! query tokens found in the result title and snippet.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use super::google_search_client::SearchResult;
use crate::links::{domain_trust, lookup_domain};
use crate::text::{parse_text, title_case, tokenize};
use crate::types::{Candidate, CandidateSource, Category};

static TITLE_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+[|–—:\-]\s+|\s*\|\s*").expect("separator pattern is valid"));
static TRAILING_DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[\s.|:\-]*\b[\w-]+\.(?:com|net|org|co\.uk|ca|de|eu)\b\.?\s*$").expect("domain pattern is valid")
});
static LEADING_DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[\w-]+\.(?:com|net|org|co\.uk|ca|de|eu)\s*:\s*").expect("domain pattern is valid")
});
static SHOP_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:buy|shop|new)\s+").expect("prefix pattern is valid"));

/// Context a ranker uses beyond the raw results
#[derive(Debug, Clone, Default)]
pub struct RankingContext<'a> {
    pub query: &'a str,
    /// Best candidate from an earlier stage, if any
    pub prior: Option<&'a Candidate>,
    pub category_hint: Option<Category>,
    pub confidence_cap: f32,
}

/// Share of query tokens present in `text`
pub fn keyword_overlap(query: &str, text: &str) -> f32 {
    let query_tokens: HashSet<String> = tokenize(query).into_iter().filter(|t| t.len() > 1).collect();
    if query_tokens.is_empty() {
        return 0.0;
    }
    let text_tokens: HashSet<String> = tokenize(text).into_iter().collect();
    let hits = query_tokens.iter().filter(|t| text_tokens.contains(*t)).count();
    hits as f32 / query_tokens.len() as f32
}

/// Product name from a result title, site names and shop prefixes removed
pub fn clean_title(title: &str, host: &str) -> String {
    let title = LEADING_DOMAIN.replace(title.trim(), "");
    let title = TRAILING_DOMAIN.replace(&title, "");

    let site_label = host.split('.').next().unwrap_or_default().to_lowercase();
    let site_brand = lookup_domain(host).and_then(|d| d.brand).map(str::to_lowercase);

    let looks_like_site = |segment: &str| {
        let lower = segment.trim().to_lowercase();
        lower.is_empty()
            || lower == site_label
            || site_brand.as_deref() == Some(lower.as_str())
            || lower.contains("official site")
            || lower.contains("free shipping")
            || (lower.contains('.') && !lower.contains(' '))
    };

    let segments: Vec<&str> = TITLE_SEPARATORS.split(&title).collect();
    let chosen = segments
        .iter()
        .copied()
        .find(|segment| !looks_like_site(segment))
        .unwrap_or(title.as_ref());

    SHOP_PREFIX.replace(chosen.trim(), "").trim().to_string()
}

/// Turn search results into web candidates, best first
pub fn rank_results(results: &[SearchResult], context: &RankingContext<'_>) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = results
        .iter()
        .filter_map(|result| rank_one(result, context))
        .collect();

    candidates.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));

    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(c.merge_key()));
    candidates
}

fn rank_one(result: &SearchResult, context: &RankingContext<'_>) -> Option<Candidate> {
    let url = reqwest::Url::parse(&result.link).ok()?;
    let host = crate::links::domains::clean_host(url.host_str()?);
    let domain = lookup_domain(&host);

    let name = clean_title(&result.title, &host);
    if name.is_empty() {
        return None;
    }
    let parsed = parse_text(&name);

    let brand: Option<String> = domain
        .filter(|d| !d.is_retailer)
        .and_then(|d| d.brand)
        .map(str::to_string)
        .or_else(|| parsed.brand_name().map(str::to_string))
        .or_else(|| context.prior.and_then(|p| p.brand.clone()));

    let name = strip_brand_prefix(&name, brand.as_deref());

    let category = domain
        .map(|d| d.category)
        .filter(|c| *c != Category::Other)
        .or(context.category_hint)
        .or(context.prior.map(|p| p.category))
        .or(parsed.category)
        .unwrap_or_default();

    let trust = domain_trust(&host, brand.as_deref());
    let overlap = keyword_overlap(context.query, &format!("{} {}", result.title, result.snippet));
    let confidence = (0.5 * trust + 0.5 * overlap).min(context.confidence_cap);

    Some(
        Candidate::new(brand, name, category, confidence, CandidateSource::Web)
            .with_url(result.link.clone())
            .with_reason(format!("web result from {}", host)),
    )
}

fn strip_brand_prefix(name: &str, brand: Option<&str>) -> String {
    let Some(brand) = brand else {
        return title_case_if_lower(name);
    };
    let prefix = format!("{} ", brand.to_lowercase());
    if name.to_lowercase().starts_with(&prefix) {
        if let Some(rest) = name.get(prefix.len()..).map(str::trim).filter(|r| !r.is_empty()) {
            return title_case_if_lower(rest);
        }
    }
    title_case_if_lower(name)
}

fn title_case_if_lower(name: &str) -> String {
    if name.chars().any(|c| c.is_uppercase()) {
        name.to_string()
    } else {
        title_case(name)
    }
}
