//! Free-text product parser
//!
//! Pulls a brand, color, specifications and category out of a typed
//! description such as "calaway paradym driver 10.5° stiff flex", then
//! decides whether the caller should be asked a follow-up question.
//!
//! # Confidence
//! ```text
//! 0.3 base
//! + 0.35 x brand confidence
//! + 0.25 x product name confidence
//! + min(0.1 x specs, 0.2)
//! + 0.1 x category confidence
//! capped at 0.98
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::brands::{category_brand_suggestions, BRANDS, CATEGORY_KEYWORDS, COLORS, NOISE_WORDS};
use super::normalize::{normalize_text, title_case};
use super::similarity::within_one_edit;
use crate::types::Category;

/// Brand names that are also everyday words; only trusted as the first word
const AMBIGUOUS_BRANDS: &[&str] = &["on", "head", "away", "apple", "google", "omega", "brooks"];

static SPECIFICATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b\d+(?:\.\d+)?\s?(?:°|(?:degrees|degree|deg)\b)",
        r"\b\d+(?:\.\d+)?\s?(?:oz|ml|kg|lbs|lb|mm|cm|gb|tb|mah|g|l|w)\b",
        r"\bsize\s+\d+(?:\.\d+)?\b",
        r"\b(?:x-stiff|stiff|regular|senior|ladies)\s+flex\b",
        r"\b(?:left|right)[\s-]hand(?:ed)?\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("specification pattern is valid"))
    .collect()
});

static CLUB_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)driver|iron|wedge|wood|hybrid|putter").expect("club pattern is valid"));

/// Brand recognized in the input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandMatch {
    pub name: String,
    pub category: Category,
    pub confidence: f32,
    /// The misspelled word when matched by edit distance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected_from: Option<String>,
}

/// Follow-up question offered when the input is too vague
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub priority: u8,
}

/// Structured view of a typed description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedText {
    pub original: String,
    pub normalized: String,
    pub brand: Option<BrandMatch>,
    pub product_name: Option<String>,
    pub category: Option<Category>,
    pub color: Option<String>,
    pub specifications: Vec<String>,
    pub parse_confidence: f32,
}

/// Parse a free-text description
pub fn parse_text(input: &str) -> ParsedText {
    let normalized = normalize_text(input);
    let mut parsed = ParsedText {
        original: input.to_string(),
        normalized: normalized.clone(),
        brand: None,
        product_name: None,
        category: None,
        color: None,
        specifications: Vec::new(),
        parse_confidence: 0.0,
    };
    if normalized.is_empty() {
        return parsed;
    }

    let mut remaining = normalized.clone();
    for pattern in SPECIFICATION_PATTERNS.iter() {
        parsed
            .specifications
            .extend(pattern.find_iter(&remaining).map(|m| m.as_str().to_string()));
        remaining = pattern.replace_all(&remaining, " ").into_owned();
    }

    let mut words: Vec<String> = remaining
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'').to_string())
        .filter(|w| !w.is_empty())
        .collect();

    parsed.brand = match_brand(&mut words);

    if let Some(pos) = words.iter().position(|w| COLORS.contains(&w.as_str())) {
        parsed.color = Some(title_case(&words.remove(pos)));
    }

    let (category, category_confidence) = match infer_category(&words) {
        Some(category) => (Some(category), 0.9),
        None => match &parsed.brand {
            Some(brand) => (Some(brand.category), 0.7),
            None => (None, 0.0),
        },
    };
    parsed.category = category;

    let name_words: Vec<&str> = words
        .iter()
        .map(String::as_str)
        .filter(|w| !NOISE_WORDS.contains(w))
        .collect();
    let product_confidence = if name_words.is_empty() {
        0.0
    } else if name_words.len() >= 2 || name_words.iter().any(|w| w.chars().any(|c| c.is_ascii_digit())) {
        0.8
    } else {
        0.6
    };
    if !name_words.is_empty() {
        parsed.product_name = Some(title_case(&name_words.join(" ")));
    }

    parsed.parse_confidence = overall_confidence(
        parsed.brand.as_ref().map(|b| b.confidence).unwrap_or(0.0),
        product_confidence,
        parsed.specifications.len(),
        category_confidence,
    );
    parsed
}

fn overall_confidence(brand: f32, product: f32, spec_count: usize, category: f32) -> f32 {
    let mut confidence = 0.3;
    confidence += brand * 0.35;
    confidence += product * 0.25;
    confidence += (spec_count as f32 * 0.1).min(0.2);
    confidence += category * 0.1;
    confidence.min(0.98)
}

/// Longest brand phrase present in `words`; matched words are removed
fn match_brand(words: &mut Vec<String>) -> Option<BrandMatch> {
    // (start, len, brand index, exact name?)
    let mut best: Option<(usize, usize, usize, bool)> = None;

    for (index, brand) in BRANDS.iter().enumerate() {
        let name = brand.name.to_lowercase();
        let phrases = std::iter::once((name.as_str(), true))
            .chain(brand.aliases.iter().map(|a| (*a, false)));

        for (phrase, exact) in phrases {
            let tokens: Vec<&str> = phrase.split_whitespace().collect();
            let Some(start) = find_phrase(words, &tokens) else {
                continue;
            };
            if tokens.len() == 1 && start != 0 && AMBIGUOUS_BRANDS.contains(&tokens[0]) {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, len, _, _)) => tokens.len() > len,
            };
            if better {
                best = Some((start, tokens.len(), index, exact));
            }
        }
    }

    if let Some((start, len, index, exact)) = best {
        let brand = &BRANDS[index];
        words.drain(start..start + len);
        return Some(BrandMatch {
            name: brand.name.to_string(),
            category: brand.category,
            confidence: if exact { 1.0 } else { 0.95 },
            corrected_from: None,
        });
    }

    // Typo tolerance for longer single-word brands
    for pos in 0..words.len() {
        if words[pos].chars().count() < 5 {
            continue;
        }
        let found = BRANDS.iter().find(|b| {
            let name = b.name.to_lowercase();
            !name.contains(' ') && name.chars().count() >= 5 && within_one_edit(&words[pos], &name)
        });
        if let Some(brand) = found {
            let typed = words.remove(pos);
            return Some(BrandMatch {
                name: brand.name.to_string(),
                category: brand.category,
                confidence: 0.8,
                corrected_from: Some(typed),
            });
        }
    }

    None
}

fn find_phrase(words: &[String], tokens: &[&str]) -> Option<usize> {
    if tokens.is_empty() || tokens.len() > words.len() {
        return None;
    }
    (0..=words.len() - tokens.len())
        .find(|&start| tokens.iter().enumerate().all(|(i, t)| words[start + i] == *t))
}

/// Category of the last keyword in the text (the head noun usually comes last)
fn infer_category(words: &[String]) -> Option<Category> {
    words.iter().rev().find_map(|word| {
        CATEGORY_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.contains(&word.as_str()))
            .map(|(category, _)| *category)
    })
}

impl ParsedText {
    pub fn brand_name(&self) -> Option<&str> {
        self.brand.as_ref().map(|b| b.name.as_str())
    }

    /// Query for library and web search: brand plus product name
    pub fn search_query(&self) -> String {
        let query = [self.brand_name(), self.product_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if query.trim().is_empty() {
            self.normalized.clone()
        } else {
            query
        }
    }

    /// True when the input is too generic to identify reliably
    pub fn needs_clarification(&self) -> bool {
        if self.brand.is_none() && self.original.split_whitespace().count() <= 2 {
            return true;
        }
        if self.parse_confidence < 0.5 {
            return true;
        }
        if self.brand.is_none() && self.category.is_none() {
            return true;
        }
        self.product_name.is_none() && self.brand.is_none() && self.specifications.is_empty()
    }

    /// Questions that would fill in what is missing, most useful first
    pub fn clarification_questions(&self) -> Vec<ClarificationQuestion> {
        let mut questions = Vec::new();

        if self.brand.is_none() {
            let suggestions = self.category.map(category_brand_suggestions).unwrap_or(&[]);
            if !suggestions.is_empty() {
                let mut options: Vec<String> =
                    suggestions.iter().take(3).map(|s| s.to_string()).collect();
                options.push("Any".to_string());
                questions.push(ClarificationQuestion {
                    id: "brand_preference".to_string(),
                    question: "Any brand preference?".to_string(),
                    options,
                    priority: 1,
                });
            }
        }

        if self.category.is_none() {
            questions.push(ClarificationQuestion {
                id: "category".to_string(),
                question: "What type of product is this?".to_string(),
                options: ["Golf", "Fashion", "Tech", "Beauty", "Other"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                priority: 2,
            });
        }

        if self.category == Some(Category::Golf)
            && self.specifications.is_empty()
            && CLUB_WORDS.is_match(&self.original)
        {
            questions.push(ClarificationQuestion {
                id: "club_hand".to_string(),
                question: "Right or left handed?".to_string(),
                options: vec!["Right Hand".to_string(), "Left Hand".to_string()],
                priority: 3,
            });
        }

        questions.sort_by_key(|q| q.priority);
        questions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_description() {
        let parsed = parse_text("TaylorMade Qi10 driver 10.5°");

        assert_eq!(parsed.brand_name(), Some("TaylorMade"));
        assert_eq!(parsed.specifications, vec!["10.5°"]);
        assert_eq!(parsed.category, Some(Category::Golf));
        assert_eq!(parsed.product_name.as_deref(), Some("QI10 Driver"));
        assert!((parsed.parse_confidence - 0.98).abs() < 1e-6);
        assert!(!parsed.needs_clarification());
        assert_eq!(parsed.search_query(), "TaylorMade QI10 Driver");
    }

    #[test]
    fn test_multi_word_alias() {
        let parsed = parse_text("north face nuptse jacket");
        assert_eq!(parsed.brand_name(), Some("The North Face"));
        assert_eq!(parsed.brand.as_ref().unwrap().confidence, 0.95);
        assert_eq!(parsed.product_name.as_deref(), Some("Nuptse Jacket"));
        assert_eq!(parsed.category, Some(Category::Apparel));
    }

    #[test]
    fn test_misspelled_brand_corrected() {
        let parsed = parse_text("calaway paradym");
        let brand = parsed.brand.unwrap();
        assert_eq!(brand.name, "Callaway");
        assert_eq!(brand.confidence, 0.8);
        assert_eq!(brand.corrected_from.as_deref(), Some("calaway"));
        // No category keyword, so the brand's category applies
        assert_eq!(parsed.category, Some(Category::Golf));
    }

    #[test]
    fn test_ambiguous_brand_needs_leading_position() {
        let parsed = parse_text("putter head cover");
        assert!(parsed.brand.is_none());

        let parsed = parse_text("on cloudmonster shoes");
        assert_eq!(parsed.brand_name(), Some("On"));
    }

    #[test]
    fn test_color_and_category_from_head_noun() {
        let parsed = parse_text("black running shoes");
        assert!(parsed.brand.is_none());
        assert_eq!(parsed.color.as_deref(), Some("Black"));
        assert_eq!(parsed.category, Some(Category::Footwear));
        assert!(!parsed.needs_clarification());

        let questions = parsed.clarification_questions();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, "brand_preference");
        assert_eq!(questions[0].options, vec!["Nike", "New Balance", "HOKA", "Any"]);
    }

    #[test]
    fn test_vague_golf_club_asks_questions() {
        let parsed = parse_text("driver");
        assert!(parsed.needs_clarification());

        let ids: Vec<String> = parsed.clarification_questions().into_iter().map(|q| q.id).collect();
        assert_eq!(ids, vec!["brand_preference", "club_hand"]);
    }

    #[test]
    fn test_unknown_thing_asks_for_category() {
        let parsed = parse_text("blue thing");
        assert!(parsed.needs_clarification());
        let questions = parsed.clarification_questions();
        assert_eq!(questions[0].id, "category");
    }

    #[test]
    fn test_empty_input() {
        let parsed = parse_text("   ");
        assert_eq!(parsed.parse_confidence, 0.0);
        assert!(parsed.needs_clarification());
        assert_eq!(parsed.search_query(), "");
    }
}
