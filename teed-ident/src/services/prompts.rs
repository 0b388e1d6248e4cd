//! Prompt templates and model response parsing

use serde_json::Value;

use super::input::{PreparedInput, PreparedRequest};
use super::model::ModelRequest;
use crate::types::{Candidate, CandidateSource, Category};

const SYSTEM_PROMPT: &str = "You identify consumer products for people cataloguing what they carry \
and own. Answer only with JSON. Never invent a brand you cannot support from the input; \
use null instead. Confidence is a number between 0 and 1 and must be honest: 0.9+ only \
when brand and exact model are certain.";

const RESPONSE_FORMAT: &str = r#"Respond with JSON in this exact shape:
{
  "suggestions": [
    {
      "brand": "TaylorMade",
      "name": "Qi10 Driver",
      "category": "golf",
      "model": "Qi10",
      "color": "black",
      "confidence": 0.85,
      "reason": "Carbon crown and blue accents match the Qi10 driver"
    }
  ]
}
"name" is the product name without the brand and always includes the item type
(driver, backpack, earbuds...). List up to 3 suggestions, most likely first."#;

fn category_list() -> String {
    Category::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
}

/// Build the AI-stage prompt for a prepared request
pub fn identification_prompt(request: &PreparedRequest) -> ModelRequest {
    let mut prompt = String::new();
    let operation = match &request.input {
        PreparedInput::Text(parsed) => {
            prompt.push_str("Identify the product described below.\n\n");
            prompt.push_str(&format!("Description: \"{}\"\n", parsed.original.trim()));
            if let Some(brand) = parsed.brand_name() {
                prompt.push_str(&format!("Brand detected in the text: {}\n", brand));
            }
            if !parsed.specifications.is_empty() {
                prompt.push_str(&format!("Specifications: {}\n", parsed.specifications.join(", ")));
            }
            if let Some(color) = &parsed.color {
                prompt.push_str(&format!("Color: {}\n", color));
            }
            "identify_text"
        }
        PreparedInput::Url(parsed) => {
            prompt.push_str("Identify the product sold at the URL below. You cannot open it; ");
            prompt.push_str("work from the domain and path.\n\n");
            prompt.push_str(&format!("URL: {}\n", parsed.url));
            if let Some(brand) = &parsed.brand {
                prompt.push_str(&format!("Brand for this domain: {}\n", brand));
            }
            if let Some(name) = &parsed.product_name {
                prompt.push_str(&format!("Name taken from the URL slug: {}\n", name));
            }
            if let Some(model) = &parsed.model_number {
                prompt.push_str(&format!("Model or SKU in the URL: {}\n", model));
            }
            "identify_url"
        }
        PreparedInput::Image(_) => {
            prompt.push_str("Identify the product in this photo. Read any visible logos or text ");
            prompt.push_str("and use the shape to decide the item type.\n");
            "identify_image"
        }
    };

    if let Some(context) = &request.context {
        prompt.push_str(&format!("Additional context from the user: {}\n", context));
    }
    if let Some(category) = request.category_hint {
        prompt.push_str(&format!("The user says the category is: {}\n", category));
    }
    prompt.push_str(&format!("\nAllowed categories: {}\n\n", category_list()));
    prompt.push_str(RESPONSE_FORMAT);

    let model_request = ModelRequest::text(operation, SYSTEM_PROMPT, prompt);
    match &request.input {
        PreparedInput::Image(image) => model_request.with_image(image.clone()),
        _ => model_request,
    }
}

/// Strip Markdown code fences a model may wrap around JSON
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line ("json")
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse a model reply into candidates
///
/// Accepts `{"suggestions": [...]}`, a bare array, or a single suggestion
/// object. Confidence may be on a 0-1 or 0-100 scale. Entries without a
/// name are dropped.
pub fn parse_suggestions(text: &str, fallback_category: Option<Category>) -> Result<Vec<Candidate>, String> {
    let value: Value =
        serde_json::from_str(strip_code_fences(text)).map_err(|e| format!("model reply is not JSON: {}", e))?;

    let entries: Vec<&Value> = match &value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => {
            let list = ["suggestions", "guesses", "products", "candidates"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_array));
            match list {
                Some(items) => items.iter().collect(),
                None => vec![&value],
            }
        }
        _ => return Err("model reply is neither an object nor an array".to_string()),
    };

    Ok(entries
        .into_iter()
        .filter_map(|entry| suggestion_to_candidate(entry, fallback_category))
        .collect())
}

fn string_field(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| entry.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null") && !s.eq_ignore_ascii_case("unknown"))
        .map(str::to_string)
}

/// Confidence on either scale, mapped into [0, 1]
fn confidence_field(entry: &Value) -> f32 {
    let raw = entry
        .get("confidence")
        .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim_end_matches('%').parse().ok())))
        .unwrap_or(0.5);
    let scaled = if raw > 1.0 { raw / 100.0 } else { raw };
    scaled as f32
}

fn suggestion_to_candidate(entry: &Value, fallback_category: Option<Category>) -> Option<Candidate> {
    let brand = string_field(entry, &["brand"]);
    let mut name = string_field(entry, &["name", "productName", "product_name"])?;

    // "TaylorMade Qi10 Driver" with brand TaylorMade -> "Qi10 Driver"
    if let Some(brand) = &brand {
        let prefix = format!("{} ", brand.to_lowercase());
        if name.to_lowercase().starts_with(&prefix) {
            if let Some(rest) = name.get(prefix.len()..).map(str::trim).filter(|r| !r.is_empty()) {
                name = rest.to_string();
            }
        }
    }

    let category = string_field(entry, &["category"])
        .map(|c| Category::from_label(&c))
        .filter(|c| *c != Category::Other)
        .or(fallback_category)
        .unwrap_or_default();

    let mut candidate = Candidate::new(brand, name, category, confidence_field(entry), CandidateSource::Ai);
    candidate.model = string_field(entry, &["model", "modelNumber", "model_number"]);
    candidate.color = string_field(entry, &["color", "colorway"]);

    if let Some(reason) = string_field(entry, &["reason", "reasoning"]) {
        candidate.reasons.push(reason);
    }
    if let Some(reasons) = entry
        .get("reasons")
        .or_else(|| entry.get("matchingReasons"))
        .and_then(Value::as_array)
    {
        candidate
            .reasons
            .extend(reasons.iter().filter_map(Value::as_str).map(str::to_string));
    }
    Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::input::prepare;
    use crate::types::{IdentifyInput, IdentifyRequest};

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n[1]\n```  "), "[1]");
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_suggestions_list() {
        let reply = r#"```json
        {"suggestions": [
            {"brand": "TaylorMade", "name": "TaylorMade Qi10 Driver", "category": "golf equipment", "confidence": 85, "reason": "carbon crown"},
            {"brand": null, "name": "Driver", "confidence": 0.4},
            {"brand": "Ping", "confidence": 0.9}
        ]}
        ```"#;
        let candidates = parse_suggestions(reply, None).unwrap();
        assert_eq!(candidates.len(), 2);

        assert_eq!(candidates[0].brand.as_deref(), Some("TaylorMade"));
        assert_eq!(candidates[0].name, "Qi10 Driver");
        assert_eq!(candidates[0].category, Category::Golf);
        assert!((candidates[0].confidence - 0.85).abs() < 1e-6);
        assert_eq!(candidates[0].source, CandidateSource::Ai);
        assert_eq!(candidates[0].reasons, vec!["carbon crown"]);

        assert_eq!(candidates[1].brand, None);
        assert_eq!(candidates[1].category, Category::Other);
    }

    #[test]
    fn test_parse_single_object_with_fallback_category() {
        let candidates =
            parse_suggestions(r#"{"brand": "Yeti", "name": "Rambler 20 oz Tumbler", "confidence": "72%"}"#, Some(Category::Outdoor))
                .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].category, Category::Outdoor);
        assert!((candidates[0].confidence - 0.72).abs() < 1e-6);
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_suggestions("I think this is a golf club.", None).is_err());
    }

    #[test]
    fn test_text_prompt_mentions_detected_brand() {
        let request = prepare(&IdentifyRequest {
            input: IdentifyInput::Text("calaway paradym driver".into()),
            context: Some("in my golf bag".into()),
            category_hint: None,
        })
        .unwrap();
        let model_request = identification_prompt(&request);

        assert_eq!(model_request.operation, "identify_text");
        assert!(model_request.prompt.contains("Brand detected in the text: Callaway"));
        assert!(model_request.prompt.contains("in my golf bag"));
        assert!(model_request.image.is_none());
        assert!(model_request.json);
    }
}
