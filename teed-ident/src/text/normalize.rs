//! Input normalization

/// Quote characters stripped from both ends along with ASCII punctuation
const QUOTES: &[char] = &['“', '”', '‘', '’', '«', '»'];

/// Trim, lowercase, collapse whitespace and strip surrounding punctuation
pub fn normalize_text(input: &str) -> String {
    let lowered = input.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| c.is_ascii_punctuation() || QUOTES.contains(&c) || c.is_whitespace())
        .to_string()
}

/// Lowercase alphanumeric tokens
pub fn tokenize(input: &str) -> Vec<String> {
    input
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Capitalize each word; short words carrying digits ("tsr3") are uppercased
pub fn title_case(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            if word.chars().any(|c| c.is_ascii_digit()) && word.len() <= 6 {
                return word.to_uppercase();
            }
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
