//! String similarity used by library search and candidate ranking

use std::collections::HashSet;

use super::normalize::normalize_text;

/// Similarity of two strings in [0, 1]
///
/// Exact match scores 1.0. If one string contains the other the score is
/// 0.7 plus 0.3 times the length ratio. Otherwise word overlap (Jaccard)
/// scaled by 0.7, falling back to half the normalized Levenshtein similarity.
pub fn text_similarity(a: &str, b: &str) -> f32 {
    let a = normalize_text(a);
    let b = normalize_text(b);

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    if a.contains(&b) || b.contains(&a) {
        let (shorter, longer) = if a.len() < b.len() {
            (a.len(), b.len())
        } else {
            (b.len(), a.len())
        };
        return 0.7 + 0.3 * (shorter as f32 / longer as f32);
    }

    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();
    let intersection = words_a.intersection(&words_b).count();
    if intersection > 0 {
        let union = words_a.union(&words_b).count();
        return (intersection as f32 / union as f32) * 0.7;
    }

    strsim::normalized_levenshtein(&a, &b) as f32 * 0.5
}

/// True when two words differ by at most one edit
pub fn within_one_edit(a: &str, b: &str) -> bool {
    let len_diff = a.chars().count().abs_diff(b.chars().count());
    len_diff <= 1 && strsim::levenshtein(a, b) <= 1
}
