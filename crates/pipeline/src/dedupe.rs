//! Score-based and token-Jaccard duplicate detection (C7 Dedupe).

use std::collections::HashSet;

use memsys_vector::SearchHit;

pub const DEFAULT_DEDUPE_THRESHOLD: f32 = 0.95;

/// Lowercase, whitespace-collapsed normal form used before any text
/// comparison.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Jaccard similarity over normalised word sets.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let a_owned = normalize_text(a);
    let b_owned = normalize_text(b);
    let a_set: HashSet<&str> = a_owned.split(' ').filter(|w| !w.is_empty()).collect();
    let b_set: HashSet<&str> = b_owned.split(' ').filter(|w| !w.is_empty()).collect();

    if a_set.is_empty() && b_set.is_empty() {
        return 1.0;
    }
    let intersection = a_set.intersection(&b_set).count();
    let union = a_set.union(&b_set).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Return the id of the first candidate whose vector score is `>=
/// threshold`, in iteration order (§4.6, §8 testable property).
pub fn find_duplicate(candidates: &[SearchHit], threshold: f32) -> Option<String> {
    candidates.iter().find(|c| c.score >= threshold).map(|c| c.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f32) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            score,
            payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize_text("  Hello   World  "), "hello world");
    }

    #[test]
    fn jaccard_identical_text_is_one() {
        assert_eq!(jaccard_similarity("the cat sat", "the cat sat"), 1.0);
    }

    #[test]
    fn jaccard_disjoint_text_is_zero() {
        assert_eq!(jaccard_similarity("alpha beta", "gamma delta"), 0.0);
    }

    #[test]
    fn find_duplicate_returns_first_at_or_above_threshold() {
        let candidates = vec![hit("a", 0.80), hit("b", 0.96), hit("c", 0.99)];
        assert_eq!(find_duplicate(&candidates, 0.95), Some("b".to_string()));
    }

    #[test]
    fn find_duplicate_none_below_threshold() {
        let candidates = vec![hit("a", 0.5)];
        assert_eq!(find_duplicate(&candidates, 0.95), None);
    }
}
