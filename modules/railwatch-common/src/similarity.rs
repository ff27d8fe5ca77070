//! String similarity for fuzzy identity matching.
//!
//! There is no stable cross-source incident ID, so location and name strings
//! are the identity signal. Scores are normalized to 0.0..=1.0.

/// Canonical matching form: lowercase, punctuation stripped, whitespace
/// collapsed. "Hollywood, FL" and "hollywood fl" compare equal.
pub fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Fraction of tokens shared between the two strings (intersection over the
/// smaller token set). Robust to word reordering.
fn token_overlap(a: &str, b: &str) -> f64 {
    let tokens_a: std::collections::BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: std::collections::BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }
    let shared = tokens_a.intersection(&tokens_b).count();
    shared as f64 / tokens_a.len().min(tokens_b.len()) as f64
}

/// Similarity between two strings after normalization.
///
/// The score is the better of Jaro-Winkler (tolerates typos and punctuation
/// drift) and token overlap (tolerates reordering). Empty input scores 0.
pub fn score(a: &str, b: &str) -> f64 {
    let na = normalize(a);
    let nb = normalize(b);
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    strsim::jaro_winkler(&na, &nb).max(token_overlap(&na, &nb))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_strips_punctuation_and_case() {
        assert_eq!(normalize("Hollywood, FL"), "hollywood fl");
        assert_eq!(normalize("  NE 6th Ave.  "), "ne 6th ave");
    }

    #[test]
    fn identical_after_normalization_scores_one() {
        assert_eq!(score("Hollywood, FL", "Hollywood FL"), 1.0);
    }

    #[test]
    fn reordered_tokens_still_score_high() {
        assert!(score("FL Hollywood", "Hollywood FL") >= 0.99);
    }

    #[test]
    fn unrelated_cities_score_low() {
        assert!(score("Hollywood FL", "Melbourne FL") < 0.8);
    }

    #[test]
    fn near_identical_names_clear_threshold() {
        assert!(score("John Smith", "Jon Smith") >= 0.85);
    }

    #[test]
    fn empty_strings_score_zero() {
        assert_eq!(score("", "Hollywood"), 0.0);
        assert_eq!(score("  , ", "Hollywood"), 0.0);
    }
}
