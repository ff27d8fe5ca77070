//! Keyword pre-filter — the cheap lexical gate in front of the extractor.
//!
//! Every surviving article costs a model call, so the filter errs on the
//! side of rejecting: exclusion terms veto first, then at least one required
//! term and one incident term must appear.

use std::collections::BTreeMap;

use railwatch_common::{Article, TrackerConfig};

// ---------------------------------------------------------------------------
// Decision types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    /// Article is worth extracting. Carries the matched terms for tuning.
    Pass { matched: Vec<String> },
    Reject { reason: RejectReason },
}

impl FilterDecision {
    pub fn passed(&self) -> bool {
        matches!(self, FilterDecision::Pass { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Empty title+body. Frequent feed artifact; nothing can match.
    EmptyText,
    /// An exclusion term matched (financial/stock coverage false positives).
    Exclusion(String),
    NoRequiredKeyword,
    NoIncidentKeyword,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::EmptyText => write!(f, "empty article text"),
            RejectReason::Exclusion(term) => write!(f, "exclusion term \"{term}\""),
            RejectReason::NoRequiredKeyword => write!(f, "no required keyword"),
            RejectReason::NoIncidentKeyword => write!(f, "no incident keyword"),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-keyword counters
// ---------------------------------------------------------------------------

/// Operator-facing tuning counters. Not required for correctness.
#[derive(Debug, Default)]
pub struct FilterStats {
    pub total: u32,
    pub passed: u32,
    pub rejected: u32,
    pub keyword_matches: BTreeMap<String, u32>,
}

impl std::fmt::Display for FilterStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Keyword filter: {}/{} passed", self.passed, self.total)?;
        for (kw, count) in &self.keyword_matches {
            writeln!(f, "  {kw}: {count}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// KeywordFilter
// ---------------------------------------------------------------------------

pub struct KeywordFilter {
    required: Vec<String>,
    incident: Vec<String>,
    exclusion: Vec<String>,
    stats: FilterStats,
}

impl KeywordFilter {
    pub fn new(config: &TrackerConfig) -> Self {
        let lower = |terms: &[String]| terms.iter().map(|t| t.to_lowercase()).collect();
        Self {
            required: lower(&config.required_keywords),
            incident: lower(&config.incident_keywords),
            exclusion: lower(&config.exclusion_keywords),
            stats: FilterStats::default(),
        }
    }

    /// Decide whether an article is worth extraction. Case-insensitive
    /// substring checks over title+body; exclusion terms veto everything.
    pub fn decide(&mut self, article: &Article) -> FilterDecision {
        self.stats.total += 1;

        let haystack = article.search_text().to_lowercase();
        if haystack.trim().is_empty() {
            self.stats.rejected += 1;
            return FilterDecision::Reject {
                reason: RejectReason::EmptyText,
            };
        }

        if let Some(term) = self.exclusion.iter().find(|t| haystack.contains(t.as_str())) {
            self.stats.rejected += 1;
            return FilterDecision::Reject {
                reason: RejectReason::Exclusion(term.clone()),
            };
        }

        let matched_required: Vec<&String> = self
            .required
            .iter()
            .filter(|t| haystack.contains(t.as_str()))
            .collect();
        if matched_required.is_empty() {
            self.stats.rejected += 1;
            return FilterDecision::Reject {
                reason: RejectReason::NoRequiredKeyword,
            };
        }

        let matched_incident: Vec<&String> = self
            .incident
            .iter()
            .filter(|t| haystack.contains(t.as_str()))
            .collect();
        if matched_incident.is_empty() {
            self.stats.rejected += 1;
            return FilterDecision::Reject {
                reason: RejectReason::NoIncidentKeyword,
            };
        }

        let matched: Vec<String> = matched_required
            .into_iter()
            .chain(matched_incident)
            .cloned()
            .collect();
        for kw in &matched {
            *self.stats.keyword_matches.entry(kw.clone()).or_insert(0) += 1;
        }
        self.stats.passed += 1;

        FilterDecision::Pass { matched }
    }

    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, body: &str) -> Article {
        Article {
            title: title.to_string(),
            body_text: body.to_string(),
            url: "https://example.com/story".to_string(),
            published_at: None,
            source_name: "test".to_string(),
        }
    }

    fn filter() -> KeywordFilter {
        KeywordFilter::new(&TrackerConfig::default())
    }

    #[test]
    fn passes_with_required_and_incident_terms() {
        let mut f = filter();
        let decision = f.decide(&article(
            "Pedestrian killed by Brightline train",
            "A pedestrian was struck and killed Tuesday.",
        ));
        assert!(decision.passed());
    }

    #[test]
    fn exclusion_term_vetoes_even_with_incident_terms() {
        let mut f = filter();
        let decision = f.decide(&article(
            "Brightline stock slides after death on tracks",
            "Shares fell as the company reported a fatality near Boca Raton.",
        ));
        assert_eq!(
            decision,
            FilterDecision::Reject {
                reason: RejectReason::Exclusion("stock".to_string())
            }
        );
    }

    #[test]
    fn rejects_without_required_keyword() {
        let mut f = filter();
        let decision = f.decide(&article(
            "Amtrak train strikes vehicle",
            "A driver was killed at a crossing.",
        ));
        assert_eq!(
            decision,
            FilterDecision::Reject {
                reason: RejectReason::NoRequiredKeyword
            }
        );
    }

    #[test]
    fn rejects_without_incident_keyword() {
        let mut f = filter();
        let decision = f.decide(&article(
            "Brightline opens new station",
            "Service to Orlando expands next month.",
        ));
        assert_eq!(
            decision,
            FilterDecision::Reject {
                reason: RejectReason::NoIncidentKeyword
            }
        );
    }

    #[test]
    fn empty_text_is_an_explicit_reject() {
        let mut f = filter();
        let decision = f.decide(&article("", "   "));
        assert_eq!(
            decision,
            FilterDecision::Reject {
                reason: RejectReason::EmptyText
            }
        );
    }

    #[test]
    fn counters_track_passes_and_matches() {
        let mut f = filter();
        f.decide(&article("Brightline death", "killed"));
        f.decide(&article("weather", "sunny"));
        assert_eq!(f.stats().total, 2);
        assert_eq!(f.stats().passed, 1);
        assert_eq!(f.stats().rejected, 1);
        assert!(f.stats().keyword_matches.contains_key("brightline"));
    }
}
