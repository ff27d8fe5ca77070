//! Content-based duplicate detection against the ledger.
//!
//! There is no stable cross-source incident ID, so identity is the fuzzy
//! triple (date, location, name). The outcome is a tagged variant, never a
//! boolean: silent auto-merge on weak evidence is the primary correctness
//! risk, so anything with more than one plausible match escalates.

use chrono::NaiveDate;
use uuid::Uuid;

use railwatch_common::similarity;
use railwatch_common::{CandidateIncident, LedgerRecord, RecordStatus, TrackerConfig};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// No existing record matches. `rejected_shadow` names a Rejected record
    /// that would have matched — the new draft carries a warning instead of
    /// silently resurrecting it.
    New { rejected_shadow: Option<Uuid> },
    /// Exactly one existing record matches.
    Duplicate { id: Uuid },
    /// More than one record clears the duplicate bar. Never auto-merged;
    /// ids are listed for manual resolution, sorted for determinism.
    Ambiguous { ids: Vec<Uuid> },
}

/// Matching thresholds. Plain data so the reconciler can reuse the policy
/// with a wider date band.
#[derive(Debug, Clone, Copy)]
pub struct MatchPolicy {
    pub date_tolerance_days: i64,
    pub location_threshold: f64,
    pub name_threshold: f64,
}

impl From<&TrackerConfig> for MatchPolicy {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            date_tolerance_days: config.date_tolerance_days,
            location_threshold: config.location_threshold,
            name_threshold: config.name_threshold,
        }
    }
}

/// One record's similarity against a candidate.
#[derive(Debug, Clone)]
struct Scored {
    id: Uuid,
    status: RecordStatus,
    qualifies: bool,
    /// Ordering score only. Mode/gender corroboration feeds in here but can
    /// never make a record qualify on its own.
    score: f64,
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Match a candidate against a ledger snapshot.
///
/// Deterministic: the same candidate and snapshot always yield the same
/// result, independent of record iteration order.
pub fn match_candidate(
    candidate: &CandidateIncident,
    ledger: &[LedgerRecord],
    policy: &MatchPolicy,
) -> MatchResult {
    let mut scored: Vec<Scored> = ledger
        .iter()
        .filter(|r| within_date_band(candidate.date, r.date, policy.date_tolerance_days))
        .map(|r| score_record(candidate, r, policy))
        .filter(|s| s.qualifies)
        .collect();

    // Stable order regardless of snapshot order: best score first, id as the
    // tie-break.
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    let live: Vec<&Scored> = scored
        .iter()
        .filter(|s| s.status != RecordStatus::Rejected)
        .collect();

    match live.len() {
        0 => {
            // Rejected records are excluded from matching, but a fresh
            // candidate that only matches a Rejected record gets flagged
            // rather than silently re-entering the ledger.
            let shadow = scored
                .iter()
                .find(|s| s.status == RecordStatus::Rejected)
                .map(|s| s.id);
            MatchResult::New {
                rejected_shadow: shadow,
            }
        }
        1 => MatchResult::Duplicate { id: live[0].id },
        _ => {
            let mut ids: Vec<Uuid> = live.iter().map(|s| s.id).collect();
            ids.sort();
            MatchResult::Ambiguous { ids }
        }
    }
}

fn within_date_band(a: NaiveDate, b: NaiveDate, tolerance_days: i64) -> bool {
    (a - b).num_days().abs() <= tolerance_days
}

fn score_record(
    candidate: &CandidateIncident,
    record: &LedgerRecord,
    policy: &MatchPolicy,
) -> Scored {
    let location_sim = similarity::score(candidate.location_key(), record.location_key());

    // "unknown" names are wildcards: they neither confirm nor deny.
    let name_sim = match (candidate.matchable_name(), record.matchable_name()) {
        (Some(a), Some(b)) => Some(similarity::score(a, b)),
        _ => None,
    };

    let qualifies = location_sim >= policy.location_threshold
        || name_sim.is_some_and(|s| s >= policy.name_threshold);

    // Corroboration bonus for ordering only — mode/gender agreement is never
    // sole grounds for a match.
    let mut score = location_sim + name_sim.unwrap_or(0.0);
    if candidate.mode != railwatch_common::TravelMode::Unknown && candidate.mode == record.mode {
        score += 0.05;
    }
    if candidate.gender != railwatch_common::Gender::Unknown && candidate.gender == record.gender {
        score += 0.05;
    }

    Scored {
        id: record.id,
        status: record.status,
        qualifies,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use railwatch_common::{Gender, SuicideFlag, TravelMode};

    fn candidate(date: &str, location: &str, name: Option<&str>) -> CandidateIncident {
        CandidateIncident {
            date: date.parse().unwrap(),
            location_text: location.to_string(),
            city: None,
            victim_name: name.map(String::from),
            age: None,
            gender: Gender::Unknown,
            mode: TravelMode::Unknown,
            time: None,
            details: String::new(),
            suicide_flag: SuicideFlag::Unknown,
            source_url: "https://example.com/new".to_string(),
            confidence: 0.9,
        }
    }

    fn record(date: &str, location: &str, name: Option<&str>) -> LedgerRecord {
        let c = CandidateIncident {
            source_url: "https://example.com/old".to_string(),
            ..candidate(date, location, name)
        };
        LedgerRecord::from_candidate(&c, Utc::now())
    }

    fn policy() -> MatchPolicy {
        MatchPolicy::from(&TrackerConfig::default())
    }

    #[test]
    fn same_date_similar_location_is_duplicate() {
        let existing = record("2024-03-01", "Hollywood FL", None);
        let result = match_candidate(
            &candidate("2024-03-01", "Hollywood, FL", Some("unknown")),
            &[existing.clone()],
            &policy(),
        );
        assert_eq!(result, MatchResult::Duplicate { id: existing.id });
    }

    #[test]
    fn different_date_is_new() {
        let existing = record("2024-03-01", "Hollywood FL", None);
        let result = match_candidate(
            &candidate("2024-03-02", "Hollywood FL", None),
            &[existing],
            &policy(),
        );
        assert_eq!(
            result,
            MatchResult::New {
                rejected_shadow: None
            }
        );
    }

    #[test]
    fn name_match_alone_is_enough_when_both_named() {
        let existing = record("2024-03-01", "near the FEC corridor", Some("John Smith"));
        let result = match_candidate(
            &candidate("2024-03-01", "Broward County", Some("Jon Smith")),
            &[existing.clone()],
            &policy(),
        );
        assert_eq!(result, MatchResult::Duplicate { id: existing.id });
    }

    #[test]
    fn unknown_name_never_confirms_a_match() {
        let existing = record("2024-03-01", "Fort Lauderdale", Some("unknown"));
        let result = match_candidate(
            &candidate("2024-03-01", "West Palm Beach", Some("unknown")),
            &[existing],
            &policy(),
        );
        assert_eq!(
            result,
            MatchResult::New {
                rejected_shadow: None
            }
        );
    }

    #[test]
    fn two_plausible_matches_escalate_to_ambiguous() {
        let a = record("2024-03-01", "Hollywood FL", None);
        let b = record("2024-03-01", "Hollywood, Florida", None);
        let result = match_candidate(
            &candidate("2024-03-01", "Hollywood FL", Some("John Smith")),
            &[a.clone(), b.clone()],
            &policy(),
        );
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(result, MatchResult::Ambiguous { ids: expected });
    }

    #[test]
    fn result_is_independent_of_snapshot_order() {
        let a = record("2024-03-01", "Hollywood FL", None);
        let b = record("2024-03-01", "Boca Raton FL", None);
        let c = candidate("2024-03-01", "Hollywood, FL", None);
        let forward = match_candidate(&c, &[a.clone(), b.clone()], &policy());
        let reverse = match_candidate(&c, &[b, a], &policy());
        assert_eq!(forward, reverse);
    }

    #[test]
    fn rejected_only_match_is_new_with_shadow_warning() {
        let mut rejected = record("2024-03-01", "Hollywood FL", None);
        rejected.status = RecordStatus::Rejected;
        let result = match_candidate(
            &candidate("2024-03-01", "Hollywood FL", None),
            &[rejected.clone()],
            &policy(),
        );
        assert_eq!(
            result,
            MatchResult::New {
                rejected_shadow: Some(rejected.id)
            }
        );
    }

    #[test]
    fn rejected_record_does_not_block_live_duplicate() {
        let mut rejected = record("2024-03-01", "Hollywood FL", None);
        rejected.status = RecordStatus::Rejected;
        let live = record("2024-03-01", "Hollywood FL", None);
        let result = match_candidate(
            &candidate("2024-03-01", "Hollywood, FL", None),
            &[rejected, live.clone()],
            &policy(),
        );
        assert_eq!(result, MatchResult::Duplicate { id: live.id });
    }

    #[test]
    fn date_tolerance_widens_the_band() {
        let existing = record("2024-03-01", "Hollywood FL", None);
        let wide = MatchPolicy {
            date_tolerance_days: 1,
            ..policy()
        };
        let result = match_candidate(
            &candidate("2024-03-02", "Hollywood FL", None),
            &[existing.clone()],
            &wide,
        );
        assert_eq!(result, MatchResult::Duplicate { id: existing.id });
    }
}
