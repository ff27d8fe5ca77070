//! Ledger mutation — the only writer in the detection pipeline.
//!
//! Applies match results to the record store while keeping an in-run view
//! (`LedgerState`) consistent, so near-duplicate candidates within the same
//! run see each other. All writes are idempotent at the source-URL level,
//! independent of content matching: the same article fetched twice never
//! creates a second record.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use railwatch_common::{
    normalize_url, CandidateIncident, Gender, LedgerRecord, SuicideFlag, TrackerError, TravelMode,
};

use crate::dedup::MatchResult;
use crate::traits::{LedgerStore, LedgerUpdate};

// ---------------------------------------------------------------------------
// LedgerState — in-run view of the ledger
// ---------------------------------------------------------------------------

/// Snapshot taken at run start, mutated as records land. Candidates are
/// matched against this, never against a re-read of the store, so a run sees
/// its own inserts.
pub struct LedgerState {
    records: Vec<LedgerRecord>,
    /// normalized source URL -> owning record, across all statuses.
    url_index: HashMap<String, Uuid>,
}

impl LedgerState {
    pub fn new(snapshot: Vec<LedgerRecord>) -> Self {
        let mut url_index = HashMap::new();
        for record in &snapshot {
            for url in &record.sources {
                url_index.insert(normalize_url(url), record.id);
            }
        }
        Self {
            records: snapshot,
            url_index,
        }
    }

    pub fn records(&self) -> &[LedgerRecord] {
        &self.records
    }

    /// Record already holding this source URL, if any.
    pub fn record_for_url(&self, url: &str) -> Option<Uuid> {
        self.url_index.get(&normalize_url(url)).copied()
    }

    fn insert(&mut self, record: LedgerRecord) {
        for url in &record.sources {
            self.url_index.insert(normalize_url(url), record.id);
        }
        self.records.push(record);
    }

    fn get_mut(&mut self, id: Uuid) -> Option<&mut LedgerRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    fn index_url(&mut self, url: &str, id: Uuid) {
        self.url_index.insert(normalize_url(url), id);
    }
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerMutation {
    /// Fresh Draft record created.
    Inserted { id: Uuid },
    /// Candidate merged into an existing record: source URL unioned and the
    /// named empty/unknown fields backfilled. Status untouched.
    SourcesMerged {
        id: Uuid,
        backfilled: Vec<&'static str>,
    },
    /// Ambiguous match escalated as an annotated Draft.
    AmbiguousDraft { id: Uuid, over: Vec<Uuid> },
    /// Source URL already present — re-run of an already-ingested article.
    Unchanged { id: Uuid },
}

pub struct LedgerMerger<'a> {
    store: &'a dyn LedgerStore,
}

impl<'a> LedgerMerger<'a> {
    pub fn new(store: &'a dyn LedgerStore) -> Self {
        Self { store }
    }

    /// Apply a match result. Each call is a single atomic append/update, so
    /// a run may be aborted between candidates without corrupting the ledger.
    pub async fn apply(
        &self,
        candidate: &CandidateIncident,
        match_result: &MatchResult,
        state: &mut LedgerState,
    ) -> Result<LedgerMutation, TrackerError> {
        // URL-level idempotency guard, independent of content matching.
        if let Some(id) = state.record_for_url(&candidate.source_url) {
            info!(url = candidate.source_url.as_str(), record = %id, "Source URL already ingested");
            return Ok(LedgerMutation::Unchanged { id });
        }

        match match_result {
            MatchResult::New { rejected_shadow } => {
                let mut record = LedgerRecord::from_candidate(candidate, Utc::now());
                if let Some(shadow) = rejected_shadow {
                    warn!(record = %record.id, rejected = %shadow, "Candidate matches a rejected record");
                    record.review_note = Some(format!(
                        "matches previously rejected record {shadow}; verify before approving"
                    ));
                }
                self.store.insert(&record).await?;
                let id = record.id;
                state.insert(record);
                Ok(LedgerMutation::Inserted { id })
            }

            MatchResult::Duplicate { id } => {
                let existing = state.get_mut(*id).ok_or_else(|| {
                    TrackerError::Store(format!("matched record {id} missing from snapshot"))
                })?;
                let (update, backfilled) = merge_update(candidate, existing);
                self.store.update(*id, &update).await?;
                update.apply_to(existing);
                // The merged URL joins the idempotency guard immediately.
                state.index_url(&candidate.source_url, *id);
                Ok(LedgerMutation::SourcesMerged {
                    id: *id,
                    backfilled,
                })
            }

            MatchResult::Ambiguous { ids } => {
                let mut record = LedgerRecord::from_candidate(candidate, Utc::now());
                let listed: Vec<String> = ids.iter().map(Uuid::to_string).collect();
                record.review_note = Some(format!(
                    "possible duplicate of: {}; resolve manually",
                    listed.join(", ")
                ));
                self.store.insert(&record).await?;
                let id = record.id;
                state.insert(record);
                Ok(LedgerMutation::AmbiguousDraft {
                    id,
                    over: ids.clone(),
                })
            }
        }
    }
}

/// Build the field-level update for merging a candidate into an existing
/// record: union the source URL, backfill fields that are currently
/// empty/unknown, never overwrite a real value, never touch status.
fn merge_update(
    candidate: &CandidateIncident,
    existing: &LedgerRecord,
) -> (LedgerUpdate, Vec<&'static str>) {
    let mut sources: BTreeSet<String> = existing.sources.clone();
    sources.insert(candidate.source_url.clone());

    let mut update = LedgerUpdate {
        sources: Some(sources),
        news_source_present: Some(true),
        ..Default::default()
    };
    let mut backfilled = Vec::new();

    if existing.city.is_none() {
        if let Some(city) = &candidate.city {
            update.city = Some(city.clone());
            backfilled.push("city");
        }
    }
    if existing.matchable_name().is_none() {
        if let Some(name) = candidate.matchable_name() {
            update.victim_name = Some(name.to_string());
            backfilled.push("victim_name");
        }
    }
    if existing.age.is_none() {
        if let Some(age) = candidate.age {
            update.age = Some(age);
            backfilled.push("age");
        }
    }
    if existing.gender == Gender::Unknown && candidate.gender != Gender::Unknown {
        update.gender = Some(candidate.gender);
        backfilled.push("gender");
    }
    if existing.mode == TravelMode::Unknown && candidate.mode != TravelMode::Unknown {
        update.mode = Some(candidate.mode);
        backfilled.push("mode");
    }
    if existing.time.is_none() {
        if let Some(time) = &candidate.time {
            update.time = Some(time.clone());
            backfilled.push("time");
        }
    }
    if existing.details.is_empty() && !candidate.details.is_empty() {
        update.details = Some(candidate.details.clone());
        backfilled.push("details");
    }
    if matches!(
        existing.suicide_flag,
        SuicideFlag::None | SuicideFlag::Unknown
    ) && matches!(
        candidate.suicide_flag,
        SuicideFlag::Confirmed | SuicideFlag::Suspected
    ) {
        update.suicide_flag = Some(candidate.suicide_flag);
        backfilled.push("suicide_flag");
    }

    (update, backfilled)
}
