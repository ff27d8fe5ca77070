//! Run accounting: counters, per-article failures, and the operator-facing
//! summary. No error is swallowed without appearing here.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Counters from a detection run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunStats {
    pub ingested: u32,
    pub url_skipped: u32,
    pub filtered: u32,
    pub extracted: u32,
    pub no_incident: u32,
    pub new_records: u32,
    pub duplicates: u32,
    pub ambiguous: u32,
    pub errored: u32,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Detection Run Complete ===")?;
        writeln!(f, "Articles ingested:  {}", self.ingested)?;
        writeln!(f, "Known URLs skipped: {}", self.url_skipped)?;
        writeln!(f, "Filtered out:       {}", self.filtered)?;
        writeln!(f, "Extracted:          {}", self.extracted)?;
        writeln!(f, "No incident:        {}", self.no_incident)?;
        writeln!(f, "New drafts:         {}", self.new_records)?;
        writeln!(f, "Duplicates merged:  {}", self.duplicates)?;
        writeln!(f, "Ambiguous drafts:   {}", self.ambiguous)?;
        writeln!(f, "Errored:            {}", self.errored)?;
        Ok(())
    }
}

/// One article that did not make it through, with the operator-visible reason.
#[derive(Debug, Clone, Serialize)]
pub struct RunFailure {
    pub url: String,
    pub reason: String,
}

/// A draft the run created, in notification-friendly form.
#[derive(Debug, Clone, Serialize)]
pub struct DraftSummary {
    pub id: Uuid,
    pub date: NaiveDate,
    pub location: String,
    pub victim_name: Option<String>,
    pub ambiguous: bool,
}

/// Full account of one run: successes enumerated, failures listed by URL.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: RunStats,
    pub drafts: Vec<DraftSummary>,
    pub failures: Vec<RunFailure>,
}

impl RunSummary {
    /// A notification goes out only when human review has something new.
    pub fn needs_notification(&self) -> bool {
        self.stats.new_records + self.stats.ambiguous > 0
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.stats)?;
        if !self.drafts.is_empty() {
            writeln!(f, "\nNew drafts for review:")?;
            for draft in &self.drafts {
                writeln!(
                    f,
                    "  {} {} — {}{}",
                    draft.date,
                    draft.location,
                    draft.victim_name.as_deref().unwrap_or("unnamed"),
                    if draft.ambiguous { " (ambiguous)" } else { "" }
                )?;
            }
        }
        if !self.failures.is_empty() {
            writeln!(f, "\nFailures:")?;
            for failure in &self.failures {
                writeln!(f, "  {} — {}", failure.url, failure.reason)?;
            }
        }
        Ok(())
    }
}

/// Counters from a reconciliation cycle.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ReconcileStats {
    pub casualties: u32,
    pub matched: u32,
    pub unmatched: u32,
    pub ambiguous: u32,
}

impl std::fmt::Display for ReconcileStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Reconciliation Complete ===")?;
        writeln!(f, "Dataset rows:   {}", self.casualties)?;
        writeln!(f, "Matched:        {}", self.matched)?;
        writeln!(f, "Unmatched:      {}", self.unmatched)?;
        writeln!(f, "Ambiguous:      {}", self.ambiguous)?;
        Ok(())
    }
}
