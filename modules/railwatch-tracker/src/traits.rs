//! Trait seams for everything the pipeline talks to but does not own.
//!
//! ArticleSupplier hides search/RSS transport. LedgerStore hides the record
//! store. FraDataset hides the federal casualty dataset. Notifier hides
//! outbound delivery.
//!
//! These enable deterministic testing with the mocks in `testing`:
//! no network, no credentials. `cargo test` in seconds.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use railwatch_common::{
    Article, Gender, LedgerRecord, SuicideFlag, TrackerError, TravelMode,
};

use crate::fra::FraCasualty;
use crate::stats::RunSummary;

// ---------------------------------------------------------------------------
// ArticleSupplier
// ---------------------------------------------------------------------------

/// Source of candidate articles. No ordering or uniqueness guarantees; the
/// pipeline performs its own source-URL dedup.
#[async_trait]
pub trait ArticleSupplier: Send + Sync {
    async fn fetch_articles(&self) -> Result<Vec<Article>, TrackerError>;
}

// ---------------------------------------------------------------------------
// LedgerStore
// ---------------------------------------------------------------------------

/// Partial update of a ledger record. Status is deliberately absent: nothing
/// in the pipeline may move a record through its review lifecycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerUpdate {
    /// Full replacement source set. Callers must only ever grow it.
    pub sources: Option<BTreeSet<String>>,
    pub news_source_present: Option<bool>,
    pub location_text: Option<String>,
    pub city: Option<String>,
    pub victim_name: Option<String>,
    pub age: Option<u8>,
    pub gender: Option<Gender>,
    pub mode: Option<TravelMode>,
    pub time: Option<String>,
    pub details: Option<String>,
    pub suicide_flag: Option<SuicideFlag>,
    pub review_note: Option<String>,
    pub dot_incident_number: Option<String>,
    pub dot_match: Option<bool>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub map_link: Option<String>,
}

impl LedgerUpdate {
    pub fn is_empty(&self) -> bool {
        serde_json::to_value(self)
            .map(|v| {
                v.as_object()
                    .map(|m| m.values().all(|f| f.is_null()))
                    .unwrap_or(true)
            })
            .unwrap_or(true)
    }

    /// Apply this update to an in-memory copy of the record.
    pub fn apply_to(&self, record: &mut LedgerRecord) {
        if let Some(sources) = &self.sources {
            record.sources = sources.clone();
        }
        if let Some(v) = self.news_source_present {
            record.news_source_present = v;
        }
        if let Some(v) = &self.location_text {
            record.location_text = v.clone();
        }
        if let Some(v) = &self.city {
            record.city = Some(v.clone());
        }
        if let Some(v) = &self.victim_name {
            record.victim_name = Some(v.clone());
        }
        if let Some(v) = self.age {
            record.age = Some(v);
        }
        if let Some(v) = self.gender {
            record.gender = v;
        }
        if let Some(v) = self.mode {
            record.mode = v;
        }
        if let Some(v) = &self.time {
            record.time = Some(v.clone());
        }
        if let Some(v) = &self.details {
            record.details = v.clone();
        }
        if let Some(v) = self.suicide_flag {
            record.suicide_flag = v;
        }
        if let Some(v) = &self.review_note {
            record.review_note = Some(v.clone());
        }
        if let Some(v) = &self.dot_incident_number {
            record.dot_incident_number = Some(v.clone());
        }
        if let Some(v) = self.dot_match {
            record.dot_match = v;
        }
        if let Some(v) = self.lat {
            record.lat = Some(v);
        }
        if let Some(v) = self.lon {
            record.lon = Some(v);
        }
        if let Some(v) = &self.map_link {
            record.map_link = Some(v.clone());
        }
    }
}

/// The durable incident ledger. Reads return a full snapshot; writes are a
/// single insert or a field-level update. Concurrent runs are excluded by
/// the invoking scheduler, not by this interface.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn snapshot(&self) -> Result<Vec<LedgerRecord>, TrackerError>;
    async fn insert(&self, record: &LedgerRecord) -> Result<(), TrackerError>;
    async fn update(&self, id: Uuid, fields: &LedgerUpdate) -> Result<(), TrackerError>;
}

// ---------------------------------------------------------------------------
// FraDataset
// ---------------------------------------------------------------------------

/// Read-only view of the federal casualty dataset.
#[async_trait]
pub trait FraDataset: Send + Sync {
    async fn recent_fatalities(&self, since: NaiveDate) -> Result<Vec<FraCasualty>, TrackerError>;
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Fire-and-forget run notification. Failure is logged by the caller and
/// never blocks or fails the run.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, summary: &RunSummary) -> Result<(), TrackerError>;
}
