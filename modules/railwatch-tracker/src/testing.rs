//! Deterministic test doubles for every external seam.
//!
//! Compiled under `cfg(test)` or the `test-support` feature so integration
//! tests can drive whole runs with no network, no credentials, no model.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use railwatch_common::{
    Article, CandidateIncident, Gender, LedgerRecord, SuicideFlag, TrackerError, TravelMode,
};

use crate::extractor::{ExtractionOutcome, IncidentExtractor};
use crate::fra::FraCasualty;
use crate::stats::RunSummary;
use crate::traits::{ArticleSupplier, FraDataset, LedgerStore, LedgerUpdate, Notifier};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn article(title: &str, body: &str, url: &str) -> Article {
    Article {
        title: title.to_string(),
        body_text: body.to_string(),
        url: url.to_string(),
        published_at: None,
        source_name: "test-feed".to_string(),
    }
}

pub fn candidate(date: &str, location: &str, name: Option<&str>, url: &str) -> CandidateIncident {
    CandidateIncident {
        date: date.parse::<NaiveDate>().expect("valid date"),
        location_text: location.to_string(),
        city: None,
        victim_name: name.map(String::from),
        age: None,
        gender: Gender::Unknown,
        mode: TravelMode::Unknown,
        time: None,
        details: String::new(),
        suicide_flag: SuicideFlag::Unknown,
        source_url: url.to_string(),
        confidence: 0.9,
    }
}

// ---------------------------------------------------------------------------
// MockSupplier
// ---------------------------------------------------------------------------

pub struct MockSupplier {
    articles: Vec<Article>,
}

impl MockSupplier {
    pub fn new(articles: Vec<Article>) -> Self {
        Self { articles }
    }
}

#[async_trait]
impl ArticleSupplier for MockSupplier {
    async fn fetch_articles(&self) -> Result<Vec<Article>, TrackerError> {
        Ok(self.articles.clone())
    }
}

// ---------------------------------------------------------------------------
// ScriptedExtractor
// ---------------------------------------------------------------------------

/// Per-URL script for the extractor seam.
pub enum ExtractScript {
    Incident(CandidateIncident),
    NoIncident,
    /// Both the attempt and its retry failed (e.g. double timeout).
    Fail(String),
}

#[derive(Default)]
pub struct ScriptedExtractor {
    scripts: HashMap<String, ExtractScript>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, url: &str, script: ExtractScript) -> Self {
        self.scripts.insert(url.to_string(), script);
        self
    }

    /// URLs the pipeline actually asked us to extract, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IncidentExtractor for ScriptedExtractor {
    async fn extract(&self, article: &Article) -> Result<ExtractionOutcome, TrackerError> {
        self.calls.lock().unwrap().push(article.url.clone());
        match self.scripts.get(&article.url) {
            Some(ExtractScript::Incident(candidate)) => {
                Ok(ExtractionOutcome::Incident(candidate.clone()))
            }
            Some(ExtractScript::NoIncident) | None => Ok(ExtractionOutcome::NoIncident {
                reason: "scripted no-incident".to_string(),
            }),
            Some(ExtractScript::Fail(reason)) => Err(TrackerError::Extraction {
                url: article.url.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory ledger store with write counters and a failure switch.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<LedgerRecord>>,
    pub inserts: AtomicU32,
    pub updates: AtomicU32,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn with_records(records: Vec<LedgerRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Default::default()
        }
    }

    /// Make every subsequent write fail with a store error.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn snapshot(&self) -> Result<Vec<LedgerRecord>, TrackerError> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn insert(&self, record: &LedgerRecord) -> Result<(), TrackerError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TrackerError::Store("write refused".to_string()));
        }
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        if !records.iter().any(|r| r.id == record.id) {
            records.push(record.clone());
        }
        Ok(())
    }

    async fn update(&self, id: Uuid, fields: &LedgerUpdate) -> Result<(), TrackerError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TrackerError::Store("write refused".to_string()));
        }
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| TrackerError::Store(format!("no record with id {id}")))?;
        fields.apply_to(record);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockDataset
// ---------------------------------------------------------------------------

pub struct MockDataset {
    rows: Result<Vec<FraCasualty>, String>,
}

impl MockDataset {
    pub fn new(rows: Vec<FraCasualty>) -> Self {
        Self { rows: Ok(rows) }
    }

    pub fn unreachable(reason: &str) -> Self {
        Self {
            rows: Err(reason.to_string()),
        }
    }
}

#[async_trait]
impl FraDataset for MockDataset {
    async fn recent_fatalities(&self, _since: NaiveDate) -> Result<Vec<FraCasualty>, TrackerError> {
        match &self.rows {
            Ok(rows) => Ok(rows.clone()),
            Err(reason) => Err(TrackerError::Reconciliation(reason.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// MockNotifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<RunSummary>>,
    fail: AtomicBool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail.store(true, Ordering::SeqCst);
        notifier
    }

    pub fn sent(&self) -> Vec<RunSummary> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, summary: &RunSummary) -> Result<(), TrackerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TrackerError::TransientSupply(
                "notifier unavailable".to_string(),
            ));
        }
        self.sent.lock().unwrap().push(summary.clone());
        Ok(())
    }
}
