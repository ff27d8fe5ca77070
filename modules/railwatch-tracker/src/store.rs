//! JSON-file ledger store.
//!
//! Local stand-in for the external record store so the binary runs
//! end-to-end. Whole-file read-modify-write under a single process-level
//! lock; cross-process exclusion is the scheduler's job.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use railwatch_common::{LedgerRecord, TrackerError};

use crate::traits::{LedgerStore, LedgerUpdate};

pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read(&self) -> Result<Vec<LedgerRecord>, TrackerError> {
        match std::fs::read_to_string(&self.path) {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|e| TrackerError::Store(format!("corrupt ledger file: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(TrackerError::Store(format!("read failed: {e}"))),
        }
    }

    fn write(&self, records: &[LedgerRecord]) -> Result<(), TrackerError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TrackerError::Store(format!("create dir failed: {e}")))?;
        }
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| TrackerError::Store(format!("serialize failed: {e}")))?;
        // Write-then-rename so an aborted run never leaves a torn file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| TrackerError::Store(format!("write failed: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| TrackerError::Store(format!("rename failed: {e}")))
    }
}

#[async_trait]
impl LedgerStore for JsonFileStore {
    async fn snapshot(&self) -> Result<Vec<LedgerRecord>, TrackerError> {
        let _guard = self.lock.lock().await;
        self.read()
    }

    async fn insert(&self, record: &LedgerRecord) -> Result<(), TrackerError> {
        let _guard = self.lock.lock().await;
        let mut records = self.read()?;
        if records.iter().any(|r| r.id == record.id) {
            return Ok(());
        }
        records.push(record.clone());
        self.write(&records)
    }

    async fn update(&self, id: Uuid, fields: &LedgerUpdate) -> Result<(), TrackerError> {
        let _guard = self.lock.lock().await;
        let mut records = self.read()?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| TrackerError::Store(format!("no record with id {id}")))?;
        fields.apply_to(record);
        self.write(&records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use railwatch_common::{CandidateIncident, Gender, SuicideFlag, TravelMode};

    fn record(url: &str) -> LedgerRecord {
        let c = CandidateIncident {
            date: "2024-03-01".parse().unwrap(),
            location_text: "Hollywood FL".to_string(),
            city: None,
            victim_name: None,
            age: None,
            gender: Gender::Unknown,
            mode: TravelMode::Unknown,
            time: None,
            details: String::new(),
            suicide_flag: SuicideFlag::Unknown,
            source_url: url.to_string(),
            confidence: 0.9,
        };
        LedgerRecord::from_candidate(&c, Utc::now())
    }

    #[tokio::test]
    async fn roundtrips_insert_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("ledger.json"));

        assert!(store.snapshot().await.unwrap().is_empty());

        let rec = record("https://example.com/a");
        store.insert(&rec).await.unwrap();
        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, rec.id);
    }

    #[tokio::test]
    async fn insert_is_idempotent_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("ledger.json"));
        let rec = record("https://example.com/a");
        store.insert(&rec).await.unwrap();
        store.insert(&rec).await.unwrap();
        assert_eq!(store.snapshot().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_applies_fields_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("ledger.json"));
        let rec = record("https://example.com/a");
        store.insert(&rec).await.unwrap();

        let update = LedgerUpdate {
            dot_match: Some(true),
            dot_incident_number: Some("FL-2024-017".to_string()),
            ..Default::default()
        };
        store.update(rec.id, &update).await.unwrap();

        let snapshot = store.snapshot().await.unwrap();
        assert!(snapshot[0].dot_match);
        assert_eq!(
            snapshot[0].dot_incident_number.as_deref(),
            Some("FL-2024-017")
        );
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("ledger.json"));
        let err = store
            .update(Uuid::new_v4(), &LedgerUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::Store(_)));
    }
}
