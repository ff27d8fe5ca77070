//! Reconciliation cycles against the mock dataset and store.

use chrono::Utc;
use railwatch_common::{LedgerRecord, TrackerConfig, TrackerError};
use railwatch_tracker::fra::{FraCasualty, FraReconciler};
use railwatch_tracker::testing::{candidate, MemoryStore, MockDataset};
use railwatch_tracker::traits::LedgerStore;

fn casualty(number: &str, date: &str, county: &str) -> FraCasualty {
    FraCasualty {
        incident_number: number.to_string(),
        date: Some(date.parse().unwrap()),
        county: county.to_string(),
        state: "Florida".to_string(),
        latitude: Some(26.01),
        longitude: Some(-80.15),
        age: Some(38),
        person_type: "Trespasser".to_string(),
        narrative: "Struck by train at grade crossing.".to_string(),
        railroad_name: "Brightline".to_string(),
    }
}

fn ledger_record(date: &str, location: &str) -> LedgerRecord {
    LedgerRecord::from_candidate(
        &candidate(date, location, None, "https://example.com/a"),
        Utc::now(),
    )
}

#[tokio::test]
async fn matched_casualty_annotates_the_record() {
    let record = ledger_record("2024-03-01", "Broward");
    let store = MemoryStore::with_records(vec![record.clone()]);
    let dataset = MockDataset::new(vec![casualty("FL-2024-017", "2024-03-01", "Broward")]);

    let config = TrackerConfig::default();
    let reconciler = FraReconciler::new(&dataset, &store, &config);
    let stats = reconciler.run().await.unwrap();

    assert_eq!(stats.matched, 1);
    let records = store.snapshot().await.unwrap();
    assert_eq!(
        records[0].dot_incident_number.as_deref(),
        Some("FL-2024-017")
    );
    assert!(records[0].dot_match);
    assert_eq!(records[0].lat, Some(26.01));
    assert!(records[0].map_link.is_some());
    // Annotation never disturbs identity or lifecycle.
    assert_eq!(records[0].id, record.id);
    assert_eq!(records[0].status, record.status);
}

#[tokio::test]
async fn second_cycle_is_a_no_op() {
    let store = MemoryStore::with_records(vec![ledger_record("2024-03-01", "Broward")]);
    let dataset = MockDataset::new(vec![casualty("FL-2024-017", "2024-03-01", "Broward")]);

    let config = TrackerConfig::default();
    let reconciler = FraReconciler::new(&dataset, &store, &config);
    reconciler.run().await.unwrap();
    let updates_after_first = store.updates.load(std::sync::atomic::Ordering::SeqCst);

    reconciler.run().await.unwrap();
    assert_eq!(
        store.updates.load(std::sync::atomic::Ordering::SeqCst),
        updates_after_first
    );
}

#[tokio::test]
async fn unreachable_dataset_fails_the_cycle_only() {
    let store = MemoryStore::with_records(vec![ledger_record("2024-03-01", "Broward")]);
    let dataset = MockDataset::unreachable("upstream 503");

    let config = TrackerConfig::default();
    let reconciler = FraReconciler::new(&dataset, &store, &config);
    let err = reconciler.run().await.unwrap_err();

    assert!(matches!(err, TrackerError::Reconciliation(_)));
    // Cycle failure is not run-fatal for the wider system.
    assert!(!err.is_run_fatal());
}
