//! Federal casualty dataset reconciliation.
//!
//! Runs on its own (longer) cycle, independent of detection. Matches ledger
//! records to dataset rows with the same similarity policy as content dedup,
//! and only ever annotates: DOT number, match flag, coordinate backfill.
//! Incident identity is never altered.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use railwatch_common::{
    CandidateIncident, Gender, LedgerRecord, SuicideFlag, TrackerConfig, TrackerError, TravelMode,
};

use crate::dedup::{match_candidate, MatchPolicy, MatchResult};
use crate::stats::ReconcileStats;
use crate::traits::{FraDataset, LedgerStore, LedgerUpdate};

// ---------------------------------------------------------------------------
// Dataset row
// ---------------------------------------------------------------------------

/// One fatal-casualty row from the federal dataset.
#[derive(Debug, Clone)]
pub struct FraCasualty {
    pub incident_number: String,
    pub date: Option<NaiveDate>,
    pub county: String,
    pub state: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub age: Option<u8>,
    pub person_type: String,
    pub narrative: String,
    pub railroad_name: String,
}

/// Annotation produced for one matched ledger record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FraAnnotation {
    pub record_id: Uuid,
    pub dot_incident_number: String,
    pub matched: bool,
}

// ---------------------------------------------------------------------------
// SODA API client
// ---------------------------------------------------------------------------

const SODA_URL: &str = "https://data.transportation.gov/resource/rash-pd2d.json";

/// Railroad-name variants used for the operator in the federal dataset.
/// The exact spelling drifts between filings.
const RAILROAD_NAMES: &[&str] = &[
    "Brightline",
    "BRIGHTLINE",
    "Brightline Trains",
    "Virgin Trains USA",
    "Florida East Coast Railway",
    "FEC",
];

#[derive(Debug, Deserialize)]
struct SodaRow {
    #[serde(default)]
    incident_number: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    county_name: String,
    #[serde(default)]
    state_name: String,
    #[serde(default)]
    latitude: Option<String>,
    #[serde(default)]
    longitude: Option<String>,
    #[serde(default)]
    age_of_person: Option<String>,
    #[serde(default)]
    injury_illness: String,
    #[serde(default)]
    type_of_person: String,
    #[serde(default)]
    narrative: String,
    #[serde(default)]
    railroad_name: String,
}

/// Read-only client for the data.transportation.gov casualty dataset
/// (Form 55a, dataset rash-pd2d).
pub struct SodaClient {
    http: reqwest::Client,
    base_url: String,
    app_token: Option<String>,
}

impl SodaClient {
    pub fn new(app_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: SODA_URL.to_string(),
            app_token,
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    fn railroad_filter() -> String {
        RAILROAD_NAMES
            .iter()
            .map(|name| format!("railroad_name='{name}'"))
            .collect::<Vec<_>>()
            .join(" OR ")
    }
}

#[async_trait]
impl FraDataset for SodaClient {
    async fn recent_fatalities(&self, since: NaiveDate) -> Result<Vec<FraCasualty>, TrackerError> {
        let where_clause = format!("({}) AND date >= '{}'", Self::railroad_filter(), since);
        let mut request = self.http.get(&self.base_url).query(&[
            ("$where", where_clause.as_str()),
            ("$order", "date DESC"),
            ("$limit", "100"),
        ]);
        if let Some(token) = &self.app_token {
            request = request.header("X-App-Token", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TrackerError::Reconciliation(format!("dataset fetch failed: {e}")))?;
        if !response.status().is_success() {
            return Err(TrackerError::Reconciliation(format!(
                "dataset returned {}",
                response.status()
            )));
        }
        let rows: Vec<SodaRow> = response
            .json()
            .await
            .map_err(|e| TrackerError::Reconciliation(format!("dataset schema change? {e}")))?;

        let casualties = rows
            .into_iter()
            .filter(|row| {
                let injury = row.injury_illness.to_lowercase();
                injury.contains("fatal") || injury.contains("death")
            })
            .map(|row| FraCasualty {
                incident_number: row.incident_number,
                // SODA dates arrive as "2024-01-15T00:00:00.000"
                date: row.date.get(..10).and_then(|d| d.parse().ok()),
                county: row.county_name,
                state: if row.state_name.is_empty() {
                    "Florida".to_string()
                } else {
                    row.state_name
                },
                latitude: row.latitude.and_then(|v| v.parse().ok()),
                longitude: row.longitude.and_then(|v| v.parse().ok()),
                age: row.age_of_person.and_then(|v| v.parse().ok()),
                person_type: row.type_of_person,
                narrative: row.narrative,
                railroad_name: row.railroad_name,
            })
            .collect();

        Ok(casualties)
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct FraReconciler<'a> {
    dataset: &'a dyn FraDataset,
    store: &'a dyn LedgerStore,
    policy: MatchPolicy,
    days_back: i64,
}

impl<'a> FraReconciler<'a> {
    pub fn new(
        dataset: &'a dyn FraDataset,
        store: &'a dyn LedgerStore,
        config: &TrackerConfig,
    ) -> Self {
        Self {
            dataset,
            store,
            policy: MatchPolicy::from(config),
            days_back: config.fra_days_back,
        }
    }

    /// One reconciliation cycle. Failures abort this cycle only; the
    /// detection pipeline is unaffected.
    pub async fn run(&self) -> Result<ReconcileStats, TrackerError> {
        let since = Utc::now().date_naive() - chrono::Duration::days(self.days_back);
        let casualties = self.dataset.recent_fatalities(since).await?;
        let snapshot = self.store.snapshot().await?;

        let (annotations, stats) = reconcile(&snapshot, &casualties, &self.policy);

        for annotation in &annotations {
            let casualty = casualties
                .iter()
                .find(|c| c.incident_number == annotation.dot_incident_number);
            let update = annotation_update(annotation, casualty);
            self.store.update(annotation.record_id, &update).await?;
            info!(
                record = %annotation.record_id,
                dot = annotation.dot_incident_number.as_str(),
                "Annotated DOT match"
            );
        }

        Ok(stats)
    }
}

/// Pure matching pass: pair dataset rows with ledger records using the shared
/// similarity policy. Never mutates; ambiguous pairs are counted and skipped.
pub fn reconcile(
    ledger: &[LedgerRecord],
    casualties: &[FraCasualty],
    policy: &MatchPolicy,
) -> (Vec<FraAnnotation>, ReconcileStats) {
    let mut stats = ReconcileStats {
        casualties: casualties.len() as u32,
        ..Default::default()
    };
    let mut annotations = Vec::new();

    for casualty in casualties {
        let Some(date) = casualty.date else {
            stats.unmatched += 1;
            continue;
        };
        let probe = casualty_probe(casualty, date);
        match match_candidate(&probe, ledger, policy) {
            MatchResult::Duplicate { id } => {
                // Skip records already carrying a DOT number — reconciliation
                // is idempotent across cycles.
                let already = ledger
                    .iter()
                    .find(|r| r.id == id)
                    .is_some_and(|r| r.dot_incident_number.is_some());
                if !already {
                    annotations.push(FraAnnotation {
                        record_id: id,
                        dot_incident_number: casualty.incident_number.clone(),
                        matched: true,
                    });
                }
                stats.matched += 1;
            }
            MatchResult::Ambiguous { ids } => {
                warn!(
                    dot = casualty.incident_number.as_str(),
                    candidates = ids.len(),
                    "Ambiguous dataset match, skipping annotation"
                );
                stats.ambiguous += 1;
            }
            MatchResult::New { .. } => {
                stats.unmatched += 1;
            }
        }
    }

    (annotations, stats)
}

/// Dataset rows carry no victim name; county stands in for location.
fn casualty_probe(casualty: &FraCasualty, date: NaiveDate) -> CandidateIncident {
    CandidateIncident {
        date,
        location_text: casualty.county.clone(),
        city: None,
        victim_name: None,
        age: casualty.age,
        gender: Gender::Unknown,
        mode: TravelMode::Unknown,
        time: None,
        details: String::new(),
        suicide_flag: SuicideFlag::Unknown,
        source_url: format!("fra:{}", casualty.incident_number),
        confidence: 1.0,
    }
}

fn annotation_update(annotation: &FraAnnotation, casualty: Option<&FraCasualty>) -> LedgerUpdate {
    let mut update = LedgerUpdate {
        dot_incident_number: Some(annotation.dot_incident_number.clone()),
        dot_match: Some(annotation.matched),
        ..Default::default()
    };
    if let Some(casualty) = casualty {
        if let (Some(lat), Some(lon)) = (casualty.latitude, casualty.longitude) {
            update.lat = Some(lat);
            update.lon = Some(lon);
            update.map_link = Some(format!("https://www.google.com/maps?q={lat},{lon}"));
        }
    }
    update
}
