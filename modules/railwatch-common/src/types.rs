use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Article (supplier output, never persisted) ---

/// Raw article as delivered by a supplier. Transient: lives only for the
/// duration of a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub body_text: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: String,
}

impl Article {
    /// Title and body concatenated, the haystack for keyword filtering.
    pub fn search_text(&self) -> String {
        format!("{} {}", self.title, self.body_text)
    }
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gender::Male => write!(f, "Male"),
            Gender::Female => write!(f, "Female"),
            Gender::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    Pedestrian,
    Vehicle,
    Bicycle,
    #[default]
    Unknown,
}

impl std::fmt::Display for TravelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TravelMode::Pedestrian => write!(f, "Pedestrian"),
            TravelMode::Vehicle => write!(f, "Vehicle"),
            TravelMode::Bicycle => write!(f, "Bicycle"),
            TravelMode::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SuicideFlag {
    Confirmed,
    Suspected,
    Unknown,
    #[default]
    None,
}

impl std::fmt::Display for SuicideFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuicideFlag::Confirmed => write!(f, "Confirmed"),
            SuicideFlag::Suspected => write!(f, "Suspected"),
            SuicideFlag::Unknown => write!(f, "Unknown"),
            SuicideFlag::None => write!(f, "None"),
        }
    }
}

// --- Candidate incident (extraction output, never persisted standalone) ---

/// Structured incident facts extracted from one article. Consumed and
/// discarded once merged into the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateIncident {
    /// Calendar date the incident occurred. Primary temporal key for matching.
    pub date: NaiveDate,
    /// Free-form location as reported ("NE 6th Ave crossing near Atlantic Blvd").
    pub location_text: String,
    /// Normalized city name, when the article names one.
    pub city: Option<String>,
    /// Victim name as reported. None when unnamed or reported as unknown.
    pub victim_name: Option<String>,
    pub age: Option<u8>,
    pub gender: Gender,
    pub mode: TravelMode,
    /// Incident time ("HH:MM", 24h) when reported.
    pub time: Option<String>,
    /// Brief circumstances, display text only.
    pub details: String,
    pub suicide_flag: SuicideFlag,
    pub source_url: String,
    /// Extractor's own confidence in the record, 0.0..=1.0.
    pub confidence: f32,
}

impl CandidateIncident {
    /// Best available location string: city when present, else the free text.
    pub fn location_key(&self) -> &str {
        self.city.as_deref().unwrap_or(&self.location_text)
    }

    /// Victim name usable for identity matching. "unknown" (any casing) is a
    /// wildcard that neither confirms nor denies a match, so it maps to None.
    pub fn matchable_name(&self) -> Option<&str> {
        self.victim_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty() && !n.eq_ignore_ascii_case("unknown"))
    }
}

// --- Record status ---

/// Human-review lifecycle of a ledger record. `Approved` and `Rejected` are
/// terminal: nothing in the pipeline moves a record out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Draft,
    Approved,
    Rejected,
}

impl RecordStatus {
    /// Valid transitions: Draft -> Approved, Draft -> Rejected. Everything
    /// else (including self-transitions out of a terminal state) is invalid.
    pub fn can_transition_to(self, next: RecordStatus) -> bool {
        matches!(
            (self, next),
            (RecordStatus::Draft, RecordStatus::Approved)
                | (RecordStatus::Draft, RecordStatus::Rejected)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RecordStatus::Approved | RecordStatus::Rejected)
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordStatus::Draft => write!(f, "Draft"),
            RecordStatus::Approved => write!(f, "Approved"),
            RecordStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

// --- Ledger record (persisted) ---

/// Persisted incident. Created as Draft by the merger, reviewed by a human,
/// annotated by FRA reconciliation. Never deleted, only marked Rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: Uuid,
    pub date: NaiveDate,
    pub location_text: String,
    pub city: Option<String>,
    pub victim_name: Option<String>,
    pub age: Option<u8>,
    pub gender: Gender,
    pub mode: TravelMode,
    pub time: Option<String>,
    pub details: String,
    pub suicide_flag: SuicideFlag,
    pub status: RecordStatus,
    /// Federal incident number, filled by reconciliation only.
    pub dot_incident_number: Option<String>,
    pub dot_match: bool,
    pub news_source_present: bool,
    /// Source URLs. Grows only: merges union, never replace.
    pub sources: BTreeSet<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub map_link: Option<String>,
    /// Reviewer-facing annotation: ambiguity escalations and
    /// rejected-match warnings land here.
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerRecord {
    /// Draft record seeded from a candidate. Sources start as the single
    /// extracting article's URL.
    pub fn from_candidate(candidate: &CandidateIncident, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            date: candidate.date,
            location_text: candidate.location_text.clone(),
            city: candidate.city.clone(),
            victim_name: candidate.victim_name.clone(),
            age: candidate.age,
            gender: candidate.gender,
            mode: candidate.mode,
            time: candidate.time.clone(),
            details: candidate.details.clone(),
            suicide_flag: candidate.suicide_flag,
            status: RecordStatus::Draft,
            dot_incident_number: None,
            dot_match: false,
            news_source_present: true,
            sources: BTreeSet::from([candidate.source_url.clone()]),
            lat: None,
            lon: None,
            map_link: None,
            review_note: None,
            created_at: now,
        }
    }

    /// Best available location string for matching, mirroring
    /// `CandidateIncident::location_key`.
    pub fn location_key(&self) -> &str {
        self.city.as_deref().unwrap_or(&self.location_text)
    }

    /// See `CandidateIncident::matchable_name`.
    pub fn matchable_name(&self) -> Option<&str> {
        self.victim_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty() && !n.eq_ignore_ascii_case("unknown"))
    }

    /// Whether this record participates in duplicate matching.
    pub fn is_matchable(&self) -> bool {
        !matches!(self.status, RecordStatus::Rejected)
    }
}

/// Canonical form of a source URL for idempotency checks: trimmed, no
/// trailing slash, scheme and host lowercased. The path keeps its case —
/// servers may treat /Story-A and /story-a as distinct articles.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    let host_start = match url.find("://") {
        Some(i) => i + 3,
        None => return url.to_lowercase(),
    };
    let path_start = url[host_start..]
        .find('/')
        .map(|i| host_start + i)
        .unwrap_or(url.len());
    let mut out = url[..path_start].to_lowercase();
    out.push_str(&url[path_start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_admit_no_transitions() {
        for next in [
            RecordStatus::Draft,
            RecordStatus::Approved,
            RecordStatus::Rejected,
        ] {
            assert!(!RecordStatus::Approved.can_transition_to(next));
            assert!(!RecordStatus::Rejected.can_transition_to(next));
        }
    }

    #[test]
    fn draft_transitions_to_both_terminals_only() {
        assert!(RecordStatus::Draft.can_transition_to(RecordStatus::Approved));
        assert!(RecordStatus::Draft.can_transition_to(RecordStatus::Rejected));
        assert!(!RecordStatus::Draft.can_transition_to(RecordStatus::Draft));
    }

    #[test]
    fn unknown_name_is_not_matchable() {
        let mut record = sample_record();
        record.victim_name = Some("Unknown".to_string());
        assert_eq!(record.matchable_name(), None);
        record.victim_name = Some("  ".to_string());
        assert_eq!(record.matchable_name(), None);
        record.victim_name = Some("John Smith".to_string());
        assert_eq!(record.matchable_name(), Some("John Smith"));
    }

    #[test]
    fn url_normalization_collapses_trivial_variants() {
        assert_eq!(
            normalize_url("https://Example.com/story/"),
            normalize_url("https://example.com/story")
        );
        assert_eq!(
            normalize_url("HTTPS://EXAMPLE.COM"),
            normalize_url("https://example.com/")
        );
    }

    #[test]
    fn url_normalization_preserves_path_case() {
        assert_ne!(
            normalize_url("https://example.com/Story-A"),
            normalize_url("https://example.com/story-a")
        );
        assert_eq!(
            normalize_url("https://Example.com/Story-A/"),
            "https://example.com/Story-A"
        );
    }

    fn sample_record() -> LedgerRecord {
        let candidate = CandidateIncident {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            location_text: "Hollywood FL".to_string(),
            city: Some("Hollywood".to_string()),
            victim_name: None,
            age: None,
            gender: Gender::Unknown,
            mode: TravelMode::Pedestrian,
            time: None,
            details: "Struck at crossing".to_string(),
            suicide_flag: SuicideFlag::Unknown,
            source_url: "https://example.com/a".to_string(),
            confidence: 0.9,
        };
        LedgerRecord::from_candidate(&candidate, Utc::now())
    }
}
