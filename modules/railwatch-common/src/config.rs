use std::env;

use chrono::NaiveDate;

/// Process-level configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub extraction_model: String,
    /// Webhook endpoint for run notifications. None disables notification.
    pub notify_webhook_url: Option<String>,
    /// Socrata app token for the federal casualty dataset (higher rate limits).
    pub fra_app_token: Option<String>,
    /// Path of the JSON-file ledger store used by the bundled binary.
    pub ledger_path: String,
    pub tracker: TrackerConfig,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            extraction_model: env::var("EXTRACTION_MODEL")
                .unwrap_or_else(|_| "claude-haiku-4-5-20251001".to_string()),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok(),
            fra_app_token: env::var("FRA_APP_TOKEN").ok(),
            ledger_path: env::var("LEDGER_PATH").unwrap_or_else(|_| "data/ledger.json".to_string()),
            tracker: TrackerConfig::default(),
        }
    }

    /// Load a config for reconciliation only (no extraction key needed).
    pub fn reconcile_from_env() -> Self {
        Self {
            anthropic_api_key: String::new(),
            extraction_model: String::new(),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok(),
            fra_app_token: env::var("FRA_APP_TOKEN").ok(),
            ledger_path: env::var("LEDGER_PATH").unwrap_or_else(|_| "data/ledger.json".to_string()),
            tracker: TrackerConfig::default(),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

/// Pipeline tuning knobs. Defaults are the operating values; every one of
/// them is plain data so tests and operators can override freely.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// At least one must appear for an article to survive filtering.
    pub required_keywords: Vec<String>,
    /// At least one must appear (death/struck-type terms).
    pub incident_keywords: Vec<String>,
    /// Any match rejects the article outright (stock-report false positives).
    pub exclusion_keywords: Vec<String>,
    /// Date band half-width for duplicate matching, in days.
    pub date_tolerance_days: i64,
    /// Location similarity duplicate threshold, 0.0..=1.0.
    pub location_threshold: f64,
    /// Name similarity duplicate threshold, 0.0..=1.0.
    pub name_threshold: f64,
    /// Extractions below this confidence are treated as no-incident verdicts.
    pub min_confidence: f32,
    /// Per external call timeout.
    pub call_timeout_secs: u64,
    /// Bounded retries after the first attempt of a model call.
    pub extraction_retries: u32,
    /// Concurrent in-flight extraction calls within one run.
    pub extraction_concurrency: usize,
    /// Cost control: at most this many extraction calls per run.
    pub max_extractions_per_run: usize,
    /// Earliest incident date the ledger tracks.
    pub tracked_epoch: NaiveDate,
    /// Incidents older than this many days at extraction time are treated
    /// as retrospective coverage, not fresh reports.
    pub staleness_cutoff_days: i64,
    /// Reconciliation look-back window over the federal dataset, in days.
    pub fra_days_back: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            required_keywords: vec!["brightline".to_string()],
            incident_keywords: [
                "death", "dead", "died", "killed", "fatal", "fatality", "struck", "hit by train",
            ]
            .map(String::from)
            .to_vec(),
            exclusion_keywords: [
                "stock", "shares", "earnings", "ipo", "investor", "quarterly",
            ]
            .map(String::from)
            .to_vec(),
            date_tolerance_days: 0,
            location_threshold: 0.80,
            name_threshold: 0.85,
            min_confidence: 0.7,
            call_timeout_secs: 30,
            extraction_retries: 1,
            extraction_concurrency: 4,
            max_extractions_per_run: 10,
            // First full year of revenue service; nothing earlier is tracked.
            tracked_epoch: NaiveDate::from_ymd_opt(2018, 1, 1).expect("valid epoch"),
            staleness_cutoff_days: 30,
            fra_days_back: 90,
        }
    }
}
