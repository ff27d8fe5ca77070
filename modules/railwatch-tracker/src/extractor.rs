//! LLM incident extraction.
//!
//! Turns raw article text into a structured candidate incident, or a
//! no-incident verdict. The model call is a single attempt with one bounded
//! retry on transient failure; a "no incident" verdict is an expected
//! outcome, never an error.

use std::time::Duration;

use ai_client::Claude;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use railwatch_common::{
    Article, CandidateIncident, Gender, SuicideFlag, TrackerConfig, TrackerError, TravelMode,
};

const MAX_ARTICLE_CHARS: usize = 30_000;

/// What the model returns for one article.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedIncident {
    /// Whether the article describes a qualifying incident at all.
    pub is_incident: bool,
    /// Date the incident occurred (ISO 8601, YYYY-MM-DD) — NOT the article
    /// publish date. Null when no date can be determined.
    pub incident_date: Option<String>,
    /// Incident time "HH:MM" (24h), if reported.
    pub incident_time: Option<String>,
    /// Full crossing/intersection/location description.
    pub location_full: Option<String>,
    /// City name only.
    pub location_city: Option<String>,
    /// Victim's full name as reported.
    pub victim_name: Option<String>,
    pub victim_age: Option<u8>,
    /// "male", "female", or "unknown"
    pub victim_gender: Option<String>,
    /// "pedestrian", "vehicle", "bicycle", or "unknown"
    pub mode: Option<String>,
    /// Brief circumstances, 1-2 sentences.
    pub details: Option<String>,
    /// "confirmed", "suspected", "unknown", or "none"
    pub is_suicide: Option<String>,
    /// True for memorial/anniversary/lawsuit coverage of a past incident.
    pub is_retrospective: bool,
    /// 0.0..=1.0 confidence that this is a qualifying incident report.
    pub confidence: f32,
}

/// Result of a successful extraction call.
#[derive(Debug, Clone)]
pub enum ExtractionOutcome {
    Incident(CandidateIncident),
    NoIncident { reason: String },
}

// --- IncidentExtractor trait ---

#[async_trait]
pub trait IncidentExtractor: Send + Sync {
    async fn extract(&self, article: &Article) -> Result<ExtractionOutcome, TrackerError>;
}

// ---------------------------------------------------------------------------
// Claude-backed extractor
// ---------------------------------------------------------------------------

pub struct ClaudeExtractor {
    claude: Claude,
    min_confidence: f32,
    tracked_epoch: NaiveDate,
    staleness_cutoff_days: i64,
    call_timeout: Duration,
    retries: u32,
}

impl ClaudeExtractor {
    pub fn new(anthropic_api_key: &str, model: &str, config: &TrackerConfig) -> Self {
        Self {
            claude: Claude::new(anthropic_api_key, model),
            min_confidence: config.min_confidence,
            tracked_epoch: config.tracked_epoch,
            staleness_cutoff_days: config.staleness_cutoff_days,
            call_timeout: Duration::from_secs(config.call_timeout_secs),
            retries: config.extraction_retries,
        }
    }

    /// One attempt against the model, bounded by the per-call timeout.
    async fn attempt(&self, article: &Article) -> Result<ExtractedIncident, TrackerError> {
        let content = truncate_at_char_boundary(&article.body_text, MAX_ARTICLE_CHARS);
        let publish_date = article
            .published_at
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        let user_prompt = format!(
            "Article title: {}\nArticle publish date (for resolving relative dates): {}\nSource URL: {}\n\n---\n\n{}",
            article.title, publish_date, article.url, content
        );

        let result = tokio::time::timeout(
            self.call_timeout,
            self.claude
                .extract::<ExtractedIncident>(SYSTEM_PROMPT, &user_prompt),
        )
        .await;

        match result {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(e)) => Err(TrackerError::Extraction {
                url: article.url.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(TrackerError::Extraction {
                url: article.url.clone(),
                reason: format!("model call timed out after {:?}", self.call_timeout),
            }),
        }
    }
}

#[async_trait]
impl IncidentExtractor for ClaudeExtractor {
    async fn extract(&self, article: &Article) -> Result<ExtractionOutcome, TrackerError> {
        // Retries cover the model call only; a validation failure is final.
        // An article that exhausts its attempts is skipped for this run, not
        // blacklisted — it is reconsidered only if the supplier yields it again.
        let raw = retry_attempts(self.retries, |_| self.attempt(article)).await?;
        debug!(url = article.url.as_str(), confidence = raw.confidence, "Extraction response");
        validate(
            raw,
            article,
            Utc::now().date_naive(),
            self.min_confidence,
            self.tracked_epoch,
            self.staleness_cutoff_days,
        )
    }
}

/// Run `call` up to `1 + retries` times, returning the first success or the
/// last error.
async fn retry_attempts<T, F, Fut>(retries: u32, mut call: F) -> Result<T, TrackerError>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, TrackerError>>,
{
    let mut attempt = 0;
    loop {
        match call(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries => {
                warn!(attempt, error = %e, "Extraction attempt failed, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation — pure, unit-testable
// ---------------------------------------------------------------------------

/// Validate the model's structured response and normalize it into a
/// `CandidateIncident`.
///
/// - explicit no-incident / retrospective / low confidence → NoIncident
/// - missing, malformed, pre-epoch, or future date → Validation error
///   (a candidate with no usable date cannot be matched and is discarded)
pub fn validate(
    raw: ExtractedIncident,
    article: &Article,
    today: NaiveDate,
    min_confidence: f32,
    tracked_epoch: NaiveDate,
    staleness_cutoff_days: i64,
) -> Result<ExtractionOutcome, TrackerError> {
    if !raw.is_incident {
        return Ok(ExtractionOutcome::NoIncident {
            reason: "model reported no qualifying incident".to_string(),
        });
    }
    if raw.is_retrospective {
        return Ok(ExtractionOutcome::NoIncident {
            reason: "retrospective coverage of a past incident".to_string(),
        });
    }
    if raw.confidence < min_confidence {
        return Ok(ExtractionOutcome::NoIncident {
            reason: format!(
                "confidence {:.2} below floor {:.2}",
                raw.confidence, min_confidence
            ),
        });
    }

    let date_str = raw.incident_date.as_deref().unwrap_or("").trim().to_string();
    if date_str.is_empty() {
        return Err(TrackerError::Validation(format!(
            "no extractable incident date for {}",
            article.url
        )));
    }
    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|_| {
        TrackerError::Validation(format!(
            "malformed incident date \"{date_str}\" for {}",
            article.url
        ))
    })?;
    if date < tracked_epoch {
        return Err(TrackerError::Validation(format!(
            "incident date {date} precedes tracked epoch {tracked_epoch}"
        )));
    }
    if date > today {
        return Err(TrackerError::Validation(format!(
            "incident date {date} is in the future"
        )));
    }
    if (today - date).num_days() > staleness_cutoff_days {
        return Ok(ExtractionOutcome::NoIncident {
            reason: format!(
                "incident date {date} is {} days old, treating as retrospective",
                (today - date).num_days()
            ),
        });
    }

    let location_text = raw
        .location_full
        .as_deref()
        .or(raw.location_city.as_deref())
        .map(str::trim)
        .unwrap_or("")
        .to_string();

    Ok(ExtractionOutcome::Incident(CandidateIncident {
        date,
        location_text,
        city: clean_optional(raw.location_city),
        victim_name: clean_optional(raw.victim_name),
        age: raw.victim_age,
        gender: parse_gender(raw.victim_gender.as_deref()),
        mode: parse_mode(raw.mode.as_deref()),
        time: clean_optional(raw.incident_time),
        details: raw.details.map(|d| d.trim().to_string()).unwrap_or_default(),
        suicide_flag: parse_suicide(raw.is_suicide.as_deref()),
        source_url: article.url.clone(),
        confidence: raw.confidence,
    }))
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

fn parse_gender(s: Option<&str>) -> Gender {
    match s.map(str::to_lowercase).as_deref() {
        Some("male") => Gender::Male,
        Some("female") => Gender::Female,
        _ => Gender::Unknown,
    }
}

fn parse_mode(s: Option<&str>) -> TravelMode {
    match s.map(str::to_lowercase).as_deref() {
        Some("pedestrian") => TravelMode::Pedestrian,
        Some("vehicle") => TravelMode::Vehicle,
        Some("bicycle") => TravelMode::Bicycle,
        _ => TravelMode::Unknown,
    }
}

fn parse_suicide(s: Option<&str>) -> SuicideFlag {
    match s.map(str::to_lowercase).as_deref() {
        Some("confirmed") => SuicideFlag::Confirmed,
        Some("suspected") => SuicideFlag::Suspected,
        Some("unknown") => SuicideFlag::Unknown,
        _ => SuicideFlag::None,
    }
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

const SYSTEM_PROMPT: &str = r#"You are analyzing a news article about a potential passenger-train incident.

CRITICAL INSTRUCTIONS:
1. Extract the INCIDENT DATE — the date the incident actually occurred — NOT the article publish date. Resolve phrases like "on Monday", "yesterday", "last Tuesday" against the provided publish date.
2. If the article is a retrospective piece (memorial, anniversary, lawsuit update, or commentary about past deaths), set is_retrospective to true.
3. Set is_incident to true only when the article reports an actual train-involved death or fatality.
4. If the article mentions multiple incidents, extract only the PRIMARY/MOST RECENT one.
5. Report only facts present in the provided text. Never invent a victim name, age, or cause; use null for anything the article does not state.

Confidence scoring guide:
- 1.0: explicit train death with clear date, location, and details
- 0.8-0.9: death confirmed but missing some details
- 0.6-0.7: likely a qualifying death but some ambiguity
- 0.3-0.5: possibly qualifying but unclear
- 0.0-0.2: not about a qualifying death, or injuries only"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> Article {
        Article {
            title: "Pedestrian killed".to_string(),
            body_text: "body".to_string(),
            url: "https://example.com/story".to_string(),
            published_at: None,
            source_name: "test".to_string(),
        }
    }

    fn raw(date: Option<&str>) -> ExtractedIncident {
        ExtractedIncident {
            is_incident: true,
            incident_date: date.map(String::from),
            incident_time: None,
            location_full: Some("NE 6th Ave crossing".to_string()),
            location_city: Some("Pompano Beach".to_string()),
            victim_name: Some("John Smith".to_string()),
            victim_age: Some(42),
            victim_gender: Some("male".to_string()),
            mode: Some("pedestrian".to_string()),
            details: Some("Struck at crossing.".to_string()),
            is_suicide: Some("unknown".to_string()),
            is_retrospective: false,
            confidence: 0.9,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    fn epoch() -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 1, 1).unwrap()
    }

    fn run(raw: ExtractedIncident) -> Result<ExtractionOutcome, TrackerError> {
        validate(raw, &article(), today(), 0.7, epoch(), 30)
    }

    #[test]
    fn valid_response_becomes_candidate() {
        let outcome = run(raw(Some("2024-03-01"))).unwrap();
        match outcome {
            ExtractionOutcome::Incident(c) => {
                assert_eq!(c.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
                assert_eq!(c.city.as_deref(), Some("Pompano Beach"));
                assert_eq!(c.gender, Gender::Male);
                assert_eq!(c.mode, TravelMode::Pedestrian);
            }
            other => panic!("expected incident, got {other:?}"),
        }
    }

    #[test]
    fn missing_date_is_a_validation_error() {
        let err = run(raw(None)).unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));
    }

    #[test]
    fn malformed_date_is_a_validation_error() {
        let err = run(raw(Some("March 1st"))).unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));
    }

    #[test]
    fn pre_epoch_date_is_rejected() {
        let err = run(raw(Some("2016-05-01"))).unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));
    }

    #[test]
    fn future_date_is_rejected() {
        let err = run(raw(Some("2024-04-01"))).unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));
    }

    #[test]
    fn explicit_no_incident_verdict_is_not_an_error() {
        let mut r = raw(Some("2024-03-01"));
        r.is_incident = false;
        assert!(matches!(
            run(r).unwrap(),
            ExtractionOutcome::NoIncident { .. }
        ));
    }

    #[test]
    fn low_confidence_downgrades_to_no_incident() {
        let mut r = raw(Some("2024-03-01"));
        r.confidence = 0.4;
        assert!(matches!(
            run(r).unwrap(),
            ExtractionOutcome::NoIncident { .. }
        ));
    }

    #[test]
    fn stale_incident_is_treated_as_retrospective() {
        let outcome = run(raw(Some("2024-01-01"))).unwrap();
        assert!(matches!(outcome, ExtractionOutcome::NoIncident { .. }));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "é".repeat(10);
        let t = truncate_at_char_boundary(&s, 7);
        assert!(t.len() <= 7);
        assert!(s.starts_with(t));
    }

    fn transient(reason: &str) -> TrackerError {
        TrackerError::Extraction {
            url: "https://example.com/story".to_string(),
            reason: reason.to_string(),
        }
    }

    #[tokio::test]
    async fn transient_failure_recovers_on_the_retry() {
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result = retry_attempts(1, |_| {
            let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(transient("model call timed out after 30s"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_failure_surfaces_the_extraction_error() {
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result: Result<ExtractedIncident, _> = retry_attempts(1, |_| {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { Err(transient("model call timed out after 30s")) }
        })
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, TrackerError::Extraction { .. }));
        // One attempt plus exactly one retry, never more.
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
