//! Detection run orchestration.
//!
//! Per article: filter → extract → dedup → merge. Extraction is the
//! network-bound step, so it runs with bounded parallelism; dedup and merge
//! are serialized against a single in-run ledger view so near-duplicate
//! candidates in the same batch see each other instead of both landing as
//! `new`. One article's failure never aborts the rest; a store failure does.
//!
//! Re-entrancy: the caller's scheduler must guarantee at most one active
//! detection run and one active reconciliation run at a time. The ledger's
//! read-modify-write is not safe under concurrent writers.

use std::collections::HashSet;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use railwatch_common::{normalize_url, Article, TrackerConfig, TrackerError};

use crate::dedup::{match_candidate, MatchPolicy};
use crate::extractor::{ExtractionOutcome, IncidentExtractor};
use crate::filter::{FilterDecision, KeywordFilter};
use crate::merger::{LedgerMerger, LedgerMutation, LedgerState};
use crate::stats::{DraftSummary, RunFailure, RunStats, RunSummary};
use crate::traits::{ArticleSupplier, LedgerStore, Notifier};

pub struct PipelineOrchestrator<'a> {
    supplier: &'a dyn ArticleSupplier,
    extractor: &'a dyn IncidentExtractor,
    store: &'a dyn LedgerStore,
    notifier: Option<&'a dyn Notifier>,
    config: TrackerConfig,
}

impl<'a> PipelineOrchestrator<'a> {
    pub fn new(
        supplier: &'a dyn ArticleSupplier,
        extractor: &'a dyn IncidentExtractor,
        store: &'a dyn LedgerStore,
        notifier: Option<&'a dyn Notifier>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            supplier,
            extractor,
            store,
            notifier,
            config,
        }
    }

    /// Execute one detection run and return its summary.
    ///
    /// Returns Err only for run-fatal conditions (supply entirely down,
    /// record store unreachable). Everything else is accounted for in the
    /// summary's failure list.
    pub async fn run(&self) -> Result<RunSummary, TrackerError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(run_id = %run_id, "Starting detection run");

        let articles = self.supplier.fetch_articles().await?;
        // Single consistent snapshot for the whole run.
        let snapshot = self.store.snapshot().await?;
        let mut state = LedgerState::new(snapshot);

        let mut stats = RunStats {
            ingested: articles.len() as u32,
            ..Default::default()
        };
        let mut failures: Vec<RunFailure> = Vec::new();
        let mut drafts: Vec<DraftSummary> = Vec::new();

        // --- Phase 1: URL-level dedup + keyword gate (cheap, sequential) ---
        let mut filter = KeywordFilter::new(&self.config);
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut survivors: Vec<Article> = Vec::new();

        for article in articles {
            if !seen_urls.insert(normalize_url(&article.url)) {
                stats.url_skipped += 1;
                continue;
            }
            if state.record_for_url(&article.url).is_some() {
                debug!(url = article.url.as_str(), "URL already in ledger");
                stats.url_skipped += 1;
                continue;
            }
            match filter.decide(&article) {
                FilterDecision::Pass { .. } => survivors.push(article),
                FilterDecision::Reject { reason } => {
                    debug!(url = article.url.as_str(), %reason, "Filtered out");
                    stats.filtered += 1;
                }
            }
        }
        debug!("{}", filter.stats());

        if survivors.len() > self.config.max_extractions_per_run {
            info!(
                dropped = survivors.len() - self.config.max_extractions_per_run,
                "Extraction cap reached, deferring remainder to next run"
            );
            survivors.truncate(self.config.max_extractions_per_run);
        }

        // --- Phase 2: model extraction, bounded parallelism ---
        let extractor = self.extractor;
        let outcomes: Vec<(Article, Result<ExtractionOutcome, TrackerError>)> =
            stream::iter(survivors.into_iter().map(|article| async move {
                let outcome = extractor.extract(&article).await;
                (article, outcome)
            }))
            .buffered(self.config.extraction_concurrency.max(1))
            .collect()
            .await;

        // --- Phase 3: dedup + merge, serialized against the in-run state ---
        let merger = LedgerMerger::new(self.store);
        let policy = MatchPolicy::from(&self.config);

        for (article, outcome) in outcomes {
            match outcome {
                Ok(ExtractionOutcome::Incident(candidate)) => {
                    stats.extracted += 1;
                    let match_result = match_candidate(&candidate, state.records(), &policy);
                    match merger.apply(&candidate, &match_result, &mut state).await {
                        Ok(LedgerMutation::Inserted { id }) => {
                            stats.new_records += 1;
                            drafts.push(DraftSummary {
                                id,
                                date: candidate.date,
                                location: candidate.location_key().to_string(),
                                victim_name: candidate.victim_name.clone(),
                                ambiguous: false,
                            });
                        }
                        Ok(LedgerMutation::SourcesMerged { id, backfilled }) => {
                            info!(record = %id, ?backfilled, "Merged duplicate mention");
                            stats.duplicates += 1;
                        }
                        Ok(LedgerMutation::AmbiguousDraft { id, over }) => {
                            warn!(record = %id, candidates = over.len(), "Ambiguous match escalated");
                            stats.ambiguous += 1;
                            drafts.push(DraftSummary {
                                id,
                                date: candidate.date,
                                location: candidate.location_key().to_string(),
                                victim_name: candidate.victim_name.clone(),
                                ambiguous: true,
                            });
                        }
                        Ok(LedgerMutation::Unchanged { .. }) => {
                            stats.url_skipped += 1;
                        }
                        // Store failure: writes are now uncertain, so no
                        // partial success claim — abort the run.
                        Err(e) if e.is_run_fatal() => return Err(e),
                        Err(e) => {
                            stats.errored += 1;
                            failures.push(RunFailure {
                                url: article.url.clone(),
                                reason: e.to_string(),
                            });
                        }
                    }
                }
                Ok(ExtractionOutcome::NoIncident { reason }) => {
                    debug!(url = article.url.as_str(), reason, "No incident");
                    stats.no_incident += 1;
                }
                Err(e) => {
                    stats.errored += 1;
                    failures.push(RunFailure {
                        url: article.url.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            stats,
            drafts,
            failures,
        };

        if summary.needs_notification() {
            if let Some(notifier) = self.notifier {
                // Fire-and-forget: delivery failure is logged, never fatal.
                if let Err(e) = notifier.notify(&summary).await {
                    warn!(error = %e, "Notification delivery failed");
                }
            }
        }

        info!(
            run_id = %run_id,
            new = summary.stats.new_records,
            duplicates = summary.stats.duplicates,
            ambiguous = summary.stats.ambiguous,
            errored = summary.stats.errored,
            "Detection run complete"
        );
        Ok(summary)
    }
}
