use thiserror::Error;

/// Error taxonomy for the tracker pipeline.
///
/// Per-article errors (`TransientSupply`, `Extraction`, `Validation`) are
/// isolated and reported in the run summary. `Store` is run-fatal: once a
/// write is uncertain, downstream state integrity cannot be guaranteed.
/// `Reconciliation` aborts the reconciliation cycle only.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Transient supply error: {0}")]
    TransientSupply(String),

    #[error("Extraction failed for {url}: {reason}")]
    Extraction { url: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Record store error: {0}")]
    Store(String),

    #[error("Reconciliation error: {0}")]
    Reconciliation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl TrackerError {
    /// Whether this error aborts the remainder of a detection run.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, TrackerError::Store(_) | TrackerError::Config(_))
    }
}
