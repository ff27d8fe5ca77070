//! Webhook run notification.
//!
//! Posts the run summary as JSON to a configured endpoint. Delivery is
//! best-effort; the orchestrator logs failures and moves on.

use async_trait::async_trait;

use railwatch_common::TrackerError;

use crate::stats::RunSummary;
use crate::traits::Notifier;

pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, summary: &RunSummary) -> Result<(), TrackerError> {
        let response = self
            .http
            .post(&self.url)
            .json(summary)
            .send()
            .await
            .map_err(|e| TrackerError::TransientSupply(format!("webhook send failed: {e}")))?;
        if !response.status().is_success() {
            return Err(TrackerError::TransientSupply(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
