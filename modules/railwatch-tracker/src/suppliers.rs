//! RSS article supplier.
//!
//! Pulls from a seed list of Google News query feeds plus local outlets
//! covering the corridor. One broken feed never fails the batch; a batch
//! where every feed fails is a transient supply error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use railwatch_common::{Article, TrackerError};

use crate::traits::ArticleSupplier;

/// Seed feeds: Google News queries for the tracked operator, then local
/// outlets along the corridor.
const NEWS_FEEDS: &[&str] = &[
    "https://news.google.com/rss/search?q=Brightline+train+death",
    "https://news.google.com/rss/search?q=Brightline+fatality",
    "https://news.google.com/rss/search?q=Brightline+pedestrian+killed",
    "https://news.google.com/rss/search?q=Brightline+accident+Florida",
    // Local coverage
    "https://www.sun-sentinel.com/feed/",
    "https://www.orlandosentinel.com/feed/",
    "https://www.palmbeachpost.com/rss/",
    "https://www.tcpalm.com/rss/",
    "https://www.wptv.com/news/rss/",
    "https://www.local10.com/rss/",
];

pub struct RssSupplier {
    http: reqwest::Client,
    feeds: Vec<String>,
}

impl RssSupplier {
    pub fn new() -> Self {
        Self::with_feeds(NEWS_FEEDS.iter().map(|s| s.to_string()).collect())
    }

    pub fn with_feeds(feeds: Vec<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            feeds,
        }
    }

    async fn fetch_feed(&self, feed_url: &str) -> anyhow::Result<Vec<Article>> {
        let bytes = self
            .http
            .get(feed_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let feed = feed_rs::parser::parse(&bytes[..])?;

        let source_name = feed
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| feed_url.to_string());

        let articles = feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                let url = entry.links.first().map(|l| l.href.clone())?;
                let title = entry.title.map(|t| t.content).unwrap_or_default();
                let body_text = entry
                    .summary
                    .map(|s| s.content)
                    .or_else(|| entry.content.and_then(|c| c.body))
                    .unwrap_or_default();
                let published_at: Option<DateTime<Utc>> = entry.published.or(entry.updated);
                Some(Article {
                    title,
                    body_text,
                    url,
                    published_at,
                    source_name: source_name.clone(),
                })
            })
            .collect();

        Ok(articles)
    }
}

impl Default for RssSupplier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleSupplier for RssSupplier {
    async fn fetch_articles(&self) -> Result<Vec<Article>, TrackerError> {
        let mut articles = Vec::new();
        let mut failures = 0usize;

        for feed_url in &self.feeds {
            match self.fetch_feed(feed_url).await {
                Ok(mut items) => {
                    info!(feed = feed_url.as_str(), items = items.len(), "Fetched feed");
                    articles.append(&mut items);
                }
                Err(e) => {
                    warn!(feed = feed_url.as_str(), error = %e, "Failed to fetch feed");
                    failures += 1;
                }
            }
        }

        if !self.feeds.is_empty() && failures == self.feeds.len() {
            return Err(TrackerError::TransientSupply(
                "all feeds failed to fetch".to_string(),
            ));
        }
        Ok(articles)
    }
}
