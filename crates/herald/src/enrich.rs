use std::sync::Arc;

use herald_core::Article;
use snafu::{ResultExt as _, Snafu};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::extract::readable_text;
use crate::summarizer::{SummarizeError, Summarizer};

const LOG_TARGET: &str = "herald::enrich";

#[derive(Debug, Snafu)]
pub enum EnrichError {
    #[snafu(display("Enrichment cancelled"))]
    Cancelled,
    #[snafu(display("Fetching article page {url} failed"))]
    Http { url: String, source: reqwest::Error },
    #[snafu(display("Article page {url} responded with {status}"))]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    #[snafu(display("Summarization failed"))]
    Summarize { source: SummarizeError },
}

pub type EnrichResult<T> = std::result::Result<T, EnrichError>;

impl EnrichError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            EnrichError::Cancelled
                | EnrichError::Summarize {
                    source: SummarizeError::Cancelled
                }
        )
    }
}

/// Derives the summary published along an article
pub struct Enricher {
    client: reqwest::Client,
    summarizer: Arc<dyn Summarizer>,
}

impl Enricher {
    pub fn new(client: reqwest::Client, summarizer: Arc<dyn Summarizer>) -> Self {
        Self { client, summarizer }
    }

    /// Plain text to summarize
    ///
    /// The summary ingested with the article if it has one, otherwise the
    /// page behind the article's link.
    pub async fn article_text(
        &self,
        article: &Article,
        cancel: &CancellationToken,
    ) -> EnrichResult<String> {
        let html = if article.summary.trim().is_empty() {
            debug!(target: LOG_TARGET, article_id = %article.id, link = %article.link, "Fetching article page");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return CancelledSnafu.fail(),
                res = self.fetch_page(&article.link) => res?,
            }
        } else {
            article.summary.clone()
        };

        Ok(readable_text(&html))
    }

    /// Summary of `article`; empty if the summarizer is disabled
    pub async fn summarize(
        &self,
        article: &Article,
        cancel: &CancellationToken,
    ) -> EnrichResult<String> {
        let text = self.article_text(article, cancel).await?;
        self.summarizer
            .summarize(&text, cancel)
            .await
            .context(SummarizeSnafu)
    }

    async fn fetch_page(&self, url: &str) -> EnrichResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context(HttpSnafu { url })?;

        let status = response.status();
        if !status.is_success() {
            return HttpStatusSnafu { url, status }.fail();
        }

        response.text().await.context(HttpSnafu { url })
    }
}
