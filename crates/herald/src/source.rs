use herald_core::{Feed, RawEntry};
use snafu::{ResultExt as _, Snafu};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const LOG_TARGET: &str = "herald::source";

/// Retrieval or parsing of a feed document failed
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SourceUnavailableError {
    #[snafu(display("Request to {url} failed"))]
    Http { url: String, source: reqwest::Error },
    #[snafu(display("{url} responded with {status}"))]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    #[snafu(display("Malformed feed document at {url}"))]
    Parse {
        url: String,
        source: feed_rs::parser::ParseFeedError,
    },
}

#[derive(Debug, Snafu)]
pub enum SourceError {
    #[snafu(display("Feed fetch cancelled"))]
    Cancelled,
    #[snafu(display("Source unavailable"))]
    Unavailable { source: SourceUnavailableError },
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;

impl SourceError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SourceError::Cancelled)
    }
}

/// Retrieves and parses one feed
///
/// Entries come back in the order the document lists them. No retries:
/// a failed feed is simply tried again on the next cycle.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self, feed: &Feed, cancel: &CancellationToken) -> SourceResult<Vec<RawEntry>>;
}

/// RSS, Atom and JSON Feed over http(s)
pub struct HttpFeedSource {
    client: reqwest::Client,
}

impl HttpFeedSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_document(
        &self,
        url: &str,
    ) -> std::result::Result<Vec<RawEntry>, SourceUnavailableError> {
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

        let body = response.bytes().await.context(HttpSnafu { url })?;
        let document = feed_rs::parser::parse(&body[..]).context(ParseSnafu { url })?;

        debug!(target: LOG_TARGET, %url, count = document.entries.len(), "Parsed feed document");
        Ok(document.entries.into_iter().map(raw_entry_from).collect())
    }
}

#[async_trait::async_trait]
impl SourceAdapter for HttpFeedSource {
    async fn fetch(&self, feed: &Feed, cancel: &CancellationToken) -> SourceResult<Vec<RawEntry>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => CancelledSnafu.fail(),
            res = self.fetch_document(&feed.url) => res.context(UnavailableSnafu),
        }
    }
}

fn raw_entry_from(entry: feed_rs::model::Entry) -> RawEntry {
    let published_at = entry
        .published
        .or(entry.updated)
        .and_then(|dt| OffsetDateTime::from_unix_timestamp(dt.timestamp()).ok());

    let summary = entry
        .summary
        .map(|text| text.content)
        .filter(|s| !s.trim().is_empty())
        .or_else(|| entry.content.and_then(|content| content.body))
        .unwrap_or_default();

    RawEntry {
        title: entry.title.map(|text| text.content).unwrap_or_default(),
        link: entry_link(entry.links),
        summary,
        categories: entry.categories.into_iter().map(|c| c.term).collect(),
        published_at,
    }
}

/// The entry's own page: the first `alternate` (or rel-less) link
///
/// Atom entries may list `replies`, `self` or `edit` links before it. Falls
/// back to the first link of any kind.
fn entry_link(links: Vec<feed_rs::model::Link>) -> String {
    let idx = links
        .iter()
        .position(|link| matches!(link.rel.as_deref(), None | Some("alternate")))
        .unwrap_or(0);
    links
        .into_iter()
        .nth(idx)
        .map(|link| link.href)
        .unwrap_or_default()
}
