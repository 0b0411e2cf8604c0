use std::sync::Arc;

use herald_core::error::FmtCompact as _;
use herald_core::{Feed, FeedId, NewArticle, RawEntry, Timestamp};
use serde::Serialize;
use snafu::{ResultExt as _, Snafu};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{CancelledSnafu, CycleResult};
use crate::filter::KeywordFilter;
use crate::scheduler::Cycle;
use crate::source::{SourceAdapter, SourceError};
use crate::store::{ArticleStore, FeedRegistry, InsertOutcome, StoreError};

const LOG_TARGET: &str = "herald::fetcher";

/// Failure of a single feed within a fetch cycle
#[derive(Debug, Snafu)]
pub enum FeedError {
    #[snafu(display("Fetching feed failed"))]
    Source { source: SourceError },
    #[snafu(display("Storing article failed"))]
    Store { source: StoreError },
}

impl FeedError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            FeedError::Source { source } => source.is_cancelled(),
            FeedError::Store { source } => matches!(source, StoreError::Cancelled),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeedReport {
    pub entries: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub skipped: usize,
    /// Entries dropped for not having a link
    pub linkless: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    pub feeds: usize,
    pub failed_feeds: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

impl FetchReport {
    fn add_feed(&mut self, feed: FeedReport) {
        self.stored += feed.stored;
        self.duplicates += feed.duplicates;
        self.skipped += feed.skipped + feed.linkless;
    }
}

/// Pulls all registered feeds into the article store
///
/// Every cycle reads the feed list afresh and processes each feed in its own
/// task. A feed that fails is logged and counted, and has no effect on the
/// others.
pub struct FetchCoordinator {
    registry: Arc<dyn FeedRegistry>,
    store: Arc<dyn ArticleStore>,
    source: Arc<dyn SourceAdapter>,
    filter: Arc<KeywordFilter>,
}

#[bon::bon]
impl FetchCoordinator {
    #[builder(finish_fn(name = "build"))]
    pub fn new(
        registry: Arc<dyn FeedRegistry>,
        store: Arc<dyn ArticleStore>,
        source: Arc<dyn SourceAdapter>,
        #[builder(default)] filter: KeywordFilter,
    ) -> Self {
        Self {
            registry,
            store,
            source,
            filter: Arc::new(filter),
        }
    }

    /// Run one fetch cycle
    ///
    /// Returns only after every feed is done, or right away with
    /// [`crate::error::CycleError::Cancelled`] when `cancel` fires, abandoning
    /// the feeds still in flight.
    pub async fn fetch_once(&self, cancel: &CancellationToken) -> CycleResult<FetchReport> {
        let cycle_started = Timestamp::now();
        let feeds = self.registry.list_feeds(cancel).await?;

        let mut report = FetchReport {
            feeds: feeds.len(),
            ..Default::default()
        };
        debug!(target: LOG_TARGET, count = feeds.len(), "Fetching feeds");

        let mut tasks = JoinSet::new();
        for feed in feeds {
            let source = self.source.clone();
            let store = self.store.clone();
            let filter = self.filter.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let res = process_feed(
                    source.as_ref(),
                    store.as_ref(),
                    &filter,
                    &feed,
                    cycle_started,
                    &cancel,
                )
                .await;
                (feed.id, res)
            });
        }

        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    return CancelledSnafu.fail();
                }
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };

            match joined {
                Ok((feed_id, Ok(feed_report))) => {
                    info!(
                        target: LOG_TARGET,
                        %feed_id,
                        entries = feed_report.entries,
                        stored = feed_report.stored,
                        duplicates = feed_report.duplicates,
                        skipped = feed_report.skipped,
                        linkless = feed_report.linkless,
                        "Feed processed"
                    );
                    report.add_feed(feed_report);
                }
                Ok((feed_id, Err(err))) if err.is_cancelled() => {
                    debug!(target: LOG_TARGET, %feed_id, "Feed processing cancelled");
                }
                Ok((feed_id, Err(err))) => {
                    warn!(target: LOG_TARGET, %feed_id, err = %err.fmt_compact(), "Feed processing failed");
                    report.failed_feeds += 1;
                }
                Err(err) => {
                    error!(target: LOG_TARGET, err = %err.fmt_compact(), "Feed task failed");
                    report.failed_feeds += 1;
                }
            }
        }

        if cancel.is_cancelled() {
            return CancelledSnafu.fail();
        }

        info!(
            target: LOG_TARGET,
            feeds = report.feeds,
            failed_feeds = report.failed_feeds,
            stored = report.stored,
            duplicates = report.duplicates,
            skipped = report.skipped,
            "Fetch cycle complete"
        );
        Ok(report)
    }
}

#[async_trait::async_trait]
impl Cycle for FetchCoordinator {
    fn name(&self) -> &'static str {
        "fetch"
    }

    async fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleResult<()> {
        self.fetch_once(cancel).await.map(|_| ())
    }
}

/// Fetch one feed and store its surviving entries, one after another
async fn process_feed(
    source: &dyn SourceAdapter,
    store: &dyn ArticleStore,
    filter: &KeywordFilter,
    feed: &Feed,
    fallback_published_at: Timestamp,
    cancel: &CancellationToken,
) -> Result<FeedReport, FeedError> {
    let entries = source.fetch(feed, cancel).await.context(SourceSnafu)?;

    let mut report = FeedReport {
        entries: entries.len(),
        ..Default::default()
    };

    for entry in entries {
        if entry.link.trim().is_empty() {
            debug!(target: LOG_TARGET, feed_id = %feed.id, title = %entry.title, "Entry without link");
            report.linkless += 1;
            continue;
        }
        if let Some(keyword) = filter.matching_keyword(&entry) {
            debug!(target: LOG_TARGET, feed_id = %feed.id, title = %entry.title, %keyword, "Entry filtered out");
            report.skipped += 1;
            continue;
        }

        let article = new_article(feed.id, entry, fallback_published_at);
        match store
            .insert_if_absent(&article, cancel)
            .await
            .context(StoreSnafu)?
        {
            InsertOutcome::Inserted(article_id) => {
                debug!(target: LOG_TARGET, feed_id = %feed.id, %article_id, link = %article.link, "Article stored");
                report.stored += 1;
            }
            InsertOutcome::AlreadyPresent(_) => {
                report.duplicates += 1;
            }
        }
    }

    Ok(report)
}

/// Normalize a fetched entry into what gets stored
///
/// The publication time is converted to UTC; entries that carry none get
/// `fallback_published_at`.
pub fn new_article(feed_id: FeedId, entry: RawEntry, fallback_published_at: Timestamp) -> NewArticle {
    NewArticle {
        feed_id,
        title: entry.title.trim().to_owned(),
        link: entry.link.trim().to_owned(),
        summary: entry.summary,
        published_at: entry
            .published_at
            .map(Timestamp::from_offset_date_time)
            .unwrap_or(fallback_published_at),
    }
}
