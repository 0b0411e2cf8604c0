//! The store as seen by the coordinators
//!
//! [`herald_db::Database`] is the production implementation; tests can plug
//! in anything else.

use std::future::Future;

use herald_core::error::BoxedError;
use herald_core::{Article, ArticleId, Feed, NewArticle, Timestamp};
use herald_db::Database;
pub use herald_db::{InsertOutcome, MarkOutcome};
use snafu::Snafu;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Snafu)]
pub enum StoreError {
    #[snafu(display("Store call cancelled"))]
    Cancelled,
    #[snafu(display("Store failure"))]
    Backend { source: BoxedError },
}

impl StoreError {
    pub fn backend(source: impl Into<BoxedError>) -> Self {
        Self::Backend {
            source: source.into(),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait::async_trait]
pub trait FeedRegistry: Send + Sync {
    /// Current feeds, looked up fresh on every call
    async fn list_feeds(&self, cancel: &CancellationToken) -> StoreResult<Vec<Feed>>;
}

#[async_trait::async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert unless `(feed, link)` already exists; a duplicate is not an error
    async fn insert_if_absent(
        &self,
        article: &NewArticle,
        cancel: &CancellationToken,
    ) -> StoreResult<InsertOutcome>;

    /// Unposted articles, most recently published first
    async fn list_unposted(&self, cancel: &CancellationToken) -> StoreResult<Vec<Article>>;

    async fn mark_posted(
        &self,
        id: ArticleId,
        posted_at: Timestamp,
        cancel: &CancellationToken,
    ) -> StoreResult<MarkOutcome>;
}

/// Run a store call unless `cancel` fires first
pub(crate) async fn cancellable<T, E>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, E>>,
) -> StoreResult<T>
where
    E: Into<BoxedError>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => CancelledSnafu.fail(),
        res = fut => res.map_err(StoreError::backend),
    }
}

#[async_trait::async_trait]
impl FeedRegistry for Database {
    async fn list_feeds(&self, cancel: &CancellationToken) -> StoreResult<Vec<Feed>> {
        cancellable(cancel, Database::list_feeds(self)).await
    }
}

#[async_trait::async_trait]
impl ArticleStore for Database {
    async fn insert_if_absent(
        &self,
        article: &NewArticle,
        cancel: &CancellationToken,
    ) -> StoreResult<InsertOutcome> {
        cancellable(cancel, self.insert_article_if_absent(article)).await
    }

    async fn list_unposted(&self, cancel: &CancellationToken) -> StoreResult<Vec<Article>> {
        cancellable(cancel, Database::list_unposted(self)).await
    }

    async fn mark_posted(
        &self,
        id: ArticleId,
        posted_at: Timestamp,
        cancel: &CancellationToken,
    ) -> StoreResult<MarkOutcome> {
        cancellable(cancel, Database::mark_posted(self, id, posted_at)).await
    }
}
