#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use herald::enrich::Enricher;
use herald::fetcher::FetchCoordinator;
use herald::filter::KeywordFilter;
use herald::notifier::{DeliveryPolicy, NotificationCoordinator};
use herald::publisher::{PublishError, PublishResult, Publisher};
use herald::source::HttpFeedSource;
use herald::store::{ArticleStore, InsertOutcome, MarkOutcome, StoreError, StoreResult};
use herald::summarizer::{SummarizeResult, Summarizer};
use herald_core::error::BoxedErrorResult;
use herald_core::{Article, ArticleId, FeedId, NewArticle, Timestamp};
use herald_db::Database;
use tempfile::{TempDir, tempdir};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CHANNEL: &str = "@herald_test";

pub struct TestHarness {
    _dir: TempDir,
    pub db: Arc<Database>,
    pub server: MockServer,
    pub client: reqwest::Client,
    pub cancel: CancellationToken,
}

impl TestHarness {
    pub async fn new() -> BoxedErrorResult<Self> {
        let dir = tempdir()?;
        let db = Database::open(dir.path().join("herald.redb")).await?;

        Ok(Self {
            _dir: dir,
            db: Arc::new(db),
            server: MockServer::start().await,
            client: herald::build_http_client(Duration::from_secs(30))?,
            cancel: CancellationToken::new(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server.uri())
    }

    /// Register a feed served by the mock server at `path`
    pub async fn add_feed(&self, name: &str, path: &str) -> BoxedErrorResult<FeedId> {
        Ok(self.db.insert_feed(name, &self.url(path)).await?)
    }

    pub async fn serve_rss(&self, at: &str, items: &[RssItem<'_>]) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/rss+xml")
                    .set_body_string(rss(items)),
            )
            .mount(&self.server)
            .await;
    }

    pub async fn serve_status(&self, at: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    pub fn fetcher(&self, keywords: &[&str]) -> FetchCoordinator {
        self.fetcher_with_store(keywords, self.db.clone())
    }

    pub fn fetcher_with_store(
        &self,
        keywords: &[&str],
        store: Arc<dyn ArticleStore>,
    ) -> FetchCoordinator {
        FetchCoordinator::builder()
            .registry(self.db.clone())
            .store(store)
            .source(Arc::new(HttpFeedSource::new(self.client.clone())))
            .filter(KeywordFilter::new(keywords))
            .build()
    }

    pub fn notifier(
        &self,
        summarizer: Arc<dyn Summarizer>,
        publisher: Arc<dyn Publisher>,
        policy: DeliveryPolicy,
    ) -> NotificationCoordinator {
        self.notifier_with_store(self.db.clone(), summarizer, publisher, policy)
    }

    pub fn notifier_with_store(
        &self,
        store: Arc<dyn ArticleStore>,
        summarizer: Arc<dyn Summarizer>,
        publisher: Arc<dyn Publisher>,
        policy: DeliveryPolicy,
    ) -> NotificationCoordinator {
        NotificationCoordinator::builder()
            .store(store)
            .enricher(Enricher::new(self.client.clone(), summarizer))
            .publisher(publisher)
            .channel(CHANNEL)
            .policy(policy)
            .build()
    }

    /// Store an article directly, bypassing the fetcher
    pub async fn seed_article(
        &self,
        feed_id: FeedId,
        title: &str,
        link: &str,
        summary: &str,
        published_at: time::OffsetDateTime,
    ) -> BoxedErrorResult<ArticleId> {
        let outcome = self
            .db
            .insert_article_if_absent(&NewArticle {
                feed_id,
                title: title.into(),
                link: link.into(),
                summary: summary.into(),
                published_at: Timestamp::from_offset_date_time(published_at),
            })
            .await?;
        Ok(outcome.id())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RssItem<'a> {
    pub title: &'a str,
    pub link: &'a str,
    pub description: &'a str,
    pub categories: &'a [&'a str],
    pub pub_date: Option<&'a str>,
}

pub fn rss(items: &[RssItem<'_>]) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Test</title><link>https://example.com</link><description>Test feed</description>"#,
    );
    for item in items {
        out.push_str("<item>");
        out.push_str(&format!("<title>{}</title>", item.title));
        if !item.link.is_empty() {
            out.push_str(&format!("<link>{}</link>", item.link));
        }
        if !item.description.is_empty() {
            out.push_str(&format!("<description>{}</description>", item.description));
        }
        for category in item.categories {
            out.push_str(&format!("<category>{category}</category>"));
        }
        if let Some(pub_date) = item.pub_date {
            out.push_str(&format!("<pubDate>{pub_date}</pubDate>"));
        }
        out.push_str("</item>");
    }
    out.push_str("</channel></rss>");
    out
}

/// Publisher that records messages, optionally failing the first few
#[derive(Default)]
pub struct RecordingPublisher {
    pub sent: Mutex<Vec<(String, String)>>,
    pub attempts: AtomicU32,
    failures_left: AtomicU32,
}

impl RecordingPublisher {
    pub fn failing(times: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(times),
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent
            .lock()
            .expect("not poisoned")
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(
        &self,
        channel: &str,
        text: &str,
        _cancel: &CancellationToken,
    ) -> PublishResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PublishError::Rejected {
                status: reqwest::StatusCode::BAD_GATEWAY,
                description: "channel unavailable".into(),
            });
        }
        self.sent
            .lock()
            .expect("not poisoned")
            .push((channel.to_owned(), text.to_owned()));
        Ok(())
    }
}

/// Summarizer returning a fixed text and remembering its inputs
#[derive(Default)]
pub struct FixedSummarizer {
    pub summary: String,
    pub inputs: Mutex<Vec<String>>,
}

impl FixedSummarizer {
    pub fn new(summary: &str) -> Self {
        Self {
            summary: summary.to_owned(),
            ..Default::default()
        }
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().expect("not poisoned").clone()
    }
}

#[async_trait::async_trait]
impl Summarizer for FixedSummarizer {
    async fn summarize(&self, text: &str, _cancel: &CancellationToken) -> SummarizeResult<String> {
        self.inputs.lock().expect("not poisoned").push(text.to_owned());
        Ok(self.summary.clone())
    }
}

/// Store over a real database that fails selected calls
pub struct FailingStore {
    inner: Arc<Database>,
    fail_inserts_for: Option<FeedId>,
    fail_listing: bool,
}

impl FailingStore {
    pub fn new(inner: Arc<Database>) -> Self {
        Self {
            inner,
            fail_inserts_for: None,
            fail_listing: false,
        }
    }

    /// Inserts of articles of `feed_id` fail
    pub fn failing_inserts_for(mut self, feed_id: FeedId) -> Self {
        self.fail_inserts_for = Some(feed_id);
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }
}

#[async_trait::async_trait]
impl ArticleStore for FailingStore {
    async fn insert_if_absent(
        &self,
        article: &NewArticle,
        cancel: &CancellationToken,
    ) -> StoreResult<InsertOutcome> {
        if self.fail_inserts_for == Some(article.feed_id) {
            return Err(StoreError::backend("write failed"));
        }
        ArticleStore::insert_if_absent(self.inner.as_ref(), article, cancel).await
    }

    async fn list_unposted(&self, cancel: &CancellationToken) -> StoreResult<Vec<Article>> {
        if self.fail_listing {
            return Err(StoreError::backend("read failed"));
        }
        ArticleStore::list_unposted(self.inner.as_ref(), cancel).await
    }

    async fn mark_posted(
        &self,
        id: ArticleId,
        posted_at: Timestamp,
        cancel: &CancellationToken,
    ) -> StoreResult<MarkOutcome> {
        ArticleStore::mark_posted(self.inner.as_ref(), id, posted_at, cancel).await
    }
}
