use herald_core::{Article, ArticleId, NewArticle, Timestamp};
use redb::ReadableTable as _;
use snafu::OptionExt as _;
use tracing::{trace, warn};

use crate::{
    ARTICLES_COUNTER, ArticleNotFoundSnafu, ArticleRecord, Database, DbResult, LOG_TARGET,
    articles, articles_by_link, articles_unposted, decode_record, encode_record, id_counters,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(ArticleId),
    /// An article with the same `(feed, link)` already existed; nothing changed
    AlreadyPresent(ArticleId),
}

impl InsertOutcome {
    pub fn id(self) -> ArticleId {
        match self {
            InsertOutcome::Inserted(id) | InsertOutcome::AlreadyPresent(id) => id,
        }
    }

    pub fn is_inserted(self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Marked,
    /// Already had a posted timestamp, which was left as is
    AlreadyPosted,
}

impl Database {
    /// Store a new article unless one with the same `(feed, link)` exists
    ///
    /// Lookup and insert happen in one write transaction, so racing callers
    /// inserting the same pair end up with a single row.
    pub async fn insert_article_if_absent(&self, article: &NewArticle) -> DbResult<InsertOutcome> {
        let now = Timestamp::now();
        let outcome = self
            .write_with(|tx| {
                let mut counters_t = tx.open_table(id_counters::TABLE)?;
                let mut articles_t = tx.open_table(articles::TABLE)?;
                let mut by_link_t = tx.open_table(articles_by_link::TABLE)?;
                let mut unposted_t = tx.open_table(articles_unposted::TABLE)?;

                Self::insert_article_if_absent_tx(
                    article,
                    now,
                    &mut counters_t,
                    &mut articles_t,
                    &mut by_link_t,
                    &mut unposted_t,
                )
            })
            .await?;
        trace!(
            target: LOG_TARGET,
            feed_id = %article.feed_id,
            link = %article.link,
            ?outcome,
            "Article insert"
        );
        Ok(outcome)
    }

    pub(crate) fn insert_article_if_absent_tx(
        article: &NewArticle,
        now: Timestamp,
        counters_t: &mut id_counters::Table,
        articles_t: &mut articles::Table,
        by_link_t: &mut articles_by_link::Table,
        unposted_t: &mut articles_unposted::Table,
    ) -> DbResult<InsertOutcome> {
        let link_key = (article.feed_id.as_u64(), article.link.as_str());

        if let Some(existing) = by_link_t.get(link_key)?.map(|g| g.value()) {
            return Ok(InsertOutcome::AlreadyPresent(ArticleId::new(existing)));
        }

        let id = Self::next_id_tx(counters_t, ARTICLES_COUNTER)?;
        let record = ArticleRecord {
            feed_id: article.feed_id,
            title: article.title.clone(),
            link: article.link.clone(),
            summary: article.summary.clone(),
            published_at: article.published_at,
            created_at: now,
            posted_at: None,
        };

        articles_t.insert(id, encode_record(&record)?.as_slice())?;
        by_link_t.insert(link_key, id)?;
        unposted_t.insert((record.published_at.as_secs(), id), ())?;

        Ok(InsertOutcome::Inserted(ArticleId::new(id)))
    }

    /// All unposted articles, most recently published first
    ///
    /// Articles published in the same second come out newest id first.
    pub async fn list_unposted(&self) -> DbResult<Vec<Article>> {
        self.read_with(|tx| {
            let articles_t = tx.open_table(articles::TABLE)?;
            let unposted_t = tx.open_table(articles_unposted::TABLE)?;

            let mut ret = vec![];
            for entry in unposted_t.iter()?.rev() {
                let (k, _) = entry?;
                let (_published, id) = k.value();
                let Some(article) = Self::get_article_tx(ArticleId::new(id), &articles_t)? else {
                    warn!(target: LOG_TARGET, article_id = id, "Unposted index points at missing article");
                    continue;
                };
                ret.push(article);
            }
            Ok(ret)
        })
        .await
    }

    pub async fn unposted_count(&self) -> DbResult<usize> {
        self.read_with(|tx| {
            let unposted_t = tx.open_table(articles_unposted::TABLE)?;
            let mut count = 0;
            for entry in unposted_t.iter()? {
                entry?;
                count += 1;
            }
            Ok(count)
        })
        .await
    }

    pub async fn get_article(&self, id: ArticleId) -> DbResult<Option<Article>> {
        self.read_with(|tx| {
            let articles_t = tx.open_table(articles::TABLE)?;
            Self::get_article_tx(id, &articles_t)
        })
        .await
    }

    pub(crate) fn get_article_tx(
        id: ArticleId,
        articles_t: &impl articles::ReadableTable,
    ) -> DbResult<Option<Article>> {
        let Some(bytes) = articles_t.get(id.as_u64())?.map(|g| g.value().to_vec()) else {
            return Ok(None);
        };
        let record: ArticleRecord = decode_record(&bytes)?;
        Ok(Some(record.into_article(id)))
    }

    /// Record that an article was published
    ///
    /// The posted timestamp is written at most once; later calls leave it
    /// untouched and report [`MarkOutcome::AlreadyPosted`].
    pub async fn mark_posted(&self, id: ArticleId, posted_at: Timestamp) -> DbResult<MarkOutcome> {
        self.write_with(|tx| {
            let mut articles_t = tx.open_table(articles::TABLE)?;
            let mut unposted_t = tx.open_table(articles_unposted::TABLE)?;

            Self::mark_posted_tx(id, posted_at, &mut articles_t, &mut unposted_t)
        })
        .await
    }

    pub(crate) fn mark_posted_tx(
        id: ArticleId,
        posted_at: Timestamp,
        articles_t: &mut articles::Table,
        unposted_t: &mut articles_unposted::Table,
    ) -> DbResult<MarkOutcome> {
        let bytes = articles_t
            .get(id.as_u64())?
            .map(|g| g.value().to_vec())
            .context(ArticleNotFoundSnafu { id })?;
        let mut record: ArticleRecord = decode_record(&bytes)?;

        if record.posted_at.is_some() {
            return Ok(MarkOutcome::AlreadyPosted);
        }

        record.posted_at = Some(posted_at);
        articles_t.insert(id.as_u64(), encode_record(&record)?.as_slice())?;
        unposted_t.remove((record.published_at.as_secs(), id.as_u64()))?;

        Ok(MarkOutcome::Marked)
    }
}
