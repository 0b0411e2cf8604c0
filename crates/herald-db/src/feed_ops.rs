use herald_core::{Feed, FeedId, Timestamp};
use tracing::debug;

use crate::{
    Database, DbResult, FEEDS_COUNTER, FeedRecord, LOG_TARGET, decode_record, encode_record,
    feeds, id_counters,
};

impl Database {
    pub async fn insert_feed(&self, name: &str, url: &str) -> DbResult<FeedId> {
        let record = FeedRecord {
            name: name.to_owned(),
            url: url.to_owned(),
            created_at: Timestamp::now(),
        };
        let id = self
            .write_with(|tx| {
                let mut counters_t = tx.open_table(id_counters::TABLE)?;
                let mut feeds_t = tx.open_table(feeds::TABLE)?;

                let id = Self::next_id_tx(&mut counters_t, FEEDS_COUNTER)?;
                feeds_t.insert(id, encode_record(&record)?.as_slice())?;
                Ok(FeedId::new(id))
            })
            .await?;
        debug!(target: LOG_TARGET, feed_id = %id, url, "Feed registered");
        Ok(id)
    }

    /// Remove a feed from the registry
    ///
    /// Articles already ingested from it are kept. Returns `false` if there
    /// was no such feed.
    pub async fn remove_feed(&self, id: FeedId) -> DbResult<bool> {
        self.write_with(|tx| {
            let mut feeds_t = tx.open_table(feeds::TABLE)?;
            Ok(feeds_t.remove(id.as_u64())?.is_some())
        })
        .await
    }

    pub async fn list_feeds(&self) -> DbResult<Vec<Feed>> {
        self.read_with(|tx| {
            let feeds_t = tx.open_table(feeds::TABLE)?;
            Self::list_feeds_tx(&feeds_t)
        })
        .await
    }

    pub(crate) fn list_feeds_tx(feeds_t: &impl feeds::ReadableTable) -> DbResult<Vec<Feed>> {
        let mut ret = vec![];
        for entry in feeds_t.iter()? {
            let (k, v) = entry?;
            let record: FeedRecord = decode_record(v.value())?;
            ret.push(record.into_feed(FeedId::new(k.value())));
        }
        Ok(ret)
    }
}
