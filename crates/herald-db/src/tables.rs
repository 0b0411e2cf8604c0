use bincode::{Decode, Encode};
use herald_core::{Article, ArticleId, Feed, FeedId, Timestamp};

#[macro_export]
macro_rules! def_table {
    ($(#[$outer:meta])*
        $name:ident : $k:ty => $v:ty) => {
        #[allow(unused)]
        $(#[$outer])*
        pub mod $name {
            use super::*;
            pub type Key = $k;
            pub type Value = $v;
            pub type Definition<'a> = redb::TableDefinition<'a, Key, Value>;
            pub trait ReadableTable: redb::ReadableTable<Key, Value> {}
            impl<RT> ReadableTable for RT where RT: redb::ReadableTable<Key, Value> {}
            pub type Table<'txn> = redb::Table<'txn, Key, Value>;
            pub const TABLE: Definition = redb::TableDefinition::new(stringify!($name));
        }
    };
}

def_table! {
    /// Tracks database/schema version
    db_version: () => u64
}

def_table! {
    /// Next id to hand out, per id kind
    ///
    /// Ids are never reused, so an article of a removed feed can't get
    /// attributed to a feed registered later.
    id_counters: &'static str => u64
}

def_table! {
    /// Registered feeds, bincode encoded [`FeedRecord`]
    feeds: u64 => &'static [u8]
}

def_table! {
    /// All ingested articles, bincode encoded [`ArticleRecord`]
    articles: u64 => &'static [u8]
}

def_table! {
    /// Uniqueness index: `(feed id, link)` to article id
    articles_by_link: (u64, &'static str) => u64
}

def_table! {
    /// Articles not posted yet, keyed by `(published at secs, article id)`
    ///
    /// An entry exists exactly while the article's `posted_at` is `None`.
    articles_unposted: (u64, u64) => ()
}

pub(crate) const FEEDS_COUNTER: &str = "feeds";
pub(crate) const ARTICLES_COUNTER: &str = "articles";

#[derive(Debug, Encode, Decode, Clone)]
pub struct FeedRecord {
    pub name: String,
    pub url: String,
    pub created_at: Timestamp,
}

impl FeedRecord {
    pub fn into_feed(self, id: FeedId) -> Feed {
        Feed {
            id,
            name: self.name,
            url: self.url,
        }
    }
}

#[derive(Debug, Encode, Decode, Clone)]
pub struct ArticleRecord {
    pub feed_id: FeedId,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published_at: Timestamp,
    pub created_at: Timestamp,
    pub posted_at: Option<Timestamp>,
}

impl ArticleRecord {
    pub fn into_article(self, id: ArticleId) -> Article {
        Article {
            id,
            feed_id: self.feed_id,
            title: self.title,
            link: self.link,
            summary: self.summary,
            published_at: self.published_at,
            created_at: self.created_at,
            posted_at: self.posted_at,
        }
    }
}
