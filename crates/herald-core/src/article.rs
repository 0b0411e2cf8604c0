use crate::{ArticleId, FeedId, Timestamp};

/// Article about to be stored, as built from a [`crate::RawEntry`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    pub feed_id: FeedId,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published_at: Timestamp,
}

/// Durable, deduplicated record of an ingested entry
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub id: ArticleId,
    pub feed_id: FeedId,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published_at: Timestamp,
    pub created_at: Timestamp,
    /// `None` until the article was handed to the publisher
    pub posted_at: Option<Timestamp>,
}

impl Article {
    pub fn is_posted(&self) -> bool {
        self.posted_at.is_some()
    }
}
