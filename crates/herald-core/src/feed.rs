use time::OffsetDateTime;

use crate::FeedId;

/// A registered feed, as handed to a source adapter
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub id: FeedId,
    pub name: String,
    pub url: String,
}

/// One item as returned by a feed at fetch time, before it is persisted
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawEntry {
    pub title: String,
    /// Candidate deduplication key
    pub link: String,
    pub summary: String,
    pub categories: Vec<String>,
    /// As supplied by the source, with whatever offset it came with
    pub published_at: Option<OffsetDateTime>,
}
