//! Feed ingestion and notification pipeline
//!
//! Two independent periodic loops share nothing but the article store:
//!
//! * [`fetcher::FetchCoordinator`] pulls every registered feed concurrently,
//!   filters the entries and stores the new ones.
//! * [`notifier::NotificationCoordinator`] takes the most recent unposted
//!   article, summarizes it and publishes it, one article per cycle.
//!
//! Both are driven by [`scheduler::Periodic`].

pub mod enrich;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod filter;
pub mod markup;
pub mod notifier;
pub mod publisher;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod summarizer;

use std::time::Duration;

pub const USER_AGENT: &str = concat!("herald/", env!("CARGO_PKG_VERSION"));

/// The http client shared by the feed source, enrichment and the outbound APIs
pub fn build_http_client(request_timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(request_timeout)
        .build()
}
