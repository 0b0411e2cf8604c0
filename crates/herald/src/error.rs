use herald_core::ArticleId;
use snafu::Snafu;

use crate::enrich::EnrichError;
use crate::publisher::PublishError;
use crate::store::StoreError;

/// Why a coordinator cycle ended early
///
/// Cancellation of any underlying call is folded into
/// [`CycleError::Cancelled`], so it can be told apart from real failures.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CycleError {
    #[snafu(display("Cycle cancelled"))]
    Cancelled,
    #[snafu(display("Store failure"))]
    Store { source: StoreError },
    /// The article stays first in line, so every older one waits on it
    #[snafu(display(
        "Enrichment of article {article_id} failed, {waiting} older unposted articles wait behind it"
    ))]
    Enrich {
        article_id: ArticleId,
        waiting: usize,
        source: EnrichError,
    },
    #[snafu(display("Delivery failure"))]
    Delivery { source: PublishError },
}

pub type CycleResult<T> = std::result::Result<T, CycleError>;

impl CycleError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CycleError::Cancelled)
    }
}

impl From<StoreError> for CycleError {
    fn from(source: StoreError) -> Self {
        match source {
            StoreError::Cancelled => CycleError::Cancelled,
            source => CycleError::Store { source },
        }
    }
}

impl From<PublishError> for CycleError {
    fn from(source: PublishError) -> Self {
        if source.is_cancelled() {
            CycleError::Cancelled
        } else {
            CycleError::Delivery { source }
        }
    }
}
