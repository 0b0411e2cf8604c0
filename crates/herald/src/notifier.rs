use std::sync::Arc;

use herald_core::error::FmtCompact as _;
use herald_core::{ArticleId, Timestamp};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::enrich::Enricher;
use crate::error::{CancelledSnafu, CycleError, CycleResult};
use crate::markup::format_article_message;
use crate::publisher::{PublishError, Publisher};
use crate::scheduler::Cycle;
use crate::store::{ArticleStore, MarkOutcome};

const LOG_TARGET: &str = "herald::notifier";

/// What to do with an article whose delivery failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// Single attempt; the article is marked posted even if it failed
    ///
    /// Never posts an article twice, at the cost of occasionally dropping one.
    #[default]
    BestEffort,
    /// Up to `attempts` tries in the cycle; marked posted only once delivered
    ///
    /// An article that could not be delivered stays in the backlog and is
    /// retried next cycle.
    Confirmed { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Nothing to post
    Idle,
    Posted {
        article_id: ArticleId,
        delivered: bool,
    },
}

/// Posts the most recently published unposted article, one per cycle
pub struct NotificationCoordinator {
    store: Arc<dyn ArticleStore>,
    enricher: Enricher,
    publisher: Arc<dyn Publisher>,
    channel: String,
    policy: DeliveryPolicy,
}

#[bon::bon]
impl NotificationCoordinator {
    #[builder(finish_fn(name = "build"))]
    pub fn new(
        store: Arc<dyn ArticleStore>,
        enricher: Enricher,
        publisher: Arc<dyn Publisher>,
        #[builder(into)] channel: String,
        #[builder(default)] policy: DeliveryPolicy,
    ) -> Self {
        Self {
            store,
            enricher,
            publisher,
            channel,
            policy,
        }
    }

    /// Run one notification cycle
    ///
    /// A failure before publishing leaves the article unposted, so it is
    /// picked again next cycle. Under [`DeliveryPolicy::BestEffort`] a
    /// delivery cut short by `cancel` counts as attempted: the article is
    /// marked posted before the cycle reports [`CycleError::Cancelled`].
    pub async fn select_and_send(&self, cancel: &CancellationToken) -> CycleResult<NotifyOutcome> {
        let unposted = self.store.list_unposted(cancel).await?;
        info!(target: LOG_TARGET, count = unposted.len(), "Unposted articles");

        let waiting = unposted.len().saturating_sub(1);
        let Some(article) = unposted.into_iter().next() else {
            return Ok(NotifyOutcome::Idle);
        };
        debug!(target: LOG_TARGET, article_id = %article.id, published_at = %article.published_at, "Selected article");

        let summary = match self.enricher.summarize(&article, cancel).await {
            Ok(summary) => summary,
            Err(err) if err.is_cancelled() => return CancelledSnafu.fail(),
            Err(source) => {
                return Err(CycleError::Enrich {
                    article_id: article.id,
                    waiting,
                    source,
                });
            }
        };
        let text = format_article_message(&article, &summary);

        if cancel.is_cancelled() {
            return CancelledSnafu.fail();
        }

        let mut interrupted = false;
        let delivered = match self.deliver(&text, cancel).await {
            Ok(()) => true,
            Err(err) => match self.policy {
                DeliveryPolicy::Confirmed { .. } => return Err(err.into()),
                DeliveryPolicy::BestEffort if err.is_cancelled() => {
                    info!(
                        target: LOG_TARGET,
                        article_id = %article.id,
                        "Delivery interrupted by shutdown, marking posted anyway"
                    );
                    interrupted = true;
                    false
                }
                DeliveryPolicy::BestEffort => {
                    warn!(
                        target: LOG_TARGET,
                        article_id = %article.id,
                        err = %err.fmt_compact(),
                        "Delivery failed, marking posted anyway"
                    );
                    false
                }
            },
        };

        // Delivery was attempted, so a shutdown must not keep it from being
        // recorded
        let mark = self
            .store
            .mark_posted(article.id, Timestamp::now(), &CancellationToken::new())
            .await?;
        if mark == MarkOutcome::AlreadyPosted {
            warn!(target: LOG_TARGET, article_id = %article.id, "Article was already marked posted");
        }

        if interrupted {
            return CancelledSnafu.fail();
        }

        info!(target: LOG_TARGET, article_id = %article.id, delivered, "Article posted");
        Ok(NotifyOutcome::Posted {
            article_id: article.id,
            delivered,
        })
    }

    async fn deliver(&self, text: &str, cancel: &CancellationToken) -> Result<(), PublishError> {
        let attempts = match self.policy {
            DeliveryPolicy::BestEffort => 1,
            DeliveryPolicy::Confirmed { attempts } => attempts.max(1),
        };

        let mut attempt = 1;
        loop {
            match self.publisher.publish(&self.channel, text, cancel).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_cancelled() || attempts <= attempt => return Err(err),
                Err(err) => {
                    debug!(target: LOG_TARGET, attempt, err = %err.fmt_compact(), "Delivery attempt failed");
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Cycle for NotificationCoordinator {
    fn name(&self) -> &'static str {
        "notify"
    }

    async fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleResult<()> {
        self.select_and_send(cancel).await.map(|_| ())
    }
}
