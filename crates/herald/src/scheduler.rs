use std::time::Duration;

use herald_core::error::FmtCompact as _;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CycleResult;

const LOG_TARGET: &str = "herald::scheduler";

/// One unit of periodic work
#[async_trait::async_trait]
pub trait Cycle: Send {
    fn name(&self) -> &'static str;

    async fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleResult<()>;
}

/// Runs a [`Cycle`] right away and then on every tick until cancelled
///
/// Cycles never overlap: a cycle that takes longer than the interval just
/// delays the next tick. A failed cycle is logged and the loop goes on.
pub struct Periodic<C> {
    cycle: C,
    interval: Duration,
}

impl<C> Periodic<C>
where
    C: Cycle,
{
    pub fn new(cycle: C, interval: Duration) -> Self {
        Self { cycle, interval }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let name = self.cycle.name();
        info!(target: LOG_TARGET, %name, interval_secs = self.interval.as_secs(), "Starting");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {},
            }

            match self.cycle.run_cycle(&cancel).await {
                Ok(()) => {}
                Err(err) if err.is_cancelled() => break,
                Err(err) => {
                    warn!(target: LOG_TARGET, %name, err = %err.fmt_compact(), "Cycle failed");
                }
            }
        }

        debug!(target: LOG_TARGET, %name, "Stopped");
    }
}
