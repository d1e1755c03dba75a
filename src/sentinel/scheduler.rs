//! Cycle clock.
//!
//! Emits one tick per `CYCLE_INTERVAL`, first tick at startup, and runs the
//! cycle body inline on the scheduler task — which makes overlapping cycles
//! structurally impossible. Ticks that land while a cycle is still running
//! are dropped, not queued, and missed ticks are never replayed. Shutdown is
//! cooperative: the flag is consulted between cycles only, so the in-flight
//! cycle always drains before the loop exits.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Create the shutdown flag shared between the binary's signal handler and
/// the scheduler.
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Drives the monitoring loop.
pub struct Scheduler {
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(interval: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Scheduler { interval, shutdown }
    }

    /// Run `cycle` once per interval until shutdown. Returns only after the
    /// last in-flight cycle has drained.
    pub async fn run<F, Fut>(mut self, mut cycle: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if *self.shutdown.borrow() {
                        break;
                    }
                    // Awaited inline: the next tick cannot fire (and the
                    // shutdown arm cannot cancel) until this completes.
                    cycle().await;
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        log::info!("scheduler stopped");
    }
}
