use std::time::Duration;

use derive_new::new;

use crate::model::now;
use crate::store::StoryStore;
use crate::task::BackgroundTask;

/// Periodically deletes non-highlighted stories past their expiry.
///
/// Expired stories are already invisible to feeds; the sweep only reclaims
/// the documents, so a failed pass is logged and retried on the next tick
/// rather than surfaced.
#[derive(Debug, Clone, new)]
pub struct Sweeper {
    store: StoryStore,
    period: Duration,
}

impl Sweeper {
    /// Spawn the sweep loop. The first pass runs immediately, then once per
    /// period; ticks missed while a pass is still running are skipped.
    pub fn start(self) -> BackgroundTask {
        BackgroundTask::spawn(|mut quit| async move {
            let mut timer = tokio::time::interval(self.period);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = timer.tick() => match self.store.sweep_expired(now()).await {
                        Ok(0) => {}
                        Ok(removed) => tracing::info!(removed, "swept expired stories"),
                        Err(err) => tracing::warn!(error = %err, "expiry sweep failed"),
                    },
                    _ = &mut quit => break,
                }
            }
        })
    }
}
