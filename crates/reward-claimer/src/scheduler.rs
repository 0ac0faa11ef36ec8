use {
    crate::engine::{Engine, ScanOutcome},
    std::{future::Future, sync::Arc, time::Duration},
    tokio::{sync::Mutex, time::MissedTickBehavior},
    tracing::Instrument,
};

/// Triggers scan cycles on a fixed interval.
///
/// Cycles run on the loop itself and are never cancelled: shutdown is only
/// observed between cycles. Ticks missed during a slow cycle are skipped, and
/// a tick that finds the engine held by someone else is dropped, it is not
/// queued.
pub struct Scheduler {
    engine: Arc<Mutex<Engine>>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(engine: Arc<Mutex<Engine>>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Runs one scan cycle unless another one is in progress. Returns whether
    /// a cycle ran.
    pub async fn tick(&self) -> bool {
        let Ok(mut engine) = self.engine.try_lock() else {
            tracing::debug!("previous scan cycle still running, skipping tick");
            return false;
        };
        match engine.run_scan_cycle().await {
            Ok(ScanOutcome::Disabled) => tracing::trace!("not configured, skipping scan"),
            Ok(ScanOutcome::Initialized { cursor }) => {
                tracing::debug!(cursor, "scan cursor initialized")
            }
            Ok(ScanOutcome::UpToDate { cursor }) => tracing::trace!(cursor, "no new blocks"),
            Ok(ScanOutcome::Scanned(report)) => tracing::info!(?report, "scan cycle finished"),
            Err(err) => tracing::warn!(?err, "scan cycle failed"),
        }
        true
    }

    /// Ticks immediately and then once per interval until `shutdown`
    /// resolves. A cycle that is running when `shutdown` resolves finishes
    /// before this returns.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut cycle = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    cycle += 1;
                    self.tick()
                        .instrument(tracing::info_span!("scan_cycle", cycle))
                        .await;
                }
            }
        }
        tracing::info!("scan loop stopped");
    }
}
