//! Periodic flush timer

use parking_lot::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

/// Background task calling `on_tick` once per period until stopped.
///
/// The first tick fires one full period after start. Ticks never wait for the
/// work they trigger, and ticks missed while the runtime was busy are delayed
/// rather than fired in a burst.
pub struct FlushScheduler {
    shutdown_tx: broadcast::Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl FlushScheduler {
    /// Spawn the timer task on `runtime`
    pub fn start<F>(period: Duration, runtime: &Handle, on_tick: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let handle = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(period_ms = period.as_millis() as u64, "Flush scheduler started");

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        trace!("Flush timer tick");
                        on_tick();
                    }
                }
            }

            debug!("Flush scheduler stopped");
        });

        Self {
            shutdown_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Stop the timer and wait for the task to exit
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(());
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Flush scheduler task ended abnormally");
            }
        }
    }

    /// Whether the timer task is still running
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}
