use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::registry::Aspect;

/// Shortest accepted flush period; shorter requests are raised to it.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Drives `flush` on a fixed period, one task per aspect.
///
/// Tasks run until [`Scheduler::shutdown`] is awaited or the scheduler is
/// dropped. Dropping closes the stop channel, which the tasks also treat
/// as a stop signal.
pub struct Scheduler {
    period: Duration,
    runtime: Handle,
    stop_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Must be called from within a Tokio runtime; loops are spawned on it
    /// even when [`Scheduler::schedule`] is later called from another thread.
    ///
    /// A zero `period` is raised to [`MIN_PERIOD`].
    pub fn new(period: Duration) -> Self {
        if period < MIN_PERIOD {
            tracing::warn!(?period, "flush period too short, using {:?}", MIN_PERIOD);
        }
        let (stop_tx, _) = watch::channel(false);
        Self {
            period: period.max(MIN_PERIOD),
            runtime: Handle::current(),
            stop_tx,
            tasks: Vec::new(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start the flush loop for `aspect`. The first flush happens one full
    /// period after this call.
    pub fn schedule(&mut self, aspect: Arc<dyn Aspect>) {
        let mut stop_rx = self.stop_tx.subscribe();
        let period = self.period;

        self.tasks.push(self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // interval() yields immediately on the first tick
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        aspect.flush();
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            tracing::debug!(aspect = aspect.name(), "flush loop stopped");
        }));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Signal every loop to stop and wait for them to exit.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "flush loop ended abnormally");
            }
        }
    }
}
