use {
    duration_str::*,
    std::time::*,
    tokio::{
        runtime::*,
        task::JoinHandle,
        time::{Instant, MissedTickBehavior, interval_at},
    },
    tokio_util::sync::*,
};

//
// PeriodicTask
//

/// Background task calling a function at a fixed interval until cancelled.
///
/// The first call happens one interval after spawning. Periods are capped at one year. Dropping the
/// task cancels it without waiting. Use [stop](Self::stop) to wait for it to exit.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    cancellation: CancellationToken,
    task: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawn.
    pub fn spawn<TickT>(runtime: &Handle, name: &'static str, period: Duration, mut tick: TickT) -> Self
    where
        TickT: FnMut() + Send + 'static,
    {
        let period = period.min(MAX_PERIOD);
        let cancellation = CancellationToken::new();
        let cancelled = cancellation.clone();

        tracing::debug!("starting {} every {}", name, period.human_format());

        let task = runtime.spawn(async move {
            let start = Instant::now();
            let mut interval = interval_at(start.checked_add(period).unwrap_or(start), period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => tick(),
                }
            }

            tracing::debug!("{} stopped", name);
        });

        Self {
            name,
            cancellation,
            task,
        }
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Request cancellation without waiting.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Cancel and wait for the task to exit.
    pub async fn stop(mut self) {
        self.cancel();

        // JoinHandle is Unpin, so we can await it through a reference
        if let Err(error) = (&mut self.task).await {
            tracing::warn!("{} did not stop cleanly: {}", self.name, error);
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);
