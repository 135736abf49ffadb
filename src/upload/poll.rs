//! Cancelable periodic task

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Runs a callback on a fixed period until stopped.
///
/// `stop` is idempotent and `start` on a running task restarts it.
#[derive(Debug, Default)]
pub struct PollTask {
    cancel_token: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

impl PollTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// First tick fires one `period` after start. The task ends on its own
    /// when `tick` resolves to `false`.
    pub fn start<F, Fut>(&mut self, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.stop();

        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let keep_going = tokio::select! {
                    biased;
                    _ = token.cancelled() => false,
                    keep_going = tick() => keep_going,
                };
                if !keep_going {
                    break;
                }
            }
            tracing::debug!("Poll task finished");
        });

        self.cancel_token = Some(cancel_token);
        self.handle = Some(handle);
    }

    pub fn stop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
            tracing::debug!("Poll task stopped");
        }
        self.handle = None;
    }

    pub fn is_active(&self) -> bool {
        let running = self
            .handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        let cancelled = self
            .cancel_token
            .as_ref()
            .map_or(true, |token| token.is_cancelled());
        running && !cancelled
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.stop();
    }
}
