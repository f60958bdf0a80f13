use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Tells in-flight work whether the screen that started it is still open.
#[derive(Debug, Clone)]
pub struct ContextGuard {
    active: Arc<AtomicBool>,
}

impl ContextGuard {
    pub(crate) fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// A periodic task that stops when dropped.
pub struct Subscription {
    guard: ContextGuard,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Run `tick` now and then every `period`. Late ticks are skipped, not
    /// bunched up.
    pub fn spawn<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut(ContextGuard) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let guard = ContextGuard::new();
        let task_guard = guard.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !task_guard.is_active() {
                    break;
                }
                tick(task_guard.clone()).await;
            }
        });
        debug!(period_ms = period.as_millis() as u64, "Subscription started");
        Self { guard, handle }
    }

    pub fn guard(&self) -> ContextGuard {
        self.guard.clone()
    }

    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.guard.deactivate();
        self.handle.abort();
        debug!("Subscription stopped");
    }
}
