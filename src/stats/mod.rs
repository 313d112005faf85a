use log::info;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub total_task: u64,
    pub finished_task: u64,
    pub total_item: u64,
    /// Finished tasks per second over the last window.
    pub exec_speed: f64,
    /// Emitted items per second over the last window.
    pub item_speed: f64,
}

/// Lock-free crawl counters with windowed rate estimates.
#[derive(Debug, Default)]
pub struct SpiderStatus {
    total_task: AtomicU64,
    finished_task: AtomicU64,
    total_item: AtomicU64,
    exec_speed: AtomicU64,
    item_speed: AtomicU64,
}

/// Counter values seen at the end of the previous window.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct RateWindow {
    finished: u64,
    items: u64,
}

impl SpiderStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&self) {
        self.total_task.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_item(&self) {
        self.total_item.fetch_add(1, Ordering::Relaxed);
    }

    pub fn finish_task(&self) {
        self.finished_task.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_task(&self) -> u64 {
        self.total_task.load(Ordering::Relaxed)
    }

    pub fn finished_task(&self) -> u64 {
        self.finished_task.load(Ordering::Relaxed)
    }

    pub fn total_item(&self) -> u64 {
        self.total_item.load(Ordering::Relaxed)
    }

    pub fn exec_speed(&self) -> f64 {
        f64::from_bits(self.exec_speed.load(Ordering::Relaxed))
    }

    pub fn item_speed(&self) -> f64 {
        f64::from_bits(self.item_speed.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            total_task: self.total_task(),
            finished_task: self.finished_task(),
            total_item: self.total_item(),
            exec_speed: self.exec_speed(),
            item_speed: self.item_speed(),
        }
    }

    /// Closes the current window: stores the rates observed since `window`
    /// and advances it to the current counters.
    pub(crate) fn recompute(&self, window: &mut RateWindow, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return;
        }
        let finished = self.finished_task();
        let items = self.total_item();

        let exec = finished.saturating_sub(window.finished) as f64 / secs;
        let item = items.saturating_sub(window.items) as f64 / secs;
        self.exec_speed.store(exec.to_bits(), Ordering::Relaxed);
        self.item_speed.store(item.to_bits(), Ordering::Relaxed);

        window.finished = finished;
        window.items = items;
    }

    /// Recomputes the rates every `interval` until `token` is cancelled.
    pub fn spawn_estimator(
        self: &Arc<Self>,
        handle: &tokio::runtime::Handle,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let status = Arc::clone(self);
        handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;
            let mut window = RateWindow::default();
            loop {
                tokio::select! {
                    _ = ticker.tick() => status.recompute(&mut window, interval),
                    () = token.cancelled() => break,
                }
            }
        })
    }

    pub fn print_signal_line(&self, name: &str) {
        let snapshot = self.snapshot();
        info!(
            "spider={} total_task={} finished_task={} total_item={} tasks/sec={:.2} items/sec={:.2}",
            name,
            snapshot.total_task,
            snapshot.finished_task,
            snapshot.total_item,
            snapshot.exec_speed,
            snapshot.item_speed
        );
    }
}
