//! Progress accounting shared by all lanes of a job.
//!
//! Writers only ever touch two atomics. Observers get snapshots either by
//! polling [`ProgressAggregator::snapshot`] or by registering a
//! [`ProgressSink`] that a [`ProgressMonitor`] thread feeds.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub operations_done: u64,
    pub operations_total: u64,
}

impl ProgressSnapshot {
    /// Completion in percent, 0.0 to 100.0
    pub fn percentage(&self) -> f64 {
        if self.operations_total == 0 {
            return 0.0;
        }
        self.operations_done as f64 * 100.0 / self.operations_total as f64
    }

    pub fn is_complete(&self) -> bool {
        self.operations_total > 0 && self.operations_done >= self.operations_total
    }
}

/// Monotonic operation counter. `report` never blocks and never overshoots.
#[derive(Debug)]
pub struct ProgressAggregator {
    done: AtomicU64,
    total: AtomicU64,
}

impl ProgressAggregator {
    pub fn new(operations_total: u64) -> Self {
        Self {
            done: AtomicU64::new(0),
            total: AtomicU64::new(operations_total),
        }
    }

    /// Record `delta` completed operations. Returns the new done count.
    pub fn report(&self, delta: u64) -> u64 {
        let total = self.total.load(Ordering::Acquire);
        let previous = self
            .done
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |done| {
                Some(done.saturating_add(delta).min(total))
            })
            .unwrap_or_else(|current| current);
        previous.saturating_add(delta).min(total)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            operations_done: self.done.load(Ordering::Acquire),
            operations_total: self.total.load(Ordering::Acquire),
        }
    }
}

/// Anything that wants to observe progress: a display, a log, a test.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, snapshot: ProgressSnapshot);
}

/// Forwards snapshots into an `mpsc` channel. A closed receiver is ignored.
pub struct ChannelSink {
    sender: Mutex<Sender<ProgressSnapshot>>,
}

impl ChannelSink {
    pub fn new(sender: Sender<ProgressSnapshot>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }
}

impl ProgressSink for ChannelSink {
    fn on_progress(&self, snapshot: ProgressSnapshot) {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        let _ = sender.send(snapshot);
    }
}

/// Logs every tenth of the way through the job
#[derive(Default)]
pub struct LogSink {
    last_decile: AtomicU64,
}

impl ProgressSink for LogSink {
    fn on_progress(&self, snapshot: ProgressSnapshot) {
        let decile = (snapshot.percentage() / 10.0) as u64;
        if self.last_decile.fetch_max(decile, Ordering::Relaxed) < decile {
            tracing::info!(
                done = snapshot.operations_done,
                total = snapshot.operations_total,
                "Progress {:.0}%",
                snapshot.percentage()
            );
        }
    }
}

/// Background consumer that polls an aggregator and feeds sinks.
///
/// Sinks see a snapshot only when the done count has moved, and always see
/// the final state once [`finish`](Self::finish) is called.
pub struct ProgressMonitor {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ProgressMonitor {
    pub fn start(
        aggregator: Arc<ProgressAggregator>,
        sinks: Vec<Arc<dyn ProgressSink>>,
        interval: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        if sinks.is_empty() {
            return Self { stop, thread: None };
        }

        let thread_stop = Arc::clone(&stop);
        let spawned = std::thread::Builder::new()
            .name("nullnova-progress".to_string())
            .spawn(move || {
                let mut last_done = None;
                loop {
                    // Read the flag first so the snapshot after it is final
                    let stopping = thread_stop.load(Ordering::Acquire);
                    let snapshot = aggregator.snapshot();
                    if last_done != Some(snapshot.operations_done) {
                        for sink in &sinks {
                            sink.on_progress(snapshot);
                        }
                        last_done = Some(snapshot.operations_done);
                    }
                    if stopping {
                        break;
                    }
                    std::thread::park_timeout(interval);
                }
            });

        let thread = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "Could not start progress monitor; sinks disabled");
                None
            }
        };

        Self { stop, thread }
    }

    /// Deliver the final snapshot and stop the consumer thread
    pub fn finish(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                tracing::warn!("Progress monitor thread panicked");
            }
        }
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
