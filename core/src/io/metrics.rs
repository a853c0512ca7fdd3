// I/O metrics shared by every lane of a job

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free I/O counters. One instance is shared by all handles of a job.
#[derive(Debug)]
pub struct IOMetrics {
    start_time: Instant,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
    write_calls: AtomicU64,
    read_calls: AtomicU64,
    sync_calls: AtomicU64,
    write_nanos: AtomicU64,
    max_write_nanos: AtomicU64,
    errors: AtomicU64,
}

impl Default for IOMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl IOMetrics {
    /// Create new metrics tracker
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            bytes_written: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            write_calls: AtomicU64::new(0),
            read_calls: AtomicU64::new(0),
            sync_calls: AtomicU64::new(0),
            write_nanos: AtomicU64::new(0),
            max_write_nanos: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Record one write call and the bytes it actually wrote
    pub fn record_write(&self, bytes: u64, latency: Duration) {
        let nanos = latency.as_nanos().min(u64::MAX as u128) as u64;
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        self.write_calls.fetch_add(1, Ordering::Relaxed);
        self.write_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.max_write_nanos.fetch_max(nanos, Ordering::Relaxed);
    }

    pub fn record_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
        self.read_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sync(&self) {
        self.sync_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an error
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn write_calls(&self) -> u64 {
        self.write_calls.load(Ordering::Relaxed)
    }

    /// Get current throughput in bytes/sec
    pub fn throughput(&self) -> u64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0;
        }
        (self.bytes_written() as f64 / elapsed) as u64
    }

    /// Get performance statistics
    pub fn stats(&self) -> PerformanceStats {
        let write_calls = self.write_calls();
        let total_nanos = self.write_nanos.load(Ordering::Relaxed);
        let avg_write_latency = if write_calls == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(total_nanos / write_calls)
        };

        PerformanceStats {
            elapsed: self.start_time.elapsed(),
            bytes_written: self.bytes_written(),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            write_calls,
            read_calls: self.read_calls.load(Ordering::Relaxed),
            sync_calls: self.sync_calls.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            throughput_bps: self.throughput(),
            avg_write_latency,
            max_write_latency: Duration::from_nanos(self.max_write_nanos.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone)]
pub struct PerformanceStats {
    pub elapsed: Duration,
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub write_calls: u64,
    pub read_calls: u64,
    pub sync_calls: u64,
    pub errors: u64,
    pub throughput_bps: u64,
    pub avg_write_latency: Duration,
    pub max_write_latency: Duration,
}

impl PerformanceStats {
    /// Emit the stats as a single structured log event
    pub fn log(&self) {
        tracing::info!(
            bytes_written = self.bytes_written,
            write_calls = self.write_calls,
            sync_calls = self.sync_calls,
            read_calls = self.read_calls,
            errors = self.errors,
            throughput_mbps = self.throughput_bps as f64 / (1024.0 * 1024.0),
            avg_write_latency = ?self.avg_write_latency,
            max_write_latency = ?self.max_write_latency,
            elapsed = %humantime::format_duration(Duration::from_secs(self.elapsed.as_secs())),
            "I/O performance"
        );
    }
}
