// Per-lane device descriptor

use super::metrics::IOMetrics;
use super::platform_specific::PlatformIO;
use crate::error::{WipeError, WipeResult};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Positioned access to a locked device.
///
/// The job-level handle is owned by the [`LockHandle`](crate::drives::LockHandle);
/// concurrent lanes each get their own descriptor through [`derive`](Self::derive).
/// Every write is checked for an exact byte count and against the write timeout.
pub struct DeviceHandle {
    file: File,
    platform: Arc<dyn PlatformIO>,
    metrics: Arc<IOMetrics>,
    write_timeout: Duration,
    device_path: PathBuf,
    lane: usize,
}

impl DeviceHandle {
    pub fn new(
        file: File,
        platform: Arc<dyn PlatformIO>,
        device_path: impl Into<PathBuf>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            file,
            platform,
            metrics: Arc::new(IOMetrics::new()),
            write_timeout,
            device_path: device_path.into(),
            lane: 0,
        }
    }

    /// Independent descriptor for `lane`, sharing this handle's lock and metrics.
    pub fn derive(&self, lane: usize) -> WipeResult<DeviceHandle> {
        let file = self.file.try_clone().map_err(|e| {
            WipeError::lock(
                self.device_path.display().to_string(),
                format!("could not derive descriptor for lane {}: {}", lane, e),
            )
        })?;

        Ok(DeviceHandle {
            file,
            platform: Arc::clone(&self.platform),
            metrics: Arc::clone(&self.metrics),
            write_timeout: self.write_timeout,
            device_path: self.device_path.clone(),
            lane,
        })
    }

    /// Write all of `data` at `offset` with a single positioned write.
    ///
    /// A short write is an error; the pass is never resumed mid-buffer.
    pub fn write_at(&self, data: &[u8], offset: u64) -> WipeResult<()> {
        let start = Instant::now();
        let result = self.platform.write_at(&self.file, data, offset);
        let latency = start.elapsed();

        let written = match result {
            Ok(written) => written,
            Err(e) => {
                self.metrics.record_error();
                return Err(WipeError::write(offset, e));
            }
        };
        self.metrics.record_write(written as u64, latency);

        if written != data.len() {
            self.metrics.record_error();
            return Err(WipeError::write(
                offset,
                format!("Partial write: {} of {} bytes", written, data.len()),
            ));
        }

        self.check_timeout("write", latency)
    }

    /// Force written data to stable storage
    pub fn sync(&self) -> WipeResult<()> {
        let start = Instant::now();
        self.platform.sync_data(&self.file).map_err(|e| {
            self.metrics.record_error();
            WipeError::Write {
                offset: 0,
                reason: format!("sync failed: {}", e),
            }
        })?;
        self.metrics.record_sync();

        self.check_timeout("sync", start.elapsed())
    }

    /// Read until `buffer` is full or the device ends. Returns bytes read.
    pub fn read_at(&self, buffer: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buffer.len() {
            let read = self
                .platform
                .read_at(&self.file, &mut buffer[filled..], offset + filled as u64)?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        self.metrics.record_read(filled as u64);
        Ok(filled)
    }

    fn check_timeout(&self, operation: &str, elapsed: Duration) -> WipeResult<()> {
        if elapsed > self.write_timeout {
            self.metrics.record_error();
            return Err(WipeError::Timeout {
                operation: operation.to_string(),
                elapsed,
                limit: self.write_timeout,
            });
        }
        Ok(())
    }

    pub fn metrics(&self) -> Arc<IOMetrics> {
        self.metrics.clone()
    }

    pub fn lane(&self) -> usize {
        self.lane
    }

    pub fn device_path(&self) -> &Path {
        &self.device_path
    }

    pub(crate) fn file(&self) -> &File {
        &self.file
    }

    pub(crate) fn platform(&self) -> &Arc<dyn PlatformIO> {
        &self.platform
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("device_path", &self.device_path)
            .field("lane", &self.lane)
            .field("platform", &self.platform.platform_name())
            .finish()
    }
}
