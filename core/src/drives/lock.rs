// Exclusive device access

use super::mount::dismount_all;
use crate::error::retry::retry_with;
use crate::error::{FixedInterval, RetryStrategy, WipeError, WipeResult};
use crate::io::{DeviceHandle, PlatformIO};
use crate::Device;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Acquires exclusive, dismounted access to a device.
///
/// Acquisition dismounts every filesystem on the device and then opens it
/// exclusively, retrying while the device reports busy. The retry budget
/// comes from the configured [`RetryStrategy`].
pub struct DeviceLock {
    platform: Arc<dyn PlatformIO>,
    strategy: Box<dyn RetryStrategy>,
    direct_io: bool,
    write_timeout: Duration,
}

impl DeviceLock {
    pub fn new(platform: Arc<dyn PlatformIO>, strategy: impl RetryStrategy + 'static) -> Self {
        Self {
            platform,
            strategy: Box::new(strategy),
            direct_io: false,
            write_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_direct_io(mut self, direct_io: bool) -> Self {
        self.direct_io = direct_io;
        self
    }

    /// Bound applied to every write and sync through the acquired handle
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn acquire(&self, device: &Device) -> WipeResult<LockHandle> {
        let device_name = device.path_display();

        if device.is_system {
            return Err(WipeError::lock(&device_name, "refusing to lock a system device"));
        }

        let dismounted = dismount_all(self.platform.as_ref(), &device.raw_path)?;
        if !dismounted.is_empty() {
            tracing::info!(device = %device_name, count = dismounted.len(), "Dismounted filesystems");
        }

        let result = retry_with(
            self.strategy.as_ref(),
            |attempt| {
                tracing::debug!(device = %device_name, attempt = attempt + 1, "Requesting exclusive access");
                self.platform
                    .open_exclusive(&device.raw_path, self.direct_io)
                    .map_err(|e| {
                        tracing::warn!(device = %device_name, attempt = attempt + 1, error = %e, "Exclusive open failed");
                        e
                    })
            },
            is_busy,
        );

        match result {
            Ok(file) => {
                tracing::info!(device = %device_name, platform = self.platform.platform_name(), "Device locked");
                Ok(LockHandle {
                    handle: DeviceHandle::new(
                        file,
                        Arc::clone(&self.platform),
                        &device.raw_path,
                        self.write_timeout,
                    ),
                    released: false,
                })
            }
            Err((err, attempts)) => {
                tracing::error!(device = %device_name, attempts, error = %err, "Could not lock device");
                Err(WipeError::lock(
                    &device_name,
                    format!("{} (after {} attempt(s))", err, attempts),
                ))
            }
        }
    }
}

impl Default for DeviceLock {
    fn default() -> Self {
        Self::new(crate::io::get_platform_io(), FixedInterval::device_lock())
    }
}

/// Errors worth another attempt: the device is held by someone else right now
pub fn is_busy(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EBUSY) | Some(libc::EAGAIN) | Some(libc::EINTR)
    ) || err.kind() == io::ErrorKind::WouldBlock
}

/// Proof of exclusive access. Released explicitly or on drop.
#[derive(Debug)]
pub struct LockHandle {
    handle: DeviceHandle,
    released: bool,
}

impl LockHandle {
    /// The job-level device handle. Lanes derive their own from it.
    pub fn device(&self) -> &DeviceHandle {
        &self.handle
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Give up exclusive access. Calling this more than once is a no-op.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let device = self.handle.device_path().display().to_string();
        match self.handle.platform().release(self.handle.file()) {
            Ok(()) => tracing::info!(device = %device, "Device released"),
            Err(e) => tracing::warn!(device = %device, error = %e, "Releasing device lock failed"),
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::io::get_platform_io;
    use tempfile::NamedTempFile;

    fn fast_lock() -> DeviceLock {
        DeviceLock::new(get_platform_io(), FixedInterval::new(Duration::from_millis(1), 3))
    }

    fn device_for(temp: &NamedTempFile) -> Device {
        Device::new("test", temp.path(), 4096)
    }

    #[test]
    fn test_acquire_and_release() {
        let temp = NamedTempFile::new().unwrap();
        let lock = fast_lock();

        let mut handle = lock.acquire(&device_for(&temp)).unwrap();
        assert!(!handle.is_released());
        handle.release();
        assert!(handle.is_released());
        // Idempotent
        handle.release();
        assert!(handle.is_released());
    }

    #[test]
    fn test_second_acquire_fails_while_held() {
        let temp = NamedTempFile::new().unwrap();
        let lock = fast_lock();
        let device = device_for(&temp);

        let _held = lock.acquire(&device).unwrap();
        let err = lock.acquire(&device).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lock);
        assert!(err.to_string().contains("3 attempt(s)"));
    }

    #[test]
    fn test_release_on_drop_allows_reacquire() {
        let temp = NamedTempFile::new().unwrap();
        let lock = fast_lock();
        let device = device_for(&temp);

        {
            let _held = lock.acquire(&device).unwrap();
        }
        assert!(lock.acquire(&device).is_ok());
    }

    #[test]
    fn test_refuses_system_device() {
        let temp = NamedTempFile::new().unwrap();
        let mut device = device_for(&temp);
        device.is_system = true;

        let err = fast_lock().acquire(&device).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lock);
        assert!(err.to_string().contains("system device"));
    }

    #[test]
    fn test_missing_device_is_not_retried() {
        let lock = DeviceLock::new(
            get_platform_io(),
            FixedInterval::new(Duration::from_secs(5), 20),
        );
        let device = Device::new("gone", "/nonexistent/nullnova-device", 4096);

        let start = std::time::Instant::now();
        let err = lock.acquire(&device).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lock);
        assert!(err.to_string().contains("1 attempt(s)"));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_busy_classification() {
        assert!(is_busy(&io::Error::from_raw_os_error(libc::EBUSY)));
        assert!(is_busy(&io::Error::from_raw_os_error(libc::EWOULDBLOCK)));
        assert!(!is_busy(&io::Error::from_raw_os_error(libc::ENOENT)));
        assert!(!is_busy(&io::Error::from_raw_os_error(libc::EACCES)));
    }
}
