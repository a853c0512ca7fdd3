pub mod aligned_buffer;
pub mod device_handle;
pub mod metrics;
pub mod platform_specific;

// Re-exports
pub use aligned_buffer::{AlignedBuffer, PAGE_SIZE, SECTOR_SIZE};
pub use device_handle::DeviceHandle;
pub use metrics::{IOMetrics, PerformanceStats};
pub use platform_specific::{get_platform_io, PlatformIO};

/// Allocate a write buffer of `len` bytes, page-aligned when Direct I/O is on
pub fn write_buffer(len: usize, direct_io: bool) -> anyhow::Result<AlignedBuffer> {
    let alignment = if direct_io { PAGE_SIZE } else { 8 };
    AlignedBuffer::new(len, alignment)
}
