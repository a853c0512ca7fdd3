// Aligned write/read buffers, usable with O_DIRECT

use anyhow::{anyhow, Result};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

/// Alignment requirements for Direct I/O
pub const SECTOR_SIZE: usize = 512;
pub const PAGE_SIZE: usize = 4096;

/// Heap buffer whose start address is a multiple of `alignment`
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
    len: usize,
}

impl AlignedBuffer {
    /// Allocate a zeroed buffer of `len` bytes aligned to `alignment`
    pub fn new(len: usize, alignment: usize) -> Result<Self> {
        if !alignment.is_power_of_two() {
            return Err(anyhow!("Alignment {} is not a power of 2", alignment));
        }

        // Round the allocation up to the alignment; never allocate zero bytes
        let capacity = len.max(1).div_ceil(alignment) * alignment;
        let layout = Layout::from_size_align(capacity, alignment)
            .map_err(|e| anyhow!("Invalid buffer layout: {}", e))?;

        // SAFETY: layout has non-zero size
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw)
            .ok_or_else(|| anyhow!("Failed to allocate {} byte aligned buffer", capacity))?;

        Ok(Self { ptr, layout, len })
    }

    /// Create buffer aligned to page boundary (4KB)
    pub fn page_aligned(len: usize) -> Result<Self> {
        Self::new(len, PAGE_SIZE)
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for layout.size() >= len bytes and initialized by alloc_zeroed
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees exclusive access
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn alignment(&self) -> usize {
        self.layout.align()
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // Scrub before handing memory back; buffers may hold random pass data
        self.as_mut_slice().fill(0);
        // SAFETY: ptr was allocated with this exact layout
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

// SAFETY: AlignedBuffer owns its allocation exclusively
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_respected() {
        for alignment in [SECTOR_SIZE, PAGE_SIZE, 64 * 1024] {
            let buf = AlignedBuffer::new(10_000, alignment).unwrap();
            assert_eq!(buf.as_slice().as_ptr() as usize % alignment, 0);
            assert_eq!(buf.len(), 10_000);
            assert_eq!(buf.alignment(), alignment);
        }
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        assert!(AlignedBuffer::new(4096, 3000).is_err());
    }

    #[test]
    fn test_zero_length_buffer() {
        let buf = AlignedBuffer::page_aligned(0).unwrap();
        assert!(buf.is_empty());
        assert!(buf.as_slice().is_empty());
    }

    #[test]
    fn test_starts_zeroed_and_is_writable() {
        let mut buf = AlignedBuffer::page_aligned(8192).unwrap();
        assert!(buf.as_slice().iter().all(|&b| b == 0));
        buf.as_mut_slice().fill(0xAB);
        assert!(buf.as_slice().iter().all(|&b| b == 0xAB));
    }
}
