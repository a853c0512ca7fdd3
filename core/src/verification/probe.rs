// Post-pass sampling probe
//
// This is a best-effort check, not a proof: it reads a bounded sample at the
// start of a chunk. Constant patterns must match byte for byte; random and
// encrypted output can only be checked for being something other than zeros.

use crate::algorithms::PassSpec;
use crate::crypto::secure_rng::calculate_entropy;
use crate::error::{WipeError, WipeResult};
use crate::io::{self, DeviceHandle, SECTOR_SIZE};
use crate::scheduler::Chunk;

#[derive(Debug, Clone, Copy)]
pub struct VerificationProbe {
    sample_bytes: usize,
    direct_io: bool,
}

impl VerificationProbe {
    pub fn new(sample_bytes: usize) -> Self {
        Self {
            sample_bytes: sample_bytes.max(1),
            direct_io: false,
        }
    }

    /// Read samples through an aligned buffer sized in whole sectors
    pub fn with_direct_io(mut self, direct_io: bool) -> Self {
        self.direct_io = direct_io;
        self
    }

    pub fn sample_bytes(&self) -> usize {
        self.sample_bytes
    }

    /// Check what the final pass `expected` left at the start of `chunk`
    pub fn check(&self, device: &DeviceHandle, chunk: &Chunk, expected: PassSpec) -> WipeResult<()> {
        let length = (chunk.length as usize).min(self.sample_bytes);
        // O_DIRECT reads need an aligned buffer of whole sectors
        let read_len = if self.direct_io {
            length.div_ceil(SECTOR_SIZE) * SECTOR_SIZE
        } else {
            length
        };
        let mut buffer = io::write_buffer(read_len, self.direct_io)
            .map_err(|e| self.failure(chunk, format!("sample buffer allocation failed: {}", e)))?;

        let read = device
            .read_at(buffer.as_mut_slice(), chunk.offset)
            .map_err(|e| self.failure(chunk, format!("sample read failed: {}", e)))?;
        if read < length {
            return Err(self.failure(
                chunk,
                format!("short sample read: {} of {} bytes", read, length),
            ));
        }
        let sample = &buffer.as_slice()[..length];

        if !sample_matches(sample, expected) {
            let reason = match expected.constant_byte() {
                Some(byte) => {
                    let bad = sample.iter().filter(|&&b| b != byte).count();
                    format!("{} of {} sampled bytes differ from {:#04x}", bad, length, byte)
                }
                None => format!("{} sample of {} bytes is all zeros", expected, length),
            };
            return Err(self.failure(chunk, reason));
        }

        tracing::trace!(
            chunk = chunk.index,
            sample = length,
            entropy = calculate_entropy(sample),
            "Verification sample ok"
        );
        Ok(())
    }

    fn failure(&self, chunk: &Chunk, reason: String) -> WipeError {
        tracing::error!(chunk = chunk.index, offset = chunk.offset, %reason, "Verification failed");
        WipeError::Verification {
            chunk: chunk.index,
            offset: chunk.offset,
            reason,
        }
    }
}

/// Whether `sample` is consistent with a pass of `expected`
pub fn sample_matches(sample: &[u8], expected: PassSpec) -> bool {
    match expected.constant_byte() {
        Some(byte) => sample.iter().all(|&b| b == byte),
        None => sample.iter().any(|&b| b != 0),
    }
}
