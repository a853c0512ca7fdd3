use anyhow::{anyhow, Result};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::atomic::{AtomicU64, Ordering};

/// OS-backed cryptographically secure RNG.
///
/// Thin wrapper over `ring::rand::SystemRandom` (getrandom on Linux) that
/// keeps a byte counter for diagnostics.
pub struct SecureRNG {
    rng: SystemRandom,
    bytes_generated: AtomicU64,
}

impl Default for SecureRNG {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureRNG {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
            bytes_generated: AtomicU64::new(0),
        }
    }

    /// Fill `dest` with random bytes
    pub fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        self.rng
            .fill(dest)
            .map_err(|_| anyhow!("SystemRandom failed to produce {} bytes", dest.len()))?;
        self.bytes_generated
            .fetch_add(dest.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Return a fresh random array
    pub fn random_array<const N: usize>(&self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        self.fill_bytes(&mut out)?;
        Ok(out)
    }

    pub fn bytes_generated(&self) -> u64 {
        self.bytes_generated.load(Ordering::Relaxed)
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_RNG: SecureRNG = SecureRNG::new();
}

/// Process-wide RNG instance
pub fn get_secure_rng() -> &'static SecureRNG {
    &GLOBAL_RNG
}

/// Shannon entropy in bits per byte (0.0 ..= 8.0)
pub fn calculate_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut counts = [0u64; 256];
    for &byte in data {
        counts[byte as usize] += 1;
    }

    let len = data.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum()
}
