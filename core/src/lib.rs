// Allow uppercase acronyms for industry-standard terms like DoD
#![allow(clippy::upper_case_acronyms)]

pub mod algorithms;
pub mod config;
pub mod crypto;
pub mod drives;
pub mod error;
pub mod executor;
pub mod io;
pub mod progress;
pub mod report;
pub mod scheduler;
pub mod verification;
pub mod wipe_engine;

// Re-export the engine surface for convenience
pub use algorithms::{PassSpec, PatternGenerator};
pub use config::EngineConfig;
pub use error::{ErrorKind, WipeError, WipeResult};
pub use executor::CancelToken;
pub use progress::{ProgressAggregator, ProgressSink, ProgressSnapshot};
pub use report::{ReportedError, WipeReport};
pub use scheduler::{Chunk, ChunkScheduler};
pub use wipe_engine::WipeEngine;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// 128 MiB, the chunk size used when the caller does not pick one.
pub const DEFAULT_CHUNK_SIZE: u64 = 128 * 1024 * 1024;

/// A block device as supplied by the discovery collaborator.
///
/// The engine trusts these fields as given and only re-validates
/// `capacity_bytes > 0` and `is_system == false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub raw_path: PathBuf,
    pub capacity_bytes: u64,
    pub is_removable: bool,
    pub is_system: bool,
    pub is_solid_state: bool,
}

impl Device {
    /// Minimal non-system, non-removable rotational device record
    pub fn new(id: impl Into<String>, raw_path: impl Into<PathBuf>, capacity_bytes: u64) -> Self {
        Self {
            id: id.into(),
            raw_path: raw_path.into(),
            capacity_bytes,
            is_removable: false,
            is_system: false,
            is_solid_state: false,
        }
    }

    pub fn path_display(&self) -> String {
        self.raw_path.display().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WipeMethod {
    /// 3-pass DoD 5220.22-M: zeros, ones, random
    DoDThreePass,
    /// Zeros followed by ChaCha20 ciphertext of zeros under a single-use key
    CryptoErase,
}

impl WipeMethod {
    /// Ordered pass list executed against every chunk
    pub fn passes(&self) -> Vec<PassSpec> {
        match self {
            WipeMethod::DoDThreePass => algorithms::dod::DoDWipe::passes(),
            WipeMethod::CryptoErase => algorithms::crypto_erase::CryptoEraseWipe::passes(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WipeMethod::DoDThreePass => "DoD 5220.22-M (3-pass)",
            WipeMethod::CryptoErase => "Cryptographic Erasure (2-pass)",
        }
    }
}

impl fmt::Display for WipeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Concurrency {
    Sequential,
    /// Requested lane count; capped by CPU count and `EngineConfig::max_lanes`
    Parallel(usize),
}

/// Job lifecycle. `LockFailed`, `Completed`, `Failed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Created,
    Locking,
    LockFailed,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::LockFailed | JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the job state machine permits moving from `self` to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Created, Locking)
                | (Created, Failed)
                | (Created, Cancelled)
                | (Locking, LockFailed)
                | (Locking, Running)
                | (Locking, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }

    /// The status a report carries for a terminal state. A failed lock is a failed job.
    pub fn outcome(&self) -> JobStatus {
        match self {
            JobStatus::LockFailed => JobStatus::Failed,
            other => *other,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One wipe request, owned exclusively by a single `WipeEngine::run` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WipeJob {
    pub job_id: Uuid,
    pub device: Device,
    pub method: WipeMethod,
    pub chunk_size_bytes: u64,
    pub concurrency: Concurrency,
    pub status: JobStatus,
}

impl WipeJob {
    /// Create a job in the `Created` state.
    ///
    /// Rejects zero-capacity and system devices. The chunk size is checked
    /// later by the scheduler so that a bad value is reported on the job.
    pub fn new(
        device: Device,
        method: WipeMethod,
        chunk_size_bytes: u64,
        concurrency: Concurrency,
    ) -> WipeResult<Self> {
        if device.capacity_bytes == 0 {
            return Err(WipeError::InvalidConfig(format!(
                "device {} reports zero capacity",
                device.path_display()
            )));
        }
        if device.is_system {
            return Err(WipeError::InvalidConfig(format!(
                "refusing to create a job for system device {}",
                device.path_display()
            )));
        }

        Ok(Self {
            job_id: Uuid::new_v4(),
            device,
            method,
            chunk_size_bytes,
            concurrency,
            status: JobStatus::Created,
        })
    }
}
