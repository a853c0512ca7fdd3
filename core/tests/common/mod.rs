//! Common test utilities and mock infrastructure
//!
//! This module provides shared functionality for integration tests including:
//! - Mock drives backed by temp files
//! - A fault-injecting platform I/O layer that records what the engine did
//! - Engine and job construction helpers

#![allow(dead_code)]

pub mod faulty_io;
pub mod mock_drive;

use nullnova::{Concurrency, EngineConfig, WipeEngine, WipeJob, WipeMethod};
use std::sync::Arc;

pub use faulty_io::{FaultyIO, IoEvent};
pub use mock_drive::MockDrive;

/// Small blocks and fast retries so tests stay quick
pub fn test_config() -> EngineConfig {
    EngineConfig {
        write_block_size: 4096,
        verify_sample_bytes: 1024,
        lock_max_attempts: 3,
        lock_retry_interval_ms: 1,
        progress_interval_ms: 1,
        ..EngineConfig::default()
    }
}

pub fn engine_with(io: &Arc<FaultyIO>) -> WipeEngine {
    WipeEngine::with_platform(test_config(), io.clone()).expect("test config is valid")
}

pub fn job(mock: &MockDrive, method: WipeMethod, chunk_size: u64, concurrency: Concurrency) -> WipeJob {
    WipeJob::new(mock.device(), method, chunk_size, concurrency).expect("mock device is valid")
}
