/// Basic wipe operation integration tests
///
/// Tests end-to-end runs of the engine against mock drives
use nullnova::{Concurrency, JobStatus, WipeMethod, WipeReport};
use std::sync::Arc;

// Import common test utilities
// Note: In integration tests, common modules must be in tests/common/
#[path = "common/mod.rs"]
mod common;

use common::mock_drive::STALE_BYTE;
use common::{engine_with, job, FaultyIO, MockDrive};

/// Fraction of bytes still holding the pre-wipe pattern
fn stale_fraction(data: &[u8]) -> f64 {
    data.iter().filter(|&&b| b == STALE_BYTE).count() as f64 / data.len() as f64
}

#[test]
fn test_dod_wipe_overwrites_whole_device() {
    let mock = MockDrive::new(256 * 1024).expect("Failed to create mock drive");
    let io = Arc::new(FaultyIO::new());
    let engine = engine_with(&io);

    let report = engine.run(job(&mock, WipeMethod::DoDThreePass, 64 * 1024, Concurrency::Sequential));

    assert_eq!(report.status, JobStatus::Completed, "{:?}", report.errors);
    assert_eq!(report.chunks_planned, 4);
    assert_eq!(report.chunks_completed, 4);
    assert_eq!(report.bytes_written, 3 * mock.size);
    assert!(report.verified);

    // Last pass is random: only chance leftovers of the stale byte remain
    let data = mock.read_all().unwrap();
    assert_eq!(data.len() as u64, mock.size);
    assert!(stale_fraction(&data) < 0.02);
    assert!(!data.iter().all(|&b| b == 0xFF));
}

#[test]
fn test_crypto_erase_overwrites_whole_device() {
    let mock = MockDrive::new(128 * 1024).expect("Failed to create mock drive");
    let io = Arc::new(FaultyIO::new());
    let engine = engine_with(&io);

    let report = engine.run(job(&mock, WipeMethod::CryptoErase, 32 * 1024, Concurrency::Sequential));

    assert_eq!(report.status, JobStatus::Completed, "{:?}", report.errors);
    assert_eq!(report.bytes_written, 2 * mock.size);

    let data = mock.read_all().unwrap();
    assert!(stale_fraction(&data) < 0.02);
    let zeros = data.iter().filter(|&&b| b == 0).count();
    assert!(zeros < data.len() / 64, "encrypted zeros should not look like zeros");
}

#[test]
fn test_tail_chunk_is_written_to_the_last_byte() {
    // 3 full chunks and a 1000-byte tail
    let size = 3 * 16 * 1024 + 1000;
    let mock = MockDrive::new(size).expect("Failed to create mock drive");
    let io = Arc::new(FaultyIO::new());
    let engine = engine_with(&io);

    let report = engine.run(job(&mock, WipeMethod::DoDThreePass, 16 * 1024, Concurrency::Sequential));

    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.chunks_planned, 4);
    assert_eq!(report.bytes_written, 3 * size);

    let tail = mock.read_range(3 * 16 * 1024, 1000).unwrap();
    assert!(stale_fraction(&tail) < 0.05);
}

#[test]
fn test_chunk_larger_than_device_is_one_chunk() {
    let mock = MockDrive::new(10_000).expect("Failed to create mock drive");
    let io = Arc::new(FaultyIO::new());
    let engine = engine_with(&io);

    let report = engine.run(job(&mock, WipeMethod::CryptoErase, 1 << 20, Concurrency::Parallel(4)));

    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.chunks_planned, 1);
    assert_eq!(report.lanes, 1);
    assert_eq!(report.bytes_written, 2 * 10_000);
}

#[test]
fn test_report_round_trips_through_disk() {
    let mock = MockDrive::new(32 * 1024).expect("Failed to create mock drive");
    let io = Arc::new(FaultyIO::new());
    let engine = engine_with(&io);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");

    let report = engine.run(job(&mock, WipeMethod::DoDThreePass, 8 * 1024, Concurrency::Parallel(2)));
    report.save(&path).unwrap();

    let loaded = WipeReport::load(&path).unwrap();
    assert!(loaded.verify_digest().unwrap());
    assert_eq!(loaded.job_id, report.job_id);
    assert_eq!(loaded.transitions.last(), Some(&JobStatus::Completed));
    assert_eq!(loaded.device.raw_path, mock.path());
}

#[test]
fn test_mounted_targets_are_dismounted_before_open() {
    let mock = MockDrive::new(8 * 1024).expect("Failed to create mock drive");
    let io = Arc::new(FaultyIO::new().with_mounts(vec!["/mnt/a".into(), "/mnt/a/nested".into()]));
    let engine = engine_with(&io);

    let report = engine.run(job(&mock, WipeMethod::CryptoErase, 4096, Concurrency::Sequential));
    assert_eq!(report.status, JobStatus::Completed);

    let events = io.events();
    let first_open = events
        .iter()
        .position(|e| *e == common::IoEvent::Open)
        .expect("device was opened");
    let dismounts: Vec<_> = events[..first_open]
        .iter()
        .filter_map(|e| match e {
            common::IoEvent::Dismount(p) => Some(p.clone()),
            _ => None,
        })
        .collect();
    // Deepest mount point first
    assert_eq!(dismounts, vec![std::path::PathBuf::from("/mnt/a/nested"), "/mnt/a".into()]);
}
