// Mount table matching and dismount

use crate::error::{WipeError, WipeResult};
use crate::io::PlatformIO;
use std::path::{Path, PathBuf};

/// Mount points that make a device the running system's disk
const SYSTEM_MOUNT_POINTS: &[&str] = &["/", "/boot", "/boot/efi", "/usr", "/var"];

/// Parse `/proc/mounts` content into `(source, target)` pairs
pub fn parse_mount_table(content: &str) -> Vec<(String, PathBuf)> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let source = parts.next()?;
            let target = parts.next()?;
            Some((source.to_string(), PathBuf::from(unescape_mount_path(target))))
        })
        .collect()
}

// The kernel escapes space, tab, newline and backslash as octal
fn unescape_mount_path(raw: &str) -> String {
    raw.replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}

/// True when `source` names `device` itself or one of its partitions
/// (`/dev/sdb` matches `/dev/sdb1`; `/dev/nvme0n1` matches `/dev/nvme0n1p2`).
///
/// Names ending in a digit separate partitions with `p`, so `/dev/loop1`
/// never matches `/dev/loop10` and `/dev/sda` never matches `/dev/sdap1`.
pub fn is_device_or_partition(source: &str, device: &str) -> bool {
    let rest = match source.strip_prefix(device) {
        Some("") => return true,
        Some(rest) => rest,
        None => return false,
    };
    let digits = if device.ends_with(|c: char| c.is_ascii_digit()) {
        match rest.strip_prefix('p') {
            Some(digits) => digits,
            None => return false,
        }
    } else {
        rest
    };
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Mount targets in `content` that belong to `device_path`
pub fn targets_for_device(content: &str, device_path: &Path) -> Vec<PathBuf> {
    let device = device_path.to_string_lossy();
    parse_mount_table(content)
        .into_iter()
        .filter(|(source, _)| is_device_or_partition(source, &device))
        .map(|(_, target)| target)
        .collect()
}

/// Whether any system mount point in `content` lives on `device_path`
pub fn hosts_system_mount(content: &str, device_path: &Path) -> bool {
    targets_for_device(content, device_path)
        .iter()
        .any(|target| SYSTEM_MOUNT_POINTS.iter().any(|sys| target == Path::new(sys)))
}

/// Unmount every filesystem on `device_path`, deepest mount point first.
/// Returns the targets that were unmounted.
pub fn dismount_all(platform: &dyn PlatformIO, device_path: &Path) -> WipeResult<Vec<PathBuf>> {
    let device = device_path.display().to_string();

    let mut targets = platform
        .mounted_targets(device_path)
        .map_err(|e| WipeError::lock(&device, format!("cannot read mount table: {}", e)))?;

    // Nested mounts must go before their parents
    targets.sort_by_key(|t| std::cmp::Reverse(t.components().count()));

    for target in &targets {
        tracing::info!(device = %device, target = %target.display(), "Dismounting");
        platform.dismount(target).map_err(|e| {
            WipeError::lock(&device, format!("failed to dismount {}: {}", target.display(), e))
        })?;
    }

    Ok(targets)
}
