// Minimal device probe for the command line front end.
//
// Full discovery and classification is a collaborator's job; this only
// fills in a `Device` record for a path the operator named explicitly.

use super::mount::hosts_system_mount;
use crate::Device;
use anyhow::{anyhow, Context, Result};
use std::fs::{self, File};
use std::io::{Seek, SeekFrom};
use std::path::Path;

pub struct DriveDetector;

impl DriveDetector {
    /// Build a `Device` record for `device_path`
    pub fn probe(device_path: &Path) -> Result<Device> {
        let capacity = Self::get_drive_size(device_path)?;
        let name = Self::device_name(device_path)?;

        let mounts = fs::read_to_string("/proc/mounts").unwrap_or_default();

        Ok(Device {
            id: name.clone(),
            raw_path: device_path.to_path_buf(),
            capacity_bytes: capacity,
            is_removable: Self::read_sysfs_flag(&name, "removable"),
            is_system: hosts_system_mount(&mounts, device_path)
                || Self::on_kernel_cmdline(device_path),
            is_solid_state: !Self::read_sysfs_flag(&name, "queue/rotational"),
        })
    }

    /// Size in bytes, found by seeking to the end of the device
    pub fn get_drive_size(device_path: &Path) -> Result<u64> {
        let mut file = File::open(device_path)
            .with_context(|| format!("Failed to open {}", device_path.display()))?;
        let size = file
            .seek(SeekFrom::End(0))
            .with_context(|| format!("Failed to determine size of {}", device_path.display()))?;
        Ok(size)
    }

    fn device_name(device_path: &Path) -> Result<String> {
        device_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid device path: {}", device_path.display()))
    }

    /// Read a 0/1 attribute from /sys/block/<name>/<attr>; absent means false
    fn read_sysfs_flag(device_name: &str, attr: &str) -> bool {
        fs::read_to_string(format!("/sys/block/{}/{}", device_name, attr))
            .map(|v| v.trim() == "1")
            .unwrap_or(false)
    }

    fn on_kernel_cmdline(device_path: &Path) -> bool {
        fs::read_to_string("/proc/cmdline")
            .map(|cmdline| {
                let device = device_path.to_string_lossy();
                cmdline
                    .split_whitespace()
                    .filter_map(|arg| arg.split_once('=').map(|(_, v)| v))
                    .any(|value| super::mount::is_device_or_partition(value, &device))
            })
            .unwrap_or(false)
    }
}
