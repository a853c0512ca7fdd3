// Platform-specific I/O implementations
//
// Every call that touches the operating system goes through `PlatformIO`,
// so tests can substitute an implementation that injects faults.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::{FileExt, FileTypeExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(target_os = "linux")]
use crate::drives::mount::targets_for_device;

/// Platform-specific I/O handler
pub trait PlatformIO: Send + Sync {
    /// Mount points whose source is `device_path` or one of its partitions
    fn mounted_targets(&self, device_path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Dismount a single mount point
    fn dismount(&self, target: &Path) -> io::Result<()>;

    /// Open the device read/write and take an exclusive advisory lock on it.
    /// Fails with `EBUSY`/`EWOULDBLOCK` while another holder has it.
    fn open_exclusive(&self, path: &Path, direct_io: bool) -> io::Result<File>;

    /// Drop the advisory lock taken by `open_exclusive`
    fn release(&self, file: &File) -> io::Result<()>;

    /// Positioned write; may write fewer bytes than requested
    fn write_at(&self, file: &File, data: &[u8], offset: u64) -> io::Result<usize>;

    /// Positioned read; may read fewer bytes than requested
    fn read_at(&self, file: &File, buffer: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Sync data to disk
    fn sync_data(&self, file: &File) -> io::Result<()>;

    /// Get platform name
    fn platform_name(&self) -> &str;
}

fn flock(file: &File, arg: nix::fcntl::FlockArg) -> io::Result<()> {
    nix::fcntl::flock(file.as_raw_fd(), arg).map_err(io::Error::from)
}

fn open_with_flags(path: &Path, flags: i32) -> io::Result<File> {
    let is_block_device = std::fs::metadata(path)?.file_type().is_block_device();

    let mut opts = OpenOptions::new();
    opts.write(true).read(true);

    // O_EXCL on a block device fails with EBUSY while it is mounted or held
    let mut flags = flags;
    if is_block_device {
        flags |= libc::O_EXCL;
    }
    opts.custom_flags(flags);

    let file = opts.open(path)?;
    flock(&file, nix::fcntl::FlockArg::LockExclusiveNonblock)?;
    Ok(file)
}

// ============= LINUX IMPLEMENTATION =============

#[cfg(target_os = "linux")]
#[derive(Debug, Default)]
pub struct LinuxIO;

#[cfg(target_os = "linux")]
impl LinuxIO {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "linux")]
impl PlatformIO for LinuxIO {
    fn mounted_targets(&self, device_path: &Path) -> io::Result<Vec<PathBuf>> {
        let content = std::fs::read_to_string("/proc/mounts")?;
        Ok(targets_for_device(&content, device_path))
    }

    fn dismount(&self, target: &Path) -> io::Result<()> {
        nix::mount::umount2(target, nix::mount::MntFlags::empty()).map_err(io::Error::from)
    }

    fn open_exclusive(&self, path: &Path, direct_io: bool) -> io::Result<File> {
        // O_DIRECT bypasses the page cache so sync covers every pass
        let flags = if direct_io { libc::O_DIRECT } else { 0 };
        open_with_flags(path, flags)
    }

    fn release(&self, file: &File) -> io::Result<()> {
        flock(file, nix::fcntl::FlockArg::Unlock)
    }

    fn write_at(&self, file: &File, data: &[u8], offset: u64) -> io::Result<usize> {
        // Use pwrite for positioned writes without seeking
        FileExt::write_at(file, data, offset)
    }

    fn read_at(&self, file: &File, buffer: &mut [u8], offset: u64) -> io::Result<usize> {
        FileExt::read_at(file, buffer, offset)
    }

    fn sync_data(&self, file: &File) -> io::Result<()> {
        file.sync_data()
    }

    fn platform_name(&self) -> &str {
        "Linux (pwrite/flock)"
    }
}

// ============= GENERIC UNIX IMPLEMENTATION =============

/// Fallback for Unix systems without a readable mount table.
/// Dismounting is left to the operator.
#[cfg(not(target_os = "linux"))]
#[derive(Debug, Default)]
pub struct UnixIO;

#[cfg(not(target_os = "linux"))]
impl UnixIO {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(target_os = "linux"))]
impl PlatformIO for UnixIO {
    fn mounted_targets(&self, _device_path: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }

    fn dismount(&self, target: &Path) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("cannot dismount {} on this platform", target.display()),
        ))
    }

    fn open_exclusive(&self, path: &Path, _direct_io: bool) -> io::Result<File> {
        open_with_flags(path, 0)
    }

    fn release(&self, file: &File) -> io::Result<()> {
        flock(file, nix::fcntl::FlockArg::Unlock)
    }

    fn write_at(&self, file: &File, data: &[u8], offset: u64) -> io::Result<usize> {
        FileExt::write_at(file, data, offset)
    }

    fn read_at(&self, file: &File, buffer: &mut [u8], offset: u64) -> io::Result<usize> {
        FileExt::read_at(file, buffer, offset)
    }

    fn sync_data(&self, file: &File) -> io::Result<()> {
        file.sync_data()
    }

    fn platform_name(&self) -> &str {
        "Unix (pwrite/flock)"
    }
}

// ============= PLATFORM FACTORY =============

/// Get the appropriate platform I/O implementation
pub fn get_platform_io() -> Arc<dyn PlatformIO> {
    #[cfg(target_os = "linux")]
    {
        Arc::new(LinuxIO::new())
    }

    #[cfg(not(target_os = "linux"))]
    {
        Arc::new(UnixIO::new())
    }
}
