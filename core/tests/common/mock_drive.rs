use nullnova::Device;
use std::io::{Read, Seek, SeekFrom, Write};
/// Mock drive infrastructure for testing
///
/// A temp file pre-filled with a recognisable pattern stands in for the
/// block device, so tests can tell overwritten bytes from untouched ones.
use tempfile::NamedTempFile;

/// Byte every mock drive starts out with
pub const STALE_BYTE: u8 = 0xAB;

pub struct MockDrive {
    pub temp_file: NamedTempFile,
    pub size: u64,
}

impl MockDrive {
    /// Create a mock drive of `size` bytes filled with [`STALE_BYTE`]
    pub fn new(size: u64) -> std::io::Result<Self> {
        let mut temp_file = NamedTempFile::new()?;

        let mut written = 0u64;
        let chunk = vec![STALE_BYTE; 1024 * 1024];
        while written < size {
            let write_size = (size - written).min(chunk.len() as u64);
            temp_file.write_all(&chunk[..write_size as usize])?;
            written += write_size;
        }

        temp_file.flush()?;
        temp_file.seek(SeekFrom::Start(0))?;

        Ok(Self { temp_file, size })
    }

    pub fn path(&self) -> &std::path::Path {
        self.temp_file.path()
    }

    /// Device record the engine is handed for this drive
    pub fn device(&self) -> Device {
        Device::new("mock", self.path(), self.size)
    }

    /// Entire drive contents
    pub fn read_all(&self) -> std::io::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(self.size as usize);
        std::fs::File::open(self.path())?.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Contents of `[offset, offset + len)`
    pub fn read_range(&self, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
        let mut file = std::fs::File::open(self.path())?;
        file.seek(SeekFrom::Start(offset))?;
        let mut data = vec![0u8; len];
        file.read_exact(&mut data)?;
        Ok(data)
    }
}
