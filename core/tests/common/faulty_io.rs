/// Fault-injecting platform I/O
///
/// Delegates real work to the host implementation and records every call so
/// tests can assert on the exact sequence of writes and syncs the engine
/// issued. Faults are configured up front with the builder methods.
use nullnova::io::{get_platform_io, PlatformIO};
use nullnova::CancelToken;
use std::fs::File;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoEvent {
    Dismount(PathBuf),
    Open,
    Write {
        offset: u64,
        len: usize,
        /// `Some(b)` when every byte written was `b`
        uniform: Option<u8>,
        thread: Option<String>,
    },
    Sync {
        thread: Option<String>,
    },
    Read {
        offset: u64,
        len: usize,
    },
}

pub struct FaultyIO {
    inner: Arc<dyn PlatformIO>,
    mounts: Vec<PathBuf>,
    busy_opens: AtomicU32,
    fail_writes: Option<Range<u64>>,
    short_write_call: Option<u64>,
    corrupt_reads: Option<Range<u64>>,
    cancel_after_writes: Mutex<Option<(u64, CancelToken)>>,
    opens: AtomicU64,
    write_calls: AtomicU64,
    events: Mutex<Vec<IoEvent>>,
}

impl FaultyIO {
    pub fn new() -> Self {
        Self {
            inner: get_platform_io(),
            mounts: Vec::new(),
            busy_opens: AtomicU32::new(0),
            fail_writes: None,
            short_write_call: None,
            corrupt_reads: None,
            cancel_after_writes: Mutex::new(None),
            opens: AtomicU64::new(0),
            write_calls: AtomicU64::new(0),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Report these mount points as backed by the device
    pub fn with_mounts(mut self, mounts: Vec<PathBuf>) -> Self {
        self.mounts = mounts;
        self
    }

    /// The first `n` opens fail with EBUSY
    pub fn busy_for(self, n: u32) -> Self {
        self.busy_opens.store(n, Ordering::SeqCst);
        self
    }

    /// Every write starting inside `range` fails with EIO
    pub fn fail_writes_in(mut self, range: Range<u64>) -> Self {
        self.fail_writes = Some(range);
        self
    }

    /// The `n`th write call (1-based) only writes half its buffer
    pub fn short_write_at_call(mut self, n: u64) -> Self {
        self.short_write_call = Some(n);
        self
    }

    /// Reads starting inside `range` come back as zeros
    pub fn corrupt_reads(mut self, range: Range<u64>) -> Self {
        self.corrupt_reads = Some(range);
        self
    }

    /// Cancel `token` once `n` writes have completed. Set after the
    /// engine exists, since the token comes from it.
    pub fn cancel_after_writes(&self, n: u64, token: CancelToken) {
        *self.cancel_after_writes.lock().unwrap() = Some((n, token));
    }

    pub fn opens(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> u64 {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<IoEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Only the write events, in issue order
    pub fn writes(&self) -> Vec<IoEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, IoEvent::Write { .. }))
            .collect()
    }

    fn record(&self, event: IoEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn thread_name() -> Option<String> {
        std::thread::current().name().map(str::to_string)
    }
}

impl PlatformIO for FaultyIO {
    fn mounted_targets(&self, _device_path: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(self.mounts.clone())
    }

    fn dismount(&self, target: &Path) -> io::Result<()> {
        self.record(IoEvent::Dismount(target.to_path_buf()));
        Ok(())
    }

    fn open_exclusive(&self, path: &Path, direct_io: bool) -> io::Result<File> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.record(IoEvent::Open);

        let busy = self
            .busy_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if busy {
            return Err(io::Error::from_raw_os_error(libc::EBUSY));
        }
        self.inner.open_exclusive(path, direct_io)
    }

    fn release(&self, file: &File) -> io::Result<()> {
        self.inner.release(file)
    }

    fn write_at(&self, file: &File, data: &[u8], offset: u64) -> io::Result<usize> {
        let call = self.write_calls.fetch_add(1, Ordering::SeqCst) + 1;

        if self.fail_writes.as_ref().is_some_and(|r| r.contains(&offset)) {
            return Err(io::Error::from_raw_os_error(libc::EIO));
        }

        let len = if self.short_write_call == Some(call) {
            data.len() / 2
        } else {
            data.len()
        };
        let written = self.inner.write_at(file, &data[..len], offset)?;

        let uniform = data.first().copied().filter(|&b| data.iter().all(|&x| x == b));
        self.record(IoEvent::Write {
            offset,
            len: written,
            uniform,
            thread: Self::thread_name(),
        });

        if let Some((n, token)) = self.cancel_after_writes.lock().unwrap().as_ref() {
            if call >= *n {
                token.cancel();
            }
        }
        Ok(written)
    }

    fn read_at(&self, file: &File, buffer: &mut [u8], offset: u64) -> io::Result<usize> {
        let read = self.inner.read_at(file, buffer, offset)?;
        self.record(IoEvent::Read { offset, len: read });

        if self.corrupt_reads.as_ref().is_some_and(|r| r.contains(&offset)) {
            buffer[..read].fill(0);
        }
        Ok(read)
    }

    fn sync_data(&self, file: &File) -> io::Result<()> {
        self.record(IoEvent::Sync {
            thread: Self::thread_name(),
        });
        self.inner.sync_data(file)
    }

    fn platform_name(&self) -> &str {
        "faulty"
    }
}
