//! Loopback I2C transport for tests.
//!
//! Every opened device echoes back the last buffer written to it.

use super::{I2cDevice, I2cTransport};
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Shared {
    fail_open: AtomicBool,
    fail_close: AtomicBool,
    closed: AtomicUsize,
}

#[derive(Debug, Default)]
pub struct MockTransport {
    shared: Arc<Shared>,
    opened: Mutex<Vec<(PathBuf, u16)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(path, address)` passed to `open`, in order.
    pub fn opened(&self) -> Vec<(PathBuf, u16)> {
        self.opened.lock().clone()
    }

    /// Number of devices closed so far.
    pub fn closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn fail_open(&self, fail: bool) {
        self.shared.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn fail_close(&self, fail: bool) {
        self.shared.fail_close.store(fail, Ordering::SeqCst);
    }
}

impl I2cTransport for MockTransport {
    fn open(&self, path: &Path, address: u16) -> io::Result<Box<dyn I2cDevice>> {
        if self.shared.fail_open.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such device"));
        }
        self.opened.lock().push((path.to_path_buf(), address));
        Ok(Box::new(MockDevice {
            shared: Arc::clone(&self.shared),
            data: Vec::new(),
        }))
    }
}

struct MockDevice {
    shared: Arc<Shared>,
    data: Vec<u8>,
}

impl I2cDevice for MockDevice {
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let n = buffer.len().min(self.data.len());
        buffer[..n].copy_from_slice(&self.data[..n]);
        Ok(n)
    }

    fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
        self.data = buffer.to_vec();
        Ok(buffer.len())
    }

    fn close(&mut self) -> io::Result<()> {
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_close.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected close failure"));
        }
        Ok(())
    }
}
