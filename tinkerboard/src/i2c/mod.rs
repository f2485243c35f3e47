//! I2C connections over the i2c-dev character devices.
//!
//! [`I2cBuses`] hands out one [`I2cConnection`] per `(bus, address)` pair.
//! Asking twice returns a clone sharing the same open device. Opening the
//! device node and binding the address is delegated to an [`I2cTransport`]
//! so tests can run without hardware.

use crate::error::{Error, Result};
use crate::pins;
use crate::tracing::prelude::*;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod linux;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use linux::LinuxI2c;

/// Opens device nodes and binds them to a target address.
pub trait I2cTransport: Send + Sync {
    fn open(&self, path: &Path, address: u16) -> io::Result<Box<dyn I2cDevice>>;
}

/// An open device bound to one address. Plain reads and writes, no
/// register or SMBus framing.
pub trait I2cDevice: Send {
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, buffer: &[u8]) -> io::Result<usize>;

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Shared handle to one device. Cloning is cheap; all clones stop working
/// once the owning [`I2cBuses`] closes the connection.
#[derive(Clone)]
pub struct I2cConnection {
    bus: u32,
    address: u16,
    path: PathBuf,
    device: Arc<Mutex<Option<Box<dyn I2cDevice>>>>,
}

impl I2cConnection {
    pub fn bus(&self) -> u32 {
        self.bus
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    /// Read into `buffer`, returning the number of bytes received.
    pub fn read(&self, buffer: &mut [u8]) -> Result<usize> {
        self.with_device(|device| device.read(buffer))
    }

    /// Write `buffer`, returning the number of bytes sent.
    pub fn write(&self, buffer: &[u8]) -> Result<usize> {
        self.with_device(|device| device.write(buffer))
    }

    pub fn is_closed(&self) -> bool {
        self.device.lock().is_none()
    }

    fn with_device<T>(
        &self,
        op: impl FnOnce(&mut dyn I2cDevice) -> io::Result<T>,
    ) -> Result<T> {
        let mut device = self.device.lock();
        let device = device.as_mut().ok_or_else(|| {
            Error::io(
                &self.path,
                io::Error::new(io::ErrorKind::NotConnected, "connection closed"),
            )
        })?;
        op(&mut **device).map_err(|e| Error::io(&self.path, e))
    }

    fn close(&self) -> Result<()> {
        match self.device.lock().take() {
            Some(mut device) => device.close().map_err(|e| Error::io(&self.path, e)),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for I2cConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("I2cConnection")
            .field("bus", &self.bus)
            .field("address", &format_args!("0x{:02x}", self.address))
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Owner of every open I2C connection.
pub struct I2cBuses {
    transport: Arc<dyn I2cTransport>,
    dev_root: PathBuf,
    connections: Mutex<HashMap<(u32, u16), I2cConnection>>,
}

impl I2cBuses {
    pub fn new(transport: Arc<dyn I2cTransport>, dev_root: &Path) -> Self {
        Self {
            transport,
            dev_root: dev_root.to_path_buf(),
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Connection to `address` on `bus`, opening it on first request.
    ///
    /// The address is passed to the kernel as given; values past the 7-bit
    /// range are left for the driver to reject.
    pub fn get_connection(&self, address: u16, bus: u32) -> Result<I2cConnection> {
        let path = pins::i2c_device_path(&self.dev_root, bus)?;
        let mut connections = self.connections.lock();
        if let Some(connection) = connections.get(&(bus, address)) {
            return Ok(connection.clone());
        }

        let device = self
            .transport
            .open(&path, address)
            .map_err(|e| Error::io(&path, e))?;
        debug!("Opened {} for address 0x{:02x}", path.display(), address);
        let connection = I2cConnection {
            bus,
            address,
            path,
            device: Arc::new(Mutex::new(Some(device))),
        };
        connections.insert((bus, address), connection.clone());
        Ok(connection)
    }

    /// The bus used when the caller doesn't name one.
    pub fn default_bus(&self) -> u32 {
        pins::DEFAULT_I2C_BUS
    }

    /// Close every connection. Keeps going after a failure and returns the
    /// first one.
    pub fn close_all(&self) -> Result<()> {
        let drained: Vec<_> = self.connections.lock().drain().collect();
        let mut first = None;
        for ((bus, address), connection) in drained {
            match connection.close() {
                Ok(()) => debug!("Closed i2c-{} address 0x{:02x}", bus, address),
                Err(e) => {
                    warn!("Failed to close i2c-{} address 0x{:02x}: {}", bus, address, e);
                    first.get_or_insert(e);
                }
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
