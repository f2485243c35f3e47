//! i2c-dev access on Linux.
//!
//! The device node is opened read/write and bound to the target with the
//! `I2C_SLAVE` ioctl; after that, plain read(2)/write(2) are bus
//! transactions with that device.

use super::{I2cDevice, I2cTransport};
use nix::unistd;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, IntoRawFd};
use std::path::Path;

// From <linux/i2c-dev.h>
const I2C_SLAVE: u16 = 0x0703;

nix::ioctl_write_int_bad!(i2c_set_slave, I2C_SLAVE);

/// Opens `/dev/i2c-N` nodes.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxI2c;

impl I2cTransport for LinuxI2c {
    fn open(&self, path: &Path, address: u16) -> io::Result<Box<dyn I2cDevice>> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        // SAFETY: `file` is an open descriptor for the duration of the call
        // and I2C_SLAVE takes its argument by value.
        unsafe { i2c_set_slave(file.as_raw_fd(), address.into()) }?;
        Ok(Box::new(LinuxI2cDevice { file: Some(file) }))
    }
}

struct LinuxI2cDevice {
    file: Option<File>,
}

impl LinuxI2cDevice {
    fn file(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "device closed"))
    }
}

impl I2cDevice for LinuxI2cDevice {
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        self.file()?.read(buffer)
    }

    fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
        self.file()?.write(buffer)
    }

    fn close(&mut self) -> io::Result<()> {
        match self.file.take() {
            // Close explicitly so the error isn't swallowed by Drop.
            Some(file) => unistd::close(file.into_raw_fd()).map_err(io::Error::from),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_node() {
        let err = LinuxI2c
            .open(Path::new("/nonexistent/i2c-1"), 0x24)
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_set_slave_on_regular_file_fails() {
        let path = std::env::temp_dir().join(format!("tinkerboard-i2c-{}", std::process::id()));
        std::fs::write(&path, b"").unwrap();
        // Not a character device: the ioctl is refused.
        assert!(LinuxI2c.open(&path, 0x24).is_err());
        std::fs::remove_file(&path).unwrap();
    }
}
