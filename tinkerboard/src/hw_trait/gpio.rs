//! Digital input and output capabilities.

use crate::error::Result;

pub trait DigitalReader {
    /// Sample `pin`, returning 0 or 1.
    fn digital_read(&self, pin: &str) -> Result<u8>;
}

pub trait DigitalWriter {
    /// Drive `pin` low (0) or high (1).
    fn digital_write(&self, pin: &str, level: u8) -> Result<()>;
}
