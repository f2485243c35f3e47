//! I2C bus capability.

use crate::error::Result;
use crate::i2c::I2cConnection;

pub trait I2cConnector {
    /// Connection to the device at `address` on `bus`.
    fn get_connection(&self, address: u16, bus: u32) -> Result<I2cConnection>;

    /// Bus to use when the caller has no preference.
    fn default_bus(&self) -> u32;
}
