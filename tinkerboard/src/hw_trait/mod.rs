//! Capability traits a host drives an adaptor through.
//!
//! A host that only needs digital outputs can hold a `&dyn DigitalWriter`
//! without knowing which board is behind it. [`crate::Adaptor`] implements
//! every trait here.

pub mod gpio;
pub mod i2c;
pub mod pwm;

pub use gpio::{DigitalReader, DigitalWriter};
pub use i2c::I2cConnector;
pub use pwm::{PwmWriter, ServoWriter};

use crate::error::Result;

/// Identity and lifecycle shared by every adaptor.
pub trait Lifecycle {
    fn name(&self) -> &str;

    fn set_name(&mut self, name: &str);

    /// Bind the backends. Must precede any capability call; calling it
    /// again while connected does nothing.
    fn connect(&mut self) -> Result<()>;

    /// Release every exported line, channel, and open connection.
    fn finalize(&mut self) -> Result<()>;
}
