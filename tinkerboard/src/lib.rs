//! GPIO, PWM and I2C for the ASUS Tinker Board.
//!
//! Logical header pin names are translated to sysfs GPIO lines, sysfs PWM
//! channels, and i2c-dev device nodes. Hosts drive the board through the
//! capability traits in [`hw_trait`], all implemented by [`Adaptor`].

pub mod adaptor;
pub mod config;
pub mod error;
pub mod gpio;
pub mod hw_trait;
pub mod i2c;
pub mod pins;
pub mod pwm;
pub mod sysfs;
pub mod tracing;

pub use adaptor::{Adaptor, Backends};
pub use config::Config;
pub use error::{Error, Result};
