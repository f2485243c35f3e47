//! The Tinker Board adaptor.
//!
//! [`Adaptor`] composes the GPIO, PWM and I2C managers behind the
//! capability traits in [`crate::hw_trait`]. The filesystem and I2C
//! transport are chosen at construction; `connect` builds fresh managers
//! over them and `finalize` releases everything and drops them again.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gpio::DigitalPins;
use crate::hw_trait::{
    DigitalReader, DigitalWriter, I2cConnector, Lifecycle, PwmWriter, ServoWriter,
};
use crate::i2c::{I2cBuses, I2cConnection, I2cTransport, LinuxI2c};
use crate::pins::{self, Resolved};
use crate::pwm::PwmPins;
use crate::sysfs::{Filesystem, SysFs};
use crate::tracing::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

const BOARD_NAME: &str = "Tinker Board";

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

/// The I/O primitives every manager works against.
#[derive(Clone)]
pub struct Backends {
    pub fs: Arc<dyn Filesystem>,
    pub i2c: Arc<dyn I2cTransport>,
}

impl Backends {
    /// Real sysfs and i2c-dev.
    pub fn linux() -> Self {
        Self {
            fs: Arc::new(SysFs),
            i2c: Arc::new(LinuxI2c),
        }
    }
}

struct Managers {
    digital: DigitalPins,
    pwm: PwmPins,
    i2c: I2cBuses,
}

pub struct Adaptor {
    name: String,
    config: Config,
    backends: Backends,
    managers: Option<Managers>,
}

impl Adaptor {
    pub fn new(backends: Backends, config: Config) -> Self {
        let name = config.name.clone().unwrap_or_else(|| {
            format!("{}-{:04X}", BOARD_NAME, NEXT_ID.fetch_add(1, Ordering::Relaxed))
        });
        Self {
            name,
            config,
            backends,
            managers: None,
        }
    }

    /// Adaptor over the real sysfs and i2c-dev.
    pub fn linux(config: Config) -> Self {
        Self::new(Backends::linux(), config)
    }

    pub fn is_connected(&self) -> bool {
        self.managers.is_some()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Unexport whatever GPIO line and PWM channel `pin` currently holds.
    pub fn release_pin(&self, pin: &str) -> Result<()> {
        let managers = self.managers()?;
        let resolved = pins::resolve(pin);
        if resolved == Resolved::NotFound {
            return Err(Error::InvalidPin(pin.to_string()));
        }
        let digital = match resolved.gpio() {
            Some(_) => managers.digital.release(pin),
            None => Ok(()),
        };
        let channel = match resolved.pwm() {
            Some(_) => managers.pwm.release(pin),
            None => Ok(()),
        };
        digital.and(channel)
    }

    /// Live (GPIO lines, PWM channels, I2C connections).
    pub fn open_handles(&self) -> (usize, usize, usize) {
        match &self.managers {
            Some(m) => (m.digital.len(), m.pwm.len(), m.i2c.len()),
            None => (0, 0, 0),
        }
    }

    fn managers(&self) -> Result<&Managers> {
        self.managers.as_ref().ok_or(Error::NotConnected)
    }
}

impl Lifecycle for Adaptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn connect(&mut self) -> Result<()> {
        if self.managers.is_some() {
            return Ok(());
        }
        self.config.validate()?;
        let Backends { fs, i2c } = self.backends.clone();
        self.managers = Some(Managers {
            digital: DigitalPins::new(fs.clone(), &self.config.sysfs_root),
            pwm: PwmPins::new(fs, &self.config.sysfs_root, self.config.pwm_period_ns),
            i2c: I2cBuses::new(i2c, &self.config.dev_root),
        });
        info!("{} connected.", self.name);
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        let Some(managers) = self.managers.take() else {
            return Ok(());
        };
        let results = [
            managers.digital.release_all(),
            managers.pwm.release_all(),
            managers.i2c.close_all(),
        ];
        info!("{} finalized.", self.name);
        results.into_iter().collect::<Result<Vec<()>>>().map(|_| ())
    }
}

impl DigitalReader for Adaptor {
    fn digital_read(&self, pin: &str) -> Result<u8> {
        self.managers()?.digital.read(pin)
    }
}

impl DigitalWriter for Adaptor {
    fn digital_write(&self, pin: &str, level: u8) -> Result<()> {
        self.managers()?.digital.write(pin, level)
    }
}

impl PwmWriter for Adaptor {
    fn pwm_write(&self, pin: &str, percent: f64) -> Result<()> {
        self.managers()?.pwm.write(pin, percent)
    }
}

impl ServoWriter for Adaptor {
    fn servo_write(&self, pin: &str, angle: f64) -> Result<()> {
        self.managers()?.pwm.servo_write(pin, angle)
    }
}

impl I2cConnector for Adaptor {
    fn get_connection(&self, address: u16, bus: u32) -> Result<I2cConnection> {
        self.managers()?.i2c.get_connection(address, bus)
    }

    fn default_bus(&self) -> u32 {
        pins::DEFAULT_I2C_BUS
    }
}
