//! Tinker Board pin and bus tables.
//!
//! Logical names are the physical header pin numbers ("7", "33") plus the
//! symbolic PWM controller names ("PWM0".."PWM3"). The RK3288 exposes each
//! PWM controller as its own `pwmchip` with a single channel.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// A header pin usable as a sysfs GPIO line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinSpec {
    pub name: &'static str,
    pub line: u32,
}

/// A name addressing one PWM channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmPinSpec {
    pub name: &'static str,
    pub chip: u32,
    pub channel: u32,
}

/// Outcome of [`resolve`]. Header pins 32 and 33 carry a PWM controller
/// and a GPIO line, so they resolve to `Both`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Gpio(&'static PinSpec),
    Pwm(&'static PwmPinSpec),
    Both(&'static PinSpec, &'static PwmPinSpec),
    NotFound,
}

impl Resolved {
    pub fn gpio(self) -> Option<&'static PinSpec> {
        match self {
            Resolved::Gpio(spec) | Resolved::Both(spec, _) => Some(spec),
            _ => None,
        }
    }

    pub fn pwm(self) -> Option<&'static PwmPinSpec> {
        match self {
            Resolved::Pwm(spec) | Resolved::Both(_, spec) => Some(spec),
            _ => None,
        }
    }
}

const fn gpio(name: &'static str, line: u32) -> PinSpec {
    PinSpec { name, line }
}

const fn pwm(name: &'static str, chip: u32, channel: u32) -> PwmPinSpec {
    PwmPinSpec {
        name,
        chip,
        channel,
    }
}

pub const GPIO_PINS: &[PinSpec] = &[
    gpio("3", 252),  // GPIO8_A4 I2C1_SDA
    gpio("5", 253),  // GPIO8_A5 I2C1_SCL
    gpio("7", 17),   // GPIO0_C1 CLKOUT
    gpio("8", 161),  // GPIO5_B1 UART1TX
    gpio("10", 160), // GPIO5_B0 UART1RX
    gpio("11", 164), // GPIO5_B4 SPI0CLK
    gpio("12", 184), // GPIO6_A0 I2S_CLK
    gpio("13", 166), // GPIO5_B6 SPI0_TXD
    gpio("15", 167), // GPIO5_B7 SPI0_RXD
    gpio("16", 162), // GPIO5_B2 UART1CTSN
    gpio("18", 163), // GPIO5_B3 UART1RTSN
    gpio("19", 257), // GPIO8_B1 SPI2CLK
    gpio("21", 256), // GPIO8_B0 SPI2TXD
    gpio("22", 171), // GPIO5_C3 SPI0CSN1
    gpio("23", 254), // GPIO8_A6 SPI2CSN0
    gpio("24", 255), // GPIO8_A7 SPI2RXD
    gpio("26", 251), // GPIO8_A3 SPI2CSN1
    gpio("27", 233), // GPIO7_C1 I2C4_SDA
    gpio("28", 234), // GPIO7_C2 I2C4_SCL
    gpio("29", 165), // GPIO5_B5 SPI0_RXD
    gpio("31", 168), // GPIO5_C0 SPI0CSN0
    gpio("32", 239), // GPIO7_C7 PWM3
    gpio("33", 238), // GPIO7_C6 PWM2
    gpio("35", 185), // GPIO6_A1 I2S_FS
    gpio("36", 223), // GPIO7_A7 UART3RX
    gpio("37", 224), // GPIO7_B0 UART3TX
    gpio("38", 187), // GPIO6_A3 I2S_SDI
    gpio("40", 188), // GPIO6_A4 I2S_SDO
];

pub const PWM_PINS: &[PwmPinSpec] = &[
    pwm("PWM0", 0, 0),
    pwm("PWM1", 1, 0),
    pwm("PWM2", 2, 0),
    pwm("PWM3", 3, 0),
    pwm("33", 2, 0),
    pwm("32", 3, 0),
];

/// I2C buses wired to the header.
pub const I2C_BUSES: &[u32] = &[1];

pub const DEFAULT_I2C_BUS: u32 = 1;

/// Look `name` up in both tables.
pub fn resolve(name: &str) -> Resolved {
    let gpio = GPIO_PINS.iter().find(|p| p.name == name);
    let pwm = PWM_PINS.iter().find(|p| p.name == name);
    match (gpio, pwm) {
        (Some(gpio), Some(pwm)) => Resolved::Both(gpio, pwm),
        (Some(gpio), None) => Resolved::Gpio(gpio),
        (None, Some(pwm)) => Resolved::Pwm(pwm),
        (None, None) => Resolved::NotFound,
    }
}

/// Sysfs GPIO line for a header pin.
pub fn gpio_line(name: &str) -> Result<&'static PinSpec> {
    resolve(name)
        .gpio()
        .ok_or_else(|| Error::InvalidPin(name.to_string()))
}

/// PWM chip and channel for a header pin or PWM name.
pub fn pwm_channel(name: &str) -> Result<&'static PwmPinSpec> {
    resolve(name)
        .pwm()
        .ok_or_else(|| Error::InvalidPin(name.to_string()))
}

/// Device node for an I2C bus, or `BusRange` if the header doesn't carry it.
pub fn i2c_device_path(dev_root: &Path, bus: u32) -> Result<PathBuf> {
    if !I2C_BUSES.contains(&bus) {
        return Err(Error::BusRange(bus));
    }
    Ok(dev_root.join(format!("i2c-{}", bus)))
}
