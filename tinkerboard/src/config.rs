//! Adaptor configuration.
//!
//! Every field has a default matching a stock Tinker Board, so an empty
//! file (or none at all) is valid. Settings come from, in order:
//!
//! 1. built-in defaults,
//! 2. the JSON file named by `TINKERBOARD_CONFIG`, if set,
//! 3. `TINKERBOARD_SYSFS_ROOT`, `TINKERBOARD_DEV_ROOT` and
//!    `TINKERBOARD_PWM_PERIOD_NS`.

use crate::error::{Error, Result};
use crate::pwm::DEFAULT_PERIOD_NS;
use crate::sysfs::SYSFS_ROOT;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "TINKERBOARD_CONFIG";
pub const SYSFS_ROOT_ENV: &str = "TINKERBOARD_SYSFS_ROOT";
pub const DEV_ROOT_ENV: &str = "TINKERBOARD_DEV_ROOT";
pub const PWM_PERIOD_ENV: &str = "TINKERBOARD_PWM_PERIOD_NS";

/// Main configuration structure for the adaptor.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Display name; a generated "Tinker Board-XXXX" name when absent
    pub name: Option<String>,

    /// Where sysfs is mounted
    pub sysfs_root: PathBuf,

    /// Directory holding the i2c-N device nodes
    pub dev_root: PathBuf,

    /// PWM period in nanoseconds
    pub pwm_period_ns: u32,

    /// Outputs the daemon applies at startup and holds until shutdown
    pub outputs: Vec<OutputConfig>,
}

/// One output held by the daemon.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub pin: String,
    pub kind: OutputKind,
    /// Level (0/1), duty percent, or servo angle depending on `kind`
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Digital,
    Pwm,
    Servo,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: None,
            sysfs_root: PathBuf::from(SYSFS_ROOT),
            dev_root: PathBuf::from("/dev"),
            pwm_period_ns: DEFAULT_PERIOD_NS,
            outputs: Vec::new(),
        }
    }
}

impl Config {
    /// Load from the file named in the environment (if any), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_from(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load a specific JSON file without environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.pwm_period_ns == 0 {
            return Err(Error::Config("pwm_period_ns must be positive".into()));
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(root) = env::var_os(SYSFS_ROOT_ENV) {
            self.sysfs_root = root.into();
        }
        if let Some(root) = env::var_os(DEV_ROOT_ENV) {
            self.dev_root = root.into();
        }
        if let Ok(period) = env::var(PWM_PERIOD_ENV) {
            self.pwm_period_ns = period.trim().parse().map_err(|_| {
                Error::Config(format!("{} is not a period in ns: {:?}", PWM_PERIOD_ENV, period))
            })?;
        }
        Ok(())
    }
}
