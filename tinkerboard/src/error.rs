//! Common error types for the tinkerboard adaptor.
//!
//! This module provides a centralized Error enum using thiserror. Every
//! capability operation reports failure through it; nothing in the library
//! panics or retries.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for adaptor operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Logical pin name absent from the board tables
    #[error("Not a valid pin: {0}")]
    InvalidPin(String),

    /// Numeric argument outside its documented bounds
    #[error("{what} {value} out of range ({min}..={max})")]
    Range {
        what: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// I2C bus index not supported by this board
    #[error("Bus number {0} out of range")]
    BusRange(u32),

    /// Filesystem or device operation failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Capability used before `connect` or after `finalize`
    #[error("Adaptor not connected")]
    NotConnected,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn range(what: &'static str, value: f64, min: f64, max: f64) -> Self {
        Error::Range {
            what,
            value,
            min,
            max,
        }
    }
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
