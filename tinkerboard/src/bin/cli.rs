//! One-shot command-line access to the board.
//!
//! Each invocation connects, performs one operation, and finalizes, so
//! exported lines and channels are released before exit.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::num::ParseIntError;

use tinkerboard::hw_trait::{
    DigitalReader, DigitalWriter, I2cConnector, Lifecycle, PwmWriter, ServoWriter,
};
use tinkerboard::{tracing, Adaptor, Config};

/// Drive Tinker Board GPIO, PWM and I2C from the shell
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Print the level of a GPIO pin
    Read { pin: String },

    /// Drive a GPIO pin
    Write {
        pin: String,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
        level: u8,
    },

    /// Set a PWM duty cycle (0-100 percent)
    Pwm { pin: String, percent: f64 },

    /// Position a servo (0-180 degrees)
    Servo { pin: String, angle: f64 },

    /// Read bytes from an I2C device and print them as hex
    I2cRead {
        #[arg(value_parser = parse_address)]
        address: u16,
        len: usize,
        /// Bus number (default: the board's header bus)
        bus: Option<u32>,
    },

    /// Write hex bytes to an I2C device
    I2cWrite {
        #[arg(value_parser = parse_address)]
        address: u16,
        data: String,
        /// Bus number (default: the board's header bus)
        bus: Option<u32>,
    },
}

/// I2C address in decimal or `0x`-prefixed hex.
fn parse_address(text: &str) -> Result<u16, ParseIntError> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => text.parse(),
    }
}

fn run(adaptor: &Adaptor, command: Command) -> Result<()> {
    match command {
        Command::Read { pin } => {
            println!("{}", adaptor.digital_read(&pin)?);
        }
        Command::Write { pin, level } => adaptor.digital_write(&pin, level)?,
        Command::Pwm { pin, percent } => adaptor.pwm_write(&pin, percent)?,
        Command::Servo { pin, angle } => adaptor.servo_write(&pin, angle)?,
        Command::I2cRead { address, len, bus } => {
            let bus = bus.unwrap_or_else(|| adaptor.default_bus());
            let mut buffer = vec![0u8; len];
            let n = adaptor.get_connection(address, bus)?.read(&mut buffer)?;
            println!("{}", hex::encode(&buffer[..n]));
        }
        Command::I2cWrite { address, data, bus } => {
            let data = hex::decode(&data).context("data must be hex")?;
            let bus = bus.unwrap_or_else(|| adaptor.default_bus());
            let n = adaptor.get_connection(address, bus)?.write(&data)?;
            if n != data.len() {
                bail!("short write: {} of {} bytes", n, data.len());
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing::init_stderr();

    let mut adaptor = Adaptor::linux(Config::load()?);
    adaptor.connect()?;
    let result = run(&adaptor, cli.command);
    let finalized = adaptor.finalize();
    result?;
    finalized?;
    Ok(())
}
