use anyhow::{Context, Result};
use tokio::signal::unix::{self, SignalKind};

use tinkerboard::config::{Config, OutputConfig, OutputKind};
use tinkerboard::hw_trait::{DigitalWriter, Lifecycle, PwmWriter, ServoWriter};
use tinkerboard::tracing::{self, prelude::*};
use tinkerboard::Adaptor;

fn apply(adaptor: &Adaptor, output: &OutputConfig) -> tinkerboard::Result<()> {
    match output.kind {
        OutputKind::Digital => {
            let level = if output.value != 0.0 { 1 } else { 0 };
            adaptor.digital_write(&output.pin, level)
        }
        OutputKind::Pwm => adaptor.pwm_write(&output.pin, output.value),
        OutputKind::Servo => adaptor.servo_write(&output.pin, output.value),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing::init_journald_or_stdout();

    let config = Config::load().context("loading configuration")?;
    let mut adaptor = Adaptor::linux(config);
    adaptor.connect()?;

    let outputs = adaptor.config().outputs.clone();
    for output in &outputs {
        match apply(&adaptor, output) {
            Ok(()) => info!("Set {:?} pin {} to {}.", output.kind, output.pin, output.value),
            Err(e) => error!("Failed to set {:?} pin {}: {}", output.kind, output.pin, e),
        }
    }
    info!("Started.");

    let mut sigint = unix::signal(SignalKind::interrupt())?;
    let mut sigterm = unix::signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }

    trace!("Shutting down.");
    adaptor.finalize().context("releasing board resources")?;
    info!("Exiting.");
    Ok(())
}
