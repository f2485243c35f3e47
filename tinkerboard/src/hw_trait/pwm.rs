//! PWM and servo capabilities.

use crate::error::Result;

pub trait PwmWriter {
    /// Output a duty cycle of `percent` (0 to 100) on `pin`.
    fn pwm_write(&self, pin: &str, percent: f64) -> Result<()>;
}

pub trait ServoWriter {
    /// Move a hobby servo on `pin` to `angle` degrees (0 to 180).
    fn servo_write(&self, pin: &str, angle: f64) -> Result<()>;
}
