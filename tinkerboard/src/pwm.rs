//! PWM and servo output through the sysfs PWM interface.
//!
//! The kernel takes `period` and `duty_cycle` as independent nanosecond
//! counts, so every request is converted to an absolute duty cycle against
//! the board's fixed period. Conversions round to the nearest nanosecond;
//! the same request always writes the same bytes.
//!
//! Handles are keyed by `(chip, channel)`: a header pin and its `PWMn` alias
//! drive the same channel and share one handle.

use crate::error::{Error, Result};
use crate::pins::{self, PwmPinSpec};
use crate::sysfs::{self, Filesystem};
use crate::tracing::prelude::*;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strum::AsRefStr;

/// Period used when nothing else is configured: 10 ms, 100 Hz.
pub const DEFAULT_PERIOD_NS: u32 = 10_000_000;

/// Servo pulse width at 0 degrees.
pub const SERVO_MIN_DUTY_NS: u32 = 500_000;

/// Servo pulse width at 180 degrees.
pub const SERVO_MAX_DUTY_NS: u32 = 2_000_000;

pub const SERVO_MAX_ANGLE: f64 = 180.0;

/// Values accepted by a channel's `polarity` attribute. Outputs are always
/// driven `Normal`; `Inversed` is the kernel's only other setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Polarity {
    Normal,
    Inversed,
}

/// Duty cycle in nanoseconds for `percent` of `period_ns`.
pub fn percent_to_duty(percent: f64, period_ns: u32) -> Result<u32> {
    if !(0.0..=100.0).contains(&percent) {
        return Err(Error::range("duty cycle percent", percent, 0.0, 100.0));
    }
    Ok((percent / 100.0 * f64::from(period_ns)).round() as u32)
}

/// Servo pulse width in nanoseconds for `angle` degrees.
pub fn angle_to_duty(angle: f64) -> Result<u32> {
    if !(0.0..=SERVO_MAX_ANGLE).contains(&angle) {
        return Err(Error::range("servo angle", angle, 0.0, SERVO_MAX_ANGLE));
    }
    let span = f64::from(SERVO_MAX_DUTY_NS - SERVO_MIN_DUTY_NS);
    Ok((f64::from(SERVO_MIN_DUTY_NS) + angle / SERVO_MAX_ANGLE * span).round() as u32)
}

/// Runtime state of one PWM channel. `None` fields have not been written
/// successfully since export.
#[derive(Debug)]
pub struct PwmPinHandle {
    chip: u32,
    channel: u32,
    exported: bool,
    enabled: bool,
    period: Option<u32>,
    duty_cycle: Option<u32>,
    polarity: Option<Polarity>,
}

impl PwmPinHandle {
    fn new(spec: &PwmPinSpec) -> Self {
        Self {
            chip: spec.chip,
            channel: spec.channel,
            exported: false,
            enabled: false,
            period: None,
            duty_cycle: None,
            polarity: None,
        }
    }
}

/// Owner of every exported PWM channel.
pub struct PwmPins {
    fs: Arc<dyn Filesystem>,
    class_dir: PathBuf,
    period_ns: u32,
    channels: Mutex<HashMap<(u32, u32), Arc<Mutex<PwmPinHandle>>>>,
}

impl PwmPins {
    pub fn new(fs: Arc<dyn Filesystem>, sysfs_root: &Path, period_ns: u32) -> Self {
        Self {
            fs,
            class_dir: sysfs_root.join("class/pwm"),
            period_ns,
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn period_ns(&self) -> u32 {
        self.period_ns
    }

    /// Output `percent` (0 to 100) duty cycle on `name`.
    pub fn write(&self, name: &str, percent: f64) -> Result<()> {
        let duty = percent_to_duty(percent, self.period_ns)?;
        self.drive(name, duty)
    }

    /// Position a servo on `name` at `angle` degrees (0 to 180).
    pub fn servo_write(&self, name: &str, angle: f64) -> Result<()> {
        let duty = angle_to_duty(angle)?;
        if duty > self.period_ns {
            return Err(Error::range(
                "servo pulse width (ns)",
                duty.into(),
                0.0,
                self.period_ns.into(),
            ));
        }
        self.drive(name, duty)
    }

    /// Disable and unexport the channel behind `name`.
    pub fn release(&self, name: &str) -> Result<()> {
        let spec = pins::pwm_channel(name)?;
        let handle = self.channels.lock().remove(&(spec.chip, spec.channel));
        match handle {
            Some(handle) => self.unexport(&mut handle.lock()),
            None => Ok(()),
        }
    }

    /// Disable and unexport every channel. Keeps going after a failure and
    /// returns the first one.
    pub fn release_all(&self) -> Result<()> {
        let drained: Vec<_> = self.channels.lock().drain().collect();
        let mut first = None;
        for ((chip, channel), handle) in drained {
            if let Err(e) = self.unexport(&mut handle.lock()) {
                warn!("Failed to release pwmchip{} channel {}: {}", chip, channel, e);
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Last duty cycle written to the channel behind `name`, in nanoseconds.
    pub fn duty_cycle(&self, name: &str) -> Result<Option<u32>> {
        let spec = pins::pwm_channel(name)?;
        let channels = self.channels.lock();
        Ok(channels
            .get(&(spec.chip, spec.channel))
            .and_then(|handle| handle.lock().duty_cycle))
    }

    /// Number of channels with live handles.
    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn drive(&self, name: &str, duty: u32) -> Result<()> {
        let spec = pins::pwm_channel(name)?;
        let handle = {
            let mut channels = self.channels.lock();
            let handle = channels
                .entry((spec.chip, spec.channel))
                .or_insert_with(|| Arc::new(Mutex::new(PwmPinHandle::new(spec))));
            Arc::clone(handle)
        };
        let mut pwm = handle.lock();

        if !pwm.exported {
            let path = self.chip_dir(pwm.chip).join("export");
            sysfs::export(&*self.fs, &path, pwm.channel)?;
            pwm.exported = true;
        }
        // Polarity can only change while the channel is disabled.
        if pwm.polarity != Some(Polarity::Normal) {
            pwm.polarity = None;
            self.set(&pwm, "polarity", Polarity::Normal.as_ref())?;
            pwm.polarity = Some(Polarity::Normal);
        }
        if pwm.period != Some(self.period_ns) {
            pwm.period = None;
            self.set(&pwm, "period", &self.period_ns.to_string())?;
            pwm.period = Some(self.period_ns);
        }
        pwm.duty_cycle = None;
        self.set(&pwm, "duty_cycle", &duty.to_string())?;
        pwm.duty_cycle = Some(duty);
        if !pwm.enabled {
            self.set(&pwm, "enable", "1")?;
            pwm.enabled = true;
        }
        Ok(())
    }

    fn unexport(&self, pwm: &mut PwmPinHandle) -> Result<()> {
        if !pwm.exported {
            return Ok(());
        }
        // Unexport even if disabling fails; the first error still wins.
        let disabled = if pwm.enabled {
            self.set(pwm, "enable", "0")
        } else {
            Ok(())
        };
        pwm.enabled = false;
        let path = self.chip_dir(pwm.chip).join("unexport");
        let unexported = sysfs::write_attr(&*self.fs, &path, &pwm.channel.to_string());
        if unexported.is_ok() {
            debug!("Unexported pwmchip{} channel {}", pwm.chip, pwm.channel);
        }
        disabled.and(unexported)
    }

    fn set(&self, pwm: &PwmPinHandle, attr: &str, value: &str) -> Result<()> {
        let path = self
            .chip_dir(pwm.chip)
            .join(format!("pwm{}", pwm.channel))
            .join(attr);
        sysfs::write_attr(&*self.fs, &path, value)
    }

    fn chip_dir(&self, chip: u32) -> PathBuf {
        self.class_dir.join(format!("pwmchip{}", chip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::mock::MockFilesystem;
    use crate::sysfs::SYSFS_ROOT;
    use test_case::test_case;

    fn pwm_files(chip: u32) -> Vec<String> {
        let dir = format!("/sys/class/pwm/pwmchip{}", chip);
        let mut files = vec![format!("{}/export", dir), format!("{}/unexport", dir)];
        for attr in ["enable", "period", "duty_cycle", "polarity"] {
            files.push(format!("{}/pwm0/{}", dir, attr));
        }
        files
    }

    fn setup(chips: &[u32]) -> (Arc<MockFilesystem>, PwmPins) {
        let files: Vec<String> = chips.iter().flat_map(|c| pwm_files(*c)).collect();
        let fs = Arc::new(MockFilesystem::new(files));
        let pwm = PwmPins::new(fs.clone(), Path::new(SYSFS_ROOT), DEFAULT_PERIOD_NS);
        (fs, pwm)
    }

    const CHIP0: &str = "/sys/class/pwm/pwmchip0";

    #[test_case(Polarity::Normal, "normal")]
    #[test_case(Polarity::Inversed, "inversed")]
    fn test_polarity_attribute_value(polarity: Polarity, value: &str) {
        assert_eq!(polarity.as_ref(), value);
    }

    fn attr(fs: &MockFilesystem, name: &str) -> Option<String> {
        fs.contents(format!("{}/{}", CHIP0, name))
    }

    #[test_case(0.0, 0)]
    #[test_case(50.0, 5_000_000)]
    #[test_case(100.0, 10_000_000)]
    #[test_case(39.2156862745, 3_921_569 ; "rounds to nearest")]
    #[test_case(0.000004, 0 ; "rounds down below half")]
    fn test_percent_to_duty(percent: f64, expected: u32) {
        assert_eq!(percent_to_duty(percent, DEFAULT_PERIOD_NS).unwrap(), expected);
    }

    #[test_case(-0.1)]
    #[test_case(100.5)]
    #[test_case(f64::NAN)]
    #[test_case(f64::INFINITY)]
    fn test_percent_out_of_range(percent: f64) {
        assert!(matches!(
            percent_to_duty(percent, DEFAULT_PERIOD_NS),
            Err(Error::Range { .. })
        ));
    }

    #[test_case(0.0, 500_000)]
    #[test_case(90.0, 1_250_000)]
    #[test_case(180.0, 2_000_000)]
    #[test_case(1.0, 508_333 ; "one degree")]
    fn test_angle_to_duty(angle: f64, expected: u32) {
        assert_eq!(angle_to_duty(angle).unwrap(), expected);
    }

    #[test]
    fn test_angle_to_duty_is_monotonic() {
        let mut last = 0;
        for angle in 0..=180 {
            let duty = angle_to_duty(angle as f64).unwrap();
            assert!(duty > last || angle == 0, "angle {}", angle);
            last = duty;
        }
    }

    #[test_case(-1.0)]
    #[test_case(180.1)]
    #[test_case(f64::NAN)]
    fn test_angle_out_of_range(angle: f64) {
        assert!(matches!(angle_to_duty(angle), Err(Error::Range { .. })));
    }

    #[test]
    fn test_write_fresh_channel() {
        let (fs, pwm) = setup(&[0]);
        pwm.write("PWM0", 100.0).unwrap();
        assert_eq!(fs.contents(format!("{}/export", CHIP0)).as_deref(), Some("0"));
        assert_eq!(attr(&fs, "pwm0/enable").as_deref(), Some("1"));
        assert_eq!(attr(&fs, "pwm0/period").as_deref(), Some("10000000"));
        assert_eq!(attr(&fs, "pwm0/duty_cycle").as_deref(), Some("10000000"));
        assert_eq!(attr(&fs, "pwm0/polarity").as_deref(), Some("normal"));
    }

    #[test]
    fn test_servo_endpoints() {
        let (fs, pwm) = setup(&[0]);
        pwm.servo_write("PWM0", 0.0).unwrap();
        assert_eq!(attr(&fs, "pwm0/duty_cycle").as_deref(), Some("500000"));
        pwm.servo_write("PWM0", 180.0).unwrap();
        assert_eq!(attr(&fs, "pwm0/duty_cycle").as_deref(), Some("2000000"));
        assert_eq!(attr(&fs, "pwm0/period").as_deref(), Some("10000000"));
    }

    #[test]
    fn test_configuration_written_once() {
        let (fs, pwm) = setup(&[0]);
        pwm.write("PWM0", 25.0).unwrap();
        pwm.write("PWM0", 25.0).unwrap();
        pwm.servo_write("PWM0", 45.0).unwrap();
        assert_eq!(fs.write_count(format!("{}/export", CHIP0)), 1);
        assert_eq!(fs.write_count(format!("{}/pwm0/enable", CHIP0)), 1);
        assert_eq!(fs.write_count(format!("{}/pwm0/period", CHIP0)), 1);
        assert_eq!(fs.write_count(format!("{}/pwm0/polarity", CHIP0)), 1);
        assert_eq!(fs.write_count(format!("{}/pwm0/duty_cycle", CHIP0)), 3);
    }

    #[test]
    fn test_aliases_share_handle() {
        let (fs, pwm) = setup(&[2]);
        pwm.write("33", 10.0).unwrap();
        pwm.write("PWM2", 20.0).unwrap();
        assert_eq!(pwm.len(), 1);
        assert_eq!(pwm.duty_cycle("33").unwrap(), Some(2_000_000));
        assert_eq!(fs.write_count("/sys/class/pwm/pwmchip2/export"), 1);
        assert_eq!(
            fs.contents("/sys/class/pwm/pwmchip2/pwm0/duty_cycle").as_deref(),
            Some("2000000")
        );
    }

    #[test]
    fn test_invalid_pin() {
        let (_, pwm) = setup(&[0]);
        assert!(matches!(pwm.write("666", 42.0), Err(Error::InvalidPin(_))));
        assert!(matches!(pwm.servo_write("666", 120.0), Err(Error::InvalidPin(_))));
        assert!(pwm.is_empty());
    }

    #[test]
    fn test_range_checked_before_io() {
        let (fs, pwm) = setup(&[0]);
        assert!(matches!(pwm.write("PWM0", 101.0), Err(Error::Range { .. })));
        assert!(matches!(pwm.servo_write("PWM0", 200.0), Err(Error::Range { .. })));
        assert_eq!(fs.write_count(format!("{}/export", CHIP0)), 0);
    }

    #[test]
    fn test_servo_pulse_longer_than_period() {
        let fs = Arc::new(MockFilesystem::new(pwm_files(0)));
        let pwm = PwmPins::new(fs.clone(), Path::new(SYSFS_ROOT), 1_000_000);
        assert!(matches!(pwm.servo_write("PWM0", 180.0), Err(Error::Range { .. })));
        pwm.servo_write("PWM0", 0.0).unwrap();
        assert_eq!(attr(&fs, "pwm0/duty_cycle").as_deref(), Some("500000"));
    }

    #[test]
    fn test_failed_period_is_retried() {
        let (fs, pwm) = setup(&[0]);
        fs.fail(format!("{}/pwm0/period", CHIP0));
        assert!(matches!(pwm.write("PWM0", 50.0), Err(Error::Io { .. })));
        assert_eq!(attr(&fs, "pwm0/enable").as_deref(), Some(""));

        fs.heal(format!("{}/pwm0/period", CHIP0));
        pwm.write("PWM0", 50.0).unwrap();
        assert_eq!(fs.write_count(format!("{}/export", CHIP0)), 1);
        assert_eq!(fs.write_count(format!("{}/pwm0/polarity", CHIP0)), 1);
        assert_eq!(attr(&fs, "pwm0/period").as_deref(), Some("10000000"));
        assert_eq!(attr(&fs, "pwm0/enable").as_deref(), Some("1"));
    }

    #[test]
    fn test_release_disables_then_unexports() {
        let (fs, pwm) = setup(&[0]);
        pwm.write("PWM0", 50.0).unwrap();
        pwm.release("PWM0").unwrap();
        assert_eq!(attr(&fs, "pwm0/enable").as_deref(), Some("0"));
        assert_eq!(fs.contents(format!("{}/unexport", CHIP0)).as_deref(), Some("0"));
        assert!(pwm.is_empty());
    }

    #[test]
    fn test_release_all_unexports_despite_disable_failure() {
        let (fs, pwm) = setup(&[0, 2]);
        pwm.write("PWM0", 50.0).unwrap();
        pwm.write("PWM2", 50.0).unwrap();
        fs.fail(format!("{}/pwm0/enable", CHIP0));
        assert!(matches!(pwm.release_all(), Err(Error::Io { .. })));
        assert_eq!(fs.write_count(format!("{}/unexport", CHIP0)), 1);
        assert_eq!(fs.write_count("/sys/class/pwm/pwmchip2/unexport"), 1);
        assert!(pwm.is_empty());
    }
}
