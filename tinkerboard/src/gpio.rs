//! Digital I/O through the sysfs GPIO interface.
//!
//! A line is exported the first time its logical pin is used and stays
//! exported until [`DigitalPins::release`] or [`DigitalPins::release_all`].
//! The export and direction state is tracked in the handle, never re-read
//! from sysfs.

use crate::error::{Error, Result};
use crate::pins;
use crate::sysfs::{self, Filesystem};
use crate::tracing::prelude::*;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strum::AsRefStr;

/// Line direction as written to the `direction` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

/// Runtime state of one logical pin.
#[derive(Debug)]
pub struct DigitalPinHandle {
    line: u32,
    exported: bool,
    /// `None` until a direction write has succeeded.
    direction: Option<Direction>,
}

impl DigitalPinHandle {
    fn new(line: u32) -> Self {
        Self {
            line,
            exported: false,
            direction: None,
        }
    }
}

/// Owner of every exported GPIO line.
pub struct DigitalPins {
    fs: Arc<dyn Filesystem>,
    class_dir: PathBuf,
    pins: Mutex<HashMap<String, Arc<Mutex<DigitalPinHandle>>>>,
}

impl DigitalPins {
    pub fn new(fs: Arc<dyn Filesystem>, sysfs_root: &Path) -> Self {
        Self {
            fs,
            class_dir: sysfs_root.join("class/gpio"),
            pins: Mutex::new(HashMap::new()),
        }
    }

    /// Drive `name` to `level` (0 or 1), configuring it as an output.
    pub fn write(&self, name: &str, level: u8) -> Result<()> {
        if level > 1 {
            return Err(Error::range("digital level", level.into(), 0.0, 1.0));
        }
        let handle = self.handle(name)?;
        let mut pin = handle.lock();
        self.prepare(&mut pin, Direction::Out)?;
        let value = if level == 1 { "1" } else { "0" };
        sysfs::write_attr(&*self.fs, &self.line_attr(pin.line, "value"), value)
    }

    /// Sample `name`, configuring it as an input.
    pub fn read(&self, name: &str) -> Result<u8> {
        let handle = self.handle(name)?;
        let mut pin = handle.lock();
        self.prepare(&mut pin, Direction::In)?;
        let path = self.line_attr(pin.line, "value");
        let value = sysfs::read_attr(&*self.fs, &path)?;
        value.parse().map_err(|_| {
            Error::io(
                &path,
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unexpected GPIO value {:?}", value),
                ),
            )
        })
    }

    /// Unexport one pin and forget its state.
    pub fn release(&self, name: &str) -> Result<()> {
        let handle = self.pins.lock().remove(name);
        match handle {
            Some(handle) => self.unexport(&handle.lock()),
            None => Ok(()),
        }
    }

    /// Unexport every pin. Keeps going after a failure and returns the
    /// first one.
    pub fn release_all(&self) -> Result<()> {
        let drained: Vec<_> = self.pins.lock().drain().collect();
        let mut first = None;
        for (name, handle) in drained {
            if let Err(e) = self.unexport(&handle.lock()) {
                warn!("Failed to release GPIO pin {}: {}", name, e);
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Number of pins with live handles.
    pub fn len(&self) -> usize {
        self.pins.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn handle(&self, name: &str) -> Result<Arc<Mutex<DigitalPinHandle>>> {
        let spec = pins::gpio_line(name)?;
        let mut pins = self.pins.lock();
        let handle = pins
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(DigitalPinHandle::new(spec.line))));
        Ok(Arc::clone(handle))
    }

    fn prepare(&self, pin: &mut DigitalPinHandle, direction: Direction) -> Result<()> {
        if !pin.exported {
            sysfs::export(&*self.fs, &self.class_dir.join("export"), pin.line)?;
            pin.exported = true;
        }
        if pin.direction != Some(direction) {
            // Unknown until the kernel has accepted the new direction.
            pin.direction = None;
            let path = self.line_attr(pin.line, "direction");
            sysfs::write_attr(&*self.fs, &path, direction.as_ref())?;
            pin.direction = Some(direction);
        }
        Ok(())
    }

    fn unexport(&self, pin: &DigitalPinHandle) -> Result<()> {
        if !pin.exported {
            return Ok(());
        }
        let path = self.class_dir.join("unexport");
        sysfs::write_attr(&*self.fs, &path, &pin.line.to_string())?;
        debug!("Unexported GPIO line {}", pin.line);
        Ok(())
    }

    fn line_attr(&self, line: u32, attr: &str) -> PathBuf {
        self.class_dir.join(format!("gpio{}", line)).join(attr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::mock::MockFilesystem;
    use crate::sysfs::SYSFS_ROOT;
    use test_case::test_case;

    fn gpio_files(lines: &[u32]) -> Vec<String> {
        let mut files = vec![
            "/sys/class/gpio/export".to_string(),
            "/sys/class/gpio/unexport".to_string(),
        ];
        for line in lines {
            files.push(format!("/sys/class/gpio/gpio{}/value", line));
            files.push(format!("/sys/class/gpio/gpio{}/direction", line));
        }
        files
    }

    fn setup(lines: &[u32]) -> (Arc<MockFilesystem>, DigitalPins) {
        let fs = Arc::new(MockFilesystem::new(gpio_files(lines)));
        let pins = DigitalPins::new(fs.clone(), Path::new(SYSFS_ROOT));
        (fs, pins)
    }

    #[test]
    fn test_write_exports_and_sets_output() {
        let (fs, pins) = setup(&[17]);
        pins.write("7", 1).unwrap();
        assert_eq!(fs.contents("/sys/class/gpio/export").as_deref(), Some("17"));
        assert_eq!(fs.contents("/sys/class/gpio/gpio17/direction").as_deref(), Some("out"));
        assert_eq!(fs.contents("/sys/class/gpio/gpio17/value").as_deref(), Some("1"));

        pins.write("7", 0).unwrap();
        assert_eq!(fs.contents("/sys/class/gpio/gpio17/value").as_deref(), Some("0"));
    }

    #[test]
    fn test_every_known_pin_writes_through() {
        let lines: Vec<u32> = pins::GPIO_PINS.iter().map(|p| p.line).collect();
        let (fs, digital) = setup(&lines);
        for spec in pins::GPIO_PINS {
            let value = format!("/sys/class/gpio/gpio{}/value", spec.line);
            digital.write(spec.name, 1).unwrap();
            assert_eq!(fs.contents(&value).as_deref(), Some("1"), "pin {}", spec.name);
            digital.write(spec.name, 0).unwrap();
            assert_eq!(fs.contents(&value).as_deref(), Some("0"), "pin {}", spec.name);
        }
    }

    #[test]
    fn test_read_parses_value() {
        let (fs, pins) = setup(&[160]);
        fs.set_contents("/sys/class/gpio/gpio160/value", "1\n");
        assert_eq!(pins.read("10").unwrap(), 1);
        assert_eq!(fs.contents("/sys/class/gpio/gpio160/direction").as_deref(), Some("in"));
    }

    #[test]
    fn test_read_rejects_garbage() {
        let (fs, pins) = setup(&[160]);
        fs.set_contents("/sys/class/gpio/gpio160/value", "high");
        let err = pins.read("10").unwrap_err();
        assert!(matches!(err, Error::Io { source, .. } if source.kind() == io::ErrorKind::InvalidData));
    }

    #[test_case("99")]
    #[test_case("PWM0")]
    fn test_unknown_pin(name: &str) {
        let (_, pins) = setup(&[]);
        assert!(matches!(pins.write(name, 1), Err(Error::InvalidPin(_))));
        assert!(matches!(pins.read(name), Err(Error::InvalidPin(_))));
        assert!(pins.is_empty());
    }

    #[test]
    fn test_level_out_of_range() {
        let (fs, pins) = setup(&[17]);
        assert!(matches!(pins.write("7", 2), Err(Error::Range { .. })));
        assert_eq!(fs.write_count("/sys/class/gpio/export"), 0);
    }

    #[test]
    fn test_export_and_direction_written_once() {
        let (fs, pins) = setup(&[17]);
        for level in [1, 0, 1, 1] {
            pins.write("7", level).unwrap();
        }
        assert_eq!(fs.write_count("/sys/class/gpio/export"), 1);
        assert_eq!(fs.write_count("/sys/class/gpio/gpio17/direction"), 1);
        assert_eq!(fs.write_count("/sys/class/gpio/gpio17/value"), 4);
    }

    #[test]
    fn test_direction_switches_only_on_change() {
        let (fs, pins) = setup(&[17]);
        pins.write("7", 1).unwrap();
        pins.read("7").unwrap();
        pins.read("7").unwrap();
        pins.write("7", 0).unwrap();
        assert_eq!(fs.write_count("/sys/class/gpio/gpio17/direction"), 3);
        assert_eq!(fs.contents("/sys/class/gpio/gpio17/direction").as_deref(), Some("out"));
    }

    #[test]
    fn test_failed_direction_is_retried() {
        let (fs, pins) = setup(&[17]);
        fs.fail("/sys/class/gpio/gpio17/direction");
        assert!(matches!(pins.write("7", 1), Err(Error::Io { .. })));
        assert_eq!(fs.write_count("/sys/class/gpio/export"), 1);

        fs.heal("/sys/class/gpio/gpio17/direction");
        pins.write("7", 1).unwrap();
        // Still exported: only the direction is redone.
        assert_eq!(fs.write_count("/sys/class/gpio/export"), 1);
        assert_eq!(fs.contents("/sys/class/gpio/gpio17/direction").as_deref(), Some("out"));
        assert_eq!(fs.contents("/sys/class/gpio/gpio17/value").as_deref(), Some("1"));
    }

    #[test]
    fn test_release_unexports_one_pin() {
        let (fs, pins) = setup(&[17, 160]);
        pins.write("7", 1).unwrap();
        pins.write("10", 1).unwrap();
        pins.release("7").unwrap();
        assert_eq!(fs.contents("/sys/class/gpio/unexport").as_deref(), Some("17"));
        assert_eq!(pins.len(), 1);

        // Unused names release quietly.
        pins.release("7").unwrap();
        assert_eq!(fs.write_count("/sys/class/gpio/unexport"), 1);
    }

    #[test]
    fn test_release_all_continues_after_failure() {
        let (fs, pins) = setup(&[17, 160]);
        pins.write("7", 1).unwrap();
        pins.write("10", 0).unwrap();
        fs.fail("/sys/class/gpio/unexport");
        assert!(pins.release_all().is_err());
        assert!(pins.is_empty());

        fs.heal("/sys/class/gpio/unexport");
        pins.write("7", 1).unwrap();
        assert_eq!(fs.write_count("/sys/class/gpio/export"), 3);
        pins.release_all().unwrap();
        assert_eq!(fs.contents("/sys/class/gpio/unexport").as_deref(), Some("17"));
    }
}
