//! Access to the kernel's sysfs attribute files.
//!
//! The GPIO and PWM managers never touch `std::fs` directly; they go through
//! the [`Filesystem`] trait so tests can substitute an in-memory one
//! (`mock::MockFilesystem`, built for tests or with the `mock` feature).
//! Attribute files already exist in sysfs, so writes never create files.

use crate::error::{Error, Result};
use crate::tracing::prelude::*;
use nix::errno::Errno;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Default mount point of sysfs.
pub const SYSFS_ROOT: &str = "/sys";

/// Read/write access to attribute files.
pub trait Filesystem: Send + Sync {
    /// Replace the contents of an existing attribute file.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Read the full contents of an attribute file.
    fn read(&self, path: &Path) -> io::Result<String>;
}

/// The real sysfs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysFs;

impl Filesystem for SysFs {
    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        // Each attribute must be written with a single write(2).
        let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
        file.write_all(contents.as_bytes())
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }
}

/// Write one attribute, attaching the path to any failure.
pub(crate) fn write_attr(fs: &dyn Filesystem, path: &Path, value: &str) -> Result<()> {
    trace!("{} <- {}", path.display(), value);
    fs.write(path, value).map_err(|e| Error::io(path, e))
}

/// Read one attribute with surrounding whitespace removed.
pub(crate) fn read_attr(fs: &dyn Filesystem, path: &Path) -> Result<String> {
    let value = fs.read(path).map_err(|e| Error::io(path, e))?;
    Ok(value.trim().to_string())
}

/// Write a line or channel number to an `export` file. The kernel answers
/// EBUSY when it is already exported, which is the state we want.
pub(crate) fn export(fs: &dyn Filesystem, path: &Path, index: u32) -> Result<()> {
    match fs.write(path, &index.to_string()) {
        Ok(()) => {
            debug!("Exported {} via {}", index, path.display());
            Ok(())
        }
        Err(e) if e.raw_os_error() == Some(Errno::EBUSY as i32) => {
            debug!("{} already exported via {}", index, path.display());
            Ok(())
        }
        Err(e) => Err(Error::io(path, e)),
    }
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    //! In-memory filesystem for tests and dry runs.

    use super::Filesystem;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::io;
    use std::path::{Path, PathBuf};

    #[derive(Debug, Default, Clone)]
    struct MockFile {
        contents: String,
        writes: usize,
    }

    /// A fixed set of files; reading or writing anything else fails with
    /// `NotFound`, like a sysfs attribute that was never exported.
    #[derive(Debug, Default)]
    pub struct MockFilesystem {
        files: Mutex<HashMap<PathBuf, MockFile>>,
        failing: Mutex<HashSet<PathBuf>>,
    }

    impl MockFilesystem {
        pub fn new<I, P>(paths: I) -> Self
        where
            I: IntoIterator<Item = P>,
            P: Into<PathBuf>,
        {
            let files = paths
                .into_iter()
                .map(|p| (p.into(), MockFile::default()))
                .collect();
            Self {
                files: Mutex::new(files),
                failing: Mutex::default(),
            }
        }

        /// Current contents of `path`, if it exists.
        pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
            self.files
                .lock()
                .get(path.as_ref())
                .map(|f| f.contents.clone())
        }

        /// Seed `path` without counting it as a write.
        pub fn set_contents(&self, path: impl AsRef<Path>, contents: &str) {
            if let Some(file) = self.files.lock().get_mut(path.as_ref()) {
                file.contents = contents.to_string();
            }
        }

        /// Number of successful writes to `path`.
        pub fn write_count(&self, path: impl AsRef<Path>) -> usize {
            self.files
                .lock()
                .get(path.as_ref())
                .map_or(0, |f| f.writes)
        }

        /// Make every later access to `path` fail until [`Self::heal`].
        pub fn fail(&self, path: impl Into<PathBuf>) {
            self.failing.lock().insert(path.into());
        }

        pub fn heal(&self, path: impl AsRef<Path>) {
            self.failing.lock().remove(path.as_ref());
        }

        fn check(&self, path: &Path) -> io::Result<()> {
            if self.failing.lock().contains(path) {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("injected failure on {}", path.display()),
                ));
            }
            Ok(())
        }

        fn not_found(path: &Path) -> io::Error {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: no such file", path.display()),
            )
        }
    }

    impl Filesystem for MockFilesystem {
        fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
            self.check(path)?;
            let mut files = self.files.lock();
            let file = files.get_mut(path).ok_or_else(|| Self::not_found(path))?;
            file.contents = contents.to_string();
            file.writes += 1;
            Ok(())
        }

        fn read(&self, path: &Path) -> io::Result<String> {
            self.check(path)?;
            self.files
                .lock()
                .get(path)
                .map(|f| f.contents.clone())
                .ok_or_else(|| Self::not_found(path))
        }
    }
}
