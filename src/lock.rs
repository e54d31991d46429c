use crate::error::{CatrunError, Result};
use jiff::Zoned;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Filesystem lock that serializes runs against one workspace.
///
/// The scheduler can fire a new run while a previous one is still waiting on
/// the categorizer API; without exclusion both would race on the shared Git
/// state. The lock file is created with `create_new` (O_EXCL), so exactly one
/// run wins. A lock left behind by a crashed run is taken over once it is
/// older than `stale_after_secs`.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    released: bool,
}

impl RunLock {
    pub fn acquire(path: &Path, stale_after_secs: u64) -> Result<Self> {
        // Two attempts: the second one only after removing a stale lock.
        for attempt in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    let stamp =
                        format!("pid={} started={}\n", std::process::id(), Zoned::now());
                    file.write_all(stamp.as_bytes())?;
                    tracing::debug!(path = %path.display(), "run lock acquired");
                    return Ok(Self {
                        path: path.to_path_buf(),
                        released: false,
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if attempt == 0 && Self::is_stale(path, stale_after_secs) {
                        tracing::warn!(path = %path.display(), "removing stale run lock");
                        match fs::remove_file(path) {
                            Ok(()) => continue,
                            // The competing run beat us to it; fall through to LockHeld.
                            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                            Err(e) => return Err(e.into()),
                        }
                    }
                    return Err(CatrunError::LockHeld(format!(
                        "'{}' exists; another run appears to be in progress",
                        path.display()
                    )));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(CatrunError::LockHeld(format!(
            "'{}' could not be acquired",
            path.display()
        )))
    }

    fn is_stale(path: &Path, stale_after_secs: u64) -> bool {
        if stale_after_secs == 0 {
            return false;
        }
        let Ok(metadata) = fs::metadata(path) else {
            return false;
        };
        let Ok(modified) = metadata.modified() else {
            return false;
        };
        Self::age_exceeds(modified, SystemTime::now(), stale_after_secs)
    }

    fn age_exceeds(modified: SystemTime, now: SystemTime, stale_after_secs: u64) -> bool {
        match now.duration_since(modified) {
            Ok(age) => age.as_secs() > stale_after_secs,
            // Lock mtime in the future (clock skew): treat as fresh.
            Err(_) => false,
        }
    }

    /// Remove the lock file. Prefer this over relying on Drop so removal
    /// failures surface as errors.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        fs::remove_file(&self.path)?;
        tracing::debug!(path = %self.path.display(), "run lock released");
        Ok(())
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = fs::remove_file(&self.path);
        }
    }
}
