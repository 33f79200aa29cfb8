//! Advisory lock on `<config>.lock`, held across load, mutation and dump.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Waiting longer than this is logged once.
const CONTENTION_NOTICE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("timed out after {timeout:?} waiting for {}", path.display())]
    Timeout { path: PathBuf, timeout: Duration },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Held lock; closing the file releases it.
#[derive(Debug)]
pub struct ConfigLock {
    path: PathBuf,
    // never read, keeps the descriptor (and with it the flock) alive
    _file: File,
}

impl ConfigLock {
    /// Lock the document at `config_path`, which need not exist yet.
    pub fn acquire(config_path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = lock_path_for(config_path);
        let io_error = |path: &Path, source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        }

        let started = Instant::now();
        let mut noticed = false;
        let file = loop {
            if let Some(file) = try_lock(&path).map_err(|e| io_error(&path, e))? {
                break file;
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(LockError::Timeout { path, timeout });
            }
            if !noticed && waited >= CONTENTION_NOTICE {
                warn!("{} is held by another process, waiting", path.display());
                noticed = true;
            }
            thread::sleep(POLL_INTERVAL.min(timeout - waited));
        };

        debug!(
            "locked {} after {}ms",
            path.display(),
            started.elapsed().as_millis()
        );
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `config.yaml` -> `config.yaml.lock`
pub fn lock_path_for(config_path: &Path) -> PathBuf {
    let mut name: OsString = config_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// `Ok(None)` while someone else holds the lock.
#[cfg(unix)]
fn try_lock(path: &Path) -> io::Result<Option<File>> {
    use std::os::unix::io::AsRawFd;

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    // SAFETY: the descriptor belongs to `file`, which outlives the call.
    if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) } == 0 {
        return Ok(Some(file));
    }
    match io::Error::last_os_error() {
        e if e.raw_os_error() == Some(libc::EWOULDBLOCK) => Ok(None),
        e => Err(e),
    }
}

/// Without flock the lock file's existence is the lock.
#[cfg(not(unix))]
fn try_lock(path: &Path) -> io::Result<Option<File>> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
impl Drop for ConfigLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
