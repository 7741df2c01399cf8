use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::errors::AppError;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A lock file older than this is considered abandoned whatever its owner.
pub const STALE_AFTER: Duration = Duration::from_secs(60);

/// Exclusive cross-process writer lock, held as a `<ledger>.lock` sidecar file
/// containing the owner's pid. The file is removed when the guard is dropped.
/// A lock whose owner process is gone, or that is older than [`STALE_AFTER`],
/// is taken over.
#[derive(Debug)]
pub struct LedgerLock {
    lock_path: PathBuf,
}

impl LedgerLock {
    pub fn acquire(ledger_path: &Path, timeout: Duration) -> Result<Self, AppError> {
        let lock_path = lock_path_for(ledger_path);
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let started = Instant::now();

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
                Ok(mut file) => {
                    writeln!(file, "{}", std::process::id())?;
                    file.sync_all()?;
                    debug!("Acquired ledger lock {}", lock_path.display());
                    return Ok(Self { lock_path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if break_if_stale(&lock_path)? {
                        continue;
                    }
                    if started.elapsed() >= timeout {
                        warn!(
                            "Timed out after {:?} waiting for ledger lock {}",
                            timeout,
                            lock_path.display()
                        );
                        return Err(AppError::LedgerLocked(ledger_path.to_path_buf()));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(AppError::Io(e)),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            warn!("Failed to release ledger lock {}: {}", self.lock_path.display(), e);
        }
    }
}

/// Removes the lock file when its owner is dead or it has outlived
/// [`STALE_AFTER`]. Returns true when the caller should retry at once.
fn break_if_stale(lock_path: &Path) -> Result<bool, AppError> {
    let contents = match fs::read_to_string(lock_path) {
        Ok(c) => c,
        // Released between our create and read
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(AppError::Io(e)),
    };
    let age = fs::metadata(lock_path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.elapsed().ok())
        .unwrap_or_default();

    let owner = contents.trim().parse::<u32>().ok();
    let reason = match owner {
        Some(pid) if pid != std::process::id() && process_is_gone(pid) => format!("owner pid {} is not running", pid),
        // Owner still writing its pid
        None if contents.is_empty() && age < POLL_INTERVAL * 4 => return Ok(false),
        _ if age > STALE_AFTER => format!("held for {:?}", age),
        _ => return Ok(false),
    };

    // Only remove the file we inspected, not a fresh lock from another taker
    match fs::read_to_string(lock_path) {
        Ok(again) if again == contents => {}
        Ok(_) => return Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(AppError::Io(e)),
    }
    warn!("Taking over stale ledger lock {} ({})", lock_path.display(), reason);
    match fs::remove_file(lock_path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
        Err(e) => Err(AppError::Io(e)),
    }
}

/// Liveness via procfs. Where procfs is unavailable only the age check applies.
fn process_is_gone(pid: u32) -> bool {
    let proc_root = Path::new("/proc");
    proc_root.join("self").exists() && !proc_root.join(pid.to_string()).exists()
}

pub(crate) fn lock_path_for(ledger_path: &Path) -> PathBuf {
    sibling_with_suffix(ledger_path, ".lock")
}

pub(crate) fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "ledger.json".into());
    name.push(suffix);
    path.with_file_name(name)
}
