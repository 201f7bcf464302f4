//! File-based locking for single-writer safety.
//!
//! fs2 advisory lock on "<log>.lock" next to the log file. A second writer
//! on the same file gets `AuditLogError::Locked` instead of blocking.
//! Lock is released on Drop.

use anyhow::Context;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{AuditLogError, Result};

pub const LOCK_SUFFIX: &str = ".lock";

pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").field("path", &self.path).finish()
    }
}

pub fn lock_file_path(log_path: &Path) -> PathBuf {
    let mut s = log_path.as_os_str().to_os_string();
    s.push(LOCK_SUFFIX);
    PathBuf::from(s)
}

fn open_lock_file(path: &Path) -> anyhow::Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("open lock file {}", path.display()))
}

/// Try to take the writer lock for `log_path`. Never blocks.
pub fn try_lock_writer(log_path: &Path) -> Result<LockGuard> {
    let path = lock_file_path(log_path);
    let file = open_lock_file(&path).map_err(AuditLogError::storage)?;
    if file.try_lock_exclusive().is_err() {
        return Err(AuditLogError::Locked(path.display().to_string()));
    }
    Ok(LockGuard { file, path })
}

/// Blocking variant (CLI tools that prefer to wait for the writer).
pub fn lock_writer(log_path: &Path) -> Result<LockGuard> {
    let path = lock_file_path(log_path);
    let file = open_lock_file(&path).map_err(AuditLogError::storage)?;
    file.lock_exclusive()
        .with_context(|| format!("lock_exclusive {}", path.display()))
        .map_err(AuditLogError::storage)?;
    Ok(LockGuard { file, path })
}
