//! journal/backend — куда физически уходят строки журнала.
//!
//! LogBackend принимает уже отформатированные строки (с завершающим '\n').
//! Буферизации нет: строка уходит в файл сразу. Частично записанную строку
//! вызывающий откатывает через truncate(len до записи).

use anyhow::Context;
use log::trace;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{AuditLogError, Result};

pub trait LogBackend: Send {
    fn append_row(&mut self, line: &[u8]) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
    /// Отрезать всё после `len` (откат строки, которая не записалась целиком).
    fn truncate(&mut self, len: u64) -> Result<()>;
    /// Текущий размер в байтах (включая ранее записанное содержимое).
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Дописывает строки в файл (O_APPEND), опционально fsync на flush.
pub struct FileBackend {
    path: PathBuf,
    out: Option<File>,
    len: u64,
    fsync: bool,
}

impl FileBackend {
    pub fn open(path: &Path, fsync: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file {}", path.display()))
            .map_err(into_io)?;
        let len = file.metadata()?.len();
        trace!("backend opened {} (len={})", path.display(), len);
        Ok(Self {
            path: path.to_path_buf(),
            out: Some(file),
            len,
            fsync,
        })
    }

    fn out(&mut self) -> Result<&mut File> {
        self.out.as_mut().ok_or(AuditLogError::Closed)
    }
}

impl LogBackend for FileBackend {
    fn append_row(&mut self, line: &[u8]) -> Result<()> {
        self.out()?.write_all(line)?;
        self.len += line.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let fsync = self.fsync;
        let out = self.out()?;
        out.flush()?;
        if fsync {
            out.sync_data()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut out) = self.out.take() {
            out.flush()?;
            if self.fsync {
                out.sync_all()?;
            }
        }
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        let path = self.path.clone();
        let out = self.out()?;
        out.set_len(len)
            .with_context(|| format!("truncate {} to {} bytes", path.display(), len))
            .map_err(into_io)?;
        out.sync_data()?;
        self.len = len;
        trace!("{} rolled back to {} bytes", path.display(), len);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.len
    }
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Буфер в памяти; содержимое доступно через общий handle.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    buf: Arc<Mutex<Vec<u8>>>,
    closed: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.buf.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

impl LogBackend for MemoryBackend {
    fn append_row(&mut self, line: &[u8]) -> Result<()> {
        if self.closed {
            return Err(AuditLogError::Closed);
        }
        let mut buf = self
            .buf
            .lock()
            .map_err(|_| AuditLogError::Io(std::io::Error::other("buffer mutex poisoned")))?;
        buf.extend_from_slice(line);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        let mut buf = self
            .buf
            .lock()
            .map_err(|_| AuditLogError::Io(std::io::Error::other("buffer mutex poisoned")))?;
        buf.truncate(len as usize);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.buf.lock().map(|b| b.len() as u64).unwrap_or(0)
    }
}

fn into_io(e: anyhow::Error) -> AuditLogError {
    AuditLogError::Io(std::io::Error::other(format!("{:#}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_drops_partial_row_and_appends_continue() {
        let dir = std::env::temp_dir().join(format!(
            "chainlog-backend-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("t.csv");

        let mut b = FileBackend::open(&path, true).unwrap();
        b.append_row(b"\"a\"\n").unwrap();
        let before = b.len();
        b.append_row(b"\"par").unwrap();
        b.truncate(before).unwrap();
        assert_eq!(b.len(), before);
        b.append_row(b"\"b\"\n").unwrap();
        b.close().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"\"a\"\n\"b\"\n");

        let mut m = MemoryBackend::new();
        m.append_row(b"xy").unwrap();
        m.truncate(1).unwrap();
        assert_eq!(m.contents(), b"x");
    }
}
