//! journal/plain — PlainCsvLog: заголовок + строки, без HMAC/SIGNATURE.

use log::debug;
use std::path::Path;

use super::backend::{FileBackend, LogBackend};
use crate::config::ChainLogConfig;
use crate::error::{AuditLogError, Result};
use crate::format::{CsvFormat, Record, RecordFormatter};
use crate::metrics;
use crate::verify::read_header;

pub struct PlainCsvLog<B: LogBackend> {
    backend: B,
    columns: Vec<String>,
    formatter: RecordFormatter,
    closed: bool,
}

impl PlainCsvLog<FileBackend> {
    /// Открыть файл; существующий заголовок обязан совпадать с `columns`.
    pub fn open(path: &Path, columns: Vec<String>, config: &ChainLogConfig) -> Result<Self> {
        let format = config.csv_format();
        if std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false) {
            let found = read_header(path, format)?;
            if found != columns {
                return Err(AuditLogError::Format(format!(
                    "header of {} does not match: expected {:?}, found {:?}",
                    path.display(),
                    columns,
                    found
                )));
            }
        }
        let backend = FileBackend::open(path, config.fsync)?;
        Self::with_backend(backend, columns, format)
    }
}

impl<B: LogBackend> PlainCsvLog<B> {
    /// Пустой backend получает строку заголовка.
    pub fn with_backend(mut backend: B, columns: Vec<String>, format: CsvFormat) -> Result<Self> {
        if columns.is_empty() {
            return Err(AuditLogError::Format("header must have at least one column".into()));
        }
        let formatter = RecordFormatter::new(format);
        if backend.is_empty() {
            let line = formatter.format_header(&columns)?;
            backend.append_row(&line)?;
            backend.flush()?;
            debug!("plain log header written ({} columns)", columns.len());
        }
        Ok(Self {
            backend,
            columns,
            formatter,
            closed: false,
        })
    }

    pub fn append(&mut self, record: &Record) -> Result<()> {
        if self.closed {
            return Err(AuditLogError::Closed);
        }
        let line = self.formatter.format_row(record, &self.columns)?;
        self.backend.append_row(&line)?;
        self.backend.flush()?;
        metrics::record_append(line.len());
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.backend.flush()
    }

    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.backend.flush()?;
        self.backend.close()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::backend::MemoryBackend;

    #[test]
    fn plain_rows_have_no_chain_columns() {
        let mem = MemoryBackend::new();
        let mut log = PlainCsvLog::with_backend(
            mem.clone(),
            vec!["id".into(), "action".into()],
            CsvFormat::default(),
        )
        .unwrap();
        log.append(&Record::new().with("id", "1").with("action", "login")).unwrap();
        log.append(&Record::new().with("id", "2")).unwrap();
        log.close().unwrap();
        assert!(log.append(&Record::new()).is_err());

        let text = String::from_utf8(mem.contents()).unwrap();
        assert_eq!(text, "\"id\",\"action\"\n\"1\",\"login\"\n\"2\",\"\"\n");
    }
}
