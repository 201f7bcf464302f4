//! reader — чтение событий из журнала.
//!
//! Строки подписи пропускаются, колонки HMAC/SIGNATURE отрезаются. Файл без
//! колонок цепочки (PlainCsvLog) читается как есть. Целостность здесь не
//! проверяется: для этого есть ChainVerifier.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{AuditLogError, Result};
use crate::format::{CsvFormat, Record, RecordFormatter, HEADER_HMAC, HEADER_SIGNATURE};

/// Заголовок (без колонок цепочки) и строки данных.
pub fn read_events(path: &Path, format: CsvFormat) -> Result<(Vec<String>, Vec<Record>)> {
    let file = File::open(path)?;
    let mut rdr = RecordFormatter::new(format).reader(BufReader::new(file));
    let mut rows = rdr.records();

    let header: Vec<String> = match rows.next() {
        None => return Ok((Vec::new(), Vec::new())),
        Some(h) => h?.iter().map(|s| s.to_string()).collect(),
    };
    let n = header.len();
    let secure = n >= 2 && header[n - 2] == HEADER_HMAC && header[n - 1] == HEADER_SIGNATURE;
    let columns: Vec<String> = if secure {
        header[..n - 2].to_vec()
    } else {
        header
    };

    let mut events = Vec::new();
    for (i, row) in rows.enumerate() {
        let row = row?;
        if row.len() != n {
            return Err(AuditLogError::Format(format!(
                "row {}: expected {} cells, found {}",
                i + 2,
                n,
                row.len()
            )));
        }
        if secure && !row[n - 1].is_empty() {
            continue;
        }
        events.push(
            columns
                .iter()
                .zip(row.iter())
                .map(|(c, v)| (c.as_str(), v))
                .collect::<Record>(),
        );
    }
    Ok((columns, events))
}
