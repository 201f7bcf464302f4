//! format — Record и построчный CSV-формат журнала.
//!
//! Все поля всегда в кавычках; разделитель и кавычка настраиваются.
//! Экранирование делегировано crate `csv`, чтение использует те же
//! настройки, что и запись.
//!
//! HMAC считается по сырой конкатенации значений в порядке заголовка
//! (`hmac_input`), а не по отформатированной строке: смена экранирования
//! не ломает цепочку.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

use crate::error::{AuditLogError, Result};

pub const HEADER_HMAC: &str = "HMAC";
pub const HEADER_SIGNATURE: &str = "SIGNATURE";

/// Одно аудит-событие: имя колонки -> значение.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<K: Into<String>, V: Into<String>>(mut self, column: K, value: V) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, column: K, value: V) {
        self.fields.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Параметры CSV-диалекта.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvFormat {
    pub delimiter: u8,
    pub quote: u8,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFormatter {
    format: CsvFormat,
}

impl RecordFormatter {
    pub fn new(format: CsvFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> CsvFormat {
        self.format
    }

    /// Строка заголовка (колонки как есть, без добавления HMAC/SIGNATURE).
    pub fn format_header(&self, columns: &[String]) -> Result<Vec<u8>> {
        self.render(columns.iter().map(|c| c.as_str()))
    }

    /// Строка данных: значения в порядке `columns`, отсутствующие — пустые.
    pub fn format_row(&self, values: &Record, columns: &[String]) -> Result<Vec<u8>> {
        self.render(columns.iter().map(|c| values.get(c).unwrap_or("")))
    }

    /// Произвольные ячейки (строки данных с HMAC, строки подписи).
    pub fn format_cells<'a, I>(&self, cells: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.render(cells)
    }

    /// CSV-reader с теми же настройками; заголовок возвращается первой строкой.
    pub fn reader<R: Read>(&self, r: R) -> csv::Reader<R> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.format.delimiter)
            .quote(self.format.quote)
            .from_reader(r)
    }

    fn render<'a, I>(&self, cells: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut w = csv::WriterBuilder::new()
            .delimiter(self.format.delimiter)
            .quote(self.format.quote)
            .quote_style(csv::QuoteStyle::Always)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::with_capacity(128));
        w.write_record(cells)?;
        w.into_inner()
            .map_err(|e| AuditLogError::Io(e.into_error()))
    }
}

/// Заголовок файла: колонки пользователя + HMAC + SIGNATURE.
pub fn secure_header(columns: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(columns.len() + 2);
    out.extend(columns.iter().cloned());
    out.push(HEADER_HMAC.to_string());
    out.push(HEADER_SIGNATURE.to_string());
    out
}

/// Проверка записи перед добавлением: зарезервированные колонки запрещены,
/// неизвестные колонки игнорируются.
pub fn check_record(record: &Record, columns: &[String]) -> Result<()> {
    for c in record.columns() {
        if c == HEADER_HMAC || c == HEADER_SIGNATURE {
            return Err(AuditLogError::Format(format!(
                "record must not carry reserved column '{}'",
                c
            )));
        }
        if !columns.iter().any(|h| h == c) {
            debug!("column '{}' is not part of the header, value ignored", c);
        }
    }
    Ok(())
}

/// Вход HMAC: конкатенация значений в порядке заголовка.
pub fn hmac_input(record: &Record, columns: &[String]) -> Vec<u8> {
    let mut out = Vec::new();
    for c in columns {
        if let Some(v) = record.get(c) {
            out.extend_from_slice(v.as_bytes());
        }
    }
    out
}

/// То же для уже разобранной строки (первые N ячеек — значения).
pub fn hmac_input_cells(cells: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for v in cells {
        out.extend_from_slice(v.as_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn header_and_row_always_quoted_in_header_order() {
        let f = RecordFormatter::default();
        let columns = cols(&["id", "action"]);
        assert_eq!(
            f.format_header(&secure_header(&columns)).unwrap(),
            b"\"id\",\"action\",\"HMAC\",\"SIGNATURE\"\n"
        );
        let r = Record::new().with("action", "login").with("id", "1");
        assert_eq!(f.format_row(&r, &columns).unwrap(), b"\"1\",\"login\"\n");
    }

    #[test]
    fn quotes_and_delimiters_escaped_and_read_back() {
        let f = RecordFormatter::new(CsvFormat {
            delimiter: b';',
            quote: b'\'',
        });
        let line = f.format_cells(["a;b", "it's", ""]).unwrap();
        assert_eq!(line, b"'a;b';'it''s';''\n");

        let mut rdr = f.reader(&line[..]);
        let rec = rdr.records().next().unwrap().unwrap();
        assert_eq!(rec.iter().collect::<Vec<_>>(), vec!["a;b", "it's", ""]);
    }

    #[test]
    fn hmac_input_ignores_formatting_and_unknown_columns() {
        let columns = cols(&["id", "action"]);
        let r = Record::new()
            .with("id", "1")
            .with("action", "log,in")
            .with("extra", "zzz");
        assert_eq!(hmac_input(&r, &columns), b"1log,in");
        assert_eq!(hmac_input_cells(&["1", "log,in"]), b"1log,in");
    }

    #[test]
    fn reserved_columns_rejected() {
        let columns = cols(&["id"]);
        let r = Record::new().with("id", "1").with(HEADER_SIGNATURE, "forged");
        assert!(matches!(check_record(&r, &columns), Err(AuditLogError::Format(_))));
        assert!(check_record(&Record::new().with("other", "x"), &columns).is_ok());
    }

    #[test]
    fn record_deserializes_from_json_object() {
        let r: Record = serde_json::from_str(r#"{"id":"7","action":"logout"}"#).unwrap();
        assert_eq!(r.get("action"), Some("logout"));
        assert_eq!(r.len(), 2);
    }
}
