//! verify — повторное прохождение журнала с пересчётом HMAC и проверкой подписей.
//!
//! Алгоритм (строка 1 — заголовок):
//! - заголовок обязан заканчиваться колонками HMAC, SIGNATURE;
//! - running_key := InitialKey;
//! - строка с SIGNATURE: на строке 2 принимается без проверки (подпись,
//!   перенесённая из предыдущего файла), иначе
//!   verify(last_signature ‖ decode(last_hmac), signature);
//! - строка с HMAC: пересчитать по значениям, сравнить, сдвинуть ключ;
//! - в конце CurrentKey == running_key, последняя строка — подпись.
//!
//! Файл только с заголовком считается корректным.
//!
//! Ошибки ввода-вывода возвращаются как Err; подделка — как Ok(result) с ok=false.

use log::{debug, warn};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::crypto::{b64_decode, constant_time_eq, data_to_sign, HmacChainCalculator};
use crate::error::{AuditLogError, Result};
use crate::format::{hmac_input_cells, CsvFormat, RecordFormatter, HEADER_HMAC, HEADER_SIGNATURE};
use crate::keystore::SecureKeyStore;
use crate::metrics;

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationResult {
    pub ok: bool,
    pub reason: Option<String>,
    /// 1-based строка, на которой обнаружена проблема (если применимо).
    pub row: Option<usize>,
    pub headers: Vec<String>,
    pub last_hmac: Option<String>,
    #[serde(skip)]
    pub last_signature: Option<Vec<u8>>,
    /// Подпись строки 2, перенесённая из предыдущего файла.
    #[serde(skip)]
    pub carried_signature: Option<Vec<u8>>,
    pub data_rows: usize,
    pub signature_rows: usize,
    /// Цепочка цела и CurrentKey совпал, но файл не закончен подписью
    /// (сбой между строкой данных и подписью). Писатель может продолжить такой файл.
    pub missing_final_signature: bool,
}

impl VerificationResult {
    fn fail(mut self, row: Option<usize>, reason: impl Into<String>) -> Self {
        self.ok = false;
        self.row = row;
        self.reason = Some(reason.into());
        self
    }

    /// Ok(self) если проверка прошла, иначе Tampered.
    pub fn into_result(self) -> Result<Self> {
        if self.ok {
            Ok(self)
        } else {
            Err(AuditLogError::Tampered {
                row: self.row,
                reason: self.reason.unwrap_or_else(|| "verification failed".into()),
            })
        }
    }

    /// Колонки пользователя (без HMAC/SIGNATURE).
    pub fn columns(&self) -> &[String] {
        let n = self.headers.len().saturating_sub(2);
        &self.headers[..n]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChainVerifier {
    formatter: RecordFormatter,
}

impl ChainVerifier {
    pub fn new(format: CsvFormat) -> Self {
        Self {
            formatter: RecordFormatter::new(format),
        }
    }

    pub fn verify(&self, path: &Path, keystore: &dyn SecureKeyStore) -> Result<VerificationResult> {
        let res = self.verify_inner(path, keystore)?;
        metrics::record_verification(res.ok);
        if res.ok {
            debug!(
                "{} verified: {} data rows, {} signature rows",
                path.display(),
                res.data_rows,
                res.signature_rows
            );
        } else {
            warn!(
                "{} failed verification{}: {}",
                path.display(),
                res.row.map(|r| format!(" at row {}", r)).unwrap_or_default(),
                res.reason.as_deref().unwrap_or("")
            );
        }
        Ok(res)
    }

    fn verify_inner(&self, path: &Path, keystore: &dyn SecureKeyStore) -> Result<VerificationResult> {
        let file = File::open(path)?;
        let mut rdr = self.formatter.reader(BufReader::new(file));
        let mut records = rdr.records();
        let mut res = VerificationResult::default();

        let header = match records.next() {
            None => return Ok(res.fail(None, "empty file: no header")),
            Some(Err(e)) => return parse_failure(res, 1, e),
            Some(Ok(h)) => h,
        };
        res.headers = header.iter().map(|s| s.to_string()).collect();
        let n = res.headers.len();
        if n < 2 || res.headers[n - 2] != HEADER_HMAC || res.headers[n - 1] != HEADER_SIGNATURE {
            return Ok(res.fail(Some(1), "header must end with HMAC,SIGNATURE"));
        }

        let initial = match keystore.read_initial_key()? {
            Some(k) => k,
            None => return Ok(res.fail(None, "keystore has no InitialKey entry")),
        };
        let mut calc = HmacChainCalculator::new(initial);
        let mut last_hmac: Option<String> = None;
        let mut last_signature: Option<Vec<u8>> = None;
        let mut last_was_signature = false;

        for (i, rec) in records.enumerate() {
            let row = i + 2;
            let rec = match rec {
                Ok(r) => r,
                Err(e) => return parse_failure(res, row, e),
            };
            if rec.len() != n {
                return Ok(res.fail(
                    Some(row),
                    format!("malformed row: expected {} cells, found {}", n, rec.len()),
                ));
            }
            let hmac_cell = &rec[n - 2];
            let sig_cell = &rec[n - 1];

            if !sig_cell.is_empty() {
                if rec.iter().take(n - 1).any(|c| !c.is_empty()) {
                    return Ok(res.fail(Some(row), "malformed row: signature row carries data"));
                }
                let sig = match b64_decode(sig_cell) {
                    Ok(s) => s,
                    Err(e) => return Ok(res.fail(Some(row), format!("bad signature encoding: {:#}", e))),
                };
                if row == 2 {
                    debug!("row 2 carries the signature of the previous file");
                    res.carried_signature = Some(sig.clone());
                } else {
                    let Some(h) = last_hmac.as_deref() else {
                        return Ok(res.fail(Some(row), "signature without a preceding data row"));
                    };
                    let data = data_to_sign(last_signature.as_deref(), h)
                        .map_err(|e| AuditLogError::Crypto(format!("{:#}", e)))?;
                    match keystore.verify(&data, &sig) {
                        Ok(true) => {}
                        Ok(false) => return Ok(res.fail(Some(row), "signature mismatch")),
                        Err(e) => return Ok(res.fail(Some(row), format!("invalid signature: {}", e))),
                    }
                }
                last_signature = Some(sig);
                last_was_signature = true;
                res.signature_rows += 1;
            } else if !hmac_cell.is_empty() {
                let cells: Vec<&str> = rec.iter().take(n - 2).collect();
                let expected = calc.calculate(&hmac_input_cells(&cells))?;
                if !constant_time_eq(expected.as_bytes(), hmac_cell.as_bytes()) {
                    return Ok(res.fail(Some(row), "HMAC mismatch"));
                }
                last_hmac = Some(expected);
                last_was_signature = false;
                res.data_rows += 1;
            } else {
                return Ok(res.fail(Some(row), "malformed row: neither HMAC nor SIGNATURE set"));
            }
        }

        res.last_hmac = last_hmac;
        res.last_signature = last_signature;

        match keystore.read_current_key()? {
            None => return Ok(res.fail(None, "keystore has no CurrentKey entry")),
            Some(k) if k != *calc.current_key() => return Ok(res.fail(None, "final key mismatch")),
            Some(_) => {}
        }
        if res.data_rows + res.signature_rows > 0 && !last_was_signature {
            res.missing_final_signature = true;
            return Ok(res.fail(None, "missing final signature"));
        }

        res.ok = true;
        Ok(res)
    }
}

fn parse_failure(res: VerificationResult, row: usize, e: csv::Error) -> Result<VerificationResult> {
    if e.is_io_error() {
        return Err(e.into());
    }
    Ok(res.fail(Some(row), format!("malformed row: {}", e)))
}

/// Прочитать только заголовок файла (пустой файл -> пустой вектор).
pub fn read_header(path: &Path, format: CsvFormat) -> Result<Vec<String>> {
    let file = File::open(path)?;
    let mut rdr = RecordFormatter::new(format).reader(BufReader::new(file));
    match rdr.records().next() {
        None => Ok(Vec::new()),
        Some(r) => Ok(r?.iter().map(|s| s.to_string()).collect()),
    }
}

// ---------------- archive ----------------

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveEntry {
    pub path: PathBuf,
    pub result: VerificationResult,
}

/// Проверить набор файлов одной темы по порядку, каждый — своим keystore.
/// Подпись строки 2 каждого файла принимается без сверки с предыдущим файлом.
pub fn verify_archive<F>(files: &[PathBuf], format: CsvFormat, mut open_keystore: F) -> Vec<ArchiveEntry>
where
    F: FnMut(&Path) -> Result<Box<dyn SecureKeyStore>>,
{
    let verifier = ChainVerifier::new(format);
    files
        .iter()
        .map(|path| {
            let result = match open_keystore(path).and_then(|ks| verifier.verify(path, ks.as_ref())) {
                Ok(r) => r,
                Err(e) => VerificationResult::default().fail(None, e.to_string()),
            };
            ArchiveEntry {
                path: path.clone(),
                result,
            }
        })
        .collect()
}
