//! error — публичная таксономия ошибок журнала.
//!
//! Внутренние пути (keyring, файловые операции, CLI) работают через anyhow
//! и конвертируются сюда на границе публичного API.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuditLogError>;

#[derive(Debug, Error)]
pub enum AuditLogError {
    /// Header mismatch on resume, malformed header, reserved column in a record.
    #[error("format error: {0}")]
    Format(String),

    /// Verification failed. `row` is 1-based (the header is row 1).
    #[error("tampered log{}: {reason}", row.map(|r| format!(" at row {}", r)).unwrap_or_default())]
    Tampered { row: Option<usize>, reason: String },

    /// MAC or signature primitive rejected its inputs.
    #[error("crypto failure: {0}")]
    Crypto(String),

    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),

    #[error("secure storage failure: {0}")]
    SecureStorage(String),

    #[error("log is closed")]
    Closed,

    /// Another writer holds the advisory lock on the log file.
    #[error("log is locked by another writer: {0}")]
    Locked(String),
}

impl AuditLogError {
    pub fn storage(e: anyhow::Error) -> Self {
        AuditLogError::SecureStorage(format!("{:#}", e))
    }

    /// Keystore failures surface as I/O failures at the writer boundary.
    pub fn into_io(self) -> Self {
        match self {
            AuditLogError::SecureStorage(msg) => {
                AuditLogError::Io(io::Error::new(io::ErrorKind::Other, msg))
            }
            other => other,
        }
    }

    pub fn is_tampered(&self) -> bool {
        matches!(self, AuditLogError::Tampered { .. })
    }
}

impl From<csv::Error> for AuditLogError {
    fn from(e: csv::Error) -> Self {
        if e.is_io_error() {
            match e.into_kind() {
                csv::ErrorKind::Io(io) => AuditLogError::Io(io),
                other => AuditLogError::Format(format!("{:?}", other)),
            }
        } else {
            AuditLogError::Format(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tampered_message_carries_row() {
        let e = AuditLogError::Tampered {
            row: Some(4),
            reason: "HMAC mismatch".into(),
        };
        assert_eq!(e.to_string(), "tampered log at row 4: HMAC mismatch");
        assert!(e.is_tampered());
    }

    #[test]
    fn storage_failure_becomes_io() {
        let e = AuditLogError::SecureStorage("keyring locked".into()).into_io();
        assert!(matches!(e, AuditLogError::Io(_)));
    }
}
