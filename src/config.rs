//! Centralized configuration and builder for chainlog writers.
//!
//! - ChainLogConfig::from_env() reads CHAINLOG_* variables over the defaults.
//! - ChainLogBuilder starts from env and allows explicit overrides.
//!
//! Defaults:
//! - signature_interval_ms = 60_000 (one signature row per minute of activity)
//! - delimiter = ',' / quote = '"'
//! - max_file_size = 0 (size-based rotation disabled)
//! - max_history_files / max_disk_space / min_free_space = 0 (archives kept forever)
//! - fsync = false (flush to the OS only)

use std::fmt;
use std::time::Duration;

use crate::format::CsvFormat;
use crate::journal::RetentionPolicy;

/// Top-level configuration of a secure (or plain) CSV log.
#[derive(Clone, Debug)]
pub struct ChainLogConfig {
    /// Delay between the first unsigned append and the signature row.
    /// Env: CHAINLOG_SIGNATURE_INTERVAL_MS (default 60000)
    pub signature_interval_ms: u64,

    /// Env: CHAINLOG_DELIMITER (single ASCII char, default ',')
    pub delimiter: u8,

    /// Env: CHAINLOG_QUOTE (single ASCII char, default '"')
    pub quote: u8,

    /// Rotate once the live file reaches this many bytes (0 = never).
    /// Env: CHAINLOG_MAX_FILE_SIZE (default 0)
    pub max_file_size: u64,

    /// Keep at most this many archived files after a rotation (0 = unlimited).
    /// Env: CHAINLOG_MAX_HISTORY_FILES (default 0)
    pub max_history_files: usize,

    /// Archived files may use at most this many bytes in total (0 = unlimited).
    /// Env: CHAINLOG_MAX_DISK_SPACE (default 0)
    pub max_disk_space: u64,

    /// Delete the oldest archives while the volume has less free space (0 = off).
    /// Env: CHAINLOG_MIN_FREE_SPACE (default 0)
    pub min_free_space: u64,

    /// fsync the log file on every flush.
    /// Env: CHAINLOG_FSYNC = 0|1|true|false (default false)
    pub fsync: bool,
}

impl Default for ChainLogConfig {
    fn default() -> Self {
        Self {
            signature_interval_ms: 60_000,
            delimiter: b',',
            quote: b'"',
            max_file_size: 0,
            max_history_files: 0,
            max_disk_space: 0,
            min_free_space: 0,
            fsync: false,
        }
    }
}

impl ChainLogConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("CHAINLOG_SIGNATURE_INTERVAL_MS") {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.signature_interval_ms = n;
            }
        }

        if let Ok(v) = std::env::var("CHAINLOG_DELIMITER") {
            if let Some(b) = single_ascii(&v) {
                cfg.delimiter = b;
            }
        }

        if let Ok(v) = std::env::var("CHAINLOG_QUOTE") {
            if let Some(b) = single_ascii(&v) {
                cfg.quote = b;
            }
        }

        if let Ok(v) = std::env::var("CHAINLOG_MAX_FILE_SIZE") {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.max_file_size = n;
            }
        }

        if let Ok(v) = std::env::var("CHAINLOG_MAX_HISTORY_FILES") {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.max_history_files = n;
            }
        }

        if let Ok(v) = std::env::var("CHAINLOG_MAX_DISK_SPACE") {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.max_disk_space = n;
            }
        }

        if let Ok(v) = std::env::var("CHAINLOG_MIN_FREE_SPACE") {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.min_free_space = n;
            }
        }

        if let Ok(v) = std::env::var("CHAINLOG_FSYNC") {
            let s = v.trim().to_ascii_lowercase();
            cfg.fsync = s == "1" || s == "true" || s == "on" || s == "yes";
        }

        cfg
    }

    pub fn with_signature_interval_ms(mut self, ms: u64) -> Self {
        self.signature_interval_ms = ms;
        self
    }

    pub fn with_delimiter(mut self, d: u8) -> Self {
        self.delimiter = d;
        self
    }

    pub fn with_quote(mut self, q: u8) -> Self {
        self.quote = q;
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_max_history_files(mut self, n: usize) -> Self {
        self.max_history_files = n;
        self
    }

    pub fn with_max_disk_space(mut self, bytes: u64) -> Self {
        self.max_disk_space = bytes;
        self
    }

    pub fn with_min_free_space(mut self, bytes: u64) -> Self {
        self.min_free_space = bytes;
        self
    }

    pub fn with_fsync(mut self, on: bool) -> Self {
        self.fsync = on;
        self
    }

    pub fn signature_interval(&self) -> Duration {
        Duration::from_millis(self.signature_interval_ms)
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_history_files: self.max_history_files,
            max_disk_space: self.max_disk_space,
            min_free_space: self.min_free_space,
        }
    }

    pub fn csv_format(&self) -> CsvFormat {
        CsvFormat {
            delimiter: self.delimiter,
            quote: self.quote,
        }
    }
}

fn single_ascii(v: &str) -> Option<u8> {
    let v = v.trim_matches(|c| c == '\n' || c == '\r');
    let b = v.as_bytes();
    if b.len() == 1 && b[0].is_ascii() {
        Some(b[0])
    } else {
        None
    }
}

impl fmt::Display for ChainLogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ChainLogConfig {{ \
             signature_interval_ms: {}, \
             delimiter: {:?}, \
             quote: {:?}, \
             max_file_size: {}, \
             max_history_files: {}, \
             max_disk_space: {}, \
             min_free_space: {}, \
             fsync: {} \
             }}",
            self.signature_interval_ms,
            self.delimiter as char,
            self.quote as char,
            if self.max_file_size == 0 {
                "never".to_string()
            } else {
                self.max_file_size.to_string()
            },
            self.max_history_files,
            self.max_disk_space,
            self.min_free_space,
            self.fsync,
        )
    }
}

/// Builder producing a ChainLogConfig.
#[derive(Clone, Debug)]
pub struct ChainLogBuilder {
    cfg: ChainLogConfig,
}

impl Default for ChainLogBuilder {
    fn default() -> Self {
        Self {
            cfg: ChainLogConfig::from_env(),
        }
    }
}

impl ChainLogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a clean default (without reading env).
    pub fn from_default() -> Self {
        Self {
            cfg: ChainLogConfig::default(),
        }
    }

    pub fn signature_interval_ms(mut self, ms: u64) -> Self {
        self.cfg.signature_interval_ms = ms;
        self
    }

    pub fn delimiter(mut self, d: u8) -> Self {
        self.cfg.delimiter = d;
        self
    }

    pub fn quote(mut self, q: u8) -> Self {
        self.cfg.quote = q;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.cfg.max_file_size = bytes;
        self
    }

    pub fn max_history_files(mut self, n: usize) -> Self {
        self.cfg.max_history_files = n;
        self
    }

    pub fn max_disk_space(mut self, bytes: u64) -> Self {
        self.cfg.max_disk_space = bytes;
        self
    }

    pub fn min_free_space(mut self, bytes: u64) -> Self {
        self.cfg.min_free_space = bytes;
        self
    }

    pub fn fsync(mut self, on: bool) -> Self {
        self.cfg.fsync = on;
        self
    }

    pub fn build(self) -> ChainLogConfig {
        self.cfg
    }
}
