//! Lightweight global metrics for chainlog.
//!
//! Потокобезопасные атомарные счётчики для подсистем:
//! - запись (строки данных, байты)
//! - подписи (записанные, фоновые ошибки)
//! - ротация
//! - верификация

use std::sync::atomic::{AtomicU64, Ordering};

// ----- Writer -----
static RECORDS_APPENDED: AtomicU64 = AtomicU64::new(0);
static BYTES_WRITTEN: AtomicU64 = AtomicU64::new(0);
static APPEND_FAILURES: AtomicU64 = AtomicU64::new(0);

// ----- Signatures -----
static SIGNATURES_WRITTEN: AtomicU64 = AtomicU64::new(0);
static SIGNATURE_FAILURES: AtomicU64 = AtomicU64::new(0);

// ----- Rotation -----
static ROTATIONS: AtomicU64 = AtomicU64::new(0);

// ----- Verification -----
static VERIFICATIONS_PASSED: AtomicU64 = AtomicU64::new(0);
static VERIFICATIONS_FAILED: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    pub records_appended: u64,
    pub bytes_written: u64,
    pub append_failures: u64,

    pub signatures_written: u64,
    pub signature_failures: u64,

    pub rotations: u64,

    pub verifications_passed: u64,
    pub verifications_failed: u64,
}

impl MetricsSnapshot {
    /// Среднее число строк данных на одну подпись.
    pub fn records_per_signature(&self) -> f64 {
        if self.signatures_written == 0 {
            0.0
        } else {
            self.records_appended as f64 / self.signatures_written as f64
        }
    }
}

pub fn record_append(bytes: usize) {
    RECORDS_APPENDED.fetch_add(1, Ordering::Relaxed);
    BYTES_WRITTEN.fetch_add(bytes as u64, Ordering::Relaxed);
}

pub fn record_append_failure() {
    APPEND_FAILURES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_signature(bytes: usize) {
    SIGNATURES_WRITTEN.fetch_add(1, Ordering::Relaxed);
    BYTES_WRITTEN.fetch_add(bytes as u64, Ordering::Relaxed);
}

pub fn record_signature_failure() {
    SIGNATURE_FAILURES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_rotation() {
    ROTATIONS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_verification(ok: bool) {
    if ok {
        VERIFICATIONS_PASSED.fetch_add(1, Ordering::Relaxed);
    } else {
        VERIFICATIONS_FAILED.fetch_add(1, Ordering::Relaxed);
    }
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        records_appended: RECORDS_APPENDED.load(Ordering::Relaxed),
        bytes_written: BYTES_WRITTEN.load(Ordering::Relaxed),
        append_failures: APPEND_FAILURES.load(Ordering::Relaxed),

        signatures_written: SIGNATURES_WRITTEN.load(Ordering::Relaxed),
        signature_failures: SIGNATURE_FAILURES.load(Ordering::Relaxed),

        rotations: ROTATIONS.load(Ordering::Relaxed),

        verifications_passed: VERIFICATIONS_PASSED.load(Ordering::Relaxed),
        verifications_failed: VERIFICATIONS_FAILED.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    RECORDS_APPENDED.store(0, Ordering::Relaxed);
    BYTES_WRITTEN.store(0, Ordering::Relaxed);
    APPEND_FAILURES.store(0, Ordering::Relaxed);

    SIGNATURES_WRITTEN.store(0, Ordering::Relaxed);
    SIGNATURE_FAILURES.store(0, Ordering::Relaxed);

    ROTATIONS.store(0, Ordering::Relaxed);

    VERIFICATIONS_PASSED.store(0, Ordering::Relaxed);
    VERIFICATIONS_FAILED.store(0, Ordering::Relaxed);
}
