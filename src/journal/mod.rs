//! journal — писатели CSV-журнала.
//!
//! - backend  — LogBackend (файл / память).
//! - writer   — SecureAppendLog (HMAC-цепочка + подписи).
//! - plain    — PlainCsvLog (без колонок цепочки).
//! - rotation — RotationCoordinator / FileRotator / ArchiveSet / RetentionPolicy.
//! - scheduler — таймер фоновой подписи.

pub mod backend;
pub mod plain;
pub mod rotation;
pub mod scheduler;
pub mod writer;

pub use backend::{FileBackend, LogBackend, MemoryBackend};
pub use plain::PlainCsvLog;
pub use rotation::{
    apply_retention, archive_path, ArchiveSet, FileRotator, RetentionPolicy, RotationContext,
    RotationCoordinator, RotationHooks,
};
pub use scheduler::SignatureScheduler;
pub use writer::{ChainState, LogState, SecureAppendLog};
