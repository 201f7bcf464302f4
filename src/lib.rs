// Базовые модули
pub mod config;
pub mod error;
pub mod lock;
pub mod metrics;

// Криптография: HMAC-цепочка, подписи, запечатывание ключей
pub mod crypto; // src/crypto/{mod,hmac_chain,signing,seal}.rs

// Хранилище ключевого материала
pub mod keystore; // src/keystore/{mod,keyring,file,memory}.rs

// Формат строк, писатели, верификация, чтение
pub mod format;
pub mod journal; // src/journal/{mod,backend,writer,plain,rotation,scheduler}.rs
pub mod reader;
pub mod verify;

// Удобные реэкспорты
pub use config::{ChainLogBuilder, ChainLogConfig};
pub use error::{AuditLogError, Result};
pub use format::{CsvFormat, Record, RecordFormatter, HEADER_HMAC, HEADER_SIGNATURE};
pub use journal::{
    ArchiveSet, ChainState, FileRotator, LogBackend, LogState, MemoryBackend, PlainCsvLog,
    RetentionPolicy, RotationContext, RotationCoordinator, RotationHooks, SecureAppendLog,
};
pub use keystore::{FileKeyStore, MemoryKeyStore, SecureKeyStore};
pub use reader::read_events;
pub use verify::{verify_archive, ChainVerifier, VerificationResult};

pub use crypto::{
    EnvKeySealer, HmacChainCalculator, KeySealer, SigningKeys, StaticKeySealer, SymmetricKey,
};
