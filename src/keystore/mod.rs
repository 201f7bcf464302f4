//! keystore — SecureKeyStore: именованные записи ключей одного лог-файла.
//!
//! Записи:
//! - InitialKey        — стартовый ключ HMAC-цепочки файла (пишется один раз).
//! - CurrentKey        — ключ после последнего храповика (обновляется после каждой строки).
//! - CurrentSignature  — последняя записанная подпись (для восстановления после сбоя).
//! - Signature.*       — ed25519 пара; одна на все файлы, переживает ротации.
//!
//! Реализации:
//! - FileKeyStore   — keyring-файл "<log>.keystore" (записи запечатаны KeySealer).
//! - MemoryKeyStore — in-memory (тесты, встраивание).

use std::path::Path;

use crate::crypto::SymmetricKey;
use crate::error::Result;

pub mod keyring;
pub use keyring::KeyRing;

pub mod file;
pub use file::{create_signing_keystore, load_signing_keys, FileKeyStore};

pub mod memory;
pub use memory::MemoryKeyStore;

pub const ENTRY_INITIAL_KEY: &str = "InitialKey";
pub const ENTRY_CURRENT_KEY: &str = "CurrentKey";
pub const ENTRY_CURRENT_SIGNATURE: &str = "CurrentSignature";
pub const ENTRY_SIGNATURE_SECRET: &str = "Signature.secret";
pub const ENTRY_SIGNATURE_PUBLIC: &str = "Signature.public";

/// Хранилище ключевого материала, которым пользуется писатель и верификатор.
///
/// Симметричные записи принадлежат одному лог-файлу. Общий store для
/// нескольких файлов допустим только если записи разных файлов не пересекаются.
pub trait SecureKeyStore: Send + Sync {
    fn read_initial_key(&self) -> Result<Option<SymmetricKey>>;
    fn write_initial_key(&self, key: &SymmetricKey) -> Result<()>;

    fn read_current_key(&self) -> Result<Option<SymmetricKey>>;
    fn write_current_key(&self, key: &SymmetricKey) -> Result<()>;

    fn read_current_signature(&self) -> Result<Option<Vec<u8>>>;
    fn write_current_signature(&self, signature: &[u8]) -> Result<()>;

    /// Подписать данные асимметричным ключом store.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool>;

    /// Отложить симметричные записи под архивный файл `archived_log`;
    /// живые записи после этого пусты (новый файл получит новые ключи).
    fn archive(&self, archived_log: &Path) -> Result<()>;
}
