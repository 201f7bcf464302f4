//! keystore/memory — SecureKeyStore в памяти процесса.
//!
//! Архивированные записи остаются доступны через `archived(path)`, чтобы
//! ротированный файл можно было проверить тем же процессом.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{SecureKeyStore, ENTRY_CURRENT_KEY, ENTRY_CURRENT_SIGNATURE, ENTRY_INITIAL_KEY};
use crate::crypto::{SigningKeys, SymmetricKey};
use crate::error::{AuditLogError, Result};

type Entries = HashMap<&'static str, Vec<u8>>;

pub struct MemoryKeyStore {
    entries: Mutex<Entries>,
    archived: Mutex<HashMap<PathBuf, Entries>>,
    signing: SigningKeys,
}

impl MemoryKeyStore {
    pub fn new(signing: SigningKeys) -> Self {
        Self::with_entries(signing, Entries::new())
    }

    fn with_entries(signing: SigningKeys, entries: Entries) -> Self {
        Self {
            entries: Mutex::new(entries),
            archived: Mutex::new(HashMap::new()),
            signing,
        }
    }

    /// Store с записями архивного файла (если он был отложен через archive()).
    pub fn archived(&self, archived_log: &Path) -> Option<MemoryKeyStore> {
        let archived = self.archived.lock().ok()?;
        archived
            .get(archived_log)
            .map(|e| MemoryKeyStore::with_entries(self.signing.clone(), e.clone()))
    }

    /// Копия store (общая подписывающая пара, независимые записи).
    pub fn snapshot(&self) -> MemoryKeyStore {
        let entries = self
            .entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default();
        MemoryKeyStore::with_entries(self.signing.clone(), entries)
    }

    fn get(&self, name: &'static str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.lock().map_err(|_| poisoned())?;
        Ok(entries.get(name).cloned())
    }

    fn put(&self, name: &'static str, value: &[u8]) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.insert(name, value.to_vec());
        Ok(())
    }

    fn get_key(&self, name: &'static str) -> Result<Option<SymmetricKey>> {
        match self.get(name)? {
            Some(bytes) => Ok(Some(
                SymmetricKey::from_slice(&bytes).map_err(AuditLogError::storage)?,
            )),
            None => Ok(None),
        }
    }
}

impl SecureKeyStore for MemoryKeyStore {
    fn read_initial_key(&self) -> Result<Option<SymmetricKey>> {
        self.get_key(ENTRY_INITIAL_KEY)
    }

    fn write_initial_key(&self, key: &SymmetricKey) -> Result<()> {
        self.put(ENTRY_INITIAL_KEY, key.as_bytes())
    }

    fn read_current_key(&self) -> Result<Option<SymmetricKey>> {
        self.get_key(ENTRY_CURRENT_KEY)
    }

    fn write_current_key(&self, key: &SymmetricKey) -> Result<()> {
        self.put(ENTRY_CURRENT_KEY, key.as_bytes())
    }

    fn read_current_signature(&self) -> Result<Option<Vec<u8>>> {
        self.get(ENTRY_CURRENT_SIGNATURE)
    }

    fn write_current_signature(&self, signature: &[u8]) -> Result<()> {
        self.put(ENTRY_CURRENT_SIGNATURE, signature)
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.signing.sign(data)
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool> {
        self.signing.verify(data, signature)
    }

    fn archive(&self, archived_log: &Path) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        let mut archived = self.archived.lock().map_err(|_| poisoned())?;
        archived.insert(archived_log.to_path_buf(), std::mem::take(&mut *entries));
        Ok(())
    }
}

fn poisoned() -> AuditLogError {
    AuditLogError::SecureStorage("keystore mutex poisoned".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_moves_entries_aside() {
        let ks = MemoryKeyStore::new(SigningKeys::generate());
        let k = SymmetricKey::from_bytes([4u8; 32]);
        ks.write_initial_key(&k).unwrap();
        ks.write_current_key(&k).unwrap();

        ks.archive(Path::new("/logs/a.csv.000001")).unwrap();
        assert!(ks.read_initial_key().unwrap().is_none());

        let old = ks.archived(Path::new("/logs/a.csv.000001")).unwrap();
        assert_eq!(old.read_initial_key().unwrap(), Some(k));
        assert!(ks.archived(Path::new("/logs/other")).is_none());
    }
}
