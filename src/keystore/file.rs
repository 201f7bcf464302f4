//! keystore/file — SecureKeyStore поверх keyring-файла "<log>.keystore".
//!
//! Каждая запись запечатана KeySealer'ом (AAD = имя записи). Подписывающая
//! пара живёт в отдельном keyring (см. create_signing_keystore) и общая для
//! всех файлов темы.
//!
//! При ротации "<live>.keystore" переименовывается в "<archived>.keystore",
//! а для живого файла создаётся пустой keyring.

use anyhow::{anyhow, Context};
use log::{debug, trace};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use zeroize::Zeroizing;

use super::keyring::{fsync_parent_dir, KeyRing};
use super::{
    SecureKeyStore, ENTRY_CURRENT_KEY, ENTRY_CURRENT_SIGNATURE, ENTRY_INITIAL_KEY,
    ENTRY_SIGNATURE_PUBLIC, ENTRY_SIGNATURE_SECRET,
};
use crate::crypto::{KeySealer, SigningKeys, SymmetricKey};
use crate::error::{AuditLogError, Result};

pub const KEYSTORE_SUFFIX: &str = ".keystore";

pub struct FileKeyStore {
    ring: Mutex<KeyRing>,
    sealer: Arc<dyn KeySealer>,
    signing: SigningKeys,
}

impl FileKeyStore {
    /// Путь keyring'а для лог-файла: "<log>.keystore".
    pub fn keystore_path(log_path: &Path) -> PathBuf {
        let mut s: OsString = log_path.as_os_str().to_os_string();
        s.push(KEYSTORE_SUFFIX);
        PathBuf::from(s)
    }

    /// Открыть (или создать) keyring для лог-файла.
    pub fn open(log_path: &Path, signing: SigningKeys, sealer: Arc<dyn KeySealer>) -> Result<Self> {
        let ring = KeyRing::open_or_create(&Self::keystore_path(log_path))
            .map_err(AuditLogError::storage)?;
        Ok(Self {
            ring: Mutex::new(ring),
            sealer,
            signing,
        })
    }

    /// Открыть существующий keyring (верификация архивов: создавать нечего).
    pub fn open_existing(
        log_path: &Path,
        signing: SigningKeys,
        sealer: Arc<dyn KeySealer>,
    ) -> Result<Self> {
        let ring = KeyRing::open(&Self::keystore_path(log_path)).map_err(AuditLogError::storage)?;
        Ok(Self {
            ring: Mutex::new(ring),
            sealer,
            signing,
        })
    }

    pub fn signing_keys(&self) -> &SigningKeys {
        &self.signing
    }

    fn read_entry(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let ring = self.ring.lock().map_err(|_| poisoned())?;
        match ring.get(name).map_err(AuditLogError::storage)? {
            Some(sealed) => {
                let plain = self
                    .sealer
                    .open(name, &sealed)
                    .map_err(AuditLogError::storage)?;
                Ok(Some(plain))
            }
            None => Ok(None),
        }
    }

    fn write_entry(&self, name: &str, value: &[u8]) -> Result<()> {
        let sealed = self.sealer.seal(name, value).map_err(AuditLogError::storage)?;
        let ring = self.ring.lock().map_err(|_| poisoned())?;
        ring.put(name, &sealed).map_err(AuditLogError::storage)
    }

    fn read_key(&self, name: &str) -> Result<Option<SymmetricKey>> {
        match self.read_entry(name)? {
            Some(bytes) => Ok(Some(
                SymmetricKey::from_slice(&bytes).map_err(AuditLogError::storage)?,
            )),
            None => Ok(None),
        }
    }
}

impl SecureKeyStore for FileKeyStore {
    fn read_initial_key(&self) -> Result<Option<SymmetricKey>> {
        self.read_key(ENTRY_INITIAL_KEY)
    }

    fn write_initial_key(&self, key: &SymmetricKey) -> Result<()> {
        self.write_entry(ENTRY_INITIAL_KEY, key.as_bytes())
    }

    fn read_current_key(&self) -> Result<Option<SymmetricKey>> {
        self.read_key(ENTRY_CURRENT_KEY)
    }

    fn write_current_key(&self, key: &SymmetricKey) -> Result<()> {
        self.write_entry(ENTRY_CURRENT_KEY, key.as_bytes())
    }

    fn read_current_signature(&self) -> Result<Option<Vec<u8>>> {
        self.read_entry(ENTRY_CURRENT_SIGNATURE)
    }

    fn write_current_signature(&self, signature: &[u8]) -> Result<()> {
        self.write_entry(ENTRY_CURRENT_SIGNATURE, signature)
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.signing.sign(data)
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool> {
        self.signing.verify(data, signature)
    }

    fn archive(&self, archived_log: &Path) -> Result<()> {
        let mut ring = self.ring.lock().map_err(|_| poisoned())?;
        let live = ring.path().to_path_buf();
        let target = Self::keystore_path(archived_log);
        trace!("renaming keystore {} -> {}", live.display(), target.display());
        std::fs::rename(&live, &target)
            .with_context(|| format!("rename keystore {} -> {}", live.display(), target.display()))
            .map_err(AuditLogError::storage)?;
        let _ = fsync_parent_dir(&target);
        *ring = KeyRing::open_or_create(&live).map_err(AuditLogError::storage)?;
        debug!("keystore archived as {}", target.display());
        Ok(())
    }
}

fn poisoned() -> AuditLogError {
    AuditLogError::SecureStorage("keystore mutex poisoned".into())
}

// ---------------- signing keyring ----------------

/// Создать keyring с новой ed25519 парой. Ошибка, если файл уже существует.
pub fn create_signing_keystore(path: &Path, sealer: &dyn KeySealer) -> anyhow::Result<SigningKeys> {
    if path.exists() {
        return Err(anyhow!("signing keystore already exists: {}", path.display()));
    }
    let keys = SigningKeys::generate();
    let secret = Zeroizing::new(
        keys.secret_bytes()
            .ok_or_else(|| anyhow!("generated keys have no secret half"))?,
    );
    let public = keys.public_bytes();

    let ring = KeyRing::open_or_create(path)?;
    let sealed_secret = sealer.seal(ENTRY_SIGNATURE_SECRET, &secret[..])?;
    let sealed_public = sealer.seal(ENTRY_SIGNATURE_PUBLIC, &public)?;
    ring.put_many(&[
        (ENTRY_SIGNATURE_SECRET, sealed_secret.as_slice()),
        (ENTRY_SIGNATURE_PUBLIC, sealed_public.as_slice()),
    ])?;
    Ok(keys)
}

/// Загрузить пару; без секретной записи — verify-only ключи.
pub fn load_signing_keys(path: &Path, sealer: &dyn KeySealer) -> anyhow::Result<SigningKeys> {
    let ring = KeyRing::open(path)?;
    if let Some(sealed) = ring.get(ENTRY_SIGNATURE_SECRET)? {
        let secret = sealer.open(ENTRY_SIGNATURE_SECRET, &sealed)?;
        return SigningKeys::from_secret(&secret).map_err(|e| anyhow!("{}", e));
    }
    let sealed = ring
        .get(ENTRY_SIGNATURE_PUBLIC)?
        .ok_or_else(|| anyhow!("no signing key entries in {}", path.display()))?;
    let public = sealer.open(ENTRY_SIGNATURE_PUBLIC, &sealed)?;
    SigningKeys::verify_only(&public).map_err(|e| anyhow!("{}", e))
}
