//! crypto/hmac_chain — HMAC-SHA256 с храповиком ключа.
//!
//! После каждого calculate() ключ заменяется на SHA-256(ключ). Старый ключ
//! из нового не восстановить, поэтому компрометация более позднего ключа не
//! позволяет подделать уже записанные строки.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::{b64_encode, SymmetricKey};
use crate::error::{AuditLogError, Result};

type HmacSha256 = Hmac<Sha256>;

pub struct HmacChainCalculator {
    key: SymmetricKey,
}

impl HmacChainCalculator {
    pub fn new(key: SymmetricKey) -> Self {
        Self { key }
    }

    /// HMAC(data) под текущим ключом в base64; затем ключ сдвигается вперёд.
    pub fn calculate(&mut self, data: &[u8]) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.key.as_bytes())
            .map_err(|e| AuditLogError::Crypto(format!("hmac key: {}", e)))?;
        mac.update(data);
        let tag = mac.finalize().into_bytes();
        self.key = ratchet(&self.key);
        Ok(b64_encode(&tag))
    }

    /// Ключ для следующего calculate() (уже после храповика).
    pub fn current_key(&self) -> &SymmetricKey {
        &self.key
    }

    /// Восстановление при resume: ключ берётся из CurrentKey напрямую.
    pub fn set_current_key(&mut self, key: SymmetricKey) {
        self.key = key;
    }
}

/// Один шаг храповика: next = SHA-256(current).
pub fn ratchet(key: &SymmetricKey) -> SymmetricKey {
    let digest = Sha256::digest(key.as_bytes());
    let mut next = [0u8; 32];
    next.copy_from_slice(&digest);
    SymmetricKey::from_bytes(next)
}
