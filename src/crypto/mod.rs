//! crypto — ключевой материал и примитивы цепочки.
//!
//! Состав:
//! - SymmetricKey — 32-байтный ключ HMAC-цепочки, обнуляется в Drop (Zeroize).
//! - hmac_chain   — HmacChainCalculator (HMAC-SHA256 + храповик SHA-256).
//! - signing      — SigningKeys (ed25519) для строк подписи.
//! - seal         — KeySealer: AES-256-GCM обёртка записей keystore (KEK из ENV или статический).
//!
//! Использование:
//!   let key = SymmetricKey::random();
//!   let mut calc = HmacChainCalculator::new(key);
//!   let hmac_b64 = calc.calculate(b"...")?; // ключ уже сдвинут вперёд

use anyhow::{anyhow, Result};
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

pub mod hmac_chain;
pub use hmac_chain::HmacChainCalculator;

pub mod signing;
pub use signing::SigningKeys;

pub mod seal;
pub use seal::{EnvKeySealer, KeySealer, StaticKeySealer};

pub const KEY_LEN: usize = 32;

/// Симметричный ключ HMAC-цепочки.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(Self(slice32(bytes)?))
    }

    /// 256 случайных бит из OsRng.
    pub fn random() -> Self {
        let mut k = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut k);
        Self(k)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

// Ключ не печатаем даже в Debug.
impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

// ---------------------- helpers ----------------------

pub(crate) fn slice32(bytes: &[u8]) -> Result<[u8; 32]> {
    if bytes.len() != 32 {
        return Err(anyhow!("key must be exactly 32 bytes, got {}", bytes.len()));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(bytes);
    Ok(out)
}

pub(crate) fn decode_hex_trimmed(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    if s.len() % 2 != 0 {
        return Err(anyhow!("hex key must have even length"));
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    let bytes = s.as_bytes();
    for i in (0..bytes.len()).step_by(2) {
        let h = (bytes[i] as char)
            .to_digit(16)
            .ok_or_else(|| anyhow!("invalid hex at pos {}", i))?;
        let l = (bytes[i + 1] as char)
            .to_digit(16)
            .ok_or_else(|| anyhow!("invalid hex at pos {}", i + 1))?;
        out.push(((h << 4) | l) as u8);
    }
    Ok(out)
}

pub(crate) fn decode_base64_trimmed(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(s.as_bytes())
        .map_err(|e| anyhow!("base64 decode: {}", e))?;
    Ok(bytes)
}

#[inline]
pub fn b64_encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[inline]
pub fn b64_decode(s: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(s.as_bytes())
        .map_err(|e| anyhow!("base64 decode: {}", e))
}

/// Данные под подпись: last_signature ‖ decode(last_hmac).
pub fn data_to_sign(last_signature: Option<&[u8]>, last_hmac: &str) -> Result<Vec<u8>> {
    let hmac = b64_decode(last_hmac)?;
    let mut out = Vec::with_capacity(last_signature.map(|s| s.len()).unwrap_or(0) + hmac.len());
    if let Some(sig) = last_signature {
        out.extend_from_slice(sig);
    }
    out.extend_from_slice(&hmac);
    Ok(out)
}

#[inline]
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for i in 0..a.len() {
        acc |= a[i] ^ b[i];
    }
    acc == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_to_sign_prefixes_previous_signature() {
        let hmac = b64_encode(&[1, 2, 3]);
        assert_eq!(data_to_sign(None, &hmac).unwrap(), vec![1, 2, 3]);
        assert_eq!(
            data_to_sign(Some(&[9, 9]), &hmac).unwrap(),
            vec![9, 9, 1, 2, 3]
        );
    }

    #[test]
    fn hex_and_slice32() {
        let v = decode_hex_trimmed(&"ab".repeat(32)).unwrap();
        let k = SymmetricKey::from_slice(&v).unwrap();
        assert_eq!(k.as_bytes()[0], 0xab);
        assert!(SymmetricKey::from_slice(&[0u8; 5]).is_err());
        assert!(decode_hex_trimmed("abc").is_err());
    }

    #[test]
    fn random_keys_differ() {
        assert_ne!(SymmetricKey::random(), SymmetricKey::random());
    }
}
