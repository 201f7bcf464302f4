//! crypto/seal — AES-256-GCM оболочка для записей keystore.
//!
//! Формат конверта (LE):
//!   MAGIC8 = "CLSEAL1\0"
//!   u32 version = 1
//!   [nonce 12]
//!   [tag 16]
//!   u32 ct_len
//!   [ciphertext bytes]
//!
//! AAD = "CLSEAL1" || entry name: конверт нельзя переложить под другое имя
//! (например, подставить InitialKey вместо CurrentKey).
//! Nonce = 12 случайных байт (OsRng).
//!
//! ENV:
//!   CHAINLOG_KEK_HEX / CHAINLOG_KEK_BASE64 — 32-байтовый KEK

use aes_gcm::{
    aead::{generic_array::GenericArray, AeadInPlace, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use super::{decode_base64_trimmed, decode_hex_trimmed, slice32};

const MAGIC: &[u8; 8] = b"CLSEAL1\0";
const VERSION_V1: u32 = 1;
const AAD_PREFIX: &[u8; 7] = b"CLSEAL1";
const HDR_LEN: usize = 8 + 4 + 12 + 16 + 4;

/// Запечатывание/распечатывание записей keystore.
pub trait KeySealer: Send + Sync {
    fn seal(&self, name: &str, plaintext: &[u8]) -> Result<Vec<u8>>;
    fn open(&self, name: &str, sealed: &[u8]) -> Result<Vec<u8>>;
}

/// Sealer на фиксированном KEK (тесты, встраивание).
#[derive(Clone)]
pub struct StaticKeySealer {
    kek: [u8; 32],
}

impl StaticKeySealer {
    pub fn new(kek: [u8; 32]) -> Self {
        Self { kek }
    }
}

impl KeySealer for StaticKeySealer {
    fn seal(&self, name: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        seal_with(&self.kek, name, plaintext)
    }
    fn open(&self, name: &str, sealed: &[u8]) -> Result<Vec<u8>> {
        open_with(&self.kek, name, sealed)
    }
}

impl Drop for StaticKeySealer {
    fn drop(&mut self) {
        self.kek.zeroize();
    }
}

/// Sealer с KEK из переменных окружения.
#[derive(Clone)]
pub struct EnvKeySealer {
    kek: [u8; 32],
}

impl EnvKeySealer {
    pub fn from_env() -> Result<Self> {
        // Порядок: HEX -> BASE64
        if let Ok(hex) = std::env::var("CHAINLOG_KEK_HEX") {
            let v = decode_hex_trimmed(&hex)?;
            return Ok(Self { kek: slice32(&v)? });
        }
        if let Ok(b64) = std::env::var("CHAINLOG_KEK_BASE64") {
            let v = decode_base64_trimmed(&b64)?;
            return Ok(Self { kek: slice32(&v)? });
        }
        Err(anyhow!(
            "EnvKeySealer: set CHAINLOG_KEK_HEX or CHAINLOG_KEK_BASE64 (32 bytes)"
        ))
    }
}

impl KeySealer for EnvKeySealer {
    fn seal(&self, name: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        seal_with(&self.kek, name, plaintext)
    }
    fn open(&self, name: &str, sealed: &[u8]) -> Result<Vec<u8>> {
        open_with(&self.kek, name, sealed)
    }
}

impl Drop for EnvKeySealer {
    fn drop(&mut self) {
        self.kek.zeroize();
    }
}

// ---------------- helpers ----------------

fn seal_with(kek: &[u8; 32], name: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut buf = plaintext.to_vec();
    let mut nonce = [0u8; 12];
    OsRng.fill_bytes(&mut nonce);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(kek));
    let aad = build_aad(name);
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), &aad, &mut buf)
        .map_err(|e| anyhow!("seal aes-gcm: {}", e))?;

    let mut out = Vec::with_capacity(HDR_LEN + buf.len());
    out.extend_from_slice(MAGIC);
    let mut buf4 = [0u8; 4];
    LittleEndian::write_u32(&mut buf4, VERSION_V1);
    out.extend_from_slice(&buf4);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(tag.as_slice());
    LittleEndian::write_u32(&mut buf4, buf.len() as u32);
    out.extend_from_slice(&buf4);
    out.extend_from_slice(&buf);
    Ok(out)
}

fn open_with(kek: &[u8; 32], name: &str, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < HDR_LEN {
        return Err(anyhow!("sealed entry '{}' too short", name));
    }
    if &sealed[..8] != MAGIC {
        return Err(anyhow!("bad seal magic for entry '{}'", name));
    }
    let mut off = 8usize;
    let ver = LittleEndian::read_u32(&sealed[off..off + 4]);
    off += 4;
    if ver != VERSION_V1 {
        return Err(anyhow!("unsupported seal version {}", ver));
    }
    let nonce = &sealed[off..off + 12];
    off += 12;
    let tag = &sealed[off..off + 16];
    off += 16;
    let ct_len = LittleEndian::read_u32(&sealed[off..off + 4]) as usize;
    off += 4;
    if sealed.len() < off + ct_len {
        return Err(anyhow!("sealed entry '{}' truncated", name));
    }
    let mut ct = sealed[off..off + ct_len].to_vec();

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(kek));
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce),
            &build_aad(name),
            &mut ct,
            GenericArray::from_slice(tag),
        )
        .map_err(|e| anyhow!("unseal '{}' aes-gcm: {}", name, e))?;
    Ok(ct)
}

fn build_aad(name: &str) -> Vec<u8> {
    let mut aad = Vec::with_capacity(AAD_PREFIX.len() + name.len());
    aad.extend_from_slice(AAD_PREFIX);
    aad.extend_from_slice(name.as_bytes());
    aad
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_roundtrip_bound_to_name() {
        let s = StaticKeySealer::new([0x22; 32]);
        let sealed = s.seal("CurrentKey", b"secret-bytes").unwrap();
        assert_eq!(s.open("CurrentKey", &sealed).unwrap(), b"secret-bytes");
        // тот же конверт под чужим именем не откроется
        assert!(s.open("InitialKey", &sealed).is_err());
    }

    #[test]
    fn wrong_kek_fails() {
        let sealed = StaticKeySealer::new([1; 32]).seal("k", b"v").unwrap();
        assert!(StaticKeySealer::new([2; 32]).open("k", &sealed).is_err());
    }

    #[test]
    fn env_sealer_reads_hex() {
        std::env::set_var("CHAINLOG_KEK_HEX", "33".repeat(32));
        let s = EnvKeySealer::from_env().expect("sealer from env");
        let sealed = s.seal("n", b"payload").unwrap();
        assert_eq!(s.open("n", &sealed).unwrap(), b"payload");
    }
}
