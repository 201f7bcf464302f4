//! crypto/signing — ed25519 ключи для строк подписи.
//!
//! Пара создаётся один раз (keygen) и переживает ротации файлов.
//! Без приватной половины ключи работают в режиме verify-only.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::Zeroize;

use crate::error::{AuditLogError, Result};

pub const SIGNATURE_LEN: usize = 64;

#[derive(Clone)]
pub struct SigningKeys {
    signing: Option<SigningKey>,
    verifying: VerifyingKey,
}

impl SigningKeys {
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        let verifying = signing.verifying_key();
        Self {
            signing: Some(signing),
            verifying,
        }
    }

    /// Восстановить пару из 32-байтного seed приватного ключа.
    pub fn from_secret(secret: &[u8]) -> Result<Self> {
        let mut seed: [u8; 32] = secret
            .try_into()
            .map_err(|_| AuditLogError::Crypto(format!("bad signing key len {}", secret.len())))?;
        let signing = SigningKey::from_bytes(&seed);
        seed.zeroize();
        let verifying = signing.verifying_key();
        Ok(Self {
            signing: Some(signing),
            verifying,
        })
    }

    /// Только публичный ключ: подписывать нельзя, проверять можно.
    pub fn verify_only(public: &[u8]) -> Result<Self> {
        let pk: [u8; 32] = public
            .try_into()
            .map_err(|_| AuditLogError::Crypto(format!("bad public key len {}", public.len())))?;
        let verifying = VerifyingKey::from_bytes(&pk)
            .map_err(|e| AuditLogError::Crypto(format!("public key: {}", e)))?;
        Ok(Self {
            signing: None,
            verifying,
        })
    }

    pub fn can_sign(&self) -> bool {
        self.signing.is_some()
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.verifying.to_bytes()
    }

    pub fn secret_bytes(&self) -> Option<[u8; 32]> {
        self.signing.as_ref().map(|s| s.to_bytes())
    }

    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signing = self
            .signing
            .as_ref()
            .ok_or_else(|| AuditLogError::Crypto("signing is not enabled, verify mode only".into()))?;
        Ok(signing.sign(data).to_bytes().to_vec())
    }

    /// false при неверной подписи; Err только при некорректной длине подписи.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool> {
        let raw: [u8; SIGNATURE_LEN] = signature.try_into().map_err(|_| {
            AuditLogError::Crypto(format!("bad signature len {}", signature.len()))
        })?;
        let sig = Signature::from_bytes(&raw);
        Ok(self.verifying.verify(data, &sig).is_ok())
    }
}

impl std::fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeys")
            .field("can_sign", &self.can_sign())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_and_verify_only() {
        let keys = SigningKeys::generate();
        let sig = keys.sign(b"chain tip").unwrap();
        assert!(keys.verify(b"chain tip", &sig).unwrap());
        assert!(!keys.verify(b"chain tap", &sig).unwrap());

        let ro = SigningKeys::verify_only(&keys.public_bytes()).unwrap();
        assert!(ro.verify(b"chain tip", &sig).unwrap());
        assert!(ro.sign(b"x").is_err());
    }

    #[test]
    fn secret_roundtrip_keeps_public_key() {
        let keys = SigningKeys::generate();
        let again = SigningKeys::from_secret(&keys.secret_bytes().unwrap()).unwrap();
        assert_eq!(keys.public_bytes(), again.public_bytes());
    }

    #[test]
    fn short_signature_is_crypto_error() {
        let keys = SigningKeys::generate();
        assert!(matches!(keys.verify(b"x", &[0u8; 3]), Err(AuditLogError::Crypto(_))));
    }
}
