use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand_core::{OsRng, RngCore};

use crate::error::{CryptoError, CryptoResult};
use crate::keys::SymmetricKey;

/// AES-GCM IV length (96 bits).
pub const IV_LEN: usize = 12;

/// Output of [`encrypt`]. The IV is always generated internally;
/// a payload can only be built from an encryption or parsed from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    ciphertext: Vec<u8>,
    iv: [u8; IV_LEN],
}

impl EncryptedPayload {
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    /// base64 (ciphertext, iv) as stored in message records.
    pub fn to_base64(&self) -> (String, String) {
        (BASE64.encode(&self.ciphertext), BASE64.encode(self.iv))
    }

    /// Parse a stored payload. A malformed IV can never authenticate,
    /// so it is reported as a decryption failure.
    pub fn from_base64(ciphertext: &str, iv: &str) -> CryptoResult<Self> {
        let ciphertext = BASE64
            .decode(ciphertext.trim())
            .map_err(|_| CryptoError::DecryptionFailed)?;
        let iv: [u8; IV_LEN] = BASE64
            .decode(iv.trim())
            .map_err(|_| CryptoError::DecryptionFailed)?
            .try_into()
            .map_err(|_| CryptoError::DecryptionFailed)?;
        Ok(Self { ciphertext, iv })
    }
}

/// Encrypt a plaintext message with AES-256-GCM under a fresh random IV.
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> CryptoResult<EncryptedPayload> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    let mut iv = [0u8; IV_LEN];
    OsRng
        .try_fill_bytes(&mut iv)
        .map_err(|e| CryptoError::CryptoUnavailable(e.to_string()))?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(EncryptedPayload { ciphertext, iv })
}

/// Decrypt and authenticate a payload.
pub fn decrypt(payload: &EncryptedPayload, key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    cipher
        .decrypt(Nonce::from_slice(&payload.iv), payload.ciphertext.as_slice())
        .map_err(|_| CryptoError::DecryptionFailed)
}
