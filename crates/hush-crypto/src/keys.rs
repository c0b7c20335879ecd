use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand_core::{OsRng, RngCore};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use hush_types::{UserId, WrappedKey};

use crate::error::{CryptoError, CryptoResult};

pub const RSA_MODULUS_BITS: usize = 2048;
pub const SYMMETRIC_KEY_LEN: usize = 32;

/// RSA-OAEP public key. Exported as base64 SPKI DER.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    pub fn to_base64(&self) -> CryptoResult<String> {
        let der = self
            .0
            .to_public_key_der()
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(BASE64.encode(der.as_bytes()))
    }

    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let der = BASE64.decode(encoded.trim())?;
        RsaPublicKey::from_public_key_der(&der)
            .map(Self)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }
}

/// RSA-OAEP private key. Exported as base64 PKCS#8 DER.
/// Never leaves the device that generated it.
#[derive(Clone)]
pub struct PrivateKey(RsaPrivateKey);

impl PrivateKey {
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.to_public_key())
    }

    pub fn to_base64(&self) -> CryptoResult<String> {
        let der = self
            .0
            .to_pkcs8_der()
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(BASE64.encode(der.as_bytes()))
    }

    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let der = Zeroizing::new(BASE64.decode(encoded.trim())?);
        RsaPrivateKey::from_pkcs8_der(&der)
            .map(Self)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}

/// 256-bit AES-GCM key. Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_LEN]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; SYMMETRIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_LEN] {
        &self.0
    }

    /// Encode the raw key to base64.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let bytes = Zeroizing::new(BASE64.decode(encoded.trim())?);
        Self::from_slice(&bytes)
    }

    fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let key: [u8; SYMMETRIC_KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "expected {} key bytes, got {}",
                SYMMETRIC_KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Generates, wraps and unwraps key material. Stateless; no I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyService;

impl KeyService {
    pub fn new() -> Self {
        Self
    }

    /// Generate a 2048-bit RSA-OAEP key pair on the blocking pool.
    pub async fn generate_asymmetric_key_pair(&self) -> CryptoResult<KeyPair> {
        tokio::task::spawn_blocking(generate_key_pair_blocking)
            .await
            .map_err(|e| CryptoError::KeyGeneration(format!("key generation task failed: {}", e)))?
    }

    pub fn generate_symmetric_key(&self) -> CryptoResult<SymmetricKey> {
        let mut key = [0u8; SYMMETRIC_KEY_LEN];
        OsRng
            .try_fill_bytes(&mut key)
            .map_err(|e| CryptoError::CryptoUnavailable(e.to_string()))?;
        Ok(SymmetricKey(key))
    }

    /// Encrypt `key` under the recipient's public key (RSA-OAEP, SHA-256).
    pub fn wrap_symmetric_key(
        &self,
        key: &SymmetricKey,
        recipient_id: &UserId,
        recipient_public: &PublicKey,
    ) -> CryptoResult<WrappedKey> {
        let ciphertext = recipient_public
            .0
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key.as_bytes())
            .map_err(|e| CryptoError::KeyWrap(e.to_string()))?;

        Ok(WrappedKey {
            recipient_id: recipient_id.clone(),
            ciphertext: BASE64.encode(ciphertext),
        })
    }

    pub fn unwrap_symmetric_key(
        &self,
        wrapped: &WrappedKey,
        own_private: &PrivateKey,
    ) -> CryptoResult<SymmetricKey> {
        self.unwrap_ciphertext(&wrapped.ciphertext, own_private)
    }

    /// Unwrap a bare base64 RSA-OAEP ciphertext, as found in
    /// [`WrappedKey::ciphertext`].
    pub fn unwrap_ciphertext(
        &self,
        ciphertext: &str,
        own_private: &PrivateKey,
    ) -> CryptoResult<SymmetricKey> {
        let ciphertext = BASE64.decode(ciphertext.trim())?;
        let raw = own_private
            .0
            .decrypt(Oaep::new::<Sha256>(), &ciphertext)
            .map(Zeroizing::new)
            .map_err(|e| CryptoError::KeyUnwrap(e.to_string()))?;

        SymmetricKey::from_slice(&raw).map_err(|_| {
            CryptoError::KeyUnwrap(format!("unwrapped key has {} bytes", raw.len()))
        })
    }
}

fn generate_key_pair_blocking() -> CryptoResult<KeyPair> {
    let mut scratch = [0u8; 1];
    OsRng
        .try_fill_bytes(&mut scratch)
        .map_err(|e| CryptoError::CryptoUnavailable(e.to_string()))?;

    let private = RsaPrivateKey::new(&mut OsRng, RSA_MODULUS_BITS)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let public = private.to_public_key();
    debug!("Generated {}-bit RSA-OAEP key pair", RSA_MODULUS_BITS);

    Ok(KeyPair {
        public: PublicKey(public),
        private: PrivateKey(private),
    })
}
