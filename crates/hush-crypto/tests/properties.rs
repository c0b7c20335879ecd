//! Property-based checks for payload encryption.

use hush_crypto::{CryptoError, EncryptedPayload, KeyService, SymmetricKey, decrypt, encrypt};
use proptest::prelude::*;

fn key_from(seed: [u8; 32]) -> SymmetricKey {
    SymmetricKey::from_bytes(seed)
}

proptest! {
    /// decrypt(encrypt(p, k), k) == p
    #[test]
    fn roundtrip(
        plaintext in prop::collection::vec(any::<u8>(), 0..2048),
        seed in any::<[u8; 32]>(),
    ) {
        let key = key_from(seed);
        let payload = encrypt(&plaintext, &key).unwrap();
        prop_assert_eq!(decrypt(&payload, &key).unwrap(), plaintext);
    }

    /// Flipping any ciphertext bit is detected
    #[test]
    fn tamper_detected(
        plaintext in prop::collection::vec(any::<u8>(), 1..512),
        flip in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let key = KeyService::new().generate_symmetric_key().unwrap();
        let payload = encrypt(&plaintext, &key).unwrap();

        let (ct, iv) = payload.to_base64();
        let mut raw = base64_decode(&ct);
        let idx = flip.index(raw.len());
        raw[idx] ^= 1 << bit;
        let tampered = EncryptedPayload::from_base64(&base64_encode(&raw), &iv).unwrap();

        prop_assert!(matches!(decrypt(&tampered, &key), Err(CryptoError::DecryptionFailed)));
    }

    /// A different key never authenticates
    #[test]
    fn wrong_key_rejected(plaintext in prop::collection::vec(any::<u8>(), 0..256)) {
        let keys = KeyService::new();
        let right = keys.generate_symmetric_key().unwrap();
        let wrong = keys.generate_symmetric_key().unwrap();
        let payload = encrypt(&plaintext, &right).unwrap();
        prop_assert!(decrypt(&payload, &wrong).is_err());
    }
}

fn base64_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}

fn base64_decode(data: &str) -> Vec<u8> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(data).unwrap()
}
