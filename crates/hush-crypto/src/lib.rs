/// hush crypto library
///
/// Per-conversation AES-256-GCM keys, distributed by wrapping them with each
/// participant's RSA-OAEP (SHA-256) public key.
///
/// - `keys`: key generation, wrapping, and base64 import/export
/// - `encrypt`: payload encryption with a fresh random IV per call
/// - `conversation`: the device-local conversation key cache and message sealing

pub mod conversation;
pub mod encrypt;
pub mod error;
pub mod keys;

pub use conversation::{ConversationCryptoManager, MessageView};
pub use encrypt::{EncryptedPayload, IV_LEN, decrypt, encrypt};
pub use error::{CryptoError, CryptoResult};
pub use keys::{KeyPair, KeyService, PrivateKey, PublicKey, SymmetricKey};
