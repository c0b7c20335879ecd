use hush_types::{ConversationId, UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// The OS random source could not be read.
    #[error("platform crypto unavailable: {0}")]
    CryptoUnavailable(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("failed to wrap key: {0}")]
    KeyWrap(String),

    #[error("failed to unwrap key: {0}")]
    KeyUnwrap(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Authentication failed: wrong key, corrupted or tampered payload.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("conversation {0} already has a key on this device")]
    ConversationExists(ConversationId),

    #[error("no key for conversation {0}")]
    UnknownConversation(ConversationId),

    #[error("conversation {conversation_id} has no wrapped key for {user_id}")]
    MissingWrappedKey {
        conversation_id: ConversationId,
        user_id: UserId,
    },

    #[error("base64 decode failed: {0}")]
    Encoding(#[from] base64::DecodeError),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
