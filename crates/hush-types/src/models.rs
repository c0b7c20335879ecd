use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, MessageId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
}

/// A conversation key encrypted under one participant's public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedKey {
    pub recipient_id: UserId,
    /// base64 RSA-OAEP ciphertext of the raw 32-byte key
    pub ciphertext: String,
}

/// Summary shown in conversation lists. The preview is ciphertext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub sender_id: UserId,
    pub preview: String,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
}

/// Conversation as handed to the persistence layer.
/// The store only ever sees wrapped keys, never a usable conversation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub id: ConversationId,
    pub participants: Vec<UserId>,
    pub encrypted_keys: HashMap<UserId, WrappedKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<LastMessage>,
    pub is_group: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn wrapped_key_for(&self, user_id: &UserId) -> Option<&WrappedKey> {
        self.encrypted_keys.get(user_id)
    }

    /// Record `message` as the latest one and bump `updated_at`.
    pub fn set_last_message(&mut self, message: &MessageRecord) {
        self.last_message = Some(LastMessage {
            sender_id: message.sender_id.clone(),
            preview: message.ciphertext.clone(),
            timestamp: message.timestamp,
            status: message.status,
        });
        self.updated_at = message.timestamp;
    }
}

/// Messages handed to the store are always encrypted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    /// base64 AES-GCM ciphertext (tag appended)
    pub ciphertext: String,
    /// base64 96-bit IV
    pub iv: String,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
}
