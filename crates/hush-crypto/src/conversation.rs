use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use hush_types::{
    ConversationId, ConversationRecord, MessageId, MessageRecord, MessageStatus, UserId,
    WrappedKey,
};

use crate::encrypt::{self, EncryptedPayload};
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{KeyService, PrivateKey, PublicKey, SymmetricKey};

/// How a stored message should be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageView {
    Plaintext(String),
    /// Failed authentication. Never rendered as ciphertext.
    Undecryptable,
}

/// Owns this device's unwrapped conversation keys.
///
/// Each conversation key is written once (on creation or first unwrap) and
/// then only read, so many encrypt/decrypt calls can proceed concurrently.
pub struct ConversationCryptoManager {
    user_id: UserId,
    private_key: PrivateKey,
    keys: KeyService,
    cache: RwLock<HashMap<ConversationId, Arc<SymmetricKey>>>,
}

impl ConversationCryptoManager {
    pub fn new(user_id: UserId, private_key: PrivateKey, keys: KeyService) -> Self {
        Self {
            user_id,
            private_key,
            keys,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Generate a fresh conversation key and wrap it for `recipient_id`.
    ///
    /// Every call produces a new, unrelated key. Call it once per
    /// (conversation, recipient) pair.
    pub fn setup_conversation(
        &self,
        recipient_id: &UserId,
        recipient_public: &PublicKey,
    ) -> CryptoResult<(SymmetricKey, WrappedKey)> {
        let key = self.keys.generate_symmetric_key()?;
        let wrapped = self
            .keys
            .wrap_symmetric_key(&key, recipient_id, recipient_public)?;
        Ok((key, wrapped))
    }

    pub fn encrypt(plaintext: &str, key: &SymmetricKey) -> CryptoResult<EncryptedPayload> {
        encrypt::encrypt(plaintext.as_bytes(), key)
    }

    pub fn decrypt(payload: &EncryptedPayload, key: &SymmetricKey) -> CryptoResult<String> {
        let plaintext = encrypt::decrypt(payload, key)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
    }

    /// Create a conversation keyed for every participant, including this
    /// device's user, and cache the key locally.
    pub async fn create_conversation(
        &self,
        conversation_id: ConversationId,
        participants: &[(UserId, PublicKey)],
    ) -> CryptoResult<ConversationRecord> {
        let key = self.keys.generate_symmetric_key()?;

        let mut encrypted_keys = HashMap::with_capacity(participants.len() + 1);
        for (user_id, public) in participants {
            let wrapped = self.keys.wrap_symmetric_key(&key, user_id, public)?;
            encrypted_keys.insert(user_id.clone(), wrapped);
        }
        if !encrypted_keys.contains_key(&self.user_id) {
            let own = self.keys.wrap_symmetric_key(
                &key,
                &self.user_id,
                &self.private_key.public_key(),
            )?;
            encrypted_keys.insert(self.user_id.clone(), own);
        }

        {
            let mut cache = self.cache.write().await;
            match cache.entry(conversation_id.clone()) {
                Entry::Occupied(_) => return Err(CryptoError::ConversationExists(conversation_id)),
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(key));
                }
            }
        }

        let mut participant_ids: Vec<UserId> =
            participants.iter().map(|(id, _)| id.clone()).collect();
        if !participant_ids.contains(&self.user_id) {
            participant_ids.insert(0, self.user_id.clone());
        }

        info!(
            "Created conversation {} with {} participants",
            conversation_id,
            participant_ids.len()
        );

        let now = Utc::now();
        Ok(ConversationRecord {
            id: conversation_id,
            is_group: participant_ids.len() > 2,
            participants: participant_ids,
            encrypted_keys,
            last_message: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Unwrap this device's copy of the conversation key and cache it.
    /// If a key is already cached it stays canonical.
    pub async fn open_conversation(&self, record: &ConversationRecord) -> CryptoResult<()> {
        if self.cache.read().await.contains_key(&record.id) {
            return Ok(());
        }

        let wrapped = record
            .wrapped_key_for(&self.user_id)
            .ok_or_else(|| CryptoError::MissingWrappedKey {
                conversation_id: record.id.clone(),
                user_id: self.user_id.clone(),
            })?;
        let key = self.keys.unwrap_symmetric_key(wrapped, &self.private_key)?;

        let mut cache = self.cache.write().await;
        if let Entry::Vacant(slot) = cache.entry(record.id.clone()) {
            slot.insert(Arc::new(key));
            debug!("Cached key for conversation {}", record.id);
        }
        Ok(())
    }

    pub async fn has_conversation(&self, conversation_id: &ConversationId) -> bool {
        self.cache.read().await.contains_key(conversation_id)
    }

    pub async fn forget_conversation(&self, conversation_id: &ConversationId) {
        if self.cache.write().await.remove(conversation_id).is_some() {
            debug!("Dropped key for conversation {}", conversation_id);
        }
    }

    async fn key_for(&self, conversation_id: &ConversationId) -> CryptoResult<Arc<SymmetricKey>> {
        self.cache
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| CryptoError::UnknownConversation(conversation_id.clone()))
    }

    /// Encrypt `plaintext` into a message record ready for the store.
    pub async fn seal_message(
        &self,
        conversation_id: &ConversationId,
        plaintext: &str,
    ) -> CryptoResult<MessageRecord> {
        let key = self.key_for(conversation_id).await?;
        let (ciphertext, iv) = Self::encrypt(plaintext, &key)?.to_base64();

        Ok(MessageRecord {
            id: MessageId::generate(),
            conversation_id: conversation_id.clone(),
            sender_id: self.user_id.clone(),
            ciphertext,
            iv,
            timestamp: Utc::now(),
            status: MessageStatus::Sending,
        })
    }

    pub async fn open_message(&self, record: &MessageRecord) -> CryptoResult<String> {
        let key = self.key_for(&record.conversation_id).await?;
        let payload = EncryptedPayload::from_base64(&record.ciphertext, &record.iv)?;
        Self::decrypt(&payload, &key)
    }

    /// Decrypt for display. Payloads that fail authentication become
    /// [`MessageView::Undecryptable`]; anything else (such as a conversation
    /// that was never opened on this device) is returned as an error.
    pub async fn view_message(&self, record: &MessageRecord) -> CryptoResult<MessageView> {
        match self.open_message(record).await {
            Ok(text) => Ok(MessageView::Plaintext(text)),
            Err(CryptoError::DecryptionFailed) => {
                warn!(
                    "Message {} in {} from {} is undecryptable",
                    record.id, record.conversation_id, record.sender_id
                );
                Ok(MessageView::Undecryptable)
            }
            Err(e) => Err(e),
        }
    }
}
