use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, MessageId, UserId};
use crate::models::MessageStatus;

/// Media requested for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Audio,
    Video,
}

impl CallType {
    pub fn has_video(self) -> bool {
        matches!(self, Self::Video)
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// Envelopes exchanged with peers through the relay.
///
/// Serialized internally tagged, e.g.
/// `{"kind":"call_request","from":"a","to":"b","type":"video"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SignalEnvelope {
    /// Caller asks the callee to ring
    CallRequest {
        from: UserId,
        to: UserId,
        #[serde(rename = "type")]
        call_type: CallType,
    },

    /// Opaque SDP/ICE payload produced by the peer connection
    CallSignal {
        from: UserId,
        to: UserId,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        call_type: Option<CallType>,
        signal: serde_json::Value,
    },

    CallAccepted { from: UserId, to: UserId },

    CallRejected { from: UserId, to: UserId },

    CallEnded { from: UserId, to: UserId },

    /// A user is typing. `to` is absent when the relay fans out to the
    /// whole conversation.
    Typing {
        conversation_id: ConversationId,
        user_id: UserId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<UserId>,
    },

    /// Delivery/read receipt for a message
    MessageStatusUpdate {
        message_id: MessageId,
        status: MessageStatus,
        conversation_id: ConversationId,
        user_id: UserId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<UserId>,
    },
}

/// Discriminant of [`SignalEnvelope`], used as the relay dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    CallRequest,
    CallSignal,
    CallAccepted,
    CallRejected,
    CallEnded,
    Typing,
    MessageStatusUpdate,
}

impl EnvelopeKind {
    pub const ALL: [EnvelopeKind; 7] = [
        Self::CallRequest,
        Self::CallSignal,
        Self::CallAccepted,
        Self::CallRejected,
        Self::CallEnded,
        Self::Typing,
        Self::MessageStatusUpdate,
    ];

    /// Kinds that drive the call state machine.
    pub const CALL: [EnvelopeKind; 5] = [
        Self::CallRequest,
        Self::CallSignal,
        Self::CallAccepted,
        Self::CallRejected,
        Self::CallEnded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CallRequest => "call_request",
            Self::CallSignal => "call_signal",
            Self::CallAccepted => "call_accepted",
            Self::CallRejected => "call_rejected",
            Self::CallEnded => "call_ended",
            Self::Typing => "typing",
            Self::MessageStatusUpdate => "message_status_update",
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SignalEnvelope {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Self::CallRequest { .. } => EnvelopeKind::CallRequest,
            Self::CallSignal { .. } => EnvelopeKind::CallSignal,
            Self::CallAccepted { .. } => EnvelopeKind::CallAccepted,
            Self::CallRejected { .. } => EnvelopeKind::CallRejected,
            Self::CallEnded { .. } => EnvelopeKind::CallEnded,
            Self::Typing { .. } => EnvelopeKind::Typing,
            Self::MessageStatusUpdate { .. } => EnvelopeKind::MessageStatusUpdate,
        }
    }

    /// The user who produced this envelope.
    pub fn sender(&self) -> &UserId {
        match self {
            Self::CallRequest { from, .. }
            | Self::CallSignal { from, .. }
            | Self::CallAccepted { from, .. }
            | Self::CallRejected { from, .. }
            | Self::CallEnded { from, .. } => from,
            Self::Typing { user_id, .. } | Self::MessageStatusUpdate { user_id, .. } => user_id,
        }
    }

    /// The targeted recipient. `None` means "everyone in the conversation".
    pub fn recipient(&self) -> Option<&UserId> {
        match self {
            Self::CallRequest { to, .. }
            | Self::CallSignal { to, .. }
            | Self::CallAccepted { to, .. }
            | Self::CallRejected { to, .. }
            | Self::CallEnded { to, .. } => Some(to),
            Self::Typing { to, .. } | Self::MessageStatusUpdate { to, .. } => to.as_ref(),
        }
    }

    pub fn call_request(from: &UserId, to: &UserId, call_type: CallType) -> Self {
        Self::CallRequest {
            from: from.clone(),
            to: to.clone(),
            call_type,
        }
    }

    pub fn call_signal(
        from: &UserId,
        to: &UserId,
        call_type: CallType,
        signal: serde_json::Value,
    ) -> Self {
        Self::CallSignal {
            from: from.clone(),
            to: to.clone(),
            call_type: Some(call_type),
            signal,
        }
    }

    pub fn call_accepted(from: &UserId, to: &UserId) -> Self {
        Self::CallAccepted {
            from: from.clone(),
            to: to.clone(),
        }
    }

    pub fn call_rejected(from: &UserId, to: &UserId) -> Self {
        Self::CallRejected {
            from: from.clone(),
            to: to.clone(),
        }
    }

    pub fn call_ended(from: &UserId, to: &UserId) -> Self {
        Self::CallEnded {
            from: from.clone(),
            to: to.clone(),
        }
    }
}
