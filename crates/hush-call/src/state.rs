use std::fmt;

use hush_types::{CallId, CallType, UserId};

use crate::media::MediaStream;

/// Lifecycle of a single call attempt. `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallState {
    Idle,
    OutgoingRinging,
    IncomingRinging,
    Connecting,
    Active,
    Ended,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended)
    }

    pub fn is_ringing(self) -> bool {
        matches!(self, Self::OutgoingRinging | Self::IncomingRinging)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::OutgoingRinging => "outgoing-ringing",
            Self::IncomingRinging => "incoming-ringing",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Ended => "ended",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallDirection {
    Outgoing,
    Incoming,
}

/// Why a call ended. Shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndReason {
    LocalHangup,
    RemoteHangup,
    /// The peer declined our call (or was busy)
    Declined,
    /// We declined the incoming call
    Rejected,
    MediaAccessDenied,
    NegotiationFailed,
    ConnectionLost,
    RelayDisconnected,
    Timeout,
    /// Lost a call glare to the peer's own call
    Superseded,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::LocalHangup => "call ended",
            Self::RemoteHangup => "the other side hung up",
            Self::Declined => "call declined",
            Self::Rejected => "call rejected",
            Self::MediaAccessDenied => "microphone/camera unavailable",
            Self::NegotiationFailed => "connection could not be established",
            Self::ConnectionLost => "connection lost",
            Self::RelayDisconnected => "disconnected from server",
            Self::Timeout => "no answer",
            Self::Superseded => "replaced by incoming call",
        };
        f.write_str(text)
    }
}

/// Read-only view of a session handed to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSnapshot {
    pub call_id: CallId,
    pub peer: UserId,
    pub call_type: CallType,
    pub direction: CallDirection,
    pub state: CallState,
    pub muted: bool,
    pub video_enabled: bool,
    pub has_local_stream: bool,
    pub has_remote_stream: bool,
    pub end_reason: Option<EndReason>,
}

/// Notifications for the UI layer.
#[derive(Debug, Clone)]
pub enum CallEvent {
    IncomingCall {
        call_id: CallId,
        from: UserId,
        call_type: CallType,
    },
    StateChanged {
        call_id: CallId,
        peer: UserId,
        state: CallState,
    },
    RemoteStream {
        call_id: CallId,
        peer: UserId,
        stream: MediaStream,
    },
    Ended {
        call_id: CallId,
        peer: UserId,
        reason: EndReason,
    },
}

impl CallEvent {
    pub fn call_id(&self) -> CallId {
        match self {
            Self::IncomingCall { call_id, .. }
            | Self::StateChanged { call_id, .. }
            | Self::RemoteStream { call_id, .. }
            | Self::Ended { call_id, .. } => *call_id,
        }
    }
}
