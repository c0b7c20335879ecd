use thiserror::Error;

use hush_relay::RelayError;
use hush_types::UserId;

use crate::media::MediaError;
use crate::state::{CallState, EndReason};

#[derive(Debug, Error)]
pub enum CallError {
    #[error("media access denied: {0}")]
    MediaAccessDenied(#[from] MediaError),

    #[error("negotiation failed: {0}")]
    NegotiationFailed(String),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("already in a call")]
    Busy,

    #[error("no call with {0}")]
    NoSession(UserId),

    #[error("cannot {action} while call is {state}")]
    InvalidState { action: &'static str, state: CallState },

    #[error("not a video call")]
    NotVideoCall,

    #[error("cannot call yourself")]
    SelfCall,

    /// The session reached `Ended` before the request completed.
    #[error("call ended: {0}")]
    CallEnded(EndReason),
}

pub type CallResult<T> = Result<T, CallError>;
