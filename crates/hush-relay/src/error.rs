use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The transport reported a disconnect; nothing is queued for later.
    #[error("relay disconnected")]
    Disconnected,

    #[error("failed to connect to relay: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("envelope codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

pub type RelayResult<T> = Result<T, RelayError>;
