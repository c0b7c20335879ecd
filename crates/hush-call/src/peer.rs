use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::IceServer;
use crate::media::{MediaStream, MediaTrack};
use crate::session::SessionEvent;

/// Something a peer connection wants the session to know.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// Local SDP/ICE to forward to the remote side as `call_signal`
    Signal(serde_json::Value),
    RemoteStream(MediaStream),
    Failed(String),
    Closed,
}

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct PeerError(pub String);

/// Posts [`PeerEvent`]s into the owning session's queue.
#[derive(Clone)]
pub struct PeerEventSink {
    inbox: mpsc::UnboundedSender<SessionEvent>,
}

impl PeerEventSink {
    pub(crate) fn new(inbox: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { inbox }
    }

    /// Returns false once the session has ended. A remote stream delivered
    /// after that is stopped here.
    pub fn emit(&self, event: PeerEvent) -> bool {
        match self.inbox.send(SessionEvent::Peer(event)) {
            Ok(()) => true,
            Err(mpsc::error::SendError(SessionEvent::Peer(PeerEvent::RemoteStream(stream)))) => {
                stream.stop_all();
                false
            }
            Err(_) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }
}

impl std::fmt::Debug for PeerEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerEventSink")
            .field("closed", &self.inbox.is_closed())
            .finish()
    }
}

/// Everything needed to open one peer connection.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// The initiator produces the offer
    pub initiator: bool,
    pub ice_servers: Vec<IceServer>,
    pub local_stream: MediaStream,
    pub events: PeerEventSink,
}

#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(&self, config: PeerConfig) -> Result<Box<dyn PeerConnection>, PeerError>;
}

/// A live peer connection, exclusively owned by one session.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Apply a remote SDP/ICE payload.
    async fn apply_signal(&mut self, signal: serde_json::Value) -> Result<(), PeerError>;

    /// Swap the outgoing video track without renegotiation.
    async fn replace_video_track(&mut self, track: Arc<dyn MediaTrack>) -> Result<(), PeerError>;

    async fn close(&mut self);
}
