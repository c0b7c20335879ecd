/// hush call signaling
///
/// Negotiates one-to-one audio/video calls over the signaling relay. Each call
/// is a `CallSession` task that owns its media and peer connection and
/// consumes one event queue; the `CallOrchestrator` owns the session map and
/// routes relay envelopes to it.
///
/// Media capture and the peer connection itself sit behind the
/// `MediaDevices` and `PeerConnector` traits.

pub mod config;
pub mod error;
pub mod media;
pub mod orchestrator;
pub mod peer;
mod session;
pub mod state;

pub use config::{CallConfig, IceServer};
pub use error::{CallError, CallResult};
pub use media::{
    MediaConstraints, MediaDeviceInfo, MediaDevices, MediaError, MediaStream, MediaTrack,
    SyntheticTrack, TrackKind, VideoSource,
};
pub use orchestrator::CallOrchestrator;
pub use peer::{PeerConfig, PeerConnection, PeerConnector, PeerError, PeerEvent, PeerEventSink};
pub use state::{CallDirection, CallEvent, CallSnapshot, CallState, EndReason};
