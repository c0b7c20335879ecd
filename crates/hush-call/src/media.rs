use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use hush_types::CallType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A capture track. Implementations wrap the platform track object.
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn kind(&self) -> TrackKind;
    /// Capture device backing this track, if known.
    fn device_id(&self) -> Option<&str>;
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
    /// Release the device. Idempotent.
    fn stop(&self);
    fn is_stopped(&self) -> bool;
}

/// Ordered set of tracks from one capture or one remote peer.
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl MediaStream {
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    pub fn set_audio_enabled(&self, enabled: bool) {
        self.audio_tracks().for_each(|t| t.set_enabled(enabled));
    }

    pub fn set_video_enabled(&self, enabled: bool) {
        self.video_tracks().for_each(|t| t.set_enabled(enabled));
    }

    pub fn stop_all(&self) {
        self.tracks.iter().for_each(|t| t.stop());
    }

    /// Swap the first video track for `track`, returning the old one.
    /// Appends when the stream had no video.
    pub fn replace_video_track(
        &mut self,
        track: Arc<dyn MediaTrack>,
    ) -> Option<Arc<dyn MediaTrack>> {
        match self.tracks.iter().position(|t| t.kind() == TrackKind::Video) {
            Some(idx) => Some(std::mem::replace(&mut self.tracks[idx], track)),
            None => {
                self.tracks.push(track);
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    Default,
    Device(String),
}

/// What to capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: Option<VideoSource>,
}

impl MediaConstraints {
    /// Audio always; video only for video calls.
    pub fn for_call(call_type: CallType) -> Self {
        Self {
            audio: true,
            video: call_type.has_video().then_some(VideoSource::Default),
        }
    }

    /// Video only, from a specific camera.
    pub fn camera(device_id: impl Into<String>) -> Self {
        Self {
            audio: false,
            video: Some(VideoSource::Device(device_id.into())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDeviceInfo {
    pub device_id: String,
    pub label: String,
}

#[derive(Debug, Clone, Error)]
pub enum MediaError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("capture failed: {0}")]
    Capture(String),
}

/// Platform capture devices.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn acquire(&self, constraints: MediaConstraints) -> Result<MediaStream, MediaError>;

    async fn video_inputs(&self) -> Result<Vec<MediaDeviceInfo>, MediaError>;
}

/// Track with no device behind it. Used for headless peers and tests.
#[derive(Debug)]
pub struct SyntheticTrack {
    id: String,
    kind: TrackKind,
    device_id: Option<String>,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl SyntheticTrack {
    pub fn new(kind: TrackKind, device_id: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            kind,
            device_id,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        })
    }
}

impl MediaTrack for SyntheticTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
