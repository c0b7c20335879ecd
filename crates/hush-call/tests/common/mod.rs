//! Fake media devices and peer connections for driving calls end to end
//! over a loopback relay.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};

use hush_call::{
    CallConfig, CallEvent, CallOrchestrator, MediaConstraints, MediaDeviceInfo, MediaDevices,
    MediaError, MediaStream, MediaTrack, PeerConfig, PeerConnection, PeerConnector, PeerError,
    PeerEvent, PeerEventSink, SyntheticTrack, TrackKind, VideoSource,
};
use hush_relay::{LoopbackHub, SignalingRelay};
use hush_types::{EnvelopeKind, SignalEnvelope, UserId};

/// Capture devices backed by synthetic tracks.
#[derive(Default)]
pub struct FakeMedia {
    cameras: Mutex<Vec<String>>,
    deny: AtomicBool,
    /// Camera ids whose capture fails
    broken: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
    captured: Mutex<Vec<MediaStream>>,
}

impl FakeMedia {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            cameras: Mutex::new(vec!["front".into()]),
            ..Default::default()
        })
    }

    pub fn with_cameras(ids: &[&str]) -> Arc<Self> {
        let media = Self::new();
        *media.cameras.lock() = ids.iter().map(|s| s.to_string()).collect();
        media
    }

    pub fn deny(&self) {
        self.deny.store(true, Ordering::SeqCst);
    }

    pub fn break_camera(&self, id: &str) {
        self.broken.lock().push(id.into());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Every stream handed out so far.
    pub fn captured(&self) -> Vec<MediaStream> {
        self.captured.lock().clone()
    }

    pub fn all_stopped(&self) -> bool {
        self.captured
            .lock()
            .iter()
            .all(|s| s.tracks().iter().all(|t| t.is_stopped()))
    }
}

#[async_trait]
impl MediaDevices for FakeMedia {
    async fn acquire(&self, constraints: MediaConstraints) -> Result<MediaStream, MediaError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.deny.load(Ordering::SeqCst) {
            return Err(MediaError::PermissionDenied("user dismissed the prompt".into()));
        }

        let mut tracks: Vec<Arc<dyn MediaTrack>> = Vec::new();
        if constraints.audio {
            tracks.push(SyntheticTrack::new(TrackKind::Audio, Some("mic".into())));
        }
        if let Some(source) = constraints.video {
            let device = match source {
                VideoSource::Default => self.cameras.lock().first().cloned(),
                VideoSource::Device(id) => Some(id),
            };
            if let Some(id) = &device {
                if self.broken.lock().contains(id) {
                    return Err(MediaError::Capture(format!("{} is busy", id)));
                }
            }
            tracks.push(SyntheticTrack::new(TrackKind::Video, device));
        }

        let stream = MediaStream::new(tracks);
        self.captured.lock().push(stream.clone());
        Ok(stream)
    }

    async fn video_inputs(&self) -> Result<Vec<MediaDeviceInfo>, MediaError> {
        Ok(self
            .cameras
            .lock()
            .iter()
            .map(|id| MediaDeviceInfo {
                device_id: id.clone(),
                label: format!("Camera {}", id),
            })
            .collect())
    }
}

/// What a test can observe about one fake peer connection.
#[derive(Clone)]
pub struct PeerRecord {
    pub initiator: bool,
    pub closed: Arc<AtomicBool>,
    pub applied: Arc<Mutex<Vec<serde_json::Value>>>,
    pub replaced: Arc<Mutex<Vec<String>>>,
    pub remote: Arc<Mutex<Option<MediaStream>>>,
    pub events: PeerEventSink,
}

/// Offer/answer exchange without any networking: the initiator emits an
/// offer, the answerer replies with an answer, and both sides "receive"
/// a remote stream once they hold the other side's description.
#[derive(Default)]
pub struct FakeConnector {
    peers: Mutex<Vec<PeerRecord>>,
    fail_connect: AtomicBool,
    fail_replace: AtomicBool,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_connect(&self) {
        self.fail_connect.store(true, Ordering::SeqCst);
    }

    pub fn fail_replace(&self) {
        self.fail_replace.store(true, Ordering::SeqCst);
    }

    pub fn peers(&self) -> Vec<PeerRecord> {
        self.peers.lock().clone()
    }

    pub fn last(&self) -> PeerRecord {
        self.peers.lock().last().cloned().expect("no peer connection created")
    }
}

#[async_trait]
impl PeerConnector for FakeConnector {
    async fn connect(&self, config: PeerConfig) -> Result<Box<dyn PeerConnection>, PeerError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(PeerError("ICE configuration rejected".into()));
        }

        let record = PeerRecord {
            initiator: config.initiator,
            closed: Arc::new(AtomicBool::new(false)),
            applied: Arc::new(Mutex::new(Vec::new())),
            replaced: Arc::new(Mutex::new(Vec::new())),
            remote: Arc::new(Mutex::new(None)),
            events: config.events.clone(),
        };
        self.peers.lock().push(record.clone());

        if config.initiator {
            config
                .events
                .emit(PeerEvent::Signal(json!({"type": "offer", "sdp": "v=0 fake-offer"})));
        }

        Ok(Box::new(FakePeer {
            record,
            fail_replace: self.fail_replace.load(Ordering::SeqCst),
        }))
    }
}

struct FakePeer {
    record: PeerRecord,
    fail_replace: bool,
}

impl FakePeer {
    fn deliver_remote_stream(&self) {
        let stream = MediaStream::new(vec![
            SyntheticTrack::new(TrackKind::Audio, None) as Arc<dyn MediaTrack>,
            SyntheticTrack::new(TrackKind::Video, None) as Arc<dyn MediaTrack>,
        ]);
        *self.record.remote.lock() = Some(stream.clone());
        self.record.events.emit(PeerEvent::RemoteStream(stream));
    }
}

#[async_trait]
impl PeerConnection for FakePeer {
    async fn apply_signal(&mut self, signal: serde_json::Value) -> Result<(), PeerError> {
        self.record.applied.lock().push(signal.clone());
        match signal["type"].as_str() {
            Some("offer") => {
                self.record
                    .events
                    .emit(PeerEvent::Signal(json!({"type": "answer", "sdp": "v=0 fake-answer"})));
                self.deliver_remote_stream();
                Ok(())
            }
            Some("answer") => {
                self.deliver_remote_stream();
                Ok(())
            }
            Some("candidate") => Ok(()),
            _ => Err(PeerError(format!("unexpected signal {}", signal))),
        }
    }

    async fn replace_video_track(&mut self, track: Arc<dyn MediaTrack>) -> Result<(), PeerError> {
        if self.fail_replace {
            return Err(PeerError("sender rejected track".into()));
        }
        self.record
            .replaced
            .lock()
            .push(track.device_id().unwrap_or_default().to_string());
        Ok(())
    }

    async fn close(&mut self) {
        self.record.closed.store(true, Ordering::SeqCst);
    }
}

/// One user with an orchestrator on a shared hub.
pub struct Party {
    pub id: UserId,
    pub calls: CallOrchestrator,
    pub media: Arc<FakeMedia>,
    pub connector: Arc<FakeConnector>,
    pub events: broadcast::Receiver<CallEvent>,
}

impl Party {
    pub fn join(hub: &LoopbackHub, id: &str) -> Self {
        Self::join_with(hub, id, FakeMedia::new(), CallConfig::default())
    }

    pub fn join_with(
        hub: &LoopbackHub,
        id: &str,
        media: Arc<FakeMedia>,
        config: CallConfig,
    ) -> Self {
        let id = UserId::from(id);
        let relay = SignalingRelay::loopback(hub, id.clone());
        let connector = FakeConnector::new();
        let calls = CallOrchestrator::new(relay, media.clone(), connector.clone(), config);
        let events = calls.subscribe();
        Self {
            id,
            calls,
            media,
            connector,
            events,
        }
    }

    /// Wait for the next event matching `pred`.
    pub async fn expect_event<F>(&mut self, pred: F) -> CallEvent
    where
        F: Fn(&CallEvent) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(120), async {
            loop {
                match self.events.recv().await {
                    Ok(event) if pred(&event) => return event,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(e) => panic!("event stream closed: {}", e),
                }
            }
        })
        .await
        .expect("timed out waiting for call event")
    }
}

/// A bare relay connection that records every envelope addressed to it.
pub struct RawUser {
    pub relay: SignalingRelay,
    rx: mpsc::UnboundedReceiver<SignalEnvelope>,
    _subs: Vec<hush_relay::Subscription>,
}

impl RawUser {
    pub fn join(hub: &LoopbackHub, id: &str) -> Self {
        let relay = SignalingRelay::loopback(hub, UserId::from(id));
        let (tx, rx) = mpsc::unbounded_channel();
        let subs = EnvelopeKind::ALL
            .into_iter()
            .map(|kind| {
                let tx = tx.clone();
                relay.subscribe(kind, move |env| {
                    let _ = tx.send(env.clone());
                })
            })
            .collect();
        Self {
            relay,
            rx,
            _subs: subs,
        }
    }

    pub fn id(&self) -> &UserId {
        self.relay.local_id()
    }

    pub async fn send(&self, envelope: SignalEnvelope) {
        self.relay.send(envelope).await.expect("relay send failed");
    }

    pub async fn recv(&mut self) -> SignalEnvelope {
        tokio::time::timeout(Duration::from_secs(120), self.rx.recv())
            .await
            .expect("timed out waiting for envelope")
            .expect("envelope channel closed")
    }

    /// Envelopes received so far, without waiting.
    pub fn drain(&mut self) -> Vec<SignalEnvelope> {
        let mut out = Vec::new();
        while let Ok(env) = self.rx.try_recv() {
            out.push(env);
        }
        out
    }
}

/// Let spawned tasks run until the runtime is idle.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

pub fn is_ended(event: &CallEvent) -> bool {
    matches!(event, CallEvent::Ended { .. })
}
