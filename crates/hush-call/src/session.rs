use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use hush_relay::SignalingRelay;
use hush_types::{CallId, CallType, SignalEnvelope, UserId};

use crate::config::CallConfig;
use crate::error::{CallError, CallResult};
use crate::media::{MediaConstraints, MediaDevices, MediaError, MediaStream};
use crate::peer::{PeerConfig, PeerConnection, PeerConnector, PeerError, PeerEvent, PeerEventSink};
use crate::state::{CallDirection, CallEvent, CallSnapshot, CallState, EndReason};

type Reply<T> = oneshot::Sender<CallResult<T>>;

/// Everything a session reacts to, processed one at a time.
pub(crate) enum SessionEvent {
    Accept(Reply<()>),
    Reject(Reply<()>),
    End(Reply<()>),
    ToggleMute(Reply<bool>),
    ToggleVideo(Reply<bool>),
    SwitchCamera(Reply<bool>),

    Remote(SignalEnvelope),
    MediaReady(Result<MediaStream, MediaError>),
    CameraReady {
        result: Result<Option<MediaStream>, MediaError>,
        reply: Reply<bool>,
    },
    Peer(PeerEvent),

    /// Lost a glare; end silently
    Supersede,
    /// End without notifying the peer (relay is gone)
    Abort(EndReason),
    Timeout,
}

/// Collaborators shared by every session of one orchestrator.
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub local_id: UserId,
    pub relay: SignalingRelay,
    pub media: Arc<dyn MediaDevices>,
    pub connector: Arc<dyn PeerConnector>,
    pub config: Arc<CallConfig>,
    pub events: broadcast::Sender<CallEvent>,
}

/// The orchestrator's reference to a running session.
#[derive(Clone)]
pub(crate) struct SessionHandle {
    call_id: CallId,
    inbox: mpsc::UnboundedSender<SessionEvent>,
    snapshot: watch::Receiver<CallSnapshot>,
}

impl SessionHandle {
    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    pub fn snapshot(&self) -> CallSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn is_live(&self) -> bool {
        !self.snapshot.borrow().state.is_terminal() && !self.inbox.is_closed()
    }

    pub fn deliver(&self, envelope: SignalEnvelope) {
        let _ = self.inbox.send(SessionEvent::Remote(envelope));
    }

    pub fn supersede(&self) {
        let _ = self.inbox.send(SessionEvent::Supersede);
    }

    pub fn abort(&self, reason: EndReason) {
        let _ = self.inbox.send(SessionEvent::Abort(reason));
    }

    pub async fn accept(&self) -> CallResult<()> {
        self.request(SessionEvent::Accept).await
    }

    /// No-op on an ended session.
    pub async fn reject(&self) -> CallResult<()> {
        match self.request(SessionEvent::Reject).await {
            Err(CallError::CallEnded(_)) => Ok(()),
            other => other,
        }
    }

    /// No-op on an ended session.
    pub async fn end(&self) -> CallResult<()> {
        match self.request(SessionEvent::End).await {
            Err(CallError::CallEnded(_)) => Ok(()),
            other => other,
        }
    }

    pub async fn toggle_mute(&self) -> CallResult<bool> {
        self.request(SessionEvent::ToggleMute).await
    }

    pub async fn toggle_video(&self) -> CallResult<bool> {
        self.request(SessionEvent::ToggleVideo).await
    }

    pub async fn switch_camera(&self) -> CallResult<bool> {
        self.request(SessionEvent::SwitchCamera).await
    }

    /// The error a caller sees when the session is already gone.
    pub fn ended(&self) -> CallError {
        let reason = self
            .snapshot
            .borrow()
            .end_reason
            .unwrap_or(EndReason::LocalHangup);
        CallError::CallEnded(reason)
    }

    async fn request<T>(&self, make: fn(Reply<T>) -> SessionEvent) -> CallResult<T> {
        let (reply, rx) = oneshot::channel();
        if self.inbox.send(make(reply)).is_err() {
            return Err(self.ended());
        }
        rx.await.unwrap_or_else(|_| Err(self.ended()))
    }
}

/// Start an outgoing call. `started` resolves once the request has been
/// sent (or the attempt failed). `on_finish` runs after the session ends.
pub(crate) fn spawn_outgoing<F>(
    ctx: SessionContext,
    peer: UserId,
    call_type: CallType,
    started: Reply<()>,
    on_finish: F,
) -> SessionHandle
where
    F: FnOnce(CallId) + Send + 'static,
{
    spawn(ctx, peer, call_type, CallDirection::Outgoing, Some(started), on_finish)
}

/// Ring for an incoming `call_request`.
pub(crate) fn spawn_incoming<F>(
    ctx: SessionContext,
    peer: UserId,
    call_type: CallType,
    on_finish: F,
) -> SessionHandle
where
    F: FnOnce(CallId) + Send + 'static,
{
    spawn(ctx, peer, call_type, CallDirection::Incoming, None, on_finish)
}

fn spawn<F>(
    ctx: SessionContext,
    peer: UserId,
    call_type: CallType,
    direction: CallDirection,
    pending_reply: Option<Reply<()>>,
    on_finish: F,
) -> SessionHandle
where
    F: FnOnce(CallId) + Send + 'static,
{
    let call_id = CallId::new();
    let (sender, inbox) = mpsc::unbounded_channel();
    let (snapshot, snapshot_rx) = watch::channel(CallSnapshot {
        call_id,
        peer: peer.clone(),
        call_type,
        direction,
        state: CallState::Idle,
        muted: false,
        video_enabled: call_type.has_video(),
        has_local_stream: false,
        has_remote_stream: false,
        end_reason: None,
    });

    let session = CallSession {
        call_id,
        peer,
        call_type,
        direction,
        state: CallState::Idle,
        ctx,
        sender: sender.clone(),
        inbox,
        local_stream: None,
        remote_stream: None,
        peer_connection: None,
        pending_signals: Vec::new(),
        pending_reply,
        announced: false,
        switching: false,
        muted: false,
        video_enabled: call_type.has_video(),
        deadline: None,
        end_reason: None,
        snapshot,
    };

    tokio::spawn(async move {
        session.run().await;
        on_finish(call_id);
    });

    SessionHandle {
        call_id,
        inbox: sender,
        snapshot: snapshot_rx,
    }
}

/// One call attempt with one peer. Owns its media and peer connection and
/// is driven exclusively by its event queue.
struct CallSession {
    call_id: CallId,
    peer: UserId,
    call_type: CallType,
    direction: CallDirection,
    state: CallState,
    ctx: SessionContext,

    sender: mpsc::UnboundedSender<SessionEvent>,
    inbox: mpsc::UnboundedReceiver<SessionEvent>,

    local_stream: Option<MediaStream>,
    remote_stream: Option<MediaStream>,
    peer_connection: Option<Box<dyn PeerConnection>>,
    /// Remote signals that arrived before the peer connection existed
    pending_signals: Vec<serde_json::Value>,
    /// Caller of start/accept waiting for the call to be announced
    pending_reply: Option<Reply<()>>,

    /// The peer has been told about this call (request or acceptance sent)
    announced: bool,
    switching: bool,
    muted: bool,
    video_enabled: bool,

    deadline: Option<Instant>,
    end_reason: Option<EndReason>,
    snapshot: watch::Sender<CallSnapshot>,
}

impl CallSession {
    async fn run(mut self) {
        match self.direction {
            CallDirection::Outgoing => {
                self.set_state(CallState::OutgoingRinging);
                self.acquire_media();
            }
            CallDirection::Incoming => {
                self.set_state(CallState::IncomingRinging);
                self.emit(CallEvent::IncomingCall {
                    call_id: self.call_id,
                    from: self.peer.clone(),
                    call_type: self.call_type,
                });
                self.deadline = Some(Instant::now() + self.ctx.config.ring_timeout);
            }
        }

        while !self.state.is_terminal() {
            let event = match self.deadline {
                Some(deadline) => tokio::select! {
                    event = self.inbox.recv() => event,
                    _ = sleep_until(deadline) => Some(SessionEvent::Timeout),
                },
                None => self.inbox.recv().await,
            };

            match event {
                Some(event) => self.handle(event).await,
                None => break,
            }
        }
    }

    async fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Accept(reply) => self.on_accept(reply),
            SessionEvent::Reject(reply) => {
                let reason = if self.direction == CallDirection::Incoming && !self.announced {
                    EndReason::Rejected
                } else {
                    EndReason::LocalHangup
                };
                self.terminate(reason, true).await;
                let _ = reply.send(Ok(()));
            }
            SessionEvent::End(reply) => {
                self.terminate(EndReason::LocalHangup, true).await;
                let _ = reply.send(Ok(()));
            }
            SessionEvent::ToggleMute(reply) => {
                self.muted = !self.muted;
                if let Some(stream) = &self.local_stream {
                    stream.set_audio_enabled(!self.muted);
                }
                debug!(call_id = %self.call_id, muted = self.muted, "Toggled mute");
                self.publish();
                let _ = reply.send(Ok(self.muted));
            }
            SessionEvent::ToggleVideo(reply) => {
                if !self.call_type.has_video() {
                    let _ = reply.send(Err(CallError::NotVideoCall));
                    return;
                }
                self.video_enabled = !self.video_enabled;
                if let Some(stream) = &self.local_stream {
                    stream.set_video_enabled(self.video_enabled);
                }
                debug!(call_id = %self.call_id, video = self.video_enabled, "Toggled video");
                self.publish();
                let _ = reply.send(Ok(self.video_enabled));
            }
            SessionEvent::SwitchCamera(reply) => self.on_switch_camera(reply),
            SessionEvent::CameraReady { result, reply } => {
                self.on_camera_ready(result, reply).await
            }
            SessionEvent::Remote(envelope) => self.on_remote(envelope).await,
            SessionEvent::MediaReady(result) => self.on_media_ready(result).await,
            SessionEvent::Peer(event) => self.on_peer_event(event).await,
            SessionEvent::Supersede => {
                if self.direction == CallDirection::Outgoing {
                    self.terminate(EndReason::Superseded, false).await;
                }
            }
            SessionEvent::Abort(reason) => self.terminate(reason, false).await,
            SessionEvent::Timeout => {
                info!(
                    call_id = %self.call_id,
                    peer = %self.peer,
                    state = %self.state,
                    "Call timed out"
                );
                self.terminate(EndReason::Timeout, true).await;
            }
        }
    }

    fn on_accept(&mut self, reply: Reply<()>) {
        if self.state != CallState::IncomingRinging {
            let _ = reply.send(Err(CallError::InvalidState {
                action: "accept",
                state: self.state,
            }));
            return;
        }

        self.pending_reply = Some(reply);
        self.deadline = None;
        self.set_state(CallState::Connecting);
        self.acquire_media();
    }

    async fn on_media_ready(&mut self, result: Result<MediaStream, MediaError>) {
        let stream = match result {
            Ok(stream) => stream,
            Err(e) => {
                warn!(
                    call_id = %self.call_id,
                    peer = %self.peer,
                    "Media acquisition failed: {}",
                    e
                );
                self.fail_pending(CallError::MediaAccessDenied(e));
                self.terminate(EndReason::MediaAccessDenied, true).await;
                return;
            }
        };

        // Flags toggled before media arrived
        stream.set_audio_enabled(!self.muted);
        if self.call_type.has_video() {
            stream.set_video_enabled(self.video_enabled);
        }
        self.local_stream = Some(stream);
        self.publish();

        match (self.direction, self.state) {
            (CallDirection::Outgoing, CallState::OutgoingRinging) => self.send_request().await,
            (CallDirection::Incoming, CallState::Connecting) => self.answer().await,
            (_, state) => debug!(call_id = %self.call_id, %state, "Media ready with nothing to do"),
        }
    }

    async fn send_request(&mut self) {
        let request = SignalEnvelope::call_request(&self.ctx.local_id, &self.peer, self.call_type);
        match self.ctx.relay.send(request).await {
            Ok(()) => {
                info!(
                    call_id = %self.call_id,
                    peer = %self.peer,
                    "Calling {} ({})",
                    self.peer,
                    self.call_type
                );
                self.announced = true;
                self.deadline = Some(Instant::now() + self.ctx.config.ring_timeout);
                self.complete_pending();
            }
            Err(e) => {
                warn!(call_id = %self.call_id, "Failed to send call request: {}", e);
                self.fail_pending(CallError::Relay(e));
                self.terminate(EndReason::RelayDisconnected, true).await;
            }
        }
    }

    /// Callee side of an accept, once local media is ready.
    async fn answer(&mut self) {
        if let Err(e) = self.open_peer(false).await {
            warn!(call_id = %self.call_id, "Could not open peer connection: {}", e);
            self.fail_pending(e);
            self.terminate(EndReason::NegotiationFailed, true).await;
            return;
        }

        let accepted = SignalEnvelope::call_accepted(&self.ctx.local_id, &self.peer);
        match self.ctx.relay.send(accepted).await {
            Ok(()) => {
                info!(
                    call_id = %self.call_id,
                    peer = %self.peer,
                    "Accepted call from {}",
                    self.peer
                );
                self.announced = true;
                self.deadline = Some(Instant::now() + self.ctx.config.connect_timeout);
                self.complete_pending();
            }
            Err(e) => {
                warn!(call_id = %self.call_id, "Failed to send call acceptance: {}", e);
                self.fail_pending(CallError::Relay(e));
                self.terminate(EndReason::RelayDisconnected, true).await;
            }
        }
    }

    async fn on_remote(&mut self, envelope: SignalEnvelope) {
        match envelope {
            SignalEnvelope::CallAccepted { .. } => {
                let awaiting = self.direction == CallDirection::Outgoing
                    && self.state == CallState::OutgoingRinging
                    && self.announced;
                if !awaiting {
                    debug!(call_id = %self.call_id, state = %self.state, "Ignoring call_accepted");
                    return;
                }

                self.set_state(CallState::Connecting);
                self.deadline = Some(Instant::now() + self.ctx.config.connect_timeout);
                if let Err(e) = self.open_peer(true).await {
                    warn!(call_id = %self.call_id, "Could not open peer connection: {}", e);
                    self.terminate(EndReason::NegotiationFailed, true).await;
                }
            }
            SignalEnvelope::CallRejected { .. } => {
                let reason = if self.state == CallState::OutgoingRinging {
                    EndReason::Declined
                } else {
                    EndReason::RemoteHangup
                };
                self.terminate(reason, false).await;
            }
            SignalEnvelope::CallEnded { .. } => {
                self.terminate(EndReason::RemoteHangup, false).await;
            }
            SignalEnvelope::CallSignal { signal, .. } => {
                let result = match self.peer_connection.as_mut() {
                    Some(peer) => peer.apply_signal(signal).await,
                    None => {
                        debug!(call_id = %self.call_id, "Buffering early call signal");
                        self.pending_signals.push(signal);
                        return;
                    }
                };
                if let Err(e) = result {
                    warn!(call_id = %self.call_id, "Rejected remote signal: {}", e);
                    self.terminate(EndReason::NegotiationFailed, true).await;
                }
            }
            other => debug!(call_id = %self.call_id, kind = %other.kind(), "Ignoring envelope"),
        }
    }

    async fn on_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::Signal(signal) => {
                let envelope = SignalEnvelope::call_signal(
                    &self.ctx.local_id,
                    &self.peer,
                    self.call_type,
                    signal,
                );
                if let Err(e) = self.ctx.relay.send(envelope).await {
                    warn!(call_id = %self.call_id, "Failed to forward call signal: {}", e);
                    self.terminate(EndReason::RelayDisconnected, true).await;
                }
            }
            PeerEvent::RemoteStream(stream) => {
                if let Some(old) = self.remote_stream.replace(stream.clone()) {
                    if old.id() != stream.id() {
                        old.stop_all();
                    }
                }
                self.emit(CallEvent::RemoteStream {
                    call_id: self.call_id,
                    peer: self.peer.clone(),
                    stream,
                });
                if self.state == CallState::Connecting {
                    self.deadline = None;
                    self.set_state(CallState::Active);
                } else {
                    self.publish();
                }
            }
            PeerEvent::Failed(reason) => {
                warn!(call_id = %self.call_id, "Peer connection failed: {}", reason);
                self.terminate(EndReason::NegotiationFailed, true).await;
            }
            PeerEvent::Closed => {
                info!(call_id = %self.call_id, "Peer connection closed");
                self.terminate(EndReason::ConnectionLost, true).await;
            }
        }
    }

    fn on_switch_camera(&mut self, reply: Reply<bool>) {
        if !self.call_type.has_video() {
            let _ = reply.send(Err(CallError::NotVideoCall));
            return;
        }
        if self.state != CallState::Active {
            let _ = reply.send(Err(CallError::InvalidState {
                action: "switch camera",
                state: self.state,
            }));
            return;
        }
        if self.switching {
            let _ = reply.send(Ok(false));
            return;
        }

        let current = self
            .local_stream
            .as_ref()
            .and_then(|s| s.video_tracks().next())
            .and_then(|t| t.device_id().map(str::to_owned));

        self.switching = true;
        let media = self.ctx.media.clone();
        let inbox = self.sender.clone();
        tokio::spawn(async move {
            let result = next_camera(media.as_ref(), current.as_deref()).await;
            if let Err(mpsc::error::SendError(SessionEvent::CameraReady {
                result: Ok(Some(stream)),
                ..
            })) = inbox.send(SessionEvent::CameraReady { result, reply })
            {
                stream.stop_all();
            }
        });
    }

    async fn on_camera_ready(
        &mut self,
        result: Result<Option<MediaStream>, MediaError>,
        reply: Reply<bool>,
    ) {
        self.switching = false;

        let stream = match result {
            Ok(Some(stream)) => stream,
            Ok(None) => {
                debug!(call_id = %self.call_id, "Single camera, nothing to switch");
                let _ = reply.send(Ok(false));
                return;
            }
            Err(e) => {
                warn!(call_id = %self.call_id, "Camera switch failed: {}", e);
                let _ = reply.send(Err(CallError::MediaAccessDenied(e)));
                return;
            }
        };

        let Some(track) = stream.video_tracks().next().cloned() else {
            stream.stop_all();
            let _ = reply.send(Err(CallError::MediaAccessDenied(MediaError::DeviceNotFound(
                "capture has no video track".into(),
            ))));
            return;
        };
        stream.audio_tracks().for_each(|t| t.stop());
        track.set_enabled(self.video_enabled);

        let replaced = match self.peer_connection.as_mut() {
            Some(peer) => peer.replace_video_track(track.clone()).await,
            None => Err(PeerError("no peer connection".into())),
        };
        if let Err(e) = replaced {
            warn!(call_id = %self.call_id, "Could not replace video track: {}", e);
            stream.stop_all();
            let _ = reply.send(Err(CallError::NegotiationFailed(e.0)));
            return;
        }

        if let Some(local) = self.local_stream.as_mut() {
            if let Some(old) = local.replace_video_track(track) {
                old.stop();
            }
        }
        info!(call_id = %self.call_id, "Switched camera");
        let _ = reply.send(Ok(true));
    }

    /// Capture runs off the queue; a result posted after the session ended
    /// is stopped here since nobody else will release it.
    fn acquire_media(&self) {
        let media = self.ctx.media.clone();
        let inbox = self.sender.clone();
        let constraints = MediaConstraints::for_call(self.call_type);

        tokio::spawn(async move {
            let result = media.acquire(constraints).await;
            if let Err(mpsc::error::SendError(SessionEvent::MediaReady(Ok(stream)))) =
                inbox.send(SessionEvent::MediaReady(result))
            {
                stream.stop_all();
            }
        });
    }

    async fn open_peer(&mut self, initiator: bool) -> CallResult<()> {
        let local_stream = self.local_stream.clone().ok_or(CallError::InvalidState {
            action: "open peer connection",
            state: self.state,
        })?;

        let config = PeerConfig {
            initiator,
            ice_servers: self.ctx.config.ice_servers.clone(),
            local_stream,
            events: PeerEventSink::new(self.sender.clone()),
        };
        let mut peer = self
            .ctx
            .connector
            .connect(config)
            .await
            .map_err(|e| CallError::NegotiationFailed(e.0))?;

        for signal in std::mem::take(&mut self.pending_signals) {
            if let Err(e) = peer.apply_signal(signal).await {
                peer.close().await;
                return Err(CallError::NegotiationFailed(e.0));
            }
        }

        self.peer_connection = Some(peer);
        Ok(())
    }

    /// What to tell the peer when we end the call ourselves.
    fn termination_notice(&self) -> Option<SignalEnvelope> {
        match (self.direction, self.announced) {
            (_, true) => Some(SignalEnvelope::call_ended(&self.ctx.local_id, &self.peer)),
            (CallDirection::Incoming, false) => {
                Some(SignalEnvelope::call_rejected(&self.ctx.local_id, &self.peer))
            }
            (CallDirection::Outgoing, false) => None,
        }
    }

    /// Move to `Ended` and release everything. Safe to call more than once.
    async fn terminate(&mut self, reason: EndReason, notify: bool) {
        if self.state.is_terminal() {
            return;
        }

        let notice = if notify { self.termination_notice() } else { None };
        self.deadline = None;
        self.end_reason = Some(reason);
        self.set_state(CallState::Ended);

        // Nothing can be queued after this; late media gets stopped by its sender
        self.inbox.close();
        while let Some(event) = self.inbox.recv().await {
            discard(event, reason);
        }

        if let Some(stream) = self.local_stream.take() {
            stream.stop_all();
        }
        if let Some(stream) = self.remote_stream.take() {
            stream.stop_all();
        }
        if let Some(mut peer) = self.peer_connection.take() {
            peer.close().await;
        }
        self.pending_signals.clear();
        self.fail_pending(CallError::CallEnded(reason));

        if let Some(envelope) = notice {
            let kind = envelope.kind();
            if let Err(e) = self.ctx.relay.send(envelope).await {
                warn!(call_id = %self.call_id, "Failed to send {} to {}: {}", kind, self.peer, e);
            }
        }

        info!(call_id = %self.call_id, peer = %self.peer, %reason, "Call ended");
        self.publish();
        self.emit(CallEvent::Ended {
            call_id: self.call_id,
            peer: self.peer.clone(),
            reason,
        });
    }

    fn set_state(&mut self, state: CallState) {
        if self.state == state {
            return;
        }
        info!(
            call_id = %self.call_id,
            peer = %self.peer,
            from = %self.state,
            to = %state,
            "Call state changed"
        );
        self.state = state;
        self.publish();
        self.emit(CallEvent::StateChanged {
            call_id: self.call_id,
            peer: self.peer.clone(),
            state,
        });
    }

    fn complete_pending(&mut self) {
        if let Some(reply) = self.pending_reply.take() {
            let _ = reply.send(Ok(()));
        }
    }

    fn fail_pending(&mut self, error: CallError) {
        if let Some(reply) = self.pending_reply.take() {
            let _ = reply.send(Err(error));
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(CallSnapshot {
            call_id: self.call_id,
            peer: self.peer.clone(),
            call_type: self.call_type,
            direction: self.direction,
            state: self.state,
            muted: self.muted,
            video_enabled: self.video_enabled,
            has_local_stream: self.local_stream.is_some(),
            has_remote_stream: self.remote_stream.is_some(),
            end_reason: self.end_reason,
        });
    }

    fn emit(&self, event: CallEvent) {
        let _ = self.ctx.events.send(event);
    }
}

/// Settle an event that was still queued when the session ended.
fn discard(event: SessionEvent, reason: EndReason) {
    match event {
        SessionEvent::MediaReady(Ok(stream)) => stream.stop_all(),
        SessionEvent::Peer(PeerEvent::RemoteStream(stream)) => stream.stop_all(),
        SessionEvent::CameraReady { result, reply } => {
            if let Ok(Some(stream)) = result {
                stream.stop_all();
            }
            let _ = reply.send(Err(CallError::CallEnded(reason)));
        }
        SessionEvent::End(reply) | SessionEvent::Reject(reply) => {
            let _ = reply.send(Ok(()));
        }
        SessionEvent::Accept(reply) => {
            let _ = reply.send(Err(CallError::CallEnded(reason)));
        }
        SessionEvent::ToggleMute(reply)
        | SessionEvent::ToggleVideo(reply)
        | SessionEvent::SwitchCamera(reply) => {
            let _ = reply.send(Err(CallError::CallEnded(reason)));
        }
        _ => {}
    }
}

/// Capture the camera after the current one, or `None` with a single camera.
async fn next_camera(
    media: &dyn MediaDevices,
    current: Option<&str>,
) -> Result<Option<MediaStream>, MediaError> {
    let devices = media.video_inputs().await?;
    if devices.len() <= 1 {
        return Ok(None);
    }

    let next = match current.and_then(|id| devices.iter().position(|d| d.device_id == id)) {
        Some(idx) => (idx + 1) % devices.len(),
        None => 0,
    };

    media
        .acquire(MediaConstraints::camera(devices[next].device_id.clone()))
        .await
        .map(Some)
}
