use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use hush_relay::{RelayError, SignalingRelay, Subscription};
use hush_types::{CallId, CallType, EnvelopeKind, SignalEnvelope, UserId};

use crate::config::CallConfig;
use crate::error::{CallError, CallResult};
use crate::media::MediaDevices;
use crate::peer::PeerConnector;
use crate::session::{self, SessionContext, SessionHandle};
use crate::state::{CallDirection, CallEvent, CallSnapshot, CallState, EndReason};

/// Owns every call session of one user and routes relay envelopes to them.
///
/// Cheap to clone; all clones share the same session map.
#[derive(Clone)]
pub struct CallOrchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    ctx: SessionContext,

    /// Session map: peer id -> running session. Routing and every map
    /// edit happen under this lock.
    sessions: Mutex<HashMap<UserId, SessionHandle>>,

    inbox: mpsc::UnboundedSender<Inbound>,
    _subscriptions: Vec<Subscription>,
}

enum Inbound {
    Envelope(SignalEnvelope),
    Finished { peer: UserId, call_id: CallId },
}

impl CallOrchestrator {
    /// Subscribes to call envelopes on `relay`. Must be called inside a runtime.
    pub fn new(
        relay: SignalingRelay,
        media: Arc<dyn MediaDevices>,
        connector: Arc<dyn PeerConnector>,
        config: CallConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        let (inbox, inbox_rx) = mpsc::unbounded_channel();

        let subscriptions = EnvelopeKind::CALL
            .into_iter()
            .map(|kind| {
                let tx = inbox.clone();
                relay.subscribe(kind, move |envelope| {
                    let _ = tx.send(Inbound::Envelope(envelope.clone()));
                })
            })
            .collect();

        let mut connection = relay.connection_state();

        let inner = Arc::new(OrchestratorInner {
            ctx: SessionContext {
                local_id: relay.local_id().clone(),
                relay,
                media,
                connector,
                config: Arc::new(config),
                events,
            },
            sessions: Mutex::new(HashMap::new()),
            inbox,
            _subscriptions: subscriptions,
        });

        tokio::spawn(pump(Arc::downgrade(&inner), inbox_rx));

        // End every call when the relay drops; nothing can be negotiated without it
        let weak = Arc::downgrade(&inner);
        tokio::spawn(async move {
            while connection.changed().await.is_ok() {
                if *connection.borrow_and_update() {
                    continue;
                }
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                inner.abort_all(EndReason::RelayDisconnected).await;
            }
        });

        Self { inner }
    }

    pub fn local_id(&self) -> &UserId {
        &self.inner.ctx.local_id
    }

    pub fn config(&self) -> &CallConfig {
        &self.inner.ctx.config
    }

    /// UI notifications for every session.
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.inner.ctx.events.subscribe()
    }

    /// Call `peer`. Resolves once local media is live and the request has
    /// been sent; the call then rings until the peer answers.
    pub async fn start_call(&self, peer: UserId, call_type: CallType) -> CallResult<CallId> {
        if peer == self.inner.ctx.local_id {
            return Err(CallError::SelfCall);
        }
        if !self.inner.ctx.relay.is_connected() {
            return Err(CallError::Relay(RelayError::Disconnected));
        }

        let (started, started_rx) = oneshot::channel();
        let handle = {
            let mut sessions = self.inner.sessions.lock().await;
            if sessions.values().any(SessionHandle::is_live) {
                return Err(CallError::Busy);
            }

            let handle = session::spawn_outgoing(
                self.inner.ctx.clone(),
                peer.clone(),
                call_type,
                started,
                self.inner.finisher(peer.clone()),
            );
            sessions.insert(peer.clone(), handle.clone());
            handle
        };

        info!("Starting {} call {} with {}", call_type, handle.call_id(), peer);

        match started_rx.await {
            Ok(Ok(())) => Ok(handle.call_id()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(handle.ended()),
        }
    }

    pub async fn accept_call(&self, peer: &UserId) -> CallResult<()> {
        self.session(peer).await?.accept().await
    }

    /// Decline a ringing call. No-op without a live session.
    pub async fn reject_call(&self, peer: &UserId) -> CallResult<()> {
        match self.session(peer).await {
            Ok(handle) => handle.reject().await,
            Err(_) => Ok(()),
        }
    }

    /// Hang up. No-op without a live session.
    pub async fn end_call(&self, peer: &UserId) -> CallResult<()> {
        match self.session(peer).await {
            Ok(handle) => handle.end().await,
            Err(_) => Ok(()),
        }
    }

    /// Returns the new muted state.
    pub async fn toggle_mute(&self, peer: &UserId) -> CallResult<bool> {
        self.session(peer).await?.toggle_mute().await
    }

    /// Returns whether video is now enabled.
    pub async fn toggle_video(&self, peer: &UserId) -> CallResult<bool> {
        self.session(peer).await?.toggle_video().await
    }

    /// Move to the next camera. `Ok(false)` when there is nothing to switch to.
    pub async fn switch_camera(&self, peer: &UserId) -> CallResult<bool> {
        self.session(peer).await?.switch_camera().await
    }

    pub async fn snapshot(&self, peer: &UserId) -> Option<CallSnapshot> {
        self.inner
            .sessions
            .lock()
            .await
            .get(peer)
            .map(SessionHandle::snapshot)
    }

    /// Snapshots of every session that has not ended.
    pub async fn active_calls(&self) -> Vec<CallSnapshot> {
        self.inner
            .sessions
            .lock()
            .await
            .values()
            .filter(|h| h.is_live())
            .map(SessionHandle::snapshot)
            .collect()
    }

    async fn session(&self, peer: &UserId) -> CallResult<SessionHandle> {
        self.inner
            .sessions
            .lock()
            .await
            .get(peer)
            .cloned()
            .ok_or_else(|| CallError::NoSession(peer.clone()))
    }
}

impl OrchestratorInner {
    /// Callback run when a session task exits.
    fn finisher(&self, peer: UserId) -> impl FnOnce(CallId) + Send + 'static {
        let inbox = self.inbox.clone();
        move |call_id| {
            let _ = inbox.send(Inbound::Finished { peer, call_id });
        }
    }

    async fn route(&self, envelope: SignalEnvelope) {
        let Some(to) = envelope.recipient() else {
            return;
        };
        if *to != self.ctx.local_id {
            debug!(kind = %envelope.kind(), %to, "Envelope not addressed to us");
            return;
        }
        let from = envelope.sender().clone();

        let mut sessions = self.sessions.lock().await;

        if let SignalEnvelope::CallRequest { call_type, .. } = envelope {
            self.on_call_request(&mut sessions, from, call_type).await;
            return;
        }

        match sessions.get(&from) {
            Some(handle) if handle.is_live() => handle.deliver(envelope),
            _ => debug!(kind = %envelope.kind(), peer = %from, "No live call, dropping envelope"),
        }
    }

    async fn on_call_request(
        &self,
        sessions: &mut HashMap<UserId, SessionHandle>,
        from: UserId,
        call_type: CallType,
    ) {
        if from == self.ctx.local_id {
            return;
        }

        // Glare: both sides dialled each other. The smaller id's call survives.
        if let Some(existing) = sessions.get(&from).filter(|h| h.is_live()) {
            let snapshot = existing.snapshot();
            let unanswered = snapshot.direction == CallDirection::Outgoing
                && matches!(snapshot.state, CallState::Idle | CallState::OutgoingRinging);
            if unanswered {
                if self.ctx.local_id < from {
                    debug!("Ignoring crossing call request from {}", from);
                    return;
                }
                info!("Call glare with {}: yielding to their call", from);
                existing.supersede();
                sessions.remove(&from);
            }
        }

        if sessions.values().any(SessionHandle::is_live) {
            info!("Busy, rejecting {} call from {}", call_type, from);
            let busy = SignalEnvelope::call_rejected(&self.ctx.local_id, &from);
            if let Err(e) = self.ctx.relay.send(busy).await {
                warn!("Failed to reject call from {}: {}", from, e);
            }
            return;
        }

        info!("Incoming {} call from {}", call_type, from);
        let handle = session::spawn_incoming(
            self.ctx.clone(),
            from.clone(),
            call_type,
            self.finisher(from.clone()),
        );
        sessions.insert(from, handle);
    }

    /// Drop an ended session, unless a newer call already took its slot.
    async fn reap(&self, peer: UserId, call_id: CallId) {
        let mut sessions = self.sessions.lock().await;
        if sessions.get(&peer).is_some_and(|h| h.call_id() == call_id) {
            sessions.remove(&peer);
            debug!("Reaped call {} with {}", call_id, peer);
        }
    }

    async fn abort_all(&self, reason: EndReason) {
        let sessions = self.sessions.lock().await;
        for handle in sessions.values().filter(|h| h.is_live()) {
            warn!("Ending call {}: {}", handle.call_id(), reason);
            handle.abort(reason);
        }
    }
}

async fn pump(inner: Weak<OrchestratorInner>, mut inbox: mpsc::UnboundedReceiver<Inbound>) {
    while let Some(message) = inbox.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        match message {
            Inbound::Envelope(envelope) => inner.route(envelope).await,
            Inbound::Finished { peer, call_id } => inner.reap(peer, call_id).await,
        }
    }
}
