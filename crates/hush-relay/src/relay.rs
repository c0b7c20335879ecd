use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use hush_types::{EnvelopeKind, SignalEnvelope, UserId};

use crate::error::{RelayError, RelayResult};
use crate::loopback::LoopbackHub;

/// Callback invoked for every inbound envelope of a subscribed kind.
/// Runs on the relay's pump task, so it must not block.
pub type Handler = Arc<dyn Fn(&SignalEnvelope) + Send + Sync>;

/// Outbound half of a realtime channel. Inbound traffic arrives as
/// [`TransportEvent`]s on the receiver handed to [`SignalingRelay::new`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, envelope: SignalEnvelope) -> RelayResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Envelope(SignalEnvelope),
    Connected,
    Disconnected,
}

/// Typed subscribe/send over a [`Transport`].
#[derive(Clone)]
pub struct SignalingRelay {
    inner: Arc<RelayInner>,
}

struct RelayInner {
    local_id: UserId,
    transport: Arc<dyn Transport>,

    /// Dispatch table: envelope kind -> (handler id, handler)
    handlers: RwLock<HashMap<EnvelopeKind, Vec<(u64, Handler)>>>,
    next_handler_id: AtomicU64,

    connected: watch::Sender<bool>,
}

impl SignalingRelay {
    /// Wrap a connected transport. Spawns the pump task that dispatches
    /// `events` to subscribers, so this must be called inside a runtime.
    pub fn new(
        local_id: UserId,
        transport: Arc<dyn Transport>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        let (connected, _) = watch::channel(true);
        let inner = Arc::new(RelayInner {
            local_id,
            transport,
            handlers: RwLock::new(HashMap::new()),
            next_handler_id: AtomicU64::new(1),
            connected,
        });

        tokio::spawn(pump(Arc::downgrade(&inner), events));

        Self { inner }
    }

    /// Join an in-process hub as `local_id`.
    pub fn loopback(hub: &LoopbackHub, local_id: UserId) -> Self {
        let (transport, events) = hub.connect(local_id.clone());
        Self::new(local_id, transport, events)
    }

    pub fn local_id(&self) -> &UserId {
        &self.inner.local_id
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.connected.borrow()
    }

    /// Watch connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<bool> {
        self.inner.connected.subscribe()
    }

    /// Best-effort, at-most-once send. Fails immediately once the
    /// transport has reported a disconnect.
    pub async fn send(&self, envelope: SignalEnvelope) -> RelayResult<()> {
        if !self.is_connected() {
            return Err(RelayError::Disconnected);
        }
        debug!(kind = %envelope.kind(), to = ?envelope.recipient(), "Sending envelope");
        self.inner.transport.send(envelope).await
    }

    /// Register `handler` for every inbound envelope of `kind`.
    /// The handler stays registered until the returned handle is dropped
    /// or cancelled.
    pub fn subscribe<F>(&self, kind: EnvelopeKind, handler: F) -> Subscription
    where
        F: Fn(&SignalEnvelope) + Send + Sync + 'static,
    {
        let id = self.inner.next_handler_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handlers
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            relay: Arc::downgrade(&self.inner),
            kind,
            id,
        }
    }

    /// Number of live handlers for `kind`.
    pub fn handler_count(&self, kind: EnvelopeKind) -> usize {
        self.inner.handlers.read().get(&kind).map_or(0, Vec::len)
    }
}

impl RelayInner {
    fn dispatch(&self, envelope: &SignalEnvelope) {
        let kind = envelope.kind();

        // Snapshot so handlers may subscribe/unsubscribe re-entrantly
        let handlers: Vec<Handler> = match self.handlers.read().get(&kind) {
            Some(list) => list.iter().map(|(_, h)| h.clone()).collect(),
            None => Vec::new(),
        };

        if handlers.is_empty() {
            debug!(%kind, "No subscribers for envelope");
            return;
        }

        for handler in handlers {
            handler(envelope);
        }
    }

    fn unsubscribe(&self, kind: EnvelopeKind, id: u64) {
        let mut handlers = self.handlers.write();
        if let Some(list) = handlers.get_mut(&kind) {
            list.retain(|(hid, _)| *hid != id);
            if list.is_empty() {
                handlers.remove(&kind);
            }
        }
    }

    fn set_connected(&self, connected: bool) {
        let was = self.connected.send_replace(connected);
        if was != connected {
            if connected {
                info!("{} connected to relay", self.local_id);
            } else {
                warn!("{} disconnected from relay", self.local_id);
            }
        }
    }
}

async fn pump(inner: Weak<RelayInner>, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };

        match event {
            TransportEvent::Envelope(envelope) => inner.dispatch(&envelope),
            TransportEvent::Connected => inner.set_connected(true),
            TransportEvent::Disconnected => inner.set_connected(false),
        }
    }

    // Transport went away without saying goodbye
    if let Some(inner) = inner.upgrade() {
        inner.set_connected(false);
    }
}

/// Cancellation handle returned by [`SignalingRelay::subscribe`].
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    relay: Weak<RelayInner>,
    kind: EnvelopeKind,
    id: u64,
}

impl Subscription {
    pub fn kind(&self) -> EnvelopeKind {
        self.kind
    }

    /// Unsubscribe now. Equivalent to dropping the handle.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.relay.upgrade() {
            inner.unsubscribe(self.kind, self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn send(&self, _envelope: SignalEnvelope) -> RelayResult<()> {
            Ok(())
        }
    }

    fn relay() -> (SignalingRelay, mpsc::UnboundedSender<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SignalingRelay::new("me".into(), Arc::new(NullTransport), rx), tx)
    }

    #[tokio::test]
    async fn dropping_subscription_unsubscribes() {
        let (relay, _tx) = relay();
        let sub = relay.subscribe(EnvelopeKind::CallEnded, |_| {});
        let other = relay.subscribe(EnvelopeKind::CallEnded, |_| {});
        assert_eq!(relay.handler_count(EnvelopeKind::CallEnded), 2);

        drop(sub);
        assert_eq!(relay.handler_count(EnvelopeKind::CallEnded), 1);
        other.cancel();
        assert_eq!(relay.handler_count(EnvelopeKind::CallEnded), 0);
    }

    #[tokio::test]
    async fn disconnect_event_fails_sends() {
        let (relay, tx) = relay();
        let mut state = relay.connection_state();
        assert!(relay.send(SignalEnvelope::call_ended(&"me".into(), &"you".into())).await.is_ok());

        tx.send(TransportEvent::Disconnected).unwrap();
        state.changed().await.unwrap();
        assert!(!relay.is_connected());

        let err = relay
            .send(SignalEnvelope::call_ended(&"me".into(), &"you".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Disconnected));
    }

    #[tokio::test]
    async fn handlers_only_see_their_kind() {
        let (relay, tx) = relay();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let _sub = relay.subscribe(EnvelopeKind::CallAccepted, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tx.send(TransportEvent::Envelope(SignalEnvelope::call_ended(&"you".into(), &"me".into())))
            .unwrap();
        tx.send(TransportEvent::Envelope(SignalEnvelope::call_accepted(
            &"you".into(),
            &"me".into(),
        )))
            .unwrap();
        // The pump is FIFO: once the disconnect is seen both envelopes were dispatched
        let mut state = relay.connection_state();
        tx.send(TransportEvent::Disconnected).unwrap();
        state.changed().await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
