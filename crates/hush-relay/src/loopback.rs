use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use hush_types::{SignalEnvelope, UserId};

use crate::error::{RelayError, RelayResult};
use crate::relay::{Transport, TransportEvent};

/// In-process relay: routes envelopes between users connected to the same
/// hub. Delivery to one user is FIFO.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    /// Per-user targeted channels: user_id -> (conn_id, sender)
    peers: RwLock<HashMap<UserId, (Uuid, mpsc::UnboundedSender<TransportEvent>)>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect `user_id`, replacing any previous connection for that user.
    pub fn connect(
        &self,
        user_id: UserId,
    ) -> (Arc<LoopbackTransport>, mpsc::UnboundedReceiver<TransportEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.peers.write().insert(user_id.clone(), (conn_id, tx));
        info!("{} joined loopback hub ({})", user_id, conn_id);

        let transport = Arc::new(LoopbackTransport {
            hub: self.clone(),
            user_id,
            conn_id,
        });
        (transport, rx)
    }

    /// Drop `user_id` from the hub and tell its relay it is disconnected.
    pub fn disconnect(&self, user_id: &UserId) {
        if let Some((_, tx)) = self.inner.peers.write().remove(user_id) {
            let _ = tx.send(TransportEvent::Disconnected);
            info!("{} left loopback hub", user_id);
        }
    }

    pub fn is_connected(&self, user_id: &UserId) -> bool {
        self.inner.peers.read().contains_key(user_id)
    }

    /// Release a connection, but only if `conn_id` still owns the slot.
    fn release(&self, user_id: &UserId, conn_id: Uuid) {
        let mut peers = self.inner.peers.write();
        if peers.get(user_id).is_some_and(|(cid, _)| *cid == conn_id) {
            peers.remove(user_id);
        }
    }

    fn route(&self, from: &UserId, conn_id: Uuid, envelope: SignalEnvelope) -> RelayResult<()> {
        let peers = self.inner.peers.read();

        // A replaced or disconnected connection may not send
        if !peers.get(from).is_some_and(|(cid, _)| *cid == conn_id) {
            return Err(RelayError::Disconnected);
        }

        match envelope.recipient() {
            Some(to) => match peers.get(to) {
                Some((_, tx)) => {
                    let _ = tx.send(TransportEvent::Envelope(envelope));
                }
                None => {
                    debug!(kind = %envelope.kind(), %to, "Recipient offline, dropping envelope")
                }
            },
            None => {
                for (user_id, (_, tx)) in peers.iter() {
                    if user_id != from {
                        let _ = tx.send(TransportEvent::Envelope(envelope.clone()));
                    }
                }
            }
        }
        Ok(())
    }
}

/// One user's connection to a [`LoopbackHub`].
pub struct LoopbackTransport {
    hub: LoopbackHub,
    user_id: UserId,
    conn_id: Uuid,
}

impl LoopbackTransport {
    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, envelope: SignalEnvelope) -> RelayResult<()> {
        self.hub.route(&self.user_id, self.conn_id, envelope)
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        self.hub.release(&self.user_id, self.conn_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn targeted_envelope_reaches_only_recipient() {
        let hub = LoopbackHub::new();
        let (alice, _alice_rx) = hub.connect("alice".into());
        let (_bob, mut bob_rx) = hub.connect("bob".into());
        let (_carol, mut carol_rx) = hub.connect("carol".into());

        let env = SignalEnvelope::call_request(
            &"alice".into(),
            &"bob".into(),
            hush_types::CallType::Audio,
        );
        alice.send(env.clone()).await.unwrap();

        assert_eq!(bob_rx.recv().await, Some(TransportEvent::Envelope(env)));
        assert!(carol_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn untargeted_envelope_fans_out_to_others() {
        let hub = LoopbackHub::new();
        let (alice, mut alice_rx) = hub.connect("alice".into());
        let (_bob, mut bob_rx) = hub.connect("bob".into());
        let (_carol, mut carol_rx) = hub.connect("carol".into());

        let env = SignalEnvelope::Typing {
            conversation_id: "c1".into(),
            user_id: "alice".into(),
            to: None,
        };
        alice.send(env.clone()).await.unwrap();

        assert_eq!(bob_rx.recv().await, Some(TransportEvent::Envelope(env.clone())));
        assert_eq!(carol_rx.recv().await, Some(TransportEvent::Envelope(env)));
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_connection_does_not_evict_newer_one() {
        let hub = LoopbackHub::new();
        let (old, _old_rx) = hub.connect("alice".into());
        let (new, _new_rx) = hub.connect("alice".into());
        assert_ne!(old.conn_id(), new.conn_id());

        // The replaced connection can no longer send
        let env = SignalEnvelope::call_ended(&"alice".into(), &"bob".into());
        assert!(matches!(old.send(env).await, Err(RelayError::Disconnected)));

        drop(old);
        assert!(hub.is_connected(&"alice".into()));
        drop(new);
        assert!(!hub.is_connected(&"alice".into()));
    }

    #[tokio::test]
    async fn disconnect_notifies_the_user() {
        let hub = LoopbackHub::new();
        let (alice, mut alice_rx) = hub.connect("alice".into());

        hub.disconnect(&"alice".into());
        assert_eq!(alice_rx.recv().await, Some(TransportEvent::Disconnected));

        let env = SignalEnvelope::call_ended(&"alice".into(), &"bob".into());
        assert!(matches!(alice.send(env).await, Err(RelayError::Disconnected)));
    }
}
