//! Relay behaviour over the in-process hub: fan-out, ordering,
//! unsubscribe, and disconnect handling.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use hush_relay::{LoopbackHub, RelayError, SignalingRelay};
use hush_types::{CallType, EnvelopeKind, SignalEnvelope, UserId};

fn collect(
    relay: &SignalingRelay,
    kind: EnvelopeKind,
) -> (hush_relay::Subscription, mpsc::UnboundedReceiver<SignalEnvelope>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sub = relay.subscribe(kind, move |env| {
        let _ = tx.send(env.clone());
    });
    (sub, rx)
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<SignalEnvelope>) -> SignalEnvelope {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for envelope")
        .expect("channel closed")
}

#[tokio::test]
async fn every_handler_of_a_kind_receives_the_envelope() {
    let hub = LoopbackHub::new();
    let alice = SignalingRelay::loopback(&hub, UserId::from("alice"));
    let bob = SignalingRelay::loopback(&hub, UserId::from("bob"));

    let (_s1, mut rx1) = collect(&bob, EnvelopeKind::CallRequest);
    let (_s2, mut rx2) = collect(&bob, EnvelopeKind::CallRequest);

    let env = SignalEnvelope::call_request(alice.local_id(), bob.local_id(), CallType::Video);
    alice.send(env.clone()).await.unwrap();

    assert_eq!(recv(&mut rx1).await, env);
    assert_eq!(recv(&mut rx2).await, env);
}

#[tokio::test]
async fn envelopes_arrive_in_send_order() {
    let hub = LoopbackHub::new();
    let alice = SignalingRelay::loopback(&hub, UserId::from("alice"));
    let bob = SignalingRelay::loopback(&hub, UserId::from("bob"));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let sink = seen.clone();
    let _sub = bob.subscribe(EnvelopeKind::CallSignal, move |env| {
        if let SignalEnvelope::CallSignal { signal, .. } = env {
            sink.lock().push(signal["seq"].as_u64().unwrap_or_default());
        }
        let _ = done_tx.send(());
    });

    for seq in 0..50u64 {
        let env = SignalEnvelope::call_signal(
            alice.local_id(),
            bob.local_id(),
            CallType::Audio,
            serde_json::json!({ "seq": seq }),
        );
        alice.send(env).await.unwrap();
    }
    for _ in 0..50 {
        done_rx.recv().await.unwrap();
    }

    assert_eq!(*seen.lock(), (0..50).collect::<Vec<_>>());
}

#[tokio::test]
async fn cancelled_subscription_stops_delivery() {
    let hub = LoopbackHub::new();
    let alice = SignalingRelay::loopback(&hub, UserId::from("alice"));
    let bob = SignalingRelay::loopback(&hub, UserId::from("bob"));

    let (old, mut old_rx) = collect(&bob, EnvelopeKind::CallEnded);
    let (_keep, mut keep_rx) = collect(&bob, EnvelopeKind::CallEnded);
    old.cancel();

    alice
        .send(SignalEnvelope::call_ended(alice.local_id(), bob.local_id()))
        .await
        .unwrap();

    recv(&mut keep_rx).await;
    assert!(old_rx.try_recv().is_err());
}

#[tokio::test]
async fn disconnect_is_observable_and_fails_sends() {
    let hub = LoopbackHub::new();
    let alice = SignalingRelay::loopback(&hub, UserId::from("alice"));
    let mut state = alice.connection_state();
    assert!(alice.is_connected());

    hub.disconnect(alice.local_id());
    state.changed().await.unwrap();
    assert!(!*state.borrow());

    let err = alice
        .send(SignalEnvelope::call_ended(alice.local_id(), &UserId::from("bob")))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Disconnected));
}

#[tokio::test]
async fn typing_fans_out_to_everyone_else() {
    let hub = LoopbackHub::new();
    let alice = SignalingRelay::loopback(&hub, UserId::from("alice"));
    let bob = SignalingRelay::loopback(&hub, UserId::from("bob"));
    let carol = SignalingRelay::loopback(&hub, UserId::from("carol"));

    let (_a, mut alice_rx) = collect(&alice, EnvelopeKind::Typing);
    let (_b, mut bob_rx) = collect(&bob, EnvelopeKind::Typing);
    let (_c, mut carol_rx) = collect(&carol, EnvelopeKind::Typing);

    let env = SignalEnvelope::Typing {
        conversation_id: "c1".into(),
        user_id: alice.local_id().clone(),
        to: None,
    };
    alice.send(env.clone()).await.unwrap();

    assert_eq!(recv(&mut bob_rx).await, env);
    assert_eq!(recv(&mut carol_rx).await, env);
    assert!(alice_rx.try_recv().is_err());
}
