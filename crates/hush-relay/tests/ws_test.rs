//! WebSocket transport against a minimal in-test relay server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use hush_relay::{SignalingRelay, WsTransport};
use hush_types::{CallType, EnvelopeKind, SignalEnvelope, UserId};

#[tokio::test]
async fn identifies_then_exchanges_envelopes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let inbound = SignalEnvelope::call_request(&"bob".into(), &"alice".into(), CallType::Audio);
    let server_inbound = inbound.clone();
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<String>();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        // Identify frame first
        let identify = ws.next().await.unwrap().unwrap();
        seen_tx.send(identify.into_text().unwrap().to_string()).unwrap();

        let text = serde_json::to_string(&server_inbound).unwrap();
        ws.send(Message::Text(text.into())).await.unwrap();

        // Then the client's reply
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    seen_tx.send(text.to_string()).unwrap();
                    break;
                }
                Some(Ok(_)) => continue,
                _ => return,
            }
        }
        ws.close(None).await.ok();
    });

    let url = format!("ws://{}", addr);
    let (transport, events) = WsTransport::connect(&url, "secret-token").await.unwrap();
    let relay = SignalingRelay::new(UserId::from("alice"), transport, events);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = relay.subscribe(EnvelopeKind::CallRequest, move |env| {
        let _ = tx.send(env.clone());
    });

    let identify: serde_json::Value =
        serde_json::from_str(&seen_rx.recv().await.unwrap()).unwrap();
    assert_eq!(identify["type"], "Identify");
    assert_eq!(identify["data"]["token"], "secret-token");

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, inbound);

    relay
        .send(SignalEnvelope::call_rejected(&"alice".into(), &"bob".into()))
        .await
        .unwrap();
    let reply: SignalEnvelope = serde_json::from_str(&seen_rx.recv().await.unwrap()).unwrap();
    assert_eq!(reply, SignalEnvelope::call_rejected(&"alice".into(), &"bob".into()));

    // Server closes: relay reports the disconnect
    let mut state = relay.connection_state();
    server.await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while *state.borrow_and_update() {
            state.changed().await.unwrap();
        }
    })
    .await
    .unwrap();
    assert!(!relay.is_connected());
}

#[tokio::test]
async fn connect_failure_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = WsTransport::connect(&format!("ws://{}", addr), "t").await;
    assert!(matches!(result, Err(hush_relay::RelayError::Connect(_))));
}
