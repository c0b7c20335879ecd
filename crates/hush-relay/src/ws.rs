use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};

use hush_types::SignalEnvelope;

use crate::error::{RelayError, RelayResult};
use crate::relay::{Transport, TransportEvent};

/// Heartbeat interval: a Ping every 15 seconds.
/// Two consecutive missed Pongs (~30s) drop the connection.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Frames the client sends outside the envelope stream.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data")]
enum ClientFrame<'a> {
    /// Authenticate the socket
    Identify { token: &'a str },
}

/// WebSocket client transport. Envelopes travel as JSON text frames.
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<String>,
}

impl WsTransport {
    /// Connect to `url`, identify with `token`, and start the socket tasks.
    /// The returned receiver yields inbound envelopes and ends with
    /// [`TransportEvent::Disconnected`] when the socket closes.
    pub async fn connect(
        url: &str,
        token: &str,
    ) -> RelayResult<(Arc<Self>, mpsc::UnboundedReceiver<TransportEvent>)> {
        let (socket, _) = connect_async(url)
            .await
            .map_err(|e| RelayError::Connect(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let identify = serde_json::to_string(&ClientFrame::Identify { token })?;
        sink.send(Message::Text(identify.into()))
            .await
            .map_err(|e| RelayError::Connect(e.to_string()))?;

        info!("Connected to relay at {}", url);

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let pong_received = Arc::new(AtomicBool::new(true));
        let pong_flag_send = pong_received.clone();
        let pong_flag_recv = pong_received;

        let mut send_task = tokio::spawn(async move {
            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            heartbeat.tick().await;
            let mut missed_heartbeats: u8 = 0;

            loop {
                tokio::select! {
                    next = outbound_rx.recv() => {
                        let Some(text) = next else { break };
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    _ = heartbeat.tick() => {
                        if pong_flag_send.swap(false, Ordering::Acquire) {
                            missed_heartbeats = 0;
                        } else {
                            missed_heartbeats += 1;
                            if missed_heartbeats >= 2 {
                                warn!(
                                    "Relay heartbeat timeout (missed {} pongs)",
                                    missed_heartbeats
                                );
                                break;
                            }
                        }
                        if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                            break;
                        }
                    }
                }
            }

            let _ = sink.close().await;
        });

        let inbound = events_tx.clone();
        let mut recv_task = tokio::spawn(async move {
            while let Some(Ok(msg)) = stream.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<SignalEnvelope>(&text) {
                        Ok(envelope) => {
                            if inbound.send(TransportEvent::Envelope(envelope)).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            let raw: String = text.chars().take(200).collect();
                            warn!("Ignoring bad relay frame: {} -- raw: {}", e, raw);
                        }
                    },
                    Message::Pong(_) => {
                        pong_flag_recv.store(true, Ordering::Release);
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        });

        tokio::spawn(async move {
            tokio::select! {
                _ = &mut send_task => recv_task.abort(),
                _ = &mut recv_task => send_task.abort(),
            }
            let _ = events_tx.send(TransportEvent::Disconnected);
            info!("Relay connection closed");
        });

        Ok((Arc::new(Self { outbound }), events_rx))
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, envelope: SignalEnvelope) -> RelayResult<()> {
        let text = serde_json::to_string(&envelope)?;
        self.outbound
            .send(text)
            .map_err(|_| RelayError::Disconnected)
    }
}
