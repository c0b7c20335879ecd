/// hush signaling relay
///
/// Typed publish/subscribe over a realtime transport. Handlers subscribe by
/// envelope kind and receive inbound envelopes in arrival order; outbound
/// sends are best-effort with no retry.
///
/// - `relay`: `SignalingRelay`, `Subscription` handles, the `Transport` seam
/// - `loopback`: in-process hub used by tests and local demos
/// - `ws`: WebSocket client transport

pub mod error;
pub mod loopback;
pub mod relay;
pub mod ws;

pub use error::{RelayError, RelayResult};
pub use loopback::{LoopbackHub, LoopbackTransport};
pub use relay::{Handler, SignalingRelay, Subscription, Transport, TransportEvent};
pub use ws::WsTransport;
