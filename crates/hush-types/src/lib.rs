/// Shared types for the hush secure session layer.
///
/// - `ids`: user, conversation, message and call identifiers
/// - `events`: relay envelopes exchanged between peers
/// - `models`: conversation and message records handed to the persistence layer

pub mod events;
pub mod ids;
pub mod models;

pub use events::{CallType, EnvelopeKind, SignalEnvelope};
pub use ids::{CallId, ConversationId, MessageId, UserId};
pub use models::{ConversationRecord, LastMessage, MessageRecord, MessageStatus, WrappedKey};
