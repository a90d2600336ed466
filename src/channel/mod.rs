//! Realtime room channel
//!
//! One logical connection per room per client. Inbound messages are decoded
//! into the closed [`RoomEvent`] union; connection lifecycle changes are
//! reported alongside them as [`ChannelEvent`]s so the session consumes a
//! single ordered stream.

mod client;
mod events;
mod nats;
mod transport;

pub use client::{backoff_delay, ChannelClient, ChannelConfig};
pub use events::{
    ChannelEvent, ClientMessage, ErrorNotice, Heartbeat, InterviewInfo, InterviewStarted,
    NextQuestion, ParticipantsList, RoomEvent, RoomInfo, RoomJoined, StateSync, UserLeft,
};
pub use nats::{NatsConnector, NatsTransport};
pub use transport::{PayloadStream, RoomSubjects, RoomTransport, TransportConnector};
