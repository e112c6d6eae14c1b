//! Sweet Claw Protocol
//!
//! Wire types shared by the orchestrator and its subscribers: direction
//! symbols, positions, layout records, the event-bus envelope, and the
//! websocket client used by subscriber processes.

pub mod direction;
pub mod events;
pub mod host;
pub mod layout;
pub mod subscriber;

pub use direction::{Direction, Position, ProtocolError};
pub use events::{
    AlertPayload, BusEvent, Channel, DecodeError, EmptyPayload, Envelope, GrabPayload,
    MovePayload, SnapshotPayload,
};
pub use layout::LayoutObject;
pub use subscriber::{BusSubscriber, DEFAULT_RECONNECT_DELAY};
