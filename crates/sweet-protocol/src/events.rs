//! Event-bus envelope and the closed set of bus events.
//!
//! Every message on the bus is a JSON object with three fields:
//!
//! ```json
//! {"channel":"motion","event":"move","data":{"direction":"up","x":0,"y":-30}}
//! ```
//!
//! # Channels and events
//!
//! - `motion`: `move`, `grab`, `ambient_start`, `ambient_stop`, `alert`
//! - `system`: `refresh_all`, `connected`
//!
//! Subscribers decode each message exactly once with [`Envelope::parse`].
//! Unknown events and malformed payloads surface as [`DecodeError`] so the
//! receiving loop can log and drop them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Direction, LayoutObject, Position};

// ============================================================================
// Channels
// ============================================================================

/// Named bus channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Claw motion, grab results, audio signalling and the sugar heartbeat.
    Motion,
    /// Housekeeping for visualization clients.
    System,
}

impl Channel {
    /// Returns the wire name of the channel.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Motion => "motion",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Payload of `motion/move`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePayload {
    /// The accepted direction.
    pub direction: Direction,
    /// Resulting x coordinate.
    pub x: i32,
    /// Resulting y coordinate.
    pub y: i32,
}

impl MovePayload {
    /// Returns the resulting position carried by the event.
    #[must_use]
    pub const fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// Payload of `motion/grab`.
///
/// A grab that matched nothing is published as the sentinel
/// `{"name":"None","sugarValue":0}`; subscribers treat it as "ignore".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrabPayload {
    /// Catalog identifier of the grabbed item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Name of the grabbed item, or `"None"`.
    pub name: String,
    /// Sugar value of the grabbed item, or 0.
    pub sugar_value: i64,
    /// Layout x of the grabbed item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    /// Layout y of the grabbed item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
}

impl GrabPayload {
    /// Name used by the "nothing grabbed" sentinel.
    pub const NONE_NAME: &'static str = "None";

    /// Creates the "nothing grabbed" sentinel.
    #[must_use]
    pub fn none() -> Self {
        Self {
            id: None,
            name: Self::NONE_NAME.to_string(),
            sugar_value: 0,
            x: None,
            y: None,
        }
    }

    /// Creates a payload carrying the full record of a layout object.
    #[must_use]
    pub fn from_object(object: &LayoutObject) -> Self {
        Self {
            id: Some(object.id),
            name: object.name.clone(),
            sugar_value: object.sugar_value,
            x: Some(object.x),
            y: Some(object.y),
        }
    }
}

/// Payload of `motion/alert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPayload {
    /// Current sugar level.
    pub level: i64,
}

/// Payload of `system/connected`, sent to each new bus connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    /// Current claw position.
    pub position: Position,
    /// Current layout.
    pub layout: Vec<LayoutObject>,
    /// Current sugar level.
    pub level: i64,
}

/// Empty payload, serialized as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyPayload {}

// ============================================================================
// Events
// ============================================================================

/// Every event that may travel over the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// An accepted move command and the resulting position.
    Move(MovePayload),
    /// The outcome of a grab evaluation.
    Grab(GrabPayload),
    /// Start the ambient loop.
    AmbientStart,
    /// Stop the ambient loop.
    AmbientStop,
    /// Current sugar level (explicit update or heartbeat).
    Alert(AlertPayload),
    /// Ask visualization clients to reload.
    RefreshAll,
    /// State snapshot for a freshly connected client.
    Connected(SnapshotPayload),
}

impl BusEvent {
    /// Creates a `move` event.
    #[must_use]
    pub const fn moved(direction: Direction, position: Position) -> Self {
        Self::Move(MovePayload {
            direction,
            x: position.x,
            y: position.y,
        })
    }

    /// Creates an `alert` event.
    #[must_use]
    pub const fn alert(level: i64) -> Self {
        Self::Alert(AlertPayload { level })
    }

    /// Creates a `grab` event from an optional match.
    #[must_use]
    pub fn grab(matched: Option<&LayoutObject>) -> Self {
        Self::Grab(matched.map_or_else(GrabPayload::none, GrabPayload::from_object))
    }

    /// Returns the channel this event belongs to.
    #[must_use]
    pub const fn channel(&self) -> Channel {
        match self {
            Self::Move(_)
            | Self::Grab(_)
            | Self::AmbientStart
            | Self::AmbientStop
            | Self::Alert(_) => Channel::Motion,
            Self::RefreshAll | Self::Connected(_) => Channel::System,
        }
    }

    /// Returns the event name as it appears on the wire.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Move(_) => "move",
            Self::Grab(_) => "grab",
            Self::AmbientStart => "ambient_start",
            Self::AmbientStop => "ambient_stop",
            Self::Alert(_) => "alert",
            Self::RefreshAll => "refresh_all",
            Self::Connected(_) => "connected",
        }
    }

    /// Wraps the event in a wire envelope.
    pub fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        let data = match self {
            Self::Move(p) => serde_json::to_value(p)?,
            Self::Grab(p) => serde_json::to_value(p)?,
            Self::Alert(p) => serde_json::to_value(p)?,
            Self::Connected(p) => serde_json::to_value(p)?,
            Self::AmbientStart | Self::AmbientStop | Self::RefreshAll => {
                serde_json::to_value(EmptyPayload {})?
            }
        };
        Ok(Envelope {
            channel: self.channel().as_str().to_string(),
            event: self.event_name().to_string(),
            data,
        })
    }

    /// Serializes the event as a JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_envelope()?)
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// Errors produced while decoding a bus message.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The text is not a JSON envelope.
    #[error("invalid bus message: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The channel/event pair is not one this protocol knows.
    #[error("unknown event '{event}' on channel '{channel}'")]
    UnknownEvent {
        /// Channel named by the message.
        channel: String,
        /// Event named by the message.
        event: String,
    },

    /// The payload does not match the event's schema.
    #[error("malformed payload for event '{event}': {source}")]
    MalformedPayload {
        /// Event named by the message.
        event: String,
        /// The underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },
}

/// Raw message as it travels over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Channel name.
    pub channel: String,
    /// Event name.
    pub event: String,
    /// Event payload.
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Parses and decodes a JSON text frame in one step.
    pub fn parse(text: &str) -> Result<BusEvent, DecodeError> {
        let envelope: Self = serde_json::from_str(text).map_err(DecodeError::InvalidJson)?;
        envelope.decode()
    }

    /// Decodes the envelope into a typed event.
    pub fn decode(self) -> Result<BusEvent, DecodeError> {
        let Self {
            channel,
            event,
            data,
        } = self;

        let malformed = |source| DecodeError::MalformedPayload {
            event: event.clone(),
            source,
        };

        let decoded = match (channel.as_str(), event.as_str()) {
            ("motion", "move") => serde_json::from_value(data).map(BusEvent::Move),
            ("motion", "grab") => serde_json::from_value(data).map(BusEvent::Grab),
            ("motion", "alert") => serde_json::from_value(data).map(BusEvent::Alert),
            ("motion", "ambient_start") => Ok(BusEvent::AmbientStart),
            ("motion", "ambient_stop") => Ok(BusEvent::AmbientStop),
            ("system", "refresh_all") => Ok(BusEvent::RefreshAll),
            ("system", "connected") => serde_json::from_value(data).map(BusEvent::Connected),
            _ => {
                return Err(DecodeError::UnknownEvent {
                    channel: channel.clone(),
                    event: event.clone(),
                })
            }
        };

        decoded.map_err(malformed)
    }
}

// ============================================================================
// Tests
// ============================================================================
