//! Direction symbols and claw positions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors raised while interpreting protocol values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The direction string is not one of the known symbols.
    #[error("unknown direction '{0}': expected one of up, down, left, right, grab, reset")]
    UnknownDirection(String),
}

/// A discrete command symbol for the claw.
///
/// The idle state is represented by `Option::<Direction>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Move one step towards negative y.
    Up,
    /// Move one step towards positive y.
    Down,
    /// Move one step towards negative x.
    Left,
    /// Move one step towards positive x.
    Right,
    /// Close the claw at the current position. Does not move.
    Grab,
    /// Return to the origin.
    Reset,
}

impl Direction {
    /// All direction symbols in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Up,
        Self::Down,
        Self::Left,
        Self::Right,
        Self::Grab,
        Self::Reset,
    ];

    /// Returns the lowercase wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
            Self::Grab => "grab",
            Self::Reset => "reset",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == lowered)
            .ok_or_else(|| ProtocolError::UnknownDirection(s.to_string()))
    }
}

/// Claw position in screen coordinates (y grows downwards).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl Position {
    /// The origin, where the claw starts and returns on reset.
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    /// Creates a new position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
