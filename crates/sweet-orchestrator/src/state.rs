//! Authoritative claw state.
//!
//! [`ClawState`] holds the position, the layout and the sugar level. It is a
//! plain value: serialization of access is the job of
//! [`Orchestrator`](crate::Orchestrator), which keeps it behind one mutex.

use serde::Serialize;
use sweet_protocol::{Direction, LayoutObject, Position, SnapshotPayload};

// ============================================================================
// Constants
// ============================================================================

/// Distance covered by one move command on one axis.
pub const STEP: i32 = 30;

/// Position is clamped to `[-BOUND, BOUND]` on both axes.
pub const BOUND: i32 = 120;

/// Maximum per-axis distance between a grab point and an object.
pub const GRAB_TOLERANCE: u32 = 40;

/// Sugar level at startup.
pub const SUGAR_BASELINE: i64 = 120;

/// Highest sugar level.
pub const SUGAR_CAP: i64 = 300;

/// Lowest sugar level.
pub const SUGAR_FLOOR: i64 = 0;

// ============================================================================
// Grab matching
// ============================================================================

/// Returns the first object in `layout` within [`GRAB_TOLERANCE`] of
/// `(x, y)` on both axes.
///
/// Layout order decides between overlapping objects; the closest object
/// does not win if an earlier one is also in range.
///
/// # Examples
///
/// ```
/// use sweet_orchestrator::state::match_grab;
/// use sweet_protocol::LayoutObject;
///
/// let layout = vec![
///     LayoutObject::new(1, "Candy", 15, 10, 10),
///     LayoutObject::new(2, "Chocolate", 25, 14, 6),
/// ];
/// assert_eq!(match_grab(&layout, 15, 5).map(|o| o.id), Some(1));
/// assert!(match_grab(&layout, 200, 200).is_none());
/// ```
#[must_use]
pub fn match_grab(layout: &[LayoutObject], x: i32, y: i32) -> Option<&LayoutObject> {
    layout
        .iter()
        .find(|o| o.x.abs_diff(x) <= GRAB_TOLERANCE && o.y.abs_diff(y) <= GRAB_TOLERANCE)
}

/// Turns a JSON number into a sugar level: rounded, then clamped.
///
/// Returns `None` for NaN and infinities.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn level_from_number(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    // Clamping first keeps the cast in range.
    let clamped = value.round().clamp(SUGAR_FLOOR as f64, SUGAR_CAP as f64);
    Some(clamped as i64)
}

// ============================================================================
// ClawState
// ============================================================================

/// Position, layout and sugar level of one claw machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClawState {
    /// Current claw position.
    pub position: Position,
    /// Objects on the play field, in placement order.
    pub layout: Vec<LayoutObject>,
    /// Current sugar level.
    pub level: i64,
}

impl Default for ClawState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClawState {
    /// Creates a state at the origin with an empty layout and baseline sugar.
    ///
    /// # Examples
    ///
    /// ```
    /// use sweet_orchestrator::ClawState;
    /// use sweet_protocol::Position;
    ///
    /// let state = ClawState::new();
    /// assert_eq!(state.position, Position::ORIGIN);
    /// assert!(state.layout.is_empty());
    /// assert_eq!(state.level, 120);
    /// ```
    #[must_use]
    pub const fn new() -> Self {
        Self {
            position: Position::ORIGIN,
            layout: Vec::new(),
            level: SUGAR_BASELINE,
        }
    }

    /// Creates a fresh state holding a recovered layout.
    #[must_use]
    pub fn with_layout(layout: Vec<LayoutObject>) -> Self {
        Self {
            layout,
            ..Self::new()
        }
    }

    /// Applies one move command and returns the resulting position.
    ///
    /// `grab` leaves the position unchanged; `reset` returns to the origin.
    ///
    /// # Examples
    ///
    /// ```
    /// use sweet_orchestrator::ClawState;
    /// use sweet_protocol::{Direction, Position};
    ///
    /// let mut state = ClawState::new();
    /// assert_eq!(state.apply_move(Direction::Up), Position::new(0, -30));
    /// assert_eq!(state.apply_move(Direction::Up), Position::new(0, -60));
    /// assert_eq!(state.apply_move(Direction::Reset), Position::ORIGIN);
    /// ```
    pub fn apply_move(&mut self, direction: Direction) -> Position {
        let Position { x, y } = self.position;
        self.position = match direction {
            Direction::Up => Position::new(x, (y - STEP).max(-BOUND)),
            Direction::Down => Position::new(x, (y + STEP).min(BOUND)),
            Direction::Left => Position::new((x - STEP).max(-BOUND), y),
            Direction::Right => Position::new((x + STEP).min(BOUND), y),
            Direction::Reset => Position::ORIGIN,
            Direction::Grab => self.position,
        };
        self.position
    }

    /// Evaluates a grab at `(x, y)` against the current layout.
    #[must_use]
    pub fn find_grab(&self, x: i32, y: i32) -> Option<&LayoutObject> {
        match_grab(&self.layout, x, y)
    }

    /// Adds a grabbed object's sugar and returns the new level.
    pub fn add_sugar(&mut self, sugar_value: i64) -> i64 {
        self.level = self
            .level
            .saturating_add(sugar_value)
            .clamp(SUGAR_FLOOR, SUGAR_CAP);
        self.level
    }

    /// Replaces the sugar level and returns the stored (clamped) value.
    pub fn set_level(&mut self, level: i64) -> i64 {
        self.level = level.clamp(SUGAR_FLOOR, SUGAR_CAP);
        self.level
    }

    /// Replaces the whole layout.
    pub fn replace_layout(&mut self, layout: Vec<LayoutObject>) {
        self.layout = layout;
    }

    /// Returns a copy suitable for the `connected` bus event.
    #[must_use]
    pub fn snapshot(&self) -> SnapshotPayload {
        SnapshotPayload {
            position: self.position,
            layout: self.layout.clone(),
            level: self.level,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
