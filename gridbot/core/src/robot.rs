//! Robot State
//!
//! Position and heading of the robot on the fixed toroidal grid, plus the
//! motion arithmetic that keeps both inside their valid ranges.
//!
//! # Coordinates
//!
//! ```text
//!        x →  0 1 2 ... 14
//!   y  0      . . .     .
//!   ↓  1      . . .     .
//!      ...
//!      14     . . .     .
//! ```
//!
//! North (heading 0) points up, i.e. towards *decreasing* `y`. Moving off any
//! edge re-enters from the opposite edge; coordinates never clamp.

/// Grid width in cells
pub const GRID_WIDTH: u32 = 15;

/// Grid height in cells
pub const GRID_HEIGHT: u32 = 15;

/// Compass heading of the robot, stored as one of the four cardinal directions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Heading {
    /// Facing up (0°)
    #[default]
    North,
    /// Facing right (90°)
    East,
    /// Facing down (180°)
    South,
    /// Facing left (270°)
    West,
}

impl Heading {
    /// All headings in clockwise order starting at North
    pub const ALL: [Heading; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Heading in degrees, one of 0, 90, 180 or 270
    #[must_use]
    pub fn degrees(self) -> u16 {
        match self {
            Self::North => 0,
            Self::East => 90,
            Self::South => 180,
            Self::West => 270,
        }
    }

    /// Parse a heading from degrees; any multiple of 90 (including negative) is accepted
    #[must_use]
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(Self::ALL[(degrees.rem_euclid(360) / 90) as usize])
    }

    /// Rotate 90° counter-clockwise
    #[must_use]
    pub fn left(self) -> Self {
        Self::ALL[(self.index() + 3) % 4]
    }

    /// Rotate 90° clockwise
    #[must_use]
    pub fn right(self) -> Self {
        Self::ALL[(self.index() + 1) % 4]
    }

    /// Unit step `(dx, dy)` for moving forward along this heading
    #[must_use]
    pub fn delta(self) -> (i64, i64) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }

    /// Human-readable facing used by views and the chat client
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::North => "Up",
            Self::East => "Right",
            Self::South => "Down",
            Self::West => "Left",
        }
    }

    /// Single-character glyph pointing in this direction
    #[must_use]
    pub fn glyph(self) -> char {
        match self {
            Self::North => '^',
            Self::East => '>',
            Self::South => 'v',
            Self::West => '<',
        }
    }

    fn index(self) -> usize {
        usize::from(self.degrees() / 90)
    }
}

impl std::fmt::Display for Heading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.degrees())
    }
}

/// Read-only view of the robot at one instant
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RobotSnapshot {
    /// Column, `0..GRID_WIDTH`
    pub x: u32,
    /// Row, `0..GRID_HEIGHT`
    pub y: u32,
    /// Current heading
    pub heading: Heading,
}

impl RobotSnapshot {
    /// Format as the protocol's position reply: `"<x> <y> <heading>"`
    #[must_use]
    pub fn wire(&self) -> String {
        format!("{} {} {}", self.x, self.y, self.heading.degrees())
    }

    /// Format for humans: `Position: (x, y), Facing: Up`
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "Position: ({}, {}), Facing: {}",
            self.x,
            self.y,
            self.heading.label()
        )
    }
}

impl Default for RobotSnapshot {
    fn default() -> Self {
        RobotState::new().snapshot()
    }
}

/// Mutable robot state
///
/// There is one of these per server, owned by [`crate::grid::RobotGrid`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RobotState {
    x: u32,
    y: u32,
    heading: Heading,
}

impl Default for RobotState {
    fn default() -> Self {
        Self::new()
    }
}

impl RobotState {
    /// Robot at the grid centre, facing North
    #[must_use]
    pub fn new() -> Self {
        let (x, y) = Self::center_cell();
        Self {
            x,
            y,
            heading: Heading::North,
        }
    }

    /// Robot at an explicit cell and heading; coordinates are wrapped onto the grid
    #[must_use]
    pub fn at(x: i64, y: i64, heading: Heading) -> Self {
        let mut state = Self { x: 0, y: 0, heading };
        state.set_wrapped(x, y);
        state
    }

    /// The centre cell, `(7, 7)` on a 15×15 grid
    #[must_use]
    pub fn center_cell() -> (u32, u32) {
        (GRID_WIDTH / 2, GRID_HEIGHT / 2)
    }

    /// Move `n` cells along the current heading
    pub fn move_forward(&mut self, n: u32) {
        self.translate(i64::from(n));
    }

    /// Move `n` cells against the current heading
    pub fn move_backward(&mut self, n: u32) {
        self.translate(-i64::from(n));
    }

    /// Rotate 90° counter-clockwise
    pub fn turn_left(&mut self) {
        self.heading = self.heading.left();
    }

    /// Rotate 90° clockwise
    pub fn turn_right(&mut self) {
        self.heading = self.heading.right();
    }

    /// Return to the centre cell; heading is kept
    pub fn center(&mut self) {
        let (x, y) = Self::center_cell();
        self.x = x;
        self.y = y;
    }

    /// Current position and heading
    #[must_use]
    pub fn snapshot(&self) -> RobotSnapshot {
        RobotSnapshot {
            x: self.x,
            y: self.y,
            heading: self.heading,
        }
    }

    fn translate(&mut self, distance: i64) {
        let (dx, dy) = self.heading.delta();
        self.set_wrapped(
            i64::from(self.x) + dx * distance,
            i64::from(self.y) + dy * distance,
        );
    }

    // rem_euclid keeps the result in 0..size for negative inputs
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn set_wrapped(&mut self, x: i64, y: i64) {
        self.x = x.rem_euclid(i64::from(GRID_WIDTH)) as u32;
        self.y = y.rem_euclid(i64::from(GRID_HEIGHT)) as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_states() -> impl Iterator<Item = RobotState> {
        (0..GRID_WIDTH).flat_map(|x| {
            (0..GRID_HEIGHT).flat_map(move |y| {
                Heading::ALL
                    .into_iter()
                    .map(move |h| RobotState::at(i64::from(x), i64::from(y), h))
            })
        })
    }

    #[test]
    fn test_initial_state() {
        let state = RobotState::new();
        let snap = state.snapshot();
        assert_eq!((snap.x, snap.y), (7, 7));
        assert_eq!(snap.heading, Heading::North);
        assert_eq!(snap.wire(), "7 7 0");
    }

    #[test]
    fn test_forward_north_decreases_y() {
        let mut state = RobotState::new();
        state.move_forward(3);
        assert_eq!(state.snapshot().wire(), "7 4 0");
    }

    #[test]
    fn test_each_heading_moves_expected_axis() {
        let cases = [
            (Heading::North, (7, 6)),
            (Heading::East, (8, 7)),
            (Heading::South, (7, 8)),
            (Heading::West, (6, 7)),
        ];
        for (heading, expected) in cases {
            let mut state = RobotState::at(7, 7, heading);
            state.move_forward(1);
            let snap = state.snapshot();
            assert_eq!((snap.x, snap.y), expected, "heading {heading:?}");
        }
    }

    #[test]
    fn test_wraparound_edges() {
        let mut state = RobotState::at(0, 0, Heading::North);
        state.move_forward(1);
        assert_eq!((state.snapshot().x, state.snapshot().y), (0, 14));

        let mut state = RobotState::at(14, 3, Heading::East);
        state.move_forward(1);
        assert_eq!((state.snapshot().x, state.snapshot().y), (0, 3));

        let mut state = RobotState::at(0, 3, Heading::East);
        state.move_backward(1);
        assert_eq!((state.snapshot().x, state.snapshot().y), (14, 3));
    }

    #[test]
    fn test_large_moves_wrap() {
        let mut state = RobotState::new();
        state.move_forward(u32::MAX);
        let snap = state.snapshot();
        assert!(snap.x < GRID_WIDTH && snap.y < GRID_HEIGHT);
        // u32::MAX = 4294967295 ≡ 0 (mod 15)
        assert_eq!((snap.x, snap.y), (7, 7));

        let mut state = RobotState::new();
        state.move_forward(15);
        assert_eq!(state, RobotState::new());
    }

    #[test]
    fn test_forward_then_backward_is_identity() {
        for start in all_states() {
            for n in [0, 1, 2, 7, 14, 15, 16, 100, 12_345] {
                let mut state = start.clone();
                state.move_forward(n);
                state.move_backward(n);
                assert_eq!(state, start, "n = {n}");
            }
        }
    }

    #[test]
    fn test_left_then_right_is_identity() {
        for heading in Heading::ALL {
            let mut state = RobotState::at(3, 4, heading);
            state.turn_left();
            state.turn_right();
            assert_eq!(state.snapshot().heading, heading);

            state.turn_right();
            state.turn_left();
            assert_eq!(state.snapshot().heading, heading);
        }
    }

    #[test]
    fn test_turn_sequences_stay_cardinal() {
        let mut state = RobotState::new();
        let mut expected: i32 = 0;
        // Deterministic mix of left and right turns
        for i in 0u32..200 {
            if i % 3 == 0 {
                state.turn_left();
                expected -= 90;
            } else {
                state.turn_right();
                expected += 90;
            }
            let degrees = state.snapshot().heading.degrees();
            assert!(matches!(degrees, 0 | 90 | 180 | 270));
            assert_eq!(i32::from(degrees), expected.rem_euclid(360));
        }
    }

    #[test]
    fn test_positions_stay_in_bounds() {
        let mut state = RobotState::at(14, 0, Heading::West);
        for i in 0u32..500 {
            match i % 5 {
                0 => state.move_forward(i),
                1 => state.turn_right(),
                2 => state.move_backward(i * 3),
                3 => state.turn_left(),
                _ => state.move_forward(1),
            }
            let snap = state.snapshot();
            assert!(snap.x <= 14 && snap.y <= 14, "out of bounds at step {i}");
        }
    }

    #[test]
    fn test_center_keeps_heading() {
        for start in all_states() {
            let mut state = start.clone();
            state.center();
            let snap = state.snapshot();
            assert_eq!((snap.x, snap.y), (7, 7));
            assert_eq!(snap.heading, start.snapshot().heading);
        }
    }

    #[test]
    fn test_heading_from_degrees() {
        assert_eq!(Heading::from_degrees(0), Some(Heading::North));
        assert_eq!(Heading::from_degrees(270), Some(Heading::West));
        assert_eq!(Heading::from_degrees(-90), Some(Heading::West));
        assert_eq!(Heading::from_degrees(450), Some(Heading::East));
        assert_eq!(Heading::from_degrees(45), None);
    }

    #[test]
    fn test_describe() {
        let snap = RobotState::at(2, 9, Heading::South).snapshot();
        assert_eq!(snap.describe(), "Position: (2, 9), Facing: Down");
    }
}
