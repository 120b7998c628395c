//! Core value types shared across the battlescape

use serde::{Deserialize, Serialize};

/// Integer grid coordinate on the battlefield (x east, y south, z up)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    /// Sentinel for entities currently off the grid (carried, unconscious body)
    pub const INVALID: Position = Position { x: -1, y: -1, z: -1 };

    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Horizontal squared distance (z ignored)
    pub fn distance_2d_sq(&self, other: &Self) -> i32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

impl std::ops::Add for Position {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Position {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Facing on the grid, 8 directions clockwise from north
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    /// All 8 directions in clockwise order
    pub fn all() -> [Direction; 8] {
        [
            Direction::North,
            Direction::NorthEast,
            Direction::East,
            Direction::SouthEast,
            Direction::South,
            Direction::SouthWest,
            Direction::West,
            Direction::NorthWest,
        ]
    }

    /// The 4 cardinal directions, in the order hazard spread visits neighbors
    pub fn cardinals() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    pub fn index(&self) -> u8 {
        *self as u8
    }

    pub fn from_index(index: u8) -> Option<Direction> {
        Self::all().get(index as usize).copied()
    }

    /// Unit offset in grid space (north is -y)
    pub fn offset(&self) -> Position {
        match self {
            Direction::North => Position::new(0, -1, 0),
            Direction::NorthEast => Position::new(1, -1, 0),
            Direction::East => Position::new(1, 0, 0),
            Direction::SouthEast => Position::new(1, 1, 0),
            Direction::South => Position::new(0, 1, 0),
            Direction::SouthWest => Position::new(-1, 1, 0),
            Direction::West => Position::new(-1, 0, 0),
            Direction::NorthWest => Position::new(-1, -1, 0),
        }
    }
}

/// Unique identifier for battle units
///
/// Player-origin units are allocated below [`UnitId::PLAYER_CEILING`];
/// ruleset-spawned units are allocated at or above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl UnitId {
    pub const PLAYER_CEILING: u32 = 1_000_000;

    pub fn is_player_origin(&self) -> bool {
        self.0 < Self::PLAYER_CEILING
    }
}

/// Unique identifier for battle items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);

/// Battlescape round counter (first round is 1)
pub type TurnNumber = u32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_arithmetic() {
        let a = Position::new(3, 4, 1);
        let b = Position::new(1, 1, 0);
        assert_eq!(a + b, Position::new(4, 5, 1));
        assert_eq!(a - b, Position::new(2, 3, 1));
    }

    #[test]
    fn test_invalid_position_sentinel() {
        assert!(!Position::INVALID.is_valid());
        assert!(Position::default().is_valid());
    }

    #[test]
    fn test_direction_round_trip() {
        for dir in Direction::all() {
            assert_eq!(Direction::from_index(dir.index()), Some(dir));
        }
        assert_eq!(Direction::from_index(8), None);
    }

    #[test]
    fn test_cardinal_offsets_are_unit_steps() {
        for dir in Direction::cardinals() {
            let o = dir.offset();
            assert_eq!(o.x.abs() + o.y.abs(), 1);
            assert_eq!(o.z, 0);
        }
    }

    #[test]
    fn test_player_origin_id_boundary() {
        assert!(UnitId(999_999).is_player_origin());
        assert!(!UnitId(1_000_000).is_player_origin());
    }
}
