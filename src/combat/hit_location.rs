//! Hit-location geometry: which armor side and body part a hit lands on
//!
//! The horizontal angle of the incoming vector is bucketed into 16
//! sectors; diagonal sectors break ties toward the facing-adjacent side
//! with 2-in-3 odds.

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::dice;
use crate::core::types::{Direction, Position};

/// Armor facing of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArmorSide {
    Front,
    Left,
    Right,
    Rear,
    Under,
}

impl ArmorSide {
    pub const COUNT: usize = 5;

    pub fn index(&self) -> usize {
        match self {
            ArmorSide::Front => 0,
            ArmorSide::Left => 1,
            ArmorSide::Right => 2,
            ArmorSide::Rear => 3,
            ArmorSide::Under => 4,
        }
    }

    pub fn all() -> [ArmorSide; ArmorSide::COUNT] {
        [
            ArmorSide::Front,
            ArmorSide::Left,
            ArmorSide::Right,
            ArmorSide::Rear,
            ArmorSide::Under,
        ]
    }
}

/// Body parts tracked for fatal wounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyPart {
    Head,
    Torso,
    RightArm,
    LeftArm,
    RightLeg,
    LeftLeg,
}

impl BodyPart {
    pub const COUNT: usize = 6;

    pub fn index(&self) -> usize {
        match self {
            BodyPart::Head => 0,
            BodyPart::Torso => 1,
            BodyPart::RightArm => 2,
            BodyPart::LeftArm => 3,
            BodyPart::RightLeg => 4,
            BodyPart::LeftLeg => 5,
        }
    }

    pub fn all() -> [BodyPart; BodyPart::COUNT] {
        [
            BodyPart::Head,
            BodyPart::Torso,
            BodyPart::RightArm,
            BodyPart::LeftArm,
            BodyPart::RightLeg,
            BodyPart::LeftLeg,
        ]
    }
}

/// Bucket the horizontal impact angle into one of 16 sectors (8..15)
///
/// Cardinal sectors map straight to a facing; the 8 narrow diagonal
/// sectors sit between them and resolve randomly in [`side_of_impact`].
fn impact_sector(relative: Position) -> u8 {
    let abs_x = relative.x.abs();
    let abs_y = relative.y.abs();

    if abs_y > abs_x * 2 {
        8 + 4 * u8::from(relative.y > 0)
    } else if abs_x > abs_y * 2 {
        10 + 4 * u8::from(relative.x < 0)
    } else if relative.x < 0 {
        if relative.y > 0 {
            13
        } else {
            15
        }
    } else if relative.y > 0 {
        11
    } else {
        9
    }
}

/// Resolve which armor side faces the incoming hit
///
/// `relative` is the impact origin minus the unit's position. The exact
/// zero vector means the damage came from below or inside (fire, floor
/// explosions) and always strikes the under side.
pub fn side_of_impact(relative: Position, facing: Direction, rng: &mut ChaCha8Rng) -> ArmorSide {
    if relative == Position::default() {
        return ArmorSide::Under;
    }

    let sector = impact_sector(relative);
    match (sector - facing.index()) % 8 {
        0 => ArmorSide::Front,
        1 => {
            if dice::range(rng, 0, 2) < 2 {
                ArmorSide::Front
            } else {
                ArmorSide::Right
            }
        }
        2 => ArmorSide::Right,
        3 => {
            if dice::range(rng, 0, 2) < 2 {
                ArmorSide::Rear
            } else {
                ArmorSide::Right
            }
        }
        4 => ArmorSide::Rear,
        5 => {
            if dice::range(rng, 0, 2) < 2 {
                ArmorSide::Rear
            } else {
                ArmorSide::Left
            }
        }
        6 => ArmorSide::Left,
        _ => {
            if dice::range(rng, 0, 2) < 2 {
                ArmorSide::Front
            } else {
                ArmorSide::Left
            }
        }
    }
}

/// Resolve which body part the hit strikes given the resolved side
///
/// `vertical` is the z component of the impact vector; `unit_height` is
/// the unit's standing height in voxel-ish units. At or above head
/// height the hit is always a head hit.
pub fn body_part_of_impact(
    side: ArmorSide,
    vertical: i32,
    unit_height: i32,
    rng: &mut ChaCha8Rng,
) -> BodyPart {
    if vertical >= unit_height {
        return BodyPart::Head;
    }

    if vertical * 2 >= unit_height {
        // upper band
        match side {
            ArmorSide::Left => BodyPart::LeftArm,
            ArmorSide::Right => BodyPart::RightArm,
            _ => BodyPart::Torso,
        }
    } else {
        // lower band
        match side {
            ArmorSide::Left => BodyPart::LeftLeg,
            ArmorSide::Right => BodyPart::RightLeg,
            _ => {
                if dice::flip(rng) {
                    BodyPart::LeftLeg
                } else {
                    BodyPart::RightLeg
                }
            }
        }
    }
}
