//! Damage and wound resolution
//!
//! A hit is resolved in one pass: vulnerability, armor side, armor
//! subtraction, then health/stun/wound effects.

pub mod damage_type;
pub mod hit_location;
pub mod resolution;

pub use damage_type::{DamageModifiers, DamageType};
pub use hit_location::{body_part_of_impact, side_of_impact, ArmorSide, BodyPart};
pub use resolution::{resolve_hit, HitOutcome};
