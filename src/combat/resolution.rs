//! Resolution of a single hit against a unit
//!
//! Pure pipeline: vulnerability modifier, armor side selection, armor
//! subtraction, then health/stun/wound effects on the target.

use rand_chacha::ChaCha8Rng;

use crate::battlescape::constants::{ARMOR_EROSION_DIVISOR, WOUND_MAX, WOUND_MIN};
use crate::battlescape::unit::BattleUnit;
use crate::combat::damage_type::DamageType;
use crate::combat::hit_location::{body_part_of_impact, side_of_impact, ArmorSide, BodyPart};
use crate::core::config::RulesConfig;
use crate::core::dice;
use crate::core::types::Position;

/// What one hit did to the target
#[derive(Debug, Clone, Copy)]
pub struct HitOutcome {
    /// Damage that got past armor (0 when absorbed)
    pub damage: i32,
    pub side: ArmorSide,
    pub body_part: BodyPart,
    /// Fatal wound points added, if any
    pub wound_points: u8,
    /// Armor soaked the whole hit
    pub absorbed: bool,
}

/// Resolve a hit with `power` arriving along `relative` (impact origin
/// minus unit position) and apply its effects to the unit
///
/// `ignore_armor` is used by environmental damage (fire, smoke) which
/// bypasses plating entirely. The resolved side and body part are
/// recorded on the unit as its fatal-shot info whatever the outcome.
pub fn resolve_hit(
    unit: &mut BattleUnit,
    relative: Position,
    power: i32,
    damage_type: DamageType,
    ignore_armor: bool,
    config: &RulesConfig,
    rng: &mut ChaCha8Rng,
) -> HitOutcome {
    let damage_type = damage_type.resolved();
    let mut power = (power as f32 * unit.damage_modifiers.modifier(damage_type)) as i32;

    let (side, body_part) = if ignore_armor {
        (ArmorSide::Under, BodyPart::Torso)
    } else {
        let side = side_of_impact(relative, unit.direction, rng);
        let body_part = body_part_of_impact(side, relative.z, unit.height, rng);
        power -= unit.armor(side);
        (side, body_part)
    };

    unit.fatal_shot_side = Some(side);
    unit.fatal_shot_part = Some(body_part);

    let mut outcome = HitOutcome {
        damage: 0,
        side,
        body_part,
        wound_points: 0,
        absorbed: true,
    };
    if power <= 0 {
        return outcome;
    }
    outcome.absorbed = false;
    outcome.damage = power;

    if damage_type == DamageType::Stun {
        unit.add_stun(power);
    } else {
        unit.take_health_damage(power);
        if damage_type != DamageType::Incendiary {
            if unit.is_woundable(config) && dice::range(rng, 0, 10) < power {
                let points = dice::range(rng, WOUND_MIN, WOUND_MAX) as u8;
                unit.add_wound(body_part, points);
                unit.change_morale(-i32::from(points));
                outcome.wound_points = points;
            }
            if !ignore_armor {
                unit.set_armor(side, unit.armor(side) - (power / ARMOR_EROSION_DIVISOR + 1));
            }
        }
    }

    unit.check_fall();
    outcome
}
