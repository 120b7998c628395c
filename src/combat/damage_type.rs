//! Damage classes and per-unit vulnerability modifiers

use serde::{Deserialize, Serialize};

/// Damage classes a hit can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageType {
    ArmorPiercing,
    Incendiary,
    HighExplosive,
    Laser,
    Plasma,
    Stun,
    Melee,
    Acid,
    Smoke,
}

impl DamageType {
    pub const COUNT: usize = 9;

    pub fn index(&self) -> usize {
        match self {
            DamageType::ArmorPiercing => 0,
            DamageType::Incendiary => 1,
            DamageType::HighExplosive => 2,
            DamageType::Laser => 3,
            DamageType::Plasma => 4,
            DamageType::Stun => 5,
            DamageType::Melee => 6,
            DamageType::Acid => 7,
            DamageType::Smoke => 8,
        }
    }

    /// Smoke carries no concussive payload; it resolves as stun damage.
    pub fn resolved(&self) -> DamageType {
        match self {
            DamageType::Smoke => DamageType::Stun,
            other => *other,
        }
    }
}

/// Per-unit vulnerability table, one factor per damage class
///
/// 1.0 is baseline, 0.0 is full immunity. Comes from the unit's armor
/// rules and is fixed for the mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageModifiers {
    factors: [f32; DamageType::COUNT],
}

impl Default for DamageModifiers {
    fn default() -> Self {
        Self {
            factors: [1.0; DamageType::COUNT],
        }
    }
}

impl DamageModifiers {
    pub fn new(factors: [f32; DamageType::COUNT]) -> Self {
        Self { factors }
    }

    pub fn modifier(&self, damage_type: DamageType) -> f32 {
        self.factors[damage_type.index()]
    }

    pub fn set(&mut self, damage_type: DamageType, factor: f32) {
        self.factors[damage_type.index()] = factor.max(0.0);
    }

    pub fn is_immune(&self, damage_type: DamageType) -> bool {
        self.modifier(damage_type) == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoke_resolves_as_stun() {
        assert_eq!(DamageType::Smoke.resolved(), DamageType::Stun);
        assert_eq!(DamageType::Laser.resolved(), DamageType::Laser);
    }

    #[test]
    fn test_default_modifiers_are_baseline() {
        let mods = DamageModifiers::default();
        assert_eq!(mods.modifier(DamageType::Plasma), 1.0);
        assert!(!mods.is_immune(DamageType::Stun));
    }

    #[test]
    fn test_immunity() {
        let mut mods = DamageModifiers::default();
        mods.set(DamageType::Stun, 0.0);
        assert!(mods.is_immune(DamageType::Stun));
    }

    #[test]
    fn test_negative_factor_clamped() {
        let mut mods = DamageModifiers::default();
        mods.set(DamageType::Acid, -0.5);
        assert_eq!(mods.modifier(DamageType::Acid), 0.0);
    }
}
