//! Battle rules configuration with documented constants
//!
//! All gameplay-tunable values are collected here with explanations of
//! their purpose. Wire-format facts (record widths, clamp ceilings) live
//! in `battlescape::constants` instead; changing those breaks saves.

use serde::{Deserialize, Serialize};

use crate::core::error::Result;

/// Tunable rules for the battlescape simulation
///
/// These values reproduce the classic pacing. Changing them alters
/// difficulty and feel but never the wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    // === WOUNDS ===
    /// Whether non-player-origin units accrue fatal wounds
    ///
    /// Humans always bleed. With this on, hostiles and neutrals of any
    /// origin take fatal wounds too and will lose health each round until
    /// they die or are treated.
    pub alien_bleeding: bool,

    // === AI ===
    /// Round number from which the AI is granted perfect information
    ///
    /// Keeps endgames from stalling when the last enemies hide. Before
    /// this round the AI sees only what its units have spotted.
    pub cheat_turn_threshold: u32,

    // === MORALE ===
    /// Chance (percent) that a failed morale check becomes Berserk
    /// rather than Panicking
    pub berserk_chance: u32,

    /// Morale restored when a panicking or berserk unit snaps out of it
    /// at the start of its next turn
    pub panic_recovery_morale: i32,

    // === RECOVERY ===
    /// Stun points recovered naturally at the start of a unit's turn
    ///
    /// One point per round means a heavily stunned unit stays down for
    /// several rounds unless its health also drops.
    pub stun_recovery: i32,

    /// Divisor applied to max stamina for per-turn energy recovery
    ///
    /// At 3, a unit regains a third of its energy bar per round.
    pub energy_recovery_divisor: i32,

    // === FIRE ===
    /// Inclusive damage range for a unit's own burning tick at turn start
    pub fire_damage_min: i32,
    pub fire_damage_max: i32,

    /// Upper bound factor for the burn-duration roll when a unit catches
    /// fire from a burning tile (scaled by its incendiary vulnerability)
    pub burn_duration_factor: f32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            alien_bleeding: false,
            cheat_turn_threshold: 20,
            berserk_chance: 33,
            panic_recovery_morale: 15,
            stun_recovery: 1,
            energy_recovery_divisor: 3,
            fire_damage_min: 5,
            fire_damage_max: 10,
            burn_duration_factor: 5.0,
        }
    }
}

impl RulesConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML, then validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: RulesConfig = toml::from_str(text)?;
        config
            .validate()
            .map_err(crate::core::error::BattlescapeError::Config)?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.berserk_chance > 100 {
            return Err(format!(
                "berserk_chance ({}) must be a percentage",
                self.berserk_chance
            ));
        }

        if self.fire_damage_min > self.fire_damage_max {
            return Err(format!(
                "fire_damage_min ({}) must not exceed fire_damage_max ({})",
                self.fire_damage_min, self.fire_damage_max
            ));
        }

        if self.energy_recovery_divisor <= 0 {
            return Err("energy_recovery_divisor must be positive".into());
        }

        if self.cheat_turn_threshold == 0 {
            return Err("cheat_turn_threshold must be at least 1".into());
        }

        Ok(())
    }
}
