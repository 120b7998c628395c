//! Per-unit combat state
//!
//! Units are created at mission setup and never removed from the list
//! mid-mission; Dead/Unconscious/IgnoreMe mark them inert instead.

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use ahash::AHashMap;

use crate::combat::damage_type::{DamageModifiers, DamageType};
use crate::combat::hit_location::{ArmorSide, BodyPart};
use crate::core::config::RulesConfig;
use crate::core::dice;
use crate::core::types::{Direction, ItemId, Position, UnitId};

/// Allegiance controlling turn order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    Player,
    Hostile,
    Neutral,
}

/// Finite unit status machine
///
/// IgnoreMe is terminal: out of the battle without being a corpse, used
/// by entities that opt out mid-mission (exfiltration, conversion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitStatus {
    Standing,
    Walking,
    Flying,
    Turning,
    Aiming,
    Collapsing,
    Dead,
    Unconscious,
    Panicking,
    Berserk,
    IgnoreMe,
}

/// Primary stat block, also used for maxima
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    pub tu: i32,
    pub stamina: i32,
    pub health: i32,
    pub bravery: i32,
    pub reactions: i32,
    pub firing: i32,
    pub throwing: i32,
    pub psi_skill: i32,
    pub psi_strength: i32,
    pub melee: i32,
    pub strength: i32,
}

/// Mission experience counters, converted to stat growth at debrief
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experience {
    pub bravery: u32,
    pub reactions: u32,
    pub firing: u32,
    pub throwing: u32,
    pub psi_skill: u32,
    pub psi_strength: u32,
    pub melee: u32,
}

impl Experience {
    pub fn any(&self) -> bool {
        self.bravery + self.reactions + self.firing + self.throwing + self.psi_skill
            + self.psi_strength
            + self.melee
            > 0
    }
}

/// Stat increases granted by one experience conversion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatGrowth {
    pub bravery: i32,
    pub reactions: i32,
    pub firing: i32,
    pub throwing: i32,
    pub psi_skill: i32,
    pub psi_strength: i32,
    pub melee: i32,
}

/// Static rule data a unit is instantiated from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitArchetype {
    pub id: String,
    pub armor_id: String,
    pub stats: UnitStats,
    /// Max armor per side: front/left/right/rear/under
    pub armor: [i32; ArmorSide::COUNT],
    /// Footprint edge length: 1 or 2
    pub size: u8,
    /// Standing height used for head/torso/leg banding
    pub height: i32,
    pub can_fly: bool,
    /// Whether the unit can carry and rearrange items
    pub has_inventory: bool,
    /// Organic units accrue fatal wounds unconditionally
    pub bleeds: bool,
    /// Frames of the collapse animation before death/unconsciousness
    pub death_frames: u8,
    pub damage_modifiers: DamageModifiers,
    /// Item rule spawned on the grid while the unit lies unconscious
    pub body_item: Option<String>,
}

impl UnitArchetype {
    pub fn new(id: &str, armor_id: &str, stats: UnitStats) -> Self {
        Self {
            id: id.to_string(),
            armor_id: armor_id.to_string(),
            stats,
            armor: [12, 8, 8, 6, 4],
            size: 1,
            height: 20,
            can_fly: false,
            has_inventory: true,
            bleeds: true,
            death_frames: 3,
            damage_modifiers: DamageModifiers::default(),
            body_item: None,
        }
    }
}

/// Archetype registry keyed by type id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitCatalog {
    archetypes: AHashMap<String, UnitArchetype>,
}

impl UnitCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, archetype: UnitArchetype) {
        self.archetypes.insert(archetype.id.clone(), archetype);
    }

    pub fn get(&self, id: &str) -> Option<&UnitArchetype> {
        self.archetypes.get(id)
    }
}

/// A unit on the battlescape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleUnit {
    pub id: UnitId,
    pub archetype_id: String,
    pub armor_id: String,
    pub faction: Faction,
    /// Mind control and conversion can diverge this from `faction`
    pub original_faction: Faction,
    pub rank: u32,
    pub status: UnitStatus,

    pub position: Position,
    pub last_position: Position,
    pub destination: Option<Position>,
    pub direction: Direction,
    pub turret_direction: Direction,
    /// -1 means no turret
    pub turret_type: i32,
    pub size: u8,
    pub height: i32,
    pub can_fly: bool,
    pub has_inventory_capability: bool,
    pub bleeds: bool,
    pub kneeled: bool,
    pub floating: bool,

    pub tu: i32,
    pub energy: i32,
    pub health: i32,
    /// 0..=100
    pub morale: i32,
    pub stun: i32,
    pub max_stats: UnitStats,
    armor: [i32; ArmorSide::COUNT],
    max_armor: [i32; ArmorSide::COUNT],
    wounds: [u8; BodyPart::COUNT],
    pub damage_modifiers: DamageModifiers,

    pub inventory: Vec<ItemId>,
    pub exp: Experience,
    pub kills: u32,

    /// Turns this unit itself keeps burning
    pub fire: u8,
    pub visible: bool,
    pub turns_since_spotted: u32,
    pub dont_reselect: bool,
    /// Set once per round by the hazard damage pass
    pub took_fire_damage: bool,

    fall_phase: u8,
    pub death_frames: u8,
    pub fatal_shot_side: Option<ArmorSide>,
    pub fatal_shot_part: Option<BodyPart>,
    pub murderer: Option<UnitId>,
    pub mind_controller: Option<UnitId>,
    /// Sprite recolor pairs carried through the save for debrief display
    pub recolor: Vec<(u8, u8)>,
    pub body_item_rule: Option<String>,
}

impl BattleUnit {
    pub fn from_archetype(id: UnitId, archetype: &UnitArchetype, faction: Faction) -> Self {
        Self {
            id,
            archetype_id: archetype.id.clone(),
            armor_id: archetype.armor_id.clone(),
            faction,
            original_faction: faction,
            rank: 0,
            status: UnitStatus::Standing,
            position: Position::INVALID,
            last_position: Position::INVALID,
            destination: None,
            direction: Direction::North,
            turret_direction: Direction::North,
            turret_type: -1,
            size: archetype.size,
            height: archetype.height,
            can_fly: archetype.can_fly,
            has_inventory_capability: archetype.has_inventory,
            bleeds: archetype.bleeds,
            kneeled: false,
            floating: false,
            tu: archetype.stats.tu,
            energy: archetype.stats.stamina,
            health: archetype.stats.health,
            morale: 100,
            stun: 0,
            max_stats: archetype.stats,
            armor: archetype.armor,
            max_armor: archetype.armor,
            wounds: [0; BodyPart::COUNT],
            damage_modifiers: archetype.damage_modifiers.clone(),
            inventory: Vec::new(),
            exp: Experience::default(),
            kills: 0,
            fire: 0,
            visible: false,
            turns_since_spotted: 255,
            dont_reselect: false,
            took_fire_damage: false,
            fall_phase: 0,
            death_frames: archetype.death_frames,
            fatal_shot_side: None,
            fatal_shot_part: None,
            murderer: None,
            mind_controller: None,
            recolor: Vec::new(),
            body_item_rule: archetype.body_item.clone(),
        }
    }

    // === STATUS QUERIES ===

    /// Out of the battle: dead, knocked out, or opted out
    pub fn is_out(&self) -> bool {
        matches!(
            self.status,
            UnitStatus::Dead | UnitStatus::Unconscious | UnitStatus::IgnoreMe
        )
    }

    pub fn is_conscious(&self) -> bool {
        !self.is_out() && self.status != UnitStatus::Collapsing
    }

    /// Whether the unit may be picked by the selection scan
    pub fn is_selectable(&self, faction: Faction, check_reselect: bool, check_inventory: bool) -> bool {
        self.faction == faction
            && !self.is_out()
            && (!check_reselect || !self.dont_reselect)
            && (!check_inventory || self.has_inventory_capability)
    }

    /// Whether this unit accrues fatal wounds
    pub fn is_woundable(&self, config: &RulesConfig) -> bool {
        self.size == 1
            && (self.bleeds || (config.alien_bleeding && self.original_faction != Faction::Player))
    }

    // === POOLS, ARMOR, WOUNDS ===

    pub fn armor(&self, side: ArmorSide) -> i32 {
        self.armor[side.index()]
    }

    pub fn max_armor(&self, side: ArmorSide) -> i32 {
        self.max_armor[side.index()]
    }

    /// Set armor on a side, clamped to [0, max]
    pub fn set_armor(&mut self, side: ArmorSide, value: i32) {
        self.armor[side.index()] = value.clamp(0, self.max_armor[side.index()]);
    }

    pub fn change_morale(&mut self, delta: i32) {
        self.morale = (self.morale + delta).clamp(0, 100);
    }

    pub fn take_health_damage(&mut self, amount: i32) {
        self.health = (self.health - amount.max(0)).max(0);
    }

    pub fn add_stun(&mut self, amount: i32) {
        self.stun += amount.max(0);
    }

    pub fn wound_count(&self, part: BodyPart) -> u8 {
        self.wounds[part.index()]
    }

    pub fn add_wound(&mut self, part: BodyPart, points: u8) {
        self.wounds[part.index()] = self.wounds[part.index()].saturating_add(points);
    }

    pub fn heal_wound(&mut self, part: BodyPart, points: u8) {
        self.wounds[part.index()] = self.wounds[part.index()].saturating_sub(points);
    }

    pub fn total_wounds(&self) -> i32 {
        self.wounds.iter().map(|&w| i32::from(w)).sum()
    }

    pub fn wounds_array(&self) -> [u8; BodyPart::COUNT] {
        self.wounds
    }

    pub fn set_wounds_array(&mut self, wounds: [u8; BodyPart::COUNT]) {
        self.wounds = wounds;
    }

    pub fn armor_array(&self) -> [i32; ArmorSide::COUNT] {
        self.armor
    }

    pub fn set_armor_array(&mut self, armor: [i32; ArmorSide::COUNT]) {
        for side in ArmorSide::all() {
            self.set_armor(side, armor[side.index()]);
        }
    }

    pub fn set_fire(&mut self, turns: u8) {
        if self.damage_modifiers.is_immune(DamageType::Incendiary) {
            return;
        }
        self.fire = turns;
    }

    // === MOVEMENT ===

    /// Move the unit's authoritative origin; footprint relinking is the
    /// grid owner's responsibility
    pub fn set_position(&mut self, position: Position) {
        self.last_position = self.position;
        self.position = position;
    }

    // === COLLAPSE SEQUENCE ===

    /// Start collapsing if lethal damage or stun overload calls for it
    pub fn check_fall(&mut self) {
        if self.is_out() || self.status == UnitStatus::Collapsing {
            return;
        }
        if self.health == 0 || self.stun >= self.health {
            self.status = UnitStatus::Collapsing;
            self.fall_phase = 0;
        }
    }

    pub fn fall_phase(&self) -> u8 {
        self.fall_phase
    }

    /// Advance the collapse animation one frame; true when it completed
    ///
    /// Completion settles the final status: Dead when health is gone,
    /// Unconscious when only stun brought the unit down.
    pub fn advance_fall(&mut self) -> bool {
        if self.status != UnitStatus::Collapsing {
            return false;
        }
        self.fall_phase += 1;
        if self.fall_phase < self.death_frames {
            return false;
        }
        self.status = if self.health == 0 {
            UnitStatus::Dead
        } else {
            UnitStatus::Unconscious
        };
        self.kneeled = false;
        true
    }

    // === TURN UPKEEP ===

    /// Start-of-turn upkeep for this unit's faction
    ///
    /// `full_round` is false when resuming mid-round from a save, which
    /// skips the morale check so reloading cannot reroll panic.
    pub fn prepare_new_turn(&mut self, config: &RulesConfig, rng: &mut ChaCha8Rng, full_round: bool) {
        if self.is_out() {
            return;
        }

        self.tu = self.max_stats.tu;
        self.energy =
            (self.energy + self.max_stats.stamina / config.energy_recovery_divisor).min(self.max_stats.stamina);

        let wound_loss = self.total_wounds();
        if wound_loss > 0 {
            self.take_health_damage(wound_loss);
        }

        if self.fire > 0 {
            let raw = dice::range(rng, config.fire_damage_min, config.fire_damage_max);
            let scaled =
                (raw as f32 * self.damage_modifiers.modifier(DamageType::Incendiary)) as i32;
            self.take_health_damage(scaled);
            self.fire -= 1;
        }

        if self.stun > 0 {
            self.stun = (self.stun - config.stun_recovery).max(0);
        }

        self.check_fall();
        if self.status == UnitStatus::Collapsing {
            return;
        }

        if full_round {
            self.morale_check(config, rng);
        }
    }

    /// Panic bookkeeping: recover from last round's episode, or roll for
    /// a new one at `max(0, 100 - 2 * morale)` percent
    fn morale_check(&mut self, config: &RulesConfig, rng: &mut ChaCha8Rng) {
        if matches!(self.status, UnitStatus::Panicking | UnitStatus::Berserk) {
            self.status = UnitStatus::Standing;
            self.change_morale(config.panic_recovery_morale);
            return;
        }

        let chance = (100 - 2 * self.morale).max(0);
        if chance > 0 && dice::percent(rng, chance) {
            self.status = if dice::percent(rng, config.berserk_chance as i32) {
                UnitStatus::Berserk
            } else {
                UnitStatus::Panicking
            };
            tracing::debug!(unit = self.id.0, status = ?self.status, "morale break");
        }
    }

    // === EXPERIENCE ===

    /// Convert mission experience into stat growth at debrief
    pub fn convert_experience(&mut self, rng: &mut ChaCha8Rng) -> StatGrowth {
        let mut growth = StatGrowth::default();

        if self.exp.bravery > 0 && dice::range(rng, 0, 10) < self.exp.bravery as i32 {
            growth.bravery = 10;
        }
        growth.reactions = improvement_roll(rng, self.exp.reactions);
        growth.firing = improvement_roll(rng, self.exp.firing);
        growth.throwing = improvement_roll(rng, self.exp.throwing);
        growth.melee = improvement_roll(rng, self.exp.melee);
        growth.psi_skill = improvement_roll(rng, self.exp.psi_skill);
        growth.psi_strength = improvement_roll(rng, self.exp.psi_strength);

        self.max_stats.bravery += growth.bravery;
        self.max_stats.reactions += growth.reactions;
        self.max_stats.firing += growth.firing;
        self.max_stats.throwing += growth.throwing;
        self.max_stats.melee += growth.melee;
        self.max_stats.psi_skill += growth.psi_skill;
        self.max_stats.psi_strength += growth.psi_strength;
        self.exp = Experience::default();
        growth
    }
}

/// Growth bracket for one experience counter
fn improvement_roll(rng: &mut ChaCha8Rng, exp: u32) -> i32 {
    let tier = if exp > 10 {
        4
    } else if exp > 5 {
        3
    } else if exp > 2 {
        2
    } else if exp > 0 {
        1
    } else {
        return 0;
    };
    tier / 2 + dice::range(rng, 0, tier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn soldier_archetype() -> UnitArchetype {
        UnitArchetype::new(
            "soldier",
            "combat_vest",
            UnitStats {
                tu: 54,
                stamina: 60,
                health: 35,
                bravery: 40,
                reactions: 50,
                firing: 55,
                throwing: 50,
                psi_skill: 0,
                psi_strength: 30,
                melee: 40,
                strength: 30,
            },
        )
    }

    fn soldier(id: u32) -> BattleUnit {
        BattleUnit::from_archetype(UnitId(id), &soldier_archetype(), Faction::Player)
    }

    #[test]
    fn test_fresh_unit_pools_are_full() {
        let unit = soldier(1);
        assert_eq!(unit.health, 35);
        assert_eq!(unit.tu, 54);
        assert_eq!(unit.morale, 100);
        assert_eq!(unit.stun, 0);
        assert!(!unit.is_out());
    }

    #[test]
    fn test_armor_clamps_to_range() {
        let mut unit = soldier(1);
        unit.set_armor(ArmorSide::Front, -3);
        assert_eq!(unit.armor(ArmorSide::Front), 0);
        unit.set_armor(ArmorSide::Front, 999);
        assert_eq!(unit.armor(ArmorSide::Front), unit.max_armor(ArmorSide::Front));
    }

    #[test]
    fn test_morale_clamps() {
        let mut unit = soldier(1);
        unit.change_morale(-250);
        assert_eq!(unit.morale, 0);
        unit.change_morale(500);
        assert_eq!(unit.morale, 100);
    }

    #[test]
    fn test_selectability_filters() {
        let mut unit = soldier(1);
        assert!(unit.is_selectable(Faction::Player, false, false));
        assert!(!unit.is_selectable(Faction::Hostile, false, false));

        unit.dont_reselect = true;
        assert!(unit.is_selectable(Faction::Player, false, false));
        assert!(!unit.is_selectable(Faction::Player, true, false));

        unit.dont_reselect = false;
        unit.has_inventory_capability = false;
        assert!(!unit.is_selectable(Faction::Player, false, true));

        unit.status = UnitStatus::Unconscious;
        assert!(!unit.is_selectable(Faction::Player, false, false));
    }

    #[test]
    fn test_wound_eligibility() {
        let config = RulesConfig::default();
        let mut unit = soldier(1);
        assert!(unit.is_woundable(&config));

        unit.bleeds = false;
        unit.original_faction = Faction::Hostile;
        assert!(!unit.is_woundable(&config));

        let mut bleeding = RulesConfig::default();
        bleeding.alien_bleeding = true;
        assert!(unit.is_woundable(&bleeding));

        unit.size = 2;
        assert!(!unit.is_woundable(&bleeding));
    }

    #[test]
    fn test_collapse_runs_through_death_frames() {
        let mut unit = soldier(1);
        unit.health = 0;
        unit.check_fall();
        assert_eq!(unit.status, UnitStatus::Collapsing);

        // not dead until the animation finishes
        assert!(!unit.advance_fall());
        assert!(!unit.advance_fall());
        assert_eq!(unit.status, UnitStatus::Collapsing);
        assert!(unit.advance_fall());
        assert_eq!(unit.status, UnitStatus::Dead);
    }

    #[test]
    fn test_stun_overload_ends_unconscious() {
        let mut unit = soldier(1);
        unit.stun = unit.health + 5;
        unit.check_fall();
        for _ in 0..unit.death_frames {
            unit.advance_fall();
        }
        assert_eq!(unit.status, UnitStatus::Unconscious);
    }

    #[test]
    fn test_prepare_new_turn_bleeds_wounds() {
        let config = RulesConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut unit = soldier(1);
        unit.morale = 100; // no panic roll interference
        unit.add_wound(BodyPart::Torso, 2);
        unit.add_wound(BodyPart::Head, 1);

        let before = unit.health;
        unit.prepare_new_turn(&config, &mut rng, true);
        assert_eq!(unit.health, before - 3);
    }

    #[test]
    fn test_prepare_new_turn_refills_tu() {
        let config = RulesConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut unit = soldier(1);
        unit.tu = 2;
        unit.energy = 10;
        unit.prepare_new_turn(&config, &mut rng, true);
        assert_eq!(unit.tu, unit.max_stats.tu);
        assert_eq!(unit.energy, 10 + unit.max_stats.stamina / 3);
    }

    #[test]
    fn test_burning_unit_ticks_down() {
        let config = RulesConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut unit = soldier(1);
        unit.set_fire(2);
        let before = unit.health;
        unit.prepare_new_turn(&config, &mut rng, true);
        assert!(unit.health < before);
        assert_eq!(unit.fire, 1);
    }

    #[test]
    fn test_fire_immune_unit_never_lights() {
        let mut unit = soldier(1);
        unit.damage_modifiers.set(DamageType::Incendiary, 0.0);
        unit.set_fire(4);
        assert_eq!(unit.fire, 0);
    }

    #[test]
    fn test_zero_morale_always_breaks() {
        let config = RulesConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut unit = soldier(1);
        unit.morale = 0;
        unit.prepare_new_turn(&config, &mut rng, true);
        assert!(matches!(
            unit.status,
            UnitStatus::Panicking | UnitStatus::Berserk
        ));
    }

    #[test]
    fn test_full_morale_never_breaks() {
        let config = RulesConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..100 {
            let mut unit = soldier(1);
            unit.morale = 100;
            unit.prepare_new_turn(&config, &mut rng, true);
            assert_eq!(unit.status, UnitStatus::Standing);
        }
    }

    #[test]
    fn test_panicked_unit_recovers_next_round() {
        let config = RulesConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut unit = soldier(1);
        unit.status = UnitStatus::Panicking;
        unit.morale = 60;
        unit.prepare_new_turn(&config, &mut rng, true);
        assert_eq!(unit.status, UnitStatus::Standing);
        assert_eq!(unit.morale, 75);
    }

    #[test]
    fn test_mid_round_prepare_skips_morale_roll() {
        let config = RulesConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..50 {
            let mut unit = soldier(1);
            unit.morale = 0;
            unit.prepare_new_turn(&config, &mut rng, false);
            assert_eq!(unit.status, UnitStatus::Standing);
        }
    }

    #[test]
    fn test_berserk_subroll_rate() {
        let config = RulesConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let mut berserk = 0u32;
        let mut panicked = 0u32;
        for _ in 0..4000 {
            let mut unit = soldier(1);
            unit.morale = 0;
            unit.prepare_new_turn(&config, &mut rng, true);
            match unit.status {
                UnitStatus::Berserk => berserk += 1,
                UnitStatus::Panicking => panicked += 1,
                _ => unreachable!(),
            }
        }
        let rate = berserk as f32 / (berserk + panicked) as f32;
        assert!((rate - 0.33).abs() < 0.04, "berserk rate {}", rate);
    }

    #[test]
    fn test_experience_conversion_resets_counters() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut unit = soldier(1);
        unit.exp.firing = 12;
        let before = unit.max_stats.firing;

        let growth = unit.convert_experience(&mut rng);
        assert!(growth.firing >= 2 && growth.firing <= 6);
        assert_eq!(unit.max_stats.firing, before + growth.firing);
        assert!(!unit.exp.any());
    }

    #[test]
    fn test_no_experience_no_growth() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut unit = soldier(1);
        let growth = unit.convert_experience(&mut rng);
        assert_eq!(growth, StatGrowth::default());
    }
}
