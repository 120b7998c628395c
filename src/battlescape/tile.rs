//! A single battlefield cell: terrain parts, hazards, light, contents

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::battlescape::constants::{
    FIREPROOF, HAZARD_ANIMATION_FRAMES, IGNITE_BONUS, MAX_SHADE, MAX_SMOKE, PART_SLOTS,
};
use crate::battlescape::terrain::{PartRef, PartSlot, TerrainLibrary};
use crate::core::dice;
use crate::core::types::{ItemId, Position, UnitId};

/// Which half-edges of a tile have been seen by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryFlag {
    West,
    North,
    Content,
}

impl DiscoveryFlag {
    pub fn index(&self) -> usize {
        match self {
            DiscoveryFlag::West => 0,
            DiscoveryFlag::North => 1,
            DiscoveryFlag::Content => 2,
        }
    }
}

/// Light layers composited into a tile's shade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightLayer {
    Ambient,
    Static,
    Dynamic,
}

impl LightLayer {
    pub fn index(&self) -> usize {
        match self {
            LightLayer::Ambient => 0,
            LightLayer::Static => 1,
            LightLayer::Dynamic => 2,
        }
    }
}

/// Doors live in the two wall slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoorSide {
    West,
    North,
}

impl DoorSide {
    pub fn index(&self) -> usize {
        match self {
            DoorSide::West => 0,
            DoorSide::North => 1,
        }
    }

    fn slot(&self) -> PartSlot {
        match self {
            DoorSide::West => PartSlot::WestWall,
            DoorSide::North => PartSlot::NorthWall,
        }
    }
}

/// Outcome of destroying one terrain part
#[derive(Debug, Clone, Copy, Default)]
pub struct DestroyResult {
    pub destroyed: bool,
    /// The part counted toward mission objectives
    pub objective: bool,
}

/// One cell of the battlefield
///
/// Tiles are allocated once for the battle's dimensions and mutate in
/// place. The occupant is a back-reference only; the unit list owns
/// units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    position: Position,
    parts: [Option<PartRef>; PART_SLOTS],
    frames: [u8; PART_SLOTS],
    fire: u8,
    smoke: u8,
    /// Smoke contributions received this round, for end-of-round averaging
    overlaps: u8,
    animation_offset: u8,
    danger: bool,
    obstacle: u8,
    discovered: [bool; 3],
    light: [u8; 3],
    doors_open: [bool; 2],
    occupant: Option<UnitId>,
    inventory: Vec<ItemId>,
    pending_explosion: u8,
}

impl Tile {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            parts: [None; PART_SLOTS],
            frames: [0; PART_SLOTS],
            fire: 0,
            smoke: 0,
            overlaps: 0,
            animation_offset: 0,
            danger: false,
            obstacle: 0,
            discovered: [false; 3],
            light: [0; 3],
            doors_open: [false; 2],
            occupant: None,
            inventory: Vec::new(),
            pending_explosion: 0,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    // === TERRAIN PARTS ===

    pub fn part(&self, slot: PartSlot) -> Option<PartRef> {
        self.parts[slot.index()]
    }

    pub fn set_part(&mut self, slot: PartSlot, part: Option<PartRef>) {
        self.parts[slot.index()] = part;
        self.frames[slot.index()] = 0;
    }

    pub fn frame(&self, slot: PartSlot) -> u8 {
        self.frames[slot.index()]
    }

    pub fn advance_frame(&mut self, slot: PartSlot) {
        let i = slot.index();
        self.frames[i] = (self.frames[i] + 1) % 8;
    }

    pub fn has_no_floor(&self) -> bool {
        self.parts[PartSlot::Floor.index()].is_none()
    }

    /// A tile with no parts, no smoke and no items is skipped on save
    pub fn is_void(&self) -> bool {
        self.parts.iter().all(Option::is_none) && self.smoke == 0 && self.inventory.is_empty()
    }

    /// Lowest flammability among present parts (most flammable dominates)
    pub fn flammability(&self, terrain: &TerrainLibrary) -> u8 {
        self.parts
            .iter()
            .flatten()
            .filter_map(|p| terrain.get(*p))
            .map(|p| p.flammability)
            .min()
            .unwrap_or(FIREPROOF)
    }

    /// Highest fuel among present parts
    pub fn fuel(&self, terrain: &TerrainLibrary) -> u8 {
        self.parts
            .iter()
            .flatten()
            .filter_map(|p| terrain.get(*p))
            .map(|p| p.fuel)
            .max()
            .unwrap_or(0)
    }

    // === FIRE & SMOKE ===

    pub fn fire(&self) -> u8 {
        self.fire
    }

    pub fn smoke(&self) -> u8 {
        self.smoke
    }

    pub fn overlaps(&self) -> u8 {
        self.overlaps
    }

    pub fn animation_offset(&self) -> u8 {
        self.animation_offset
    }

    pub fn set_fire(&mut self, turns: u8) {
        self.fire = turns;
    }

    pub fn decrement_fire(&mut self) {
        self.fire = self.fire.saturating_sub(1);
    }

    /// Try to set this tile alight with the given power
    ///
    /// Chance is `power - flammability/10 + 15`, floored at zero; a tile
    /// without fuel, already burning, or fully smoked over never ignites.
    /// On success the initial smoke, fire turns and animation jitter are
    /// all derived here so callers stay oblivious to the tuning.
    pub fn ignite(&mut self, power: i32, terrain: &TerrainLibrary, rng: &mut ChaCha8Rng) -> bool {
        let flammability = self.flammability(terrain);
        if flammability == FIREPROOF {
            return false;
        }
        let fuel = self.fuel(terrain);
        if fuel == 0 || self.fire != 0 || self.smoke >= 12 {
            return false;
        }

        let chance = (power - i32::from(flammability) / 10 + IGNITE_BONUS).max(0);
        if !dice::percent(rng, chance) {
            return false;
        }

        self.smoke = MAX_SMOKE - (i32::from(flammability) / 10).clamp(1, 12) as u8;
        self.overlaps = 1;
        self.fire = fuel + 1;
        self.animation_offset = dice::range(rng, 0, i32::from(HAZARD_ANIMATION_FRAMES) - 1) as u8;
        true
    }

    /// Add drifting smoke; burning tiles produce their own and take none
    ///
    /// The first contribution of a round clamps immediately; later ones
    /// accumulate raw and are averaged by [`Tile::finish_hazard_round`].
    pub fn add_smoke(&mut self, amount: u8) {
        if self.fire != 0 || amount == 0 {
            return;
        }
        if self.overlaps == 0 {
            self.smoke = self.smoke.saturating_add(amount).clamp(1, MAX_SMOKE);
        } else {
            self.smoke = self.smoke.saturating_add(amount);
        }
        self.overlaps = self.overlaps.saturating_add(1);
    }

    pub fn set_smoke(&mut self, smoke: u8) {
        self.smoke = smoke.min(MAX_SMOKE);
    }

    pub fn decrement_smoke(&mut self) {
        self.smoke = self.smoke.saturating_sub(1);
    }

    /// End-of-round tidy: average same-round smoke contributions, reroll
    /// the hazard animation jitter, clear the overlap and danger marks
    pub fn finish_hazard_round(&mut self, rng: &mut ChaCha8Rng) {
        if self.overlaps != 0 && self.smoke != 0 && self.fire == 0 {
            let averaged = i32::from(self.smoke) / i32::from(self.overlaps) - 1;
            self.smoke = averaged.clamp(0, i32::from(MAX_SMOKE)) as u8;
        }
        if self.smoke != 0 {
            self.animation_offset =
                dice::range(rng, 0, i32::from(HAZARD_ANIMATION_FRAMES) - 1) as u8;
        }
        self.overlaps = 0;
        self.danger = false;
    }

    // === DESTRUCTION ===

    /// Destroy one part: swap in its ruined variant or clear the slot
    ///
    /// Indestructible parts shrug the attempt off. Explosive parts leave
    /// a pending detonation for the caller to collect.
    pub fn destroy_part(&mut self, slot: PartSlot, terrain: &TerrainLibrary) -> DestroyResult {
        let mut result = DestroyResult::default();
        let Some(part_ref) = self.parts[slot.index()] else {
            return result;
        };
        let Some(part) = terrain.get(part_ref) else {
            // dangling reference: drop it rather than crash mid-round
            self.set_part(slot, None);
            return result;
        };

        if part.is_indestructible() {
            return result;
        }

        if part.explosiveness > 0 {
            self.pending_explosion = self.pending_explosion.max(part.explosiveness);
        }
        result.objective = part.objective;
        result.destroyed = true;

        let replacement = part.die_part.map(|die| PartRef {
            part: die,
            set: part_ref.set,
        });
        self.set_part(slot, replacement);
        result
    }

    pub fn pending_explosion(&self) -> u8 {
        self.pending_explosion
    }

    /// Collect and clear the pending explosive power on this tile
    pub fn take_pending_explosion(&mut self) -> u8 {
        std::mem::take(&mut self.pending_explosion)
    }

    // === DOORS ===

    /// Open a door in the given wall slot; false if there is no door
    pub fn open_door(&mut self, side: DoorSide, terrain: &TerrainLibrary) -> bool {
        let Some(part_ref) = self.part(side.slot()) else {
            return false;
        };
        let Some(part) = terrain.get(part_ref) else {
            return false;
        };
        if !part.door && !part.ufo_door {
            return false;
        }
        self.doors_open[side.index()] = true;
        true
    }

    pub fn close_door(&mut self, side: DoorSide) {
        self.doors_open[side.index()] = false;
    }

    /// Restore a door bit straight from a save record
    pub(crate) fn force_door_open(&mut self, side: DoorSide, open: bool) {
        self.doors_open[side.index()] = open;
    }

    pub fn is_door_open(&self, side: DoorSide) -> bool {
        self.doors_open[side.index()]
    }

    // === DISCOVERY, LIGHT, DANGER, OBSTACLES ===

    pub fn set_discovered(&mut self, flag: DiscoveryFlag) {
        self.discovered[flag.index()] = true;
        // seeing the content reveals both walls as well
        if flag == DiscoveryFlag::Content {
            self.discovered[DiscoveryFlag::West.index()] = true;
            self.discovered[DiscoveryFlag::North.index()] = true;
        }
    }

    pub fn is_discovered(&self, flag: DiscoveryFlag) -> bool {
        self.discovered[flag.index()]
    }

    /// Raise a light layer; layers only ever brighten within a recompute
    pub fn add_light(&mut self, layer: LightLayer, level: u8) {
        let i = layer.index();
        self.light[i] = self.light[i].max(level.min(MAX_SHADE));
    }

    pub fn reset_light(&mut self, layer: LightLayer) {
        self.light[layer.index()] = 0;
    }

    /// Darkness of the tile: 0 is daylight, 15 is pitch black
    pub fn shade(&self) -> u8 {
        MAX_SHADE - self.light.iter().copied().max().unwrap_or(0).min(MAX_SHADE)
    }

    pub fn set_danger(&mut self, danger: bool) {
        self.danger = danger;
    }

    pub fn is_dangerous(&self) -> bool {
        self.danger
    }

    /// Rebuild the obstacle bitmask from the current parts
    pub fn recompute_obstacles(&mut self, terrain: &TerrainLibrary) {
        self.obstacle = 0;
        for slot in [PartSlot::WestWall, PartSlot::NorthWall, PartSlot::Object] {
            let Some(part_ref) = self.part(slot) else {
                continue;
            };
            let Some(part) = terrain.get(part_ref) else {
                continue;
            };
            let obstructs = match slot {
                PartSlot::Object => part.big_wall,
                _ => true,
            };
            if obstructs {
                self.obstacle |= 1 << slot.index();
            }
        }
    }

    pub fn is_obstacle(&self, slot: PartSlot) -> bool {
        self.obstacle & (1 << slot.index()) != 0
    }

    // === CONTENTS ===

    pub fn occupant(&self) -> Option<UnitId> {
        self.occupant
    }

    pub fn set_occupant(&mut self, occupant: Option<UnitId>) {
        self.occupant = occupant;
    }

    pub fn items(&self) -> &[ItemId] {
        &self.inventory
    }

    pub fn add_item(&mut self, item: ItemId) {
        self.inventory.push(item);
    }

    pub fn remove_item(&mut self, item: ItemId) -> bool {
        if let Some(i) = self.inventory.iter().position(|&id| id == item) {
            self.inventory.remove(i);
            true
        } else {
            false
        }
    }

    pub fn drain_items(&mut self) -> Vec<ItemId> {
        std::mem::take(&mut self.inventory)
    }
}
