//! Terrain part rules: the static properties of floors, walls and objects
//!
//! Tiles reference parts by (part id, set id) pairs so the save record
//! stays stable across ruleset edits that only append.

use serde::{Deserialize, Serialize};

use crate::battlescape::constants::{FIREPROOF, INDESTRUCTIBLE};

/// The four part slots of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartSlot {
    Floor,
    WestWall,
    NorthWall,
    Object,
}

impl PartSlot {
    pub fn index(&self) -> usize {
        match self {
            PartSlot::Floor => 0,
            PartSlot::WestWall => 1,
            PartSlot::NorthWall => 2,
            PartSlot::Object => 3,
        }
    }

    pub fn all() -> [PartSlot; 4] {
        [
            PartSlot::Floor,
            PartSlot::WestWall,
            PartSlot::NorthWall,
            PartSlot::Object,
        ]
    }
}

/// Reference to a terrain part: index within a set, plus the set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartRef {
    pub part: u16,
    pub set: u8,
}

/// Static rule data for one terrain part
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainPart {
    pub name: String,
    /// 255 = indestructible
    pub armor: u8,
    /// 255 = fireproof; lower burns easier
    pub flammability: u8,
    /// Turns of fire this part sustains once lit
    pub fuel: u8,
    /// Nonzero parts detonate when destroyed
    pub explosiveness: u8,
    /// Ruined variant swapped in on destruction (index within the same set)
    pub die_part: Option<u16>,
    /// Whether the part stops horizontal fire spread across its edge
    pub blocks_fire: bool,
    /// Whether the part stops horizontal smoke spread across its edge
    pub blocks_smoke: bool,
    /// Object parts that act as a full-height wall
    pub big_wall: bool,
    pub door: bool,
    pub ufo_door: bool,
    /// Counts toward mission objectives when destroyed
    pub objective: bool,
    /// Static light emitted by the part (0 = none)
    pub light_source: u8,
    /// Time units to walk through/over this part
    pub tu_cost: u8,
}

impl TerrainPart {
    /// A plain part with sane defaults; builders below tweak the rest
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            armor: 20,
            flammability: FIREPROOF,
            fuel: 0,
            explosiveness: 0,
            die_part: None,
            blocks_fire: false,
            blocks_smoke: false,
            big_wall: false,
            door: false,
            ufo_door: false,
            objective: false,
            light_source: 0,
            tu_cost: 4,
        }
    }

    pub fn flammable(mut self, flammability: u8, fuel: u8) -> Self {
        self.flammability = flammability;
        self.fuel = fuel;
        self
    }

    pub fn armored(mut self, armor: u8) -> Self {
        self.armor = armor;
        self
    }

    pub fn wall(mut self) -> Self {
        self.blocks_fire = true;
        self.blocks_smoke = true;
        self
    }

    pub fn dies_into(mut self, part: u16) -> Self {
        self.die_part = Some(part);
        self
    }

    pub fn explosive(mut self, power: u8) -> Self {
        self.explosiveness = power;
        self
    }

    pub fn is_fireproof(&self) -> bool {
        self.flammability == FIREPROOF
    }

    pub fn is_indestructible(&self) -> bool {
        self.armor == INDESTRUCTIBLE
    }

    pub fn blocks(&self, smoke: bool) -> bool {
        if smoke {
            self.blocks_smoke
        } else {
            self.blocks_fire
        }
    }
}

/// An ordered set of parts, addressed by part index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerrainSet {
    pub name: String,
    pub parts: Vec<TerrainPart>,
}

impl TerrainSet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parts: Vec::new(),
        }
    }

    pub fn push(&mut self, part: TerrainPart) -> u16 {
        self.parts.push(part);
        (self.parts.len() - 1) as u16
    }

    pub fn get(&self, part: u16) -> Option<&TerrainPart> {
        self.parts.get(part as usize)
    }
}

/// All terrain sets loaded for a battle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerrainLibrary {
    pub sets: Vec<TerrainSet>,
}

impl TerrainLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_set(&mut self, set: TerrainSet) -> u8 {
        self.sets.push(set);
        (self.sets.len() - 1) as u8
    }

    /// Resolve a part reference; unknown references yield None
    pub fn get(&self, part_ref: PartRef) -> Option<&TerrainPart> {
        self.sets
            .get(part_ref.set as usize)
            .and_then(|s| s.get(part_ref.part))
    }

    pub fn contains(&self, part_ref: PartRef) -> bool {
        self.get(part_ref).is_some()
    }
}
