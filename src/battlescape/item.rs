//! Battle items: weapons, ammo, grenades and the bodies of the fallen
//!
//! Placement is mutually exclusive: a carried item has an owner and no
//! tile, a dropped item has a tile and no owner.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::{ItemId, Position, UnitId};

/// Broad behavior class of an item rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemClass {
    Weapon,
    Ammo,
    Grenade,
    /// Stand-in object placed on the grid for an unconscious unit
    Body,
    Equipment,
}

/// Static rule data for an item type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRule {
    pub id: String,
    pub class: ItemClass,
    /// Ammo rule ids this weapon accepts (weapons only)
    pub compatible_ammo: Vec<String>,
    /// Inventory footprint
    pub inv_width: u8,
    pub inv_height: u8,
}

impl ItemRule {
    pub fn new(id: &str, class: ItemClass) -> Self {
        Self {
            id: id.to_string(),
            class,
            compatible_ammo: Vec::new(),
            inv_width: 1,
            inv_height: 1,
        }
    }

    pub fn with_ammo(mut self, ammo_ids: &[&str]) -> Self {
        self.compatible_ammo = ammo_ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn sized(mut self, width: u8, height: u8) -> Self {
        self.inv_width = width;
        self.inv_height = height;
        self
    }
}

/// All item rules loaded for a battle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemCatalog {
    rules: AHashMap<String, ItemRule>,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rule: ItemRule) {
        self.rules.insert(rule.id.clone(), rule);
    }

    pub fn get(&self, id: &str) -> Option<&ItemRule> {
        self.rules.get(id)
    }

    /// Whether `ammo_id` loads into `weapon_id`
    pub fn ammo_compatible(&self, weapon_id: &str, ammo_id: &str) -> bool {
        self.get(weapon_id)
            .map(|w| w.compatible_ammo.iter().any(|a| a == ammo_id))
            .unwrap_or(false)
    }
}

/// Named carrying positions on a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InventorySlot {
    RightHand,
    LeftHand,
    Belt,
    Backpack,
    Shoulder,
    Legs,
    #[default]
    Ground,
}

/// A concrete item instance in the battle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleItem {
    pub id: ItemId,
    pub rule_id: String,
    owner: Option<UnitId>,
    pub previous_owner: Option<UnitId>,
    tile: Option<Position>,
    pub ammo: Option<ItemId>,
    pub ammo_quantity: i32,
    /// Turns until detonation; -1 means not primed
    pub fuse: i32,
    pub slot: InventorySlot,
    pub slot_x: u8,
    pub slot_y: u8,
    pub ammo_in_weapon: bool,
    pub player_property: bool,
    pub dropped_on_enemy_turn: bool,
    /// Unit this item is the prone body of, if any
    pub body_of: Option<UnitId>,
}

impl BattleItem {
    pub fn new(id: ItemId, rule_id: &str) -> Self {
        Self {
            id,
            rule_id: rule_id.to_string(),
            owner: None,
            previous_owner: None,
            tile: None,
            ammo: None,
            ammo_quantity: 0,
            fuse: -1,
            slot: InventorySlot::Ground,
            slot_x: 0,
            slot_y: 0,
            ammo_in_weapon: false,
            player_property: false,
            dropped_on_enemy_turn: false,
            body_of: None,
        }
    }

    pub fn owner(&self) -> Option<UnitId> {
        self.owner
    }

    pub fn tile(&self) -> Option<Position> {
        self.tile
    }

    /// Hand the item to a unit, leaving whatever tile it lay on
    pub fn move_to_owner(&mut self, unit: UnitId, slot: InventorySlot, x: u8, y: u8) {
        if let Some(previous) = self.owner {
            self.previous_owner = Some(previous);
        }
        self.owner = Some(unit);
        self.tile = None;
        self.slot = slot;
        self.slot_x = x;
        self.slot_y = y;
    }

    /// Drop the item on the ground at `position`
    pub fn move_to_tile(&mut self, position: Position) {
        if let Some(previous) = self.owner {
            self.previous_owner = Some(previous);
        }
        self.owner = None;
        self.tile = Some(position);
        self.slot = InventorySlot::Ground;
        self.slot_x = 0;
        self.slot_y = 0;
    }

    pub fn is_primed(&self) -> bool {
        self.fuse >= 0
    }

    pub fn prime(&mut self, turns: i32) {
        self.fuse = turns.max(0);
    }

    pub fn defuse(&mut self) {
        self.fuse = -1;
    }

    pub fn fuse_expired(&self) -> bool {
        self.fuse == 0
    }

    /// Tick a primed fuse one round toward zero
    pub fn tick_fuse(&mut self) {
        if self.fuse > 0 {
            self.fuse -= 1;
        }
    }
}

/// Whether a proposed placement collides with an already-placed item
///
/// Both footprints come from the rules; the hand slots ignore offsets
/// entirely and conflict whenever they are the same slot.
pub fn placement_conflicts(
    catalog: &ItemCatalog,
    candidate: (&BattleItem, InventorySlot, u8, u8),
    placed: &BattleItem,
) -> bool {
    let (item, slot, x, y) = candidate;
    if placed.slot != slot {
        return false;
    }
    if matches!(slot, InventorySlot::RightHand | InventorySlot::LeftHand) {
        return true;
    }
    let dims = |i: &BattleItem| {
        catalog
            .get(&i.rule_id)
            .map(|r| (i32::from(r.inv_width), i32::from(r.inv_height)))
            .unwrap_or((1, 1))
    };
    let (cw, ch) = dims(item);
    let (pw, ph) = dims(placed);
    let (cx, cy) = (i32::from(x), i32::from(y));
    let (px, py) = (i32::from(placed.slot_x), i32::from(placed.slot_y));
    cx < px + pw && px < cx + cw && cy < py + ph && py < cy + ch
}
