//! Save contract: sparse packed tile records plus unit/item documents
//!
//! Tiles pack into a fixed-width binary record indexed by flat grid
//! index, void tiles skipped. Units and items keep their name-stable
//! field lists. Loading re-links every reference by id; a dangling id
//! aborts the whole load.

use serde::{Deserialize, Serialize};

use crate::battlescape::item::{BattleItem, InventorySlot, ItemCatalog};
use crate::battlescape::map::BattleMap;
use crate::battlescape::state::{Battlescape, TuReservation};
use crate::battlescape::terrain::{PartRef, PartSlot, TerrainLibrary};
use crate::battlescape::tile::{DiscoveryFlag, DoorSide, Tile};
use crate::battlescape::unit::{BattleUnit, Experience, Faction, UnitCatalog, UnitStatus};
use crate::core::config::RulesConfig;
use crate::core::error::{BattlescapeError, Result};
use crate::core::types::{Direction, ItemId, Position, TurnNumber, UnitId};

/// Bytes per packed tile record:
/// 4 x part id (u16) + 4 x set id + fire + smoke + flags
pub const TILE_RECORD_BYTES: usize = 15;

/// Part id marking an empty slot in the packed record
const EMPTY_PART: u16 = u16::MAX;

/// Pack one tile into its fixed-width record
pub fn pack_tile(tile: &Tile) -> [u8; TILE_RECORD_BYTES] {
    let mut record = [0u8; TILE_RECORD_BYTES];
    for slot in PartSlot::all() {
        let (part, set) = match tile.part(slot) {
            Some(p) => (p.part, p.set),
            None => (EMPTY_PART, 0),
        };
        let i = slot.index();
        record[i * 2..i * 2 + 2].copy_from_slice(&part.to_le_bytes());
        record[8 + i] = set;
    }
    record[12] = tile.fire();
    record[13] = tile.smoke();

    let mut flags = 0u8;
    for (bit, flag) in [
        DiscoveryFlag::West,
        DiscoveryFlag::North,
        DiscoveryFlag::Content,
    ]
    .iter()
    .enumerate()
    {
        if tile.is_discovered(*flag) {
            flags |= 1 << bit;
        }
    }
    if tile.is_door_open(DoorSide::West) {
        flags |= 1 << 3;
    }
    if tile.is_door_open(DoorSide::North) {
        flags |= 1 << 4;
    }
    record[14] = flags;
    record
}

/// Fields recovered from a packed tile record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRecord {
    pub parts: [Option<PartRef>; 4],
    pub fire: u8,
    pub smoke: u8,
    pub discovered: [bool; 3],
    pub doors_open: [bool; 2],
}

/// Unpack a packed tile record
pub fn unpack_tile(bytes: &[u8]) -> Result<TileRecord> {
    if bytes.len() != TILE_RECORD_BYTES {
        return Err(BattlescapeError::MalformedTileRecord {
            got: bytes.len(),
            expected: TILE_RECORD_BYTES,
        });
    }
    let mut parts = [None; 4];
    for slot in PartSlot::all() {
        let i = slot.index();
        let part = u16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]);
        if part != EMPTY_PART {
            parts[i] = Some(PartRef {
                part,
                set: bytes[8 + i],
            });
        }
    }
    let flags = bytes[14];
    Ok(TileRecord {
        parts,
        fire: bytes[12],
        smoke: bytes[13],
        discovered: [flags & 1 != 0, flags & 2 != 0, flags & 4 != 0],
        doors_open: [flags & 8 != 0, flags & 16 != 0],
    })
}

/// One non-void tile in the save, keyed by flat grid index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileEntry {
    pub index: u32,
    pub record: Vec<u8>,
}

/// Persisted per-unit fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitRecord {
    pub id: UnitId,
    pub archetype_id: String,
    pub armor_id: String,
    pub faction: Faction,
    pub original_faction: Faction,
    pub status: UnitStatus,
    pub position: Position,
    pub direction: Direction,
    pub turret_direction: Direction,
    pub tu: i32,
    pub health: i32,
    pub stun: i32,
    pub energy: i32,
    pub morale: i32,
    pub kneeled: bool,
    pub floating: bool,
    pub armor: [i32; 5],
    pub wounds: [u8; 6],
    pub fire: u8,
    pub exp: Experience,
    pub turret_type: i32,
    pub visible: bool,
    pub turns_since_spotted: u32,
    pub rank: u32,
    pub kills: u32,
    pub recolor: Vec<(u8, u8)>,
    pub murderer: Option<UnitId>,
    pub mind_controller: Option<UnitId>,
}

impl UnitRecord {
    fn capture(unit: &BattleUnit) -> Self {
        Self {
            id: unit.id,
            archetype_id: unit.archetype_id.clone(),
            armor_id: unit.armor_id.clone(),
            faction: unit.faction,
            original_faction: unit.original_faction,
            status: unit.status,
            position: unit.position,
            direction: unit.direction,
            turret_direction: unit.turret_direction,
            tu: unit.tu,
            health: unit.health,
            stun: unit.stun,
            energy: unit.energy,
            morale: unit.morale,
            kneeled: unit.kneeled,
            floating: unit.floating,
            armor: unit.armor_array(),
            wounds: unit.wounds_array(),
            fire: unit.fire,
            exp: unit.exp,
            turret_type: unit.turret_type,
            visible: unit.visible,
            turns_since_spotted: unit.turns_since_spotted,
            rank: unit.rank,
            kills: unit.kills,
            recolor: unit.recolor.clone(),
            murderer: unit.murderer,
            mind_controller: unit.mind_controller,
        }
    }
}

/// Persisted per-item fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: ItemId,
    pub rule_id: String,
    pub owner: Option<UnitId>,
    pub previous_owner: Option<UnitId>,
    pub tile: Option<Position>,
    pub ammo: Option<ItemId>,
    pub ammo_quantity: i32,
    pub fuse: i32,
    pub slot: InventorySlot,
    pub slot_x: u8,
    pub slot_y: u8,
    pub ammo_in_weapon: bool,
    pub player_property: bool,
    pub dropped_on_enemy_turn: bool,
    pub body_of: Option<UnitId>,
}

impl ItemRecord {
    fn capture(item: &BattleItem) -> Self {
        Self {
            id: item.id,
            rule_id: item.rule_id.clone(),
            owner: item.owner(),
            previous_owner: item.previous_owner,
            tile: item.tile(),
            ammo: item.ammo,
            ammo_quantity: item.ammo_quantity,
            fuse: item.fuse,
            slot: item.slot,
            slot_x: item.slot_x,
            slot_y: item.slot_y,
            ammo_in_weapon: item.ammo_in_weapon,
            player_property: item.player_property,
            dropped_on_enemy_turn: item.dropped_on_enemy_turn,
            body_of: item.body_of,
        }
    }
}

/// A complete battle save document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleSave {
    pub width: u32,
    pub length: u32,
    pub height: u32,
    pub turn: TurnNumber,
    pub side: Faction,
    pub mission_type: String,
    pub global_shade: u8,
    pub tu_reservation: TuReservation,
    pub objectives_needed: u32,
    pub objectives_destroyed: u32,
    pub rng_seed: u64,
    pub tiles: Vec<TileEntry>,
    pub units: Vec<UnitRecord>,
    pub items: Vec<ItemRecord>,
}

impl BattleSave {
    /// Snapshot a battle, skipping void tiles
    pub fn capture(battle: &Battlescape) -> Self {
        let map = battle.map();
        let mut tiles = Vec::new();
        for index in 0..map.tile_count() {
            if let Some(tile) = map.tile_at(index) {
                if !tile.is_void() {
                    tiles.push(TileEntry {
                        index: index as u32,
                        record: pack_tile(tile).to_vec(),
                    });
                }
            }
        }

        Self {
            width: map.width(),
            length: map.length(),
            height: map.height(),
            turn: battle.turn(),
            side: battle.side(),
            mission_type: battle.mission_type.clone(),
            global_shade: battle.global_shade,
            tu_reservation: battle.tu_reservation,
            objectives_needed: battle.objectives_needed,
            objectives_destroyed: battle.objectives_destroyed,
            rng_seed: battle.seed(),
            tiles,
            units: battle.units().iter().map(UnitRecord::capture).collect(),
            items: battle.items().iter().map(ItemRecord::capture).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Rebuild a battle from this save
    ///
    /// Every cross-reference must resolve; the first dangling id aborts
    /// the load so a corrupt save is rejected outright instead of half
    /// restored.
    pub fn restore(
        &self,
        terrain: TerrainLibrary,
        unit_catalog: &UnitCatalog,
        item_catalog: ItemCatalog,
        config: RulesConfig,
    ) -> Result<Battlescape> {
        let map = BattleMap::new(self.width, self.length, self.height);
        let mut battle = Battlescape::new(map, terrain, item_catalog, config, self.rng_seed);
        battle.turn = self.turn;
        battle.side = self.side;
        battle.mission_type = self.mission_type.clone();
        battle.global_shade = self.global_shade;
        battle.tu_reservation = self.tu_reservation;
        battle.objectives_needed = self.objectives_needed;
        battle.objectives_destroyed = self.objectives_destroyed;

        self.restore_tiles(&mut battle)?;
        self.restore_units(&mut battle, unit_catalog)?;
        self.restore_items(&mut battle)?;
        Ok(battle)
    }

    fn restore_tiles(&self, battle: &mut Battlescape) -> Result<()> {
        let terrain = battle.terrain.clone();
        for entry in &self.tiles {
            let record = unpack_tile(&entry.record)?;
            let index = entry.index as usize;
            if battle.map.tile_at(index).is_none() {
                return Err(BattlescapeError::TileIndexOutOfBounds {
                    index: entry.index,
                    width: self.width,
                    length: self.length,
                    height: self.height,
                });
            }
            for slot in PartSlot::all() {
                if let Some(part_ref) = record.parts[slot.index()] {
                    if !battle.terrain.contains(part_ref) {
                        return Err(BattlescapeError::UnknownTerrainPart {
                            part: part_ref.part,
                            set: part_ref.set,
                        });
                    }
                }
            }

            let Some(tile) = battle.map.tile_at_mut(index) else {
                continue;
            };
            for slot in PartSlot::all() {
                tile.set_part(slot, record.parts[slot.index()]);
            }
            tile.set_fire(record.fire);
            tile.set_smoke(record.smoke);
            for (bit, flag) in [
                DiscoveryFlag::West,
                DiscoveryFlag::North,
                DiscoveryFlag::Content,
            ]
            .iter()
            .enumerate()
            {
                if record.discovered[bit] {
                    tile.set_discovered(*flag);
                }
            }
            tile.force_door_open(DoorSide::West, record.doors_open[0]);
            tile.force_door_open(DoorSide::North, record.doors_open[1]);
            tile.recompute_obstacles(&terrain);
        }
        Ok(())
    }

    fn restore_units(&self, battle: &mut Battlescape, catalog: &UnitCatalog) -> Result<()> {
        let mut max_player_id = 0u32;
        let mut max_spawn_id = UnitId::PLAYER_CEILING - 1;

        for record in &self.units {
            let archetype = catalog.get(&record.archetype_id).ok_or_else(|| {
                BattlescapeError::UnknownArchetype(record.archetype_id.clone())
            })?;
            if battle.unit(record.id).is_some() {
                return Err(BattlescapeError::CorruptSave(format!(
                    "duplicate unit id {}",
                    record.id.0
                )));
            }

            let mut unit = BattleUnit::from_archetype(record.id, archetype, record.faction);
            unit.armor_id = record.armor_id.clone();
            unit.original_faction = record.original_faction;
            unit.status = record.status;
            unit.position = record.position;
            unit.last_position = record.position;
            unit.direction = record.direction;
            unit.turret_direction = record.turret_direction;
            unit.tu = record.tu.min(unit.max_stats.tu);
            unit.health = record.health.clamp(0, unit.max_stats.health);
            unit.stun = record.stun.max(0);
            unit.energy = record.energy.min(unit.max_stats.stamina);
            unit.morale = record.morale.clamp(0, 100);
            unit.kneeled = record.kneeled;
            unit.floating = record.floating;
            unit.set_armor_array(record.armor);
            unit.set_wounds_array(record.wounds);
            unit.fire = record.fire;
            unit.exp = record.exp;
            unit.turret_type = record.turret_type;
            unit.visible = record.visible;
            unit.turns_since_spotted = record.turns_since_spotted;
            unit.rank = record.rank;
            unit.kills = record.kills;
            unit.recolor = record.recolor.clone();
            unit.murderer = record.murderer;
            unit.mind_controller = record.mind_controller;

            if record.id.is_player_origin() {
                max_player_id = max_player_id.max(record.id.0);
            } else {
                max_spawn_id = max_spawn_id.max(record.id.0);
            }

            // relink the grid occupancy for units still on it
            if record.position.is_valid() && !unit.is_out() {
                for dy in 0..i32::from(unit.size) {
                    for dx in 0..i32::from(unit.size) {
                        let at = record.position + Position::new(dx, dy, 0);
                        let Some(tile) = battle.map.tile_mut(at) else {
                            return Err(BattlescapeError::CorruptSave(format!(
                                "unit {} stands outside the map",
                                record.id.0
                            )));
                        };
                        if tile.occupant().is_some() {
                            return Err(BattlescapeError::CorruptSave(format!(
                                "two units share tile ({}, {}, {})",
                                at.x, at.y, at.z
                            )));
                        }
                        tile.set_occupant(Some(record.id));
                    }
                }
            }

            battle.units.push(unit);
        }

        battle.next_player_id = max_player_id + 1;
        battle.next_spawn_id = max_spawn_id + 1;
        Ok(())
    }

    fn restore_items(&self, battle: &mut Battlescape) -> Result<()> {
        let mut max_item_id = 0u32;

        // first pass: ids must be unique and every reference must resolve
        for record in &self.items {
            if battle.item_rules.get(&record.rule_id).is_none() {
                return Err(BattlescapeError::UnknownItemRule(record.rule_id.clone()));
            }
            for unit_ref in [record.owner, record.previous_owner, record.body_of]
                .into_iter()
                .flatten()
            {
                if battle.unit(unit_ref).is_none() {
                    return Err(BattlescapeError::UnitNotFound(unit_ref));
                }
            }
            if let Some(ammo) = record.ammo {
                if !self.items.iter().any(|i| i.id == ammo) {
                    return Err(BattlescapeError::ItemNotFound(ammo));
                }
            }
            if let Some(position) = record.tile {
                if !battle.map.contains(position) {
                    return Err(BattlescapeError::CorruptSave(format!(
                        "item {} lies outside the map",
                        record.id.0
                    )));
                }
            }
        }

        for record in &self.items {
            let mut item = BattleItem::new(record.id, &record.rule_id);
            item.previous_owner = record.previous_owner;
            item.ammo = record.ammo;
            item.ammo_quantity = record.ammo_quantity;
            item.fuse = record.fuse;
            item.ammo_in_weapon = record.ammo_in_weapon;
            item.player_property = record.player_property;
            item.dropped_on_enemy_turn = record.dropped_on_enemy_turn;
            item.body_of = record.body_of;

            if let Some(owner) = record.owner {
                item.move_to_owner(owner, record.slot, record.slot_x, record.slot_y);
                item.previous_owner = record.previous_owner;
                if let Some(unit) = battle.unit_mut(owner) {
                    unit.inventory.push(record.id);
                }
            } else if let Some(position) = record.tile {
                item.move_to_tile(position);
                if let Some(tile) = battle.map.tile_mut(position) {
                    tile.add_item(record.id);
                }
            }

            max_item_id = max_item_id.max(record.id.0);
            battle.items.push(item);
        }

        battle.next_item_id = max_item_id + 1;
        Ok(())
    }
}
