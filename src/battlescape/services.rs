//! Services the core consumes but does not implement
//!
//! Line-of-fire, field-of-view and AI decision-making live outside this
//! crate; the turn controller talks to them through these traits. The
//! default impls here are enough for headless simulation and tests.

use crate::battlescape::map::BattleMap;
use crate::battlescape::state::Battlescape;
use crate::battlescape::terrain::{PartSlot, TerrainLibrary};
use crate::battlescape::tile::DoorSide;
use crate::combat::damage_type::DamageType;
use crate::core::types::{Position, UnitId};

/// Edge and placement blocking queries used by hazard spread and
/// placement legality checks
pub trait HazardBlocking {
    /// Whether the shared edge between two horizontally adjacent tiles
    /// stops the given damage class
    fn is_edge_blocked(
        &self,
        map: &BattleMap,
        terrain: &TerrainLibrary,
        from: Position,
        to: Position,
        damage_type: DamageType,
    ) -> bool;

    /// Whether a unit footprint with its origin at `position` cannot be
    /// placed there
    fn is_blocked(&self, map: &BattleMap, terrain: &TerrainLibrary, position: Position, size: u8) -> bool;
}

/// No walls anywhere: only map bounds and occupants constrain
pub struct OpenField;

impl HazardBlocking for OpenField {
    fn is_edge_blocked(
        &self,
        map: &BattleMap,
        _terrain: &TerrainLibrary,
        _from: Position,
        to: Position,
        _damage_type: DamageType,
    ) -> bool {
        !map.contains(to)
    }

    fn is_blocked(
        &self,
        map: &BattleMap,
        _terrain: &TerrainLibrary,
        position: Position,
        size: u8,
    ) -> bool {
        for dy in 0..i32::from(size) {
            for dx in 0..i32::from(size) {
                let at = position + Position::new(dx, dy, 0);
                match map.tile(at) {
                    Some(tile) => {
                        if tile.occupant().is_some() {
                            return true;
                        }
                    }
                    None => return true,
                }
            }
        }
        false
    }
}

/// Blocking that consults the wall parts on the shared edge
///
/// An open door lets hazards through; a big-wall object on either tile
/// blocks crossing outright.
pub struct WallBlocking;

impl WallBlocking {
    fn wall_blocks(
        map: &BattleMap,
        terrain: &TerrainLibrary,
        at: Position,
        slot: PartSlot,
        door: DoorSide,
        smoke: bool,
    ) -> bool {
        let Some(tile) = map.tile(at) else {
            return true;
        };
        if tile.is_door_open(door) {
            return false;
        }
        let Some(part_ref) = tile.part(slot) else {
            return false;
        };
        terrain
            .get(part_ref)
            .map(|p| p.blocks(smoke))
            .unwrap_or(false)
    }

    fn big_wall(map: &BattleMap, terrain: &TerrainLibrary, at: Position) -> bool {
        map.tile(at)
            .and_then(|t| t.part(PartSlot::Object))
            .and_then(|p| terrain.get(p))
            .map(|p| p.big_wall)
            .unwrap_or(false)
    }
}

impl HazardBlocking for WallBlocking {
    fn is_edge_blocked(
        &self,
        map: &BattleMap,
        terrain: &TerrainLibrary,
        from: Position,
        to: Position,
        damage_type: DamageType,
    ) -> bool {
        if !map.contains(to) {
            return true;
        }
        let smoke = damage_type == DamageType::Smoke;
        let delta = to - from;

        let wall = match (delta.x, delta.y) {
            (0, -1) => Self::wall_blocks(map, terrain, from, PartSlot::NorthWall, DoorSide::North, smoke),
            (0, 1) => Self::wall_blocks(map, terrain, to, PartSlot::NorthWall, DoorSide::North, smoke),
            (-1, 0) => Self::wall_blocks(map, terrain, from, PartSlot::WestWall, DoorSide::West, smoke),
            (1, 0) => Self::wall_blocks(map, terrain, to, PartSlot::WestWall, DoorSide::West, smoke),
            _ => return true, // not a cardinal edge
        };

        wall || Self::big_wall(map, terrain, to)
    }

    fn is_blocked(
        &self,
        map: &BattleMap,
        terrain: &TerrainLibrary,
        position: Position,
        size: u8,
    ) -> bool {
        for dy in 0..i32::from(size) {
            for dx in 0..i32::from(size) {
                let at = position + Position::new(dx, dy, 0);
                match map.tile(at) {
                    Some(tile) => {
                        if tile.occupant().is_some() {
                            return true;
                        }
                    }
                    None => return true,
                }
                if Self::big_wall(map, terrain, at) {
                    return true;
                }
            }
        }
        false
    }
}

/// Field-of-view and lighting recomputation hooks
pub trait Visibility {
    /// Recompute sight for every unit
    fn recalculate_fov(&mut self, battle: &mut Battlescape);

    /// Recompute sight for one unit
    fn calculate_fov(&mut self, battle: &mut Battlescape, unit: UnitId);

    fn calculate_terrain_lighting(&mut self, battle: &mut Battlescape);

    fn calculate_unit_lighting(&mut self, battle: &mut Battlescape);
}

/// Headless stand-in: sees nothing, lights nothing
pub struct NoVisibility;

impl Visibility for NoVisibility {
    fn recalculate_fov(&mut self, _battle: &mut Battlescape) {}
    fn calculate_fov(&mut self, _battle: &mut Battlescape, _unit: UnitId) {}
    fn calculate_terrain_lighting(&mut self, _battle: &mut Battlescape) {}
    fn calculate_unit_lighting(&mut self, _battle: &mut Battlescape) {}
}

/// Pluggable decision-making for non-player units
///
/// The strategy mutates the battle through the same public paths player
/// actions use; the controller only decides who gets to think.
pub trait AiStrategy {
    fn act(&mut self, battle: &mut Battlescape, unit: UnitId);
}

/// Does nothing every turn
pub struct IdleStrategy;

impl AiStrategy for IdleStrategy {
    fn act(&mut self, _battle: &mut Battlescape, _unit: UnitId) {}
}

/// The full set of services a battle needs from its host
pub struct ServiceRegistry {
    pub blocking: Box<dyn HazardBlocking>,
    pub visibility: Box<dyn Visibility>,
    pub ai: Box<dyn AiStrategy>,
}

impl ServiceRegistry {
    /// Wall-aware blocking, no FOV, idle AI: the headless default
    pub fn headless() -> Self {
        Self {
            blocking: Box::new(WallBlocking),
            visibility: Box::new(NoVisibility),
            ai: Box::new(IdleStrategy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battlescape::terrain::{PartRef, TerrainPart, TerrainSet};

    fn walled_map() -> (BattleMap, TerrainLibrary) {
        let mut set = TerrainSet::new("interior");
        set.push(TerrainPart::named("wall").wall()); // 0
        let mut door = TerrainPart::named("door").wall();
        door.door = true;
        set.push(door); // 1
        let mut lib = TerrainLibrary::new();
        lib.push_set(set);
        (BattleMap::new(4, 4, 1), lib)
    }

    #[test]
    fn test_open_field_blocks_only_bounds() {
        let (map, lib) = walled_map();
        let blocking = OpenField;
        assert!(!blocking.is_edge_blocked(
            &map,
            &lib,
            Position::new(1, 1, 0),
            Position::new(1, 0, 0),
            DamageType::Incendiary
        ));
        assert!(blocking.is_edge_blocked(
            &map,
            &lib,
            Position::new(0, 0, 0),
            Position::new(0, -1, 0),
            DamageType::Incendiary
        ));
    }

    #[test]
    fn test_north_wall_blocks_both_ways() {
        let (mut map, lib) = walled_map();
        map.tile_mut(Position::new(1, 1, 0))
            .unwrap()
            .set_part(PartSlot::NorthWall, Some(PartRef { part: 0, set: 0 }));
        let blocking = WallBlocking;

        // from the south tile heading north
        assert!(blocking.is_edge_blocked(
            &map,
            &lib,
            Position::new(1, 1, 0),
            Position::new(1, 0, 0),
            DamageType::Incendiary
        ));
        // from the north tile heading south across the same edge
        assert!(blocking.is_edge_blocked(
            &map,
            &lib,
            Position::new(1, 0, 0),
            Position::new(1, 1, 0),
            DamageType::Incendiary
        ));
        // unrelated edge stays open
        assert!(!blocking.is_edge_blocked(
            &map,
            &lib,
            Position::new(1, 1, 0),
            Position::new(2, 1, 0),
            DamageType::Incendiary
        ));
    }

    #[test]
    fn test_open_door_lets_hazards_through() {
        let (mut map, lib) = walled_map();
        let tile = map.tile_mut(Position::new(1, 1, 0)).unwrap();
        tile.set_part(PartSlot::NorthWall, Some(PartRef { part: 1, set: 0 }));
        let blocking = WallBlocking;

        assert!(blocking.is_edge_blocked(
            &map,
            &lib,
            Position::new(1, 1, 0),
            Position::new(1, 0, 0),
            DamageType::Smoke
        ));

        map.tile_mut(Position::new(1, 1, 0))
            .unwrap()
            .open_door(DoorSide::North, &lib);
        assert!(!blocking.is_edge_blocked(
            &map,
            &lib,
            Position::new(1, 1, 0),
            Position::new(1, 0, 0),
            DamageType::Smoke
        ));
    }

    #[test]
    fn test_placement_blocked_by_occupant_and_bounds() {
        let (mut map, lib) = walled_map();
        let blocking = WallBlocking;
        assert!(!blocking.is_blocked(&map, &lib, Position::new(1, 1, 0), 1));

        map.tile_mut(Position::new(1, 1, 0))
            .unwrap()
            .set_occupant(Some(crate::core::types::UnitId(7)));
        assert!(blocking.is_blocked(&map, &lib, Position::new(1, 1, 0), 1));
        // 2x2 footprint at the corner runs off the map
        assert!(blocking.is_blocked(&map, &lib, Position::new(3, 3, 0), 2));
    }
}
