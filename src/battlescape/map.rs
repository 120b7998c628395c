//! The battlefield grid: a fixed flat 3D array of tiles
//!
//! Allocated once per mission and mutated in place; out-of-bounds
//! queries return None rather than panicking.

use serde::{Deserialize, Serialize};

use crate::battlescape::tile::Tile;
use crate::core::types::{Direction, Position};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleMap {
    width: u32,
    length: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl BattleMap {
    pub fn new(width: u32, length: u32, height: u32) -> Self {
        let mut tiles = Vec::with_capacity((width * length * height) as usize);
        for z in 0..height {
            for y in 0..length {
                for x in 0..width {
                    tiles.push(Tile::new(Position::new(x as i32, y as i32, z as i32)));
                }
            }
        }
        Self {
            width,
            length,
            height,
            tiles,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn contains(&self, position: Position) -> bool {
        position.x >= 0
            && position.y >= 0
            && position.z >= 0
            && (position.x as u32) < self.width
            && (position.y as u32) < self.length
            && (position.z as u32) < self.height
    }

    /// Flat index of a position: `z*length*width + y*width + x`
    pub fn index_of(&self, position: Position) -> Option<usize> {
        if !self.contains(position) {
            return None;
        }
        Some(
            (position.z as u32 * self.length * self.width
                + position.y as u32 * self.width
                + position.x as u32) as usize,
        )
    }

    pub fn position_of(&self, index: usize) -> Option<Position> {
        if index >= self.tiles.len() {
            return None;
        }
        let index = index as u32;
        let per_level = self.length * self.width;
        let z = index / per_level;
        let y = (index % per_level) / self.width;
        let x = index % self.width;
        Some(Position::new(x as i32, y as i32, z as i32))
    }

    pub fn tile(&self, position: Position) -> Option<&Tile> {
        self.index_of(position).map(|i| &self.tiles[i])
    }

    pub fn tile_mut(&mut self, position: Position) -> Option<&mut Tile> {
        self.index_of(position).map(move |i| &mut self.tiles[i])
    }

    pub fn tile_at(&self, index: usize) -> Option<&Tile> {
        self.tiles.get(index)
    }

    pub fn tile_at_mut(&mut self, index: usize) -> Option<&mut Tile> {
        self.tiles.get_mut(index)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    pub fn tiles_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tiles.iter_mut()
    }

    /// Cardinal neighbor positions of a tile, in spread order
    pub fn cardinal_neighbors(&self, position: Position) -> Vec<Position> {
        Direction::cardinals()
            .iter()
            .map(|d| position + d.offset())
            .filter(|p| self.contains(*p))
            .collect()
    }

    pub fn above(&self, position: Position) -> Option<&Tile> {
        self.tile(position + Position::new(0, 0, 1))
    }

    pub fn below(&self, position: Position) -> Option<&Tile> {
        self.tile(position - Position::new(0, 0, 1))
    }

    /// Snapshot of burning tile indices, taken before any mutation
    pub fn burning_tiles(&self) -> Vec<usize> {
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.fire() > 0)
            .map(|(i, _)| i)
            .collect()
    }

    /// Snapshot of smoking tile indices, taken before any mutation
    pub fn smoking_tiles(&self) -> Vec<usize> {
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.smoke() > 0)
            .map(|(i, _)| i)
            .collect()
    }

    /// Where something dropped at `position` comes to rest: the first
    /// tile at or below it with a floor, or ground level
    pub fn drop_point(&self, position: Position) -> Position {
        let mut at = position;
        loop {
            if at.z == 0 {
                return at;
            }
            match self.tile(at) {
                Some(tile) if tile.has_no_floor() => {
                    at = at - Position::new(0, 0, 1);
                }
                _ => return at,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battlescape::terrain::{PartRef, PartSlot, TerrainLibrary, TerrainPart, TerrainSet};

    fn floor_ref() -> (TerrainLibrary, PartRef) {
        let mut set = TerrainSet::new("base");
        let id = set.push(TerrainPart::named("floor"));
        let mut lib = TerrainLibrary::new();
        let set_id = lib.push_set(set);
        (lib, PartRef { part: id, set: set_id })
    }

    #[test]
    fn test_flat_index_layout() {
        let map = BattleMap::new(10, 8, 2);
        assert_eq!(map.index_of(Position::new(0, 0, 0)), Some(0));
        assert_eq!(map.index_of(Position::new(3, 2, 1)), Some(80 + 23));
        // round trip
        for idx in [0usize, 7, 79, 80, 159] {
            let pos = map.position_of(idx).unwrap();
            assert_eq!(map.index_of(pos), Some(idx));
        }
    }

    #[test]
    fn test_out_of_bounds_yields_none() {
        let map = BattleMap::new(4, 4, 1);
        assert!(map.tile(Position::new(-1, 0, 0)).is_none());
        assert!(map.tile(Position::new(4, 0, 0)).is_none());
        assert!(map.tile(Position::new(0, 0, 1)).is_none());
        assert!(map.position_of(16).is_none());
    }

    #[test]
    fn test_tiles_know_their_position() {
        let map = BattleMap::new(3, 3, 2);
        for idx in 0..map.tile_count() {
            let tile = map.tile_at(idx).unwrap();
            assert_eq!(map.index_of(tile.position()), Some(idx));
        }
    }

    #[test]
    fn test_cardinal_neighbors_clip_at_edges() {
        let map = BattleMap::new(3, 3, 1);
        assert_eq!(map.cardinal_neighbors(Position::new(1, 1, 0)).len(), 4);
        assert_eq!(map.cardinal_neighbors(Position::new(0, 0, 0)).len(), 2);
    }

    #[test]
    fn test_hazard_snapshots() {
        let mut map = BattleMap::new(3, 3, 1);
        map.tile_mut(Position::new(1, 1, 0)).unwrap().set_fire(3);
        map.tile_mut(Position::new(2, 2, 0)).unwrap().set_smoke(5);

        assert_eq!(map.burning_tiles(), vec![4]);
        assert_eq!(map.smoking_tiles(), vec![8]);
    }

    #[test]
    fn test_drop_point_falls_through_missing_floors() {
        let (lib, floor) = floor_ref();
        let _ = lib;
        let mut map = BattleMap::new(2, 2, 3);
        // only ground floor has an actual floor part
        map.tile_mut(Position::new(0, 0, 0))
            .unwrap()
            .set_part(PartSlot::Floor, Some(floor));

        assert_eq!(
            map.drop_point(Position::new(0, 0, 2)),
            Position::new(0, 0, 0)
        );
    }

    #[test]
    fn test_drop_point_rests_on_floor() {
        let (lib, floor) = floor_ref();
        let _ = lib;
        let mut map = BattleMap::new(2, 2, 3);
        map.tile_mut(Position::new(0, 0, 1))
            .unwrap()
            .set_part(PartSlot::Floor, Some(floor));

        assert_eq!(
            map.drop_point(Position::new(0, 0, 2)),
            Position::new(0, 0, 1)
        );
    }
}
