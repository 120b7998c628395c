//! Battlescape simulation core
//!
//! Owns the 3D tile grid, the per-unit combat state, the fire/smoke
//! hazard engine and the faction turn machine. Pathfinding, sight and
//! AI decisions are consumed as services (see `services`).

pub mod constants;
pub mod hazard;
pub mod item;
pub mod map;
pub mod save;
pub mod services;
pub mod state;
pub mod terrain;
pub mod tile;
pub mod unit;

// Re-exports for convenient access
pub use hazard::{run_hazard_pass, HazardReport};
pub use item::{BattleItem, InventorySlot, ItemCatalog, ItemClass, ItemRule};
pub use map::BattleMap;
pub use save::{pack_tile, unpack_tile, BattleSave, ItemRecord, TileRecord, UnitRecord};
pub use services::{
    AiStrategy, HazardBlocking, IdleStrategy, NoVisibility, OpenField, ServiceRegistry,
    Visibility, WallBlocking,
};
pub use state::{Battlescape, TuReservation, TurnEvent, TurnSummary};
pub use terrain::{PartRef, PartSlot, TerrainLibrary, TerrainPart, TerrainSet};
pub use tile::{DiscoveryFlag, DoorSide, LightLayer, Tile};
pub use unit::{
    BattleUnit, Experience, Faction, StatGrowth, UnitArchetype, UnitCatalog, UnitStats,
    UnitStatus,
};
