use thiserror::Error;

use crate::core::types::{ItemId, UnitId};

#[derive(Error, Debug)]
pub enum BattlescapeError {
    #[error("Unit not found: {0:?}")]
    UnitNotFound(UnitId),

    #[error("Item not found: {0:?}")]
    ItemNotFound(ItemId),

    #[error("Unknown unit archetype: {0}")]
    UnknownArchetype(String),

    #[error("Unknown item rule: {0}")]
    UnknownItemRule(String),

    #[error("Unknown terrain part {part} in set {set}")]
    UnknownTerrainPart { part: u16, set: u8 },

    #[error("Tile index {index} outside a {width}x{length}x{height} map")]
    TileIndexOutOfBounds {
        index: u32,
        width: u32,
        length: u32,
        height: u32,
    },

    #[error("Tile record is {got} bytes, expected {expected}")]
    MalformedTileRecord { got: usize, expected: usize },

    #[error("Save document is not usable: {0}")]
    CorruptSave(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, BattlescapeError>;
