//! duskfield - turn-based tactical battlescape simulation core

pub mod battlescape;
pub mod combat;
pub mod core;
