//! Terrain subsystem errors.
//!
//! Per the error-handling design, most terrain failures (tile miss, point
//! query failure, no intersection) are not exceptions — they resolve to
//! `None`/"unknown" and are logged, matching the source material's "skip"
//! treatment of unknown cells. `TerrainError` covers genuinely fallible
//! construction and transport paths only.

use thiserror::Error;

use crate::tile::TileKey;

#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("tile directory not configured")]
    NoTileDirectory,
    #[error("tile io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("tile {0:?} has unexpected size {1} bytes")]
    BadTileSize(TileKey, usize),
    #[error("elevation query failed: {0}")]
    Query(String),
}

pub type Result<T> = std::result::Result<T, TerrainError>;
