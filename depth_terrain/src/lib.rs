#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Terrain elevation ray-casting (§4.4/§4.5).
//!
//! The only crate in the workspace that touches the filesystem or the
//! network: a bounded LRU of local 1-arc-second elevation tiles
//! (`tile::ElevationTileStore`), an online point-query fallback with
//! bounded-concurrency corridor pre-fetch (`online::OnlineElevationClient`),
//! and the ray-caster that combines them (`raycaster::TerrainRayCaster`).
//! Everything here is async; `depth_core` stays synchronous and knows
//! nothing about tiles, HTTP, or tokio.

pub mod error;
pub mod geo;
pub mod online;
pub mod raycaster;
pub mod tile;

pub use error::{Result, TerrainError};
pub use online::OnlineElevationClient;
pub use raycaster::{Observer, TerrainRayCaster};
pub use tile::{ElevationTileStore, Tile, TileKey};
