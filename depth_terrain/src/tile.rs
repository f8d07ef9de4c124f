//! Bounded-capacity LRU over 1°x1° elevation tiles (§4.5).
//!
//! Each tile is a 3601x3601 grid of big-endian 16-bit signed elevation
//! samples (the standard 1-arc-second SRTM layout); -32768 marks a void
//! sample. Tiles are loaded from a filesystem directory on first access and
//! held in an `lru::LruCache`, grounded on the pack's `LruCache`-backed
//! render cache in `vkanta-glsp-mcp`'s graphics renderer.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use lru::LruCache;

use crate::error::{Result, TerrainError};

pub const TILE_SIDE: usize = 3601;
const VOID: i16 = -32768;

/// Key for a 1x1 degree tile: the floor of (lat, lon).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub lat_floor: i32,
    pub lon_floor: i32,
}

impl TileKey {
    pub fn for_coord(lat: f64, lon: f64) -> Self {
        Self {
            lat_floor: lat.floor() as i32,
            lon_floor: lon.floor() as i32,
        }
    }

    /// SRTM-style file stem, e.g. `N37W119`.
    pub fn file_stem(&self) -> String {
        let ns = if self.lat_floor >= 0 { 'N' } else { 'S' };
        let ew = if self.lon_floor >= 0 { 'E' } else { 'W' };
        format!("{ns}{:02}{ew}{:03}", self.lat_floor.abs(), self.lon_floor.abs())
    }
}

#[derive(Debug, Clone)]
pub struct Tile {
    key: TileKey,
    samples: Vec<i16>,
}

impl Tile {
    fn from_be_bytes(key: TileKey, bytes: &[u8]) -> Result<Self> {
        let expected = TILE_SIDE * TILE_SIDE * 2;
        if bytes.len() != expected {
            return Err(TerrainError::BadTileSize(key, bytes.len()));
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|c| i16::from_be_bytes([c[0], c[1]]))
            .collect();
        Ok(Self { key, samples })
    }

    fn get(&self, row: usize, col: usize) -> Option<i16> {
        if row >= TILE_SIDE || col >= TILE_SIDE {
            return None;
        }
        self.samples.get(row * TILE_SIDE + col).copied()
    }

    /// Bilinear sample at (lat, lon) within this tile's degree square. Row 0
    /// is the north edge; any void corner makes the whole sample void.
    pub fn sample(&self, lat: f64, lon: f64) -> Option<f64> {
        let frac_lon = (lon - self.key.lon_floor as f64).clamp(0.0, 1.0);
        let frac_lat = (lat - self.key.lat_floor as f64).clamp(0.0, 1.0);

        let col_f = frac_lon * (TILE_SIDE - 1) as f64;
        let row_f = (1.0 - frac_lat) * (TILE_SIDE - 1) as f64;

        let col0 = col_f.floor() as usize;
        let row0 = row_f.floor() as usize;
        let col1 = (col0 + 1).min(TILE_SIDE - 1);
        let row1 = (row0 + 1).min(TILE_SIDE - 1);

        let tx = col_f - col0 as f64;
        let ty = row_f - row0 as f64;

        let (v00, v01, v10, v11) = (
            self.get(row0, col0)?,
            self.get(row0, col1)?,
            self.get(row1, col0)?,
            self.get(row1, col1)?,
        );
        if [v00, v01, v10, v11].contains(&VOID) {
            return None;
        }

        let top = v00 as f64 * (1.0 - tx) + v01 as f64 * tx;
        let bottom = v10 as f64 * (1.0 - tx) + v11 as f64 * tx;
        Some(top * (1.0 - ty) + bottom * ty)
    }
}

/// A bounded LRU of loaded tiles backed by a filesystem directory. Eviction
/// drops the least-recently-accessed tile; lookups that miss attempt a local
/// load before reporting not-found to the caller.
pub struct ElevationTileStore {
    directory: Option<PathBuf>,
    cache: Mutex<LruCache<TileKey, Tile>>,
}

impl ElevationTileStore {
    pub fn new(directory: Option<PathBuf>, capacity: usize) -> Self {
        let capacity = std::num::NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to >= 1 above");
        Self {
            directory,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up the elevation at (lat, lon): LRU hit, then local filesystem
    /// load, then `None` if neither has the tile.
    pub fn elevation_at(&self, lat: f64, lon: f64) -> Option<f64> {
        let key = TileKey::for_coord(lat, lon);

        if let Ok(mut cache) = self.cache.lock() {
            if let Some(tile) = cache.get(&key) {
                return tile.sample(lat, lon);
            }
        }

        let tile = self.load_from_disk(key)?;
        let sample = tile.sample(lat, lon);
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, tile);
        }
        sample
    }

    fn load_from_disk(&self, key: TileKey) -> Option<Tile> {
        let directory = self.directory.as_ref()?;
        let path = tile_path(directory, key);
        let bytes = std::fs::read(&path).ok()?;
        match Tile::from_be_bytes(key, &bytes) {
            Ok(tile) => Some(tile),
            Err(err) => {
                tracing::warn!(?key, ?path, %err, "terrain: tile load rejected");
                None
            }
        }
    }
}

fn tile_path(directory: &Path, key: TileKey) -> PathBuf {
    directory.join(format!("{}.hgt", key.file_stem()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_tile(key: TileKey, elevation: i16) -> Tile {
        Tile {
            key,
            samples: vec![elevation; TILE_SIDE * TILE_SIDE],
        }
    }

    #[test]
    fn file_stem_formats_quadrants() {
        assert_eq!(TileKey { lat_floor: 37, lon_floor: -119 }.file_stem(), "N37W119");
        assert_eq!(TileKey { lat_floor: -5, lon_floor: 20 }.file_stem(), "S05E020");
    }

    #[test]
    fn flat_tile_samples_uniformly() {
        let key = TileKey { lat_floor: 37, lon_floor: -119 };
        let tile = flat_tile(key, 1200);
        let sample = tile.sample(37.5, -118.5).unwrap();
        assert!((sample - 1200.0).abs() < 1e-6);
    }

    #[test]
    fn void_corner_propagates_as_none() {
        let key = TileKey { lat_floor: 0, lon_floor: 0 };
        let mut tile = flat_tile(key, 500);
        tile.samples[0] = VOID;
        assert!(tile.sample(0.0001, 0.0001).is_none());
        assert!(tile.sample(0.9, 0.9).is_some());
    }

    #[test]
    fn rejects_wrong_byte_length() {
        let key = TileKey { lat_floor: 0, lon_floor: 0 };
        let err = Tile::from_be_bytes(key, &[0u8; 10]).unwrap_err();
        assert!(matches!(err, TerrainError::BadTileSize(_, 10)));
    }

    #[test]
    fn store_without_directory_returns_none() {
        let store = ElevationTileStore::new(None, 4);
        assert_eq!(store.elevation_at(37.5, -118.5), None);
    }

    #[test]
    fn store_loads_and_caches_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let key = TileKey { lat_floor: 10, lon_floor: 10 };
        let bytes: Vec<u8> = vec![0u16.to_be_bytes(); TILE_SIDE * TILE_SIDE]
            .into_iter()
            .flat_map(|b| b.into_iter())
            .collect();
        std::fs::write(dir.path().join(format!("{}.hgt", key.file_stem())), &bytes).unwrap();

        let store = ElevationTileStore::new(Some(dir.path().to_path_buf()), 4);
        let sample = store.elevation_at(10.5, 10.5);
        assert_eq!(sample, Some(0.0));
        let sample2 = store.elevation_at(10.6, 10.6);
        assert_eq!(sample2, Some(0.0));
    }
}
