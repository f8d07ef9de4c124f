//! Online elevation point-query fallback with a rounded-coordinate cache and
//! bounded-concurrency corridor pre-fetch (§4.5).
//!
//! Grounded on the pack's `reqwest` JSON client usage, with the concurrency
//! cap drawn from a `tokio::sync::Semaphore` the way the teacher's own
//! bounded-resource primitives are shaped, applied here to network fan-out
//! instead of a hardware bus.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};

use crate::error::{Result, TerrainError};
use crate::geo;

/// Coordinates rounded to roughly 100 m, used as the point-query cache key.
/// At the equator 0.001 degrees of latitude is ~111 m; longitude rounding
/// uses the same fixed step since the cache only needs "close enough to
/// reuse", not a precise area.
const ROUND_STEP_DEG: f64 = 0.001;

fn round_key(lat: f64, lon: f64) -> (i64, i64) {
    (
        (lat / ROUND_STEP_DEG).round() as i64,
        (lon / ROUND_STEP_DEG).round() as i64,
    )
}

#[derive(serde::Deserialize)]
struct PointQueryResponse {
    elevation_m: Option<f64>,
}

pub struct OnlineElevationClient {
    http: reqwest::Client,
    base_url: String,
    cache: Mutex<HashMap<(i64, i64), Option<f64>>>,
    fetch_semaphore: Arc<Semaphore>,
}

impl OnlineElevationClient {
    pub fn new(base_url: impl Into<String>, max_concurrent_fetches: usize) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            cache: Mutex::new(HashMap::new()),
            fetch_semaphore: Arc::new(Semaphore::new(max_concurrent_fetches.max(1))),
        }
    }

    /// Query one (lon, lat), consulting the rounded-coordinate cache first.
    /// Network failures are surfaced as `TerrainError::Query`; the caller
    /// (the ray-caster) treats that as "unknown" and skips the sample.
    pub async fn query_point(&self, lon: f64, lat: f64) -> Result<Option<f64>> {
        let key = round_key(lat, lon);
        if let Some(cached) = self.cache.lock().await.get(&key) {
            return Ok(*cached);
        }

        let _permit = self
            .fetch_semaphore
            .acquire()
            .await
            .map_err(|e| TerrainError::Query(e.to_string()))?;

        let url = format!("{}/elevation?lat={lat}&lon={lon}", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| TerrainError::Query(e.to_string()))?
            .json::<PointQueryResponse>()
            .await
            .map_err(|e| TerrainError::Query(e.to_string()))?;

        self.cache.lock().await.insert(key, response.elevation_m);
        Ok(response.elevation_m)
    }

    /// Enumerate the distinct rounded coordinate keys a ray would sample and
    /// issue bounded-concurrency queries for each, warming the cache before
    /// the ray-caster's own march runs.
    pub async fn prefetch_corridor(&self, origin_lat: f64, origin_lon: f64, heading_deg: f64, pitch_rad: f64, max_distance_m: f64, step_m: f64) {
        let (d_east, d_north, _) = geo::enu_direction(heading_deg, pitch_rad);

        let mut seen = std::collections::HashSet::new();
        let mut points = Vec::new();
        let mut t = 0.0;
        while t <= max_distance_m {
            let (lat, lon) = geo::offset_latlon(origin_lat, origin_lon, d_east * t, d_north * t);
            let key = round_key(lat, lon);
            if seen.insert(key) {
                points.push((lat, lon));
            }
            t += step_m;
        }

        // `query_point`'s own semaphore bounds how many of these actually
        // hit the network at once; polling them all concurrently lets
        // already-cached keys resolve immediately instead of queueing
        // behind in-flight fetches.
        let fetches = points.into_iter().map(|(lat, lon)| async move {
            if let Err(err) = self.query_point(lon, lat).await {
                tracing::debug!(%err, lat, lon, "terrain: prefetch point failed, will be treated as unknown");
            }
        });
        futures::future::join_all(fetches).await;
    }
}
