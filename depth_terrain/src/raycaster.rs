//! Terrain ray-caster (§4.4): marches an ENU ray from the observer out to
//! the configured max distance, looks for the farthest significant
//! above-to-below-terrain transition, and refines it by bisection.

use std::sync::Mutex;

use depth_core::types::DemEstimate;

use crate::geo;
use crate::online::OnlineElevationClient;
use crate::tile::ElevationTileStore;

const EYE_HEIGHT_M: f64 = 2.0;
const UPWARD_PITCH_LIMIT_RAD: f64 = 0.5236; // ~30 degrees
const MIN_GPS_ACCURACY_M: f64 = 100.0;
const SIGNIFICANT_RISE_M: f64 = 30.0;
const RATE_LIMIT_HEADING_DEG: f64 = 1.0;
const RATE_LIMIT_PITCH_RAD: f64 = 0.0087; // ~0.5 degrees

#[derive(Debug, Clone, Copy)]
pub struct Observer {
    pub lat: f64,
    pub lon: f64,
    pub altitude_m: f64,
    pub pitch_rad: f64,
    pub heading_deg: f64,
    pub horizontal_accuracy_m: f64,
    pub vertical_accuracy_m: f64,
    pub heading_accuracy_deg: f64,
}

#[derive(Debug, Clone, Copy)]
struct LastQuery {
    heading_deg: f64,
    pitch_rad: f64,
    timestamp_s: f64,
    result: Option<DemEstimate>,
}

pub struct TerrainRayCaster {
    tiles: ElevationTileStore,
    online: OnlineElevationClient,
    ray_step_m: f64,
    max_ray_m: f64,
    bisection_iters: u32,
    rate_limit_s: f64,
    last: Mutex<Option<LastQuery>>,
}

impl TerrainRayCaster {
    pub fn new(tiles: ElevationTileStore, online: OnlineElevationClient, ray_step_m: f64, max_ray_m: f64, bisection_iters: u32, rate_limit_s: f64) -> Self {
        Self {
            tiles,
            online,
            ray_step_m,
            max_ray_m,
            bisection_iters,
            rate_limit_s,
            last: Mutex::new(None),
        }
    }

    /// Cast a ray from `observer` at `timestamp_s`. Pre-fetches the corridor
    /// via the online client, then marches using the local tile store;
    /// returns the rate-limited cached result when heading/pitch haven't
    /// moved enough and the interval hasn't elapsed.
    pub async fn cast(&self, observer: Observer, timestamp_s: f64) -> Option<DemEstimate> {
        if observer.pitch_rad > UPWARD_PITCH_LIMIT_RAD {
            return None;
        }
        if observer.horizontal_accuracy_m >= MIN_GPS_ACCURACY_M {
            return None;
        }

        if let Some(cached) = self.rate_limited_result(&observer, timestamp_s) {
            return cached;
        }

        let observer_terrain_m = self.elevation_at(observer.lat, observer.lon).await;
        let observer_base_terrain = observer_terrain_m.unwrap_or(observer.altitude_m);
        let observer_alt = if observer.altitude_m <= observer_base_terrain {
            observer_base_terrain + EYE_HEIGHT_M
        } else {
            observer.altitude_m
        };

        self.online
            .prefetch_corridor(observer.lat, observer.lon, observer.heading_deg, observer.pitch_rad, self.max_ray_m, self.ray_step_m)
            .await;

        let (d_east, d_north, d_up) = geo::enu_direction(observer.heading_deg, observer.pitch_rad);

        let mut samples: Vec<(f64, bool)> = Vec::new();
        let mut t = 0.0;
        while t <= self.max_ray_m {
            let (lat, lon) = geo::offset_latlon(observer.lat, observer.lon, d_east * t, d_north * t);
            if let Some(terrain_elev) = self.elevation_at(lat, lon).await {
                let ray_alt = observer_alt + d_up * t;
                samples.push((t, ray_alt > terrain_elev));
            }
            t += self.ray_step_m;
        }

        let chosen = self
            .choose_intersection(&samples, observer_base_terrain, observer, observer_alt, d_east, d_north, d_up)
            .await;

        let result = chosen.map(|(distance_m, terrain_elevation_m, hit_lat, hit_lon)| DemEstimate {
            distance_m,
            confidence_0_1: confidence(observer.horizontal_accuracy_m, observer.vertical_accuracy_m, observer.heading_accuracy_deg),
            terrain_elevation_m,
            heading_deg_true_north: observer.heading_deg,
            horizontal_gps_accuracy_m: observer.horizontal_accuracy_m,
            hit_lat,
            hit_lon,
        });

        if let Ok(mut last) = self.last.lock() {
            *last = Some(LastQuery {
                heading_deg: observer.heading_deg,
                pitch_rad: observer.pitch_rad,
                timestamp_s,
                result,
            });
        }

        result
    }

    fn rate_limited_result(&self, observer: &Observer, timestamp_s: f64) -> Option<Option<DemEstimate>> {
        let last = self.last.lock().ok()?;
        let last = (*last)?;
        let elapsed = timestamp_s - last.timestamp_s;
        if elapsed < self.rate_limit_s
            && geo::within_tolerance(observer.heading_deg, last.heading_deg, observer.pitch_rad, last.pitch_rad, RATE_LIMIT_HEADING_DEG, RATE_LIMIT_PITCH_RAD)
        {
            return Some(last.result);
        }
        None
    }

    async fn elevation_at(&self, lat: f64, lon: f64) -> Option<f64> {
        if let Some(elev) = self.tiles.elevation_at(lat, lon) {
            return Some(elev);
        }
        self.online.query_point(lon, lat).await.unwrap_or_else(|err| {
            tracing::debug!(%err, lat, lon, "terrain: online query failed, treating as unknown");
            None
        })
    }

    /// Walk the march samples for above→below transitions, preferring the
    /// farthest "significant" one (terrain rise over the observer's base
    /// terrain exceeds `SIGNIFICANT_RISE_M`), then refine by bisection.
    #[allow(clippy::too_many_arguments)]
    async fn choose_intersection(
        &self,
        samples: &[(f64, bool)],
        observer_base_terrain: f64,
        observer: Observer,
        observer_alt: f64,
        d_east: f64,
        d_north: f64,
        d_up: f64,
    ) -> Option<(f64, f64, f64, f64)> {
        let mut best_significant: Option<(f64, f64)> = None;
        let mut best_non_significant: Option<(f64, f64)> = None;

        for window in samples.windows(2) {
            let [(t0, above0), (t1, above1)] = window else { continue };
            if !*above0 || *above1 {
                continue;
            }
            let (lat, lon) = geo::offset_latlon(observer.lat, observer.lon, d_east * *t1, d_north * *t1);
            let Some(hit_elev) = self.elevation_at(lat, lon).await else { continue };
            let rise = hit_elev - observer_base_terrain;
            if rise > SIGNIFICANT_RISE_M {
                if best_significant.map(|(t, _)| *t1 > t).unwrap_or(true) {
                    best_significant = Some((*t1, *t0));
                }
            } else if best_non_significant.is_none() {
                best_non_significant = Some((*t1, *t0));
            }
        }

        let (t_below, t_above) = best_significant.or(best_non_significant)?;

        let mut lo = t_above;
        let mut hi = t_below;
        for _ in 0..self.bisection_iters {
            let mid = (lo + hi) / 2.0;
            let (lat, lon) = geo::offset_latlon(observer.lat, observer.lon, d_east * mid, d_north * mid);
            let Some(terrain_elev) = self.elevation_at(lat, lon).await else { break };
            let ray_alt = observer_alt + d_up * mid;
            if ray_alt > terrain_elev {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let distance_m = (lo + hi) / 2.0;
        let (hit_lat, hit_lon) = geo::offset_latlon(observer.lat, observer.lon, d_east * distance_m, d_north * distance_m);
        let hit_elev = self.elevation_at(hit_lat, hit_lon).await.unwrap_or(observer_base_terrain);
        Some((distance_m, hit_elev, hit_lat, hit_lon))
    }
}

fn confidence(horizontal_accuracy_m: f64, vertical_accuracy_m: f64, heading_accuracy_deg: f64) -> f64 {
    let h = if horizontal_accuracy_m < 5.0 {
        1.0
    } else if horizontal_accuracy_m < 20.0 {
        0.6
    } else {
        0.2
    };
    let v = if vertical_accuracy_m < 10.0 {
        1.0
    } else if vertical_accuracy_m < 30.0 {
        0.5
    } else {
        0.15
    };
    let hd = if heading_accuracy_deg < 3.0 {
        1.0
    } else if heading_accuracy_deg < 10.0 {
        0.55
    } else {
        0.15
    };
    (h * v * hd).clamp(0.1, 1.0)
}
