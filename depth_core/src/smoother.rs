//! Motion-aware exponential smoother with discontinuity snap (§4.7).

use crate::config::SmootherCfg;
use crate::types::{MotionState, SmootherState};

#[derive(Debug, Clone)]
pub struct MotionSmoother {
    cfg: SmootherCfg,
    state: SmootherState,
}

impl MotionSmoother {
    pub fn new(cfg: SmootherCfg) -> Self {
        let ring_capacity = cfg.discontinuity_ring_len;
        Self {
            cfg,
            state: SmootherState::new(ring_capacity),
        }
    }

    pub fn state(&self) -> &SmootherState {
        &self.state
    }

    fn alpha_for(&self, motion_state: MotionState, distance_m: f64) -> f64 {
        match motion_state {
            MotionState::Panning => self.cfg.alpha_panning,
            MotionState::Tracking => 0.3,
            MotionState::Stationary => {
                // Heavier smoothing (smaller alpha) at longer range, bounded
                // below by alpha_floor so convergence time stays finite.
                let decayed = 0.4 / (1.0 + distance_m / 50.0);
                decayed.max(self.cfg.alpha_floor)
            }
        }
    }

    /// Threshold fraction for the current distance, taken from the
    /// tabulated (distance, fraction) schedule by stepping to the last
    /// breakpoint not exceeding `distance_m`.
    fn discontinuity_fraction(&self, distance_m: f64) -> f64 {
        let mut fraction = self
            .cfg
            .discontinuity_thresholds
            .first()
            .map(|(_, f)| *f)
            .unwrap_or(0.30);
        for (d, f) in &self.cfg.discontinuity_thresholds {
            if distance_m >= *d {
                fraction = *f;
            }
        }
        fraction
    }

    /// Apply one raw depth measurement, returning the smoothed depth.
    pub fn update(&mut self, raw_depth_m: f64, motion_state: MotionState, now: f64) -> f64 {
        let _ = now;
        if !raw_depth_m.is_finite() {
            return self.state.smoothed_depth_m;
        }

        if !self.state.is_initialized {
            self.state.is_initialized = true;
            self.state.smoothed_depth_m = raw_depth_m;
            self.state.smoothed_confidence_0_1 = 1.0;
            self.push_ring(raw_depth_m);
            return raw_depth_m;
        }

        self.push_ring(raw_depth_m);

        if self.discontinuity_detected(raw_depth_m) {
            tracing::debug!(raw_depth_m, "smoother: discontinuity snap");
            self.state.smoothed_depth_m = raw_depth_m;
            return self.state.smoothed_depth_m;
        }

        let alpha = self.alpha_for(motion_state, self.state.smoothed_depth_m);
        self.state.smoothed_depth_m =
            (1.0 - alpha) * self.state.smoothed_depth_m + alpha * raw_depth_m;
        self.state.smoothed_depth_m
    }

    fn push_ring(&mut self, raw_depth_m: f64) {
        if self.state.discontinuity_ring.len() == self.cfg.discontinuity_ring_len {
            self.state.discontinuity_ring.pop_front();
        }
        self.state.discontinuity_ring.push_back(raw_depth_m);
    }

    /// True when the last K raw depths are all on the same side of the
    /// smoothed value by more than the distance-scaled threshold, and are
    /// tightly clustered among themselves.
    fn discontinuity_detected(&self, latest: f64) -> bool {
        let ring = &self.state.discontinuity_ring;
        if ring.len() < self.cfg.discontinuity_ring_len {
            return false;
        }
        let smoothed = self.state.smoothed_depth_m;
        if smoothed <= 0.0 {
            return false;
        }
        let threshold = self.discontinuity_fraction(smoothed) * smoothed;

        let all_above = ring.iter().all(|v| *v - smoothed > threshold);
        let all_below = ring.iter().all(|v| smoothed - *v > threshold);
        if !(all_above || all_below) {
            return false;
        }

        let mean: f64 = ring.iter().sum::<f64>() / ring.len() as f64;
        let spread = ring.iter().map(|v| (v - mean).abs()).fold(0.0, f64::max);
        let tight = spread <= 0.1 * mean.abs().max(1e-6);
        tight && latest.is_finite()
    }

    /// Clear smoothing state on an explicit scene change or target-priority
    /// switch.
    pub fn reset(&mut self) {
        self.state = SmootherState::new(self.cfg.discontinuity_ring_len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_initializes_unmodified() {
        let mut s = MotionSmoother::new(SmootherCfg::default());
        let out = s.update(15.0, MotionState::Stationary, 0.0);
        assert_eq!(out, 15.0);
    }

    #[test]
    fn smooths_toward_steady_noise() {
        let mut s = MotionSmoother::new(SmootherCfg::default());
        s.update(10.0, MotionState::Tracking, 0.0);
        let mut last = 10.0;
        for i in 1..10 {
            last = s.update(10.0 + if i % 2 == 0 { 0.2 } else { -0.2 }, MotionState::Tracking, i as f64 * 0.1);
        }
        assert!((last - 10.0).abs() < 1.0);
    }

    #[test]
    fn discontinuity_snaps_on_consistent_jump() {
        let mut s = MotionSmoother::new(SmootherCfg::default());
        s.update(10.0, MotionState::Stationary, 0.0);
        // Several frames all reading ~40 m should eventually snap rather
        // than crawl toward it via exponential averaging.
        let mut out = 10.0;
        for i in 1..6 {
            out = s.update(40.0, MotionState::Stationary, i as f64 * 0.1);
        }
        assert!((out - 40.0).abs() < 5.0);
    }

    #[test]
    fn reset_clears_state() {
        let mut s = MotionSmoother::new(SmootherCfg::default());
        s.update(10.0, MotionState::Stationary, 0.0);
        s.reset();
        assert!(!s.state().is_initialized);
        assert!(s.state().discontinuity_ring.is_empty());
    }
}
