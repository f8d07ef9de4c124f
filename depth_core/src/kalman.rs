//! Constant-velocity Kalman filter on (depth, velocity) (§4.7).
//!
//! Grounded on the pack's nalgebra-based Extended Kalman Filter for radar
//! target tracking, reduced from its 4-state polar-position/velocity model
//! down to the 2-state linear depth/velocity model this system needs: the
//! same `SMatrix`-based state-transition/covariance/gain shape, a single
//! scalar measurement instead of a 2-vector polar measurement.

use nalgebra::SMatrix;

use crate::config::KalmanCfg;
use crate::types::{Covariance2, KalmanState, MotionState};

type Matrix1x2 = SMatrix<f64, 1, 2>;
type Matrix2x1 = SMatrix<f64, 2, 1>;

#[derive(Debug, Clone)]
pub struct DepthKalman {
    cfg: KalmanCfg,
    state: KalmanState,
}

impl DepthKalman {
    pub fn new(cfg: KalmanCfg) -> Self {
        Self {
            cfg,
            state: KalmanState::uninitialized(),
        }
    }

    pub fn state(&self) -> KalmanState {
        self.state
    }

    fn process_noise(&self, motion_state: MotionState) -> f64 {
        let (s, t, p) = self.cfg.q_motion_scale;
        let scale = match motion_state {
            MotionState::Stationary => s,
            MotionState::Tracking => t,
            MotionState::Panning => p,
        };
        self.cfg.base_q * scale
    }

    /// Incorporate one measurement and return the posterior depth. The
    /// first measurement initializes the filter (velocity 0) and is
    /// returned unmodified; a gap larger than `max_gap_s` resets instead of
    /// predicting through it.
    pub fn update(
        &mut self,
        measurement_m: f64,
        confidence: f64,
        motion_state: MotionState,
        timestamp: f64,
    ) -> f64 {
        if !measurement_m.is_finite() {
            return self.state.depth_m;
        }

        if !self.state.is_tracking {
            self.initialize(measurement_m, timestamp);
            return measurement_m;
        }

        let dt = timestamp - self.state.last_update_time;
        if dt > self.cfg.max_gap_s || dt < 0.0 {
            tracing::warn!(dt, "kalman: time gap exceeded, resetting");
            self.initialize(measurement_m, timestamp);
            return measurement_m;
        }

        // Predict.
        let a = SMatrix::<f64, 2, 2>::new(1.0, dt, 0.0, 1.0);
        let mut x = Matrix2x1::new(self.state.depth_m, self.state.velocity_m_per_s);
        x = a * x;

        let q_scalar = self.process_noise(motion_state);
        let q = SMatrix::<f64, 2, 2>::new(
            q_scalar * dt.powi(3) / 3.0,
            q_scalar * dt.powi(2) / 2.0,
            q_scalar * dt.powi(2) / 2.0,
            q_scalar * dt,
        );
        let p = a * self.state.covariance * a.transpose() + q;

        // Update with scalar measurement z = depth.
        let h = Matrix1x2::new(1.0, 0.0);
        let r = self.cfg.base_r * (1.0 - confidence.clamp(0.0, 1.0) + 1e-3);
        let s = (h * p * h.transpose())[(0, 0)] + r;
        let (x_post, p_post) = if s.abs() < 1e-12 {
            (x, p)
        } else {
            let k = p * h.transpose() / s;
            let innovation = measurement_m - (h * x)[(0, 0)];
            let x_post = x + k * innovation;
            let identity = SMatrix::<f64, 2, 2>::identity();
            let p_post = (identity - k * h) * p;
            (x_post, p_post)
        };

        self.state.depth_m = x_post[(0, 0)];
        self.state.velocity_m_per_s = x_post[(1, 0)];
        self.state.covariance = symmetrize(p_post);
        self.state.last_update_time = timestamp;
        self.state.depth_m
    }

    fn initialize(&mut self, measurement_m: f64, timestamp: f64) {
        self.state = KalmanState {
            is_tracking: true,
            depth_m: measurement_m,
            velocity_m_per_s: 0.0,
            covariance: Covariance2::new(1.0, 0.0, 0.0, 1.0),
            last_update_time: timestamp,
        };
    }

    /// Extrapolate depth by velocity·Δt without incorporating a
    /// measurement. Returns `None` until the filter is tracking.
    pub fn predict(&self, at_timestamp: f64) -> Option<f64> {
        if !self.state.is_tracking {
            return None;
        }
        let dt = at_timestamp - self.state.last_update_time;
        Some(self.state.depth_m + self.state.velocity_m_per_s * dt)
    }

    pub fn reset(&mut self) {
        self.state = KalmanState::uninitialized();
    }
}

fn symmetrize(p: Covariance2) -> Covariance2 {
    (p + p.transpose()) * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_measurement_initializes_unmodified() {
        let mut k = DepthKalman::new(KalmanCfg::default());
        let out = k.update(12.3, 0.9, MotionState::Stationary, 0.0);
        assert_eq!(out, 12.3);
        assert!(k.state().is_tracking);
        assert_eq!(k.state().velocity_m_per_s, 0.0);
    }

    #[test]
    fn predict_before_tracking_is_none() {
        let k = DepthKalman::new(KalmanCfg::default());
        assert_eq!(k.predict(1.0), None);
    }

    #[test]
    fn predict_is_monotonic_under_constant_velocity_updates() {
        let mut k = DepthKalman::new(KalmanCfg::default());
        let mut t = 0.0;
        let mut d = 10.0;
        for _ in 0..20 {
            k.update(d, 0.95, MotionState::Tracking, t);
            t += 1.0;
            d += 2.0; // constant velocity of 2 m/s away from the observer
        }
        let p1 = k.predict(t).unwrap();
        let p2 = k.predict(t + 1.0).unwrap();
        let p3 = k.predict(t + 2.0).unwrap();
        assert!(p1 < p2);
        assert!(p2 < p3);
    }

    #[test]
    fn large_time_gap_resets() {
        let mut k = DepthKalman::new(KalmanCfg::default());
        k.update(10.0, 0.9, MotionState::Stationary, 0.0);
        k.update(11.0, 0.9, MotionState::Stationary, 0.2);
        let out = k.update(50.0, 0.9, MotionState::Stationary, 5.0);
        assert_eq!(out, 50.0);
        assert_eq!(k.state().velocity_m_per_s, 0.0);
    }

    #[test]
    fn explicit_reset_clears_tracking() {
        let mut k = DepthKalman::new(KalmanCfg::default());
        k.update(10.0, 0.9, MotionState::Stationary, 0.0);
        k.reset();
        assert!(!k.state().is_tracking);
    }

    #[test]
    fn zero_confidence_measurement_still_bounded() {
        let mut k = DepthKalman::new(KalmanCfg::default());
        k.update(10.0, 0.9, MotionState::Stationary, 0.0);
        let out = k.update(10.5, 0.0, MotionState::Stationary, 0.1);
        assert!(out.is_finite());
    }
}
