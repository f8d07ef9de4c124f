//! Motion / attitude gate (§4.8).
//!
//! Classifies the device's angular-velocity magnitude into a [`MotionState`]
//! and exposes the consistent (pitch, heading, motion) snapshot the
//! per-frame core reads. The 60 Hz attitude producer and the once-per-frame
//! core run on independent schedules (§5); `MotionGate` is the single point
//! where that snapshot is published without tearing, behind one mutex
//! rather than per-field atomics, since the core must never see a motion
//! state that doesn't match the pitch it was computed from.

use std::sync::Mutex;

use crate::config::MotionCfg;
use crate::types::MotionState;

/// A consistent (motion_state, pitch, heading) triple as read by the core
/// for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSnapshot {
    pub motion_state: MotionState,
    pub pitch_rad: f64,
    pub heading_deg: f64,
    pub timestamp_s: f64,
}

impl Default for MotionSnapshot {
    fn default() -> Self {
        Self {
            motion_state: MotionState::Stationary,
            pitch_rad: 0.0,
            heading_deg: 0.0,
            timestamp_s: 0.0,
        }
    }
}

/// Classify angular-velocity magnitude via two thresholds. Exact threshold
/// values are not specified by the source material; any monotone
/// two-threshold classifier is conformant (see DESIGN.md).
pub fn classify_motion(angular_velocity_rad_s: f64, cfg: &MotionCfg) -> MotionState {
    let magnitude = angular_velocity_rad_s.abs();
    if magnitude < cfg.theta_stationary_rad_s {
        MotionState::Stationary
    } else if magnitude > cfg.theta_panning_rad_s {
        MotionState::Panning
    } else {
        MotionState::Tracking
    }
}

pub struct MotionGate {
    cfg: MotionCfg,
    snapshot: Mutex<MotionSnapshot>,
}

impl MotionGate {
    pub fn new(cfg: MotionCfg) -> Self {
        Self {
            cfg,
            snapshot: Mutex::new(MotionSnapshot::default()),
        }
    }

    /// Called by the high-frequency attitude producer. Publishes a new
    /// snapshot atomically with respect to readers.
    pub fn publish(&self, pitch_rad: f64, heading_deg: f64, angular_velocity_rad_s: f64, timestamp_s: f64) {
        let motion_state = classify_motion(angular_velocity_rad_s, &self.cfg);
        let next = MotionSnapshot {
            motion_state,
            pitch_rad,
            heading_deg,
            timestamp_s,
        };
        if let Ok(mut guard) = self.snapshot.lock() {
            *guard = next;
        }
    }

    /// Called once per frame by the core: reads a torn-free snapshot.
    pub fn snapshot(&self) -> MotionSnapshot {
        self.snapshot
            .lock()
            .map(|g| *g)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_stationary_below_lower_threshold() {
        let cfg = MotionCfg::default();
        assert_eq!(classify_motion(0.01, &cfg), MotionState::Stationary);
    }

    #[test]
    fn classifies_panning_above_upper_threshold() {
        let cfg = MotionCfg::default();
        assert_eq!(classify_motion(1.0, &cfg), MotionState::Panning);
    }

    #[test]
    fn classifies_tracking_between_thresholds() {
        let cfg = MotionCfg::default();
        assert_eq!(classify_motion(0.2, &cfg), MotionState::Tracking);
    }

    #[test]
    fn negative_angular_velocity_uses_magnitude() {
        let cfg = MotionCfg::default();
        assert_eq!(classify_motion(-1.0, &cfg), MotionState::Panning);
    }

    #[test]
    fn gate_publishes_consistent_snapshot() {
        let gate = MotionGate::new(MotionCfg::default());
        gate.publish(0.1, 90.0, 1.0, 5.0);
        let snap = gate.snapshot();
        assert_eq!(snap.motion_state, MotionState::Panning);
        assert_eq!(snap.pitch_rad, 0.1);
        assert_eq!(snap.heading_deg, 90.0);
        assert_eq!(snap.timestamp_s, 5.0);
    }
}
