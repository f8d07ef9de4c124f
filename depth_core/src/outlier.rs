//! Outlier buffer & guidance signals (§4.12).
//!
//! A short-horizon ring of recent fused outputs. The selector consults it
//! to suppress large single-frame jumps when no source transition
//! justifies them; an explicit mode change clears the ring to allow an
//! immediate transition instead of fighting the buffer's inertia.

use std::collections::VecDeque;

use crate::config::OutlierCfg;
use crate::types::FusedDepth;

#[derive(Debug, Clone)]
pub struct OutlierBuffer {
    ring: VecDeque<FusedDepth>,
    capacity: usize,
}

impl OutlierBuffer {
    pub fn new(cfg: OutlierCfg) -> Self {
        Self {
            ring: VecDeque::with_capacity(cfg.ring_capacity),
            capacity: cfg.ring_capacity,
        }
    }

    pub fn push(&mut self, depth: FusedDepth) {
        if self.ring.len() == self.capacity {
            self.ring.pop_front();
        }
        self.ring.push_back(depth);
    }

    /// Clears the ring on a mode change (target priority or manual/auto
    /// switch), allowing an immediate transition without being dampened by
    /// stale history.
    pub fn clear(&mut self) {
        self.ring.clear();
    }

    pub fn recent(&self) -> impl Iterator<Item = &FusedDepth> {
        self.ring.iter()
    }

    pub fn mean_recent_distance(&self) -> Option<f64> {
        if self.ring.is_empty() {
            return None;
        }
        let valid: Vec<f64> = self
            .ring
            .iter()
            .filter(|d| d.is_valid())
            .map(|d| d.distance_m)
            .collect();
        if valid.is_empty() {
            return None;
        }
        Some(valid.iter().sum::<f64>() / valid.len() as f64)
    }

    /// True when `candidate_m` jumps further from the recent mean than
    /// `max_ratio` without any accompanying source change, suggesting the
    /// jump should be suppressed rather than reported immediately.
    pub fn is_unjustified_jump(&self, candidate_m: f64, max_ratio: f64) -> bool {
        match self.mean_recent_distance() {
            Some(mean) if mean > 0.0 && candidate_m > 0.0 => {
                let ratio = (candidate_m / mean).max(mean / candidate_m);
                ratio > max_ratio
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceTag;
    use std::collections::HashMap;

    fn depth(distance_m: f64) -> FusedDepth {
        FusedDepth {
            distance_m,
            confidence_0_1: 0.8,
            uncertainty_m: 0.1,
            primary: SourceTag::Neural,
            contributing_weights: HashMap::new(),
            timestamp_s: 0.0,
        }
    }

    #[test]
    fn ring_bounds_capacity() {
        let mut buf = OutlierBuffer::new(OutlierCfg { ring_capacity: 3 });
        for i in 0..10 {
            buf.push(depth(i as f64));
        }
        assert_eq!(buf.recent().count(), 3);
    }

    #[test]
    fn clear_empties_ring() {
        let mut buf = OutlierBuffer::new(OutlierCfg::default());
        buf.push(depth(10.0));
        buf.clear();
        assert_eq!(buf.recent().count(), 0);
        assert_eq!(buf.mean_recent_distance(), None);
    }

    #[test]
    fn detects_unjustified_jump() {
        let mut buf = OutlierBuffer::new(OutlierCfg::default());
        for _ in 0..4 {
            buf.push(depth(10.0));
        }
        assert!(buf.is_unjustified_jump(100.0, 2.0));
        assert!(!buf.is_unjustified_jump(12.0, 2.0));
    }
}
