//! Continuous neural↔reference calibrator (§4.3).
//!
//! Maintains a bounded ring of accepted (neural_raw, reference_metric,
//! confidence, timestamp) samples and periodically refits both a Linear
//! (`y = a*x + b`) and an Inverse (`y = a/x + b`) model by weighted least
//! squares, keeping whichever has the smaller normalized residual. Grounded
//! on the existing calibration-fit code's weighted-regression-plus-outlier-
//! refit shape, generalized from a fixed linear fit over a CSV-loaded
//! dataset to an online fit over two competing model families.

use std::collections::VecDeque;

use crate::config::CalibratorCfg;
use crate::types::{CalibrationSample, CalibrationState, ModelKind};

/// Smallest denominator allowed for the inverse model to avoid divergence
/// as x approaches zero.
const INVERSE_DENOM_CLAMP: f64 = 1e-3;

#[derive(Debug, Clone)]
pub struct ContinuousCalibrator {
    cfg: CalibratorCfg,
    samples: VecDeque<CalibrationSample>,
    state: CalibrationState,
    samples_since_fit: usize,
}

impl ContinuousCalibrator {
    pub fn new(cfg: CalibratorCfg, now: f64) -> Self {
        Self {
            samples: VecDeque::with_capacity(cfg.max_samples),
            state: CalibrationState::identity(now),
            samples_since_fit: 0,
            cfg,
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    /// Ingest one (neural_raw, reference_metric, confidence) observation.
    /// Invalid samples (non-finite, non-positive reference, low
    /// confidence) are silently dropped, per the error-handling design's
    /// "invalid input contributes nothing, never raises" rule.
    pub fn observe(&mut self, neural_raw: f64, reference_metric: f64, confidence: f64, now: f64) {
        let sample = CalibrationSample {
            neural_raw,
            reference_metric,
            confidence,
            timestamp: now,
        };
        if !sample.is_valid(self.cfg.min_sample_confidence) {
            tracing::debug!(neural_raw, reference_metric, confidence, "calibrator: rejected sample");
            return;
        }
        if self.samples.len() == self.cfg.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.samples_since_fit += 1;

        if self.samples.len() >= self.cfg.min_samples_for_fit
            && self.samples_since_fit >= self.cfg.refit_every_n
        {
            self.refit(now);
            self.samples_since_fit = 0;
        }
    }

    fn refit(&mut self, now: f64) {
        let linear_pts: Vec<(f64, f64, f64)> = self
            .samples
            .iter()
            .map(|s| (s.neural_raw, s.reference_metric, s.confidence))
            .collect();

        let inverse_pts: Vec<(f64, f64, f64)> = self
            .samples
            .iter()
            .filter(|s| s.neural_raw.abs() > INVERSE_DENOM_CLAMP)
            .map(|s| (1.0 / s.neural_raw, s.reference_metric, s.confidence))
            .collect();

        let linear_fit = weighted_ols(&linear_pts);
        let inverse_fit = weighted_ols(&inverse_pts);

        let (model_kind, a, b, residual) = match (linear_fit, inverse_fit) {
            (Some(l), Some(i)) if i.2 < l.2 => (ModelKind::Inverse, i.0, i.1, i.2),
            (Some(l), _) => (ModelKind::Linear, l.0, l.1, l.2),
            (None, Some(i)) => (ModelKind::Inverse, i.0, i.1, i.2),
            (None, None) => {
                tracing::debug!("calibrator: refit degenerate, keeping previous model");
                return;
            }
        };

        let sample_count = self.samples.len();
        let count_term = (sample_count as f64 / (self.cfg.min_samples_for_fit as f64 * 2.0)).clamp(0.0, 1.0);
        let residual_term = (1.0 - residual).clamp(0.0, 1.0);
        let confidence = (count_term * residual_term).sqrt().clamp(0.0, 1.0);

        tracing::info!(?model_kind, a, b, residual, sample_count, "calibrator: refit");

        self.state = CalibrationState {
            model_kind,
            a,
            b,
            sample_count,
            fit_residual: residual,
            last_update_time: now,
            confidence_0_1: confidence,
        };
    }

    /// Apply the current model to a raw neural value. Safe for all finite
    /// x; the inverse model saturates rather than diverging as x
    /// approaches zero.
    pub fn calibrate(&self, x: f64) -> f64 {
        if !x.is_finite() {
            return 0.0;
        }
        match self.state.model_kind {
            ModelKind::Linear => self.state.a * x + self.state.b,
            ModelKind::Inverse => {
                let denom = if x.abs() < INVERSE_DENOM_CLAMP {
                    INVERSE_DENOM_CLAMP.copysign(x.max(INVERSE_DENOM_CLAMP))
                } else {
                    x
                };
                self.state.a / denom + self.state.b
            }
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

/// Weighted ordinary least squares: fits `y = a*x + b` minimizing
/// `Σ w_i (y_i - a x_i - b)^2`. Returns `(a, b, normalized_residual)`.
fn weighted_ols(pts: &[(f64, f64, f64)]) -> Option<(f64, f64, f64)> {
    if pts.len() < 2 {
        return None;
    }
    let w_sum: f64 = pts.iter().map(|(_, _, w)| w).sum();
    if !(w_sum.is_finite()) || w_sum <= 0.0 {
        return None;
    }
    let mean_x: f64 = pts.iter().map(|(x, _, w)| x * w).sum::<f64>() / w_sum;
    let mean_y: f64 = pts.iter().map(|(_, y, w)| y * w).sum::<f64>() / w_sum;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y, w) in pts {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += w * dx * dx;
        sxy += w * dx * dy;
    }
    if !sxx.is_finite() || sxx.abs() < 1e-12 {
        return None;
    }
    let a = sxy / sxx;
    if !a.is_finite() {
        return None;
    }
    let b = mean_y - a * mean_x;

    let mut sse = 0.0;
    for (x, y, w) in pts {
        let resid = y - (a * x + b);
        sse += w * resid * resid;
    }
    let weighted_rms = (sse / w_sum).sqrt();
    let mean_abs_y = pts.iter().map(|(_, y, w)| w * y.abs()).sum::<f64>() / w_sum;
    let normalized_residual = weighted_rms / mean_abs_y.max(1e-6);

    Some((a, b, normalized_residual))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_with_zero_samples() {
        let c = ContinuousCalibrator::new(CalibratorCfg::default(), 0.0);
        assert_eq!(c.state().model_kind, ModelKind::Linear);
        assert_eq!(c.state().a, 1.0);
        assert_eq!(c.state().b, 0.0);
        assert_eq!(c.calibrate(5.0), 5.0);
    }

    #[test]
    fn fits_exact_linear_dataset() {
        let cfg = CalibratorCfg {
            min_samples_for_fit: 4,
            refit_every_n: 1,
            ..CalibratorCfg::default()
        };
        let mut c = ContinuousCalibrator::new(cfg, 0.0);
        // y = 2x + 3 exactly.
        for x in [1.0, 2.0, 3.0, 4.0, 5.0, 6.0] {
            c.observe(x, 2.0 * x + 3.0, 1.0, 0.0);
        }
        assert_eq!(c.state().model_kind, ModelKind::Linear);
        assert!((c.state().a - 2.0).abs() < 1e-6);
        assert!((c.state().b - 3.0).abs() < 1e-6);
        assert!(c.state().fit_residual < 1e-6);
        for x in [0.5, 7.0, 10.0] {
            assert!((c.calibrate(x) - (2.0 * x + 3.0)).abs() < 1e-6);
        }
    }

    #[test]
    fn rejects_invalid_samples() {
        let mut c = ContinuousCalibrator::new(CalibratorCfg::default(), 0.0);
        c.observe(f64::NAN, 5.0, 1.0, 0.0);
        c.observe(1.0, -5.0, 1.0, 0.0);
        c.observe(1.0, 5.0, 0.0, 0.0);
        assert_eq!(c.sample_count(), 0);
    }

    #[test]
    fn inverse_model_saturates_near_zero() {
        let mut c = ContinuousCalibrator::new(
            CalibratorCfg {
                min_samples_for_fit: 3,
                refit_every_n: 1,
                ..CalibratorCfg::default()
            },
            0.0,
        );
        // y = 10/x approximately.
        for x in [0.5, 1.0, 2.0, 4.0, 5.0] {
            c.observe(x, 10.0 / x, 1.0, 0.0);
        }
        assert_eq!(c.state().model_kind, ModelKind::Inverse);
        let v = c.calibrate(0.0);
        assert!(v.is_finite());
    }

    #[test]
    fn ring_buffer_drops_oldest_on_overflow() {
        let cfg = CalibratorCfg {
            max_samples: 4,
            min_samples_for_fit: 100,
            ..CalibratorCfg::default()
        };
        let mut c = ContinuousCalibrator::new(cfg, 0.0);
        for i in 0..10 {
            c.observe(i as f64 + 1.0, i as f64 + 1.0, 1.0, 0.0);
        }
        assert_eq!(c.sample_count(), 4);
    }
}
