//! Domain and build errors for the fusion engine.
//!
//! Per the error-handling design, the great majority of abnormal conditions
//! (invalid input, sensor unavailable, tile missing, model not fit, time
//! gap) are not exceptions: they are handled by zeroing a source's weight,
//! omitting an estimate, or resetting a filter, and are logged via
//! `tracing` rather than returned as `Err`. `DepthError` covers only the
//! narrow set of genuinely fallible construction/configuration paths.
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum DepthError {
    #[error("missing configuration")]
    MissingConfig,
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("calibrator fit failed: {0}")]
    CalibrationFit(&'static str),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing config")]
    MissingConfig,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_error_display_is_stable() {
        assert_eq!(
            DepthError::InvalidConfig("min_lidar_m >= max_lidar_m").to_string(),
            "invalid configuration: min_lidar_m >= max_lidar_m"
        );
        assert_eq!(DepthError::MissingConfig.to_string(), "missing configuration");
    }
}
