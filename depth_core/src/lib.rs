#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Hardware-agnostic multi-source depth fusion engine.
//!
//! This crate fuses LiDAR/reference depth, neural monocular depth, stereo
//! geometric depth, DEM ray-cast estimates, object detections, and manual
//! stadiametric brackets into a single calibrated, filtered distance. All
//! hardware and network interactions go through the traits in `depth_traits`;
//! nothing in this crate touches a device, a file, or the network directly.
//!
//! ## Architecture
//!
//! - **Calibration**: online neural↔reference regression (`calibrator`)
//! - **Confidence**: per-source confidence curves (`confidence`)
//! - **Fusion**: the weighted-combination engine (`fusion`)
//! - **Selection**: the semantic priority ladder (`selector`)
//! - **Filtering**: Kalman depth/velocity tracking plus motion-aware
//!   smoothing (`kalman`, `smoother`)
//! - **Scene analysis**: bimodal crosshair-ROI histogram (`bimodal`)
//! - **Geometry**: cosine/inclination correction and stadiametric ranging
//!   (`cosine`, `stadiametric`)
//! - **Orchestration**: the single synchronous per-frame entry point
//!   (`context::FusionContext`)

pub mod bimodal;
pub mod calibrator;
pub mod confidence;
pub mod config;
pub mod context;
pub mod conversions;
pub mod cosine;
pub mod error;
pub mod fusion;
pub mod kalman;
pub mod motion;
pub mod outlier;
pub mod selector;
pub mod smoother;
pub mod stadiametric;
pub mod types;

pub use context::{FrameInputs, FrameReport, FusionContext, ObjectDetection};
pub use error::{BuildError, DepthError, Result};
pub use types::{
    BimodalAnalysis, CalibrationState, DemEstimate, FusedDepth, ModelKind, SourceEstimate, SourceTag, TargetPriority,
};
