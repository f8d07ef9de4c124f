//! Trait interfaces for the external collaborators named in the system's
//! scope: camera pose, neural depth inference, an optional reference depth
//! sensor, object detection, device geolocation, and the online elevation
//! endpoint. None of these are implemented here beyond simple mocks; real
//! implementations are out of scope and live behind these seams so that
//! `depth_core` stays free of camera, ML, and network dependencies.

use std::error::Error;

/// A dense 2-D array of inverse-depth samples in arbitrary units.
/// Row 0 is the top of the frame, column 0 is the left edge.
#[derive(Debug, Clone)]
pub struct InverseDepthMap {
    pub width: usize,
    pub height: usize,
    pub samples: Vec<f32>,
}

impl InverseDepthMap {
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.samples.get(row * self.width + col).copied()
    }
}

/// A dense 2-D array of metric depth samples with a matching per-pixel
/// confidence array in [0, 1].
#[derive(Debug, Clone)]
pub struct ReferenceDepthMap {
    pub width: usize,
    pub height: usize,
    pub depth_m: Vec<f32>,
    pub confidence: Vec<f32>,
}

impl ReferenceDepthMap {
    pub fn get(&self, row: usize, col: usize) -> Option<(f32, f32)> {
        if row >= self.height || col >= self.width {
            return None;
        }
        let idx = row * self.width + col;
        Some((*self.depth_m.get(idx)?, *self.confidence.get(idx)?))
    }
}

/// One object detection with a normalized-coordinate bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    /// (x_min, y_min, x_max, y_max), each in [0, 1].
    pub bbox: (f32, f32, f32, f32),
    pub confidence: f32,
}

/// Device pose at frame capture time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    pub timestamp_s: f64,
    pub pitch_rad: f64,
    pub heading_deg: f64,
}

/// A single high-frequency attitude/angular-velocity sample, per the 60 Hz
/// attitude input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttitudeSample {
    pub timestamp_s: f64,
    pub pitch_rad: f64,
    pub heading_deg: f64,
    pub angular_velocity_rad_s: f64,
}

/// A single geolocation fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFix {
    pub timestamp_s: f64,
    pub lat: f64,
    pub lon: f64,
    pub altitude_m: f64,
    pub horizontal_accuracy_m: f64,
    pub vertical_accuracy_m: f64,
}

pub type SourceError = Box<dyn Error + Send + Sync>;

/// Supplies the per-frame camera pose / pitch.
pub trait PoseSource {
    fn latest_pose(&mut self) -> Result<Option<PoseSample>, SourceError>;
}

/// Supplies the dense neural inverse-depth map.
pub trait NeuralDepthSource {
    fn latest_depth_map(&mut self) -> Result<Option<InverseDepthMap>, SourceError>;
}

/// Supplies the optional reference (e.g. LiDAR / time-of-flight) depth map.
pub trait ReferenceDepthSource {
    fn latest_reference(&mut self) -> Result<Option<ReferenceDepthMap>, SourceError>;
}

/// Supplies object detections for the current frame.
pub trait ObjectDetector {
    fn latest_detections(&mut self) -> Result<Vec<Detection>, SourceError>;
}

/// Supplies the device geolocation stream.
pub trait GeolocationSource {
    fn latest_fix(&mut self) -> Result<Option<GeoFix>, SourceError>;
}

/// Supplies the 60 Hz attitude/angular-velocity stream consumed by the
/// motion gate.
pub trait AttitudeSource {
    fn latest_attitude(&mut self) -> Result<Option<AttitudeSample>, SourceError>;
}

/// The online elevation point-query endpoint: given (lon, lat), return the
/// terrain elevation in meters, or `None` if the service reports no-data.
pub trait ElevationClient {
    fn query_point(&self, lon: f64, lat: f64) -> Result<Option<f64>, SourceError>;
}

impl<T: ?Sized + PoseSource> PoseSource for Box<T> {
    fn latest_pose(&mut self) -> Result<Option<PoseSample>, SourceError> {
        (**self).latest_pose()
    }
}

impl<T: ?Sized + NeuralDepthSource> NeuralDepthSource for Box<T> {
    fn latest_depth_map(&mut self) -> Result<Option<InverseDepthMap>, SourceError> {
        (**self).latest_depth_map()
    }
}

impl<T: ?Sized + ReferenceDepthSource> ReferenceDepthSource for Box<T> {
    fn latest_reference(&mut self) -> Result<Option<ReferenceDepthMap>, SourceError> {
        (**self).latest_reference()
    }
}

impl<T: ?Sized + ObjectDetector> ObjectDetector for Box<T> {
    fn latest_detections(&mut self) -> Result<Vec<Detection>, SourceError> {
        (**self).latest_detections()
    }
}

impl<T: ?Sized + GeolocationSource> GeolocationSource for Box<T> {
    fn latest_fix(&mut self) -> Result<Option<GeoFix>, SourceError> {
        (**self).latest_fix()
    }
}

impl<T: ?Sized + AttitudeSource> AttitudeSource for Box<T> {
    fn latest_attitude(&mut self) -> Result<Option<AttitudeSample>, SourceError> {
        (**self).latest_attitude()
    }
}

impl<T: ?Sized + ElevationClient> ElevationClient for Box<T> {
    fn query_point(&self, lon: f64, lat: f64) -> Result<Option<f64>, SourceError> {
        (**self).query_point(lon, lat)
    }
}

/// A source that never has data, useful as a default/offline stand-in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSource;

impl PoseSource for NoopSource {
    fn latest_pose(&mut self) -> Result<Option<PoseSample>, SourceError> {
        Ok(None)
    }
}

impl NeuralDepthSource for NoopSource {
    fn latest_depth_map(&mut self) -> Result<Option<InverseDepthMap>, SourceError> {
        Ok(None)
    }
}

impl ReferenceDepthSource for NoopSource {
    fn latest_reference(&mut self) -> Result<Option<ReferenceDepthMap>, SourceError> {
        Ok(None)
    }
}

impl ObjectDetector for NoopSource {
    fn latest_detections(&mut self) -> Result<Vec<Detection>, SourceError> {
        Ok(Vec::new())
    }
}

impl GeolocationSource for NoopSource {
    fn latest_fix(&mut self) -> Result<Option<GeoFix>, SourceError> {
        Ok(None)
    }
}

impl AttitudeSource for NoopSource {
    fn latest_attitude(&mut self) -> Result<Option<AttitudeSample>, SourceError> {
        Ok(None)
    }
}

impl ElevationClient for NoopSource {
    fn query_point(&self, _lon: f64, _lat: f64) -> Result<Option<f64>, SourceError> {
        Ok(None)
    }
}
