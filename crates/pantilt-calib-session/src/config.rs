//! JSON configuration for a calibration + replay run.

use crate::gimbal::{AngleRange, LinearGimbalModel, ScreenDimensions};
use crate::session::SessionOptions;
use pantilt_calib_core::{Point2D, CORRESPONDENCE_QUOTA};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(thiserror::Error, Debug)]
pub enum ConfigIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must span a non-empty finite interval (got [{min}, {max}])")]
    EmptyRange { name: &'static str, min: f64, max: f64 },
    #[error("screen dimensions must be non-zero (got {width}x{height})")]
    ZeroDimension { width: u32, height: u32 },
    #[error("expected {expected} calibration points (got {got})")]
    CalibrationPointCount { expected: usize, got: usize },
    #[error("contour thresholds must satisfy 0 < low <= high (got {low}, {high})")]
    ContourThresholds { low: f32, high: f32 },
}

fn default_screen_dimensions() -> ScreenDimensions {
    ScreenDimensions::new(1920, 1080)
}

fn default_pan_range() -> AngleRange {
    AngleRange::new(0.0, 180.0)
}

fn default_tilt_range() -> AngleRange {
    AngleRange::new(0.0, 90.0)
}

fn default_emission_interval_ms() -> u64 {
    16
}

/// Edge and contour extraction settings for the image contour source.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourParams {
    /// Canny hysteresis low threshold.
    pub low_threshold: f32,
    /// Canny hysteresis high threshold.
    pub high_threshold: f32,
    /// Keep only the end points of straight horizontal, vertical and diagonal runs.
    pub compress_runs: bool,
}

impl Default for ContourParams {
    fn default() -> Self {
        Self {
            low_threshold: 50.0,
            high_threshold: 150.0,
            compress_runs: true,
        }
    }
}

/// Configuration for a calibration + replay run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub image_path: String,
    #[serde(default = "default_screen_dimensions")]
    pub screen_dimensions: ScreenDimensions,
    #[serde(default = "default_pan_range")]
    pub pan_range: AngleRange,
    #[serde(default = "default_tilt_range")]
    pub tilt_range: AngleRange,
    /// Minimum time between two emitted points, in milliseconds.
    #[serde(default = "default_emission_interval_ms")]
    pub emission_interval_ms: u64,
    #[serde(default)]
    pub start_paused: bool,
    #[serde(default)]
    pub contour: ContourParams,
    /// Image points the operator would click, in TL, TR, BR, BL order.
    #[serde(default)]
    pub calibration_points: Option<Vec<Point2D>>,
    #[serde(default)]
    pub output_path: Option<String>,
}

impl CalibrationConfig {
    /// A config with every optional field at its default.
    pub fn new(image_path: impl Into<String>) -> Self {
        Self {
            image_path: image_path.into(),
            screen_dimensions: default_screen_dimensions(),
            pan_range: default_pan_range(),
            tilt_range: default_tilt_range(),
            emission_interval_ms: default_emission_interval_ms(),
            start_paused: false,
            contour: ContourParams::default(),
            calibration_points: None,
            output_path: None,
        }
    }

    /// Load and validate a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ScreenDimensions { width, height } = self.screen_dimensions;
        if width == 0 || height == 0 {
            return Err(ConfigError::ZeroDimension { width, height });
        }
        for (name, r) in [("pan_range", self.pan_range), ("tilt_range", self.tilt_range)] {
            if !(r.min.is_finite() && r.max.is_finite()) || r.min == r.max {
                return Err(ConfigError::EmptyRange {
                    name,
                    min: r.min,
                    max: r.max,
                });
            }
        }
        if let Some(points) = &self.calibration_points {
            if points.len() != CORRESPONDENCE_QUOTA {
                return Err(ConfigError::CalibrationPointCount {
                    expected: CORRESPONDENCE_QUOTA,
                    got: points.len(),
                });
            }
        }
        let ContourParams {
            low_threshold: low,
            high_threshold: high,
            ..
        } = self.contour;
        if !(low > 0.0 && low <= high) {
            return Err(ConfigError::ContourThresholds { low, high });
        }
        Ok(())
    }

    pub fn emission_interval(&self) -> Duration {
        Duration::from_millis(self.emission_interval_ms)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            emission_interval: self.emission_interval(),
            start_paused: self.start_paused,
        }
    }

    pub fn gimbal_model(&self) -> LinearGimbalModel {
        LinearGimbalModel::new(self.screen_dimensions, self.pan_range, self.tilt_range)
    }

    /// Configured calibration points, or the screen corners inset by 10%.
    pub fn calibration_points(&self) -> Vec<Point2D> {
        if let Some(points) = &self.calibration_points {
            return points.clone();
        }
        let w = f64::from(self.screen_dimensions.width);
        let h = f64::from(self.screen_dimensions.height);
        let (x0, x1) = (0.1 * w, 0.9 * w);
        let (y0, y1) = (0.1 * h, 0.9 * h);
        vec![
            Point2D::new(x0, y0),
            Point2D::new(x1, y0),
            Point2D::new(x1, y1),
            Point2D::new(x0, y1),
        ]
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("pantilt_replay_report.json"))
    }
}
