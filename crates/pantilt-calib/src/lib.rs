//! High-level facade crate for the `pantilt-calib-*` workspace.
//!
//! This crate provides:
//! - stable, convenient re-exports of the estimator and session crates
//! - (feature-gated) contour extraction from images with `imageproc`
//! - an offline replay driver that calibrates against a reference gimbal model
//!   and streams a contour through the estimated homography.
//!
//! ## Quickstart
//!
//! ```no_run
//! use pantilt_calib::replay::replay_config;
//! use pantilt_calib::session::CalibrationConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = CalibrationConfig::load_json("replay.json")?;
//! let report = replay_config(&cfg, None)?;
//! println!("emitted {} points, skipped {}", report.emitted.len(), report.skipped);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `pantilt_calib::core`: points, homography estimation and mapping, logging.
//! - `pantilt_calib::session`: correspondence collection, state machine, animator, config.
//! - `pantilt_calib::contour`: contour sources (image extraction behind feature `image`).
//! - `pantilt_calib::replay`: simulated-clock replay producing a JSON report.

pub use pantilt_calib_core as core;
pub use pantilt_calib_session as session;

pub use pantilt_calib_core::{
    estimate_homography, Correspondence, EstimationError, Homography, MappedPoint, MappingError,
    Point2D,
};
pub use pantilt_calib_session::{CalibrationConfig, CalibrationSession, Phase, SessionError};

pub mod contour;
pub mod replay;
