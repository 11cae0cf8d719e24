//! Calibration session for pan-tilt contour replay.
//!
//! ## Quickstart
//!
//! ```
//! use pantilt_calib_session::{CalibrationSession, Phase, SessionOptions};
//! use pantilt_calib_core::Point2D;
//! use std::time::Instant;
//!
//! let contour = vec![Point2D::new(0.5, 0.5)];
//! let mut session = CalibrationSession::new(contour, SessionOptions::default());
//!
//! let pairs = [
//!     ((0.0, 0.0), (10.0, 0.0)),
//!     ((1.0, 0.0), (190.0, 0.0)),
//!     ((1.0, 1.0), (190.0, 90.0)),
//!     ((0.0, 1.0), (10.0, 90.0)),
//! ];
//! for (src, dst) in pairs {
//!     session.submit(src.into(), dst.into()).unwrap();
//! }
//! assert_eq!(session.phase(), Phase::Streaming);
//!
//! let p = session.advance(Instant::now()).unwrap().unwrap();
//! assert!((p.target.x - 100.0).abs() < 1e-9);
//! ```
//!
//! Pipeline:
//! 1. Collect four (image, angle) correspondences; the fourth triggers estimation.
//! 2. On success the session enters `Streaming` (or `Calibrated` when started paused).
//! 3. Each `advance` maps and emits at most one contour point, paced by the emission interval.
//! 4. `reset` returns to `Collecting` and rewinds the contour.

mod animator;
mod collector;
mod config;
mod error;
mod gimbal;
mod session;

pub use animator::{Step, StreamAnimator};
pub use collector::CorrespondenceCollector;
pub use config::{CalibrationConfig, ConfigError, ConfigIoError, ContourParams};
pub use error::SessionError;
pub use gimbal::{AngleRange, LinearGimbalModel, ScreenDimensions};
pub use session::{
    CalibrationSession, Operation, Phase, SessionEvent, SessionOptions, SessionState,
};
