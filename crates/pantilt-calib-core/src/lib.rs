//! Core geometry for pan-tilt calibration.
//!
//! This crate is intentionally small and purely geometric: value types for
//! points and correspondences, a normalized DLT homography estimator, and the
//! perspective-dividing point mapper. It knows nothing about sessions, images
//! or gimbals.
//!
//! ```
//! use pantilt_calib_core::{estimate_homography, Correspondence, Point2D};
//!
//! let pair = |s: (f64, f64), t: (f64, f64)| Correspondence { source: s.into(), target: t.into() };
//! let corr = [
//!     pair((0.0, 0.0), (10.0, 0.0)),
//!     pair((1.0, 0.0), (190.0, 0.0)),
//!     pair((1.0, 1.0), (190.0, 90.0)),
//!     pair((0.0, 1.0), (10.0, 90.0)),
//! ];
//! let h = estimate_homography(&corr).unwrap();
//! let p = h.map(Point2D::new(0.5, 0.5)).unwrap();
//! assert!((p.x - 100.0).abs() < 1e-9 && (p.y - 45.0).abs() < 1e-9);
//! ```

mod homography;
mod logger;
mod point;

pub use homography::{
    estimate_homography, estimate_homography_dlt, Degeneracy, EstimationError, Homography,
    MappingError, PointSet, CORRESPONDENCE_QUOTA,
};
pub use point::{Correspondence, MappedPoint, Point2D, PointError};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_from_env, init_with_level, parse_level, LOG_ENV};
