use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Errors produced when constructing value types from raw coordinates.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum PointError {
    #[error("non-finite coordinate ({x}, {y})")]
    NonFinite { x: f64, y: f64 },
}

/// A point in either the image plane (pixels) or the angular plane (pan, tilt degrees).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Build a point, rejecting NaN and infinite coordinates.
    pub fn try_new(x: f64, y: f64) -> Result<Self, PointError> {
        if x.is_finite() && y.is_finite() {
            Ok(Self { x, y })
        } else {
            Err(PointError::NonFinite { x, y })
        }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    #[inline]
    pub fn distance(&self, other: &Point2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    #[inline]
    pub(crate) fn homogeneous(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, 1.0)
    }
}

impl From<Point2<f64>> for Point2D {
    fn from(p: Point2<f64>) -> Self {
        Self::new(p.x, p.y)
    }
}

impl From<Point2D> for Point2<f64> {
    fn from(p: Point2D) -> Self {
        Point2::new(p.x, p.y)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// One calibration constraint: `source` (image plane) must map onto `target` (angular plane).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub source: Point2D,
    pub target: Point2D,
}

impl Correspondence {
    /// Pair two points, rejecting non-finite coordinates on either side.
    pub fn new(source: Point2D, target: Point2D) -> Result<Self, PointError> {
        let source = Point2D::try_new(source.x, source.y)?;
        let target = Point2D::try_new(target.x, target.y)?;
        Ok(Self { source, target })
    }
}

/// A point of the contour stream after it went through a homography.
///
/// `valid == false` means the projection hit the line at infinity; `target`
/// is then meaningless and must not be commanded to a gimbal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MappedPoint {
    /// Position of the source sample in its sequence.
    pub index: usize,
    pub source: Point2D,
    pub target: Point2D,
    pub valid: bool,
}

/// Twice the signed area of the triangle `(a, b, c)`.
#[inline]
pub(crate) fn signed_area2(a: &Point2D, b: &Point2D, c: &Point2D) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_new_rejects_nan_and_inf() {
        assert!(Point2D::try_new(f64::NAN, 0.0).is_err());
        assert!(Point2D::try_new(0.0, f64::INFINITY).is_err());
        assert_eq!(Point2D::try_new(1.5, -2.0), Ok(Point2D::new(1.5, -2.0)));
    }

    #[test]
    fn correspondence_validates_both_sides() {
        let ok = Point2D::new(1.0, 2.0);
        let bad = Point2D::new(f64::NAN, 2.0);
        assert!(Correspondence::new(ok, ok).is_ok());
        assert!(matches!(
            Correspondence::new(ok, bad),
            Err(PointError::NonFinite { .. })
        ));
    }

    #[test]
    fn signed_area_sign_follows_orientation() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(1.0, 0.0);
        let c = Point2D::new(0.0, 1.0);
        assert_eq!(signed_area2(&a, &b, &c), 1.0);
        assert_eq!(signed_area2(&a, &c, &b), -1.0);
        assert_eq!(signed_area2(&a, &b, &Point2D::new(3.0, 0.0)), 0.0);
    }
}
