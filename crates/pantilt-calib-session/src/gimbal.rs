//! Reference pan-tilt model used when no hardware is attached.

use pantilt_calib_core::{Correspondence, Homography, Point2D};
use serde::{Deserialize, Serialize};

/// Closed angular interval in degrees. Serialized as `[min, max]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct AngleRange {
    pub min: f64,
    pub max: f64,
}

impl AngleRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

impl From<[f64; 2]> for AngleRange {
    fn from([min, max]: [f64; 2]) -> Self {
        Self { min, max }
    }
}

impl From<AngleRange> for [f64; 2] {
    fn from(r: AngleRange) -> Self {
        [r.min, r.max]
    }
}

/// Screen size in pixels. Serialized as `[width, height]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct ScreenDimensions {
    pub width: u32,
    pub height: u32,
}

impl ScreenDimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<[u32; 2]> for ScreenDimensions {
    fn from([width, height]: [u32; 2]) -> Self {
        Self { width, height }
    }
}

impl From<ScreenDimensions> for [u32; 2] {
    fn from(d: ScreenDimensions) -> Self {
        [d.width, d.height]
    }
}

/// Ideal gimbal: pan linear in `x`, tilt linear in `height - y`.
///
/// Pixel `(0, height)` points at `(pan.min, tilt.min)`, pixel `(width, 0)` at
/// `(pan.max, tilt.max)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearGimbalModel {
    pub screen: ScreenDimensions,
    pub pan: AngleRange,
    pub tilt: AngleRange,
}

impl LinearGimbalModel {
    pub fn new(screen: ScreenDimensions, pan: AngleRange, tilt: AngleRange) -> Self {
        Self { screen, pan, tilt }
    }

    /// `(pan, tilt)` in degrees for a screen pixel.
    pub fn angles_for(&self, p: Point2D) -> Point2D {
        let w = f64::from(self.screen.width);
        let h = f64::from(self.screen.height);
        Point2D::new(
            self.pan.min + (p.x / w) * self.pan.span(),
            self.tilt.min + ((h - p.y) / h) * self.tilt.span(),
        )
    }

    /// Pair a screen pixel with the angles this model commands for it.
    pub fn correspondence(&self, p: Point2D) -> Correspondence {
        Correspondence {
            source: p,
            target: self.angles_for(p),
        }
    }

    /// The model as an (affine) homography, for comparing against estimates.
    pub fn as_homography(&self) -> Homography {
        let w = f64::from(self.screen.width);
        let h = f64::from(self.screen.height);
        let sx = self.pan.span() / w;
        let sy = self.tilt.span() / h;
        Homography::from_array([
            [sx, 0.0, self.pan.min],
            [0.0, -sy, self.tilt.min + self.tilt.span()],
            [0.0, 0.0, 1.0],
        ])
    }
}
