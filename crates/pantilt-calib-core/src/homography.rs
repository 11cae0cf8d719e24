use crate::point::{signed_area2, Correspondence, MappedPoint, Point2D};
use log::{debug, warn};
use nalgebra::{DMatrix, Matrix3};
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Number of correspondences a calibration needs: 8 unknowns, 2 equations per pair.
pub const CORRESPONDENCE_QUOTA: usize = 4;

/// Twice the triangle area (in Hartley-normalized units) below which three points are collinear.
const COLLINEAR_TOL: f64 = 1e-6;
/// `|det(H)| / ||H||_F^3` below which a normalized homography counts as rank deficient.
const SINGULAR_TOL: f64 = 1e-9;
/// Second smallest / largest singular value of the DLT system below which the null space is not 1-D.
const RANK_TOL: f64 = 1e-8;
/// `|w| / ||(x, y, w)||` below which a projected point is at infinity.
const PROJECTION_EPS: f64 = 1e-10;

/// Which side of the correspondences a degeneracy was found on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointSet {
    Source,
    Target,
}

impl fmt::Display for PointSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointSet::Source => write!(f, "source"),
            PointSet::Target => write!(f, "target"),
        }
    }
}

/// Why a set of correspondences does not determine a usable homography.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Degeneracy {
    /// All points of one side sit on top of each other.
    CoincidentPoints { set: PointSet },
    /// Three points of one side lie on a line (indices into the input).
    Collinear { set: PointSet, triple: [usize; 3] },
    /// The linear system has more than a one-dimensional null space.
    Underdetermined,
    /// The estimated matrix has rank < 3.
    Singular,
}

impl fmt::Display for Degeneracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degeneracy::CoincidentPoints { set } => write!(f, "all {set} points coincide"),
            Degeneracy::Collinear { set, triple } => write!(
                f,
                "{set} points {}, {}, {} are collinear",
                triple[0], triple[1], triple[2]
            ),
            Degeneracy::Underdetermined => write!(f, "linear system is rank deficient"),
            Degeneracy::Singular => write!(f, "homography is singular"),
        }
    }
}

/// Errors returned by the homography estimator.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EstimationError {
    #[error("need at least 4 correspondences (got {got})")]
    NotEnoughPoints { got: usize },
    #[error("source/target length mismatch ({src} vs {dst})")]
    LengthMismatch { src: usize, dst: usize },
    #[error("degenerate configuration: {0}")]
    Degenerate(Degeneracy),
    #[error("singular value decomposition did not produce a solution")]
    SolverFailed,
}

/// Errors returned by the point mapper.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum MappingError {
    #[error("point ({x}, {y}) projects to infinity (w = {w:e})")]
    DegenerateProjection { x: f64, y: f64, w: f64 },
}

/// Planar projective transform, `target ~ H * source` in homogeneous coordinates.
///
/// Defined up to a non-zero scale: do not compare entries directly.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    #[inline]
    pub fn determinant(&self) -> f64 {
        self.h.determinant()
    }

    /// Map `p` and divide by the homogeneous coordinate.
    #[inline]
    pub fn map(&self, p: Point2D) -> Result<Point2D, MappingError> {
        let v = self.h * p.homogeneous();
        let w = v[2];
        let norm = v.norm();
        if !(norm.is_finite() && w.abs() > PROJECTION_EPS * norm) {
            return Err(MappingError::DegenerateProjection { x: p.x, y: p.y, w });
        }
        Ok(Point2D::new(v[0] / w, v[1] / w))
    }

    /// Like [`Homography::map`], but folds the failure into the `valid` flag.
    pub fn project(&self, index: usize, p: Point2D) -> MappedPoint {
        match self.map(p) {
            Ok(target) => MappedPoint {
                index,
                source: p,
                target,
                valid: true,
            },
            Err(_) => MappedPoint {
                index,
                source: p,
                target: Point2D::new(f64::NAN, f64::NAN),
                valid: false,
            },
        }
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    /// Distance between `H * source` and `target` per correspondence.
    ///
    /// Correspondences whose source projects to infinity report `f64::INFINITY`.
    pub fn reprojection_errors(&self, correspondences: &[Correspondence]) -> Vec<f64> {
        correspondences
            .iter()
            .map(|c| {
                self.map(c.source)
                    .map(|p| p.distance(&c.target))
                    .unwrap_or(f64::INFINITY)
            })
            .collect()
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = (2.0_f64).sqrt() / mean_dist;
    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

/// Translate the centroid to the origin and scale so the mean distance is sqrt(2).
fn normalize_points(
    pts: &[Point2D],
    set: PointSet,
) -> Result<(Vec<Point2D>, Matrix3<f64>), Degeneracy> {
    let n = pts.len() as f64;
    let (sx, sy) = pts.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let (cx, cy) = (sx / n, sy / n);

    let mean_dist = pts.iter().map(|p| (p.x - cx).hypot(p.y - cy)).sum::<f64>() / n;
    if !(mean_dist.is_finite() && mean_dist > 1e-12) {
        return Err(Degeneracy::CoincidentPoints { set });
    }

    let t = hartley_normalization(cx, cy, mean_dist);
    let out = pts
        .iter()
        .map(|p| {
            let v = t * p.homogeneous();
            Point2D::new(v[0], v[1])
        })
        .collect();
    Ok((out, t))
}

/// Reject minimal sets where any three points are collinear.
fn check_no_collinear_triple(pts: &[Point2D], set: PointSet) -> Result<(), Degeneracy> {
    let n = pts.len();
    for i in 0..n {
        for j in i + 1..n {
            for k in j + 1..n {
                if signed_area2(&pts[i], &pts[j], &pts[k]).abs() < COLLINEAR_TOL {
                    return Err(Degeneracy::Collinear {
                        set,
                        triple: [i, j, k],
                    });
                }
            }
        }
    }
    Ok(())
}

/// Estimate `H` from exactly four correspondences (the calibration quota).
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip(correspondences)))]
pub fn estimate_homography(
    correspondences: &[Correspondence; CORRESPONDENCE_QUOTA],
) -> Result<Homography, EstimationError> {
    let src: Vec<Point2D> = correspondences.iter().map(|c| c.source).collect();
    let dst: Vec<Point2D> = correspondences.iter().map(|c| c.target).collect();
    estimate_homography_dlt(&src, &dst)
}

/// Normalized DLT: estimate `H` such that `dst ~ H * src` from n >= 4 pairs.
///
/// With exactly four pairs every 3-point subset of either side must span a
/// triangle; with more pairs the fit is least-squares and degeneracy is
/// detected from the rank of the linear system.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(src, dst), fields(n = src.len()))
)]
pub fn estimate_homography_dlt(
    src: &[Point2D],
    dst: &[Point2D],
) -> Result<Homography, EstimationError> {
    if src.len() != dst.len() {
        return Err(EstimationError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    if src.len() < CORRESPONDENCE_QUOTA {
        return Err(EstimationError::NotEnoughPoints { got: src.len() });
    }

    let degenerate = |d: Degeneracy| {
        warn!("homography estimation rejected: {d}");
        EstimationError::Degenerate(d)
    };

    let (s, t_src) = normalize_points(src, PointSet::Source).map_err(degenerate)?;
    let (d, t_dst) = normalize_points(dst, PointSet::Target).map_err(degenerate)?;

    if src.len() == CORRESPONDENCE_QUOTA {
        check_no_collinear_triple(&s, PointSet::Source).map_err(degenerate)?;
        check_no_collinear_triple(&d, PointSet::Target).map_err(degenerate)?;
    }

    // Build A (2N x 9), zero-padded to at least 9 rows so the SVD yields a full V.
    let n = src.len();
    let rows = (2 * n).max(9);
    let mut a = DMatrix::<f64>::zeros(rows, 9);

    for k in 0..n {
        let x = s[k].x;
        let y = s[k].y;
        let u = d[k].x;
        let v = d[k].y;

        // [ -x -y -1   0  0  0   u*x u*y u ]
        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        // [ 0  0  0  -x -y -1   v*x v*y v ]
        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    // Ah = 0: h is the right singular vector of the smallest singular value.
    let svd = a.svd(false, true);
    let vt = svd.v_t.ok_or(EstimationError::SolverFailed)?;
    let sv = &svd.singular_values;
    let min_idx = sv.imin();

    let mut sorted: Vec<f64> = sv.iter().copied().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let largest = sorted.last().copied().unwrap_or(0.0);
    if !(largest > 0.0) || sorted[1] / largest < RANK_TOL {
        return Err(degenerate(Degeneracy::Underdetermined));
    }

    let h = vt.row(min_idx);
    let hn =
        Matrix3::<f64>::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);

    let fro = hn.norm();
    if hn.determinant().abs() < SINGULAR_TOL * fro * fro * fro {
        return Err(degenerate(Degeneracy::Singular));
    }

    // Denormalize: H = T_dst^{-1} * Hn * T_src
    let t_dst_inv = t_dst.try_inverse().ok_or(EstimationError::SolverFailed)?;
    let mut h_den = t_dst_inv * hn * t_src;

    let norm = h_den.norm();
    if !(norm.is_finite() && norm > 0.0) {
        return Err(EstimationError::SolverFailed);
    }
    h_den /= norm;

    // Pick the sign that keeps the calibration points in front (w > 0).
    let w_sum: f64 = src.iter().map(|p| (h_den * p.homogeneous())[2]).sum();
    if w_sum < 0.0 {
        h_den = -h_den;
    }

    let out = Homography::new(h_den);
    if out.inverse().is_none() {
        return Err(degenerate(Degeneracy::Singular));
    }

    debug!(
        "estimated homography from {n} pairs (sigma_min={:.3e}, det={:.3e})",
        sv[min_idx],
        out.determinant()
    );
    Ok(out)
}
