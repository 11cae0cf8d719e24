//! Contour sources: where the replayed point sequence comes from.

use pantilt_calib_core::Point2D;

#[cfg(feature = "image")]
pub use image_source::{extract_contour_points, ContourError, ImageContourSource};

/// A finite, ordered sequence of image points that can be read exactly once.
pub trait ContourSource {
    type Error;

    /// Consume the source and return its points, front to back.
    fn into_points(self) -> Result<Vec<Point2D>, Self::Error>;
}

impl ContourSource for Vec<Point2D> {
    type Error = std::convert::Infallible;

    fn into_points(self) -> Result<Vec<Point2D>, Self::Error> {
        Ok(self)
    }
}

/// Keep only the end points of straight horizontal, vertical and diagonal runs.
pub fn compress_runs(points: &[(i64, i64)]) -> Vec<(i64, i64)> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let step = |a: (i64, i64), b: (i64, i64)| ((b.0 - a.0).signum(), (b.1 - a.1).signum());

    let mut out = Vec::with_capacity(points.len());
    out.push(points[0]);
    for w in points.windows(3) {
        if step(w[0], w[1]) != step(w[1], w[2]) {
            out.push(w[1]);
        }
    }
    out.push(points[points.len() - 1]);
    out
}

#[cfg(feature = "image")]
mod image_source {
    use super::{compress_runs, ContourSource};
    use image::{GrayImage, ImageReader};
    use imageproc::contours::{find_contours, BorderType};
    use log::debug;
    use pantilt_calib_core::Point2D;
    use pantilt_calib_session::ContourParams;
    use std::path::Path;

    #[cfg(feature = "tracing")]
    use tracing::instrument;

    #[derive(thiserror::Error, Debug)]
    pub enum ContourError {
        #[error(transparent)]
        Io(#[from] std::io::Error),
        #[error(transparent)]
        Image(#[from] image::ImageError),
    }

    /// Edge + external-contour extraction from a grayscale image.
    pub struct ImageContourSource {
        image: GrayImage,
        params: ContourParams,
    }

    impl ImageContourSource {
        pub fn new(image: GrayImage, params: ContourParams) -> Self {
            Self { image, params }
        }

        /// Load any format `image` can decode and convert it to 8-bit gray.
        pub fn open(path: impl AsRef<Path>, params: ContourParams) -> Result<Self, ContourError> {
            let image = ImageReader::open(path)?.decode()?.to_luma8();
            Ok(Self::new(image, params))
        }
    }

    impl ContourSource for ImageContourSource {
        type Error = ContourError;

        fn into_points(self) -> Result<Vec<Point2D>, ContourError> {
            Ok(extract_contour_points(&self.image, &self.params))
        }
    }

    /// Canny edges, then outer borders without a parent, concatenated in discovery order.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(image, params), fields(width = image.width(), height = image.height()))
    )]
    pub fn extract_contour_points(image: &GrayImage, params: &ContourParams) -> Vec<Point2D> {
        let edges = imageproc::edges::canny(image, params.low_threshold, params.high_threshold);
        let contours = find_contours::<u32>(&edges);

        let mut out = Vec::new();
        let mut kept = 0usize;
        for c in contours
            .iter()
            .filter(|c| c.parent.is_none() && matches!(c.border_type, BorderType::Outer))
        {
            kept += 1;
            let chain: Vec<(i64, i64)> = c
                .points
                .iter()
                .map(|p| (i64::from(p.x), i64::from(p.y)))
                .collect();
            let chain = if params.compress_runs {
                compress_runs(&chain)
            } else {
                chain
            };
            out.extend(chain.into_iter().map(|(x, y)| Point2D::new(x as f64, y as f64)));
        }
        debug!(
            "extracted {} contour points from {kept} external contours ({} total)",
            out.len(),
            contours.len()
        );
        out
    }

}
