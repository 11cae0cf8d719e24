//! Offline calibration + replay against the reference gimbal model.
//!
//! The operator's four clicks come from the config, their angular targets from
//! [`LinearGimbalModel`], and the animator runs against a simulated clock that
//! moves by exactly one emission interval per tick.

use log::{info, warn};
use pantilt_calib_core::{Correspondence, Homography, MappedPoint, Point2D};
use pantilt_calib_session::{CalibrationConfig, CalibrationSession, Phase};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Instant};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Config(#[from] pantilt_calib_session::ConfigIoError),
    #[cfg(feature = "image")]
    #[error(transparent)]
    Contour(#[from] crate::contour::ContourError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Outcome of one replay run. Serialized as the CLI's output file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayReport {
    pub image_path: String,
    pub contour_len: usize,
    pub correspondences: Vec<Correspondence>,
    pub homography: Option<Homography>,
    /// `|H * source - target|` for each calibration pair.
    pub calibration_residuals: Vec<f64>,
    pub emitted: Vec<MappedPoint>,
    pub skipped: usize,
    pub ticks: usize,
    pub exhausted: bool,
    /// Largest distance, in degrees, between an emitted target and the
    /// reference model's angles for the same source.
    pub max_model_deviation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReplayReport {
    fn new(cfg: &CalibrationConfig, contour_len: usize) -> Self {
        Self {
            image_path: cfg.image_path.clone(),
            contour_len,
            correspondences: Vec::new(),
            homography: None,
            calibration_residuals: Vec::new(),
            emitted: Vec::new(),
            skipped: 0,
            ticks: 0,
            exhausted: false,
            max_model_deviation: None,
            error: None,
        }
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ReplayError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Calibrate from the config and stream `contour` until it is exhausted or
/// `max_ticks` scheduling ticks have passed.
///
/// Calibration failures are recorded in [`ReplayReport::error`] rather than
/// returned, so a report is always produced.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(cfg, contour), fields(points = contour.len()))
)]
pub fn run_replay(
    cfg: &CalibrationConfig,
    contour: Vec<Point2D>,
    max_ticks: Option<usize>,
) -> ReplayReport {
    let mut report = ReplayReport::new(cfg, contour.len());
    let model = cfg.gimbal_model();
    let mut session = CalibrationSession::new(contour, cfg.session_options());

    for p in cfg.calibration_points() {
        let c = model.correspondence(p);
        if let Err(e) = session.submit(c.source, c.target) {
            warn!("calibration point ({:.1}, {:.1}) rejected: {e}", p.x, p.y);
            report.correspondences = session.correspondences().to_vec();
            report.error = Some(e.to_string());
            return report;
        }
    }
    report.correspondences = session.correspondences().to_vec();

    let Some(homography) = session.homography().copied() else {
        report.error = Some("calibration did not produce a homography".to_string());
        return report;
    };
    report.homography = Some(homography);
    report.calibration_residuals = homography.reprojection_errors(&report.correspondences);

    if session.phase() == Phase::Calibrated {
        info!("session starts paused, resuming for replay");
        if let Err(e) = session.resume() {
            report.error = Some(e.to_string());
            return report;
        }
    }

    let interval = cfg.emission_interval();
    let cap = max_ticks.unwrap_or(usize::MAX);
    let mut now = Instant::now();
    while report.ticks < cap && !session.state().exhausted {
        match session.step(now) {
            Ok(step) => {
                report.skipped += step.skipped.len();
                report.emitted.extend(step.emitted);
            }
            Err(e) => {
                report.error = Some(e.to_string());
                break;
            }
        }
        report.ticks += 1;
        match now.checked_add(interval) {
            Some(next) => now = next,
            None => {
                warn!("emission interval {interval:?} overflows the replay clock");
                report.error = Some(format!(
                    "emission interval of {} ms overflows the replay clock after {} ticks",
                    cfg.emission_interval_ms, report.ticks
                ));
                break;
            }
        }
    }

    report.exhausted = session.state().exhausted;
    report.max_model_deviation = report
        .emitted
        .iter()
        .map(|p| p.target.distance(&model.angles_for(p.source)))
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |m| m.max(d))));

    info!(
        "replay finished after {} ticks: {} emitted, {} skipped",
        report.ticks,
        report.emitted.len(),
        report.skipped
    );
    report
}

/// Load the contour named by the config and replay it.
#[cfg(feature = "image")]
pub fn replay_config(
    cfg: &CalibrationConfig,
    max_ticks: Option<usize>,
) -> Result<ReplayReport, ReplayError> {
    use crate::contour::{ContourSource, ImageContourSource};

    let contour = ImageContourSource::open(&cfg.image_path, cfg.contour)?.into_points()?;
    if contour.is_empty() {
        warn!("no external contour found in {}", cfg.image_path);
    }
    Ok(run_replay(cfg, contour, max_ticks))
}
