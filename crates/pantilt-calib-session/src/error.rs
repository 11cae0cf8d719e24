use crate::session::{Operation, Phase};
use pantilt_calib_core::{EstimationError, MappingError, PointError};

/// Errors returned by [`CalibrationSession`](crate::CalibrationSession) operations.
///
/// None of these are fatal: the session is left in a consistent state and
/// can keep going (or be reset).
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("{op} is not allowed while {phase}")]
    WrongPhase { op: Operation, phase: Phase },
    #[error("all {quota} correspondences are already collected")]
    AlreadyComplete { quota: usize },
    #[error("no correspondence to undo")]
    NothingToUndo,
    #[error("need {quota} correspondences to estimate (have {have})")]
    Incomplete { have: usize, quota: usize },
    #[error(transparent)]
    InvalidPoint(#[from] PointError),
    #[error("calibration failed: {0}")]
    Estimation(#[from] EstimationError),
    #[error(transparent)]
    Mapping(#[from] MappingError),
}
