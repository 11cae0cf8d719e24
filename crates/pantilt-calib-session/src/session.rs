//! Calibration state machine.
//!
//! A [`CalibrationSession`] owns everything a calibrate -> stream -> reset
//! cycle needs: the collected correspondences, the estimated homography, the
//! contour animator and the emitted marker trail. Every operation is a
//! method returning the new [`SessionState`]; side information lands in an
//! event log drained with [`CalibrationSession::take_events`].

use crate::animator::{Step, StreamAnimator};
use crate::collector::CorrespondenceCollector;
use crate::SessionError;
use log::{debug, info, warn};
use pantilt_calib_core::{
    estimate_homography, Correspondence, EstimationError, Homography, MappedPoint, Point2D,
    CORRESPONDENCE_QUOTA,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Externally visible lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Waiting for correspondences.
    Collecting,
    /// Homography available, stream paused.
    Calibrated,
    /// Homography available, stream running (possibly exhausted).
    Streaming,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Collecting => write!(f, "collecting"),
            Phase::Calibrated => write!(f, "calibrated"),
            Phase::Streaming => write!(f, "streaming"),
        }
    }
}

/// Session operations, used to report which call was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Submit,
    UndoLast,
    RetryEstimation,
    Advance,
    Pause,
    Resume,
    MapPoint,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Submit => "submit",
            Operation::UndoLast => "undo_last",
            Operation::RetryEstimation => "retry_estimation",
            Operation::Advance => "advance",
            Operation::Pause => "pause",
            Operation::Resume => "resume",
            Operation::MapPoint => "map_point",
        };
        f.write_str(name)
    }
}

/// Snapshot of the session for UI reflection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub phase: Phase,
    /// Correspondences collected so far.
    pub correspondences: usize,
    pub quota: usize,
    /// Index of the next contour point.
    pub cursor: usize,
    pub contour_len: usize,
    pub emitted: usize,
    pub skipped: usize,
    pub exhausted: bool,
}

/// Things that happened inside the session, in order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    CorrespondenceAdded {
        index: usize,
        correspondence: Correspondence,
    },
    CorrespondenceRemoved {
        index: usize,
    },
    Calibrated {
        homography: Homography,
        max_residual: f64,
    },
    CalibrationFailed {
        error: EstimationError,
    },
    StreamPaused,
    StreamResumed,
    PointSkipped {
        index: usize,
        source: Point2D,
    },
    StreamExhausted {
        emitted: usize,
        skipped: usize,
    },
    Reset,
}

/// Options fixed for the lifetime of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Minimum time between two emitted points.
    pub emission_interval: Duration,
    /// Enter `Calibrated` (paused) instead of `Streaming` after calibration.
    pub start_paused: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            emission_interval: Duration::from_millis(16),
            start_paused: false,
        }
    }
}

#[derive(Clone, Debug)]
enum Stage {
    Collecting,
    Ready {
        homography: Homography,
        streaming: bool,
    },
}

/// The single live calibration session.
#[derive(Clone, Debug)]
pub struct CalibrationSession {
    options: SessionOptions,
    collector: CorrespondenceCollector,
    stage: Stage,
    animator: StreamAnimator,
    trail: Vec<MappedPoint>,
    events: Vec<SessionEvent>,
}

impl CalibrationSession {
    /// Create a session over a contour sequence, which it consumes once.
    pub fn new(contour: Vec<Point2D>, options: SessionOptions) -> Self {
        Self {
            options,
            collector: CorrespondenceCollector::new(),
            stage: Stage::Collecting,
            animator: StreamAnimator::new(contour, options.emission_interval),
            trail: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        match self.stage {
            Stage::Collecting => Phase::Collecting,
            Stage::Ready {
                streaming: false, ..
            } => Phase::Calibrated,
            Stage::Ready {
                streaming: true, ..
            } => Phase::Streaming,
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            phase: self.phase(),
            correspondences: self.collector.len(),
            quota: CORRESPONDENCE_QUOTA,
            cursor: self.animator.cursor(),
            contour_len: self.animator.len(),
            emitted: self.animator.emitted(),
            skipped: self.animator.skipped(),
            exhausted: self.animator.is_exhausted(),
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn correspondences(&self) -> &[Correspondence] {
        self.collector.as_slice()
    }

    /// Current homography; `None` while collecting.
    pub fn homography(&self) -> Option<&Homography> {
        match &self.stage {
            Stage::Collecting => None,
            Stage::Ready { homography, .. } => Some(homography),
        }
    }

    /// Points emitted since the last calibration, oldest first.
    pub fn trail(&self) -> &[MappedPoint] {
        &self.trail
    }

    pub fn contour(&self) -> &[Point2D] {
        self.animator.contour()
    }

    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    /// Drain the event log.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    fn require_collecting(&self, op: Operation) -> Result<(), SessionError> {
        match self.stage {
            Stage::Collecting => Ok(()),
            Stage::Ready { .. } => Err(SessionError::WrongPhase {
                op,
                phase: self.phase(),
            }),
        }
    }

    /// Add one correspondence. The fourth one triggers estimation.
    ///
    /// On a degenerate estimate the session stays in `Collecting` with all
    /// four pairs kept; use [`undo_last`](Self::undo_last) to replace one or
    /// [`reset`](Self::reset) to start over.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn submit(&mut self, source: Point2D, target: Point2D) -> Result<SessionState, SessionError> {
        self.require_collecting(Operation::Submit)?;
        let pair = Correspondence::new(source, target)?;
        let index = self.collector.push(pair)?;
        debug!(
            "correspondence {}/{}: ({:.2}, {:.2}) -> ({:.2}, {:.2})",
            index + 1,
            CORRESPONDENCE_QUOTA,
            source.x,
            source.y,
            target.x,
            target.y
        );
        self.events.push(SessionEvent::CorrespondenceAdded {
            index,
            correspondence: pair,
        });

        if self.collector.is_complete() {
            self.calibrate()?;
        }
        Ok(self.state())
    }

    /// Drop the most recent correspondence.
    pub fn undo_last(&mut self) -> Result<SessionState, SessionError> {
        self.require_collecting(Operation::UndoLast)?;
        self.collector.pop().ok_or(SessionError::NothingToUndo)?;
        let index = self.collector.len();
        debug!("correspondence {} removed", index + 1);
        self.events
            .push(SessionEvent::CorrespondenceRemoved { index });
        Ok(self.state())
    }

    /// Re-run estimation on a complete set after a failure.
    pub fn retry_estimation(&mut self) -> Result<SessionState, SessionError> {
        self.require_collecting(Operation::RetryEstimation)?;
        if !self.collector.is_complete() {
            return Err(SessionError::Incomplete {
                have: self.collector.len(),
                quota: CORRESPONDENCE_QUOTA,
            });
        }
        self.calibrate()?;
        Ok(self.state())
    }

    fn calibrate(&mut self) -> Result<(), SessionError> {
        let Some(pairs) = self.collector.as_quota() else {
            return Err(SessionError::Incomplete {
                have: self.collector.len(),
                quota: CORRESPONDENCE_QUOTA,
            });
        };

        let homography = match estimate_homography(pairs) {
            Ok(h) => h,
            Err(error) => {
                warn!("calibration failed, keeping {CORRESPONDENCE_QUOTA} correspondences: {error}");
                self.events.push(SessionEvent::CalibrationFailed { error });
                return Err(error.into());
            }
        };

        let max_residual = homography
            .reprojection_errors(pairs)
            .into_iter()
            .fold(0.0_f64, f64::max);
        info!("calibrated (max residual {max_residual:.3e})");

        self.animator.rewind();
        self.trail.clear();
        self.stage = Stage::Ready {
            homography,
            streaming: !self.options.start_paused,
        };
        self.events.push(SessionEvent::Calibrated {
            homography,
            max_residual,
        });
        Ok(())
    }

    /// Stop emitting without losing the cursor.
    pub fn pause(&mut self) -> Result<SessionState, SessionError> {
        self.set_streaming(Operation::Pause, false)
    }

    /// Continue emitting from the cursor.
    pub fn resume(&mut self) -> Result<SessionState, SessionError> {
        self.set_streaming(Operation::Resume, true)
    }

    fn set_streaming(&mut self, op: Operation, run: bool) -> Result<SessionState, SessionError> {
        let phase = self.phase();
        match &mut self.stage {
            Stage::Ready { streaming, .. } if *streaming != run => {
                *streaming = run;
            }
            _ => return Err(SessionError::WrongPhase { op, phase }),
        }
        debug!("stream {}", if run { "resumed" } else { "paused" });
        self.events.push(if run {
            SessionEvent::StreamResumed
        } else {
            SessionEvent::StreamPaused
        });
        Ok(self.state())
    }

    /// One scheduling tick: emit at most one mapped contour point.
    ///
    /// Returns `Ok(None)` when throttled, paused or exhausted, or when the
    /// tick only passed over degenerate points. Use [`step`](Self::step) to
    /// tell those cases apart.
    pub fn advance(&mut self, now: Instant) -> Result<Option<MappedPoint>, SessionError> {
        self.step(now).map(|step| step.emitted)
    }

    /// Like [`advance`](Self::advance), but returns the full [`Step`]: the
    /// emitted point, the points skipped because they project to infinity,
    /// and whether the throttle refused the tick.
    ///
    /// Paused and exhausted sessions return an empty, unthrottled `Step`.
    /// Skipped points are also logged as [`SessionEvent::PointSkipped`].
    pub fn step(&mut self, now: Instant) -> Result<Step, SessionError> {
        let (homography, streaming) = match &self.stage {
            Stage::Collecting => {
                return Err(SessionError::WrongPhase {
                    op: Operation::Advance,
                    phase: Phase::Collecting,
                })
            }
            Stage::Ready {
                homography,
                streaming,
            } => (*homography, *streaming),
        };
        if !streaming || self.animator.is_exhausted() {
            return Ok(Step::default());
        }

        let step = self.animator.advance(&homography, now);
        for skipped in &step.skipped {
            warn!(
                "contour point {} ({:.1}, {:.1}) projects to infinity, skipped",
                skipped.index, skipped.source.x, skipped.source.y
            );
            self.events.push(SessionEvent::PointSkipped {
                index: skipped.index,
                source: skipped.source,
            });
        }
        if let Some(point) = step.emitted {
            self.trail.push(point);
        }
        // Exhausted calls return early above, so this fires once per pass.
        if self.animator.is_exhausted() {
            self.finish_stream();
        }
        Ok(step)
    }

    fn finish_stream(&mut self) {
        let emitted = self.animator.emitted();
        let skipped = self.animator.skipped();
        info!("contour exhausted ({emitted} emitted, {skipped} skipped)");
        self.events
            .push(SessionEvent::StreamExhausted { emitted, skipped });
    }

    /// Map an arbitrary point through the current homography.
    pub fn map_point(&self, p: Point2D) -> Result<Point2D, SessionError> {
        let homography = self.homography().ok_or(SessionError::WrongPhase {
            op: Operation::MapPoint,
            phase: Phase::Collecting,
        })?;
        Ok(homography.map(p)?)
    }

    /// Return to `Collecting` with no correspondences, homography or trail.
    ///
    /// The contour is kept and rewound. Undrained events are dropped; the
    /// new log starts with a single [`SessionEvent::Reset`]. Valid in every
    /// phase.
    pub fn reset(&mut self) -> SessionState {
        let mut animator = std::mem::replace(
            &mut self.animator,
            StreamAnimator::new(Vec::new(), self.options.emission_interval),
        );
        animator.rewind();

        *self = Self {
            options: self.options,
            collector: CorrespondenceCollector::new(),
            stage: Stage::Collecting,
            animator,
            trail: Vec::new(),
            events: vec![SessionEvent::Reset],
        };
        debug!("session reset");
        self.state()
    }
}
