//! Paced replay of a contour sequence through a homography.

use pantilt_calib_core::{Homography, MappedPoint, Point2D};
use std::time::{Duration, Instant};

/// Outcome of one [`StreamAnimator::advance`] call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Step {
    /// The point emitted by this call, if any.
    pub emitted: Option<MappedPoint>,
    /// Points passed over because they project to infinity (`valid == false`).
    pub skipped: Vec<MappedPoint>,
    /// `true` when the call was refused by the emission throttle.
    pub throttled: bool,
}

/// Walks a contour front to back, emitting at most one mapped point per call.
///
/// The cursor only moves forward; [`StreamAnimator::rewind`] is the single
/// way back to the start.
#[derive(Clone, Debug)]
pub struct StreamAnimator {
    contour: Vec<Point2D>,
    cursor: usize,
    interval: Duration,
    last_emission: Option<Instant>,
    emitted: usize,
    skipped: usize,
}

impl StreamAnimator {
    pub fn new(contour: Vec<Point2D>, interval: Duration) -> Self {
        Self {
            contour,
            cursor: 0,
            interval,
            last_emission: None,
            emitted: 0,
            skipped: 0,
        }
    }

    /// Emit the next mappable point, unless throttled or exhausted.
    ///
    /// Points whose projection is degenerate are skipped (the cursor moves
    /// past them) without counting as an emission or resetting the throttle.
    pub fn advance(&mut self, homography: &Homography, now: Instant) -> Step {
        let mut step = Step::default();
        if let Some(last) = self.last_emission {
            if now.saturating_duration_since(last) < self.interval {
                step.throttled = true;
                return step;
            }
        }

        while let Some(&source) = self.contour.get(self.cursor) {
            let mapped = homography.project(self.cursor, source);
            self.cursor += 1;
            if mapped.valid {
                self.emitted += 1;
                self.last_emission = Some(now);
                step.emitted = Some(mapped);
                break;
            }
            self.skipped += 1;
            step.skipped.push(mapped);
        }
        step
    }

    /// Move the cursor back to the first point and forget the emission history.
    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.last_emission = None;
        self.emitted = 0;
        self.skipped = 0;
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.contour.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.contour.is_empty()
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.contour.len()
    }

    #[inline]
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    #[inline]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn contour(&self) -> &[Point2D] {
        &self.contour
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(10);

    fn line(n: usize) -> Vec<Point2D> {
        (0..n).map(|i| Point2D::new(i as f64, 1.0)).collect()
    }

    #[test]
    fn throttle_holds_the_cursor() {
        let h = Homography::identity();
        let mut anim = StreamAnimator::new(line(3), TICK);
        let t0 = Instant::now();

        let first = anim.advance(&h, t0);
        assert_eq!(first.emitted.map(|p| p.index), Some(0));

        let early = anim.advance(&h, t0 + TICK / 2);
        assert!(early.throttled);
        assert!(early.emitted.is_none());
        assert_eq!(anim.cursor(), 1);

        let on_time = anim.advance(&h, t0 + TICK);
        assert_eq!(on_time.emitted.map(|p| p.index), Some(1));
    }

    #[test]
    fn zero_interval_never_throttles() {
        let h = Homography::identity();
        let mut anim = StreamAnimator::new(line(4), Duration::ZERO);
        let t0 = Instant::now();
        let got: Vec<usize> = (0..4)
            .filter_map(|_| anim.advance(&h, t0).emitted.map(|p| p.index))
            .collect();
        assert_eq!(got, vec![0, 1, 2, 3]);
        assert!(anim.is_exhausted());
    }

    #[test]
    fn degenerate_points_are_skipped_in_the_same_call() {
        // w = x - 1: the sample at x == 1 has no finite image.
        let h = Homography::from_array([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, -1.0]]);
        let mut anim = StreamAnimator::new(line(4), TICK);
        let t0 = Instant::now();

        // x == 0 maps fine.
        assert_eq!(anim.advance(&h, t0).emitted.map(|p| p.index), Some(0));

        let step = anim.advance(&h, t0 + TICK);
        assert_eq!(step.skipped.len(), 1);
        assert_eq!(step.skipped[0].index, 1);
        assert!(!step.skipped[0].valid);
        assert_eq!(step.emitted.map(|p| p.index), Some(2));
        assert_eq!(anim.skipped(), 1);
        assert_eq!(anim.emitted(), 2);
    }

    #[test]
    fn exhausted_stream_stays_empty_until_rewind() {
        let h = Homography::identity();
        let mut anim = StreamAnimator::new(line(2), TICK);
        let mut t = Instant::now();
        for _ in 0..2 {
            assert!(anim.advance(&h, t).emitted.is_some());
            t += TICK;
        }
        for _ in 0..3 {
            let step = anim.advance(&h, t);
            assert!(step.emitted.is_none() && !step.throttled);
            t += TICK;
        }
        assert!(anim.is_exhausted());

        anim.rewind();
        assert_eq!(anim.cursor(), 0);
        assert_eq!(anim.advance(&h, t).emitted.map(|p| p.index), Some(0));
    }
}
