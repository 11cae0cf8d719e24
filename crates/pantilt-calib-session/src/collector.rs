use crate::SessionError;
use pantilt_calib_core::{Correspondence, CORRESPONDENCE_QUOTA};

/// Accumulates correspondences one at a time up to the calibration quota.
#[derive(Clone, Debug, Default)]
pub struct CorrespondenceCollector {
    pairs: Vec<Correspondence>,
}

impl CorrespondenceCollector {
    pub fn new() -> Self {
        Self {
            pairs: Vec::with_capacity(CORRESPONDENCE_QUOTA),
        }
    }

    /// Append a pair and return its index.
    pub fn push(&mut self, pair: Correspondence) -> Result<usize, SessionError> {
        if self.is_complete() {
            return Err(SessionError::AlreadyComplete {
                quota: CORRESPONDENCE_QUOTA,
            });
        }
        self.pairs.push(pair);
        Ok(self.pairs.len() - 1)
    }

    /// Remove the most recent pair.
    pub fn pop(&mut self) -> Option<Correspondence> {
        self.pairs.pop()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.pairs.len() >= CORRESPONDENCE_QUOTA
    }

    #[inline]
    pub fn as_slice(&self) -> &[Correspondence] {
        &self.pairs
    }

    /// The full quota, once collected.
    pub fn as_quota(&self) -> Option<&[Correspondence; CORRESPONDENCE_QUOTA]> {
        self.pairs.as_slice().try_into().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pantilt_calib_core::Point2D;

    fn pair(i: usize) -> Correspondence {
        let p = Point2D::new(i as f64, 0.0);
        Correspondence {
            source: p,
            target: p,
        }
    }

    #[test]
    fn fills_up_to_quota_then_rejects() {
        let mut c = CorrespondenceCollector::new();
        for i in 0..CORRESPONDENCE_QUOTA {
            assert_eq!(c.push(pair(i)).unwrap(), i);
            assert!(c.as_quota().is_none() || i + 1 == CORRESPONDENCE_QUOTA);
        }
        assert!(c.is_complete());
        assert!(c.as_quota().is_some());
        assert_eq!(
            c.push(pair(9)),
            Err(SessionError::AlreadyComplete { quota: 4 })
        );
        assert_eq!(c.len(), CORRESPONDENCE_QUOTA);
    }

    #[test]
    fn pop_reopens_the_quota() {
        let mut c = CorrespondenceCollector::new();
        for i in 0..CORRESPONDENCE_QUOTA {
            c.push(pair(i)).unwrap();
        }
        assert_eq!(c.pop(), Some(pair(3)));
        assert!(!c.is_complete());
        assert_eq!(c.push(pair(5)).unwrap(), 3);
        assert_eq!(c.as_slice()[3], pair(5));
    }
}
