//! Time sequences: ordered, shared lists of the times at which a
//! time-varying field stores distinct values.
//!
//! A time-sequenced value is stored as one entry per time in its
//! [`TimeSequence`]; lookups at intermediate times interpolate linearly
//! between the bracketing entries. Sequences are shared by many nodes, so
//! they are handed out as [`SharedTimeSequence`] and de-duplicated through a
//! [`TimeSequencePool`].

use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use log::trace;

use crate::error::StorageError;

/// Sequences at most this long are checked for being a subset of the other
/// side before a full sorted union is built.
const SMALL_SUBSET_COUNT: usize = 10;

/// Shared, counted handle to an immutable [`TimeSequence`].
pub type SharedTimeSequence = Rc<TimeSequence>;

/// A strictly increasing, non-empty list of times.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSequence {
    times: Box<[f64]>,
}

/// Result of locating a time within a [`TimeSequence`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeInterpolation {
    /// Index of the stored time at or below the requested time.
    pub index_one: usize,
    /// Index of the stored time at or above the requested time.
    pub index_two: usize,
    /// Fraction of the way from `index_one` to `index_two`, in `[0, 1]`.
    pub xi: f64,
    /// False if the requested time lay outside the sequence and was clamped.
    pub in_range: bool,
}

/// How a source sequence relates to a destination sequence.
///
/// Used to pick a fast path when copying time-sequenced values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeSequenceMapping {
    /// Both sequences hold exactly the same times.
    Identical,
    /// The source is a strict prefix of the destination.
    Append,
    /// No cheap mapping is known; values must be placed time by time.
    Unknown,
}

impl TimeSequence {
    /// Create a sequence from strictly increasing, finite times.
    pub fn new(times: impl Into<Vec<f64>>) -> Result<Self, StorageError> {
        let times: Vec<f64> = times.into();
        if times.is_empty() {
            return Err(StorageError::InvalidArgument {
                reason: "time sequence must contain at least one time".into(),
            });
        }
        if let Some(bad) = times.iter().find(|t| !t.is_finite()) {
            return Err(StorageError::InvalidArgument {
                reason: format!("time sequence contains non-finite time {bad}"),
            });
        }
        if let Some(w) = times.windows(2).find(|w| w[0] >= w[1]) {
            return Err(StorageError::InvalidArgument {
                reason: format!(
                    "time sequence must be strictly increasing: {} followed by {}",
                    w[0], w[1]
                ),
            });
        }
        Ok(Self {
            times: times.into_boxed_slice(),
        })
    }

    /// Create a shared sequence. Convenience for `Rc::new(TimeSequence::new(..)?)`.
    pub fn shared(times: impl Into<Vec<f64>>) -> Result<SharedTimeSequence, StorageError> {
        Self::new(times).map(Rc::new)
    }

    /// Number of times in the sequence.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Always false: sequences are non-empty by construction.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// The time at `index`, if in range.
    pub fn time(&self, index: usize) -> Option<f64> {
        self.times.get(index).copied()
    }

    /// All times, in increasing order.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Locate `time` between two stored times.
    ///
    /// Times before the first or after the last stored time are clamped to
    /// that end of the sequence with `in_range == false`.
    pub fn interpolation_for_time(&self, time: f64) -> TimeInterpolation {
        let last = self.times.len() - 1;
        if time < self.times[0] || time.is_nan() {
            return TimeInterpolation {
                index_one: 0,
                index_two: 0,
                xi: 0.0,
                in_range: false,
            };
        }
        if time > self.times[last] {
            return TimeInterpolation {
                index_one: last,
                index_two: last,
                xi: 0.0,
                in_range: false,
            };
        }
        let hi = self.times.partition_point(|&t| t < time);
        if self.times[hi] == time {
            return TimeInterpolation {
                index_one: hi,
                index_two: hi,
                xi: 0.0,
                in_range: true,
            };
        }
        let lo = hi - 1;
        let xi = (time - self.times[lo]) / (self.times[hi] - self.times[lo]);
        TimeInterpolation {
            index_one: lo,
            index_two: hi,
            xi,
            in_range: true,
        }
    }

    /// The index of the stored time equal to `time` within `tolerance`
    /// (measured in the interpolation coordinate between neighbours).
    pub fn index_for_time(&self, time: f64, tolerance: f64) -> Option<usize> {
        let interp = self.interpolation_for_time(time);
        if !interp.in_range {
            return None;
        }
        if interp.xi < tolerance {
            Some(interp.index_one)
        } else if 1.0 - tolerance < interp.xi {
            Some(interp.index_two)
        } else {
            None
        }
    }

    /// Whether every time of `self` is also a time of `other`.
    pub fn is_subset_of(&self, other: &TimeSequence, tolerance: f64) -> bool {
        self.times
            .iter()
            .all(|&t| other.index_for_time(t, tolerance).is_some())
    }

    /// Sorted union of the two sequences' times.
    ///
    /// Returns a clone of the larger sequence when the smaller one is a
    /// (short) subset of it, avoiding a full union.
    pub fn merge(a: &TimeSequence, b: &TimeSequence, tolerance: f64) -> TimeSequence {
        if a == b {
            return a.clone();
        }
        let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
        if small.len() < SMALL_SUBSET_COUNT && small.is_subset_of(large, tolerance) {
            return large.clone();
        }
        let mut merged = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.times.len() && j < b.times.len() {
            let (ta, tb) = (a.times[i], b.times[j]);
            if ta < tb {
                merged.push(ta);
                i += 1;
            } else if ta > tb {
                merged.push(tb);
                j += 1;
            } else {
                merged.push(ta);
                i += 1;
                j += 1;
            }
        }
        merged.extend_from_slice(&a.times[i..]);
        merged.extend_from_slice(&b.times[j..]);
        Self {
            times: merged.into_boxed_slice(),
        }
    }

    /// Deduce how `source` maps onto `destination`.
    pub fn mapping(source: &TimeSequence, destination: &TimeSequence) -> TimeSequenceMapping {
        let n = source.len();
        if n == destination.len() && source.times == destination.times {
            TimeSequenceMapping::Identical
        } else if n < destination.len() && source.times[..] == destination.times[..n] {
            TimeSequenceMapping::Append
        } else {
            TimeSequenceMapping::Unknown
        }
    }
}

/// Bit-exact key for de-duplicating sequences.
fn key_for(times: &[f64]) -> Vec<u64> {
    times.iter().map(|t| t.to_bits()).collect()
}

/// De-duplicating pool of shared time sequences.
///
/// The pool holds only weak references: a sequence lives as long as some
/// field definition uses it. Requests for an already-known list of times
/// return the existing shared instance, so sequence identity can be used as
/// a cheap equality test.
#[derive(Debug, Default)]
pub struct TimeSequencePool {
    entries: IndexMap<Vec<u64>, Weak<TimeSequence>>,
    tolerance: f64,
}

impl TimeSequencePool {
    /// Create an empty pool using `tolerance` for subset checks while merging.
    pub fn new(tolerance: f64) -> Self {
        Self {
            entries: IndexMap::new(),
            tolerance,
        }
    }

    /// Get the shared sequence holding exactly `times`, creating it if needed.
    pub fn matching(&mut self, times: &[f64]) -> Result<SharedTimeSequence, StorageError> {
        let key = key_for(times);
        if let Some(existing) = self.entries.get(&key).and_then(Weak::upgrade) {
            return Ok(existing);
        }
        let sequence = TimeSequence::shared(times.to_vec())?;
        trace!("time sequence pool: new sequence of {} times", sequence.len());
        self.entries.insert(key, Rc::downgrade(&sequence));
        Ok(sequence)
    }

    /// Get the shared sequence that is the union of `a` and `b`.
    pub fn merging(
        &mut self,
        a: &SharedTimeSequence,
        b: &SharedTimeSequence,
    ) -> Result<SharedTimeSequence, StorageError> {
        if Rc::ptr_eq(a, b) {
            return Ok(Rc::clone(a));
        }
        let merged = TimeSequence::merge(a, b, self.tolerance);
        if merged == **a {
            return Ok(Rc::clone(a));
        }
        if merged == **b {
            return Ok(Rc::clone(b));
        }
        self.matching(merged.times())
    }

    /// Forget sequences that are no longer referenced anywhere.
    pub fn purge(&mut self) {
        self.entries.retain(|_, weak| weak.strong_count() > 0);
    }

    /// Number of live sequences in the pool.
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Whether the pool holds no live sequences.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeConfig;
    use proptest::prelude::*;

    const TOL: f64 = TimeConfig::DEFAULT_INDEX_TOLERANCE;

    #[test]
    fn rejects_unsorted_and_empty() {
        assert!(TimeSequence::new(vec![]).is_err());
        assert!(TimeSequence::new(vec![0.0, 0.0]).is_err());
        assert!(TimeSequence::new(vec![1.0, 0.5]).is_err());
        assert!(TimeSequence::new(vec![0.0, f64::INFINITY]).is_err());
    }

    #[test]
    fn interpolation_brackets_time() {
        let ts = TimeSequence::new(vec![0.0, 1.0, 3.0]).unwrap();
        let i = ts.interpolation_for_time(2.0);
        assert_eq!((i.index_one, i.index_two), (1, 2));
        assert!((i.xi - 0.5).abs() < 1e-12);
        assert!(i.in_range);
    }

    #[test]
    fn interpolation_clamps_outside_range() {
        let ts = TimeSequence::new(vec![0.0, 1.0]).unwrap();
        let before = ts.interpolation_for_time(-1.0);
        assert_eq!((before.index_one, before.in_range), (0, false));
        let after = ts.interpolation_for_time(5.0);
        assert_eq!((after.index_two, after.in_range), (1, false));
    }

    #[test]
    fn index_for_time_uses_tolerance() {
        let ts = TimeSequence::new(vec![0.0, 1.0, 2.0]).unwrap();
        assert_eq!(ts.index_for_time(1.0, TOL), Some(1));
        assert_eq!(ts.index_for_time(1.0 + 1e-7, TOL), Some(1));
        assert_eq!(ts.index_for_time(1.5, TOL), None);
        assert_eq!(ts.index_for_time(3.0, TOL), None);
    }

    #[test]
    fn mapping_detects_identical_and_append() {
        let a = TimeSequence::new(vec![0.0, 1.0]).unwrap();
        let b = TimeSequence::new(vec![0.0, 1.0, 2.0]).unwrap();
        let c = TimeSequence::new(vec![0.5, 1.0, 2.0]).unwrap();
        assert_eq!(TimeSequence::mapping(&a, &a), TimeSequenceMapping::Identical);
        assert_eq!(TimeSequence::mapping(&a, &b), TimeSequenceMapping::Append);
        assert_eq!(TimeSequence::mapping(&b, &a), TimeSequenceMapping::Unknown);
        assert_eq!(TimeSequence::mapping(&a, &c), TimeSequenceMapping::Unknown);
    }

    #[test]
    fn merge_interleaves() {
        let a = TimeSequence::new(vec![0.0, 2.0, 4.0]).unwrap();
        let b = TimeSequence::new(vec![1.0, 2.0, 5.0]).unwrap();
        let m = TimeSequence::merge(&a, &b, TOL);
        assert_eq!(m.times(), &[0.0, 1.0, 2.0, 4.0, 5.0]);
    }

    #[test]
    fn pool_deduplicates_and_purges() {
        let mut pool = TimeSequencePool::new(TOL);
        let a = pool.matching(&[0.0, 1.0]).unwrap();
        let b = pool.matching(&[0.0, 1.0]).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(pool.len(), 1);
        drop(a);
        drop(b);
        assert_eq!(pool.len(), 0);
        pool.purge();
        assert!(pool.is_empty());
    }

    #[test]
    fn pool_merging_returns_superset_instance() {
        let mut pool = TimeSequencePool::new(TOL);
        let short = pool.matching(&[0.0, 1.0]).unwrap();
        let long = pool.matching(&[0.0, 1.0, 2.0]).unwrap();
        let merged = pool.merging(&short, &long).unwrap();
        assert!(Rc::ptr_eq(&merged, &long));
    }

    fn arb_sequence() -> impl Strategy<Value = TimeSequence> {
        prop::collection::btree_set(0i32..200, 1..24).prop_map(|set| {
            TimeSequence::new(set.into_iter().map(|t| t as f64 * 0.25).collect::<Vec<_>>())
                .unwrap()
        })
    }

    proptest! {
        #[test]
        fn merge_commutative(a in arb_sequence(), b in arb_sequence()) {
            prop_assert_eq!(TimeSequence::merge(&a, &b, TOL), TimeSequence::merge(&b, &a, TOL));
        }

        #[test]
        fn merge_contains_both(a in arb_sequence(), b in arb_sequence()) {
            let m = TimeSequence::merge(&a, &b, TOL);
            prop_assert!(a.is_subset_of(&m, TOL));
            prop_assert!(b.is_subset_of(&m, TOL));
            prop_assert!(m.len() <= a.len() + b.len());
        }

        #[test]
        fn merge_idempotent(a in arb_sequence()) {
            prop_assert_eq!(TimeSequence::merge(&a, &a, TOL), a.clone());
        }

        #[test]
        fn every_stored_time_has_its_index(a in arb_sequence()) {
            for (i, &t) in a.times().iter().enumerate() {
                prop_assert_eq!(a.index_for_time(t, TOL), Some(i));
            }
        }
    }
}
