//! Reconciling the time sequences of a field defined on both merge sides.

use std::rc::Rc;

use log::debug;

use fedof_core::{
    FieldId, MergeError, SharedTimeSequence, StorageError, TimeSequence, TimeSequenceMapping,
    TimeSequencePool,
};

use crate::config::OverlapPolicy;

/// How a source time sequence relates to the target's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeOverlap {
    /// Same times.
    Identical,
    /// The source holds every target time and more.
    Extends,
    /// Every source time is already a target time.
    Contained,
    /// No time in common.
    Disjoint,
    /// Some times in common, and neither side holds all of the other's.
    Overlapping,
}

/// Classify `source` against `target`.
pub fn classify(target: &TimeSequence, source: &TimeSequence, tolerance: f64) -> TimeOverlap {
    match TimeSequence::mapping(target, source) {
        TimeSequenceMapping::Identical => TimeOverlap::Identical,
        TimeSequenceMapping::Append => TimeOverlap::Extends,
        TimeSequenceMapping::Unknown if target.is_subset_of(source, tolerance) => TimeOverlap::Extends,
        TimeSequenceMapping::Unknown if source.is_subset_of(target, tolerance) => TimeOverlap::Contained,
        TimeSequenceMapping::Unknown => {
            if source
                .times()
                .iter()
                .any(|&t| target.index_for_time(t, tolerance).is_some())
            {
                TimeOverlap::Overlapping
            } else {
                TimeOverlap::Disjoint
            }
        }
    }
}

/// The time sequence the merged field follows.
///
/// A field defined on only one side keeps that side's sequence. When both
/// sides are time-varying the result is the union, shared through `pool`;
/// overlapping sequences are refused under [`OverlapPolicy::Conflict`]
/// unless one side holds every time of the other.
pub fn reconcile(
    field: FieldId,
    target: Option<&SharedTimeSequence>,
    source: Option<&SharedTimeSequence>,
    pool: &mut TimeSequencePool,
    policy: OverlapPolicy,
    tolerance: f64,
) -> Result<Option<SharedTimeSequence>, MergeError> {
    let (target, source) = match (target, source) {
        (None, None) => return Ok(None),
        (Some(only), None) | (None, Some(only)) => return Ok(Some(Rc::clone(only))),
        (Some(target), Some(source)) => (target, source),
    };
    let overlap = classify(target, source, tolerance);
    if overlap == TimeOverlap::Overlapping && policy == OverlapPolicy::Conflict {
        return Err(MergeError::IncompatibleTimeMapping {
            field,
            reason: format!(
                "{} source times overlap {} target times without extending them",
                source.len(),
                target.len()
            ),
        });
    }
    let merged = pool.merging(target, source).map_err(|e| time_error(field, e))?;
    debug!(
        "merge: field {field} times {:?} ({} target, {} source, {} merged)",
        overlap,
        target.len(),
        source.len(),
        merged.len()
    );
    Ok(Some(merged))
}

/// Report a storage failure while copying a field's values, naming the
/// field when it was a time mapping problem.
pub(crate) fn time_error(field: FieldId, error: StorageError) -> MergeError {
    match error {
        StorageError::IncompatibleTimeMapping { time } => MergeError::IncompatibleTimeMapping {
            field,
            reason: format!("time {time} has no slot in the merged sequence"),
        },
        other => MergeError::Storage(other),
    }
}
