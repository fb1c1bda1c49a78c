//! Deep copies between value blocks, including conversion between time
//! sequences.
//!
//! Copying a time-sequenced value into a destination that follows another
//! sequence picks the cheapest mapping available:
//!
//! - identical sequences copy the per-time array wholesale;
//! - a source that is a prefix of the destination fills the leading slots;
//! - otherwise every source time is looked up in the destination and the
//!   copy fails with [`StorageError::IncompatibleTimeMapping`] if one has no
//!   slot.
//!
//! Destination slots not covered by a source time keep their current
//! values, so copying target values and then source values into one merged
//! region overlays the source on the target.

use fedof_core::{StorageError, TimeSequence, TimeSequenceMapping, ValueType};
use log::debug;

use crate::block::ValueBlock;
use crate::cell::ValueCell;
use crate::scalar::Scalars;
use crate::tracked::Tracked;

/// A run of values within a block: where it starts and which time sequence
/// (if any) its values follow.
#[derive(Clone, Copy, Debug, Default)]
pub struct ValueRegion<'a> {
    /// Offset of the first value.
    pub offset: usize,
    /// Time sequence of time-sequenced values, `None` otherwise.
    pub time_sequence: Option<&'a TimeSequence>,
}

impl<'a> ValueRegion<'a> {
    /// A region of values without time sequencing.
    pub fn new(offset: usize) -> Self {
        Self {
            offset,
            time_sequence: None,
        }
    }

    /// A region of time-sequenced values.
    pub fn timed(offset: usize, time_sequence: &'a TimeSequence) -> Self {
        Self {
            offset,
            time_sequence: Some(time_sequence),
        }
    }
}

fn released(offset: usize) -> StorageError {
    StorageError::InvalidArgument {
        reason: format!("time series at offset {offset} has been released"),
    }
}

struct Conversion<'a> {
    value_type: ValueType,
    source: Option<&'a TimeSequence>,
    destination: Option<&'a TimeSequence>,
    mapping: TimeSequenceMapping,
    tolerance: f64,
}

impl Conversion<'_> {
    fn convert(&self, offset: usize, src: &ValueCell, dest: &ValueCell) -> Result<ValueCell, StorageError> {
        src.check(self.value_type, self.source.is_some())?;
        dest.check(self.value_type, self.destination.is_some())?;
        match (self.source, self.destination) {
            (None, None) => Ok(src.clone()),
            (Some(source), Some(destination)) => {
                let ValueCell::TimeSeries {
                    values: Some(src_values),
                    ..
                } = src
                else {
                    return Err(released(offset));
                };
                if self.mapping == TimeSequenceMapping::Identical {
                    return Ok(src.clone());
                }
                let mut merged = match dest {
                    ValueCell::TimeSeries {
                        values: Some(existing),
                        ..
                    } if existing.len() == destination.len() => Scalars::clone(existing),
                    _ => Scalars::zeros(self.value_type, destination.len())?,
                };
                for (index, &time) in source.times().iter().enumerate() {
                    let slot = match self.mapping {
                        TimeSequenceMapping::Append => index,
                        _ => destination
                            .index_for_time(time, self.tolerance)
                            .ok_or(StorageError::IncompatibleTimeMapping { time })?,
                    };
                    let value = src_values.get(index).ok_or(StorageError::OffsetOutOfRange {
                        offset: index,
                        len: src_values.len(),
                    })?;
                    merged.set(slot, value)?;
                }
                Ok(ValueCell::TimeSeries {
                    value_type: self.value_type,
                    values: Some(Tracked::new(merged)),
                })
            }
            (None, Some(destination)) => {
                let value = src.as_scalar().ok_or_else(|| src.mismatch(self.value_type))?;
                let mut broadcast = Scalars::zeros(self.value_type, destination.len())?;
                for slot in 0..destination.len() {
                    broadcast.set(slot, value)?;
                }
                Ok(ValueCell::TimeSeries {
                    value_type: self.value_type,
                    values: Some(Tracked::new(broadcast)),
                })
            }
            (Some(source), None) => {
                if let Some(time) = source.time(1) {
                    return Err(StorageError::IncompatibleTimeMapping { time });
                }
                let ValueCell::TimeSeries {
                    values: Some(src_values),
                    ..
                } = src
                else {
                    return Err(released(offset));
                };
                let value = src_values.get(0).ok_or(StorageError::OffsetOutOfRange {
                    offset: 0,
                    len: 0,
                })?;
                Ok(ValueCell::from_scalar(value))
            }
        }
    }

    fn convert_all(&self, src: &[ValueCell], dest: &[ValueCell], offset: usize) -> Result<Vec<ValueCell>, StorageError> {
        let mut cells = Vec::new();
        cells
            .try_reserve_exact(src.len())
            .map_err(|_| StorageError::OutOfMemory {
                requested: src.len() * crate::size(self.value_type, self.destination.is_some()),
            })?;
        for (i, (s, d)) in src.iter().zip(dest).enumerate() {
            cells.push(self.convert(offset + i, s, d)?);
        }
        Ok(cells)
    }
}

fn mapping_for(source: Option<&TimeSequence>, destination: Option<&TimeSequence>) -> TimeSequenceMapping {
    match (source, destination) {
        (Some(source), Some(destination)) => {
            let mapping = TimeSequence::mapping(source, destination);
            if mapping == TimeSequenceMapping::Unknown {
                debug!(
                    "copying {} times onto {} times without a prefix mapping; placing each time",
                    source.len(),
                    destination.len()
                );
            }
            mapping
        }
        _ => TimeSequenceMapping::Unknown,
    }
}

impl ValueBlock {
    /// Deep-copy `count` values of `value_type` from `source_block` into
    /// this block.
    ///
    /// Strings and arrays are duplicated and element references are
    /// re-referenced; the destination's previous values are released. When
    /// the regions follow different time sequences, values are placed by
    /// time (see the module docs). A non-time source fills every time of a
    /// time-sequenced destination; a time-sequenced source can only fill a
    /// non-time destination if it holds a single time.
    ///
    /// All values are converted before any is written: on failure this block
    /// is unchanged.
    pub fn copy_values(
        &mut self,
        dest: ValueRegion<'_>,
        source_block: &ValueBlock,
        source: ValueRegion<'_>,
        value_type: ValueType,
        count: usize,
        tolerance: f64,
    ) -> Result<(), StorageError> {
        let mapping = mapping_for(source.time_sequence, dest.time_sequence);
        self.copy_mapped(dest, source_block, source, value_type, count, tolerance, mapping)
    }

    /// As [`copy_values`](Self::copy_values), but every source time is
    /// placed by looking it up in the destination sequence, even where the
    /// sequences are identical or one is a prefix of the other.
    pub fn copy_values_by_time(
        &mut self,
        dest: ValueRegion<'_>,
        source_block: &ValueBlock,
        source: ValueRegion<'_>,
        value_type: ValueType,
        count: usize,
        tolerance: f64,
    ) -> Result<(), StorageError> {
        let mapping = TimeSequenceMapping::Unknown;
        self.copy_mapped(dest, source_block, source, value_type, count, tolerance, mapping)
    }

    #[allow(clippy::too_many_arguments)]
    fn copy_mapped(
        &mut self,
        dest: ValueRegion<'_>,
        source_block: &ValueBlock,
        source: ValueRegion<'_>,
        value_type: ValueType,
        count: usize,
        tolerance: f64,
        mapping: TimeSequenceMapping,
    ) -> Result<(), StorageError> {
        let conversion = Conversion {
            value_type,
            source: source.time_sequence,
            destination: dest.time_sequence,
            mapping,
            tolerance,
        };
        let src_cells = source_block.region(source.offset, count)?;
        let dest_cells = self.region(dest.offset, count)?;
        let cells = conversion.convert_all(src_cells, dest_cells, source.offset)?;
        self.replace_region(dest.offset, cells)
    }

    /// Re-layout `count` values in place from time sequence `old` onto
    /// `new`, e.g. after the field's sequence has been widened by a merge.
    ///
    /// Times of `new` absent from `old` are zero-filled. Fails without
    /// modifying the block if some time of `old` has no slot in `new`.
    pub fn retime(
        &mut self,
        offset: usize,
        count: usize,
        value_type: ValueType,
        old: Option<&TimeSequence>,
        new: Option<&TimeSequence>,
        tolerance: f64,
    ) -> Result<(), StorageError> {
        let conversion = Conversion {
            value_type,
            source: old,
            destination: new,
            mapping: mapping_for(old, new),
            tolerance,
        };
        let times = new.map(TimeSequence::len);
        let fresh = (0..count)
            .map(|_| ValueCell::fresh(value_type, times))
            .collect::<Result<Vec<_>, _>>()?;
        let cells = conversion.convert_all(self.region(offset, count)?, &fresh, offset)?;
        self.replace_region(offset, cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::scalar::Scalar;
    use crate::tracked::live_dynamic_allocations;
    use fedof_core::{ElementId, ElementIdentity};
    use proptest::prelude::*;
    use std::rc::Rc;

    const TOL: f64 = 1e-5;

    fn ts(times: &[f64]) -> TimeSequence {
        TimeSequence::new(times.to_vec()).unwrap()
    }

    fn timed_block(times: &TimeSequence, values: &[f64]) -> ValueBlock {
        let mut block =
            ValueBlock::allocate(ValueType::Double, Some(times), 1, &StorageConfig::default()).unwrap();
        for (i, v) in values.iter().enumerate() {
            block.set_time_scalar(0, i, Scalar::Double(*v)).unwrap();
        }
        block
    }

    fn series(block: &ValueBlock) -> Scalars {
        block.time_series(0).unwrap().clone()
    }

    #[test]
    fn identical_sequences_copy_wholesale() {
        let times = ts(&[0.0, 1.0]);
        let src = timed_block(&times, &[1.0, 2.0]);
        let mut dest = timed_block(&times, &[0.0, 0.0]);
        dest.copy_values(
            ValueRegion::timed(0, &times),
            &src,
            ValueRegion::timed(0, &times),
            ValueType::Double,
            1,
            TOL,
        )
        .unwrap();
        assert_eq!(series(&dest), Scalars::Double(vec![1.0, 2.0]));
    }

    #[test]
    fn prefix_source_keeps_destination_tail() {
        let short = ts(&[0.0, 1.0]);
        let long = ts(&[0.0, 1.0, 2.0]);
        let src = timed_block(&short, &[1.0, 2.0]);
        let mut dest = timed_block(&long, &[9.0, 9.0, 7.0]);
        dest.copy_values(
            ValueRegion::timed(0, &long),
            &src,
            ValueRegion::timed(0, &short),
            ValueType::Double,
            1,
            TOL,
        )
        .unwrap();
        assert_eq!(series(&dest), Scalars::Double(vec![1.0, 2.0, 7.0]));
    }

    #[test]
    fn interleaved_times_are_placed_by_lookup() {
        let src_times = ts(&[0.5, 2.0]);
        let dest_times = ts(&[0.0, 0.5, 1.0, 2.0]);
        let src = timed_block(&src_times, &[5.0, 6.0]);
        let mut dest = timed_block(&dest_times, &[1.0, 1.0, 1.0, 1.0]);
        dest.copy_values(
            ValueRegion::timed(0, &dest_times),
            &src,
            ValueRegion::timed(0, &src_times),
            ValueType::Double,
            1,
            TOL,
        )
        .unwrap();
        assert_eq!(series(&dest), Scalars::Double(vec![1.0, 5.0, 1.0, 6.0]));
    }

    #[test]
    fn placing_by_time_matches_fast_path() {
        let times = ts(&[0.0, 1.0, 2.0]);
        let src = timed_block(&times, &[1.0, 2.0, 3.0]);
        let mut fast = timed_block(&times, &[0.0; 3]);
        let mut placed = timed_block(&times, &[0.0; 3]);
        let region = ValueRegion::timed(0, &times);
        fast.copy_values(region, &src, region, ValueType::Double, 1, TOL).unwrap();
        placed
            .copy_values_by_time(region, &src, region, ValueType::Double, 1, TOL)
            .unwrap();
        assert_eq!(series(&fast), series(&placed));
    }

    #[test]
    fn missing_destination_time_fails_without_writing() {
        let src_times = ts(&[0.0, 3.0]);
        let dest_times = ts(&[0.0, 1.0]);
        let src = timed_block(&src_times, &[5.0, 6.0]);
        let mut dest = timed_block(&dest_times, &[1.0, 2.0]);
        let err = dest
            .copy_values(
                ValueRegion::timed(0, &dest_times),
                &src,
                ValueRegion::timed(0, &src_times),
                ValueType::Double,
                1,
                TOL,
            )
            .unwrap_err();
        assert_eq!(err, StorageError::IncompatibleTimeMapping { time: 3.0 });
        assert_eq!(series(&dest), Scalars::Double(vec![1.0, 2.0]));
    }

    #[test]
    fn non_time_source_fills_every_time() {
        let times = ts(&[0.0, 1.0, 2.0]);
        let config = StorageConfig::default();
        let mut src = ValueBlock::allocate(ValueType::Int, None, 1, &config).unwrap();
        src.set_scalar(0, Scalar::Int(4)).unwrap();
        let mut dest = ValueBlock::allocate(ValueType::Int, Some(&times), 1, &config).unwrap();
        dest.copy_values(
            ValueRegion::timed(0, &times),
            &src,
            ValueRegion::new(0),
            ValueType::Int,
            1,
            TOL,
        )
        .unwrap();
        assert_eq!(series(&dest), Scalars::Int(vec![4, 4, 4]));
    }

    #[test]
    fn multi_time_source_cannot_fill_non_time_destination() {
        let times = ts(&[0.0, 1.0]);
        let src = timed_block(&times, &[1.0, 2.0]);
        let mut dest = ValueBlock::allocate(ValueType::Double, None, 1, &StorageConfig::default()).unwrap();
        assert_eq!(
            dest.copy_values(
                ValueRegion::new(0),
                &src,
                ValueRegion::timed(0, &times),
                ValueType::Double,
                1,
                TOL
            ),
            Err(StorageError::IncompatibleTimeMapping { time: 1.0 })
        );
    }

    #[test]
    fn copy_re_references_elements_and_duplicates_strings() {
        let config = StorageConfig::default();
        let element = ElementIdentity::new(ElementId::new(1, 3));
        let mut src = ValueBlock::allocate(ValueType::ElementXi, None, 1, &config).unwrap();
        src.set_element_xi(0, Some(Rc::clone(&element)), &[0.5]).unwrap();
        let mut dest = ValueBlock::allocate(ValueType::ElementXi, None, 1, &config).unwrap();
        dest.copy_values(
            ValueRegion::new(0),
            &src,
            ValueRegion::new(0),
            ValueType::ElementXi,
            1,
            TOL,
        )
        .unwrap();
        assert_eq!(Rc::strong_count(&element), 3);
        drop(src);
        assert_eq!(Rc::strong_count(&element), 2);
        assert_eq!(dest.element_xi(0).unwrap().1, &[0.5]);
    }

    #[test]
    fn copy_checks_value_type() {
        let config = StorageConfig::default();
        let src = ValueBlock::allocate(ValueType::Float, None, 1, &config).unwrap();
        let mut dest = ValueBlock::allocate(ValueType::Double, None, 1, &config).unwrap();
        let err = dest
            .copy_values(
                ValueRegion::new(0),
                &src,
                ValueRegion::new(0),
                ValueType::Double,
                1,
                TOL,
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::TypeMismatch { .. }));
    }

    #[test]
    fn retime_widens_in_place() {
        let old = ts(&[0.0, 2.0]);
        let new = ts(&[0.0, 1.0, 2.0]);
        let mut block = timed_block(&old, &[3.0, 4.0]);
        block
            .retime(0, 1, ValueType::Double, Some(&old), Some(&new), TOL)
            .unwrap();
        assert_eq!(series(&block), Scalars::Double(vec![3.0, 0.0, 4.0]));
        assert_eq!(block.real_value(0, Some(&new), 2.0).unwrap(), 4.0);
    }

    fn arb_value_type() -> impl Strategy<Value = ValueType> {
        prop::sample::select(ValueType::ALL.to_vec())
    }

    fn fill(block: &mut ValueBlock, value_type: ValueType, count: usize, seed: i32) {
        for offset in 0..count {
            let n = seed + offset as i32;
            match value_type {
                ValueType::String => block.set_string(offset, Some(&format!("s{n}"))).unwrap(),
                ValueType::ElementXi => block
                    .set_element_xi(offset, Some(ElementIdentity::new(ElementId::new(2, n))), &[0.5])
                    .unwrap(),
                vt if vt.is_array() => {
                    let mut values = Scalars::zeros(vt, 2).unwrap();
                    values
                        .set(1, Scalar::from_f64(vt.element_type(), f64::from(n)).unwrap())
                        .unwrap();
                    block.set_array(offset, values).unwrap();
                }
                vt => block
                    .set_scalar(offset, Scalar::from_f64(vt, f64::from(n % 100)).unwrap())
                    .unwrap(),
            }
        }
    }

    proptest! {
        #[test]
        fn allocate_free_never_leaks(value_type in arb_value_type(), count in 1usize..16, seed in 0i32..1000) {
            let before = live_dynamic_allocations();
            {
                let config = StorageConfig::default();
                let mut block = ValueBlock::allocate(value_type, None, count, &config).unwrap();
                fill(&mut block, value_type, count, seed);
                let released = block.free_dynamic(0, value_type, None, count).unwrap();
                prop_assert!(released <= count);
                prop_assert_eq!(block.free_dynamic(0, value_type, None, count).unwrap(), 0);
                prop_assert_eq!(live_dynamic_allocations(), before);
            }
            prop_assert_eq!(live_dynamic_allocations(), before);
        }

        #[test]
        fn copy_reproduces_every_slot(value_type in arb_value_type(), count in 1usize..16, seed in 0i32..1000) {
            let config = StorageConfig::default();
            let mut src = ValueBlock::allocate(value_type, None, count, &config).unwrap();
            fill(&mut src, value_type, count, seed);
            let mut dest = ValueBlock::allocate(value_type, None, count, &config).unwrap();
            dest.copy_values(ValueRegion::new(0), &src, ValueRegion::new(0), value_type, count, TOL).unwrap();
            prop_assert_eq!(&dest, &src);
        }

        #[test]
        fn timed_copy_matches_source_at_shared_times(
            src_steps in prop::collection::btree_set(0i32..40, 1..8),
            extra in prop::collection::btree_set(0i32..40, 0..8),
        ) {
            let src_times = ts(&src_steps.iter().map(|&t| f64::from(t)).collect::<Vec<_>>());
            let union: std::collections::BTreeSet<i32> = src_steps.union(&extra).copied().collect();
            let dest_times = ts(&union.iter().map(|&t| f64::from(t)).collect::<Vec<_>>());
            let values: Vec<f64> = (0..src_times.len()).map(|i| i as f64 * 1.5 + 1.0).collect();
            let src = timed_block(&src_times, &values);
            let mut dest = timed_block(&dest_times, &[]);
            dest.copy_values(
                ValueRegion::timed(0, &dest_times),
                &src,
                ValueRegion::timed(0, &src_times),
                ValueType::Double,
                1,
                TOL,
            ).unwrap();
            for &t in src_times.times() {
                prop_assert_eq!(
                    dest.real_value(0, Some(&dest_times), t).unwrap(),
                    src.real_value(0, Some(&src_times), t).unwrap()
                );
            }
        }
    }
}
