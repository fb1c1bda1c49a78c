//! The value block: flat, typed storage for the values of every field
//! defined on one node or element.

use fedof_core::{ElementRef, StorageError, TimeSequence, ValueType, Xi};
use log::trace;

use crate::cell::{element_references, ValueCell};
use crate::config::StorageConfig;
use crate::scalar::{Scalar, Scalars};
use crate::tracked::Tracked;

/// Typed storage for the values of one entity.
///
/// Values are addressed by offset (one offset per value). A descriptor
/// records, for each field component, the offset of its first value and how
/// many follow; the block itself only knows each value's type, which is
/// enough to check accesses and to release owned sub-allocations.
///
/// Dropping a block releases everything it owns. [`free_dynamic`] releases
/// the owned parts of a region early, leaving null values behind, and is
/// what callers use before overwriting a region through other means.
///
/// [`free_dynamic`]: ValueBlock::free_dynamic
#[derive(Debug, Default, PartialEq)]
pub struct ValueBlock {
    cells: Vec<ValueCell>,
}

fn reserve<T>(values: &mut Vec<T>, count: usize, bytes: usize) -> Result<(), StorageError> {
    values
        .try_reserve_exact(count)
        .map_err(|_| StorageError::OutOfMemory { requested: bytes })
}

impl ValueBlock {
    /// An empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `count` zero/null values of `value_type`, one per time of
    /// `time_sequence` if given.
    pub fn allocate(
        value_type: ValueType,
        time_sequence: Option<&TimeSequence>,
        count: usize,
        config: &StorageConfig,
    ) -> Result<Self, StorageError> {
        let mut block = Self::new();
        block.extend(value_type, time_sequence, count, config)?;
        Ok(block)
    }

    /// Append `count` zero/null values, keeping existing ones. Returns the
    /// offset of the first new value.
    ///
    /// Nothing is appended on failure.
    pub fn extend(
        &mut self,
        value_type: ValueType,
        time_sequence: Option<&TimeSequence>,
        count: usize,
        config: &StorageConfig,
    ) -> Result<usize, StorageError> {
        let overflow = StorageError::CapacityExceeded {
            requested: usize::MAX,
            capacity: config.max_block_bytes,
        };
        let added = crate::size(value_type, time_sequence.is_some())
            .checked_mul(count)
            .ok_or_else(|| overflow.clone())?;
        let requested = self.byte_size().checked_add(added).ok_or(overflow)?;
        if requested > config.max_block_bytes {
            return Err(StorageError::CapacityExceeded {
                requested,
                capacity: config.max_block_bytes,
            });
        }
        let times = time_sequence.map(TimeSequence::len);
        let mut fresh = Vec::new();
        reserve(&mut fresh, count, added)?;
        for _ in 0..count {
            fresh.push(ValueCell::fresh(value_type, times)?);
        }
        reserve(&mut self.cells, count, added)?;
        let offset = self.cells.len();
        self.cells.append(&mut fresh);
        trace!("value block: +{count} {value_type} at offset {offset}");
        Ok(offset)
    }

    /// Deep copy: strings and arrays are duplicated, element references are
    /// re-referenced.
    pub fn try_clone(&self) -> Result<Self, StorageError> {
        let mut cells = Vec::new();
        reserve(&mut cells, self.cells.len(), self.byte_size())?;
        cells.extend(self.cells.iter().cloned());
        Ok(Self { cells })
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the block holds no values.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Storage footprint in bytes, summing [`size`](crate::size) over all values.
    pub fn byte_size(&self) -> usize {
        self.cells.iter().map(ValueCell::byte_size).sum()
    }

    /// The type of the value at `offset` and whether it is time-sequenced.
    pub fn value_type_at(&self, offset: usize) -> Result<(ValueType, bool), StorageError> {
        let cell = self.cell(offset)?;
        Ok((cell.value_type(), cell.is_time_series()))
    }

    /// Remove `count` values starting at `offset`, shifting later values down.
    pub fn remove(&mut self, offset: usize, count: usize) -> Result<(), StorageError> {
        self.region(offset, count)?;
        drop(self.cells.drain(offset..offset + count));
        Ok(())
    }

    /// Release the owned sub-allocations and element references of `count`
    /// values at `offset`, which must hold `value_type` with the given
    /// time-sequencing. Returns the number of sub-allocations released.
    ///
    /// The values are left null (time series lose their per-time storage),
    /// so releasing the same region again releases nothing.
    pub fn free_dynamic(
        &mut self,
        offset: usize,
        value_type: ValueType,
        time_sequence: Option<&TimeSequence>,
        count: usize,
    ) -> Result<usize, StorageError> {
        let time_sequenced = time_sequence.is_some();
        for cell in self.region(offset, count)? {
            cell.check(value_type, time_sequenced)?;
        }
        let released = self.cells[offset..offset + count]
            .iter_mut()
            .map(ValueCell::release)
            .filter(|released| *released)
            .count();
        Ok(released)
    }

    /// Number of references to `element` held by element-xi values.
    pub fn element_references(&self, element: &ElementRef) -> usize {
        element_references(&self.cells, element)
    }

    // ── Typed access ─────────────────────────────────────────────

    /// A numeric scalar value.
    pub fn scalar(&self, offset: usize) -> Result<Scalar, StorageError> {
        let cell = self.cell(offset)?;
        cell.as_scalar().ok_or_else(|| cell.mismatch(ValueType::Double))
    }

    /// Overwrite a numeric scalar value with one of the same type.
    pub fn set_scalar(&mut self, offset: usize, value: Scalar) -> Result<(), StorageError> {
        let cell = self.cell_mut(offset)?;
        cell.check(value.value_type(), false)?;
        *cell = ValueCell::from_scalar(value);
        Ok(())
    }

    /// All per-time values of a time-sequenced value.
    pub fn time_series(&self, offset: usize) -> Result<&Scalars, StorageError> {
        match self.cell(offset)? {
            ValueCell::TimeSeries {
                values: Some(values),
                ..
            } => Ok(&**values),
            ValueCell::TimeSeries { .. } => Err(StorageError::InvalidArgument {
                reason: format!("time series at offset {offset} has been released"),
            }),
            other => Err(other.mismatch(ValueType::Double)),
        }
    }

    /// The value of a time-sequenced value at position `time_index` of its
    /// time sequence.
    pub fn time_scalar(&self, offset: usize, time_index: usize) -> Result<Scalar, StorageError> {
        let series = self.time_series(offset)?;
        series.get(time_index).ok_or(StorageError::OffsetOutOfRange {
            offset: time_index,
            len: series.len(),
        })
    }

    /// Overwrite one per-time value of a time-sequenced value.
    pub fn set_time_scalar(
        &mut self,
        offset: usize,
        time_index: usize,
        value: Scalar,
    ) -> Result<(), StorageError> {
        match self.cell_mut(offset)? {
            ValueCell::TimeSeries {
                values: Some(values),
                ..
            } => values.get_mut().set(time_index, value),
            ValueCell::TimeSeries { .. } => Err(StorageError::InvalidArgument {
                reason: format!("time series at offset {offset} has been released"),
            }),
            other => Err(other.mismatch(value.value_type())),
        }
    }

    /// A numeric value as `f64`.
    ///
    /// Time-sequenced values need their `time_sequence`; they are linearly
    /// interpolated between the stored times bracketing `time` and clamped
    /// outside the sequence. Non-time values ignore both arguments.
    pub fn real_value(
        &self,
        offset: usize,
        time_sequence: Option<&TimeSequence>,
        time: f64,
    ) -> Result<f64, StorageError> {
        let cell = self.cell(offset)?;
        if let Some(value) = cell.as_scalar() {
            return Ok(value.as_f64());
        }
        if !cell.is_time_series() {
            return Err(cell.mismatch(ValueType::Double));
        }
        let sequence = time_sequence.ok_or_else(|| StorageError::InvalidArgument {
            reason: format!("time-sequenced value at offset {offset} read without its time sequence"),
        })?;
        let series = self.time_series(offset)?;
        if series.len() != sequence.len() {
            return Err(StorageError::InvalidArgument {
                reason: format!(
                    "time series at offset {offset} has {} values for {} times",
                    series.len(),
                    sequence.len()
                ),
            });
        }
        let interp = sequence.interpolation_for_time(time);
        let one = series.real(interp.index_one).unwrap_or_default();
        if interp.index_one == interp.index_two {
            return Ok(one);
        }
        let two = series.real(interp.index_two).unwrap_or_default();
        Ok(one + interp.xi * (two - one))
    }

    /// Store an `f64` into a numeric value, converting to its type.
    ///
    /// For time-sequenced values `time` must match a stored time within
    /// `tolerance`.
    pub fn set_real_value(
        &mut self,
        offset: usize,
        time_sequence: Option<&TimeSequence>,
        time: f64,
        tolerance: f64,
        value: f64,
    ) -> Result<(), StorageError> {
        let (value_type, time_sequenced) = self.value_type_at(offset)?;
        let scalar = Scalar::from_f64(value_type, value)?;
        if !time_sequenced {
            return self.set_scalar(offset, scalar);
        }
        let sequence = time_sequence.ok_or_else(|| StorageError::InvalidArgument {
            reason: format!("time-sequenced value at offset {offset} written without its time sequence"),
        })?;
        let index = sequence
            .index_for_time(time, tolerance)
            .ok_or(StorageError::IncompatibleTimeMapping { time })?;
        self.set_time_scalar(offset, index, scalar)
    }

    /// A string value; `None` if null.
    pub fn string(&self, offset: usize) -> Result<Option<&str>, StorageError> {
        match self.cell(offset)? {
            ValueCell::String(s) => Ok(s.as_deref().map(String::as_str)),
            other => Err(other.mismatch(ValueType::String)),
        }
    }

    /// Overwrite a string value, releasing the previous string.
    pub fn set_string(&mut self, offset: usize, value: Option<&str>) -> Result<(), StorageError> {
        match self.cell_mut(offset)? {
            ValueCell::String(s) => {
                *s = value.map(|v| Tracked::new(v.to_owned()));
                Ok(())
            }
            other => Err(other.mismatch(ValueType::String)),
        }
    }

    /// An element-xi value: the referenced element (if any) and its xi.
    pub fn element_xi(&self, offset: usize) -> Result<(Option<&ElementRef>, &[f64]), StorageError> {
        match self.cell(offset)? {
            ValueCell::ElementXi { element, xi } => Ok((element.as_ref(), xi.as_slice())),
            other => Err(other.mismatch(ValueType::ElementXi)),
        }
    }

    /// Overwrite an element-xi value. The block takes a counted reference to
    /// `element` and releases its previous one.
    pub fn set_element_xi(
        &mut self,
        offset: usize,
        element: Option<ElementRef>,
        xi: &[f64],
    ) -> Result<(), StorageError> {
        if xi.len() > fedof_core::MAXIMUM_ELEMENT_XI_DIMENSIONS {
            return Err(StorageError::InvalidArgument {
                reason: format!("{} xi coordinates exceed the supported maximum", xi.len()),
            });
        }
        match self.cell_mut(offset)? {
            ValueCell::ElementXi {
                element: slot_element,
                xi: slot_xi,
            } => {
                *slot_element = element;
                *slot_xi = Xi::from_slice(xi);
                Ok(())
            }
            other => Err(other.mismatch(ValueType::ElementXi)),
        }
    }

    /// An array value; `None` if null (zero length).
    pub fn array(&self, offset: usize) -> Result<Option<&Scalars>, StorageError> {
        match self.cell(offset)? {
            ValueCell::Array { values, .. } => Ok(values.as_deref()),
            other => Err(other.mismatch(ValueType::DoubleArray)),
        }
    }

    /// Overwrite an array value, releasing the previous array. An empty
    /// array is stored as null.
    pub fn set_array(&mut self, offset: usize, values: Scalars) -> Result<(), StorageError> {
        match self.cell_mut(offset)? {
            ValueCell::Array { array_type, values: slot } => {
                if array_type.element_type() != values.value_type() {
                    return Err(StorageError::TypeMismatch {
                        expected: *array_type,
                        found: format!("{} values", values.value_type()),
                    });
                }
                *slot = if values.is_empty() {
                    None
                } else {
                    Some(Tracked::new(values))
                };
                Ok(())
            }
            other => Err(other.mismatch(ValueType::DoubleArray)),
        }
    }

    // ── Internals ────────────────────────────────────────────────

    fn cell(&self, offset: usize) -> Result<&ValueCell, StorageError> {
        self.cells.get(offset).ok_or(StorageError::OffsetOutOfRange {
            offset,
            len: self.cells.len(),
        })
    }

    fn cell_mut(&mut self, offset: usize) -> Result<&mut ValueCell, StorageError> {
        let len = self.cells.len();
        self.cells
            .get_mut(offset)
            .ok_or(StorageError::OffsetOutOfRange { offset, len })
    }

    pub(crate) fn region(&self, offset: usize, count: usize) -> Result<&[ValueCell], StorageError> {
        offset
            .checked_add(count)
            .and_then(|end| self.cells.get(offset..end))
            .ok_or(StorageError::OffsetOutOfRange {
                offset,
                len: self.cells.len(),
            })
    }

    pub(crate) fn replace_region(&mut self, offset: usize, cells: Vec<ValueCell>) -> Result<(), StorageError> {
        let count = cells.len();
        self.region(offset, count)?;
        for (slot, cell) in self.cells[offset..offset + count].iter_mut().zip(cells) {
            *slot = cell;
        }
        Ok(())
    }
}
