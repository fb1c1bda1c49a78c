//! Per-value storage cells and the storage size contract.

use std::mem::size_of;
use std::rc::Rc;

use fedof_core::{ElementRef, StorageError, ValueType, Xi, MAXIMUM_ELEMENT_XI_DIMENSIONS};

use crate::scalar::{Scalar, Scalars};
use crate::tracked::Tracked;

const POINTER_SIZE: usize = size_of::<usize>();

/// Storage footprint in bytes of one value of `value_type`.
///
/// Time-sequenced values hold a pointer to their per-time array. Arrays hold
/// an element count plus a pointer; strings hold a pointer; element-xi values
/// hold an element pointer followed by the maximum number of xi coordinates.
/// The result depends only on its arguments and is stable for the life of
/// the process.
pub fn size(value_type: ValueType, time_sequenced: bool) -> usize {
    if time_sequenced {
        return POINTER_SIZE;
    }
    match value_type {
        ValueType::Double => size_of::<f64>(),
        ValueType::Float => size_of::<f32>(),
        ValueType::Short => size_of::<i16>(),
        ValueType::Int => size_of::<i32>(),
        ValueType::Unsigned => size_of::<u32>(),
        ValueType::String => POINTER_SIZE,
        ValueType::ElementXi => POINTER_SIZE + MAXIMUM_ELEMENT_XI_DIMENSIONS * size_of::<f64>(),
        ValueType::DoubleArray
        | ValueType::FloatArray
        | ValueType::ShortArray
        | ValueType::IntArray
        | ValueType::UnsignedArray => size_of::<i32>() + POINTER_SIZE,
    }
}

/// One stored value.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ValueCell {
    Double(f64),
    Float(f32),
    Short(i16),
    Int(i32),
    Unsigned(u32),
    String(Option<Tracked<String>>),
    ElementXi {
        element: Option<ElementRef>,
        xi: Xi,
    },
    Array {
        array_type: ValueType,
        values: Option<Tracked<Scalars>>,
    },
    TimeSeries {
        value_type: ValueType,
        values: Option<Tracked<Scalars>>,
    },
}

impl ValueCell {
    /// A zero/null value. Time series get one zero per time.
    pub(crate) fn fresh(value_type: ValueType, times: Option<usize>) -> Result<Self, StorageError> {
        if let Some(times) = times {
            if !value_type.supports_time_sequence() {
                return Err(StorageError::TimeSequenceUnsupported { value_type });
            }
            return Ok(Self::TimeSeries {
                value_type,
                values: Some(Tracked::new(Scalars::zeros(value_type, times)?)),
            });
        }
        Ok(match value_type {
            ValueType::String => Self::String(None),
            ValueType::ElementXi => Self::ElementXi {
                element: None,
                xi: Xi::new(),
            },
            array_type if array_type.is_array() => Self::Array {
                array_type,
                values: None,
            },
            numeric => Self::from_scalar(Scalar::zero(numeric)?),
        })
    }

    pub(crate) fn from_scalar(value: Scalar) -> Self {
        match value {
            Scalar::Double(v) => Self::Double(v),
            Scalar::Float(v) => Self::Float(v),
            Scalar::Short(v) => Self::Short(v),
            Scalar::Int(v) => Self::Int(v),
            Scalar::Unsigned(v) => Self::Unsigned(v),
        }
    }

    pub(crate) fn as_scalar(&self) -> Option<Scalar> {
        match *self {
            Self::Double(v) => Some(Scalar::Double(v)),
            Self::Float(v) => Some(Scalar::Float(v)),
            Self::Short(v) => Some(Scalar::Short(v)),
            Self::Int(v) => Some(Scalar::Int(v)),
            Self::Unsigned(v) => Some(Scalar::Unsigned(v)),
            _ => None,
        }
    }

    pub(crate) fn value_type(&self) -> ValueType {
        match self {
            Self::Double(_) => ValueType::Double,
            Self::Float(_) => ValueType::Float,
            Self::Short(_) => ValueType::Short,
            Self::Int(_) => ValueType::Int,
            Self::Unsigned(_) => ValueType::Unsigned,
            Self::String(_) => ValueType::String,
            Self::ElementXi { .. } => ValueType::ElementXi,
            Self::Array { array_type, .. } => *array_type,
            Self::TimeSeries { value_type, .. } => *value_type,
        }
    }

    pub(crate) fn is_time_series(&self) -> bool {
        matches!(self, Self::TimeSeries { .. })
    }

    pub(crate) fn byte_size(&self) -> usize {
        size(self.value_type(), self.is_time_series())
    }

    fn describe(&self) -> String {
        if self.is_time_series() {
            format!("time-sequenced {}", self.value_type())
        } else {
            self.value_type().to_string()
        }
    }

    /// Fail unless this cell stores `value_type` with the given time-ness.
    pub(crate) fn check(&self, value_type: ValueType, time_sequenced: bool) -> Result<(), StorageError> {
        if self.value_type() == value_type && self.is_time_series() == time_sequenced {
            Ok(())
        } else {
            Err(StorageError::TypeMismatch {
                expected: value_type,
                found: self.describe(),
            })
        }
    }

    pub(crate) fn mismatch(&self, expected: ValueType) -> StorageError {
        StorageError::TypeMismatch {
            expected,
            found: self.describe(),
        }
    }

    /// Release the owned sub-allocation or element reference, if any.
    ///
    /// Returns true if something was released; releasing again is a no-op.
    pub(crate) fn release(&mut self) -> bool {
        match self {
            Self::String(s) => s.take().is_some(),
            Self::ElementXi { element, xi } => {
                xi.clear();
                element.take().is_some()
            }
            Self::Array { values, .. } | Self::TimeSeries { values, .. } => values.take().is_some(),
            _ => false,
        }
    }

    /// Element reference count contribution, for diagnostics.
    pub(crate) fn element(&self) -> Option<&ElementRef> {
        match self {
            Self::ElementXi {
                element: Some(e), ..
            } => Some(e),
            _ => None,
        }
    }
}

/// Number of strong references to an element held by `cells`.
pub(crate) fn element_references(cells: &[ValueCell], element: &ElementRef) -> usize {
    cells
        .iter()
        .filter_map(ValueCell::element)
        .filter(|e| Rc::ptr_eq(e, element))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracked::live_dynamic_allocations;

    #[test]
    fn size_is_pointer_for_time_sequences() {
        for vt in ValueType::ALL {
            assert_eq!(size(vt, true), POINTER_SIZE, "{vt}");
        }
    }

    #[test]
    fn array_size_holds_count_and_pointer() {
        assert_eq!(size(ValueType::DoubleArray, false), 4 + POINTER_SIZE);
        assert_eq!(size(ValueType::Short, false), 2);
        assert_eq!(size(ValueType::ElementXi, false), POINTER_SIZE + 24);
    }

    #[test]
    fn fresh_rejects_time_sequenced_string() {
        assert_eq!(
            ValueCell::fresh(ValueType::String, Some(3)),
            Err(StorageError::TimeSequenceUnsupported {
                value_type: ValueType::String
            })
        );
    }

    #[test]
    fn release_twice_is_noop() {
        let before = live_dynamic_allocations();
        let mut cell = ValueCell::fresh(ValueType::Float, Some(4)).unwrap();
        assert_eq!(live_dynamic_allocations(), before + 1);
        assert!(cell.release());
        assert!(!cell.release());
        assert_eq!(live_dynamic_allocations(), before);
    }
}
