//! Numeric scalars and homogeneous scalar arrays.
//!
//! [`Scalar`] is one numeric value tagged with its type; [`Scalars`] is a
//! typed vector used both for array values and for the per-time storage of
//! time-sequenced values.

use fedof_core::{StorageError, ValueType};

/// One numeric value of any of the five numeric scalar types.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    /// 64-bit float.
    Double(f64),
    /// 32-bit float.
    Float(f32),
    /// 16-bit signed integer.
    Short(i16),
    /// 32-bit signed integer.
    Int(i32),
    /// 32-bit unsigned integer.
    Unsigned(u32),
}

impl Scalar {
    /// The zero value of a numeric scalar type.
    pub fn zero(value_type: ValueType) -> Result<Self, StorageError> {
        match value_type {
            ValueType::Double => Ok(Self::Double(0.0)),
            ValueType::Float => Ok(Self::Float(0.0)),
            ValueType::Short => Ok(Self::Short(0)),
            ValueType::Int => Ok(Self::Int(0)),
            ValueType::Unsigned => Ok(Self::Unsigned(0)),
            other => Err(StorageError::TypeMismatch {
                expected: ValueType::Double,
                found: format!("non-numeric type {other}"),
            }),
        }
    }

    /// The value's type.
    pub fn value_type(self) -> ValueType {
        match self {
            Self::Double(_) => ValueType::Double,
            Self::Float(_) => ValueType::Float,
            Self::Short(_) => ValueType::Short,
            Self::Int(_) => ValueType::Int,
            Self::Unsigned(_) => ValueType::Unsigned,
        }
    }

    /// The value widened to `f64`.
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Double(v) => v,
            Self::Float(v) => f64::from(v),
            Self::Short(v) => f64::from(v),
            Self::Int(v) => f64::from(v),
            Self::Unsigned(v) => f64::from(v),
        }
    }

    /// Convert an `f64` to `value_type`, rounding and saturating for
    /// integer types.
    pub fn from_f64(value_type: ValueType, value: f64) -> Result<Self, StorageError> {
        Ok(match Self::zero(value_type)? {
            Self::Double(_) => Self::Double(value),
            Self::Float(_) => Self::Float(value as f32),
            Self::Short(_) => Self::Short(value.round() as i16),
            Self::Int(_) => Self::Int(value.round() as i32),
            Self::Unsigned(_) => Self::Unsigned(value.round() as u32),
        })
    }
}

/// A typed vector of numeric scalars.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalars {
    /// Doubles.
    Double(Vec<f64>),
    /// Floats.
    Float(Vec<f32>),
    /// Shorts.
    Short(Vec<i16>),
    /// Ints.
    Int(Vec<i32>),
    /// Unsigned ints.
    Unsigned(Vec<u32>),
}

/// Apply the same expression to whichever vector a [`Scalars`] holds.
macro_rules! each_vec {
    ($scalars:expr, $v:ident => $body:expr) => {
        match $scalars {
            Scalars::Double($v) => $body,
            Scalars::Float($v) => $body,
            Scalars::Short($v) => $body,
            Scalars::Int($v) => $body,
            Scalars::Unsigned($v) => $body,
        }
    };
}

fn zeroed<T: Clone + Default>(count: usize) -> Result<Vec<T>, StorageError> {
    let mut values = Vec::new();
    values
        .try_reserve_exact(count)
        .map_err(|_| StorageError::OutOfMemory {
            requested: count * std::mem::size_of::<T>(),
        })?;
    values.resize(count, T::default());
    Ok(values)
}

fn grow<T: Clone + Default>(values: &mut Vec<T>, count: usize) -> Result<(), StorageError> {
    if count > values.len() {
        let extra = count - values.len();
        values
            .try_reserve_exact(extra)
            .map_err(|_| StorageError::OutOfMemory {
                requested: extra * std::mem::size_of::<T>(),
            })?;
    }
    values.resize(count, T::default());
    Ok(())
}

impl Scalars {
    /// `count` zeros of numeric type `value_type` (array types use their
    /// element type).
    pub fn zeros(value_type: ValueType, count: usize) -> Result<Self, StorageError> {
        Ok(match value_type.element_type() {
            ValueType::Double => Self::Double(zeroed(count)?),
            ValueType::Float => Self::Float(zeroed(count)?),
            ValueType::Short => Self::Short(zeroed(count)?),
            ValueType::Int => Self::Int(zeroed(count)?),
            ValueType::Unsigned => Self::Unsigned(zeroed(count)?),
            other => {
                return Err(StorageError::TypeMismatch {
                    expected: ValueType::Double,
                    found: format!("non-numeric type {other}"),
                })
            }
        })
    }

    /// The scalar element type.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Double(_) => ValueType::Double,
            Self::Float(_) => ValueType::Float,
            Self::Short(_) => ValueType::Short,
            Self::Int(_) => ValueType::Int,
            Self::Unsigned(_) => ValueType::Unsigned,
        }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        each_vec!(self, v => v.len())
    }

    /// Whether there are no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value at `index`.
    pub fn get(&self, index: usize) -> Option<Scalar> {
        match self {
            Self::Double(v) => v.get(index).copied().map(Scalar::Double),
            Self::Float(v) => v.get(index).copied().map(Scalar::Float),
            Self::Short(v) => v.get(index).copied().map(Scalar::Short),
            Self::Int(v) => v.get(index).copied().map(Scalar::Int),
            Self::Unsigned(v) => v.get(index).copied().map(Scalar::Unsigned),
        }
    }

    /// The value at `index` widened to `f64`.
    pub fn real(&self, index: usize) -> Option<f64> {
        self.get(index).map(Scalar::as_f64)
    }

    /// Overwrite the value at `index`. The scalar must have this array's type.
    pub fn set(&mut self, index: usize, value: Scalar) -> Result<(), StorageError> {
        let len = self.len();
        let expected = self.value_type();
        let slot_missing = || StorageError::OffsetOutOfRange { offset: index, len };
        match (self, value) {
            (Self::Double(v), Scalar::Double(x)) => *v.get_mut(index).ok_or_else(slot_missing)? = x,
            (Self::Float(v), Scalar::Float(x)) => *v.get_mut(index).ok_or_else(slot_missing)? = x,
            (Self::Short(v), Scalar::Short(x)) => *v.get_mut(index).ok_or_else(slot_missing)? = x,
            (Self::Int(v), Scalar::Int(x)) => *v.get_mut(index).ok_or_else(slot_missing)? = x,
            (Self::Unsigned(v), Scalar::Unsigned(x)) => {
                *v.get_mut(index).ok_or_else(slot_missing)? = x
            }
            (_, other) => {
                return Err(StorageError::TypeMismatch {
                    expected,
                    found: other.value_type().to_string(),
                })
            }
        }
        Ok(())
    }

    /// Grow (zero-filling) or shrink to `count` values.
    pub fn resize(&mut self, count: usize) -> Result<(), StorageError> {
        each_vec!(self, v => grow(v, count))
    }
}

impl From<Vec<f64>> for Scalars {
    fn from(v: Vec<f64>) -> Self {
        Self::Double(v)
    }
}

impl From<Vec<f32>> for Scalars {
    fn from(v: Vec<f32>) -> Self {
        Self::Float(v)
    }
}

impl From<Vec<i16>> for Scalars {
    fn from(v: Vec<i16>) -> Self {
        Self::Short(v)
    }
}

impl From<Vec<i32>> for Scalars {
    fn from(v: Vec<i32>) -> Self {
        Self::Int(v)
    }
}

impl From<Vec<u32>> for Scalars {
    fn from(v: Vec<u32>) -> Self {
        Self::Unsigned(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_use_array_element_type() {
        let s = Scalars::zeros(ValueType::ShortArray, 3).unwrap();
        assert_eq!(s, Scalars::Short(vec![0, 0, 0]));
    }

    #[test]
    fn set_rejects_wrong_type() {
        let mut s = Scalars::zeros(ValueType::Int, 2).unwrap();
        let err = s.set(0, Scalar::Double(1.0)).unwrap_err();
        assert!(matches!(err, StorageError::TypeMismatch { .. }));
        s.set(1, Scalar::Int(7)).unwrap();
        assert_eq!(s.get(1), Some(Scalar::Int(7)));
    }

    #[test]
    fn set_rejects_out_of_range_index() {
        let mut s = Scalars::zeros(ValueType::Double, 2).unwrap();
        assert_eq!(
            s.set(2, Scalar::Double(1.0)),
            Err(StorageError::OffsetOutOfRange { offset: 2, len: 2 })
        );
    }

    #[test]
    fn resize_zero_fills() {
        let mut s = Scalars::from(vec![1.5f64]);
        s.resize(3).unwrap();
        assert_eq!(s, Scalars::Double(vec![1.5, 0.0, 0.0]));
    }

    #[test]
    fn integer_conversion_rounds() {
        assert_eq!(
            Scalar::from_f64(ValueType::Int, 2.6).unwrap(),
            Scalar::Int(3)
        );
        assert!(Scalar::from_f64(ValueType::String, 1.0).is_err());
    }
}
