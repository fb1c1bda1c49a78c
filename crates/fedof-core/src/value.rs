//! Value type classification for stored field values.

use std::fmt;

/// The declared type of the values a field stores at nodes and elements.
///
/// The value type, together with whether the values are time-sequenced,
/// fully determines the storage footprint of one value (see
/// `fedof_storage::size`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// 64-bit floating point value.
    Double,
    /// 32-bit floating point value.
    Float,
    /// 16-bit signed integer.
    Short,
    /// 32-bit signed integer.
    Int,
    /// 32-bit unsigned integer.
    Unsigned,
    /// Owned, optional UTF-8 string.
    String,
    /// Embedded location: a counted element reference plus xi coordinates.
    ElementXi,
    /// Variable-length array of doubles.
    DoubleArray,
    /// Variable-length array of floats.
    FloatArray,
    /// Variable-length array of shorts.
    ShortArray,
    /// Variable-length array of ints.
    IntArray,
    /// Variable-length array of unsigned ints.
    UnsignedArray,
}

impl ValueType {
    /// All value types, in declaration order.
    pub const ALL: [ValueType; 12] = [
        Self::Double,
        Self::Float,
        Self::Short,
        Self::Int,
        Self::Unsigned,
        Self::String,
        Self::ElementXi,
        Self::DoubleArray,
        Self::FloatArray,
        Self::ShortArray,
        Self::IntArray,
        Self::UnsignedArray,
    ];

    /// Whether values of this type are variable-length arrays.
    pub fn is_array(self) -> bool {
        matches!(
            self,
            Self::DoubleArray
                | Self::FloatArray
                | Self::ShortArray
                | Self::IntArray
                | Self::UnsignedArray
        )
    }

    /// Whether this is a numeric scalar type.
    pub fn is_numeric_scalar(self) -> bool {
        matches!(
            self,
            Self::Double | Self::Float | Self::Short | Self::Int | Self::Unsigned
        )
    }

    /// Whether values of this type may be time-sequenced.
    ///
    /// Only numeric scalars can be stored as one value per time.
    pub fn supports_time_sequence(self) -> bool {
        self.is_numeric_scalar()
    }

    /// Whether a stored value owns a separate heap allocation or reference
    /// that must be released before the storage is discarded.
    pub fn has_dynamic_storage(self) -> bool {
        self.is_array() || matches!(self, Self::String | Self::ElementXi)
    }

    /// The numeric element type of an array type, or `self` for scalars.
    pub fn element_type(self) -> ValueType {
        match self {
            Self::DoubleArray => Self::Double,
            Self::FloatArray => Self::Float,
            Self::ShortArray => Self::Short,
            Self::IntArray => Self::Int,
            Self::UnsignedArray => Self::Unsigned,
            other => other,
        }
    }

    /// Size in bytes of one raw numeric element of this type (or of the
    /// element type for arrays). Zero for non-numeric types.
    pub fn numeric_width(self) -> usize {
        match self.element_type() {
            Self::Double => 8,
            Self::Float => 4,
            Self::Short => 2,
            Self::Int => 4,
            Self::Unsigned => 4,
            _ => 0,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Double => "double",
            Self::Float => "float",
            Self::Short => "short",
            Self::Int => "integer",
            Self::Unsigned => "unsigned",
            Self::String => "string",
            Self::ElementXi => "element_xi",
            Self::DoubleArray => "double_array",
            Self::FloatArray => "float_array",
            Self::ShortArray => "short_array",
            Self::IntArray => "integer_array",
            Self::UnsignedArray => "unsigned_array",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_numeric_scalars_are_time_capable() {
        for vt in ValueType::ALL {
            assert_eq!(vt.supports_time_sequence(), vt.is_numeric_scalar(), "{vt}");
        }
    }

    #[test]
    fn arrays_map_to_their_element_type() {
        assert_eq!(ValueType::DoubleArray.element_type(), ValueType::Double);
        assert_eq!(ValueType::ShortArray.element_type(), ValueType::Short);
        assert_eq!(ValueType::String.element_type(), ValueType::String);
        assert_eq!(ValueType::UnsignedArray.numeric_width(), 4);
    }

    #[test]
    fn dynamic_storage_classification() {
        assert!(ValueType::String.has_dynamic_storage());
        assert!(ValueType::ElementXi.has_dynamic_storage());
        assert!(ValueType::IntArray.has_dynamic_storage());
        assert!(!ValueType::Double.has_dynamic_storage());
    }
}
