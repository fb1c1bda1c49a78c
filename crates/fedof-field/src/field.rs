//! Field definitions and the [`FieldSet`] bitset.

use std::fmt;
use std::rc::Rc;

use fedof_core::{DescriptorError, FieldId, ValueType};

/// Definition of a field registered with a region.
///
/// A field declares the type of its values and how many vector components
/// it has. Where and how its values are stored on each node or element is
/// described by the field descriptors of those entities.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    id: FieldId,
    name: String,
    value_type: ValueType,
    component_count: usize,
}

/// Shared handle to a [`FieldDef`]; descriptors reference fields through it.
pub type SharedFieldDef = Rc<FieldDef>;

impl FieldDef {
    /// Define a field with at least one component.
    pub fn new(
        id: FieldId,
        name: impl Into<String>,
        value_type: ValueType,
        component_count: usize,
    ) -> Result<SharedFieldDef, DescriptorError> {
        if component_count == 0 {
            return Err(DescriptorError::InvalidArgument {
                reason: format!("field {id} must have at least one component"),
            });
        }
        Ok(Rc::new(Self {
            id,
            name: name.into(),
            value_type,
            component_count,
        }))
    }

    /// The field identifier.
    pub fn id(&self) -> FieldId {
        self.id
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type of the stored values.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Number of vector components.
    pub fn component_count(&self) -> usize {
        self.component_count
    }
}

impl fmt::Display for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// A set of field IDs implemented as a dynamically-sized bitset.
///
/// Used by the change log to record which fields changed, and by merges to
/// report which fields were touched.
#[derive(Clone, Debug, Default)]
pub struct FieldSet {
    bits: Vec<u64>,
}

impl FieldSet {
    const BITS_PER_WORD: usize = 64;

    /// Create an empty field set.
    pub fn empty() -> Self {
        Self { bits: Vec::new() }
    }

    /// Insert a field ID. Returns true if it was not already present.
    pub fn insert(&mut self, field: FieldId) -> bool {
        let word = field.0 as usize / Self::BITS_PER_WORD;
        let bit = 1u64 << (field.0 as usize % Self::BITS_PER_WORD);
        if word >= self.bits.len() {
            self.bits.resize(word + 1, 0);
        }
        let added = self.bits[word] & bit == 0;
        self.bits[word] |= bit;
        added
    }

    /// Check whether the set contains a field ID.
    pub fn contains(&self, field: FieldId) -> bool {
        let word = field.0 as usize / Self::BITS_PER_WORD;
        let bit = field.0 as usize % Self::BITS_PER_WORD;
        word < self.bits.len() && (self.bits[word] & (1u64 << bit)) != 0
    }

    /// Add every field of `other` to this set.
    pub fn union_with(&mut self, other: &Self) {
        if other.bits.len() > self.bits.len() {
            self.bits.resize(other.bits.len(), 0);
        }
        for (word, theirs) in self.bits.iter_mut().zip(&other.bits) {
            *word |= theirs;
        }
    }

    /// Returns `true` if the set contains no fields.
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }

    /// Returns the number of fields in the set.
    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate over the field IDs in the set, in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.bits.iter().enumerate().flat_map(|(index, &word)| {
            (0..Self::BITS_PER_WORD)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| FieldId((index * Self::BITS_PER_WORD + bit) as u32))
        })
    }
}

impl PartialEq for FieldSet {
    fn eq(&self, other: &Self) -> bool {
        let max_len = self.bits.len().max(other.bits.len());
        (0..max_len).all(|i| {
            self.bits.get(i).copied().unwrap_or(0) == other.bits.get(i).copied().unwrap_or(0)
        })
    }
}

impl Eq for FieldSet {}

impl FromIterator<FieldId> for FieldSet {
    fn from_iter<I: IntoIterator<Item = FieldId>>(iter: I) -> Self {
        let mut set = Self::empty();
        for field in iter {
            set.insert(field);
        }
        set
    }
}
