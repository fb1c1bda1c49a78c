//! Element-owned scale factors, partitioned into identified sets.

use fedof_core::{DescriptorError, EvaluationError, RangeKind, ScaleFactorSetId};

/// One declared set: its identifier and number of factors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScaleFactorSet {
    /// Mesh-wide identifier of the set.
    pub id: ScaleFactorSetId,
    /// Number of factors in the set.
    pub count: usize,
}

/// The scale factors of one element.
///
/// Sets are stored back to back in declaration order in one flat array.
/// DOF maps address a factor by its index within one set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScaleFactorTable {
    sets: Vec<ScaleFactorSet>,
    values: Vec<f64>,
}

impl ScaleFactorTable {
    /// A table with no sets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a set of `count` factors, initialised to 1. Returns the offset
    /// of its first factor in the flat array.
    pub fn add_set(&mut self, id: ScaleFactorSetId, count: usize) -> Result<usize, DescriptorError> {
        if self.has_set(id) {
            return Err(DescriptorError::InvalidArgument {
                reason: format!("scale factor set {id} is already declared"),
            });
        }
        let offset = self.values.len();
        self.values
            .try_reserve_exact(count)
            .map_err(|_| fedof_core::StorageError::OutOfMemory {
                requested: count * std::mem::size_of::<f64>(),
            })?;
        self.values.resize(offset + count, 1.0);
        self.sets.push(ScaleFactorSet { id, count });
        Ok(offset)
    }

    /// Whether set `id` is declared.
    pub fn has_set(&self, id: ScaleFactorSetId) -> bool {
        self.sets.iter().any(|s| s.id == id)
    }

    /// Declared sets, in declaration order.
    pub fn sets(&self) -> &[ScaleFactorSet] {
        &self.sets
    }

    /// Number of factors in set `id`.
    pub fn set_count(&self, id: ScaleFactorSetId) -> Option<usize> {
        self.sets.iter().find(|s| s.id == id).map(|s| s.count)
    }

    /// Offset of set `id`'s first factor in the flat array.
    pub fn set_offset(&self, id: ScaleFactorSetId) -> Option<usize> {
        let mut offset = 0;
        for set in &self.sets {
            if set.id == id {
                return Some(offset);
            }
            offset += set.count;
        }
        None
    }

    /// The factors of set `id`.
    pub fn values_for(&self, id: ScaleFactorSetId) -> Option<&[f64]> {
        let offset = self.set_offset(id)?;
        let count = self.set_count(id)?;
        self.values.get(offset..offset + count)
    }

    /// Mutable factors of set `id`.
    pub fn values_for_mut(&mut self, id: ScaleFactorSetId) -> Option<&mut [f64]> {
        let offset = self.set_offset(id)?;
        let count = self.set_count(id)?;
        self.values.get_mut(offset..offset + count)
    }

    /// Factor `index` of set `id`.
    pub fn get_value(&self, id: ScaleFactorSetId, index: usize) -> Result<f64, EvaluationError> {
        let values = self
            .values_for(id)
            .ok_or(EvaluationError::MissingScaleFactorSet { set: id })?;
        values.get(index).copied().ok_or(EvaluationError::OutOfRange {
            kind: RangeKind::ScaleFactor,
            index,
            limit: values.len(),
        })
    }

    /// Overwrite factor `index` of set `id`.
    pub fn set_value(&mut self, id: ScaleFactorSetId, index: usize, value: f64) -> Result<(), EvaluationError> {
        let values = self
            .values_for_mut(id)
            .ok_or(EvaluationError::MissingScaleFactorSet { set: id })?;
        let limit = values.len();
        let slot = values.get_mut(index).ok_or(EvaluationError::OutOfRange {
            kind: RangeKind::ScaleFactor,
            index,
            limit,
        })?;
        *slot = value;
        Ok(())
    }

    /// All factors, sets back to back.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Total number of factors.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the table holds no factors.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
