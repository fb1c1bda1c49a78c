//! Merging the fields of two definitions of the same node.

use log::debug;

use fedof_core::{MergeError, SharedTimeSequence, TimeSequencePool};
use fedof_field::{merge_conflict, NodeField, NodeFieldInfo};
use fedof_storage::{ValueBlock, ValueRegion};

use crate::config::MergeConfig;
use crate::time::{reconcile, time_error};

/// A merged node definition, built without touching either input.
#[derive(Debug)]
pub struct MergedNodeFields {
    /// The merged descriptor, not yet shared through a registry.
    pub info: NodeFieldInfo,
    /// Values laid out as `info` describes.
    pub values: ValueBlock,
}

/// Merge `source`'s fields and values into `target`'s.
///
/// Fields on one side only are carried over; fields on both sides must
/// have the same layout and take the source's values, merged onto the
/// union of times when time-varying. A field time-varying on one side and
/// constant on the other cannot be merged.
pub fn merge_node_fields(
    target_info: &NodeFieldInfo,
    target_values: &ValueBlock,
    source_info: &NodeFieldInfo,
    source_values: &ValueBlock,
    pool: &mut TimeSequencePool,
    config: &MergeConfig,
) -> Result<MergedNodeFields, MergeError> {
    if let Some(field) = source_info.fields().iter().find(|s| {
        target_info
            .field(s.id())
            .is_some_and(|t| t.time_sequence().is_some() != s.time_sequence().is_some())
    }) {
        return Err(MergeError::IncompatibleTimeMapping {
            field: field.id(),
            reason: "time-varying on only one side".into(),
        });
    }
    if let Some((field, reason)) = merge_conflict(target_info, source_info) {
        return Err(MergeError::IncompatibleLayout { field, reason });
    }
    let tolerance = config.time.index_tolerance;

    let mut info = NodeFieldInfo::new();
    let mut values = ValueBlock::new();
    let ordered = target_info
        .fields()
        .iter()
        .chain(source_info.fields().iter().filter(|s| !target_info.has_field(s.id())));
    for field in ordered {
        let target = target_info.field(field.id());
        let source = source_info.field(field.id());
        let time_sequence = reconcile(
            field.id(),
            target.and_then(NodeField::time_sequence),
            source.and_then(NodeField::time_sequence),
            pool,
            config.overlap_policy,
            tolerance,
        )?;
        for component in field.components() {
            info.add_component(field.field(), time_sequence.as_ref(), component.layout)?;
        }
        let placed = info.field(field.id()).ok_or_else(|| MergeError::InvalidArgument {
            reason: format!("field {} missing from merged descriptor", field.id()),
        })?;
        values.extend(
            field.field().value_type(),
            time_sequence.as_deref(),
            placed.number_of_values(),
            &config.storage,
        )?;

        // target first so source values overlay it at shared times
        let timed = time_sequence.is_some();
        if let Some(target) = target.filter(|_| source.is_none() || timed) {
            copy_field(&mut values, placed, &time_sequence, target_values, target, config)?;
        }
        if let Some(source) = source {
            copy_field(&mut values, placed, &time_sequence, source_values, source, config)?;
        }
    }
    debug!(
        "merge: node fields {} + {} -> {} ({} values)",
        target_info.fields().len(),
        source_info.fields().len(),
        info.fields().len(),
        info.number_of_values()
    );
    Ok(MergedNodeFields { info, values })
}

fn copy_field(
    values: &mut ValueBlock,
    placed: &NodeField,
    time_sequence: &Option<SharedTimeSequence>,
    from_values: &ValueBlock,
    from: &NodeField,
    config: &MergeConfig,
) -> Result<(), MergeError> {
    let value_type = placed.field().value_type();
    for (dest, src) in placed.components().iter().zip(from.components()) {
        let dest_region = ValueRegion {
            offset: dest.value_offset,
            time_sequence: time_sequence.as_deref(),
        };
        let src_region = ValueRegion {
            offset: src.value_offset,
            time_sequence: from.time_sequence().map(|ts| &**ts),
        };
        let count = src.layout.number_of_values();
        let tolerance = config.time.index_tolerance;
        let copied = if config.optimised_time_mapping {
            values.copy_values(dest_region, from_values, src_region, value_type, count, tolerance)
        } else {
            values.copy_values_by_time(dest_region, from_values, src_region, value_type, count, tolerance)
        };
        copied.map_err(|e| time_error(placed.id(), e))?;
    }
    Ok(())
}
