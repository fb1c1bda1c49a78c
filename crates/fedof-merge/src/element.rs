//! Merging the field definitions of two descriptions of the same element.
//!
//! The node array and scale factors are merged first, then source DOF maps
//! are re-expressed against the merged node array. A field already defined
//! with interchangeable maps keeps its definition; otherwise the source's
//! definition replaces it.

use log::debug;

use fedof_core::{FieldId, MergeError};
use fedof_element::{Element, ElementField, ElementFieldComponent, ElementFieldInfo};
use fedof_field::{FieldChange, NodeHandle, SharedFieldDef};
use fedof_map::{DofMatchCache, NodeScaleInfo};
use fedof_storage::ValueRegion;

use crate::config::MergeConfig;
use crate::time::time_error;

/// A merged element definition, built without touching either input.
#[derive(Debug)]
pub struct MergedElementFields {
    /// The merged descriptor, not yet shared through a registry.
    pub info: ElementFieldInfo,
    /// Merged nodes, scale factors and grid values.
    pub node_scale: NodeScaleInfo,
    /// How each source field changed the target, in source order.
    pub changes: Vec<(FieldId, FieldChange)>,
}

/// Merge `source`'s nodes, scale factors and fields into `target`'s.
pub fn merge_element_fields(
    target: &Element,
    source: &Element,
    config: &MergeConfig,
) -> Result<MergedElementFields, MergeError> {
    if target.id() != source.id() {
        return Err(MergeError::InvalidArgument {
            reason: format!("cannot merge element {} into element {}", source.id(), target.id()),
        });
    }
    let mut node_scale = target.node_scale().try_clone()?;
    merge_nodes(&mut node_scale, source.node_scale());
    merge_scale_factors(&mut node_scale, source.node_scale())?;

    let mut info = ElementFieldInfo::clone(target.field_info());
    let mut changes = Vec::new();
    for field in source.field_info().fields() {
        let components: Vec<ElementFieldComponent> = field
            .components()
            .iter()
            .map(|c| reindexed(c, &node_scale, source.node_scale()))
            .collect();
        match target.field_info().field(field.id()) {
            Some(existing) => {
                check_layout(existing, field)?;
                let mut matcher = DofMatchCache::new(target.node_scale(), source.node_scale());
                if interchangeable(existing, field, &mut matcher) {
                    if field.number_of_element_values() > 0 {
                        changes.push((field.id(), FieldChange::Values));
                    }
                    continue;
                }
                info.replace_field(ElementField::new(SharedFieldDef::clone(field.field()), components))?;
                changes.push((field.id(), FieldChange::Definition));
            }
            None => {
                let before = info.number_of_values();
                let after = info.add_field(ElementField::new(SharedFieldDef::clone(field.field()), components))?;
                if after > before {
                    node_scale
                        .values_mut()
                        .extend(field.field().value_type(), None, after - before, &config.storage)?;
                }
                changes.push((field.id(), FieldChange::Added));
            }
        }
    }
    copy_grid_values(&info, &mut node_scale, source, config)?;
    debug!(
        "merge: element {} fields {} + {} -> {}, nodes {} -> {}",
        target.id(),
        target.field_info().fields().len(),
        source.field_info().fields().len(),
        info.fields().len(),
        target.node_scale().node_count(),
        node_scale.node_count()
    );
    Ok(MergedElementFields {
        info,
        node_scale,
        changes,
    })
}

/// Add source nodes the target lacks, into the same local slot when the
/// target leaves it empty and appended otherwise.
fn merge_nodes(merged: &mut NodeScaleInfo, source: &NodeScaleInfo) {
    for (local, slot) in source.nodes().iter().enumerate() {
        let Some(node) = slot else { continue };
        let id = node.borrow().id();
        if merged.local_node_of(id).is_some() {
            continue;
        }
        let free = merged.nodes().get(local).is_some_and(Option::is_none);
        if free && merged.set_node(local, Some(NodeHandle::clone(node))).is_ok() {
            continue;
        }
        let placed = merged.push_node(Some(NodeHandle::clone(node)));
        debug!("merge: node {id} appended at local index {placed}");
    }
}

/// Declare source sets missing from the target and take source values for
/// every source set. Shared sets must have equal sizes.
fn merge_scale_factors(merged: &mut NodeScaleInfo, source: &NodeScaleInfo) -> Result<(), MergeError> {
    let source_table = source.scale_factors();
    for set in source_table.sets() {
        match merged.scale_factors().set_count(set.id) {
            Some(count) if count != set.count => {
                return Err(MergeError::ScaleFactorSetSizeMismatch {
                    set: set.id,
                    target: count,
                    source: set.count,
                })
            }
            Some(_) => {}
            None => {
                merged.scale_factors_mut().add_set(set.id, set.count)?;
            }
        }
        if let (Some(from), Some(into)) = (
            source_table.values_for(set.id),
            merged.scale_factors_mut().values_for_mut(set.id),
        ) {
            into.copy_from_slice(from);
        }
    }
    Ok(())
}

fn reindexed(
    component: &ElementFieldComponent,
    merged: &NodeScaleInfo,
    source: &NodeScaleInfo,
) -> ElementFieldComponent {
    if component.is_grid_based() {
        return component.clone();
    }
    component.with_maps(
        component
            .maps()
            .iter()
            .map(|map| map.clone_with_new_node_indices(merged, source))
            .collect(),
    )
}

fn check_layout(target: &ElementField, source: &ElementField) -> Result<(), MergeError> {
    if target.components().len() != source.components().len() {
        return Err(MergeError::IncompatibleLayout {
            field: target.id(),
            reason: format!(
                "{} components in target, {} in source",
                target.components().len(),
                source.components().len()
            ),
        });
    }
    let grids = target
        .components()
        .iter()
        .zip(source.components())
        .position(|(t, s)| t.grid().map(|g| &g.number_in_xi) != s.grid().map(|g| &g.number_in_xi));
    match grids {
        Some(component) => Err(MergeError::IncompatibleLayout {
            field: target.id(),
            reason: format!("component {component} differs in grid layout"),
        }),
        None => Ok(()),
    }
}

fn interchangeable(target: &ElementField, source: &ElementField, matcher: &mut DofMatchCache<'_>) -> bool {
    target.components().iter().zip(source.components()).all(|(t, s)| {
        t.basis() == s.basis()
            && t.scale_factor_set() == s.scale_factor_set()
            && t.number_of_maps() == s.number_of_maps()
            && (t.is_grid_based()
                || t.maps().iter().zip(s.maps()).all(|(a, b)| a.matches_with_info(b, matcher)))
    })
}

fn copy_grid_values(
    info: &ElementFieldInfo,
    merged: &mut NodeScaleInfo,
    source: &Element,
    config: &MergeConfig,
) -> Result<(), MergeError> {
    for field in source.field_info().fields() {
        let Some(placed) = info.field(field.id()) else { continue };
        for (into, from) in placed.components().iter().zip(field.components()) {
            let (Some(into), Some(from)) = (into.grid(), from.grid()) else { continue };
            merged
                .values_mut()
                .copy_values(
                    ValueRegion::new(into.value_offset),
                    source.grid_values(),
                    ValueRegion::new(from.value_offset),
                    field.field().value_type(),
                    from.number_of_values(),
                    config.time.index_tolerance,
                )
                .map_err(|e| time_error(field.id(), e))?;
        }
    }
    Ok(())
}
