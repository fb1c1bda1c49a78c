//! Stateful merge driver for bulk node and element merges.

use std::rc::Rc;

use fedof_core::{ConfigError, MergeError, TimeSequencePool};
use fedof_element::{Element, ElementFieldInfo, ElementFieldInfoRegistry};
use fedof_field::{FieldChange, FieldChangeLog, LastLoggedInfo, Node, NodeFieldInfo, NodeFieldInfoRegistry};

use crate::config::MergeConfig;
use crate::element::merge_element_fields;
use crate::node::merge_node_fields;

/// Merges incoming node and element definitions into existing ones.
///
/// A `Merger` lives for one bulk merge: it shares merged time sequences
/// through its pool and records every changed field in one change log,
/// skipping descriptors it has just logged.
#[derive(Debug)]
pub struct Merger {
    config: MergeConfig,
    pool: TimeSequencePool,
    log: FieldChangeLog,
    last_node: LastLoggedInfo<NodeFieldInfo>,
    last_element: LastLoggedInfo<ElementFieldInfo>,
    merged_nodes: usize,
    merged_elements: usize,
}

impl Merger {
    /// A merger using `config`, which is validated first.
    pub fn new(config: MergeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            pool: TimeSequencePool::new(config.time.index_tolerance),
            log: FieldChangeLog::new(),
            last_node: LastLoggedInfo::new(),
            last_element: LastLoggedInfo::new(),
            merged_nodes: 0,
            merged_elements: 0,
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merge `source`'s fields into `target`, a node with the same
    /// identifier.
    ///
    /// On success `target` switches to a descriptor shared through
    /// `registry`. On failure neither node changes.
    pub fn merge_node(
        &mut self,
        target: &mut Node,
        source: &Node,
        registry: &mut NodeFieldInfoRegistry,
    ) -> Result<(), MergeError> {
        if target.id() != source.id() {
            return Err(MergeError::InvalidArgument {
                reason: format!("cannot merge node {} into node {}", source.id(), target.id()),
            });
        }
        let merged = merge_node_fields(
            target.field_info(),
            target.values(),
            source.field_info(),
            source.values(),
            &mut self.pool,
            &self.config,
        )?;

        let added: Vec<_> = source
            .field_info()
            .fields()
            .iter()
            .filter(|f| !target.field_info().has_field(f.id()))
            .map(|f| f.id())
            .collect();
        let retimed: Vec<_> = target
            .field_info()
            .fields()
            .iter()
            .filter(|f| {
                let after = merged.info.field(f.id()).and_then(|m| m.time_sequence());
                match (f.time_sequence(), after) {
                    (Some(before), Some(after)) => !Rc::ptr_eq(before, after),
                    (None, None) => false,
                    _ => true,
                }
            })
            .map(|f| f.id())
            .collect();

        let shared = registry.adopt(merged.info);
        let (old, _) = target.replace_definition(shared, merged.values);
        registry.release(old);

        self.log
            .log_fields_of(source.field_info(), FieldChange::Values, &mut self.last_node);
        for field in retimed {
            self.log.record(field, FieldChange::Definition);
        }
        for field in added {
            self.log.record(field, FieldChange::Added);
        }
        self.merged_nodes += 1;
        Ok(())
    }

    /// Merge `source`'s nodes, scale factors and fields into `target`, an
    /// element with the same identifier.
    ///
    /// On success `target` switches to a descriptor shared through
    /// `registry`. On failure neither element changes.
    pub fn merge_element(
        &mut self,
        target: &mut Element,
        source: &Element,
        registry: &mut ElementFieldInfoRegistry,
    ) -> Result<(), MergeError> {
        let merged = merge_element_fields(target, source, &self.config)?;
        let shared = registry.adopt(merged.info);
        let (old, _) = target.replace_definition(shared, merged.node_scale);
        registry.release(old);

        self.log
            .log_fields_of(source.field_info(), FieldChange::Values, &mut self.last_element);
        for (field, change) in merged.changes {
            self.log.record(field, change);
        }
        self.merged_elements += 1;
        Ok(())
    }

    /// Fields changed so far.
    pub fn change_log(&self) -> &FieldChangeLog {
        &self.log
    }

    /// Take the change log, leaving an empty one.
    pub fn take_change_log(&mut self) -> FieldChangeLog {
        self.last_node.reset();
        self.last_element.reset();
        std::mem::take(&mut self.log)
    }

    /// Time sequences created or shared by merges.
    pub fn time_sequences(&self) -> &TimeSequencePool {
        &self.pool
    }

    /// Number of nodes and elements merged so far.
    pub fn merged_counts(&self) -> (usize, usize) {
        (self.merged_nodes, self.merged_elements)
    }
}
