//! Merge configuration.

use fedof_core::{ConfigError, TimeConfig};
use fedof_storage::StorageConfig;

/// What to do when a field is time-varying on both sides and the two time
/// sequences overlap without one simply extending the other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// Merge onto the union of times; source values win at shared times.
    #[default]
    PreferSource,
    /// Refuse the merge with `IncompatibleTimeMapping`.
    Conflict,
}

/// Configuration for node and element merges.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MergeConfig {
    /// Handling of overlapping time sequences.
    ///
    /// Default: [`OverlapPolicy::PreferSource`].
    pub overlap_policy: OverlapPolicy,
    /// Copy time-varying values wholesale when sequences are identical, or
    /// into leading slots when one is a prefix of the other. When false,
    /// every time is placed by lookup.
    ///
    /// Default: `true`.
    pub optimised_time_mapping: bool,
    /// Tolerance for matching times.
    pub time: TimeConfig,
    /// Limits on the merged value blocks.
    pub storage: StorageConfig,
}

impl MergeConfig {
    /// Default for [`optimised_time_mapping`](Self::optimised_time_mapping).
    pub const DEFAULT_OPTIMISED_TIME_MAPPING: bool = true;

    /// Check the nested configurations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.time.validate()?;
        self.storage.validate()
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            overlap_policy: OverlapPolicy::default(),
            optimised_time_mapping: Self::DEFAULT_OPTIMISED_TIME_MAPPING,
            time: TimeConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}
