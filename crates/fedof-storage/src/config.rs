//! Value block configuration.

use fedof_core::ConfigError;

/// Limits applied when allocating or growing value blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    /// Ceiling on the storage footprint of one value block, in bytes, as
    /// computed by [`size`](crate::size) over every value it holds.
    ///
    /// Default: 64 MiB. Must be non-zero.
    pub max_block_bytes: usize,
}

impl StorageConfig {
    /// Default per-block ceiling: 64 MiB.
    pub const DEFAULT_MAX_BLOCK_BYTES: usize = 64 * 1024 * 1024;

    /// Check the limits are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_block_bytes == 0 {
            return Err(ConfigError::ZeroLimit {
                name: "max_block_bytes",
            });
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_block_bytes: Self::DEFAULT_MAX_BLOCK_BYTES,
        }
    }
}
