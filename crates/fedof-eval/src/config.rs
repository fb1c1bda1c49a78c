//! Evaluation configuration.

use fedof_core::{ConfigError, TimeConfig};

/// Configuration for element field evaluation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvalConfig {
    /// Tolerance for matching times.
    pub time: TimeConfig,
    /// How many levels of parent elements are searched for a field the
    /// element does not define itself. A face of a face of a cube needs 2.
    ///
    /// Default: 3. Must be non-zero.
    pub max_inheritance_depth: usize,
}

impl EvalConfig {
    /// Default for [`max_inheritance_depth`](Self::max_inheritance_depth).
    pub const DEFAULT_MAX_INHERITANCE_DEPTH: usize = 3;

    /// Check the depth limit and the nested time configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_inheritance_depth == 0 {
            return Err(ConfigError::ZeroLimit {
                name: "max_inheritance_depth",
            });
        }
        self.time.validate()
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            time: TimeConfig::default(),
            max_inheritance_depth: Self::DEFAULT_MAX_INHERITANCE_DEPTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(EvalConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_depth_rejected() {
        let config = EvalConfig {
            max_inheritance_depth: 0,
            ..EvalConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroLimit {
                name: "max_inheritance_depth"
            })
        );
    }
}
