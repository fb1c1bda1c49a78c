//! Shared configuration types.
//!
//! Every configuration struct in the workspace is plain data with a
//! `Default`, `DEFAULT_*` associated constants, and a `validate()` that
//! reports the first violated invariant as a [`ConfigError`].

use std::error::Error;
use std::fmt;

/// Errors detected when validating a configuration struct.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// A tolerance was NaN, infinite, negative, or not below its upper bound.
    InvalidTolerance {
        /// Name of the offending setting.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// A size or count limit was zero.
    ZeroLimit {
        /// Name of the offending setting.
        name: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTolerance { name, value } => {
                write!(f, "{name} must be finite and in [0, 0.5), got {value}")
            }
            Self::ZeroLimit { name } => write!(f, "{name} must be greater than zero"),
        }
    }
}

impl Error for ConfigError {}

/// Configuration for time-sequence lookups.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeConfig {
    /// How close (in the normalized interpolation coordinate between two
    /// bracketing times) a time must be to a stored time to be treated as
    /// that exact time.
    ///
    /// Default: `1e-5`.
    pub index_tolerance: f64,
}

impl TimeConfig {
    /// Default tolerance for exact time matches.
    pub const DEFAULT_INDEX_TOLERANCE: f64 = 1e-5;

    /// Check that the tolerance is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.index_tolerance;
        if !t.is_finite() || !(0.0..0.5).contains(&t) {
            return Err(ConfigError::InvalidTolerance {
                name: "index_tolerance",
                value: t,
            });
        }
        Ok(())
    }
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            index_tolerance: Self::DEFAULT_INDEX_TOLERANCE,
        }
    }
}
