//! Benchmark data for the fedof DOF engine.
//!
//! Provides deterministic inputs shared by the criterion benches:
//!
//! - [`random_values`]: seeded values in `[-1, 1)`
//! - [`time_steps`]: evenly spaced time sequences
//! - [`timed_block`]: a block of time-sequenced doubles filled from a seed

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use fedof_core::{StorageError, TimeSequence, ValueType};
use fedof_storage::{StorageConfig, ValueBlock};
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Tolerance used when matching benchmark times.
pub const TIME_TOLERANCE: f64 = 1e-9;

/// Generate `count` deterministic values in `[-1, 1)`.
pub fn random_values(count: usize, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            // 53 random mantissa bits
            let unit = (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
            unit * 2.0 - 1.0
        })
        .collect()
}

/// `count` times starting at `start`, `step` apart.
pub fn time_steps(start: f64, step: f64, count: usize) -> Result<TimeSequence, StorageError> {
    TimeSequence::new((0..count).map(|i| start + step * i as f64).collect::<Vec<_>>())
}

/// A block of `count` doubles following `times`, filled with seeded values.
pub fn timed_block(times: &TimeSequence, count: usize, seed: u64) -> Result<ValueBlock, StorageError> {
    let config = StorageConfig {
        max_block_bytes: usize::MAX,
    };
    let mut block = ValueBlock::allocate(ValueType::Double, Some(times), count, &config)?;
    let values = random_values(count * times.len(), seed);
    for offset in 0..count {
        for (index, &time) in times.times().iter().enumerate() {
            let value = values[offset * times.len() + index];
            block.set_real_value(offset, Some(times), time, TIME_TOLERANCE, value)?;
        }
    }
    Ok(block)
}
