//! Pseudo-random counter and gauge sequences.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// An infinite, stateful stream of values.
pub trait ValueSequence: core::fmt::Debug + Send {
    fn next_value(&mut self) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueConfig {
    pub min_value: f64,
    pub max_value: f64,
    /// Upper bound of the per-tick change: `[0, max]` for counters and
    /// `[-max, +max]` for gauges.
    pub max_change_value: f64,
    /// `0` seeds every sequence from entropy.
    pub change_rand_seed: u64,
}
impl ValueConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("min_value", self.min_value),
            ("max_value", self.max_value),
            ("max_change_value", self.max_change_value),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field, value });
            }
        }
        if self.min_value > self.max_value {
            return Err(ConfigError::InvalidBounds {
                min: self.min_value,
                max: self.max_value,
            });
        }
        if self.max_change_value < 0. {
            return Err(ConfigError::NegativeChange(self.max_change_value));
        }
        Ok(())
    }
}
impl Default for ValueConfig {
    fn default() -> Self {
        Self {
            min_value: 0.,
            max_value: 10_000.,
            max_change_value: 10.,
            change_rand_seed: 0,
        }
    }
}

fn change_rng(seed: u64, stream: u64) -> ChaCha8Rng {
    let seed = match seed {
        0 => {
            let seed = rand::rng().random_range(1..=u64::MAX);
            tracing::debug!(seed, stream, "drew change seed from entropy");
            seed
        }
        seed => seed,
    };
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    rng
}

/// Monotonic increase with a reset to `min_value` once it leaves the bounds.
#[derive(Debug, Clone)]
pub struct RandCounter {
    config: ValueConfig,
    current: f64,
    change_rand: ChaCha8Rng,
}
impl RandCounter {
    pub fn new(config: ValueConfig) -> Self {
        Self::with_stream(config, 0)
    }
    pub fn with_stream(config: ValueConfig, stream: u64) -> Self {
        Self {
            config,
            current: config.min_value,
            change_rand: change_rng(config.change_rand_seed, stream),
        }
    }
}
impl ValueSequence for RandCounter {
    fn next_value(&mut self) -> f64 {
        let change = self.config.max_change_value * self.change_rand.random::<f64>();
        let next = self.current + change;
        self.current = if next > self.config.max_value || next < self.config.min_value {
            self.config.min_value
        } else {
            next
        };
        self.current
    }
}

/// Random walk clamped to `[min_value, max_value]`.
#[derive(Debug, Clone)]
pub struct RandGauge {
    config: ValueConfig,
    current: f64,
    change_rand: ChaCha8Rng,
}
impl RandGauge {
    pub fn new(config: ValueConfig) -> Self {
        Self::with_stream(config, 0)
    }
    pub fn with_stream(config: ValueConfig, stream: u64) -> Self {
        Self {
            config,
            current: config.min_value,
            change_rand: change_rng(config.change_rand_seed, stream),
        }
    }
}
impl ValueSequence for RandGauge {
    fn next_value(&mut self) -> f64 {
        let change = self.config.max_change_value * 2. * (self.change_rand.random::<f64>() - 0.5);
        let next = self.current + change;
        self.current = next.clamp(self.config.min_value, self.config.max_value);
        self.current
    }
}
