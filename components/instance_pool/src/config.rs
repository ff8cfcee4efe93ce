//! Pool sizing policy

use crate::error::PoolConfigError;
use serde::{Deserialize, Serialize};

/// Sizing policy shared by every pool in a registry.
///
/// # Example
///
/// ```
/// use instance_pool::PoolConfig;
///
/// let config = PoolConfig::default().with_warmup_calls(1_000);
/// assert_eq!(config.initial_capacity, 10);
/// assert_eq!(config.max_capacity, 128);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Capacity each pool starts with and returns to on reset
    pub initial_capacity: usize,
    /// Ceiling for adaptive growth
    pub max_capacity: usize,
    /// Instances fabricated eagerly when a script is added or updated
    pub prewarm: usize,
    /// Calls a pool must see before its capacity may grow
    pub warmup_calls: u64,
    /// Miss ratio above which capacity grows by one per call
    pub miss_ratio_threshold: f64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 10,
            max_capacity: 128,
            prewarm: 0,
            warmup_calls: 100_000,
            miss_ratio_threshold: 0.01,
        }
    }
}

impl PoolConfig {
    /// Set the capacity floor
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Set the capacity ceiling
    pub fn with_max_capacity(mut self, capacity: usize) -> Self {
        self.max_capacity = capacity;
        self
    }

    /// Set the pre-population count
    pub fn with_prewarm(mut self, count: usize) -> Self {
        self.prewarm = count;
        self
    }

    /// Set the warm-up call threshold
    pub fn with_warmup_calls(mut self, calls: u64) -> Self {
        self.warmup_calls = calls;
        self
    }

    /// Set the miss ratio threshold
    pub fn with_miss_ratio_threshold(mut self, ratio: f64) -> Self {
        self.miss_ratio_threshold = ratio;
        self
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<(), PoolConfigError> {
        if self.initial_capacity == 0 {
            return Err(PoolConfigError::ZeroCapacity);
        }
        if self.initial_capacity > self.max_capacity {
            return Err(PoolConfigError::FloorAboveCeiling {
                initial: self.initial_capacity,
                max: self.max_capacity,
            });
        }
        if !(self.miss_ratio_threshold > 0.0 && self.miss_ratio_threshold <= 1.0) {
            return Err(PoolConfigError::MissRatio(self.miss_ratio_threshold));
        }
        if self.prewarm > self.initial_capacity {
            return Err(PoolConfigError::Prewarm {
                prewarm: self.prewarm,
                initial: self.initial_capacity,
            });
        }
        Ok(())
    }
}
