//! Engine configuration. Validated once at construction, never mid-operation.

/// Hard ceiling on banks. Lets reads sample every bank onto the stack.
pub const MAX_BANKS: usize = 64;

pub const DEFAULT_BANKS: usize = 16;

/// Per-bank undo reach.
pub const DEFAULT_HISTORY_CAPACITY: usize = 4096;

/// Ceiling on per-bank undo reach. Bounds the up-front allocation of every
/// history ring and of the order log.
pub const MAX_HISTORY_CAPACITY: usize = 1 << 20;

/// Rejected configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("bank count must be at least 1")]
    ZeroBanks,
    #[error("bank count {requested} exceeds the maximum of {max}")]
    TooManyBanks { requested: usize, max: usize },
    #[error("rollback history capacity must be at least 1")]
    ZeroHistoryCapacity,
    #[error("rollback history capacity {requested} exceeds the maximum of {max}")]
    HistoryCapacityTooLarge { requested: usize, max: usize },
}

/// How ACCUMULATE picks a bank. Either choice is correct; only throughput differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Distribution {
    /// Cyclic cursor. Even load without looking at the delta.
    #[default]
    RoundRobin = 0,
    /// Bank chosen from the delta's fingerprint.
    Hashed = 1,
}

impl Distribution {
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::RoundRobin),
            1 => Some(Self::Hashed),
            _ => None,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of independent banks, fixed until `rebank`.
    pub banks: usize,
    /// Deltas each bank can undo.
    pub history_capacity: usize,
    pub distribution: Distribution,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            banks: DEFAULT_BANKS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            distribution: Distribution::RoundRobin,
        }
    }
}

impl EngineConfig {
    pub const fn with_banks(mut self, banks: usize) -> Self {
        self.banks = banks;
        self
    }

    pub const fn with_history_capacity(mut self, history_capacity: usize) -> Self {
        self.history_capacity = history_capacity;
        self
    }

    pub const fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.banks == 0 {
            return Err(ConfigError::ZeroBanks);
        }
        if self.banks > MAX_BANKS {
            return Err(ConfigError::TooManyBanks {
                requested: self.banks,
                max: MAX_BANKS,
            });
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroHistoryCapacity);
        }
        let too_large = ConfigError::HistoryCapacityTooLarge {
            requested: self.history_capacity,
            max: MAX_HISTORY_CAPACITY,
        };
        if self.history_capacity > MAX_HISTORY_CAPACITY {
            return Err(too_large);
        }
        match self.banks.checked_mul(self.history_capacity) {
            Some(_) => Ok(()),
            None => Err(too_large),
        }
    }

    /// Capacity of the global order log: enough to name every retained delta.
    /// Exact for any config that passed `validate`.
    #[inline(always)]
    pub const fn order_capacity(&self) -> usize {
        self.banks.saturating_mul(self.history_capacity)
    }
}
