//! Configuration for the bounded memoizer.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// Which entries a bounded memoizer gives up first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EvictionKind {
    /// Least recently used.
    #[default]
    Lru,
    /// Least frequently used, oldest first among equals.
    Lfu,
}

impl FromStr for EvictionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lru" => Ok(EvictionKind::Lru),
            "lfu" => Ok(EvictionKind::Lfu),
            other => Err(Error::Config(format!("unknown eviction policy `{}`", other))),
        }
    }
}

impl fmt::Display for EvictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionKind::Lru => f.write_str("lru"),
            EvictionKind::Lfu => f.write_str("lfu"),
        }
    }
}

/// Configuration options for [`crate::bounded::BoundedMemoized`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedConfig {
    /// Maximum number of cached results (0 = unlimited).
    pub max_capacity: usize,
    /// Eviction policy.
    pub eviction_policy: EvictionKind,
}

impl Default for BoundedConfig {
    fn default() -> Self {
        Self {
            max_capacity: 128,
            eviction_policy: EvictionKind::Lru,
        }
    }
}

impl BoundedConfig {
    /// Sets the maximum capacity.
    pub fn with_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Sets the eviction policy.
    pub fn with_eviction_policy(mut self, policy: EvictionKind) -> Self {
        self.eviction_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_eviction_kind() {
        assert_eq!("lru".parse::<EvictionKind>().unwrap(), EvictionKind::Lru);
        assert_eq!(" LFU ".parse::<EvictionKind>().unwrap(), EvictionKind::Lfu);
        assert!(matches!(
            "fifo".parse::<EvictionKind>(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_builder() {
        let config = BoundedConfig::default()
            .with_capacity(2)
            .with_eviction_policy(EvictionKind::Lfu);
        assert_eq!(config.max_capacity, 2);
        assert_eq!(config.eviction_policy.to_string(), "lfu");
    }
}
