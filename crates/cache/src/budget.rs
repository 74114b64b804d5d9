//! Memory budget detection.

use sysinfo::System;
use tracing::debug;

use crate::config::RenderCacheConfig;

/// Budget assumed when the system reports no available memory.
pub const FALLBACK_BUDGET_BYTES: u64 = 1024 * 1024 * 1024;

/// Memory the system currently reports as available, in bytes.
pub fn detect_available_memory() -> Option<u64> {
    let mut system = System::new();
    system.refresh_memory();
    let available = system.available_memory();
    (available > 0).then_some(available)
}

/// Cache capacity in bytes for `config`.
///
/// # Arguments
///
/// * `config` - Cache configuration; `capacity_bytes` wins over
///   `memory_budget_mb`, which wins over the detected budget
pub fn cache_capacity(config: &RenderCacheConfig) -> usize {
    if let Some(bytes) = config.capacity_bytes {
        return bytes;
    }
    let budget = match config.memory_budget_mb {
        Some(mb) => mb.saturating_mul(1024 * 1024),
        None => detect_available_memory().unwrap_or(FALLBACK_BUDGET_BYTES),
    };
    let capacity = budget / u64::from(config.budget_divisor.max(1));
    debug!(budget, capacity, "render cache capacity");
    usize::try_from(capacity).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_budget_is_divided() {
        let config = RenderCacheConfig::default().with_memory_budget_mb(800);
        assert_eq!(cache_capacity(&config), 100 * 1024 * 1024);
    }

    #[test]
    fn test_capacity_override_wins() {
        let config = RenderCacheConfig::default().with_memory_budget_mb(800).with_capacity_bytes(4096);
        assert_eq!(cache_capacity(&config), 4096);
    }

    #[test]
    fn test_zero_divisor_is_treated_as_one() {
        let config = RenderCacheConfig { budget_divisor: 0, ..RenderCacheConfig::default() }.with_memory_budget_mb(1);
        assert_eq!(cache_capacity(&config), 1024 * 1024);
    }

    #[test]
    fn test_detected_budget_is_positive() {
        assert!(cache_capacity(&RenderCacheConfig::default()) > 0);
    }
}
