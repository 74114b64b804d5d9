//! Render cache configuration.
//!
//! Capacity is derived from a memory budget: either an explicit override or
//! the memory the system reports as available, divided by `budget_divisor`.

use serde::{Deserialize, Serialize};

/// Configuration for [`crate::PageRenderCache`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderCacheConfig {
    /// Scale factor pages are first rasterized at
    pub render_scale: f32,
    /// Scale factor used for the single retry after an allocation failure
    pub fallback_scale: f32,
    /// Fraction of the memory budget the cache may hold, as a divisor
    pub budget_divisor: u32,
    /// Memory budget override in megabytes; detected from the system when unset
    pub memory_budget_mb: Option<u64>,
    /// Exact capacity in bytes, taking precedence over the budget
    pub capacity_bytes: Option<usize>,
}

impl Default for RenderCacheConfig {
    fn default() -> Self {
        Self {
            render_scale: 1.5,
            fallback_scale: 1.0,
            budget_divisor: 8,
            memory_budget_mb: None,
            capacity_bytes: None,
        }
    }
}

impl RenderCacheConfig {
    /// Sets the memory budget in megabytes.
    pub fn with_memory_budget_mb(mut self, mb: u64) -> Self {
        self.memory_budget_mb = Some(mb);
        self
    }

    /// Sets the cache capacity directly, ignoring the budget.
    pub fn with_capacity_bytes(mut self, bytes: usize) -> Self {
        self.capacity_bytes = Some(bytes);
        self
    }

    /// Sets the first-attempt and retry scale factors.
    pub fn with_scales(mut self, render_scale: f32, fallback_scale: f32) -> Self {
        self.render_scale = render_scale;
        self.fallback_scale = fallback_scale;
        self
    }
}
