//! Worker configuration.

use serde::{Deserialize, Serialize};

/// Sizes of the engine's thread pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of render pool threads.
    /// Default: 2.
    pub render_workers: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { render_workers: 2 }
    }
}

impl WorkerConfig {
    pub fn new(render_workers: usize) -> Self {
        Self { render_workers }
    }

    /// Render worker count, never below one.
    pub fn effective_render_workers(&self) -> usize {
        self.render_workers.max(1)
    }
}
