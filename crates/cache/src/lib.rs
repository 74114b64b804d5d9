//! PDF Annotator Cache Library
//!
//! Bounded page bitmap cache with LRU eviction and out-of-memory degradation.

pub mod budget;
pub mod config;
pub mod render_cache;

pub use budget::{cache_capacity, detect_available_memory};
pub use config::RenderCacheConfig;
pub use render_cache::{CacheStats, PageBitmap, PageRenderCache, PageSource, RenderOutcome};
