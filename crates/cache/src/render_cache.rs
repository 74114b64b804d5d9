//! Page bitmap cache with LRU eviction
//!
//! Caches one rasterized bitmap per page, bounded by total bitmap bytes.
//! Rendering degrades under memory pressure instead of failing: an
//! allocation failure at the configured scale is retried once at the
//! fallback scale, and a page that still fails is reported unavailable.

use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use pdf_engine::{RenderRequest, RgbaImage};
use tracing::{debug, warn};

use crate::budget::cache_capacity;
use crate::config::RenderCacheConfig;

/// Rasterizes pages for the cache.
///
/// The cache never calls a source concurrently for the same page, but may
/// call it concurrently for different pages.
pub trait PageSource: Send + Sync {
    fn render(&self, request: RenderRequest) -> pdf_engine::Result<RgbaImage>;
}

impl<F> PageSource for F
where
    F: Fn(RenderRequest) -> pdf_engine::Result<RgbaImage> + Send + Sync,
{
    fn render(&self, request: RenderRequest) -> pdf_engine::Result<RgbaImage> {
        self(request)
    }
}

/// A rendered page and the scale it was actually rendered at.
#[derive(Debug, Clone)]
pub struct PageBitmap {
    pub page_index: u32,
    pub scale: f32,
    pub image: Arc<RgbaImage>,
}

impl PageBitmap {
    /// Memory size of the pixel data in bytes
    pub fn byte_size(&self) -> usize {
        self.image.as_raw().len()
    }
}

#[derive(Debug, Clone)]
pub enum RenderOutcome {
    Rendered(PageBitmap),
    /// The page could not be rendered at any scale.
    Unavailable,
}

impl RenderOutcome {
    pub fn bitmap(&self) -> Option<&PageBitmap> {
        match self {
            RenderOutcome::Rendered(bitmap) => Some(bitmap),
            RenderOutcome::Unavailable => None,
        }
    }
}

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Number of pages currently cached
    pub page_count: usize,

    /// Total bytes held by cached bitmaps
    pub memory_used: usize,

    /// Maximum bytes allowed
    pub memory_limit: usize,

    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,

    /// Renders that ended unavailable
    pub failures: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate memory utilization (0.0 to 1.0)
    pub fn memory_utilization(&self) -> f64 {
        if self.memory_limit == 0 {
            0.0
        } else {
            self.memory_used as f64 / self.memory_limit as f64
        }
    }
}

/// Result slot shared between the thread rendering a page and any thread
/// waiting for the same page.
#[derive(Default)]
struct InFlight {
    outcome: Mutex<Option<RenderOutcome>>,
    done: Condvar,
}

impl InFlight {
    fn wait(&self) -> RenderOutcome {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = self.done.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn complete(&self, outcome: RenderOutcome) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
        self.done.notify_all();
    }
}

struct CacheState {
    pages: HashMap<u32, PageBitmap>,

    /// LRU queue (most recently used at back, least recently used at front)
    lru_queue: VecDeque<u32>,

    in_flight: HashMap<u32, Arc<InFlight>>,

    /// Pages that failed at every scale since the last invalidation
    unavailable: HashSet<u32>,

    /// Bumped by `evict_all`; renders started under an older generation are
    /// returned to their callers but not cached.
    generation: u64,

    memory_used: usize,
    memory_limit: usize,
    stats: CacheStats,
}

impl CacheState {
    fn new(memory_limit: usize) -> Self {
        Self {
            pages: HashMap::new(),
            lru_queue: VecDeque::new(),
            in_flight: HashMap::new(),
            unavailable: HashSet::new(),
            generation: 0,
            memory_used: 0,
            memory_limit,
            stats: CacheStats { memory_limit, ..Default::default() },
        }
    }

    fn touch(&mut self, page_index: u32) {
        self.lru_queue.retain(|&p| p != page_index);
        self.lru_queue.push_back(page_index);
    }

    fn evict_lru(&mut self) -> bool {
        let Some(page_index) = self.lru_queue.pop_front() else {
            return false;
        };
        if let Some(bitmap) = self.pages.remove(&page_index) {
            self.memory_used = self.memory_used.saturating_sub(bitmap.byte_size());
            self.stats.evictions += 1;
            debug!(page_index, bytes = bitmap.byte_size(), "evicted page bitmap");
        }
        true
    }

    fn evict_to_fit(&mut self, required_size: usize) {
        while self.memory_used + required_size > self.memory_limit && !self.pages.is_empty() {
            if !self.evict_lru() {
                break;
            }
        }
    }

    fn insert(&mut self, bitmap: PageBitmap) {
        let size = bitmap.byte_size();
        if size > self.memory_limit {
            debug!(page_index = bitmap.page_index, size, "bitmap larger than cache; not retained");
            return;
        }
        if let Some(old) = self.pages.remove(&bitmap.page_index) {
            self.memory_used = self.memory_used.saturating_sub(old.byte_size());
        }
        self.evict_to_fit(size);
        self.memory_used += size;
        self.touch(bitmap.page_index);
        self.pages.insert(bitmap.page_index, bitmap);
    }

    fn sync_stats(&mut self) {
        self.stats.page_count = self.pages.len();
        self.stats.memory_used = self.memory_used;
        self.stats.memory_limit = self.memory_limit;
    }
}

enum Claim {
    Hit(PageBitmap),
    Unavailable,
    Wait(Arc<InFlight>),
    Render { slot: Arc<InFlight>, generation: u64 },
}

/// Bounded page bitmap cache over a [`PageSource`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use pdf_annotator_cache::{PageRenderCache, RenderCacheConfig, RenderOutcome};
/// use pdf_engine::{RenderRequest, RgbaImage};
///
/// let source = |request: RenderRequest| -> pdf_engine::Result<RgbaImage> {
///     let side = (100.0 * request.scale) as u32;
///     Ok(RgbaImage::new(side, side))
/// };
/// let config = RenderCacheConfig::default().with_capacity_bytes(16 * 1024 * 1024);
/// let cache = PageRenderCache::new(Arc::new(source), config);
///
/// assert!(matches!(cache.render_page(0), RenderOutcome::Rendered(_)));
/// assert!(cache.get(0).is_some());
/// println!("Hit rate: {:.2}%", cache.stats().hit_rate() * 100.0);
/// ```
pub struct PageRenderCache {
    state: Mutex<CacheState>,
    source: Arc<dyn PageSource>,
    config: RenderCacheConfig,
}

impl PageRenderCache {
    /// Create a cache whose capacity follows `config`
    ///
    /// # Arguments
    ///
    /// * `source` - Rasterizer the cache renders through
    /// * `config` - Scales and memory budget
    pub fn new(source: Arc<dyn PageSource>, config: RenderCacheConfig) -> Self {
        let limit = cache_capacity(&config);
        Self { state: Mutex::new(CacheState::new(limit)), source, config }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &RenderCacheConfig {
        &self.config
    }

    /// Cached bitmap of a page, without rendering
    pub fn get(&self, page_index: u32) -> Option<PageBitmap> {
        let mut state = self.lock();
        match state.pages.get(&page_index).cloned() {
            Some(bitmap) => {
                state.touch(page_index);
                state.stats.hits += 1;
                Some(bitmap)
            }
            None => {
                state.stats.misses += 1;
                None
            }
        }
    }

    /// Check if a page is cached without updating LRU tracking
    pub fn contains(&self, page_index: u32) -> bool {
        self.lock().pages.contains_key(&page_index)
    }

    /// Render a page at the configured scale
    pub fn render_page(&self, page_index: u32) -> RenderOutcome {
        self.render(page_index, self.config.render_scale)
    }

    /// Cached bitmap of a page, rendering it at `scale` on a miss.
    ///
    /// Blocks while another thread renders the same page and then returns
    /// that thread's result. Never panics; a page that cannot be rendered
    /// yields [`RenderOutcome::Unavailable`] until the next [`Self::evict_all`].
    ///
    /// # Arguments
    ///
    /// * `page_index` - Zero-based page index
    /// * `scale` - Scale of the first attempt; the retry uses the fallback scale
    pub fn render(&self, page_index: u32, scale: f32) -> RenderOutcome {
        let claim = {
            let mut state = self.lock();
            if let Some(bitmap) = state.pages.get(&page_index).cloned() {
                state.touch(page_index);
                state.stats.hits += 1;
                Claim::Hit(bitmap)
            } else if state.unavailable.contains(&page_index) {
                Claim::Unavailable
            } else if let Some(slot) = state.in_flight.get(&page_index) {
                Claim::Wait(Arc::clone(slot))
            } else {
                state.stats.misses += 1;
                let slot = Arc::new(InFlight::default());
                state.in_flight.insert(page_index, Arc::clone(&slot));
                Claim::Render { slot, generation: state.generation }
            }
        };

        let (slot, generation) = match claim {
            Claim::Hit(bitmap) => return RenderOutcome::Rendered(bitmap),
            Claim::Unavailable => return RenderOutcome::Unavailable,
            Claim::Wait(slot) => return slot.wait(),
            Claim::Render { slot, generation } => (slot, generation),
        };

        let outcome = self.rasterize(page_index, scale);

        {
            let mut state = self.lock();
            state.in_flight.remove(&page_index);
            if state.generation == generation {
                match &outcome {
                    RenderOutcome::Rendered(bitmap) => state.insert(bitmap.clone()),
                    RenderOutcome::Unavailable => {
                        state.unavailable.insert(page_index);
                    }
                }
            }
            if matches!(outcome, RenderOutcome::Unavailable) {
                state.stats.failures += 1;
            }
            state.sync_stats();
        }
        slot.complete(outcome.clone());
        outcome
    }

    fn attempt(&self, page_index: u32, scale: f32) -> pdf_engine::Result<RgbaImage> {
        let request = RenderRequest { page_index, scale };
        match panic::catch_unwind(AssertUnwindSafe(|| self.source.render(request))) {
            Ok(result) => result,
            Err(_) => Err(pdf_engine::PdfEngineError::Backend(format!("rasterizer panicked on page {page_index}"))),
        }
    }

    fn rasterize(&self, page_index: u32, scale: f32) -> RenderOutcome {
        let bitmap = |image: RgbaImage, scale: f32| {
            RenderOutcome::Rendered(PageBitmap { page_index, scale, image: Arc::new(image) })
        };

        let err = match self.attempt(page_index, scale) {
            Ok(image) => return bitmap(image, scale),
            Err(err) => err,
        };

        let fallback = self.config.fallback_scale;
        if err.is_out_of_memory() && fallback < scale {
            warn!(page_index, scale, fallback, "out of memory rendering page; retrying at lower scale");
            match self.attempt(page_index, fallback) {
                Ok(image) => return bitmap(image, fallback),
                Err(err) => warn!(page_index, error = %err, "page unavailable"),
            }
        } else {
            warn!(page_index, error = %err, "page unavailable");
        }
        RenderOutcome::Unavailable
    }

    /// Drop every cached bitmap and failure record.
    ///
    /// Renders already in flight still return to their callers but do not
    /// repopulate the cache.
    pub fn evict_all(&self) {
        let mut state = self.lock();
        let dropped = state.pages.len();
        state.pages.clear();
        state.lru_queue.clear();
        state.unavailable.clear();
        state.memory_used = 0;
        state.generation += 1;
        state.sync_stats();
        debug!(dropped, generation = state.generation, "render cache invalidated");
    }

    /// Get current cache statistics
    pub fn stats(&self) -> CacheStats {
        let mut state = self.lock();
        state.sync_stats();
        state.stats
    }

    /// Update the memory limit, evicting until usage fits
    pub fn set_memory_limit(&self, limit: usize) {
        let mut state = self.lock();
        state.memory_limit = limit;
        state.evict_to_fit(0);
        state.sync_stats();
    }

    pub fn memory_limit(&self) -> usize {
        self.lock().memory_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_engine::PdfEngineError;
    use rand::{Rng, SeedableRng};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Barrier};
    use std::thread;
    use std::time::Duration;

    /// 10x10 pixels per unit of scale, so 1.5 gives 900 bytes and 1.0 gives 400.
    struct FakeSource {
        calls: AtomicUsize,
        max_scale: f32,
        delay: Duration,
    }

    impl FakeSource {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0), max_scale: f32::INFINITY, delay: Duration::ZERO }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl PageSource for FakeSource {
        fn render(&self, request: RenderRequest) -> pdf_engine::Result<RgbaImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            let side = (10.0 * request.scale) as u32;
            if request.scale > self.max_scale {
                return Err(PdfEngineError::OutOfMemory { width: side, height: side });
            }
            Ok(RgbaImage::new(side, side))
        }
    }

    fn cache_with(source: Arc<FakeSource>, capacity: usize) -> PageRenderCache {
        PageRenderCache::new(source, RenderCacheConfig::default().with_capacity_bytes(capacity))
    }

    #[test]
    fn test_render_then_hit() {
        let source = Arc::new(FakeSource::new());
        let cache = cache_with(Arc::clone(&source), 10_000);

        let first = cache.render_page(0);
        assert_eq!(first.bitmap().map(|b| b.scale), Some(1.5));
        assert_eq!(first.bitmap().map(PageBitmap::byte_size), Some(900));
        assert!(cache.render_page(0).bitmap().is_some());
        assert_eq!(source.calls(), 1);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(stats.memory_used, 900);
        assert!(cache.get(7).is_none());
    }

    #[test]
    fn test_oom_retries_at_fallback_scale() {
        let source = Arc::new(FakeSource { max_scale: 1.0, ..FakeSource::new() });
        let cache = cache_with(Arc::clone(&source), 10_000);

        let outcome = cache.render_page(2);
        let bitmap = outcome.bitmap().unwrap();
        assert_eq!(bitmap.scale, 1.0);
        assert_eq!(bitmap.image.width(), 10);
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn test_unavailable_pages_are_not_retried_until_evicted() {
        let source = Arc::new(FakeSource { max_scale: 0.5, ..FakeSource::new() });
        let cache = cache_with(Arc::clone(&source), 10_000);

        assert!(matches!(cache.render_page(1), RenderOutcome::Unavailable));
        assert_eq!(source.calls(), 2);
        assert!(matches!(cache.render_page(1), RenderOutcome::Unavailable));
        assert_eq!(source.calls(), 2);
        assert_eq!(cache.stats().failures, 1);

        cache.evict_all();
        assert!(matches!(cache.render_page(1), RenderOutcome::Unavailable));
        assert_eq!(source.calls(), 4);
    }

    #[test]
    fn test_panicking_source_is_unavailable() {
        let source = |_: RenderRequest| -> pdf_engine::Result<RgbaImage> { panic!("rasterizer bug") };
        let cache = PageRenderCache::new(Arc::new(source), RenderCacheConfig::default().with_capacity_bytes(1024));
        assert!(matches!(cache.render_page(0), RenderOutcome::Unavailable));
    }

    #[test]
    fn test_lru_eviction() {
        let source = Arc::new(FakeSource::new());
        let cache = cache_with(source, 2_000);

        cache.render_page(0);
        cache.render_page(1);
        cache.get(0);
        cache.render_page(2);

        assert!(cache.contains(0));
        assert!(!cache.contains(1));
        assert!(cache.contains(2));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_oversized_bitmap_is_returned_not_retained() {
        let source = Arc::new(FakeSource::new());
        let cache = cache_with(source, 500);

        assert!(cache.render_page(0).bitmap().is_some());
        assert!(!cache.contains(0));
        assert_eq!(cache.stats().memory_used, 0);
    }

    #[test]
    fn test_concurrent_requests_share_one_render() {
        let source = Arc::new(FakeSource { delay: Duration::from_millis(50), ..FakeSource::new() });
        let cache = Arc::new(cache_with(Arc::clone(&source), 10_000));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.render_page(3).bitmap().is_some()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn test_evict_all_discards_renders_in_flight() {
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let started_tx = Mutex::new(started_tx);
        let source = move |request: RenderRequest| -> pdf_engine::Result<RgbaImage> {
            let _ = started_tx.lock().unwrap().send(());
            let _ = release_rx.lock().unwrap().recv();
            Ok(RgbaImage::new((10.0 * request.scale) as u32, 10))
        };
        let cache = Arc::new(PageRenderCache::new(
            Arc::new(source),
            RenderCacheConfig::default().with_capacity_bytes(10_000),
        ));

        let worker = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.render_page(0))
        };
        started_rx.recv().unwrap();
        cache.evict_all();
        release_tx.send(()).unwrap();

        assert!(worker.join().unwrap().bitmap().is_some());
        assert!(!cache.contains(0));
    }

    #[test]
    fn test_random_operations_stay_within_limit() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        let source = Arc::new(FakeSource::new());
        let cache = cache_with(source, 4_000);

        for _ in 0..500 {
            match rng.gen_range(0..10) {
                0 => cache.evict_all(),
                1 => cache.set_memory_limit(rng.gen_range(0..5_000)),
                2..=4 => {
                    cache.get(rng.gen_range(0..12));
                }
                _ => {
                    cache.render_page(rng.gen_range(0..12));
                }
            }
            let stats = cache.stats();
            assert!(stats.memory_used <= stats.memory_limit);
            assert_eq!(stats.memory_used, stats.page_count * 900);
        }
    }
}
