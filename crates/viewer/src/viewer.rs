//! The viewer session facade.
//!
//! A [`Viewer`] owns one open document. Commands run on the caller's (UI)
//! thread and only touch UI-side state; anything that needs the document
//! goes to a background thread:
//!
//! - page renders run on the render pool through the [`PageRenderCache`],
//!   whose rasterizer lives on its own actor thread;
//! - locate queries and saves run on the serialized interaction worker
//!   against the text extraction actor.
//!
//! Background results are queued and applied by [`Viewer::pump`].

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use pdf_annotator_cache::{CacheStats, PageBitmap, PageRenderCache, RenderOutcome};
use pdf_annotator_core::{
    Annotation, AnnotationStore, Color, Mark, OverlayBuilder, OverlayPrimitive, PageHit, PageLayout, PagePoint,
    PageRect, Placement, PointLocator, RangeLocator, SaveError, SavePipeline, SaveResult, Session, TextLayout, Tool,
    ToolColors, ViewTransform, ViewportState,
};
use pdf_annotator_scheduler::{panic_message, CompletionQueue, HandleActor, WorkerPool};
use pdf_engine::{Backend, LopdfBackend, OpenSource, PageSize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::LoadError;
use crate::event::{SaveHandle, ViewerEvent};
use crate::source::ActorSource;

/// Text extraction actor. `None` while a save has the handle released.
type TextActor = HandleActor<Option<TextLayout>>;

enum Completion {
    Rendered { page_index: u32, available: bool },
    Placed(Vec<Annotation>),
    Saved(Result<usize, String>),
}

struct LiveStroke {
    page_index: u32,
    points: Vec<PagePoint>,
}

struct Selection {
    page_index: u32,
    from: PagePoint,
    to: PagePoint,
    color: Color,
}

pub struct Viewer {
    config: EngineConfig,
    backend: Arc<dyn Backend>,
    document: Arc<[u8]>,
    page_sizes: Vec<PageSize>,
    viewport: ViewportState,
    layout: PageLayout,
    session: Session,
    store: AnnotationStore,
    placement: Placement,
    point_locator: PointLocator,
    range_locator: RangeLocator,
    pipeline: Arc<SavePipeline>,
    cache: Arc<PageRenderCache>,
    text: Arc<TextActor>,
    interaction: WorkerPool,
    render_pool: WorkerPool,
    completions: CompletionQueue<Completion>,
    events: Vec<ViewerEvent>,
    requested: HashSet<u32>,
    stroke: Option<LiveStroke>,
    selection: Option<Selection>,
    saving: bool,
}

impl Viewer {
    /// Open a document with the default lopdf backend.
    pub fn open(source: impl Into<OpenSource>, config: EngineConfig) -> Result<Self, LoadError> {
        Self::open_with_backend(source, config, Arc::new(LopdfBackend::new()))
    }

    /// Open a document through `backend`.
    ///
    /// # Errors
    /// [`LoadError::Empty`] for a zero-length source, [`LoadError::Read`] when
    /// the source cannot be read and [`LoadError::Parse`] when the backend
    /// rejects the bytes.
    pub fn open_with_backend(
        source: impl Into<OpenSource>,
        config: EngineConfig,
        backend: Arc<dyn Backend>,
    ) -> Result<Self, LoadError> {
        let bytes = source.into().into_bytes().map_err(LoadError::Read)?;
        if bytes.is_empty() {
            return Err(LoadError::Empty);
        }
        let document: Arc<[u8]> = Arc::from(bytes);

        let rasterizer = backend.open_rasterizer(Arc::clone(&document)).map_err(LoadError::Parse)?;
        let extractor = backend.open_text_extractor(Arc::clone(&document)).map_err(LoadError::Parse)?;

        let source = ActorSource::new(HandleActor::spawn("pdf-rasterizer", rasterizer)?);
        let page_sizes = source.page_sizes().map_err(LoadError::Parse)?;
        let text = Arc::new(HandleActor::spawn("pdf-text", Some(TextLayout::new(extractor)))?);
        let cache = Arc::new(PageRenderCache::new(Arc::new(source), config.cache));
        let render_pool = WorkerPool::new("pdf-render", config.workers.effective_render_workers())?;
        let interaction = WorkerPool::serial("pdf-interaction")?;

        let view = config.view;
        let viewport = ViewportState::new(config.viewport, view.width, view.height);
        let layout = PageLayout::new(&page_sizes, view.width, view.height, config.layout);
        let store = match config.history_limit {
            Some(limit) => AnnotationStore::with_limit(limit),
            None => AnnotationStore::new(),
        };
        info!(pages = page_sizes.len(), bytes = document.len(), "document opened");

        Ok(Self {
            placement: Placement::new(config.placement),
            point_locator: PointLocator::new(config.locator),
            range_locator: RangeLocator::new(),
            pipeline: Arc::new(SavePipeline::new(config.save.clone())),
            config,
            backend,
            document,
            page_sizes,
            viewport,
            layout,
            session: Session::default(),
            store,
            cache,
            text,
            interaction,
            render_pool,
            completions: CompletionQueue::new(),
            events: Vec::new(),
            requested: HashSet::new(),
            stroke: None,
            selection: None,
            saving: false,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn page_count(&self) -> u32 {
        self.page_sizes.len() as u32
    }

    pub fn page_size(&self, page_index: u32) -> Option<PageSize> {
        self.page_sizes.get(page_index as usize).copied()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn annotations(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// True from [`Self::save`] until its `SaveFinished` event is pumped.
    pub fn is_saving(&self) -> bool {
        self.saving
    }

    fn redraw(&mut self) {
        if !self.events.contains(&ViewerEvent::Redraw) {
            self.events.push(ViewerEvent::Redraw);
        }
    }

    fn transform(&self) -> ViewTransform<'_> {
        ViewTransform::new(&self.viewport, &self.layout)
    }

    fn hit(&self, device_x: f32, device_y: f32) -> Option<PageHit> {
        self.transform().to_page_space(device_x, device_y)
    }

    // Session state

    /// Switch tools. Any gesture in progress is abandoned.
    pub fn set_tool(&mut self, tool: Tool) {
        debug!(%tool, "tool selected");
        self.session.tool = tool;
        self.stroke = None;
        self.selection = None;
        self.redraw();
    }

    pub fn set_colors(&mut self, draw: Color, highlight: Color, underline: Color) {
        self.session.colors = ToolColors { draw, highlight, underline };
    }

    pub fn set_scroll_locked(&mut self, locked: bool) {
        self.session.scroll_locked = locked;
    }

    pub fn set_page_numbers_enabled(&mut self, enabled: bool) {
        self.session.page_numbers_enabled = enabled;
        self.redraw();
    }

    /// `"current / total"` while page numbers are enabled.
    pub fn page_indicator(&self) -> Option<String> {
        if !self.session.page_numbers_enabled {
            return None;
        }
        let current = self.layout.current_page().unwrap_or(0);
        Some(format!("{} / {}", current + 1, self.page_count()))
    }

    pub fn set_view_size(&mut self, width: f32, height: f32) {
        self.viewport.set_view_size(width, height);
        self.layout.set_view_size(width, height);
        self.redraw();
    }

    // Annotations

    pub fn clear(&mut self) {
        self.store.clear();
        self.redraw();
    }

    pub fn undo(&mut self) -> bool {
        let changed = self.store.undo();
        if changed {
            self.redraw();
        }
        changed
    }

    pub fn redo(&mut self) -> bool {
        let changed = self.store.redo();
        if changed {
            self.redraw();
        }
        changed
    }

    /// Add a text annotation at a page-space position, usually the one
    /// reported by [`ViewerEvent::Tapped`]. Blank text is ignored.
    pub fn add_text_annotation(&mut self, page_index: u32, page_x: f32, page_y: f32, text: &str, color: Color) -> bool {
        if text.trim().is_empty() || page_index >= self.page_count() {
            return false;
        }
        let annotation = self.placement.text(page_index, PagePoint::new(page_x, page_y), text, color);
        self.store.push(annotation);
        self.redraw();
        true
    }

    // Viewport

    pub fn set_zoom(&mut self, scale: f32) {
        self.viewport.set_zoom(scale);
        self.redraw();
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
        self.redraw();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
        self.redraw();
    }

    pub fn pinch(&mut self, focal_x: f32, focal_y: f32, factor: f32) {
        self.viewport.pinch(focal_x, focal_y, factor);
        self.redraw();
    }

    /// One-finger drag with no annotation tool active.
    ///
    /// Zoomed in, it pans the zoomed content. At scale 1.0 it scrolls the
    /// page stack, unless scrolling is locked.
    pub fn pan(&mut self, dx: f32, dy: f32) -> bool {
        let moved = if self.viewport.scale() > 1.0 {
            self.session.can_pan() && self.viewport.pan(dx, dy)
        } else {
            self.session.can_scroll() && self.layout.scroll_by(-dy) != 0.0
        };
        if moved {
            self.redraw();
        }
        moved
    }

    pub fn jump_to_page(&mut self, page_index: u32) -> bool {
        if !self.layout.jump_to_page(page_index) {
            return false;
        }
        self.events.push(ViewerEvent::JumpTo { page_index });
        self.redraw();
        true
    }

    // Gestures

    /// Single tap at a device point.
    pub fn tap(&mut self, device_x: f32, device_y: f32) {
        let Some(hit) = self.hit(device_x, device_y) else {
            return;
        };
        let colors = self.session.colors;
        match self.session.tool {
            Tool::Text => self.events.push(ViewerEvent::Tapped {
                page_x: hit.point.x,
                page_y: hit.point.y,
                page_index: hit.page_index,
            }),
            Tool::Highlight => self.place_at(Mark::Highlight, hit, colors.highlight),
            Tool::Underline => self.place_at(Mark::Underline, hit, colors.underline),
            Tool::None | Tool::Draw => {}
        }
    }

    fn mark_tool(&self) -> Option<(Mark, Color)> {
        match self.session.tool {
            Tool::Highlight => Some((Mark::Highlight, self.session.colors.highlight)),
            Tool::Underline => Some((Mark::Underline, self.session.colors.underline)),
            _ => None,
        }
    }

    fn drag_points(&self, from: (f32, f32), to: (f32, f32)) -> Option<(u32, PagePoint, PagePoint)> {
        let start = self.hit(from.0, from.1)?;
        let frame = self.layout.frame(start.page_index)?;
        let end = self.transform().to_page_space_on(frame, to.0, to.1);
        Some((start.page_index, start.point, end))
    }

    /// Drag still in progress; shows the selection box.
    pub fn drag_update(&mut self, from_x: f32, from_y: f32, to_x: f32, to_y: f32) {
        let Some((_, color)) = self.mark_tool() else {
            return;
        };
        if let Some((page_index, from, to)) = self.drag_points((from_x, from_y), (to_x, to_y)) {
            self.selection = Some(Selection { page_index, from, to, color });
            self.redraw();
        }
    }

    /// Finished drag from one device point to another.
    ///
    /// The page is the one under the starting point.
    pub fn drag(&mut self, from_x: f32, from_y: f32, to_x: f32, to_y: f32) {
        if self.selection.take().is_some() {
            self.redraw();
        }
        let Some((mark, color)) = self.mark_tool() else {
            return;
        };
        let Some((page_index, from, to)) = self.drag_points((from_x, from_y), (to_x, to_y)) else {
            return;
        };

        let text = Arc::clone(&self.text);
        let locator = self.range_locator;
        let placement = self.placement;
        let poster = self.completions.poster();
        self.run_interaction(move || {
            let located = text
                .call(move |layout| {
                    layout.as_mut().map(|layout| locator.locate(layout, page_index, from, to)).unwrap_or_default()
                })
                .unwrap_or_else(|err| {
                    warn!(page_index, error = %err, "range lookup failed");
                    Vec::new()
                });
            poster.post(Completion::Placed(placement.range(mark, page_index, &located, from, to, color)));
        });
    }

    fn place_at(&mut self, mark: Mark, hit: PageHit, color: Color) {
        let text = Arc::clone(&self.text);
        let locator = self.point_locator;
        let placement = self.placement;
        let poster = self.completions.poster();
        self.run_interaction(move || {
            let located = text
                .call(move |layout| layout.as_mut().and_then(|layout| locator.locate(layout, hit.page_index, hit.point)))
                .unwrap_or_else(|err| {
                    warn!(page_index = hit.page_index, error = %err, "word lookup failed");
                    None
                });
            poster.post(Completion::Placed(vec![placement.tap(mark, hit.page_index, located, hit.point, color)]));
        });
    }

    fn run_interaction<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(err) = self.interaction.execute(job) {
            warn!(error = %err, "interaction worker unavailable");
        }
    }

    /// Start a freehand stroke. Only the draw tool strokes.
    pub fn stroke_begin(&mut self, device_x: f32, device_y: f32) -> bool {
        if self.session.tool != Tool::Draw {
            return false;
        }
        let Some(hit) = self.hit(device_x, device_y) else {
            return false;
        };
        self.stroke = Some(LiveStroke { page_index: hit.page_index, points: vec![hit.point] });
        self.redraw();
        true
    }

    /// Extend the current stroke, staying on the page it started on.
    pub fn stroke_move(&mut self, device_x: f32, device_y: f32) {
        let Some(page_index) = self.stroke.as_ref().map(|stroke| stroke.page_index) else {
            return;
        };
        let Some(frame) = self.layout.frame(page_index) else {
            return;
        };
        let point = self.transform().to_page_space_on(frame, device_x, device_y);
        if let Some(stroke) = self.stroke.as_mut() {
            stroke.points.push(point);
        }
        self.redraw();
    }

    /// Commit the current stroke. A single-point stroke is kept in the
    /// history but produces nothing on screen or in the saved document.
    pub fn stroke_end(&mut self) -> bool {
        let Some(stroke) = self.stroke.take() else {
            return false;
        };
        self.redraw();
        match Annotation::stroke(stroke.page_index, stroke.points, self.session.colors.draw) {
            Some(annotation) => {
                self.store.push(annotation);
                true
            }
            None => false,
        }
    }

    // Queries

    /// Word box under a page-space point, resolved synchronously.
    pub fn locate_word(&self, page_index: u32, point: PagePoint) -> Option<PageRect> {
        let locator = self.point_locator;
        self.text
            .call(move |layout| layout.as_mut().and_then(|layout| locator.locate(layout, page_index, point)))
            .unwrap_or_else(|err| {
                warn!(page_index, error = %err, "word lookup failed");
                None
            })
    }

    /// Device-space drawing for one page: applied annotations plus any
    /// selection or stroke in progress on it.
    pub fn overlay(&self, page_index: u32) -> Vec<OverlayPrimitive> {
        let Some(frame) = self.layout.frame(page_index) else {
            return Vec::new();
        };
        let builder = OverlayBuilder::new(self.transform(), frame, self.config.overlay);
        let mut primitives = builder.page(self.store.page_annotations(page_index));
        if let Some(selection) = self.selection.as_ref().filter(|selection| selection.page_index == page_index) {
            primitives.push(builder.selection(selection.from, selection.to, selection.color));
        }
        if let Some(stroke) = self.stroke.as_ref().filter(|stroke| stroke.page_index == page_index) {
            primitives.extend(builder.live_stroke(&stroke.points, self.session.colors.draw));
        }
        primitives
    }

    // Rendering

    /// Cached bitmap of a page, if it has been rendered.
    pub fn page_bitmap(&self, page_index: u32) -> Option<PageBitmap> {
        self.cache.get(page_index)
    }

    /// Render a page on the calling thread, going through the cache.
    ///
    /// The bitmap is returned even when it is too large for the cache to
    /// keep, so [`Viewer::page_bitmap`] may still answer `None` afterwards.
    pub fn render_now(&self, page_index: u32) -> Option<PageBitmap> {
        if page_index >= self.page_count() {
            return None;
        }
        self.cache.render_page(page_index).bitmap().cloned()
    }

    /// Queue a render unless the page is cached or already queued.
    pub fn request_page(&mut self, page_index: u32) {
        if page_index >= self.page_count() || self.cache.contains(page_index) || !self.requested.insert(page_index) {
            return;
        }
        let cache = Arc::clone(&self.cache);
        let poster = self.completions.poster();
        let queued = self.render_pool.execute(move || {
            let available = matches!(cache.render_page(page_index), RenderOutcome::Rendered(_));
            poster.post(Completion::Rendered { page_index, available });
        });
        if let Err(err) = queued {
            warn!(page_index, error = %err, "render pool unavailable");
            self.requested.remove(&page_index);
        }
    }

    pub fn request_visible_pages(&mut self) {
        for page_index in self.layout.visible_pages(&self.viewport) {
            self.request_page(page_index);
        }
    }

    // Saving

    /// Serialize the document with every applied annotation burnt in.
    ///
    /// Runs on the interaction worker. The text handle is released and the
    /// render cache dropped while the copy is written, and both come back
    /// whether or not the write succeeded. The annotation store is kept.
    pub fn save(&mut self) -> SaveHandle {
        let (sender, receiver) = mpsc::channel();
        let job = SaveJob {
            backend: Arc::clone(&self.backend),
            document: Arc::clone(&self.document),
            page_heights: self.page_sizes.iter().map(|size| size.height_pt).collect(),
            annotations: self.store.snapshot(),
            pipeline: Arc::clone(&self.pipeline),
            cache: Arc::clone(&self.cache),
            text: Arc::clone(&self.text),
        };
        let poster = self.completions.poster();
        let reply = sender.clone();

        let queued = self.interaction.execute(move || {
            let result = job.run();
            poster.post(Completion::Saved(summary(&result)));
            let _ = reply.send(result);
        });
        match queued {
            Ok(()) => self.saving = true,
            Err(err) => {
                warn!(error = %err, "save could not be queued");
                let _ = sender.send(Err(SaveError::Worker(err.to_string())));
            }
        }
        SaveHandle::new(receiver)
    }

    // Event loop

    /// Apply background results, schedule renders for visible pages and
    /// return everything the host should react to.
    pub fn pump(&mut self) -> Vec<ViewerEvent> {
        for completion in self.completions.drain() {
            match completion {
                Completion::Rendered { page_index, available } => {
                    self.requested.remove(&page_index);
                    self.events.push(ViewerEvent::PageReady { page_index, available });
                }
                Completion::Placed(annotations) => {
                    if annotations.is_empty() {
                        continue;
                    }
                    for annotation in annotations {
                        self.store.push(annotation);
                    }
                    self.redraw();
                }
                Completion::Saved(result) => {
                    self.saving = false;
                    self.events.push(ViewerEvent::SaveFinished(result));
                    self.redraw();
                }
            }
        }
        self.request_visible_pages();
        std::mem::take(&mut self.events)
    }

    /// Block until background work queued so far has finished, or `timeout`.
    pub fn wait_for_background(&self, timeout: Duration) -> bool {
        self.interaction.wait_idle(timeout) && self.render_pool.wait_idle(timeout)
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.interaction.shutdown();
        self.render_pool.shutdown();
        debug!("viewer closed");
    }
}

fn summary(result: &SaveResult<Vec<u8>>) -> Result<usize, String> {
    match result {
        Ok(bytes) => Ok(bytes.len()),
        Err(err) => Err(err.to_string()),
    }
}

/// Everything a save needs, moved onto the interaction worker.
struct SaveJob {
    backend: Arc<dyn Backend>,
    document: Arc<[u8]>,
    page_heights: Vec<f32>,
    annotations: Vec<Annotation>,
    pipeline: Arc<SavePipeline>,
    cache: Arc<PageRenderCache>,
    text: Arc<TextActor>,
}

impl SaveJob {
    fn run(self) -> SaveResult<Vec<u8>> {
        if let Err(err) = self.text.call(|layout| drop(layout.take())) {
            warn!(error = %err, "failed to release text handle before save");
        }
        self.cache.evict_all();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.pipeline.save(self.backend.as_ref(), &self.document, &self.page_heights, &self.annotations)
        }))
        .unwrap_or_else(|payload| Err(SaveError::Worker(panic_message(payload.as_ref()))));

        match self.backend.open_text_extractor(Arc::clone(&self.document)) {
            Ok(extractor) => {
                if let Err(err) = self.text.call(move |layout| *layout = Some(TextLayout::new(extractor))) {
                    warn!(error = %err, "failed to restore text handle after save");
                }
            }
            Err(err) => warn!(error = %err, "failed to reopen document for text after save"),
        }

        match &result {
            Ok(bytes) => info!(bytes = bytes.len(), annotations = self.annotations.len(), "document saved"),
            Err(err) => warn!(error = %err, "save failed"),
        }
        result
    }
}
