//! Rasterizer actor as a render cache source.

use pdf_annotator_cache::PageSource;
use pdf_annotator_scheduler::HandleActor;
use pdf_engine::{PageSize, PdfEngineError, Rasterizer, RenderRequest, RgbaImage};

/// Routes every cache render to the thread that owns the rasterizer.
pub(crate) struct ActorSource {
    actor: HandleActor<Box<dyn Rasterizer>>,
}

impl ActorSource {
    pub(crate) fn new(actor: HandleActor<Box<dyn Rasterizer>>) -> Self {
        Self { actor }
    }

    /// Sizes of every page, read once at open.
    pub(crate) fn page_sizes(&self) -> pdf_engine::Result<Vec<PageSize>> {
        self.actor
            .call(|rasterizer| {
                (0..rasterizer.page_count())
                    .map(|page| rasterizer.page_size(page))
                    .collect::<pdf_engine::Result<Vec<_>>>()
            })
            .map_err(|err| PdfEngineError::Backend(err.to_string()))?
    }
}

impl PageSource for ActorSource {
    fn render(&self, request: RenderRequest) -> pdf_engine::Result<RgbaImage> {
        self.actor
            .call(move |rasterizer| rasterizer.render_page(request))
            .map_err(|err| PdfEngineError::Backend(err.to_string()))?
    }
}
