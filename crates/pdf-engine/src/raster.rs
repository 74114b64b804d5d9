//! Placeholder rasterizer.
//!
//! Draws a white page with a light border at the requested scale. Real glyph
//! rasterization is out of scope for the lopdf backend; what matters to the
//! engine is the bitmap geometry and the allocation behavior.

use image::Rgba;
use lopdf::{Document, Object, ObjectId};

use crate::{load_document, PageSize, PdfEngineError, Rasterizer, RenderRequest, Result, RgbaImage};

/// Default allocation ceiling: 8192 x 8192 pixels.
pub const DEFAULT_MAX_PIXELS: u64 = 8192 * 8192;

const BORDER: Rgba<u8> = Rgba([220, 220, 220, 255]);

#[derive(Debug, Clone)]
pub struct LopdfRasterizer {
    page_sizes: Vec<PageSize>,
    max_pixels: u64,
}

impl LopdfRasterizer {
    pub fn open(bytes: &[u8]) -> Result<Self> {
        let doc = load_document(bytes)?;
        let page_sizes = doc
            .get_pages()
            .values()
            .map(|&page_id| {
                let [x0, y0, x1, y1] = media_box(&doc, page_id);
                PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() }
            })
            .collect();
        Ok(Self { page_sizes, max_pixels: DEFAULT_MAX_PIXELS })
    }

    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    fn allocate(&self, width: u32, height: u32) -> Result<Vec<u8>> {
        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.max_pixels {
            return Err(PdfEngineError::OutOfMemory { width, height });
        }
        let len = usize::try_from(pixels * 4)
            .map_err(|_| PdfEngineError::OutOfMemory { width, height })?;
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(len).map_err(|_| PdfEngineError::OutOfMemory { width, height })?;
        buffer.resize(len, 255);
        Ok(buffer)
    }
}

impl Rasterizer for LopdfRasterizer {
    fn page_count(&self) -> u32 {
        self.page_sizes.len() as u32
    }

    fn page_size(&self, page_index: u32) -> Result<PageSize> {
        self.page_sizes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: self.page_count(),
        })
    }

    fn render_page(&mut self, request: RenderRequest) -> Result<RgbaImage> {
        let page_size = self.page_size(request.page_index)?;
        let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };

        let width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let height = (page_size.height_pt * scale).round().max(1.0) as u32;

        let buffer = self.allocate(width, height)?;
        let mut image = RgbaImage::from_raw(width, height, buffer)
            .ok_or_else(|| PdfEngineError::Backend("bitmap buffer size mismatch".to_owned()))?;

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, BORDER);
                image.put_pixel(x, height - 1, BORDER);
            }
            for y in 0..height {
                image.put_pixel(0, y, BORDER);
                image.put_pixel(width - 1, y, BORDER);
            }
        }

        Ok(image)
    }
}

/// MediaBox of a page, following `Parent` links for inherited values.
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| resolve(doc, obj).as_array().ok())
        .and_then(|array| {
            if array.len() != 4 {
                return None;
            }
            let mut rect = [0.0f32; 4];
            for (slot, value) in rect.iter_mut().zip(array) {
                *slot = number(resolve(doc, value))?;
            }
            Some(rect)
        })
        .unwrap_or([0.0, 0.0, PageSize::LETTER.width_pt, PageSize::LETTER.height_pt])
}

/// Look up a page attribute on the page or its ancestors.
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    // Page trees are shallow; the bound guards against Parent cycles.
    for _ in 0..32 {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn renders_page_at_requested_scale() {
        let mut raster = LopdfRasterizer::open(&fixtures::blank_document(1)).unwrap();
        let image = raster.render_page(RenderRequest { page_index: 0, scale: 1.5 }).unwrap();
        assert_eq!(image.width(), 918);
        assert_eq!(image.height(), 1188);
        assert_eq!(image.get_pixel(0, 0), &BORDER);
        assert_eq!(image.get_pixel(10, 10), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn oversized_bitmap_reports_out_of_memory() {
        let mut raster = LopdfRasterizer::open(&fixtures::blank_document(1))
            .unwrap()
            .with_max_pixels(700 * 800);

        let err = raster.render_page(RenderRequest { page_index: 0, scale: 1.5 }).unwrap_err();
        assert!(err.is_out_of_memory());

        let image = raster.render_page(RenderRequest { page_index: 0, scale: 1.0 }).unwrap();
        assert_eq!(image.width(), 612);
    }

    #[test]
    fn page_out_of_range() {
        let mut raster = LopdfRasterizer::open(&fixtures::blank_document(1)).unwrap();
        let err = raster.render_page(RenderRequest { page_index: 3, scale: 1.0 }).unwrap_err();
        assert!(matches!(err, PdfEngineError::PageOutOfRange { page: 3, page_count: 1 }));
    }
}
