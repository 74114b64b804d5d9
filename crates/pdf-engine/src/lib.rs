//! Document capabilities used by the annotation engine.
//!
//! The engine never talks to a PDF library directly. It depends on three
//! small capabilities instead: [`Rasterizer`] turns pages into bitmaps,
//! [`TextExtractor`] yields glyph positions grouped into lines, and
//! [`DocumentWriter`] appends content to a freshly loaded copy of a
//! document. A [`Backend`] opens each of them from document bytes.
//!
//! The default backend is built on `lopdf`.

use image::{ImageBuffer, Rgba};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod content;
mod raster;
mod resources;
mod text;
mod writer;

pub use content::{encode_commands, BlendMode, DrawCommand, GraphicsStateParams};
pub use raster::{LopdfRasterizer, DEFAULT_MAX_PIXELS};
pub use resources::{EmbeddedFont, FontHandle, FontMetrics, FontResource};
pub use text::LopdfTextExtractor;
pub use writer::LopdfWriter;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    /// US Letter, used when a page carries no usable MediaBox.
    pub const LETTER: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl OpenSource {
    /// Read the source into memory.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            OpenSource::Path(path) => Ok(fs::read(path)?),
            OpenSource::Bytes(bytes) => Ok(bytes),
        }
    }
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// One extracted character in page space.
///
/// Page space has its origin at the top-left corner of the page with y
/// growing downward. `y` is the baseline, so the glyph occupies
/// `x..x + width` horizontally and `y - height..y` vertically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphPosition {
    pub ch: char,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl GlyphPosition {
    pub fn new(ch: char, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { ch, x, y, width, height }
    }

    pub fn is_whitespace(&self) -> bool {
        matches!(self.ch, ' ' | '\t' | '\n' | '\r')
    }
}

/// One extraction unit of glyphs.
///
/// The lopdf extractor starts a new line at every `BT` operator and whenever
/// the baseline moves by more than half of the current font height.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLine {
    pub glyphs: Vec<GlyphPosition>,
}

impl TextLine {
    pub fn new(glyphs: Vec<GlyphPosition>) -> Self {
        Self { glyphs }
    }

    pub fn text(&self) -> String {
        self.glyphs.iter().map(|glyph| glyph.ch).collect()
    }

    /// Top edge of the tallest glyph, used to order lines on a page.
    pub fn top(&self) -> f32 {
        self.glyphs.iter().map(|glyph| glyph.y - glyph.height).fold(f32::INFINITY, f32::min)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("out of memory rendering {width}x{height} bitmap")]
    OutOfMemory { width: u32, height: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("unknown font handle {0}")]
    UnknownFont(u32),
    #[error("backend error: {0}")]
    Backend(String),
}

impl PdfEngineError {
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, PdfEngineError::OutOfMemory { .. })
    }
}

pub type Result<T> = std::result::Result<T, PdfEngineError>;

/// Rasterization handle over one open document.
///
/// Implementations are not required to be `Sync`; the engine gives each
/// handle a single owning thread.
pub trait Rasterizer: Send {
    fn page_count(&self) -> u32;
    fn page_size(&self, page_index: u32) -> Result<PageSize>;
    fn render_page(&mut self, request: RenderRequest) -> Result<RgbaImage>;
}

/// Text extraction handle over one open document.
pub trait TextExtractor: Send {
    fn page_count(&self) -> u32;

    /// Glyphs of one page grouped into lines, ordered top to bottom.
    fn extract_lines(&mut self, page_index: u32) -> Result<Vec<TextLine>>;
}

/// Write handle over an independently loaded copy of a document.
pub trait DocumentWriter {
    fn page_count(&self) -> u32;
    fn page_size(&self, page_index: u32) -> Result<PageSize>;

    /// Add a font to the document once, for use on any page.
    fn add_font(&mut self, font: &FontResource) -> Result<FontHandle>;

    /// Make a font available on a page and return its resource name.
    fn bind_font(&mut self, page_index: u32, font: FontHandle) -> Result<String>;

    /// Add an ExtGState to a page and return its resource name.
    fn bind_graphics_state(&mut self, page_index: u32, state: &GraphicsStateParams)
        -> Result<String>;

    /// Append drawing commands after the page's existing content.
    fn append_content(&mut self, page_index: u32, commands: &[DrawCommand]) -> Result<()>;

    /// Serialize the document.
    fn finish(self: Box<Self>) -> Result<Vec<u8>>;
}

/// Opens capability handles from document bytes.
pub trait Backend: Send + Sync {
    fn open_rasterizer(&self, bytes: Arc<[u8]>) -> Result<Box<dyn Rasterizer>>;
    fn open_text_extractor(&self, bytes: Arc<[u8]>) -> Result<Box<dyn TextExtractor>>;
    fn open_writer(&self, bytes: &[u8]) -> Result<Box<dyn DocumentWriter>>;
}

#[derive(Debug, Clone, Copy)]
pub struct LopdfBackend {
    max_pixels: u64,
}

impl LopdfBackend {
    pub fn new() -> Self {
        Self { max_pixels: DEFAULT_MAX_PIXELS }
    }

    /// Largest bitmap, in pixels, a rasterizer will allocate before
    /// reporting [`PdfEngineError::OutOfMemory`].
    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }
}

impl Default for LopdfBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for LopdfBackend {
    fn open_rasterizer(&self, bytes: Arc<[u8]>) -> Result<Box<dyn Rasterizer>> {
        Ok(Box::new(LopdfRasterizer::open(&bytes)?.with_max_pixels(self.max_pixels)))
    }

    fn open_text_extractor(&self, bytes: Arc<[u8]>) -> Result<Box<dyn TextExtractor>> {
        Ok(Box::new(LopdfTextExtractor::open(&bytes)?))
    }

    fn open_writer(&self, bytes: &[u8]) -> Result<Box<dyn DocumentWriter>> {
        Ok(Box::new(LopdfWriter::open(bytes)?))
    }
}

pub fn default_backend() -> LopdfBackend {
    LopdfBackend::new()
}

pub(crate) fn load_document(bytes: &[u8]) -> Result<lopdf::Document> {
    if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
        return Err(PdfEngineError::EncryptedUnsupported);
    }
    let doc = lopdf::Document::load_mem(bytes)?;
    if doc.get_pages().is_empty() {
        return Err(PdfEngineError::Backend("document has no pages".to_owned()));
    }
    Ok(doc)
}

/// Small generated documents for tests in this and dependent crates.
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Build a one-font document with one content stream per page.
    pub fn document_with_pages(pages: &[Vec<Operation>]) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for operations in pages {
            let content = Content { operations: operations.clone() };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    /// Operations that print `text` at `(x, y)` in PDF space with 12pt F1.
    pub fn text_at(x: f32, y: f32, text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]
    }

    pub fn blank_document(pages: usize) -> Vec<u8> {
        document_with_pages(&vec![Vec::new(); pages])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_opens_all_capabilities() {
        let bytes: Arc<[u8]> = fixtures::blank_document(2).into();
        let backend = default_backend();

        let raster = backend.open_rasterizer(bytes.clone()).expect("rasterizer should open");
        assert_eq!(raster.page_count(), 2);

        let text = backend.open_text_extractor(bytes.clone()).expect("extractor should open");
        assert_eq!(text.page_count(), 2);

        let writer = backend.open_writer(&bytes).expect("writer should open");
        assert_eq!(writer.page_count(), 2);
    }

    #[test]
    fn garbage_bytes_fail_to_parse() {
        let backend = default_backend();
        let err = match backend.open_rasterizer(Arc::from(&b"not a pdf"[..])) {
            Ok(_) => panic!("garbage should not open"),
            Err(err) => err,
        };
        assert!(matches!(err, PdfEngineError::Parse(_)));
    }

    #[test]
    fn open_source_reads_bytes_or_reports_io() {
        let bytes = fixtures::blank_document(1);
        assert_eq!(OpenSource::from(bytes.clone()).into_bytes().unwrap(), bytes);

        let missing = std::env::temp_dir().join("pdf-engine-missing-source.pdf");
        let err = OpenSource::from(missing).into_bytes().unwrap_err();
        assert!(matches!(err, PdfEngineError::Io(_)));
    }

    #[test]
    fn encoded_commands_decode_back_to_operators() {
        let bytes = encode_commands(&[DrawCommand::SaveState, DrawCommand::RestoreState]).unwrap();
        let ops = lopdf::content::Content::decode(&bytes).unwrap().operations;
        assert_eq!(ops.iter().map(|op| op.operator.as_str()).collect::<Vec<_>>(), vec!["q", "Q"]);
    }

    #[test]
    fn inherited_media_box_is_used() {
        let bytes = fixtures::blank_document(1);
        let raster = LopdfRasterizer::open(&bytes).unwrap();
        assert_eq!(raster.page_size(0).unwrap(), PageSize::LETTER);
    }

    #[test]
    fn text_line_top_uses_tallest_glyph() {
        let line = TextLine::new(vec![
            GlyphPosition::new('a', 0.0, 100.0, 5.0, 10.0),
            GlyphPosition::new('B', 5.0, 100.0, 5.0, 14.0),
        ]);
        assert_eq!(line.top(), 86.0);
        assert_eq!(line.text(), "aB");
    }
}
