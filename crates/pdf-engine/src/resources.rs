use std::collections::BTreeMap;
use std::sync::Arc;

/// Opaque reference to a font added through [`crate::DocumentWriter::add_font`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontHandle(pub(crate) u32);

impl FontHandle {
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Font metrics in glyph units scaled to 1000 per em.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    pub ascent: i32,
    pub descent: i32,
    pub cap_height: i32,
    pub bbox: [i32; 4],
    pub missing_width: u16,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self { ascent: 800, descent: -200, cap_height: 700, bbox: [0, -200, 1000, 800], missing_width: 500 }
    }
}

/// TrueType program embedded as a Type0 / Identity-H font.
///
/// Text shown with this font is encoded as big-endian 16-bit glyph ids.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedFont {
    pub base_font: String,
    pub program: Arc<[u8]>,
    pub metrics: FontMetrics,
    /// Advance width per used glyph id, 1000 units per em.
    pub widths: BTreeMap<u16, u16>,
    /// Unicode value per used glyph id, for the ToUnicode CMap.
    pub to_unicode: BTreeMap<u16, char>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FontResource {
    /// One of the 14 standard Type1 fonts, WinAnsi encoded.
    Standard { base_font: String },
    TrueType(EmbeddedFont),
}

impl FontResource {
    pub fn helvetica_bold() -> Self {
        FontResource::Standard { base_font: "Helvetica-Bold".to_owned() }
    }

    pub fn base_font(&self) -> &str {
        match self {
            FontResource::Standard { base_font } => base_font,
            FontResource::TrueType(font) => &font.base_font,
        }
    }
}
