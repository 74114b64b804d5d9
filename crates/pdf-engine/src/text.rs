//! Glyph position extraction from page content streams.
//!
//! This is a positional reader, not a text decoder: simple fonts are read as
//! one byte per glyph with Latin-1 mapping, composite fonts yield two-byte
//! codes reported as U+FFFD. Widths come from the font's `Widths` array when
//! present and fall back to half an em.

use std::collections::HashMap;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::raster::{inherited, media_box, number, resolve};
use crate::{load_document, GlyphPosition, PdfEngineError, Result, TextExtractor, TextLine};

const DEFAULT_GLYPH_WIDTH: f32 = 500.0;
/// TJ adjustments at least this wide (thousandths of an em) read as a word gap.
const WORD_GAP_THRESHOLD: f32 = 250.0;

pub struct LopdfTextExtractor {
    doc: Document,
    pages: Vec<ObjectId>,
}

impl LopdfTextExtractor {
    pub fn open(bytes: &[u8]) -> Result<Self> {
        let doc = load_document(bytes)?;
        let pages = doc.get_pages().into_values().collect();
        Ok(Self { doc, pages })
    }
}

impl TextExtractor for LopdfTextExtractor {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn extract_lines(&mut self, page_index: u32) -> Result<Vec<TextLine>> {
        let page_id = *self.pages.get(page_index as usize).ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: self.page_count(),
        })?;

        let data = self.doc.get_page_content(page_id)?;
        let content = Content::decode(&data)?;
        let fonts = page_fonts(&self.doc, page_id);
        let [x0, _, _, y1] = media_box(&self.doc, page_id);

        let mut reader = ContentReader::new(&fonts, x0, y1);
        for op in &content.operations {
            reader.apply(op.operator.as_str(), &op.operands);
        }
        Ok(reader.finish())
    }
}

#[derive(Debug, Clone)]
struct FontInfo {
    first_char: u32,
    widths: Vec<f32>,
    two_byte: bool,
}

impl FontInfo {
    fn width(&self, code: u32) -> f32 {
        if self.two_byte {
            return DEFAULT_GLYPH_WIDTH;
        }
        code.checked_sub(self.first_char)
            .and_then(|index| self.widths.get(index as usize).copied())
            .filter(|width| *width > 0.0)
            .unwrap_or(DEFAULT_GLYPH_WIDTH)
    }
}

fn page_fonts(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, FontInfo> {
    let mut fonts = HashMap::new();
    let Some(resources) = inherited(doc, page_id, b"Resources")
        .and_then(|obj| resolve(doc, obj).as_dict().ok())
    else {
        return fonts;
    };
    let Some(font_dict) =
        resources.get(b"Font").ok().and_then(|obj| resolve(doc, obj).as_dict().ok())
    else {
        return fonts;
    };

    for (name, value) in font_dict.iter() {
        if let Ok(font) = resolve(doc, value).as_dict() {
            fonts.insert(name.clone(), font_info(doc, font));
        }
    }
    fonts
}

fn font_info(doc: &Document, font: &Dictionary) -> FontInfo {
    let two_byte = font.get(b"Subtype").and_then(Object::as_name).map(|s| s == b"Type0").unwrap_or(false);
    let first_char = font
        .get(b"FirstChar")
        .ok()
        .and_then(|obj| number(resolve(doc, obj)))
        .map(|value| value.max(0.0) as u32)
        .unwrap_or(0);
    let widths = font
        .get(b"Widths")
        .ok()
        .and_then(|obj| resolve(doc, obj).as_array().ok())
        .map(|array| array.iter().map(|w| number(resolve(doc, w)).unwrap_or(0.0)).collect())
        .unwrap_or_default();
    FontInfo { first_char, widths, two_byte }
}

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

fn translate(tx: f32, ty: f32, m: &Matrix) -> Matrix {
    multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], m)
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            font: None,
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

struct ContentReader<'a> {
    fonts: &'a HashMap<Vec<u8>, FontInfo>,
    origin_x: f32,
    top_y: f32,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    lines: Vec<TextLine>,
    current: Vec<GlyphPosition>,
}

impl<'a> ContentReader<'a> {
    fn new(fonts: &'a HashMap<Vec<u8>, FontInfo>, origin_x: f32, top_y: f32) -> Self {
        Self {
            fonts,
            origin_x,
            top_y,
            state: GraphicsState::default(),
            stack: Vec::new(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            lines: Vec::new(),
            current: Vec::new(),
        }
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        let num = |index: usize| operands.get(index).and_then(number).unwrap_or(0.0);
        match operator {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.stack.pop() {
                    self.state = state;
                }
            }
            "cm" if operands.len() >= 6 => {
                let m = [num(0), num(1), num(2), num(3), num(4), num(5)];
                self.state.ctm = multiply(&m, &self.state.ctm);
            }
            "BT" => {
                self.flush_line();
                self.text_matrix = IDENTITY;
                self.line_matrix = IDENTITY;
            }
            "ET" => self.flush_line(),
            "Tf" if operands.len() >= 2 => {
                self.state.font = operands[0].as_name().ok().map(<[u8]>::to_vec);
                self.state.font_size = num(1);
            }
            "Tc" => self.state.char_spacing = num(0),
            "Tw" => self.state.word_spacing = num(0),
            "Tz" => self.state.horizontal_scale = num(0) / 100.0,
            "TL" => self.state.leading = num(0),
            "Ts" => self.state.rise = num(0),
            "Td" => self.move_line(num(0), num(1)),
            "TD" => {
                self.state.leading = -num(1);
                self.move_line(num(0), num(1));
            }
            "Tm" if operands.len() >= 6 => {
                self.line_matrix = [num(0), num(1), num(2), num(3), num(4), num(5)];
                self.text_matrix = self.line_matrix;
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(bytes) = operands.first().and_then(|o| o.as_str().ok()) {
                    self.show(bytes);
                }
            }
            "'" => {
                self.next_line();
                if let Some(bytes) = operands.first().and_then(|o| o.as_str().ok()) {
                    self.show(bytes);
                }
            }
            "\"" if operands.len() >= 3 => {
                self.state.word_spacing = num(0);
                self.state.char_spacing = num(1);
                self.next_line();
                if let Ok(bytes) = operands[2].as_str() {
                    self.show(bytes);
                }
            }
            "TJ" => {
                if let Some(items) = operands.first().and_then(|o| o.as_array().ok()) {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show(bytes),
                            other => {
                                if let Some(adjust) = number(other) {
                                    self.adjust(adjust);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = translate(tx, ty, &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.state.leading;
        self.move_line(0.0, -leading);
    }

    fn font(&self) -> Option<&FontInfo> {
        self.state.font.as_ref().and_then(|name| self.fonts.get(name))
    }

    fn show(&mut self, bytes: &[u8]) {
        let two_byte = self.font().is_some_and(|font| font.two_byte);
        if two_byte {
            for pair in bytes.chunks(2) {
                let code = pair.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
                self.emit_glyph(char::REPLACEMENT_CHARACTER, code, false);
            }
        } else {
            for &byte in bytes {
                self.emit_glyph(char::from(byte), u32::from(byte), byte == b' ');
            }
        }
    }

    fn emit_glyph(&mut self, ch: char, code: u32, is_space: bool) {
        let width_units = self.font().map(|font| font.width(code)).unwrap_or(DEFAULT_GLYPH_WIDTH);
        let size = self.state.font_size;
        let advance = (width_units / 1000.0 * size
            + self.state.char_spacing
            + if is_space { self.state.word_spacing } else { 0.0 })
            * self.state.horizontal_scale;

        let glyph_width = width_units / 1000.0 * size * self.state.horizontal_scale;
        self.push_glyph(ch, glyph_width);
        self.text_matrix = translate(advance, 0.0, &self.text_matrix);
    }

    /// A TJ number moves the pen left by `value` thousandths of an em.
    fn adjust(&mut self, value: f32) {
        let shift = -value / 1000.0 * self.state.font_size * self.state.horizontal_scale;
        if -value >= WORD_GAP_THRESHOLD && self.current.last().is_some_and(|g| !g.is_whitespace()) {
            self.push_glyph(' ', shift);
        }
        self.text_matrix = translate(shift, 0.0, &self.text_matrix);
    }

    fn push_glyph(&mut self, ch: char, text_space_width: f32) {
        let render = multiply(&self.text_matrix, &self.state.ctm);
        let ux = self.state.rise * render[2] + render[4];
        let uy = self.state.rise * render[3] + render[5];
        let scale_x = (render[0] * render[0] + render[1] * render[1]).sqrt();
        let scale_y = (render[2] * render[2] + render[3] * render[3]).sqrt();

        let glyph = GlyphPosition {
            ch,
            x: ux - self.origin_x,
            y: self.top_y - uy,
            width: text_space_width * scale_x,
            height: self.state.font_size * scale_y,
        };

        if let Some(previous) = self.current.last() {
            let tolerance = previous.height.max(glyph.height) * 0.5;
            if (previous.y - glyph.y).abs() > tolerance {
                self.flush_line();
            }
        }
        self.current.push(glyph);
    }

    fn flush_line(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(TextLine::new(std::mem::take(&mut self.current)));
        }
    }

    fn finish(mut self) -> Vec<TextLine> {
        self.flush_line();
        self.lines.sort_by(|a, b| a.top().total_cmp(&b.top()));
        self.lines
    }
}
