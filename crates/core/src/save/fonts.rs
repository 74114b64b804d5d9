//! Font resolution and text encoding for burned-in text.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pdf_engine::{EmbeddedFont, FontMetrics, FontResource};
use tracing::{debug, warn};
use ttf_parser::Face;

use crate::error::FontError;

/// File name looked up next to the executable and in the working directory.
pub const BUNDLED_FONT_FILE: &str = "Arial.ttf";

/// Built-in font used for non-Arabic runs and as the last resort.
pub const BUILTIN_FONT: &str = "Helvetica-Bold";

pub fn default_system_fonts() -> Vec<PathBuf> {
    [
        "/system/fonts/Arial.ttf",
        "/system/fonts/NotoSansArabic-Regular.ttf",
        "/system/fonts/NotoNaskhArabic-Regular.ttf",
        "/system/fonts/DroidSansArabic.ttf",
        "/usr/share/fonts/truetype/noto/NotoSansArabic-Regular.ttf",
        "/usr/share/fonts/truetype/noto/NotoNaskhArabic-Regular.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/Library/Fonts/Arial Unicode.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

/// A parsed TrueType program.
#[derive(Debug, Clone)]
pub struct TrueTypeFont {
    name: String,
    data: Arc<[u8]>,
    units_per_em: u16,
    metrics: FontMetrics,
}

impl TrueTypeFont {
    pub fn load(path: &Path) -> Result<Self, FontError> {
        let data = fs::read(path).map_err(|source| FontError::Io { path: path.to_path_buf(), source })?;
        let name = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or("EmbeddedFont");
        Self::parse(name, data)
    }

    pub fn parse(name: &str, data: Vec<u8>) -> Result<Self, FontError> {
        let face = Face::parse(&data, 0).map_err(|_| FontError::Parse(name.to_owned()))?;
        let units_per_em = face.units_per_em().max(1);
        let scale = |value: i16| i32::from(value) * 1000 / i32::from(units_per_em);
        let bbox = face.global_bounding_box();
        let metrics = FontMetrics {
            ascent: scale(face.ascender()),
            descent: scale(face.descender()),
            cap_height: face.capital_height().map(scale).unwrap_or_else(|| scale(face.ascender())),
            bbox: [scale(bbox.x_min), scale(bbox.y_min), scale(bbox.x_max), scale(bbox.y_max)],
            missing_width: 500,
        };
        drop(face);
        Ok(Self { name: name.to_owned(), data: data.into(), units_per_em, metrics })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn face(&self) -> Result<Face<'_>, FontError> {
        Face::parse(&self.data, 0).map_err(|_| FontError::Parse(self.name.clone()))
    }

    /// Glyph ids, in 1000-unit widths, for every character of `text`.
    fn glyphs(&self, text: &str) -> Result<Vec<UsedGlyph>, FontError> {
        let face = self.face()?;
        text.chars()
            .map(|ch| {
                let gid = face
                    .glyph_index(ch)
                    .ok_or_else(|| FontError::MissingGlyph { font: self.name.clone(), ch })?;
                let advance = face.glyph_hor_advance(gid).unwrap_or(0);
                let width = (u32::from(advance) * 1000 / u32::from(self.units_per_em)) as u16;
                Ok(UsedGlyph { gid: gid.0, width, ch })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UsedGlyph {
    gid: u16,
    width: u16,
    ch: char,
}

/// Search order for the Arabic-capable font.
#[derive(Debug, Clone)]
pub struct FontResolver {
    candidates: Vec<PathBuf>,
}

impl FontResolver {
    /// Configured font first, then the bundled file next to the executable
    /// and in the working directory, then `system_fonts`.
    pub fn new(configured: Option<&Path>, system_fonts: &[PathBuf]) -> Self {
        let mut candidates = Vec::new();
        candidates.extend(configured.map(Path::to_path_buf));
        if let Some(dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
            candidates.push(dir.join(BUNDLED_FONT_FILE));
        }
        if let Ok(dir) = std::env::current_dir() {
            candidates.push(dir.join(BUNDLED_FONT_FILE));
        }
        candidates.extend(system_fonts.iter().cloned());
        Self { candidates }
    }

    /// Resolver trying exactly `candidates`, in order.
    pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// First candidate that parses, or the built-in font.
    pub fn resolve(&self) -> TextFont {
        for path in &self.candidates {
            if !path.is_file() {
                continue;
            }
            match TrueTypeFont::load(path) {
                Ok(font) => {
                    debug!(path = %path.display(), "resolved text font");
                    return TextFont::TrueType(Arc::new(font));
                }
                Err(err) => warn!(error = %err, "skipping font candidate"),
            }
        }
        debug!("no TrueType font found, using {BUILTIN_FONT}");
        TextFont::builtin()
    }
}

/// Font used to draw one script.
#[derive(Debug, Clone)]
pub enum TextFont {
    Builtin(String),
    TrueType(Arc<TrueTypeFont>),
}

impl TextFont {
    pub fn builtin() -> Self {
        TextFont::Builtin(BUILTIN_FONT.to_owned())
    }

    pub fn name(&self) -> &str {
        match self {
            TextFont::Builtin(name) => name,
            TextFont::TrueType(font) => font.name(),
        }
    }
}

/// Records which glyphs of a font a document uses while encoding runs.
#[derive(Debug, Clone)]
pub struct FontEncoder {
    font: TextFont,
    widths: BTreeMap<u16, u16>,
    to_unicode: BTreeMap<u16, char>,
    used: bool,
}

impl FontEncoder {
    pub fn new(font: TextFont) -> Self {
        Self { font, widths: BTreeMap::new(), to_unicode: BTreeMap::new(), used: false }
    }

    pub fn font(&self) -> &TextFont {
        &self.font
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    /// Encode a run as string bytes for this font; nothing is recorded on failure.
    pub fn encode(&mut self, text: &str) -> Result<Vec<u8>, FontError> {
        let bytes = match &self.font {
            TextFont::Builtin(name) => win_ansi(name, text)?,
            TextFont::TrueType(font) => {
                let glyphs = font.glyphs(text)?;
                let mut bytes = Vec::with_capacity(glyphs.len() * 2);
                for glyph in glyphs {
                    bytes.extend_from_slice(&glyph.gid.to_be_bytes());
                    self.widths.insert(glyph.gid, glyph.width);
                    self.to_unicode.entry(glyph.gid).or_insert(glyph.ch);
                }
                bytes
            }
        };
        self.used = true;
        Ok(bytes)
    }

    /// Document resource for everything encoded so far.
    pub fn resource(&self) -> FontResource {
        match &self.font {
            TextFont::Builtin(name) => FontResource::Standard { base_font: name.clone() },
            TextFont::TrueType(font) => FontResource::TrueType(EmbeddedFont {
                base_font: font.name.clone(),
                program: Arc::clone(&font.data),
                metrics: font.metrics,
                widths: self.widths.clone(),
                to_unicode: self.to_unicode.clone(),
            }),
        }
    }
}

/// WinAnsi bytes for `text`, failing on the first character outside it.
fn win_ansi(font: &str, text: &str) -> Result<Vec<u8>, FontError> {
    text.chars()
        .map(|ch| win_ansi_byte(ch).ok_or_else(|| FontError::MissingGlyph { font: font.to_owned(), ch }))
        .collect()
}

fn win_ansi_byte(ch: char) -> Option<u8> {
    match ch {
        ' '..='~' | '\u{00A0}'..='\u{00FF}' => Some(ch as u8),
        '\u{20AC}' => Some(0x80),
        '\u{201A}' => Some(0x82),
        '\u{2026}' => Some(0x85),
        '\u{2018}' => Some(0x91),
        '\u{2019}' => Some(0x92),
        '\u{201C}' => Some(0x93),
        '\u{201D}' => Some(0x94),
        '\u{2022}' => Some(0x95),
        '\u{2013}' => Some(0x96),
        '\u{2014}' => Some(0x97),
        '\u{2122}' => Some(0x99),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_ansi_covers_latin1_and_quotes() {
        assert_eq!(win_ansi(BUILTIN_FONT, "Aé€").unwrap(), vec![b'A', 0xE9, 0x80]);
        assert!(matches!(
            win_ansi(BUILTIN_FONT, "a\u{FE91}"),
            Err(FontError::MissingGlyph { ch: '\u{FE91}', .. })
        ));
    }

    #[test]
    fn resolver_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("broken.ttf");
        std::fs::write(&bogus, b"not a font").unwrap();

        let resolver = FontResolver::with_candidates(vec![dir.path().join("missing.ttf"), bogus]);
        assert!(matches!(resolver.resolve(), TextFont::Builtin(name) if name == BUILTIN_FONT));
    }

    #[test]
    fn configured_font_is_tried_first() {
        let resolver = FontResolver::new(Some(Path::new("/fonts/custom.ttf")), &[PathBuf::from("/fonts/system.ttf")]);
        let candidates = resolver.candidates();
        assert_eq!(candidates.first(), Some(&PathBuf::from("/fonts/custom.ttf")));
        assert_eq!(candidates.last(), Some(&PathBuf::from("/fonts/system.ttf")));
    }

    #[test]
    fn unparsable_font_data_is_rejected() {
        assert!(matches!(TrueTypeFont::parse("junk", vec![0; 16]), Err(FontError::Parse(_))));
    }

    #[test]
    fn truetype_encoding_is_two_byte_glyph_ids() {
        let Some(path) = default_system_fonts().into_iter().find(|path| {
            TrueTypeFont::load(path).is_ok_and(|font| font.glyphs("\u{FE91}a").is_ok())
        }) else {
            eprintln!("no Arabic-capable system font installed; skipping");
            return;
        };
        let font = TrueTypeFont::load(&path).unwrap();
        let glyphs = font.glyphs("\u{FE91}a").unwrap();

        let resolver = FontResolver::with_candidates(vec![path]);
        let mut encoder = FontEncoder::new(resolver.resolve());
        assert!(matches!(encoder.font(), TextFont::TrueType(_)));
        let bytes = encoder.encode("\u{FE91}a").unwrap();
        assert_eq!(bytes.len(), 4);
        assert_eq!(bytes[..2], glyphs[0].gid.to_be_bytes());
        assert_eq!(bytes[2..], glyphs[1].gid.to_be_bytes());

        let FontResource::TrueType(embedded) = encoder.resource() else {
            panic!("expected an embedded font resource");
        };
        assert_eq!(embedded.widths.len(), 2);
        assert_eq!(embedded.to_unicode.get(&glyphs[0].gid), Some(&'\u{FE91}'));
    }

    #[test]
    fn failed_encode_leaves_encoder_unused() {
        let mut encoder = FontEncoder::new(TextFont::builtin());
        assert!(encoder.encode("\u{0628}").is_err());
        assert!(!encoder.is_used());
        assert_eq!(encoder.encode("ok").unwrap(), b"ok".to_vec());
        assert!(encoder.is_used());
        assert_eq!(encoder.resource(), FontResource::helvetica_bold());
    }
}
