//! Annotation data model
//!
//! Annotations are immutable once created; undo/redo is the only way the
//! applied set changes. All geometry is stored in page space. Device pixels
//! are converted on ingress and never reach this type.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::geometry::{PagePoint, PageRect};

/// Packed `0xAARRGGBB` color.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Color = Color(0xFF00_0000);
    pub const RED: Color = Color(0xFFFF_0000);
    pub const BLUE: Color = Color(0xFF00_00FF);
    pub const YELLOW: Color = Color(0xFFFF_FF00);

    pub fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Color(u32::from_be_bytes([a, r, g, b]))
    }

    pub fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn blue(self) -> u8 {
        self.0 as u8
    }

    /// Same RGB with a different alpha.
    pub fn with_alpha(self, alpha: u8) -> Self {
        Color((self.0 & 0x00FF_FFFF) | (u32::from(alpha) << 24))
    }

    /// RGB channels in `0.0..=1.0`, alpha ignored.
    pub fn to_rgb_f32(self) -> (f32, f32, f32) {
        (
            f32::from(self.red()) / 255.0,
            f32::from(self.green()) / 255.0,
            f32::from(self.blue()) / 255.0,
        )
    }

    /// Parse `#RRGGBB` or `#AARRGGBB`; six digits imply full opacity.
    pub fn from_hex(value: &str) -> Option<Self> {
        let hex = value.trim().trim_start_matches('#');
        let raw = u32::from_str_radix(hex, 16).ok()?;
        match hex.len() {
            6 => Some(Color(0xFF00_0000 | raw)),
            8 => Some(Color(raw)),
            _ => None,
        }
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Color(#{:08X})", self.0)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Packed(u32),
            Hex(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Packed(value) => Ok(Color(value)),
            Repr::Hex(text) => Color::from_hex(&text)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid color {text:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Text,
    Highlight,
    Underline,
    Stroke,
}

/// One placed annotation.
///
/// `rect` is the placement box for every kind; for strokes it is the
/// bounding box of `points`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    page_index: u32,
    kind: AnnotationKind,
    rect: PageRect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<Arc<str>>,
    color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    points: Option<Arc<[PagePoint]>>,
}

impl Annotation {
    pub fn text(page_index: u32, rect: PageRect, text: impl Into<Arc<str>>, color: Color) -> Self {
        Self {
            page_index,
            kind: AnnotationKind::Text,
            rect,
            text: Some(text.into()),
            color,
            points: None,
        }
    }

    pub fn highlight(page_index: u32, rect: PageRect, color: Color) -> Self {
        Self { page_index, kind: AnnotationKind::Highlight, rect, text: None, color, points: None }
    }

    pub fn underline(page_index: u32, rect: PageRect, color: Color) -> Self {
        Self { page_index, kind: AnnotationKind::Underline, rect, text: None, color, points: None }
    }

    /// Freehand stroke through `points`; `None` for an empty point list.
    pub fn stroke(page_index: u32, points: Vec<PagePoint>, color: Color) -> Option<Self> {
        let rect = PageRect::bounding(&points)?;
        Some(Self {
            page_index,
            kind: AnnotationKind::Stroke,
            rect,
            text: None,
            color,
            points: Some(points.into()),
        })
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn kind(&self) -> AnnotationKind {
        self.kind
    }

    pub fn rect(&self) -> PageRect {
        self.rect
    }

    pub fn text_content(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn points(&self) -> &[PagePoint] {
        self.points.as_deref().unwrap_or(&[])
    }
}
