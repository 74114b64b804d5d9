//! Burning annotations into a copy of the document.

mod fonts;
mod pipeline;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use fonts::{
    default_system_fonts, FontEncoder, FontResolver, TextFont, TrueTypeFont, BUILTIN_FONT, BUNDLED_FONT_FILE,
};
pub use pipeline::SavePipeline;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    /// Arabic-capable TrueType font tried before the bundled and system ones.
    pub font_path: Option<PathBuf>,
    pub system_fonts: Vec<PathBuf>,
    pub text_size: f32,
    /// Baseline distance between lines of a multi-line text annotation.
    pub line_spacing: f32,
    pub highlight_alpha: f32,
    pub underline_width: f32,
    pub stroke_width: f32,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            system_fonts: default_system_fonts(),
            text_size: 14.0,
            line_spacing: 1.2,
            highlight_alpha: 0.5,
            underline_width: 1.5,
            stroke_width: 2.0,
        }
    }
}
