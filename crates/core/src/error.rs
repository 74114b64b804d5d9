use std::path::PathBuf;

use pdf_engine::PdfEngineError;

/// Failure of a save. The interactive session stays usable afterwards.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("failed to load a copy of the document for saving: {0}")]
    Load(#[source] PdfEngineError),
    #[error("annotation targets page {page} but the document has {page_count} pages")]
    MissingPage { page: u32, page_count: u32 },
    #[error("failed to write annotations: {0}")]
    Write(#[source] PdfEngineError),
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
    #[error("save worker failed: {0}")]
    Worker(String),
}

/// Failure to draw one text run with one font; recovered by the caller.
#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("failed to read font {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("{0} is not a usable TrueType font")]
    Parse(String),
    #[error("{font} has no glyph for {ch:?}")]
    MissingGlyph { font: String, ch: char },
}

pub type SaveResult<T> = Result<T, SaveError>;
