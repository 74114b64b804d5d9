use pdf_annotator_scheduler::SchedulerError;
use pdf_engine::PdfEngineError;
use thiserror::Error;

/// Failure to open a document. Reported once; there is no partial session.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("document is empty")]
    Empty,

    #[error("failed to read document: {0}")]
    Read(#[source] PdfEngineError),

    #[error("failed to parse document: {0}")]
    Parse(#[source] PdfEngineError),

    #[error("failed to start engine threads: {0}")]
    Threads(#[from] SchedulerError),
}
