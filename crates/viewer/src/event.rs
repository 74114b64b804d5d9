//! What the viewer tells its host.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use pdf_annotator_core::{SaveError, SaveResult};

/// Notifications returned by [`crate::Viewer::pump`].
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    /// Overlay or viewport changed; the host should repaint.
    Redraw,

    /// A page finished rendering. `available` is false when the page could
    /// not be rasterized at any scale.
    PageReady { page_index: u32, available: bool },

    /// Tap in text mode; the host asks for the text and calls
    /// [`crate::Viewer::add_text_annotation`].
    Tapped { page_x: f32, page_y: f32, page_index: u32 },

    /// The view scrolled to the top of a page.
    JumpTo { page_index: u32 },

    /// A save completed with the serialized size, or failed with a message.
    SaveFinished(Result<usize, String>),
}

/// Pending result of [`crate::Viewer::save`].
pub struct SaveHandle {
    receiver: Receiver<SaveResult<Vec<u8>>>,
}

impl SaveHandle {
    pub(crate) fn new(receiver: Receiver<SaveResult<Vec<u8>>>) -> Self {
        Self { receiver }
    }

    /// Block until the save finishes.
    pub fn wait(self) -> SaveResult<Vec<u8>> {
        self.receiver.recv().unwrap_or_else(|_| Err(worker_gone()))
    }

    /// The result if the save has finished by `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<SaveResult<Vec<u8>>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(worker_gone())),
        }
    }

    /// The result if the save has already finished.
    pub fn try_result(&self) -> Option<SaveResult<Vec<u8>>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(worker_gone())),
        }
    }
}

fn worker_gone() -> SaveError {
    SaveError::Worker("save worker stopped before reporting a result".to_string())
}
