//! Undo/redo annotation store.

use std::collections::VecDeque;

use crate::annotation::Annotation;

/// Ordered annotation history.
///
/// `undo` holds the applied annotations, oldest first. `redo` holds the
/// undone ones, most recently undone last. History is unbounded unless a
/// limit is set, in which case pushing past the limit forgets the oldest
/// applied annotation.
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    undo: VecDeque<Annotation>,
    redo: Vec<Annotation>,
    limit: Option<usize>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that keeps at most `limit` applied annotations.
    pub fn with_limit(limit: usize) -> Self {
        Self { limit: Some(limit.max(1)), ..Self::default() }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn push(&mut self, annotation: Annotation) {
        self.redo.clear();
        self.undo.push_back(annotation);
        if let Some(limit) = self.limit {
            while self.undo.len() > limit {
                self.undo.pop_front();
            }
        }
    }

    /// Move the newest applied annotation to the redo stack.
    ///
    /// Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.undo.pop_back() {
            Some(annotation) => {
                self.redo.push(annotation);
                true
            }
            None => false,
        }
    }

    /// Re-apply the most recently undone annotation.
    pub fn redo(&mut self) -> bool {
        match self.redo.pop() {
            Some(annotation) => {
                self.undo.push_back(annotation);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Applied annotations in the order they were pushed.
    pub fn snapshot(&self) -> Vec<Annotation> {
        self.undo.iter().cloned().collect()
    }

    pub fn applied(&self) -> impl Iterator<Item = &Annotation> {
        self.undo.iter()
    }

    pub fn page_annotations(&self, page_index: u32) -> impl Iterator<Item = &Annotation> {
        self.undo.iter().filter(move |annotation| annotation.page_index() == page_index)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }
}
