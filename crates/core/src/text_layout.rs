//! Per-page text layout over a [`TextExtractor`].
//!
//! Extraction runs at most once per page for the life of the open document;
//! results are shared as `Arc<PageText>` so locators can hold them without
//! borrowing the layout.

use std::collections::HashMap;
use std::sync::Arc;

use pdf_engine::{GlyphPosition, TextExtractor, TextLine};
use tracing::debug;

use crate::geometry::PageRect;

/// Page-space box of one glyph.
pub fn glyph_rect(glyph: &GlyphPosition) -> PageRect {
    PageRect::from_edges(glyph.x, glyph.y - glyph.height, glyph.x + glyph.width, glyph.y)
}

/// Whitespace-delimited run of glyphs within one line.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub rect: PageRect,
    /// Index of the extraction line the word came from.
    pub line: usize,
}

/// Extracted text of one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageText {
    lines: Vec<TextLine>,
    words: Vec<Word>,
}

impl PageText {
    pub fn new(lines: Vec<TextLine>) -> Self {
        let words = split_words(&lines);
        Self { lines, words }
    }

    pub fn lines(&self) -> &[TextLine] {
        &self.lines
    }

    /// Words in encounter order.
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|line| line.glyphs.is_empty())
    }
}

fn split_words(lines: &[TextLine]) -> Vec<Word> {
    let mut words = Vec::new();
    for (line_index, line) in lines.iter().enumerate() {
        let mut current: Option<Word> = None;
        for glyph in &line.glyphs {
            if glyph.is_whitespace() {
                words.extend(current.take());
                continue;
            }
            let rect = glyph_rect(glyph);
            match current.as_mut() {
                Some(word) => {
                    word.text.push(glyph.ch);
                    word.rect = word.rect.union(&rect);
                }
                None => {
                    current = Some(Word { text: glyph.ch.to_string(), rect, line: line_index });
                }
            }
        }
        words.extend(current);
    }
    words
}

/// Lazily extracted, cached text for every page of one document.
pub struct TextLayout {
    extractor: Box<dyn TextExtractor>,
    pages: HashMap<u32, Arc<PageText>>,
}

impl TextLayout {
    pub fn new(extractor: Box<dyn TextExtractor>) -> Self {
        Self { extractor, pages: HashMap::new() }
    }

    pub fn page_count(&self) -> u32 {
        self.extractor.page_count()
    }

    /// Text of one page, extracting it on first use.
    pub fn page(&mut self, page_index: u32) -> pdf_engine::Result<Arc<PageText>> {
        if let Some(page) = self.pages.get(&page_index) {
            return Ok(Arc::clone(page));
        }
        let lines = self.extractor.extract_lines(page_index)?;
        debug!(page_index, lines = lines.len(), "extracted page text");
        let page = Arc::new(PageText::new(lines));
        self.pages.insert(page_index, Arc::clone(&page));
        Ok(page)
    }

    pub fn is_cached(&self, page_index: u32) -> bool {
        self.pages.contains_key(&page_index)
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }

    /// Give back the extractor, dropping cached text.
    pub fn into_extractor(self) -> Box<dyn TextExtractor> {
        self.extractor
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pdf_engine::PdfEngineError;

    /// In-memory extractor serving fixed lines and counting extractions.
    pub(crate) struct FixedText {
        pub pages: Vec<Vec<TextLine>>,
        pub calls: usize,
    }

    impl FixedText {
        pub(crate) fn new(pages: Vec<Vec<TextLine>>) -> Self {
            Self { pages, calls: 0 }
        }
    }

    impl TextExtractor for FixedText {
        fn page_count(&self) -> u32 {
            self.pages.len() as u32
        }

        fn extract_lines(&mut self, page_index: u32) -> pdf_engine::Result<Vec<TextLine>> {
            self.calls += 1;
            self.pages.get(page_index as usize).cloned().ok_or(PdfEngineError::PageOutOfRange {
                page: page_index,
                page_count: self.pages.len() as u32,
            })
        }
    }

    /// Monospace line of `text` with 10-unit advances and a 10-unit height.
    pub(crate) fn line(text: &str, x: f32, baseline: f32) -> TextLine {
        TextLine::new(
            text.chars()
                .enumerate()
                .map(|(i, ch)| GlyphPosition::new(ch, x + 10.0 * i as f32, baseline, 10.0, 10.0))
                .collect(),
        )
    }

    #[test]
    fn words_split_on_whitespace() {
        let page = PageText::new(vec![line("ab  cd", 0.0, 20.0), line("e", 0.0, 40.0)]);
        let words: Vec<_> = page.words().iter().map(|w| (w.text.as_str(), w.line)).collect();
        assert_eq!(words, vec![("ab", 0), ("cd", 0), ("e", 1)]);
        assert_eq!(page.words()[1].rect, PageRect::new(40.0, 10.0, 20.0, 10.0));
    }

    #[test]
    fn extraction_is_cached() {
        let mut layout = TextLayout::new(Box::new(FixedText::new(vec![vec![line("hi", 0.0, 10.0)]])));
        let first = layout.page(0).unwrap();
        let second = layout.page(0).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(layout.is_cached(0));
        assert!(layout.page(3).is_err());
        assert!(!layout.is_cached(3));
    }

    #[test]
    fn empty_lines_are_empty_text() {
        let page = PageText::new(vec![TextLine::default(), line("   ", 0.0, 10.0)]);
        assert!(page.words().is_empty());
        assert!(!page.is_empty());
        assert!(PageText::new(Vec::new()).is_empty());
    }
}
