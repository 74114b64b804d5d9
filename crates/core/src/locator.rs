//! Snap taps and drags to extracted text.
//!
//! A miss is not an error: locators return `None` or an empty list and the
//! placement policy supplies fallback geometry.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::geometry::{PagePoint, PageRect};
use crate::text_layout::{glyph_rect, PageText, TextLayout};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Horizontal hit-test padding around a word, in page units.
    pub hit_padding_x: f32,
    /// Vertical hit-test padding around a word, in page units.
    pub hit_padding_y: f32,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self { hit_padding_x: 20.0, hit_padding_y: 15.0 }
    }
}

fn page_text(layout: &mut TextLayout, page_index: u32) -> Option<std::sync::Arc<PageText>> {
    match layout.page(page_index) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!(page_index, error = %err, "text extraction failed; treating page as textless");
            None
        }
    }
}

/// Resolves a tap to the nearest word box.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointLocator {
    config: LocatorConfig,
}

impl PointLocator {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    pub fn locate(&self, layout: &mut TextLayout, page_index: u32, point: PagePoint) -> Option<PageRect> {
        let text = page_text(layout, page_index)?;
        self.locate_in(&text, point)
    }

    /// Word whose padded box contains `point`, closest center first.
    ///
    /// Distance is Manhattan distance to the word center; on a tie the
    /// earlier word wins.
    pub fn locate_in(&self, text: &PageText, point: PagePoint) -> Option<PageRect> {
        let mut best: Option<(f32, PageRect)> = None;
        for word in text.words() {
            let hit = word.rect.expanded(self.config.hit_padding_x, self.config.hit_padding_y);
            if !hit.contains(point) {
                continue;
            }
            let center = word.rect.center();
            let distance = (center.y - point.y).abs() + (center.x - point.x).abs();
            if best.map_or(true, |(closest, _)| distance < closest) {
                best = Some((distance, word.rect));
            }
        }
        best.map(|(_, rect)| rect)
    }
}

/// Resolves a drag rectangle to one box per touched line.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeLocator;

impl RangeLocator {
    pub fn new() -> Self {
        Self
    }

    pub fn locate(&self, layout: &mut TextLayout, page_index: u32, from: PagePoint, to: PagePoint) -> Vec<PageRect> {
        match page_text(layout, page_index) {
            Some(text) => self.locate_in(&text, from, to),
            None => Vec::new(),
        }
    }

    /// Merged glyph boxes per line, ordered top to bottom.
    pub fn locate_in(&self, text: &PageText, from: PagePoint, to: PagePoint) -> Vec<PageRect> {
        let selection = PageRect::from_corners(from, to);
        let mut rects: Vec<PageRect> = text
            .lines()
            .iter()
            .filter_map(|line| {
                line.glyphs
                    .iter()
                    .map(glyph_rect)
                    .filter(|rect| rect.intersects(&selection))
                    .reduce(|merged, rect| merged.union(&rect))
            })
            .collect();
        rects.sort_by(|a, b| a.top().total_cmp(&b.top()));
        rects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_layout::tests::{line, FixedText};
    use pdf_engine::{GlyphPosition, TextLine};

    fn single_word_page() -> PageText {
        // one glyph spanning [10,10]..[50,30]
        PageText::new(vec![TextLine::new(vec![GlyphPosition::new('w', 10.0, 30.0, 40.0, 20.0)])])
    }

    #[test]
    fn point_inside_padded_word_hits() {
        let locator = PointLocator::default();
        let page = single_word_page();
        assert_eq!(locator.locate_in(&page, PagePoint::new(30.0, 20.0)), Some(PageRect::new(10.0, 10.0, 40.0, 20.0)));
        assert_eq!(locator.locate_in(&page, PagePoint::new(69.0, 44.0)), Some(PageRect::new(10.0, 10.0, 40.0, 20.0)));
        assert_eq!(locator.locate_in(&page, PagePoint::new(1000.0, 1000.0)), None);
        assert_eq!(locator.locate_in(&page, PagePoint::new(71.0, 20.0)), None);
    }

    #[test]
    fn nearest_center_wins_and_ties_keep_first() {
        let locator = PointLocator::default();
        // words "aa" at 0..20 and "bb" at 40..60, both 10..20 vertically
        let page = PageText::new(vec![line("aa  bb", 0.0, 20.0)]);
        assert_eq!(locator.locate_in(&page, PagePoint::new(35.0, 15.0)).unwrap().x, 40.0);
        assert_eq!(locator.locate_in(&page, PagePoint::new(30.0, 15.0)).unwrap().x, 0.0);
    }

    #[test]
    fn padding_is_configurable() {
        let tight = PointLocator::new(LocatorConfig { hit_padding_x: 0.0, hit_padding_y: 0.0 });
        assert_eq!(tight.locate_in(&single_word_page(), PagePoint::new(55.0, 20.0)), None);
    }

    #[test]
    fn range_returns_one_rect_per_line_top_down() {
        let page = PageText::new(vec![
            line("lower", 0.0, 60.0),
            line("upper", 0.0, 20.0),
            line("far", 500.0, 40.0),
        ]);
        let rects = RangeLocator::new().locate_in(&page, PagePoint::new(25.0, 70.0), PagePoint::new(5.0, 5.0));
        assert_eq!(rects, vec![PageRect::new(0.0, 10.0, 30.0, 10.0), PageRect::new(0.0, 50.0, 30.0, 10.0)]);
    }

    #[test]
    fn disjoint_range_is_empty() {
        let page = PageText::new(vec![line("text", 0.0, 20.0)]);
        let rects = RangeLocator::new().locate_in(&page, PagePoint::new(300.0, 300.0), PagePoint::new(400.0, 400.0));
        assert!(rects.is_empty());
    }

    #[test]
    fn extraction_failure_is_a_miss() {
        let mut layout = TextLayout::new(Box::new(FixedText::new(Vec::new())));
        assert_eq!(PointLocator::default().locate(&mut layout, 0, PagePoint::new(1.0, 1.0)), None);
        assert!(RangeLocator::new()
            .locate(&mut layout, 0, PagePoint::new(0.0, 0.0), PagePoint::new(9.0, 9.0))
            .is_empty());
    }
}
