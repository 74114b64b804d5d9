//! Turn locator results into annotation geometry.

use serde::{Deserialize, Serialize};

use crate::annotation::{Annotation, Color};
use crate::geometry::{PagePoint, PageRect};

/// Text-anchored mark kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Highlight,
    Underline,
}

/// Fallback and offset geometry, all in page units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Underline band starts this far above the bottom of the located box.
    pub underline_rise: f32,
    pub underline_thickness: f32,
    /// Width of the box placed on a tap that hit no word.
    pub tap_fallback_width: f32,
    pub tap_highlight_height: f32,
    pub tap_underline_height: f32,
    /// Minimum size of the box placed on a drag that touched no text.
    pub range_min_width: f32,
    pub range_min_height: f32,
    pub range_underline_height: f32,
    pub text_box_width: f32,
    pub text_box_height: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            underline_rise: 2.0,
            underline_thickness: 4.0,
            tap_fallback_width: 200.0,
            tap_highlight_height: 15.0,
            tap_underline_height: 3.0,
            range_min_width: 50.0,
            range_min_height: 20.0,
            range_underline_height: 6.0,
            text_box_width: 200.0,
            text_box_height: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Placement {
    config: PlacementConfig,
}

impl Placement {
    pub fn new(config: PlacementConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    fn underline_of(&self, rect: PageRect) -> PageRect {
        PageRect::new(
            rect.left(),
            rect.bottom() - self.config.underline_rise,
            rect.width,
            self.config.underline_thickness,
        )
    }

    /// Box for a tap, centered on the tap when no word was located.
    pub fn tap_rect(&self, mark: Mark, located: Option<PageRect>, tap: PagePoint) -> PageRect {
        match (mark, located) {
            (Mark::Highlight, Some(rect)) => rect,
            (Mark::Underline, Some(rect)) => self.underline_of(rect),
            (mark, None) => {
                let height = match mark {
                    Mark::Highlight => self.config.tap_highlight_height,
                    Mark::Underline => self.config.tap_underline_height,
                };
                let width = self.config.tap_fallback_width;
                PageRect::new(tap.x - width / 2.0, tap.y - height / 2.0, width, height)
            }
        }
    }

    /// Boxes for a drag; one fallback box spanning the drag when nothing was located.
    pub fn range_rects(&self, mark: Mark, located: &[PageRect], from: PagePoint, to: PagePoint) -> Vec<PageRect> {
        if located.is_empty() {
            let span = PageRect::from_corners(from, to);
            let height = match mark {
                Mark::Highlight => span.height.max(self.config.range_min_height),
                Mark::Underline => self.config.range_underline_height,
            };
            return vec![PageRect::new(span.x, span.y, span.width.max(self.config.range_min_width), height)];
        }
        match mark {
            Mark::Highlight => located.to_vec(),
            Mark::Underline => located.iter().map(|rect| self.underline_of(*rect)).collect(),
        }
    }

    pub fn tap(&self, mark: Mark, page_index: u32, located: Option<PageRect>, tap: PagePoint, color: Color) -> Annotation {
        to_annotation(mark, page_index, self.tap_rect(mark, located, tap), color)
    }

    pub fn range(
        &self,
        mark: Mark,
        page_index: u32,
        located: &[PageRect],
        from: PagePoint,
        to: PagePoint,
        color: Color,
    ) -> Vec<Annotation> {
        self.range_rects(mark, located, from, to)
            .into_iter()
            .map(|rect| to_annotation(mark, page_index, rect, color))
            .collect()
    }

    /// Text annotation anchored with its top-left corner at `at`.
    pub fn text(&self, page_index: u32, at: PagePoint, text: &str, color: Color) -> Annotation {
        let rect = PageRect::new(at.x, at.y, self.config.text_box_width, self.config.text_box_height);
        Annotation::text(page_index, rect, text, color)
    }
}

fn to_annotation(mark: Mark, page_index: u32, rect: PageRect, color: Color) -> Annotation {
    match mark {
        Mark::Highlight => Annotation::highlight(page_index, rect, color),
        Mark::Underline => Annotation::underline(page_index, rect, color),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationKind;

    #[test]
    fn located_tap() {
        let placement = Placement::default();
        let word = PageRect::new(10.0, 10.0, 40.0, 20.0);
        let tap = PagePoint::new(30.0, 20.0);
        assert_eq!(placement.tap_rect(Mark::Highlight, Some(word), tap), word);
        assert_eq!(placement.tap_rect(Mark::Underline, Some(word), tap), PageRect::new(10.0, 28.0, 40.0, 4.0));
    }

    #[test]
    fn missed_tap_is_centered() {
        let placement = Placement::default();
        let tap = PagePoint::new(300.0, 400.0);
        assert_eq!(placement.tap_rect(Mark::Highlight, None, tap), PageRect::new(200.0, 392.5, 200.0, 15.0));
        assert_eq!(placement.tap_rect(Mark::Underline, None, tap), PageRect::new(200.0, 398.5, 200.0, 3.0));
    }

    #[test]
    fn missed_range_is_floored() {
        let placement = Placement::default();
        let from = PagePoint::new(40.0, 30.0);
        let to = PagePoint::new(10.0, 25.0);
        assert_eq!(
            placement.range_rects(Mark::Highlight, &[], from, to),
            vec![PageRect::new(10.0, 25.0, 50.0, 20.0)]
        );
        assert_eq!(
            placement.range_rects(Mark::Underline, &[], from, to),
            vec![PageRect::new(10.0, 25.0, 50.0, 6.0)]
        );
    }

    #[test]
    fn range_annotations_keep_kind_and_page() {
        let placement = Placement::default();
        let lines = [PageRect::new(0.0, 0.0, 100.0, 10.0), PageRect::new(0.0, 20.0, 80.0, 10.0)];
        let marks = placement.range(Mark::Underline, 3, &lines, PagePoint::default(), PagePoint::default(), Color::RED);
        assert_eq!(marks.len(), 2);
        assert!(marks.iter().all(|mark| mark.kind() == AnnotationKind::Underline && mark.page_index() == 3));
        assert_eq!(marks[1].rect(), PageRect::new(0.0, 28.0, 80.0, 4.0));
    }

    #[test]
    fn text_box_size() {
        let note = Placement::default().text(0, PagePoint::new(5.0, 6.0), "note", Color::BLACK);
        assert_eq!(note.rect(), PageRect::new(5.0, 6.0, 200.0, 50.0));
        assert_eq!(note.text_content(), Some("note"));
    }
}
