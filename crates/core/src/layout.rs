//! Continuous vertical page layout.
//!
//! Pages are stacked top to bottom at the view width, so each frame's height
//! follows the page aspect ratio. The layout owns the vertical scroll offset;
//! zoom and pan live in [`crate::viewport::ViewportState`].

use std::ops::Range;

use pdf_engine::PageSize;
use serde::{Deserialize, Serialize};

use crate::viewport::ViewportState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Vertical gap between pages in view pixels.
    pub page_gap: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self { page_gap: 0.0 }
    }
}

/// Where one page sits in the unzoomed layout, in view pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFrame {
    pub page_index: u32,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub page_size: PageSize,
}

impl PageFrame {
    /// Page units covered by one unzoomed view pixel.
    pub fn units_per_px(&self) -> f32 {
        if self.width > 0.0 {
            self.page_size.width_pt / self.width
        } else {
            1.0
        }
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

#[derive(Debug, Clone)]
pub struct PageLayout {
    page_sizes: Vec<PageSize>,
    frames: Vec<PageFrame>,
    view_width: f32,
    view_height: f32,
    config: LayoutConfig,
    scroll_offset: f32,
}

impl PageLayout {
    pub fn new(page_sizes: &[PageSize], view_width: f32, view_height: f32, config: LayoutConfig) -> Self {
        let mut layout = Self {
            page_sizes: page_sizes.to_vec(),
            frames: Vec::new(),
            view_width,
            view_height,
            config,
            scroll_offset: 0.0,
        };
        layout.rebuild();
        layout
    }

    fn rebuild(&mut self) {
        let width = self.view_width.max(0.0);
        let mut top = 0.0;
        self.frames = self
            .page_sizes
            .iter()
            .enumerate()
            .map(|(index, size)| {
                let height = if size.width_pt > 0.0 { width * size.height_pt / size.width_pt } else { 0.0 };
                let frame = PageFrame { page_index: index as u32, left: 0.0, top, width, height, page_size: *size };
                top += height + self.config.page_gap;
                frame
            })
            .collect();
        self.scroll_to(self.scroll_offset);
    }

    pub fn set_view_size(&mut self, width: f32, height: f32) {
        let page = self.current_page();
        self.view_width = width;
        self.view_height = height;
        self.rebuild();
        if let Some(page) = page {
            self.jump_to_page(page);
        }
    }

    pub fn page_count(&self) -> u32 {
        self.frames.len() as u32
    }

    pub fn frame(&self, page_index: u32) -> Option<&PageFrame> {
        self.frames.get(page_index as usize)
    }

    pub fn frames(&self) -> &[PageFrame] {
        &self.frames
    }

    /// Frame containing the layout y coordinate; `None` in gaps and past the end.
    pub fn frame_at(&self, layout_y: f32) -> Option<&PageFrame> {
        let index = self.frames.partition_point(|frame| frame.top <= layout_y);
        let frame = self.frames.get(index.checked_sub(1)?)?;
        (layout_y <= frame.bottom()).then_some(frame)
    }

    pub fn content_height(&self) -> f32 {
        self.frames.last().map(PageFrame::bottom).unwrap_or(0.0)
    }

    pub fn max_scroll(&self) -> f32 {
        (self.content_height() - self.view_height).max(0.0)
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    pub fn scroll_to(&mut self, offset: f32) {
        let offset = if offset.is_finite() { offset } else { 0.0 };
        self.scroll_offset = offset.clamp(0.0, self.max_scroll());
    }

    /// Scroll by `dy` view pixels and return the distance actually moved.
    pub fn scroll_by(&mut self, dy: f32) -> f32 {
        let before = self.scroll_offset;
        self.scroll_to(before + dy);
        self.scroll_offset - before
    }

    pub fn offset_of(&self, page_index: u32) -> Option<f32> {
        self.frame(page_index).map(|frame| frame.top)
    }

    /// Scroll so the page's top edge is at the top of the view.
    pub fn jump_to_page(&mut self, page_index: u32) -> bool {
        match self.offset_of(page_index) {
            Some(offset) => {
                self.scroll_to(offset);
                true
            }
            None => false,
        }
    }

    /// Page at the top edge of the view.
    pub fn current_page(&self) -> Option<u32> {
        self.frame_at(self.scroll_offset)
            .or_else(|| self.frames.iter().find(|frame| frame.top >= self.scroll_offset))
            .map(|frame| frame.page_index)
    }

    /// Pages intersecting the visible region under the given viewport.
    pub fn visible_pages(&self, viewport: &ViewportState) -> Range<u32> {
        let (_, top) = viewport.device_to_content(0.0, 0.0);
        let (_, bottom) = viewport.device_to_content(0.0, self.view_height);
        let top = top + self.scroll_offset;
        let bottom = bottom + self.scroll_offset;

        let start = self.frames.partition_point(|frame| frame.bottom() < top) as u32;
        let end = self.frames.partition_point(|frame| frame.top <= bottom) as u32;
        start..end.max(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::ViewportLimits;

    fn letter_pages(count: usize) -> Vec<PageSize> {
        vec![PageSize { width_pt: 600.0, height_pt: 900.0 }; count]
    }

    #[test]
    fn frames_stack_with_gap() {
        let layout = PageLayout::new(&letter_pages(3), 400.0, 800.0, LayoutConfig { page_gap: 10.0 });
        assert_eq!(layout.frame(1).unwrap().top, 610.0);
        assert_eq!(layout.content_height(), 600.0 * 3.0 + 20.0);
        assert!(layout.frame_at(605.0).is_none());
        assert_eq!(layout.frame_at(611.0).unwrap().page_index, 1);
        assert!(layout.frame_at(5_000.0).is_none());
    }

    #[test]
    fn jump_and_scroll_are_clamped() {
        let mut layout = PageLayout::new(&letter_pages(3), 400.0, 800.0, LayoutConfig::default());
        assert!(layout.jump_to_page(1));
        assert_eq!(layout.scroll_offset(), 600.0);
        assert_eq!(layout.current_page(), Some(1));

        assert!(layout.jump_to_page(2));
        assert_eq!(layout.scroll_offset(), 1_000.0);
        assert!(!layout.jump_to_page(7));

        assert_eq!(layout.scroll_by(-5_000.0), -1_000.0);
        assert_eq!(layout.scroll_offset(), 0.0);
    }

    #[test]
    fn visible_pages_follow_zoom() {
        let layout = PageLayout::new(&letter_pages(4), 400.0, 800.0, LayoutConfig::default());
        let mut viewport = ViewportState::new(ViewportLimits::default(), 400.0, 800.0);
        assert_eq!(layout.visible_pages(&viewport), 0..2);

        viewport.set_zoom(2.0);
        assert_eq!(layout.visible_pages(&viewport), 0..1);
    }

    #[test]
    fn resize_keeps_current_page() {
        let mut layout = PageLayout::new(&letter_pages(4), 400.0, 800.0, LayoutConfig::default());
        layout.jump_to_page(2);
        layout.set_view_size(200.0, 400.0);
        assert_eq!(layout.current_page(), Some(2));
        assert_eq!(layout.scroll_offset(), 600.0);
    }
}
