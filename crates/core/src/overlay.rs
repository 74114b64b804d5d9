//! Device-space drawing primitives for the annotation overlay.
//!
//! The host draws these on top of the page bitmap after every `Redraw`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::annotation::{Annotation, AnnotationKind, Color};
use crate::geometry::{PagePoint, PageRect};
use crate::layout::PageFrame;
use crate::viewport::ViewTransform;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    pub highlight_alpha: u8,
    pub selection_alpha: u8,
    /// Underline width in page units.
    pub underline_width: f32,
    /// Freehand stroke width in page units.
    pub stroke_width: f32,
    /// Width of a stroke still being drawn, in device pixels.
    pub live_stroke_width: f32,
    /// Text annotation font size in page units; `origin` is the baseline start.
    pub text_size: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            highlight_alpha: 100,
            selection_alpha: 128,
            underline_width: 2.0,
            stroke_width: 2.0,
            live_stroke_width: 5.0,
            text_size: 14.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayPrimitive {
    FillRect { rect: DeviceRect, color: Color },
    Line { from: (f32, f32), to: (f32, f32), width: f32, color: Color },
    Polyline { points: Vec<(f32, f32)>, width: f32, color: Color },
    Text { origin: (f32, f32), size: f32, text: Arc<str>, color: Color },
}

/// Builds primitives for one page under the current transform.
pub struct OverlayBuilder<'a> {
    transform: ViewTransform<'a>,
    frame: &'a PageFrame,
    style: OverlayStyle,
    px_per_unit: f32,
}

impl<'a> OverlayBuilder<'a> {
    pub fn new(transform: ViewTransform<'a>, frame: &'a PageFrame, style: OverlayStyle) -> Self {
        let units = transform.page_units_per_device_px(frame);
        let px_per_unit = if units > 0.0 { 1.0 / units } else { 1.0 };
        Self { transform, frame, style, px_per_unit }
    }

    fn device(&self, point: PagePoint) -> (f32, f32) {
        self.transform.to_device_space(self.frame, point)
    }

    fn device_rect(&self, rect: PageRect) -> DeviceRect {
        let (x, y) = self.device(PagePoint::new(rect.left(), rect.top()));
        DeviceRect { x, y, width: rect.width * self.px_per_unit, height: rect.height * self.px_per_unit }
    }

    pub fn annotation(&self, annotation: &Annotation) -> Option<OverlayPrimitive> {
        let rect = annotation.rect();
        let color = annotation.color();
        match annotation.kind() {
            AnnotationKind::Highlight => Some(OverlayPrimitive::FillRect {
                rect: self.device_rect(rect),
                color: color.with_alpha(self.style.highlight_alpha),
            }),
            AnnotationKind::Underline => Some(OverlayPrimitive::Line {
                from: self.device(PagePoint::new(rect.left(), rect.bottom())),
                to: self.device(PagePoint::new(rect.right(), rect.bottom())),
                width: self.style.underline_width * self.px_per_unit,
                color,
            }),
            AnnotationKind::Stroke => self.polyline(annotation.points(), color),
            AnnotationKind::Text => Some(OverlayPrimitive::Text {
                origin: self.device(PagePoint::new(rect.left(), rect.top())),
                size: self.style.text_size * self.px_per_unit,
                text: Arc::from(annotation.text_content().unwrap_or_default()),
                color,
            }),
        }
    }

    /// Polyline through page points; `None` below two points.
    pub fn polyline(&self, points: &[PagePoint], color: Color) -> Option<OverlayPrimitive> {
        self.polyline_with_width(points, self.style.stroke_width * self.px_per_unit, color)
    }

    /// Stroke still under the finger, drawn at a fixed device width.
    pub fn live_stroke(&self, points: &[PagePoint], color: Color) -> Option<OverlayPrimitive> {
        self.polyline_with_width(points, self.style.live_stroke_width, color)
    }

    fn polyline_with_width(&self, points: &[PagePoint], width: f32, color: Color) -> Option<OverlayPrimitive> {
        if points.len() < 2 {
            return None;
        }
        Some(OverlayPrimitive::Polyline { points: points.iter().map(|point| self.device(*point)).collect(), width, color })
    }

    /// Translucent box for an in-progress drag selection.
    pub fn selection(&self, from: PagePoint, to: PagePoint, color: Color) -> OverlayPrimitive {
        OverlayPrimitive::FillRect {
            rect: self.device_rect(PageRect::from_corners(from, to)),
            color: color.with_alpha(self.style.selection_alpha),
        }
    }

    pub fn page<'b>(&self, annotations: impl IntoIterator<Item = &'b Annotation>) -> Vec<OverlayPrimitive> {
        annotations
            .into_iter()
            .filter(|annotation| annotation.page_index() == self.frame.page_index)
            .filter_map(|annotation| self.annotation(annotation))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutConfig, PageLayout};
    use crate::viewport::{ViewportLimits, ViewportState};
    use pdf_engine::PageSize;

    // 600x900 page shown 300 px wide: 2 page units per pixel
    fn layout() -> PageLayout {
        PageLayout::new(&[PageSize { width_pt: 600.0, height_pt: 900.0 }; 2], 300.0, 450.0, LayoutConfig::default())
    }

    #[test]
    fn highlight_maps_to_translucent_device_rect() {
        let layout = layout();
        let viewport = ViewportState::new(ViewportLimits::default(), 300.0, 450.0);
        let frame = layout.frame(0).unwrap();
        let builder = OverlayBuilder::new(ViewTransform::new(&viewport, &layout), frame, OverlayStyle::default());

        let mark = Annotation::highlight(0, PageRect::new(100.0, 200.0, 60.0, 20.0), Color::YELLOW);
        let primitive = builder.annotation(&mark).unwrap();
        assert_eq!(
            primitive,
            OverlayPrimitive::FillRect {
                rect: DeviceRect { x: 50.0, y: 100.0, width: 30.0, height: 10.0 },
                color: Color::YELLOW.with_alpha(100),
            }
        );
    }

    #[test]
    fn underline_sits_on_the_bottom_edge_and_scales_with_zoom() {
        let layout = layout();
        let mut viewport = ViewportState::new(ViewportLimits::default(), 300.0, 450.0);
        viewport.set_zoom(2.0);
        let frame = layout.frame(0).unwrap();
        let builder = OverlayBuilder::new(ViewTransform::new(&viewport, &layout), frame, OverlayStyle::default());

        let mark = Annotation::underline(0, PageRect::new(0.0, 10.0, 100.0, 4.0), Color::RED);
        match builder.annotation(&mark).unwrap() {
            OverlayPrimitive::Line { from, to, width, .. } => {
                assert_eq!(from, (0.0, 14.0));
                assert_eq!(to, (100.0, 14.0));
                assert_eq!(width, 2.0);
            }
            other => panic!("unexpected primitive {other:?}"),
        }
    }

    #[test]
    fn page_filter_and_short_strokes() {
        let layout = layout();
        let viewport = ViewportState::new(ViewportLimits::default(), 300.0, 450.0);
        let frame = layout.frame(1).unwrap();
        let builder = OverlayBuilder::new(ViewTransform::new(&viewport, &layout), frame, OverlayStyle::default());

        let marks = vec![
            Annotation::highlight(0, PageRect::new(0.0, 0.0, 10.0, 10.0), Color::YELLOW),
            Annotation::stroke(1, vec![PagePoint::new(0.0, 0.0)], Color::BLUE).unwrap(),
            Annotation::stroke(1, vec![PagePoint::new(0.0, 0.0), PagePoint::new(20.0, 20.0)], Color::BLUE).unwrap(),
            Annotation::text(1, PageRect::new(40.0, 40.0, 200.0, 50.0), "hi", Color::BLACK),
        ];
        let primitives = builder.page(&marks);
        assert_eq!(primitives.len(), 2);
        match &primitives[0] {
            OverlayPrimitive::Polyline { points, .. } => assert_eq!(points[1], (10.0, 460.0)),
            other => panic!("unexpected primitive {other:?}"),
        }
        match &primitives[1] {
            OverlayPrimitive::Text { origin, size, text, .. } => {
                assert_eq!(*origin, (20.0, 470.0));
                assert_eq!(*size, 7.0);
                assert_eq!(&**text, "hi");
            }
            other => panic!("unexpected primitive {other:?}"),
        }
    }
}
