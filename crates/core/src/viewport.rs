//! Zoom/pan state and the device ↔ page coordinate mapping.
//!
//! Device space is the pixel space of the on-screen view. Content space is
//! the unzoomed layout of stacked pages at view width; the viewport maps
//! between them with `device = translate + scale * content`. Page space is
//! reached from content space through a [`PageFrame`].

use serde::{Deserialize, Serialize};

use crate::geometry::PagePoint;
use crate::layout::{PageFrame, PageLayout};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportLimits {
    pub min_scale: f32,
    pub max_scale: f32,
    /// Increment used by zoom in / zoom out.
    pub zoom_step: f32,
}

impl Default for ViewportLimits {
    fn default() -> Self {
        Self { min_scale: 1.0, max_scale: 5.0, zoom_step: 0.5 }
    }
}

impl ViewportLimits {
    fn clamp(&self, scale: f32) -> f32 {
        scale.max(self.min_scale).min(self.max_scale)
    }
}

/// Scale and translation of one open document view.
///
/// Every mutation clamps: scale stays within the limits and the translation
/// never exposes blank space beyond the scaled content. At scale 1.0 or
/// below the translation is always `(0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    scale: f32,
    translate_x: f32,
    translate_y: f32,
    view_width: f32,
    view_height: f32,
    limits: ViewportLimits,
}

impl ViewportState {
    pub fn new(limits: ViewportLimits, view_width: f32, view_height: f32) -> Self {
        let mut state = Self {
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
            view_width: view_width.max(0.0),
            view_height: view_height.max(0.0),
            limits,
        };
        state.scale = limits.clamp(1.0);
        state.normalize();
        state
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn translate(&self) -> (f32, f32) {
        (self.translate_x, self.translate_y)
    }

    pub fn limits(&self) -> ViewportLimits {
        self.limits
    }

    pub fn view_size(&self) -> (f32, f32) {
        (self.view_width, self.view_height)
    }

    pub fn set_view_size(&mut self, width: f32, height: f32) {
        self.view_width = width.max(0.0);
        self.view_height = height.max(0.0);
        self.normalize();
    }

    /// Zoom by `factor` around the device point `(focal_x, focal_y)`.
    ///
    /// Implements `t' = f - (f - t) * next / prev` per axis, so the content
    /// point under the focal point stays under it unless the translation has
    /// to be clamped.
    pub fn pinch(&mut self, focal_x: f32, focal_y: f32, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 || !focal_x.is_finite() || !focal_y.is_finite() {
            return;
        }
        let previous = self.scale;
        let next = self.limits.clamp(previous * factor);
        let ratio = next / previous;
        self.translate_x = focal_x - (focal_x - self.translate_x) * ratio;
        self.translate_y = focal_y - (focal_y - self.translate_y) * ratio;
        self.scale = next;
        self.normalize();
    }

    /// Move the zoomed content. Ignored unless zoomed in past 1.0.
    pub fn pan(&mut self, dx: f32, dy: f32) -> bool {
        if self.scale <= 1.0 || !dx.is_finite() || !dy.is_finite() {
            return false;
        }
        self.translate_x += dx;
        self.translate_y += dy;
        self.normalize();
        true
    }

    pub fn set_zoom(&mut self, scale: f32) {
        if !scale.is_finite() {
            return;
        }
        self.scale = self.limits.clamp(scale);
        self.normalize();
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.scale + self.limits.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.scale - self.limits.zoom_step);
    }

    pub fn reset(&mut self) {
        self.set_zoom(1.0);
    }

    fn normalize(&mut self) {
        if self.scale > 1.0 {
            let min_x = -(self.view_width * self.scale - self.view_width);
            let min_y = -(self.view_height * self.scale - self.view_height);
            self.translate_x = self.translate_x.clamp(min_x, 0.0);
            self.translate_y = self.translate_y.clamp(min_y, 0.0);
        } else {
            self.translate_x = 0.0;
            self.translate_y = 0.0;
        }
    }

    pub fn device_to_content(&self, device_x: f32, device_y: f32) -> (f32, f32) {
        ((device_x - self.translate_x) / self.scale, (device_y - self.translate_y) / self.scale)
    }

    pub fn content_to_device(&self, content_x: f32, content_y: f32) -> (f32, f32) {
        (content_x * self.scale + self.translate_x, content_y * self.scale + self.translate_y)
    }
}

/// A page-space location resolved from a device point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageHit {
    pub page_index: u32,
    pub point: PagePoint,
}

/// Device ↔ page mapping for the current viewport and page layout.
#[derive(Debug, Clone, Copy)]
pub struct ViewTransform<'a> {
    viewport: &'a ViewportState,
    layout: &'a PageLayout,
}

impl<'a> ViewTransform<'a> {
    pub fn new(viewport: &'a ViewportState, layout: &'a PageLayout) -> Self {
        Self { viewport, layout }
    }

    /// Resolve a device point to the page under it.
    pub fn to_page_space(&self, device_x: f32, device_y: f32) -> Option<PageHit> {
        let (cx, cy) = self.viewport.device_to_content(device_x, device_y);
        let frame = self.layout.frame_at(cy + self.layout.scroll_offset())?;
        if cx < frame.left || cx > frame.left + frame.width {
            return None;
        }
        let point = self.to_page_space_on(frame, device_x, device_y);
        Some(PageHit { page_index: frame.page_index, point })
    }

    /// Map a device point onto a known page, even outside its bounds.
    ///
    /// Strokes keep their starting page while the finger wanders off it.
    pub fn to_page_space_on(&self, frame: &PageFrame, device_x: f32, device_y: f32) -> PagePoint {
        let (cx, cy) = self.viewport.device_to_content(device_x, device_y);
        let layout_y = cy + self.layout.scroll_offset();
        let units = frame.units_per_px();
        PagePoint::new((cx - frame.left) * units, (layout_y - frame.top) * units)
    }

    /// Inverse of [`Self::to_page_space_on`].
    pub fn to_device_space(&self, frame: &PageFrame, point: PagePoint) -> (f32, f32) {
        let units = frame.units_per_px();
        let cx = point.x / units + frame.left;
        let cy = point.y / units + frame.top - self.layout.scroll_offset();
        self.viewport.content_to_device(cx, cy)
    }

    /// Page-space length of one device pixel at the current zoom.
    pub fn page_units_per_device_px(&self, frame: &PageFrame) -> f32 {
        frame.units_per_px() / self.viewport.scale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutConfig, PageLayout};
    use pdf_engine::PageSize;
    use rand::{Rng, SeedableRng};

    fn viewport() -> ViewportState {
        ViewportState::new(ViewportLimits::default(), 400.0, 800.0)
    }

    #[test]
    fn scale_is_clamped() {
        let mut vp = viewport();
        vp.set_zoom(12.0);
        assert_eq!(vp.scale(), 5.0);
        vp.set_zoom(0.1);
        assert_eq!(vp.scale(), 1.0);
        vp.pinch(100.0, 100.0, 100.0);
        assert_eq!(vp.scale(), 5.0);
    }

    #[test]
    fn translate_resets_at_unit_scale() {
        let mut vp = viewport();
        vp.pinch(200.0, 300.0, 2.0);
        assert_ne!(vp.translate(), (0.0, 0.0));
        vp.pinch(200.0, 300.0, 0.25);
        assert_eq!(vp.scale(), 1.0);
        assert_eq!(vp.translate(), (0.0, 0.0));
    }

    #[test]
    fn pinch_from_rest_matches_focal_formula() {
        let mut vp = viewport();
        vp.pinch(100.0, 200.0, 2.0);
        // translate -= (f/prev - f/new) * new
        assert_eq!(vp.translate(), (-100.0, -200.0));
    }

    #[test]
    fn pinch_keeps_focal_point_fixed() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let mut vp = viewport();
        for _ in 0..200 {
            let fx = rng.gen_range(0.0..400.0);
            let fy = rng.gen_range(0.0..800.0);
            let before = vp.device_to_content(fx, fy);
            vp.pinch(fx, fy, rng.gen_range(1.0..1.3));
            let after = vp.device_to_content(fx, fy);
            assert!((before.0 - after.0).abs() < 1e-2, "{before:?} vs {after:?}");
            assert!((before.1 - after.1).abs() < 1e-2, "{before:?} vs {after:?}");
            if vp.scale() >= 5.0 {
                vp.reset();
            }
        }
    }

    #[test]
    fn pan_only_when_zoomed() {
        let mut vp = viewport();
        assert!(!vp.pan(-50.0, -50.0));
        assert_eq!(vp.translate(), (0.0, 0.0));

        vp.set_zoom(2.0);
        assert!(vp.pan(-50.0, -60.0));
        assert_eq!(vp.translate(), (-50.0, -60.0));

        vp.pan(-10_000.0, 10_000.0);
        assert_eq!(vp.translate(), (-400.0, 0.0));
    }

    #[test]
    fn zoom_steps() {
        let mut vp = viewport();
        vp.zoom_in();
        vp.zoom_in();
        assert_eq!(vp.scale(), 2.0);
        for _ in 0..10 {
            vp.zoom_out();
        }
        assert_eq!(vp.scale(), 1.0);
        assert_eq!(vp.translate(), (0.0, 0.0));
    }

    #[test]
    fn nonsense_inputs_are_ignored() {
        let mut vp = viewport();
        vp.pinch(10.0, 10.0, f32::NAN);
        vp.pinch(10.0, 10.0, -2.0);
        vp.set_zoom(f32::INFINITY);
        assert_eq!(vp.scale(), 1.0);
    }

    #[test]
    fn random_sequences_respect_invariants() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let mut vp = viewport();
        for _ in 0..1_000 {
            match rng.gen_range(0..5) {
                0 => vp.pinch(rng.gen_range(-50.0..450.0), rng.gen_range(-50.0..850.0), rng.gen_range(0.2..3.0)),
                1 => {
                    vp.pan(rng.gen_range(-300.0..300.0), rng.gen_range(-300.0..300.0));
                }
                2 => vp.zoom_in(),
                3 => vp.zoom_out(),
                _ => vp.set_zoom(rng.gen_range(0.0..8.0)),
            }
            assert!((1.0..=5.0).contains(&vp.scale()));
            if vp.scale() == 1.0 {
                assert_eq!(vp.translate(), (0.0, 0.0));
            }
            let (tx, ty) = vp.translate();
            assert!(tx <= 0.0 && tx >= -(400.0 * vp.scale() - 400.0) - 1e-3);
            assert!(ty <= 0.0 && ty >= -(800.0 * vp.scale() - 800.0) - 1e-3);
        }
    }

    fn two_page_layout() -> PageLayout {
        PageLayout::new(
            &[PageSize { width_pt: 600.0, height_pt: 900.0 }, PageSize { width_pt: 600.0, height_pt: 900.0 }],
            400.0,
            800.0,
            LayoutConfig::default(),
        )
    }

    #[test]
    fn device_to_page_and_back() {
        let layout = two_page_layout();
        let mut vp = viewport();
        vp.set_zoom(2.0);
        vp.pan(-100.0, -100.0);
        let transform = ViewTransform::new(&vp, &layout);

        let hit = transform.to_page_space(150.0, 300.0).unwrap();
        assert_eq!(hit.page_index, 0);
        // content (125, 200) at 1.5 points per pixel
        assert_eq!(hit.point, PagePoint::new(187.5, 300.0));

        let frame = layout.frame(0).unwrap();
        let (dx, dy) = transform.to_device_space(frame, hit.point);
        assert!((dx - 150.0).abs() < 1e-3 && (dy - 300.0).abs() < 1e-3);
    }

    #[test]
    fn second_page_is_found_below_the_first() {
        let layout = two_page_layout();
        let vp = viewport();
        let transform = ViewTransform::new(&vp, &layout);
        let hit = transform.to_page_space(40.0, 660.0).unwrap();
        assert_eq!(hit.page_index, 1);
        assert_eq!(hit.point, PagePoint::new(60.0, 90.0));
    }
}
