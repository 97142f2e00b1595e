//! Pan/zoom over the active bitmap
//!
//! The transform maps bitmap pixels to viewport-local screen points as
//! `screen = bitmap * k + (x, y)`. Gesture handling and drawing are separate:
//! gestures only ever go through [`ViewportController::apply_transform`].

use egui::{Color32, Painter, Pos2, Response, TextureId, Vec2};

use crate::data::point::{Point, Tier};
use crate::pipeline::geometry::BoundsTable;

pub const MIN_SCALE: f64 = 0.01;
pub const MAX_SCALE: f64 = 64.0;

/// Wheel zoom factor per scrolled point, as `2^(delta * WHEEL_RATE)`
const WHEEL_RATE: f64 = 0.002;

const MARKER_RADIUS: f32 = 3.0;

pub const VIEW_BACKGROUND: Color32 = Color32::from_rgb(0x14, 0x14, 0x18);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub k: f64,
    pub x: f64,
    pub y: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self { k: 1.0, x: 0.0, y: 0.0 }
    }

    /// Bitmap space → viewport space
    pub fn apply(&self, bx: f64, by: f64) -> (f64, f64) {
        (bx * self.k + self.x, by * self.k + self.y)
    }

    /// Viewport space → bitmap space
    pub fn invert(&self, sx: f64, sy: f64) -> (f64, f64) {
        ((sx - self.x) / self.k, (sy - self.y) / self.k)
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            k: self.k,
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Multiply the scale by `factor`, keeping the bitmap pixel under
    /// `anchor` fixed on screen.
    pub fn scale_about(&self, factor: f64, anchor: (f64, f64)) -> Self {
        let k = (self.k * factor).clamp(MIN_SCALE, MAX_SCALE);
        let (bx, by) = self.invert(anchor.0, anchor.1);
        Self {
            k,
            x: anchor.0 - bx * k,
            y: anchor.1 - by * k,
        }
    }

    fn is_valid(&self) -> bool {
        self.k.is_finite() && self.k > 0.0 && self.x.is_finite() && self.y.is_finite()
    }
}

/// One input tick, in viewport-local coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Drag { dx: f64, dy: f64 },
    /// `delta_y` follows the wheel convention: positive scrolls down and zooms out
    Wheel { delta_y: f64, at: (f64, f64) },
    Pinch { factor: f64, at: (f64, f64) },
}

/// `min(viewport_w / content_w, viewport_h / content_h)`, the largest
/// uniform scale that shows the whole content.
pub fn get_fit_scale(viewport: (f64, f64), content_width: f64, content_height: f64) -> f64 {
    if content_width <= 0.0 || content_height <= 0.0 {
        return 1.0;
    }
    let fit = (viewport.0 / content_width).min(viewport.1 / content_height);
    if fit.is_finite() && fit > 0.0 {
        fit
    } else {
        MIN_SCALE
    }
}

/// Owner of the single live transform
#[derive(Debug, Clone, Default)]
pub struct ViewportController {
    transform: Transform,
}

impl ViewportController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// The only place the transform changes. Non-finite or non-positive
    /// scales are refused and the current transform is kept.
    pub fn apply_transform(&mut self, next: Transform) -> Transform {
        if next.is_valid() {
            self.transform = next;
        } else {
            log::warn!("Rejected transform {:?}", next);
        }
        self.transform
    }

    pub fn apply_gesture(&mut self, gesture: Gesture) -> Transform {
        let current = self.transform;
        let next = match gesture {
            Gesture::Drag { dx, dy } => current.translate(dx, dy),
            Gesture::Wheel { delta_y, at } => current.scale_about(2f64.powf(-delta_y * WHEEL_RATE), at),
            Gesture::Pinch { factor, at } => current.scale_about(factor, at),
        };
        self.apply_transform(next)
    }

    pub fn reset_zoom(&mut self, scale: f64) -> Transform {
        self.apply_transform(Transform { k: scale, x: 0.0, y: 0.0 })
    }

    /// Turn this frame's pointer input over `response` into gestures.
    /// `on_change` runs once per applied gesture with the new transform.
    pub fn handle_response(
        &mut self,
        ui: &egui::Ui,
        response: &Response,
        mut on_change: impl FnMut(Transform),
    ) {
        let origin = response.rect.min;

        if response.dragged() {
            let delta = response.drag_delta();
            if delta != Vec2::ZERO {
                on_change(self.apply_gesture(Gesture::Drag {
                    dx: delta.x as f64,
                    dy: delta.y as f64,
                }));
            }
        }

        let Some(cursor) = response.hover_pos() else {
            return;
        };
        let at = ((cursor.x - origin.x) as f64, (cursor.y - origin.y) as f64);
        let (scroll, zoom) = ui.input(|i| (i.raw_scroll_delta, i.zoom_delta()));

        if zoom != 1.0 {
            on_change(self.apply_gesture(Gesture::Pinch {
                factor: zoom as f64,
                at,
            }));
        } else if scroll.y != 0.0 {
            // egui reports scrolling up as positive
            on_change(self.apply_gesture(Gesture::Wheel {
                delta_y: -scroll.y as f64,
                at,
            }));
        }
    }
}

/// Screen rectangle the bitmap covers under `transform`
pub fn view_rect(viewport: egui::Rect, transform: &Transform, size: [u32; 2]) -> egui::Rect {
    let min = viewport.min + Vec2::new(transform.x as f32, transform.y as f32);
    let extent = Vec2::new(
        (size[0] as f64 * transform.k) as f32,
        (size[1] as f64 * transform.k) as f32,
    );
    egui::Rect::from_min_size(min, extent)
}

/// Clear `viewport` and draw the bitmap texture through `transform`
pub fn render_view(
    painter: &Painter,
    viewport: egui::Rect,
    transform: &Transform,
    texture: TextureId,
    size: [u32; 2],
) {
    let painter = painter.with_clip_rect(viewport);
    painter.rect_filled(viewport, 0.0, VIEW_BACKGROUND);
    let uv = egui::Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
    painter.image(texture, view_rect(viewport, transform, size), uv, Color32::WHITE);
}

/// Viewport-local marker positions: each point's tile centre for `tier`,
/// mapped through `transform`. Points without bounds get no marker.
pub fn overlay_markers(
    points: &[Point],
    bounds: &BoundsTable,
    tier: Tier,
    transform: &Transform,
) -> Vec<(f64, f64)> {
    points
        .iter()
        .filter_map(|p| bounds.get(&p.filename, tier))
        .map(|rect| {
            let (cx, cy) = rect.center();
            transform.apply(cx, cy)
        })
        .collect()
}

pub fn paint_overlay(painter: &Painter, viewport: egui::Rect, markers: &[(f64, f64)]) {
    let painter = painter.with_clip_rect(viewport);
    let fill = Color32::from_rgba_unmultiplied(255, 0, 0, 178);
    for &(x, y) in markers {
        let center = viewport.min + Vec2::new(x as f32, y as f32);
        painter.circle_filled(center, MARKER_RADIUS, fill);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::point::Rect;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_apply_and_invert_agree() {
        let t = Transform { k: 2.5, x: -30.0, y: 12.0 };
        let (sx, sy) = t.apply(100.0, 40.0);
        assert_eq!((sx, sy), (220.0, 112.0));
        let (bx, by) = t.invert(sx, sy);
        assert!(close(bx, 100.0) && close(by, 40.0));
    }

    #[test]
    fn test_fit_scale_uses_tighter_axis() {
        assert_eq!(get_fit_scale((800.0, 600.0), 4096.0, 4096.0), 600.0 / 4096.0);
        assert_eq!(get_fit_scale((400.0, 1000.0), 200.0, 400.0), 2.0);
        assert_eq!(get_fit_scale((400.0, 400.0), 0.0, 400.0), 1.0);
    }

    #[test]
    fn test_reset_ignores_gesture_history() {
        let mut vc = ViewportController::new();
        vc.apply_gesture(Gesture::Drag { dx: 50.0, dy: -20.0 });
        vc.apply_gesture(Gesture::Wheel { delta_y: -300.0, at: (10.0, 10.0) });
        vc.apply_gesture(Gesture::Pinch { factor: 3.0, at: (200.0, 100.0) });
        assert_ne!(vc.transform(), Transform { k: 0.25, x: 0.0, y: 0.0 });

        let t = vc.reset_zoom(0.25);
        assert_eq!(t, Transform { k: 0.25, x: 0.0, y: 0.0 });
        assert_eq!(vc.transform(), t);
    }

    #[test]
    fn test_zoom_keeps_cursor_pixel_fixed() {
        let mut vc = ViewportController::new();
        vc.apply_transform(Transform { k: 0.5, x: 10.0, y: 20.0 });
        let anchor = (110.0, 70.0);
        let before = vc.transform().invert(anchor.0, anchor.1);

        let t = vc.apply_gesture(Gesture::Wheel { delta_y: -500.0, at: anchor });
        assert!(close(t.k, 1.0));
        let after = t.invert(anchor.0, anchor.1);
        assert!(close(before.0, after.0) && close(before.1, after.1));
    }

    #[test]
    fn test_scale_is_clamped_and_positive() {
        let mut vc = ViewportController::new();
        let t = vc.apply_gesture(Gesture::Pinch { factor: 1e-9, at: (0.0, 0.0) });
        assert_eq!(t.k, MIN_SCALE);
        let t = vc.apply_gesture(Gesture::Pinch { factor: 1e12, at: (0.0, 0.0) });
        assert_eq!(t.k, MAX_SCALE);

        let kept = vc.apply_transform(Transform { k: f64::NAN, x: 0.0, y: 0.0 });
        assert_eq!(kept.k, MAX_SCALE);
        let kept = vc.apply_transform(Transform { k: -1.0, x: 0.0, y: 0.0 });
        assert_eq!(kept.k, MAX_SCALE);
    }

    #[test]
    fn test_view_rect_follows_transform() {
        let viewport = egui::Rect::from_min_size(Pos2::new(100.0, 50.0), Vec2::new(400.0, 300.0));
        let r = view_rect(viewport, &Transform { k: 0.5, x: 10.0, y: -4.0 }, [200, 100]);
        assert_eq!(r.min, Pos2::new(110.0, 46.0));
        assert_eq!(r.size(), Vec2::new(100.0, 50.0));
    }

    #[test]
    fn test_markers_sit_on_tile_centres() {
        let points = vec![Point::new("a", "A", 0.0, 0.0), Point::new("b", "B", 1.0, 1.0)];
        let mut bounds = BoundsTable::new();
        bounds.insert("a", Tier::Full, Rect::new(10.0, 10.0, 20.0, 20.0));
        bounds.insert("b", Tier::Half, Rect::new(0.0, 0.0, 10.0, 10.0));

        let t = Transform { k: 2.0, x: 5.0, y: 0.0 };
        assert_eq!(overlay_markers(&points, &bounds, Tier::Full, &t), vec![(45.0, 40.0)]);
        assert_eq!(overlay_markers(&points, &bounds, Tier::Half, &t), vec![(15.0, 10.0)]);
    }
}
