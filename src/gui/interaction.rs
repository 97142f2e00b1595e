//! Click → point resolution

use crate::data::point::{Point, Tier};
use crate::pipeline::geometry::BoundsTable;

use super::viewport::Transform;

/// Margin around every tile, in bitmap pixels
pub const HIT_TOLERANCE: f64 = 20.0;

/// Screen-space placement of the canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewportRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }
}

impl From<egui::Rect> for ViewportRect {
    fn from(r: egui::Rect) -> Self {
        Self::new(r.min.x as f64, r.min.y as f64, r.width() as f64, r.height() as f64)
    }
}

/// Map a client-space click into bitmap space
pub fn to_bitmap_space(client_x: f64, client_y: f64, viewport: &ViewportRect, transform: &Transform) -> (f64, f64) {
    transform.invert(client_x - viewport.left, client_y - viewport.top)
}

/// First point, in list order, whose `tier` tile grown by
/// [`HIT_TOLERANCE`] contains the click. Overlapping tiles are not ranked by
/// distance.
pub fn hit_test<'a>(
    points: &'a [Point],
    client_x: f64,
    client_y: f64,
    viewport: &ViewportRect,
    transform: &Transform,
    bounds: &BoundsTable,
    tier: Tier,
) -> Option<&'a Point> {
    let (bx, by) = to_bitmap_space(client_x, client_y, viewport, transform);
    points.iter().find(|p| {
        bounds
            .get(&p.filename, tier)
            .is_some_and(|r| r.contains_with_margin(bx, by, HIT_TOLERANCE))
    })
}
