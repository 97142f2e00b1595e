//! Coordinate scaling from projection space into bitmap pixel space, and the
//! per-point tile rectangles derived from it.

use std::collections::HashMap;

use crate::data::point::{Point, Rect, Tier};

/// Pixel dimensions of one bitmap tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapSize {
    pub width: u32,
    pub height: u32,
}

impl BitmapSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Square overview for `Full`, half-width column for `Half`
    pub fn for_tier(tier: Tier, layout: &TileLayout) -> Self {
        let max = layout.max_bitmap_size;
        match tier {
            Tier::Full => Self::new(max, max),
            Tier::Half => Self::new((max / 2).max(1), max),
        }
    }
}

/// Sizing constants shared by both tiers
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayout {
    pub max_bitmap_size: u32,
    pub padding: f64,
    pub thumbnail_size: f64,
    pub shrink_threshold: usize,
}

impl Default for TileLayout {
    fn default() -> Self {
        Self {
            max_bitmap_size: 4096,
            padding: 40.0,
            thumbnail_size: 64.0,
            shrink_threshold: 4000,
        }
    }
}

impl TileLayout {
    /// Tile edge for a bitmap of `target` holding `count` points
    pub fn tile_size(&self, target: BitmapSize, count: usize) -> f64 {
        let extent = target.width.min(target.height) as f64 / self.max_bitmap_size.max(1) as f64;
        let shrink = if count > self.shrink_threshold {
            (self.shrink_threshold as f64 / count as f64).sqrt()
        } else {
            1.0
        };
        (self.thumbnail_size * extent * shrink).max(1.0)
    }
}

/// Affine map from a data interval onto a pixel interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    pub domain: (f64, f64),
    pub range: (f64, f64),
}

impl LinearScale {
    pub fn apply(&self, v: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        if d1 == d0 {
            // every point shares this coordinate
            return (r0 + r1) / 2.0;
        }
        r0 + (v - d0) / (d1 - d0) * (r1 - r0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scales {
    pub x: LinearScale,
    pub y: LinearScale,
    pub tile_size: f64,
}

fn extent(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo.is_finite() {
        (lo, hi)
    } else {
        (0.0, 0.0)
    }
}

/// Map the per-axis min/max of `points` onto `[padding, size - padding]`.
pub fn create_scales(
    points: &[Point],
    padding: f64,
    target: BitmapSize,
    layout: &TileLayout,
) -> Scales {
    let pixel_range = |size: u32| {
        let size = size as f64;
        let lo = padding.min(size / 2.0);
        (lo, (size - padding).max(lo))
    };

    Scales {
        x: LinearScale {
            domain: extent(points.iter().map(|p| p.x)),
            range: pixel_range(target.width),
        },
        y: LinearScale {
            domain: extent(points.iter().map(|p| p.y)),
            range: pixel_range(target.height),
        },
        tile_size: layout.tile_size(target, points.len()),
    }
}

/// Tile rectangles keyed by tier, then by point identity
#[derive(Debug, Clone, Default)]
pub struct BoundsTable {
    tiers: HashMap<Tier, HashMap<String, Rect>>,
}

impl BoundsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, filename: &str, tier: Tier) -> Option<&Rect> {
        self.tiers.get(&tier).and_then(|rects| rects.get(filename))
    }

    pub fn insert(&mut self, filename: &str, tier: Tier, rect: Rect) {
        self.tiers
            .entry(tier)
            .or_default()
            .insert(filename.to_string(), rect);
    }

    pub fn clear_tier(&mut self, tier: Tier) {
        self.tiers.remove(&tier);
    }

    pub fn count(&self, tier: Tier) -> usize {
        self.tiers.get(&tier).map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.values().all(HashMap::is_empty)
    }
}

/// Whole-pixel edge a tile of `tile_size` is drawn at
pub fn pixel_edge(tile_size: f64) -> f64 {
    tile_size.round().max(1.0)
}

/// Square tile centred on each point's scaled position, snapped to whole
/// pixels so it is exactly the area the bitmap draws. Replaces every
/// rectangle previously stored for `tier`.
pub fn compute_bounds(
    points: &[Point],
    scales: &Scales,
    tile_size: f64,
    tier: Tier,
    table: &mut BoundsTable,
) {
    table.clear_tier(tier);
    let edge = pixel_edge(tile_size);
    let half = edge / 2.0;
    for p in points {
        let x = (scales.x.apply(p.x) - half).round();
        let y = (scales.y.apply(p.y) - half).round();
        table.insert(&p.filename, tier, Rect::new(x, y, edge, edge));
    }
}
