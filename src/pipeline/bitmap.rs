//! Off-screen mosaics: every point's thumbnail drawn into its tile
//!
//! One snapshot is built per tier. Each build recomputes scales and bounds
//! for its own target size so the drawn tiles and the hit-test rectangles
//! always agree.

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::data::point::{Point, Tier};
use super::geometry::{compute_bounds, create_scales, pixel_edge, BitmapSize, BoundsTable, TileLayout};

const BACKGROUND: Rgba<u8> = Rgba([0x14, 0x14, 0x18, 0xFF]);

/// Immutable raster snapshot of one tier
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub tier: Tier,
    pub image: Arc<RgbaImage>,
    /// Tile edge the thumbnails were drawn at
    pub tile_size: f64,
    /// Points actually drawn (those with a thumbnail)
    pub drawn: usize,
}

impl Bitmap {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Both tiers of one load
#[derive(Debug, Clone)]
pub struct BitmapPair {
    pub full: Bitmap,
    pub half: Bitmap,
}

impl BitmapPair {
    pub fn get(&self, tier: Tier) -> &Bitmap {
        match tier {
            Tier::Full => &self.full,
            Tier::Half => &self.half,
        }
    }
}

/// Rasterize `points` into a fresh bitmap of `target`, writing their tile
/// rectangles for `tier` into `bounds`.
pub fn build_bitmap(
    points: &[Point],
    target: BitmapSize,
    tier: Tier,
    layout: &TileLayout,
    bounds: &mut BoundsTable,
) -> Bitmap {
    let mut canvas = RgbaImage::from_pixel(target.width, target.height, BACKGROUND);
    let scales = create_scales(points, layout.padding, target, layout);
    compute_bounds(points, &scales, scales.tile_size, tier, bounds);

    let edge = pixel_edge(scales.tile_size) as u32;
    let mut drawn = 0;
    for p in points {
        let (Some(thumb), Some(rect)) = (&p.thumbnail, bounds.get(&p.filename, tier)) else {
            log::debug!("No thumbnail for {}, tile skipped", p.filename);
            continue;
        };
        let tile = if thumb.dimensions() == (edge, edge) {
            thumb.as_ref().clone()
        } else {
            imageops::resize(thumb.as_ref(), edge, edge, FilterType::Triangle)
        };
        imageops::overlay(&mut canvas, &tile, rect.x as i64, rect.y as i64);
        drawn += 1;
    }

    log::info!(
        "Built {} bitmap {}×{} ({} of {} tiles, {} px)",
        tier,
        target.width,
        target.height,
        drawn,
        points.len(),
        edge
    );

    Bitmap {
        tier,
        image: Arc::new(canvas),
        tile_size: edge as f64,
        drawn,
    }
}

/// Build the full and half tiers; order does not matter for correctness.
pub fn build_bitmaps(points: &[Point], layout: &TileLayout, bounds: &mut BoundsTable) -> BitmapPair {
    let full = build_bitmap(
        points,
        BitmapSize::for_tier(Tier::Full, layout),
        Tier::Full,
        layout,
        bounds,
    );
    let half = build_bitmap(
        points,
        BitmapSize::for_tier(Tier::Half, layout),
        Tier::Half,
        layout,
        bounds,
    );
    BitmapPair { full, half }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_layout() -> TileLayout {
        TileLayout {
            max_bitmap_size: 200,
            padding: 20.0,
            thumbnail_size: 10.0,
            shrink_threshold: 4000,
        }
    }

    fn red_thumb() -> Option<crate::data::point::ImageHandle> {
        Some(Arc::new(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]))))
    }

    #[test]
    fn test_tiles_are_drawn_where_bounds_say() {
        let mut a = Point::new("a", "A", 0.0, 0.0);
        a.thumbnail = red_thumb();
        let mut b = Point::new("b", "B", 1.0, 1.0);
        b.thumbnail = red_thumb();
        let points = vec![a, b];
        let layout = small_layout();
        let mut bounds = BoundsTable::new();

        let bmp = build_bitmap(&points, BitmapSize::new(200, 200), Tier::Full, &layout, &mut bounds);
        assert_eq!(bmp.drawn, 2);
        assert_eq!(bmp.tile_size, 10.0);

        let r = bounds.get("a", Tier::Full).unwrap();
        assert_eq!((r.x, r.y, r.width), (15.0, 15.0, 10.0));
        assert_eq!(*bmp.image.get_pixel(20, 20), Rgba([255, 0, 0, 255]));
        assert_eq!(*bmp.image.get_pixel(100, 100), BACKGROUND);
        assert_eq!(*bmp.image.get_pixel(180, 180), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_missing_thumbnail_is_skipped_not_fatal() {
        let mut a = Point::new("a", "A", 0.0, 0.0);
        a.thumbnail = red_thumb();
        let b = Point::new("b", "B", 1.0, 1.0);
        let mut bounds = BoundsTable::new();

        let bmp = build_bitmap(&[a, b], BitmapSize::new(200, 200), Tier::Full, &small_layout(), &mut bounds);
        assert_eq!(bmp.drawn, 1);
        assert_eq!(*bmp.image.get_pixel(180, 180), BACKGROUND);
    }

    #[test]
    fn test_pair_has_distinct_tiers() {
        let mut a = Point::new("a", "A", 0.0, 0.0);
        a.thumbnail = red_thumb();
        let mut b = Point::new("b", "B", 3.0, 1.0);
        b.thumbnail = red_thumb();
        let mut bounds = BoundsTable::new();

        let pair = build_bitmaps(&[a, b], &small_layout(), &mut bounds);
        assert_eq!((pair.full.width(), pair.full.height()), (200, 200));
        assert_eq!((pair.half.width(), pair.half.height()), (100, 200));
        assert_eq!(pair.half.tile_size, 5.0);
        assert_ne!(bounds.get("b", Tier::Full), bounds.get("b", Tier::Half));
        assert!(!Arc::ptr_eq(&pair.full.image, &pair.half.image));
    }

    #[test]
    fn test_drawn_tile_fills_its_bounds_exactly() {
        // 5000 points shrink the 10 px tile to about 8.94 px
        let layout = small_layout();
        let mut points: Vec<_> = (0..5000)
            .map(|i| Point::new(&i.to_string(), "A", (i % 100) as f64, (i / 100) as f64))
            .collect();
        points[0].thumbnail = red_thumb();
        let mut bounds = BoundsTable::new();

        let bmp = build_bitmap(&points, BitmapSize::new(200, 200), Tier::Full, &layout, &mut bounds);
        assert_eq!(bmp.drawn, 1);
        assert_eq!(bmp.tile_size, 9.0);

        let r = *bounds.get("0", Tier::Full).unwrap();
        assert_eq!(r.width, 9.0);
        let (x0, y0) = (r.x as u32, r.y as u32);
        let (x1, y1) = (x0 + 8, y0 + 8);
        let red = Rgba([255, 0, 0, 255]);
        assert_eq!(*bmp.image.get_pixel(x0, y0), red);
        assert_eq!(*bmp.image.get_pixel(x1, y1), red);
        assert_eq!(*bmp.image.get_pixel(x1 + 1, y1), BACKGROUND);
        assert_eq!(*bmp.image.get_pixel(x0, y1 + 1), BACKGROUND);
    }
}
