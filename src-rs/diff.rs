//! Pixel-level comparison of a design raster against a live screenshot.
//!
//! Both images are laid onto a transparent union canvas anchored at the
//! origin, so a smaller image compares its missing area as transparency.
//! Pixels are compared in YIQ space after blending alpha over white; a pixel
//! is mismatched when its perceptual delta exceeds `threshold² × MAX_YIQ_DELTA`.
//! Anti-aliased edges are counted like any other change.

use image::{Rgba, RgbaImage};
use serde::Serialize;
use tracing::debug;

use crate::cluster::cluster_regions;
use crate::model::BoundingBox;

/// Colour painted into the diff raster for every mismatched pixel.
pub const HIGHLIGHT: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Largest possible YIQ delta between two pixels.
const MAX_YIQ_DELTA: f64 = 35215.0;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Which pixels of the union canvas differ. Handed from the differ to the
/// clusterer so the two stages never re-derive mismatches from colours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MismatchMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl MismatchMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    /// Recover a mask from a previously rendered diff raster. A pixel counts
    /// when it follows the [`HIGHLIGHT`] convention: dominant red, suppressed
    /// green and blue, non-zero alpha.
    pub fn from_highlight(raster: &RgbaImage) -> Self {
        let (width, height) = raster.dimensions();
        let mut mask = Self::new(width, height);
        for (x, y, px) in raster.enumerate_pixels() {
            let [r, g, b, a] = px.0;
            if r > 200 && g < 50 && b < 50 && a > 0 {
                mask.set(x, y);
            }
        }
        mask
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn set(&mut self, x: u32, y: u32) {
        let idx = self.index(x, y);
        self.bits[idx] = true;
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[self.index(x, y)]
    }

    pub fn count(&self) -> u64 {
        self.bits.iter().filter(|b| **b).count() as u64
    }

    /// Coordinates of every mismatched pixel in row-major order.
    pub fn iter_set(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let width = self.width.max(1);
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, b)| **b)
            .map(move |(idx, _)| ((idx as u32) % width, (idx as u32) / width))
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

#[derive(Debug, Clone)]
pub struct PixelDiff {
    pub mismatch_count: u64,
    pub diff_raster: RgbaImage,
    pub mask: MismatchMask,
}

/// Differ output plus the clustered regions.
#[derive(Debug, Clone, Serialize)]
pub struct DiffResult {
    pub mismatch_count: u64,
    #[serde(skip)]
    pub diff_raster: RgbaImage,
    pub regions: Vec<BoundingBox>,
    pub width: u32,
    pub height: u32,
}

/// Compare two rasters over their union canvas.
pub fn diff_images(design: &RgbaImage, live: &RgbaImage, threshold: f64) -> PixelDiff {
    let width = design.width().max(live.width());
    let height = design.height().max(live.height());
    let threshold = if threshold.is_nan() {
        0.0
    } else {
        threshold.clamp(0.0, 1.0)
    };
    let max_delta = MAX_YIQ_DELTA * threshold * threshold;

    let mut diff_raster = RgbaImage::new(width, height);
    let mut mask = MismatchMask::new(width, height);
    let mut mismatch_count: u64 = 0;

    for y in 0..height {
        for x in 0..width {
            let a = pixel_or_transparent(design, x, y);
            let b = pixel_or_transparent(live, x, y);
            if a == b {
                continue;
            }
            if color_delta(a, b) > max_delta {
                diff_raster.put_pixel(x, y, HIGHLIGHT);
                mask.set(x, y);
                mismatch_count += 1;
            }
        }
    }

    debug!(width, height, mismatch_count, threshold, "pixel diff complete");

    PixelDiff {
        mismatch_count,
        diff_raster,
        mask,
    }
}

/// Diff then cluster.
pub fn compare_images(
    design: &RgbaImage,
    live: &RgbaImage,
    threshold: f64,
    region_size: u32,
) -> DiffResult {
    let diff = diff_images(design, live, threshold);
    let regions = cluster_regions(&diff.mask, region_size);
    let (width, height) = diff.diff_raster.dimensions();
    DiffResult {
        mismatch_count: diff.mismatch_count,
        diff_raster: diff.diff_raster,
        regions,
        width,
        height,
    }
}

fn pixel_or_transparent(img: &RgbaImage, x: u32, y: u32) -> Rgba<u8> {
    if x < img.width() && y < img.height() {
        *img.get_pixel(x, y)
    } else {
        TRANSPARENT
    }
}

fn blend_over_white(channel: u8, alpha: f64) -> f64 {
    255.0 + (f64::from(channel) - 255.0) * alpha
}

fn to_yiq(px: Rgba<u8>) -> (f64, f64, f64) {
    let [r, g, b, a] = px.0;
    let alpha = f64::from(a) / 255.0;
    let (r, g, b) = if a < 255 {
        (
            blend_over_white(r, alpha),
            blend_over_white(g, alpha),
            blend_over_white(b, alpha),
        )
    } else {
        (f64::from(r), f64::from(g), f64::from(b))
    };
    let y = r * 0.298_895_31 + g * 0.586_622_47 + b * 0.114_482_23;
    let i = r * 0.595_977_99 - g * 0.274_176_10 - b * 0.321_801_89;
    let q = r * 0.211_470_17 - g * 0.522_617_11 + b * 0.311_146_94;
    (y, i, q)
}

fn color_delta(a: Rgba<u8>, b: Rgba<u8>) -> f64 {
    let (y1, i1, q1) = to_yiq(a);
    let (y2, i2, q2) = to_yiq(b);
    let dy = y1 - y2;
    let di = i1 - i2;
    let dq = q1 - q2;
    0.5053 * dy * dy + 0.299 * di * di + 0.1957 * dq * dq
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    #[test]
    fn identical_images_have_no_mismatch() {
        let mut img = solid(40, 30, [20, 120, 200, 255]);
        img.put_pixel(5, 5, Rgba([0, 0, 0, 255]));
        for threshold in [0.0, 0.1, 0.5, 1.0] {
            let diff = diff_images(&img, &img, threshold);
            assert_eq!(diff.mismatch_count, 0);
            assert!(diff.diff_raster.pixels().all(|p| p.0[3] == 0));
        }
    }

    #[test]
    fn union_canvas_uses_max_dimensions() {
        let small = solid(10, 30, [0, 0, 0, 255]);
        let wide = solid(25, 8, [0, 0, 0, 255]);
        let diff = diff_images(&small, &wide, 0.1);
        assert_eq!(diff.diff_raster.dimensions(), (25, 30));
        assert_eq!(diff.mask.dimensions(), (25, 30));

        let reversed = diff_images(&wide, &small, 0.1);
        assert_eq!(reversed.diff_raster.dimensions(), (25, 30));
        assert_eq!(reversed.mismatch_count, diff.mismatch_count);
    }

    #[test]
    fn missing_area_counts_against_transparency() {
        let design = solid(4, 4, [0, 0, 0, 255]);
        let live = solid(2, 4, [0, 0, 0, 255]);
        let diff = diff_images(&design, &live, 0.1);
        // Columns 2..4 of the live canvas are transparent, i.e. white after blending.
        assert_eq!(diff.mismatch_count, 8);
        assert_eq!(diff.mask.count(), diff.mismatch_count);
        assert!(diff.mask.is_set(3, 0));
        assert!(!diff.mask.is_set(1, 0));
        assert_eq!(*diff.diff_raster.get_pixel(2, 2), HIGHLIGHT);
    }

    #[test]
    fn threshold_filters_small_shifts() {
        let a = solid(2, 2, [100, 100, 100, 255]);
        let b = solid(2, 2, [104, 104, 104, 255]);
        assert_eq!(diff_images(&a, &b, 0.1).mismatch_count, 0);
        assert_eq!(diff_images(&a, &b, 0.0).mismatch_count, 4);
    }

    #[test]
    fn full_threshold_tolerates_everything() {
        let black = solid(3, 3, [0, 0, 0, 255]);
        let white = solid(3, 3, [255, 255, 255, 255]);
        assert_eq!(diff_images(&black, &white, 1.0).mismatch_count, 0);
        assert_eq!(diff_images(&black, &white, 0.1).mismatch_count, 9);
    }

    #[test]
    fn highlight_mask_matches_differ_mask() {
        let a = solid(60, 60, [255, 255, 255, 255]);
        let mut b = a.clone();
        b.put_pixel(7, 9, Rgba([0, 0, 0, 255]));
        b.put_pixel(55, 3, Rgba([0, 0, 255, 255]));
        let diff = diff_images(&a, &b, 0.1);
        assert_eq!(MismatchMask::from_highlight(&diff.diff_raster), diff.mask);
        assert_eq!(diff.mask.iter_set().collect::<Vec<_>>(), vec![(55, 3), (7, 9)]);
    }

    #[test]
    fn compare_images_clusters_regions() {
        let a = solid(100, 100, [255, 255, 255, 255]);
        let mut b = a.clone();
        b.put_pixel(95, 95, Rgba([0, 0, 0, 255]));
        let result = compare_images(&a, &b, 0.1, 50);
        assert_eq!(result.mismatch_count, 1);
        assert_eq!(
            result.regions,
            vec![BoundingBox {
                x: 50,
                y: 50,
                width: 50,
                height: 50
            }]
        );
    }
}
