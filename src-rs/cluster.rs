//! Coarse grid clustering of mismatched pixels.
//!
//! The canvas is cut into `region_size` square cells anchored at the origin;
//! every cell holding at least one mismatch becomes one region, clipped at
//! the canvas edge. Nearby defects merge and edges over-report, which is fine
//! for pointing a reviewer at the right area.

use std::collections::BTreeSet;

use image::RgbaImage;

use crate::diff::MismatchMask;
use crate::model::BoundingBox;

/// One region per flagged cell, ordered by `(x, y)`.
pub fn cluster_regions(mask: &MismatchMask, region_size: u32) -> Vec<BoundingBox> {
    let size = region_size.max(1);
    let (width, height) = mask.dimensions();

    let mut cells: BTreeSet<(u32, u32)> = BTreeSet::new();
    for (x, y) in mask.iter_set() {
        cells.insert(((x / size) * size, (y / size) * size));
    }

    cells
        .into_iter()
        .map(|(bx, by)| BoundingBox {
            x: bx,
            y: by,
            width: size.min(width - bx),
            height: size.min(height - by),
        })
        .collect()
}

/// Cluster a rendered diff raster by re-reading its highlight colour.
/// Only valid for rasters painted with [`crate::diff::HIGHLIGHT`].
pub fn cluster_raster(diff_raster: &RgbaImage, region_size: u32) -> Vec<BoundingBox> {
    cluster_regions(&MismatchMask::from_highlight(diff_raster), region_size)
}
