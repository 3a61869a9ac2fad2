//! Common test fixtures for land-cover tests.
//!
//! Regions here are expressed in the coordinate space of the generated
//! frames (see [`crate::generators`]).

use landcover_common::{GroupingScheme, RasterFrame, Region, RegionCatalog};

use crate::generators::frame_for_year;

/// A rectangle region from its corners.
pub fn rect_region(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Region {
    RegionCatalog::validate_tuples(&[
        (min_lon, min_lat),
        (max_lon, min_lat),
        (max_lon, max_lat),
        (min_lon, max_lat),
        (min_lon, min_lat),
    ])
    .expect("valid rectangle")
}

/// A region that contains every pixel centre of a `width` × `height`
/// generated frame.
pub fn covering_region(width: usize, height: usize) -> Region {
    rect_region(-0.25, -0.25, width as f64 + 0.25, height as f64 + 0.25)
}

/// A right triangle over the lower-left half of a generated frame.
///
/// Pixel `(col, row)` is inside when `col < row` in a square frame of size
/// `n` (strictly below the diagonal from the south-west corner).
pub fn lower_triangle_region(n: usize) -> Region {
    let n = n as f64;
    RegionCatalog::validate_tuples(&[(0.0, 0.0), (n, 0.0), (0.0, n), (0.0, 0.0)])
        .expect("valid triangle")
}

/// Self-intersecting "bowtie" ring.
pub const BOWTIE_RING: [(f64, f64); 5] = [(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 2.0), (0.0, 0.0)];

/// Ring whose last vertex does not repeat the first.
pub const OPEN_RING: [(f64, f64); 4] = [(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)];

/// Forest 1-5, Savanna 6-9, Agriculture 12 and 14.
pub fn canonical_groups() -> GroupingScheme {
    GroupingScheme::canonical()
}

/// 4×4 frame at 500 m with six class-2 (forest) pixels.
///
/// ```text
///  2  2  2 10
///  2  2  2 10
///  7  7  7 10
/// 12 12 12 10
/// ```
///
/// Under the canonical groups and a covering region: Forest 1.5 km²,
/// Savanna 0.75 km², Agriculture 0.75 km², total 4.0 km².
pub fn forest_scenario_frame(year: i32) -> RasterFrame {
    #[rustfmt::skip]
    let codes = vec![
        2, 2, 2, 10,
        2, 2, 2, 10,
        7, 7, 7, 10,
        12, 12, 12, 10,
    ];
    frame_for_year(year, 4, 4, codes)
}
