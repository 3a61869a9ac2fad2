//! Test data generators for synthetic categorical rasters.
//!
//! Frames built here use one-degree pixels with the origin at
//! `(0, height)`, so pixel `(col, row)` is centred on
//! `(col + 0.5, height - row - 0.5)`. The nominal scale is 500 m.

use chrono::NaiveDate;
use landcover_common::{CrsCode, GeoTransform, RasterFrame};

/// Band name used by every generated frame.
pub const TEST_BAND: &str = "LC_Type1";

/// Nominal pixel size of generated frames.
pub const TEST_SCALE_METERS: f64 = 500.0;

/// `n` copies of `code`.
pub fn uniform_codes(n: usize, code: u8) -> Vec<u8> {
    vec![code; n]
}

/// Creates a grid with predictable class codes.
///
/// Each cell is `(col + row * width) % modulo`, so every code below
/// `modulo` appears and the layout is easy to reason about.
///
/// # Example
///
/// ```
/// use test_utils::create_class_grid;
///
/// let grid = create_class_grid(4, 2, 5);
/// assert_eq!(grid, vec![0, 1, 2, 3, 4, 0, 1, 2]);
/// ```
pub fn create_class_grid(width: usize, height: usize, modulo: u8) -> Vec<u8> {
    let modulo = modulo.max(1) as usize;
    (0..width * height).map(|i| (i % modulo) as u8).collect()
}

/// Horizontal stripes: row `r` holds `codes[r % codes.len()]`.
pub fn create_striped_grid(width: usize, height: usize, codes: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        let code = if codes.is_empty() { 0 } else { codes[row % codes.len()] };
        data.extend(std::iter::repeat(code).take(width));
    }
    data
}

/// A large grid mixing forest, savanna, agriculture and unmapped codes.
///
/// Used for tiling tests where the exact layout does not matter but the
/// counts must be reproducible.
pub fn create_mixed_landcover_grid(width: usize, height: usize) -> Vec<u8> {
    const PALETTE: [u8; 8] = [1, 2, 6, 8, 10, 12, 14, 16];
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push(PALETTE[(col * 7 + row * 3 + col / 5) % PALETTE.len()]);
        }
    }
    data
}

/// Frame acquired on January 1st of `year`.
pub fn frame_for_year(year: i32, width: usize, height: usize, codes: Vec<u8>) -> RasterFrame {
    let acquired = NaiveDate::from_ymd_opt(year, 1, 1).expect("valid test year");
    frame_at(&format!("MCD12Q1_{}", year), acquired, width, height, codes)
}

/// Frame with an explicit id and acquisition date.
pub fn frame_at(
    id: &str,
    acquired: NaiveDate,
    width: usize,
    height: usize,
    codes: Vec<u8>,
) -> RasterFrame {
    frame_with_nodata(id, acquired, width, height, codes, None)
}

/// Frame with a nodata code.
pub fn frame_with_nodata(
    id: &str,
    acquired: NaiveDate,
    width: usize,
    height: usize,
    codes: Vec<u8>,
    nodata: Option<u8>,
) -> RasterFrame {
    RasterFrame::new(
        id,
        TEST_BAND,
        acquired,
        TEST_SCALE_METERS,
        CrsCode::Epsg4326,
        GeoTransform::new(0.0, height as f64, 1.0, 1.0),
        width,
        height,
        nodata,
        codes,
    )
    .expect("valid test frame")
}

/// One frame per year in `years`, all filled with `code`.
pub fn frames_for_years(
    years: impl IntoIterator<Item = i32>,
    width: usize,
    height: usize,
    code: u8,
) -> Vec<RasterFrame> {
    years
        .into_iter()
        .map(|y| frame_for_year(y, width, height, uniform_codes(width * height, code)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_grid_layout() {
        let grid = create_class_grid(3, 3, 4);
        assert_eq!(grid, vec![0, 1, 2, 3, 0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_striped_grid() {
        let grid = create_striped_grid(2, 3, &[1, 9]);
        assert_eq!(grid, vec![1, 1, 9, 9, 1, 1]);
    }

    #[test]
    fn test_mixed_grid_is_deterministic() {
        assert_eq!(
            create_mixed_landcover_grid(30, 20),
            create_mixed_landcover_grid(30, 20)
        );
        assert_eq!(create_mixed_landcover_grid(30, 20).len(), 600);
    }

    #[test]
    fn test_frame_for_year_geometry() {
        let frame = frame_for_year(2007, 4, 3, uniform_codes(12, 5));
        assert_eq!(frame.year(), 2007);
        assert_eq!(frame.bbox().as_tuple(), (0.0, 0.0, 4.0, 3.0));
        assert_eq!(frame.transform.pixel_center(0, 0), (0.5, 2.5));
    }
}
