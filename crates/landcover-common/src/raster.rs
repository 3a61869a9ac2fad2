//! Categorical raster frames and their resampled views.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::bbox::BoundingBox;
use crate::crs::CrsCode;
use crate::error::{LandcoverError, LandcoverResult};
use crate::region::Region;
use crate::time::year_of;

/// North-up affine placement of a grid.
///
/// Row 0 is the northern edge; latitude decreases with row index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// Longitude of the western edge of column 0
    pub origin_lon: f64,
    /// Latitude of the northern edge of row 0
    pub origin_lat: f64,
    /// Pixel width in degrees
    pub pixel_width: f64,
    /// Pixel height in degrees (positive)
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_lon: f64, origin_lat: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_lon,
            origin_lat,
            pixel_width,
            pixel_height,
        }
    }

    /// Centre of pixel (col, row).
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_lon + (col as f64 + 0.5) * self.pixel_width,
            self.origin_lat - (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Outer edges of a `width` × `height` grid.
    pub fn bbox(&self, width: usize, height: usize) -> BoundingBox {
        BoundingBox::new(
            self.origin_lon,
            self.origin_lat - height as f64 * self.pixel_height,
            self.origin_lon + width as f64 * self.pixel_width,
            self.origin_lat,
        )
    }
}

/// One timestamped categorical raster, immutable once built.
#[derive(Clone)]
pub struct RasterFrame {
    pub id: String,
    pub band: String,
    pub acquired: NaiveDate,
    /// Nominal pixel size in meters
    pub scale_meters: f64,
    pub crs: CrsCode,
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
    /// Code marking "no observation"; never counted
    pub nodata: Option<u8>,
    data: Arc<[u8]>,
}

impl RasterFrame {
    /// Build a frame, checking that the pixel buffer matches the dimensions.
    ///
    /// Frames come from the catalog backend, so a malformed frame is reported
    /// as a (non-transient) backend query error.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        band: impl Into<String>,
        acquired: NaiveDate,
        scale_meters: f64,
        crs: CrsCode,
        transform: GeoTransform,
        width: usize,
        height: usize,
        nodata: Option<u8>,
        data: impl Into<Arc<[u8]>>,
    ) -> LandcoverResult<Self> {
        let id = id.into();
        let data = data.into();

        if width == 0 || height == 0 {
            return Err(LandcoverError::query(format!("frame {} has zero dimensions", id)));
        }
        if data.len() != width * height {
            return Err(LandcoverError::query(format!(
                "frame {} has {} pixels, expected {}x{}",
                id,
                data.len(),
                width,
                height
            )));
        }
        if !(scale_meters.is_finite() && scale_meters > 0.0) {
            return Err(LandcoverError::query(format!(
                "frame {} has invalid scale {}",
                id, scale_meters
            )));
        }
        if !(transform.pixel_width > 0.0 && transform.pixel_height > 0.0) {
            return Err(LandcoverError::query(format!(
                "frame {} has non-positive pixel size",
                id
            )));
        }

        Ok(Self {
            id,
            band: band.into(),
            acquired,
            scale_meters,
            crs,
            transform,
            width,
            height,
            nodata,
            data,
        })
    }

    /// Calendar year of acquisition.
    pub fn year(&self) -> i32 {
        year_of(&self.acquired)
    }

    pub fn get(&self, col: usize, row: usize) -> Option<u8> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.data.get(row * self.width + col).copied()
    }

    /// Row-major class codes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn bbox(&self) -> BoundingBox {
        self.transform.bbox(self.width, self.height)
    }

    /// View this frame at another pixel scale.
    pub fn at_scale(&self, scale_meters: f64) -> LandcoverResult<ScaledGrid<'_>> {
        ScaledGrid::new(self, scale_meters)
    }
}

impl fmt::Debug for RasterFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterFrame")
            .field("id", &self.id)
            .field("band", &self.band)
            .field("acquired", &self.acquired)
            .field("scale_meters", &self.scale_meters)
            .field("crs", &self.crs)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// A rectangular block of pixels in a [`ScaledGrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub cols: usize,
    pub rows: usize,
}

impl PixelWindow {
    pub fn new(col_off: usize, row_off: usize, cols: usize, rows: usize) -> Self {
        Self {
            col_off,
            row_off,
            cols,
            rows,
        }
    }

    pub fn pixel_count(&self) -> u64 {
        (self.cols as u64).saturating_mul(self.rows as u64)
    }

    /// Split into tiles of at most `max_pixels` pixels each.
    ///
    /// Tiles are full-width row bands; if a single row is already too wide,
    /// rows are cut into column segments. Tiles never overlap and together
    /// cover the window exactly.
    pub fn split(&self, max_pixels: u64) -> Vec<PixelWindow> {
        let max_pixels = max_pixels.max(1);
        if self.pixel_count() <= max_pixels {
            return vec![*self];
        }

        let mut tiles = Vec::new();
        if self.cols as u64 <= max_pixels {
            let band_rows = (max_pixels / self.cols as u64).max(1) as usize;
            let mut row = 0;
            while row < self.rows {
                let rows = band_rows.min(self.rows - row);
                tiles.push(PixelWindow::new(self.col_off, self.row_off + row, self.cols, rows));
                row += rows;
            }
        } else {
            let seg_cols = max_pixels as usize;
            for row in 0..self.rows {
                let mut col = 0;
                while col < self.cols {
                    let cols = seg_cols.min(self.cols - col);
                    tiles.push(PixelWindow::new(self.col_off + col, self.row_off + row, cols, 1));
                    col += cols;
                }
            }
        }
        tiles
    }
}

/// Largest side of a resampled grid (the TIFF dimension limit).
pub const MAX_GRID_DIMENSION: usize = u32::MAX as usize;

/// A frame resampled (nearest neighbour) onto a grid with another pixel size.
///
/// The grid shares the frame's origin; its pixel size is the native size
/// times `scale / frame.scale_meters`.
#[derive(Debug, Clone, Copy)]
pub struct ScaledGrid<'a> {
    frame: &'a RasterFrame,
    factor: f64,
    pub scale_meters: f64,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
}

impl<'a> ScaledGrid<'a> {
    pub fn new(frame: &'a RasterFrame, scale_meters: f64) -> LandcoverResult<Self> {
        if !(scale_meters.is_finite() && scale_meters > 0.0) {
            return Err(LandcoverError::config(format!(
                "scale must be a positive number of meters, got {}",
                scale_meters
            )));
        }

        let factor = scale_meters / frame.scale_meters;
        let cols = (frame.width as f64 / factor).ceil();
        let rows = (frame.height as f64 / factor).ceil();
        if !(cols <= MAX_GRID_DIMENSION as f64 && rows <= MAX_GRID_DIMENSION as f64) {
            return Err(LandcoverError::config(format!(
                "scale {} m resamples frame {} to {:.0}x{:.0} pixels, above the {} pixel side limit",
                scale_meters, frame.id, cols, rows, MAX_GRID_DIMENSION
            )));
        }
        let width = (cols as usize).max(1);
        let height = (rows as usize).max(1);
        let transform = GeoTransform::new(
            frame.transform.origin_lon,
            frame.transform.origin_lat,
            frame.transform.pixel_width * factor,
            frame.transform.pixel_height * factor,
        );

        Ok(Self {
            frame,
            factor,
            scale_meters,
            width,
            height,
            transform,
        })
    }

    pub fn frame(&self) -> &RasterFrame {
        self.frame
    }

    /// Nearest native pixel for scaled pixel (col, row).
    pub fn sample(&self, col: usize, row: usize) -> Option<u8> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let src_col = (((col as f64 + 0.5) * self.factor) as usize).min(self.frame.width - 1);
        let src_row = (((row as f64 + 0.5) * self.factor) as usize).min(self.frame.height - 1);
        self.frame.get(src_col, src_row)
    }

    /// The class code at (col, row) if its centre lies inside `region` and it
    /// is not nodata.
    pub fn code_in_region(&self, region: &Region, col: usize, row: usize) -> Option<u8> {
        let (lon, lat) = self.transform.pixel_center(col, row);
        if !region.contains(lon, lat) {
            return None;
        }
        let code = self.sample(col, row)?;
        match self.frame.nodata {
            Some(nodata) if nodata == code => None,
            _ => Some(code),
        }
    }

    pub fn full_window(&self) -> PixelWindow {
        PixelWindow::new(0, 0, self.width, self.height)
    }

    /// Smallest window holding every pixel whose centre falls in `bbox`.
    pub fn window_for(&self, bbox: &BoundingBox) -> Option<PixelWindow> {
        let bbox = self.transform.bbox(self.width, self.height).intersection(bbox)?;
        let t = &self.transform;
        let col_min = ((bbox.min_lon - t.origin_lon) / t.pixel_width - 0.5).ceil();
        let col_max = ((bbox.max_lon - t.origin_lon) / t.pixel_width - 0.5).floor();
        let row_min = ((t.origin_lat - bbox.max_lat) / t.pixel_height - 0.5).ceil();
        let row_max = ((t.origin_lat - bbox.min_lat) / t.pixel_height - 0.5).floor();

        let col_min = col_min.max(0.0);
        let row_min = row_min.max(0.0);
        let col_max = col_max.min(self.width as f64 - 1.0);
        let row_max = row_max.min(self.height as f64 - 1.0);

        if col_min > col_max || row_min > row_max {
            return None;
        }

        Some(PixelWindow::new(
            col_min as usize,
            row_min as usize,
            (col_max - col_min) as usize + 1,
            (row_max - row_min) as usize + 1,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: usize, height: usize, data: Vec<u8>) -> RasterFrame {
        RasterFrame::new(
            "f",
            "LC_Type1",
            NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(),
            500.0,
            CrsCode::Epsg4326,
            GeoTransform::new(0.0, height as f64, 1.0, 1.0),
            width,
            height,
            None,
            data,
        )
        .unwrap()
    }

    #[test]
    fn test_frame_rejects_bad_buffer() {
        let result = RasterFrame::new(
            "bad",
            "LC_Type1",
            NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(),
            500.0,
            CrsCode::Epsg4326,
            GeoTransform::new(0.0, 2.0, 1.0, 1.0),
            2,
            2,
            None,
            vec![1u8, 2, 3],
        );
        assert!(matches!(result, Err(LandcoverError::BackendQuery { .. })));
    }

    #[test]
    fn test_year_and_bbox() {
        let f = frame(4, 2, vec![0; 8]);
        assert_eq!(f.year(), 2001);
        assert_eq!(f.bbox().as_tuple(), (0.0, 0.0, 4.0, 2.0));
        assert_eq!(f.transform.pixel_center(0, 0), (0.5, 1.5));
    }

    #[test]
    fn test_coarser_scale_samples_nearest() {
        // 4x4 with distinct values, sampled at twice the pixel size.
        let f = frame(4, 4, (0..16).collect());
        let grid = f.at_scale(1000.0).unwrap();
        assert_eq!((grid.width, grid.height), (2, 2));
        assert_eq!(grid.sample(0, 0), Some(5));
        assert_eq!(grid.sample(1, 1), Some(15));
        assert_eq!(grid.sample(2, 0), None);
    }

    #[test]
    fn test_native_scale_is_identity() {
        let f = frame(3, 2, vec![1, 2, 3, 4, 5, 6]);
        let grid = f.at_scale(500.0).unwrap();
        assert_eq!((grid.width, grid.height), (3, 2));
        for row in 0..2 {
            for col in 0..3 {
                assert_eq!(grid.sample(col, row), f.get(col, row));
            }
        }
    }

    #[test]
    fn test_invalid_scale() {
        let f = frame(2, 2, vec![0; 4]);
        assert!(f.at_scale(0.0).is_err());
        assert!(f.at_scale(f64::NAN).is_err());
    }

    #[test]
    fn test_tiny_scale_exceeds_grid_limit() {
        let f = frame(4, 4, vec![0; 16]);
        let err = f.at_scale(1e-7).unwrap_err();
        assert!(matches!(err, LandcoverError::Config(_)));
        assert!(f.at_scale(0.01).is_ok());
    }

    #[test]
    fn test_pixel_count_saturates() {
        let window = PixelWindow::new(0, 0, usize::MAX, usize::MAX);
        assert_eq!(window.pixel_count(), u64::MAX);
    }

    #[test]
    fn test_window_for_bbox() {
        let f = frame(10, 10, vec![0; 100]);
        let grid = f.at_scale(500.0).unwrap();
        // Centres at 2.5..=4.5 in lon, rows whose centre lat in [5, 7].
        let window = grid.window_for(&BoundingBox::new(2.2, 5.0, 4.9, 7.0)).unwrap();
        assert_eq!(window, PixelWindow::new(2, 3, 3, 2));
        assert!(grid
            .window_for(&BoundingBox::new(20.0, 20.0, 30.0, 30.0))
            .is_none());
    }

    #[test]
    fn test_window_split_covers_exactly() {
        let window = PixelWindow::new(1, 2, 7, 5);
        let tiles = window.split(10);
        assert!(tiles.iter().all(|t| t.pixel_count() <= 10));
        assert_eq!(tiles.iter().map(|t| t.pixel_count()).sum::<u64>(), 35);

        let narrow = window.split(3);
        assert!(narrow.iter().all(|t| t.pixel_count() <= 3 && t.rows == 1));
        assert_eq!(narrow.iter().map(|t| t.pixel_count()).sum::<u64>(), 35);
    }
}
