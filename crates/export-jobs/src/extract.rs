//! Clipped per-year raster extracts.

use serde::{Deserialize, Serialize};

use landcover_common::{CrsCode, GeoTransform, LandcoverError, LandcoverResult, RasterFrame, Region};

/// Fill code used when the frame has none.
pub const DEFAULT_NODATA: u8 = 255;

/// A frame clipped to a region's bounding window and resampled to the export
/// scale. Pixels whose centre falls outside the region are `nodata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterExtract {
    pub name: String,
    pub frame_id: String,
    pub year: i32,
    pub crs: CrsCode,
    pub scale_meters: f64,
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
    pub nodata: u8,
    pub codes: Vec<u8>,
}

impl RasterExtract {
    /// Number of pixels the extract would hold, or `None` when the region
    /// does not overlap the frame.
    pub fn pixel_count(frame: &RasterFrame, region: &Region, scale_meters: f64) -> LandcoverResult<Option<u64>> {
        let grid = frame.at_scale(scale_meters)?;
        Ok(grid
            .window_for(&region.bounding_box())
            .map(|w| w.pixel_count()))
    }

    pub fn render(
        name: &str,
        frame: &RasterFrame,
        region: &Region,
        scale_meters: f64,
    ) -> LandcoverResult<Self> {
        let grid = frame.at_scale(scale_meters)?;
        let window = grid.window_for(&region.bounding_box()).ok_or_else(|| {
            LandcoverError::submission(format!("region does not overlap frame {}", frame.id))
        })?;
        let nodata = frame.nodata.unwrap_or(DEFAULT_NODATA);

        let mut codes = Vec::with_capacity(window.pixel_count() as usize);
        for row in window.row_off..window.row_off + window.rows {
            for col in window.col_off..window.col_off + window.cols {
                codes.push(grid.code_in_region(region, col, row).unwrap_or(nodata));
            }
        }

        let t = grid.transform;
        let transform = GeoTransform::new(
            t.origin_lon + window.col_off as f64 * t.pixel_width,
            t.origin_lat - window.row_off as f64 * t.pixel_height,
            t.pixel_width,
            t.pixel_height,
        );

        Ok(Self {
            name: name.to_string(),
            frame_id: frame.id.clone(),
            year: frame.year(),
            crs: frame.crs,
            scale_meters,
            transform,
            width: window.cols,
            height: window.rows,
            nodata,
            codes,
        })
    }

    /// Pixels that are not `nodata`.
    pub fn valid_pixels(&self) -> usize {
        self.codes.iter().filter(|c| **c != self.nodata).count()
    }
}
