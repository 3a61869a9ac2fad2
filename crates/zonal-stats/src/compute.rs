//! Compute backend contract and the local CPU implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rayon::prelude::*;
use tracing::{debug, instrument};

use landcover_common::{
    CodeRange, LandcoverError, LandcoverResult, PixelWindow, RasterFrame, Region, ScaledGrid,
};

/// Rows per rayon work unit. Small windows are scanned on one thread.
const ROWS_PER_TASK: usize = 64;

/// Reduction applied to the pixels of a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reducer {
    /// Pixel count per class code.
    FrequencyHistogram,
    /// Number of pixels whose code falls in any of the ranges.
    Sum(Vec<CodeRange>),
}

impl Reducer {
    pub fn name(&self) -> &'static str {
        match self {
            Reducer::FrequencyHistogram => "frequency_histogram",
            Reducer::Sum(_) => "sum",
        }
    }
}

/// One reduce-region call.
#[derive(Debug, Clone)]
pub struct ReduceRequest {
    pub frame: RasterFrame,
    pub region: Arc<Region>,
    pub reducer: Reducer,
    pub scale_meters: f64,
    pub max_pixels: u64,
    /// Restrict the scan to this window of the scaled grid; `None` scans the
    /// region's bounding window.
    pub window: Option<PixelWindow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReduceOutput {
    Histogram(BTreeMap<u8, u64>),
    Count(u64),
}

/// Backend contract for evaluating reductions over a region.
///
/// Implementations must be deterministic and must reject requests whose
/// window holds more than `max_pixels` pixels with `ComputeLimitExceeded`.
#[async_trait]
pub trait ComputeBackend: Send + Sync {
    async fn reduce_region(&self, request: ReduceRequest) -> LandcoverResult<ReduceOutput>;
}

/// The window of `grid` a request covers, `None` when the region misses the
/// frame entirely.
pub fn request_window(grid: &ScaledGrid<'_>, request: &ReduceRequest) -> Option<PixelWindow> {
    let bounding = grid.window_for(&request.region.bounding_box())?;
    match request.window {
        None => Some(bounding),
        Some(w) => {
            let col_end = (w.col_off + w.cols).min(grid.width);
            let row_end = (w.row_off + w.rows).min(grid.height);
            (w.col_off < col_end && w.row_off < row_end).then(|| {
                PixelWindow::new(w.col_off, w.row_off, col_end - w.col_off, row_end - w.row_off)
            })
        }
    }
}

/// Evaluates reductions in-process, scanning rows in parallel with rayon.
#[derive(Debug, Clone, Default)]
pub struct LocalComputeBackend;

impl LocalComputeBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ComputeBackend for LocalComputeBackend {
    #[instrument(skip_all, fields(frame = %request.frame.id, reducer = request.reducer.name()))]
    async fn reduce_region(&self, request: ReduceRequest) -> LandcoverResult<ReduceOutput> {
        let grid = request.frame.at_scale(request.scale_meters)?;
        let Some(window) = request_window(&grid, &request) else {
            debug!("Region does not overlap frame");
            return Ok(empty_output(&request.reducer));
        };

        if window.pixel_count() > request.max_pixels {
            return Err(LandcoverError::ComputeLimitExceeded {
                pixels: window.pixel_count(),
                max_pixels: request.max_pixels,
            });
        }

        let pixels = window.pixel_count();
        let output = tokio::task::spawn_blocking(move || scan(&request, window))
            .await
            .map_err(|e| LandcoverError::query(format!("compute task failed: {}", e)))??;

        debug!(pixels, "Reduction complete");
        Ok(output)
    }
}

fn empty_output(reducer: &Reducer) -> ReduceOutput {
    match reducer {
        Reducer::FrequencyHistogram => ReduceOutput::Histogram(BTreeMap::new()),
        Reducer::Sum(_) => ReduceOutput::Count(0),
    }
}

/// Count codes of every in-region pixel of `window`.
fn scan(request: &ReduceRequest, window: PixelWindow) -> LandcoverResult<ReduceOutput> {
    let grid = request.frame.at_scale(request.scale_meters)?;
    let region = request.region.as_ref();
    let row_end = window.row_off + window.rows;
    let col_end = window.col_off + window.cols;

    let counts = (window.row_off..row_end)
        .collect::<Vec<_>>()
        .par_chunks(ROWS_PER_TASK)
        .map(|rows| {
            let mut local = [0u64; 256];
            for &row in rows {
                for col in window.col_off..col_end {
                    if let Some(code) = grid.code_in_region(region, col, row) {
                        local[code as usize] += 1;
                    }
                }
            }
            local
        })
        .reduce(
            || [0u64; 256],
            |mut acc, part| {
                for (a, p) in acc.iter_mut().zip(part.iter()) {
                    *a += p;
                }
                acc
            },
        );

    Ok(match &request.reducer {
        Reducer::FrequencyHistogram => ReduceOutput::Histogram(
            counts
                .iter()
                .enumerate()
                .filter(|(_, n)| **n > 0)
                .map(|(code, n)| (code as u8, *n))
                .collect(),
        ),
        Reducer::Sum(mask) => ReduceOutput::Count(
            counts
                .iter()
                .enumerate()
                .filter(|(code, _)| mask.iter().any(|r| r.contains(*code as u8)))
                .map(|(_, n)| *n)
                .sum(),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{covering_region, create_class_grid, forest_scenario_frame, frame_for_year};

    fn request(frame: RasterFrame, reducer: Reducer) -> ReduceRequest {
        let region = Arc::new(covering_region(frame.width, frame.height));
        ReduceRequest {
            frame,
            region,
            reducer,
            scale_meters: 500.0,
            max_pixels: 1_000_000,
            window: None,
        }
    }

    #[tokio::test]
    async fn test_frequency_histogram() {
        let backend = LocalComputeBackend::new();
        let out = backend
            .reduce_region(request(forest_scenario_frame(2001), Reducer::FrequencyHistogram))
            .await
            .unwrap();
        let expected: BTreeMap<u8, u64> = [(2, 6), (7, 3), (10, 4), (12, 3)].into_iter().collect();
        assert_eq!(out, ReduceOutput::Histogram(expected));
    }

    #[tokio::test]
    async fn test_sum_with_mask() {
        let backend = LocalComputeBackend::new();
        let mask = vec![CodeRange::new(1, 5).unwrap(), CodeRange::single(12)];
        let out = backend
            .reduce_region(request(forest_scenario_frame(2001), Reducer::Sum(mask)))
            .await
            .unwrap();
        assert_eq!(out, ReduceOutput::Count(9));
    }

    #[tokio::test]
    async fn test_pixel_ceiling() {
        let backend = LocalComputeBackend::new();
        let mut req = request(
            frame_for_year(2001, 10, 10, create_class_grid(10, 10, 5)),
            Reducer::FrequencyHistogram,
        );
        req.max_pixels = 50;
        let err = backend.reduce_region(req).await.unwrap_err();
        assert!(matches!(
            err,
            LandcoverError::ComputeLimitExceeded {
                pixels: 100,
                max_pixels: 50
            }
        ));
    }

    #[tokio::test]
    async fn test_explicit_window_is_clamped() {
        let backend = LocalComputeBackend::new();
        let mut req = request(forest_scenario_frame(2001), Reducer::FrequencyHistogram);
        // Last two rows, overshooting the grid.
        req.window = Some(PixelWindow::new(0, 2, 10, 10));
        let out = backend.reduce_region(req).await.unwrap();
        let expected: BTreeMap<u8, u64> = [(7, 3), (10, 2), (12, 3)].into_iter().collect();
        assert_eq!(out, ReduceOutput::Histogram(expected));
    }

    #[tokio::test]
    async fn test_disjoint_region_is_empty() {
        let backend = LocalComputeBackend::new();
        let mut req = request(forest_scenario_frame(2001), Reducer::Sum(vec![CodeRange::single(2)]));
        req.region = Arc::new(test_utils::rect_region(50.0, 50.0, 60.0, 60.0));
        assert_eq!(backend.reduce_region(req).await.unwrap(), ReduceOutput::Count(0));
    }
}
