//! Zonal statistics over a region of interest.

use std::sync::Arc;

use futures::{stream, StreamExt, TryStreamExt};
use metrics::counter;
use tracing::{debug, info, instrument};

use landcover_common::{
    pixel_area_km2, CodeRange, GroupingScheme, LandcoverError, LandcoverResult, PixelWindow,
    RasterFrame, Region,
};

use crate::compute::{ComputeBackend, ReduceOutput, ReduceRequest, Reducer};
use crate::config::ZonalConfig;
use crate::histogram::{AreaResult, Histogram};

/// Upper bound on tiles planned for one reduction.
const MAX_TILES: u64 = 1_000_000;

/// Histogram and grouped areas computed together for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ZonalAnalysis {
    pub histogram: Histogram,
    pub areas: AreaResult,
}

/// Computes class histograms and grouped areas by delegating reductions to
/// a [`ComputeBackend`].
///
/// The engine holds no per-call state: results depend only on the frame,
/// region, scale and groups passed in.
#[derive(Clone)]
pub struct ZonalStatsEngine {
    backend: Arc<dyn ComputeBackend>,
    config: ZonalConfig,
}

impl ZonalStatsEngine {
    pub fn new(backend: Arc<dyn ComputeBackend>, config: ZonalConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &ZonalConfig {
        &self.config
    }

    /// Pixel count per class code inside `region`, resampled to `scale_meters`.
    #[instrument(skip(self, frame, region), fields(frame = %frame.id))]
    pub async fn histogram(
        &self,
        frame: &RasterFrame,
        region: &Region,
        scale_meters: f64,
    ) -> LandcoverResult<Histogram> {
        let outputs = self
            .reduce(frame, region, scale_meters, Reducer::FrequencyHistogram)
            .await?;

        let mut histogram = Histogram::new(scale_meters);
        for output in outputs {
            match output {
                ReduceOutput::Histogram(counts) => {
                    histogram.merge(&Histogram::from_counts(scale_meters, counts));
                }
                ReduceOutput::Count(_) => {
                    return Err(LandcoverError::query(
                        "compute backend returned a count for a histogram reduction",
                    ))
                }
            }
        }

        debug!(pixels = histogram.total_pixels(), classes = histogram.counts().len(), "Histogram computed");
        Ok(histogram)
    }

    /// Area in km² of each group's pixels inside `region`.
    ///
    /// One masked sum per group plus one for the total; codes in no group
    /// only count towards the total.
    #[instrument(skip(self, frame, region, groups), fields(frame = %frame.id, groups = groups.len()))]
    pub async fn group_area(
        &self,
        frame: &RasterFrame,
        region: &Region,
        scale_meters: f64,
        groups: &GroupingScheme,
    ) -> LandcoverResult<AreaResult> {
        let pixel_area = pixel_area_km2(scale_meters);

        let total = self
            .masked_sum(frame, region, scale_meters, vec![CodeRange::new(0, u8::MAX)?])
            .await?;
        let mut result = AreaResult::new(frame.year(), scale_meters, total as f64 * pixel_area);

        for group in groups.groups() {
            let count = self
                .masked_sum(frame, region, scale_meters, group.ranges.clone())
                .await?;
            result.insert(&group.name, count as f64 * pixel_area);
        }

        Ok(result)
    }

    /// Histogram and group areas from a single histogram pass.
    ///
    /// Produces the same areas as [`ZonalStatsEngine::group_area`].
    pub async fn analyze(
        &self,
        frame: &RasterFrame,
        region: &Region,
        scale_meters: f64,
        groups: &GroupingScheme,
    ) -> LandcoverResult<ZonalAnalysis> {
        let histogram = self.histogram(frame, region, scale_meters).await?;
        let areas = AreaResult::from_histogram(frame.year(), &histogram, groups);
        info!(
            year = frame.year(),
            pixels = histogram.total_pixels(),
            grouped_km2 = areas.grouped_area_km2(),
            total_km2 = areas.total_area_km2,
            "Zonal analysis complete"
        );
        Ok(ZonalAnalysis { histogram, areas })
    }

    async fn masked_sum(
        &self,
        frame: &RasterFrame,
        region: &Region,
        scale_meters: f64,
        mask: Vec<CodeRange>,
    ) -> LandcoverResult<u64> {
        let outputs = self
            .reduce(frame, region, scale_meters, Reducer::Sum(mask))
            .await?;

        outputs.into_iter().try_fold(0u64, |acc, output| match output {
            ReduceOutput::Count(n) => Ok(acc + n),
            ReduceOutput::Histogram(_) => Err(LandcoverError::query(
                "compute backend returned a histogram for a sum reduction",
            )),
        })
    }

    /// Run `reducer` over the region, split into tiles when the region's
    /// window is larger than the pixel ceiling and tiling is enabled.
    async fn reduce(
        &self,
        frame: &RasterFrame,
        region: &Region,
        scale_meters: f64,
        reducer: Reducer,
    ) -> LandcoverResult<Vec<ReduceOutput>> {
        let grid = frame.at_scale(scale_meters)?;
        let Some(window) = grid.window_for(&region.bounding_box()) else {
            debug!("Region does not overlap frame");
            return Ok(Vec::new());
        };

        let tiles = self.plan_tiles(window)?;
        if tiles.len() > 1 {
            debug!(tiles = tiles.len(), pixels = window.pixel_count(), "Tiling oversized region");
        }
        counter!("landcover_compute_tiles_total").increment(tiles.len() as u64);

        let region = Arc::new(region.clone());
        stream::iter(tiles)
            .map(|tile| {
                let request = ReduceRequest {
                    frame: frame.clone(),
                    region: Arc::clone(&region),
                    reducer: reducer.clone(),
                    scale_meters,
                    max_pixels: self.config.max_pixels,
                    window: Some(tile),
                };
                self.backend.reduce_region(request)
            })
            .buffered(self.config.tile_concurrency.max(1))
            .try_collect()
            .await
    }

    fn plan_tiles(&self, window: PixelWindow) -> LandcoverResult<Vec<PixelWindow>> {
        let pixels = window.pixel_count();
        let max_pixels = self.config.max_pixels.max(1);
        if !self.config.tile_oversized || pixels <= max_pixels {
            return Ok(vec![window]);
        }
        if pixels / max_pixels >= MAX_TILES {
            return Err(LandcoverError::ComputeLimitExceeded {
                pixels,
                max_pixels: max_pixels.saturating_mul(MAX_TILES),
            });
        }
        Ok(window.split(max_pixels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::LocalComputeBackend;
    use test_utils::{canonical_groups, covering_region, forest_scenario_frame};

    fn engine(config: ZonalConfig) -> ZonalStatsEngine {
        ZonalStatsEngine::new(Arc::new(LocalComputeBackend::new()), config)
    }

    #[test]
    fn test_plan_tiles() {
        let untiled = engine(ZonalConfig {
            max_pixels: 10,
            tile_oversized: false,
            ..Default::default()
        });
        assert_eq!(untiled.plan_tiles(PixelWindow::new(0, 0, 5, 5)).unwrap().len(), 1);

        let tiled = engine(ZonalConfig {
            max_pixels: 10,
            ..Default::default()
        });
        let tiles = tiled.plan_tiles(PixelWindow::new(0, 0, 5, 5)).unwrap();
        assert_eq!(tiles.len(), 3);
        assert!(tiles.iter().all(|t| t.pixel_count() <= 10));
    }

    #[test]
    fn test_plan_tiles_refuses_runaway_windows() {
        let tiled = engine(ZonalConfig {
            max_pixels: 1,
            ..Default::default()
        });
        let huge = PixelWindow::new(0, 0, 1 << 20, 1 << 20);
        let err = tiled.plan_tiles(huge).unwrap_err();
        assert!(matches!(err, LandcoverError::ComputeLimitExceeded { .. }));
    }

    #[test]
    fn test_tiny_scale_is_rejected_not_overflowed() {
        let e = engine(ZonalConfig::default());
        let frame = forest_scenario_frame(2001);
        let region = covering_region(4, 4);

        let err = tokio_test::block_on(e.histogram(&frame, &region, 1e-7)).unwrap_err();
        assert!(matches!(err, LandcoverError::Config(_)));

        let err = tokio_test::block_on(e.group_area(&frame, &region, 1e-7, &canonical_groups()))
            .unwrap_err();
        assert!(matches!(err, LandcoverError::Config(_)));
    }

    #[tokio::test]
    async fn test_tiled_histogram_merges_to_untiled() {
        let frame = forest_scenario_frame(2001);
        let region = covering_region(4, 4);
        let untiled = engine(ZonalConfig::default())
            .histogram(&frame, &region, 500.0)
            .await
            .unwrap();
        let tiled = engine(ZonalConfig {
            max_pixels: 3,
            ..Default::default()
        })
        .histogram(&frame, &region, 500.0)
        .await
        .unwrap();
        assert_eq!(tiled, untiled);
    }

    #[test]
    fn test_oversized_without_tiling_fails() {
        let e = engine(ZonalConfig {
            max_pixels: 8,
            tile_oversized: false,
            ..Default::default()
        });
        let err = tokio_test::block_on(e.histogram(
            &forest_scenario_frame(2001),
            &covering_region(4, 4),
            500.0,
        ))
        .unwrap_err();
        assert!(matches!(err, LandcoverError::ComputeLimitExceeded { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_group_area_and_analyze_agree() {
        let e = engine(ZonalConfig::default());
        let frame = forest_scenario_frame(2001);
        let region = covering_region(4, 4);
        let groups = canonical_groups();

        let areas = e.group_area(&frame, &region, 500.0, &groups).await.unwrap();
        let analysis = e.analyze(&frame, &region, 500.0, &groups).await.unwrap();
        assert_eq!(areas, analysis.areas);
        assert_eq!(areas.year, 2001);
    }
}
