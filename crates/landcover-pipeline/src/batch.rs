//! Per-year batch orchestration.
//!
//! The driver resolves one frame per year, analyzes and/or exports it, and
//! records every year's outcome. Years run on a bounded pool; a failure in
//! one year never stops the others.

use std::sync::Arc;

use chrono::Utc;
use futures::{stream, StreamExt};
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use export_jobs::{ExportBackend, ExportJobManager, JobHandle};
use landcover_common::{
    Coordinate, GroupingScheme, LandcoverError, LandcoverResult, RasterFrame, Region,
    RegionCatalog, YearRange,
};
use raster_catalog::{RasterCatalog, RasterTimeSeries, Resolution, YearResolver};
use zonal_stats::{ComputeBackend, ZonalAnalysis, ZonalStatsEngine};

use crate::config::{RunConfig, RunMode};
use crate::outcome::{FrameInfo, SkipReason, Stage, YearOutcome, YearRecord};
use crate::report::RunReport;

/// Runs the per-year pipeline over a range of years.
pub struct BatchDriver {
    resolver: YearResolver,
    engine: ZonalStatsEngine,
    exports: ExportJobManager,
    groups: GroupingScheme,
    config: RunConfig,
}

impl BatchDriver {
    /// Wire the backends together. An invalid config is fatal here.
    pub fn new(
        catalog: Arc<dyn RasterCatalog>,
        compute: Arc<dyn ComputeBackend>,
        export: Arc<dyn ExportBackend>,
        config: RunConfig,
    ) -> LandcoverResult<Self> {
        config.validate()?;
        let groups = config.grouping()?;

        let series = RasterTimeSeries::new(catalog).select_band(config.band.clone());
        let resolver = YearResolver::new(series).with_policy(config.duplicate_frames);
        let engine = ZonalStatsEngine::new(compute, config.compute.clone());
        let exports = ExportJobManager::new(export, config.dedupe_exports);

        Ok(Self {
            resolver,
            engine,
            exports,
            groups,
            config,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn resolver(&self) -> &YearResolver {
        &self.resolver
    }

    pub fn engine(&self) -> &ZonalStatsEngine {
        &self.engine
    }

    pub fn exports(&self) -> &ExportJobManager {
        &self.exports
    }

    pub fn groups(&self) -> &GroupingScheme {
        &self.groups
    }

    /// Run the configured year range and mode.
    pub async fn run_configured(
        &self,
        region: &Region,
        cancel: CancellationToken,
    ) -> LandcoverResult<RunReport> {
        let years = self.config.years()?;
        self.run_with_cancel(region, years, self.config.mode, cancel)
            .await
    }

    pub async fn run(
        &self,
        region: &Region,
        years: YearRange,
        mode: RunMode,
    ) -> LandcoverResult<RunReport> {
        self.run_with_cancel(region, years, mode, CancellationToken::new())
            .await
    }

    /// Validate `ring` as the ROI, then run. An invalid ring aborts before
    /// any year is touched.
    pub async fn run_polygon(
        &self,
        ring: &[Coordinate],
        years: YearRange,
        mode: RunMode,
        cancel: CancellationToken,
    ) -> LandcoverResult<RunReport> {
        let region = RegionCatalog::validate(ring)?;
        self.run_with_cancel(&region, years, mode, cancel).await
    }

    /// Process every year in `years`.
    ///
    /// Returns `Err` only for run-wide preconditions; per-year errors land in
    /// the report. Once `cancel` fires, years that have not started are
    /// recorded as skipped and in-flight years finish.
    #[instrument(skip(self, region, cancel), fields(mode = %mode, start = years.start, end = years.end))]
    pub async fn run_with_cancel(
        &self,
        region: &Region,
        years: YearRange,
        mode: RunMode,
        cancel: CancellationToken,
    ) -> LandcoverResult<RunReport> {
        if mode.exports() && self.config.export_destination.is_none() {
            return Err(LandcoverError::config(format!(
                "mode '{}' requires an export_destination",
                mode
            )));
        }

        let region = Arc::new(region.clone());
        let started_at = Utc::now();

        info!(
            years = years.len(),
            concurrency = self.config.concurrency,
            band = %self.config.band,
            "Starting batch run"
        );

        let records: Vec<YearRecord> = stream::iter(years.years())
            .map(|year| {
                let region = Arc::clone(&region);
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return YearRecord::skipped(year, SkipReason::Cancelled);
                    }
                    self.process_year(year, &region, mode).await
                }
            })
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        let mut report = RunReport::new(mode, years, started_at);
        for record in records {
            counter!("landcover_years_total", "status" => record.outcome.status()).increment(1);
            report.insert(record);
        }
        report.finish();

        let summary = report.summary();
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = cancel.is_cancelled(),
            "Batch run complete"
        );

        Ok(report)
    }

    async fn process_year(&self, year: i32, region: &Arc<Region>, mode: RunMode) -> YearRecord {
        let resolver = &self.resolver;
        let resolution = match self
            .config
            .retry
            .run("resolve", move || resolver.resolve(year))
            .await
        {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!(year, error = %e, "Frame resolution failed");
                return YearRecord::failed(year, None, Stage::Resolve, &e);
            }
        };

        let (frame, candidates) = match resolution {
            Resolution::Found { frame, candidates } => (frame, candidates),
            Resolution::Missing { .. } => {
                info!(year, "No frame for year, skipping");
                return YearRecord::skipped(year, SkipReason::MissingYear);
            }
        };
        let info = FrameInfo::new(&frame, candidates);

        match self.process_frame(&frame, region, mode).await {
            Ok(outcome) => YearRecord::new(year, Some(info), outcome),
            Err(failed) => {
                warn!(year, frame = %frame.id, stage = %failed.stage, error = %failed.error, "Year failed");
                YearRecord::failed_after(year, Some(info), failed.stage, &failed.error, failed.analysis)
            }
        }
    }

    async fn process_frame(
        &self,
        frame: &RasterFrame,
        region: &Arc<Region>,
        mode: RunMode,
    ) -> Result<YearOutcome, FrameFailure> {
        match mode {
            RunMode::Analyze => {
                let analysis = self
                    .analyze(frame, region)
                    .await
                    .map_err(|e| FrameFailure::new(Stage::Analyze, e))?;
                Ok(YearOutcome::Analyzed(analysis))
            }
            RunMode::Export => {
                let job = self
                    .export(frame, region)
                    .await
                    .map_err(|e| FrameFailure::new(Stage::Export, e))?;
                Ok(YearOutcome::Exported(job))
            }
            RunMode::Both => {
                let analysis = self
                    .analyze(frame, region)
                    .await
                    .map_err(|e| FrameFailure::new(Stage::Analyze, e))?;
                match self.export(frame, region).await {
                    Ok(job) => Ok(YearOutcome::AnalyzedAndExported { analysis, job }),
                    Err(error) => Err(FrameFailure {
                        stage: Stage::Export,
                        error,
                        analysis: Some(analysis),
                    }),
                }
            }
        }
    }

    async fn analyze(&self, frame: &RasterFrame, region: &Region) -> LandcoverResult<ZonalAnalysis> {
        let engine = &self.engine;
        let groups = &self.groups;
        let scale = self.config.scale_meters;
        self.config
            .retry
            .run("analyze", move || engine.analyze(frame, region, scale, groups))
            .await
    }

    /// Submissions are never retried.
    async fn export(&self, frame: &RasterFrame, region: &Arc<Region>) -> LandcoverResult<JobHandle> {
        let options = self
            .config
            .export_destination
            .as_ref()
            .ok_or_else(|| LandcoverError::config("no export_destination configured"))?;

        let job = self
            .exports
            .submit(frame, region, self.config.scale_meters, options)
            .await?;

        job.into_handle()
            .ok_or_else(|| LandcoverError::submission("backend accepted the job without a handle"))
    }
}

struct FrameFailure {
    stage: Stage,
    error: LandcoverError,
    analysis: Option<ZonalAnalysis>,
}

impl FrameFailure {
    fn new(stage: Stage, error: LandcoverError) -> Self {
        Self {
            stage,
            error,
            analysis: None,
        }
    }
}
