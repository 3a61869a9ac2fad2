//! Blocking wrappers around the async pipeline calls.
//!
//! For scripts and tests that are not already inside a tokio runtime. Every
//! method blocks the calling thread; calling one from async code panics.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use export_jobs::{ExportJob, ExportJobManager, ExportOptions, JobHandle, JobState, ObjectStoreExportBackend};
use landcover_common::{GroupingScheme, LandcoverError, LandcoverResult, RasterFrame, Region, YearRange};
use raster_catalog::{Resolution, YearResolver};
use zonal_stats::{AreaResult, Histogram, ZonalStatsEngine};

use crate::batch::BatchDriver;
use crate::config::RunMode;
use crate::report::RunReport;

/// Owns a current-thread runtime and drives pipeline futures to completion.
///
/// Export tasks spawned by the object-store backend only make progress while
/// one of these methods is running, so keep the runner alive and use
/// [`BlockingRunner::wait_for_export`] before reading extracts.
pub struct BlockingRunner {
    runtime: tokio::runtime::Runtime,
}

impl BlockingRunner {
    pub fn new() -> LandcoverResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| LandcoverError::Io(format!("failed to start runtime: {}", e)))?;
        Ok(Self { runtime })
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn resolve(&self, resolver: &YearResolver, year: i32) -> LandcoverResult<Resolution> {
        self.block_on(resolver.resolve(year))
    }

    pub fn histogram(
        &self,
        engine: &ZonalStatsEngine,
        frame: &RasterFrame,
        region: &Region,
        scale_meters: f64,
    ) -> LandcoverResult<Histogram> {
        self.block_on(engine.histogram(frame, region, scale_meters))
    }

    pub fn group_area(
        &self,
        engine: &ZonalStatsEngine,
        frame: &RasterFrame,
        region: &Region,
        scale_meters: f64,
        groups: &GroupingScheme,
    ) -> LandcoverResult<AreaResult> {
        self.block_on(engine.group_area(frame, region, scale_meters, groups))
    }

    /// Submit an export; returns once the backend has accepted it.
    pub fn submit(
        &self,
        manager: &ExportJobManager,
        frame: &RasterFrame,
        region: &Arc<Region>,
        scale_meters: f64,
        options: &ExportOptions,
    ) -> LandcoverResult<ExportJob> {
        self.block_on(manager.submit(frame, region, scale_meters, options))
    }

    pub fn run(
        &self,
        driver: &BatchDriver,
        region: &Region,
        years: YearRange,
        mode: RunMode,
    ) -> LandcoverResult<RunReport> {
        self.block_on(driver.run(region, years, mode))
    }

    /// Drive the runtime until the export finishes or `timeout` elapses.
    pub fn wait_for_export(
        &self,
        backend: &ObjectStoreExportBackend,
        handle: &JobHandle,
        timeout: Duration,
    ) -> LandcoverResult<JobState> {
        self.block_on(backend.wait(handle, timeout))
    }
}
