//! Yearly land-cover batch pipeline.
//!
//! Ties the raster catalog, zonal statistics and export crates together:
//!
//! - [`RunConfig`]: YAML run configuration with environment expansion
//! - [`BatchDriver`]: resolves, analyzes and exports each year on a bounded pool
//! - [`RunReport`] and [`JsonLinesSink`]: complete per-year outcome reporting
//! - [`blocking`]: synchronous wrappers for non-async call sites
//!
//! # Example
//!
//! ```ignore
//! let config = RunConfig::load("run.yaml")?;
//! let driver = BatchDriver::new(catalog, compute, exports, config)?;
//! let report = driver.run_configured(&region, CancellationToken::new()).await?;
//! JsonLinesSink::new(std::io::stdout()).write_report(&report)?;
//! ```

pub mod batch;
pub mod blocking;
pub mod config;
pub mod outcome;
pub mod report;
pub mod retry;

pub use batch::BatchDriver;
pub use blocking::BlockingRunner;
pub use config::{RunConfig, RunMode};
pub use outcome::{FailureReason, FrameInfo, SkipReason, Stage, YearOutcome, YearRecord};
pub use report::{ExportOutcome, JsonLinesSink, ReportRecord, RunReport, RunSummary};
pub use retry::RetryConfig;

pub use tokio_util::sync::CancellationToken;
