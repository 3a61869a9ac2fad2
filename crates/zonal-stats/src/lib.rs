//! Zonal categorical statistics for annual land-cover frames.
//!
//! Clips a frame to a region, resamples it to the requested scale and
//! counts pixels per class code. Group areas are derived as
//! `matched pixels × (scale / 1000)²` km².
//!
//! # Architecture
//!
//! ```text
//! ZonalStatsEngine::analyze(frame, region, scale, groups)
//!      │
//!      ├─► Window of the scaled grid covering the region's bbox
//!      │
//!      ├─► Split into row bands if larger than max_pixels
//!      │
//!      ├─► ComputeBackend::reduce_region per tile (bounded concurrency)
//!      │
//!      └─► Merge partial histograms ─► Histogram + AreaResult
//! ```
//!
//! # Example
//!
//! ```ignore
//! use zonal_stats::{LocalComputeBackend, ZonalConfig, ZonalStatsEngine};
//!
//! let engine = ZonalStatsEngine::new(Arc::new(LocalComputeBackend::new()), ZonalConfig::default());
//! let analysis = engine.analyze(&frame, &region, 500.0, &GroupingScheme::canonical()).await?;
//! println!("forest: {:?} km²", analysis.areas.get("Forest"));
//! ```

pub mod compute;
pub mod config;
pub mod engine;
pub mod histogram;

// Re-export commonly used types at crate root
pub use compute::{ComputeBackend, LocalComputeBackend, ReduceOutput, ReduceRequest, Reducer};
pub use config::{ZonalConfig, DEFAULT_MAX_PIXELS};
pub use engine::{ZonalAnalysis, ZonalStatsEngine};
pub use histogram::{AreaResult, Histogram};
