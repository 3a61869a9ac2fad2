//! Per-year raster export jobs.
//!
//! Provides:
//! - Deterministic job naming from a template and the frame's year
//! - [`ExportJobManager`], which submits jobs fire-and-forget with optional
//!   session-scoped deduplication
//! - The [`ExportBackend`] contract and an object-store implementation that
//!   writes clipped GeoTIFF or JSON extracts

pub mod backend;
pub mod extract;
pub mod geotiff;
pub mod job;
pub mod manager;
pub mod storage;

pub use backend::{ExportBackend, ObjectStoreExportBackend};
pub use extract::RasterExtract;
pub use geotiff::encode_geotiff;
pub use job::{
    job_name, ExportFormat, ExportJob, ExportOptions, ExportParams, JobHandle, JobState,
    DEFAULT_NAME_TEMPLATE,
};
pub use manager::ExportJobManager;
pub use storage::{ObjectStorageConfig, StorageTarget};
