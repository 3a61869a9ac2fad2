//! Raster catalog access for annual land-cover products.
//!
//! Provides:
//! - The [`RasterCatalog`] backend contract plus in-memory and file-backed catalogs
//! - [`RasterTimeSeries`], a lazy band/date query over a catalog
//! - [`YearResolver`], which picks one representative frame per calendar year

pub mod catalog;
pub mod resolver;
pub mod series;

pub use catalog::{FileCatalog, FrameDocument, InMemoryCatalog, RasterCatalog};
pub use resolver::{DuplicateFramePolicy, Resolution, YearResolver};
pub use series::RasterTimeSeries;
