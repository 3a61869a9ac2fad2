//! Common types and utilities shared across the land-cover pipeline crates.

pub mod bbox;
pub mod classes;
pub mod crs;
pub mod error;
pub mod raster;
pub mod region;
pub mod time;

pub use bbox::BoundingBox;
pub use classes::{pixel_area_km2, ClassGroup, CodeRange, GroupingScheme};
pub use crs::CrsCode;
pub use error::{ErrorKind, LandcoverError, LandcoverResult};
pub use raster::{GeoTransform, PixelWindow, RasterFrame, ScaledGrid};
pub use region::{Coordinate, Region, RegionCatalog};
pub use time::{DateRange, YearRange};
