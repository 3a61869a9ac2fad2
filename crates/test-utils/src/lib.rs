//! Shared test utilities for the land-cover workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic categorical raster generators
//! - Region and frame fixtures
//! - Approximate float assertions
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{frame_for_year, covering_region};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr) => {{
        $crate::assert_approx_eq!($left, $right, 1e-9);
    }};
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro asserting that an area (km²) breakdown matches expected values.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_areas_eq;
///
/// assert_areas_eq!(result.areas(), { "Forest" => 1.5, "Savanna" => 0.75 });
/// ```
#[macro_export]
macro_rules! assert_areas_eq {
    ($areas:expr, { $($name:expr => $value:expr),+ $(,)? }) => {{
        let areas = &$areas;
        $(
            match areas.get($name) {
                Some(actual) => $crate::assert_approx_eq!(*actual, $value, 1e-9),
                None => panic!("missing area for group '{}'", $name),
            }
        )+
    }};
}
