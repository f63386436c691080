//! Test helpers shared by the regridding crates.
//!
//! - [`scratch`]: temporary directories and files for rasters and caches
//! - [`generators`]: synthetic domains, station layouts and fields
//! - [`fixtures`]: reference extents, raster headers, flag tables and a
//!   conventions document
//!
//! Nothing here depends on a workspace crate, so `geo-grid` and `regrid`
//! can both use it as a dev-dependency without a cycle. Generators return
//! plain vectors and strings for that reason.

pub mod fixtures;
pub mod generators;
pub mod scratch;

pub use fixtures::*;
pub use generators::*;
pub use scratch::*;

/// Assert `|left - right| <= tolerance`, comparing as `f64`.
///
/// ```
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(43.750000001_f64, 43.75, 1e-6);
/// assert_approx_eq!(0.1_f32 + 0.2_f32, 0.3, 1e-6);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $tolerance:expr) => {{
        let (a, b, tol) = ($left as f64, $right as f64, $tolerance as f64);
        if !((a - b).abs() <= tol) {
            panic!(
                "values not within tolerance: {} vs {} (|diff| = {}, tolerance = {})",
                a,
                b,
                (a - b).abs(),
                tol
            );
        }
    }};
}

/// Assert two fields are equal cell by cell, with NaN equal to NaN.
#[macro_export]
macro_rules! assert_fields_eq {
    ($left:expr, $right:expr) => {{
        let (a, b) = (&$left, &$right);
        assert_eq!(a.len(), b.len(), "field lengths differ");
        if let Some(cell) = a
            .iter()
            .zip(b.iter())
            .position(|(x, y)| x != y && !((*x as f64).is_nan() && (*y as f64).is_nan()))
        {
            panic!("fields differ at cell {}: {:?} != {:?}", cell, a[cell], b[cell]);
        }
    }};
}
