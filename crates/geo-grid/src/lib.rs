//! Reference grid model for regridding meteorological and satellite products.
//!
//! Every dynamic product is resampled onto one fixed lat/lon raster, the
//! *domain*. This crate owns that domain:
//!
//! - **[`GeoGrid`]**: origin, cell size, shape, no-data mask, flattened mask
//!   indices and cell-center coordinate meshes (row 0 is north)
//! - **[`AsciiRaster`]**: the ASCII reference raster the domain is read from
//! - **[`cache`]**: `get_or_compute` memoization for ancillary files
//!
//! # Example
//!
//! ```
//! use geo_grid::{BboxSpec, GeoGrid, IndexOrder};
//!
//! let grid = GeoGrid::build_from_bbox(&BboxSpec::new(0.0, 0.0, 10.0, 10.0, 1.0, 1.0)).unwrap();
//! assert_eq!(grid.shape(), (11, 11));
//! assert!(grid.index_nan(IndexOrder::RowMajor).is_empty());
//! ```

pub mod bbox;
pub mod cache;
pub mod error;
pub mod grid;
pub mod header;

pub use bbox::{BboxSpec, BoundingBox};
pub use cache::{get_or_compute, get_or_compute_with, Codec, JsonCodec};
pub use error::{GeoGridError, Result};
pub use grid::{is_no_data, GeoGrid, IndexOrder, DOMAIN_LAYER};
pub use header::{AsciiRaster, GridHeader, DEFAULT_NO_DATA};
