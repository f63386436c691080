//! Regridding of station and satellite products onto a reference domain.
//!
//! This crate provides:
//! - **Indexing**: nearest-source [`InterpolationIndex`]es, cached on disk
//!   and invalidated when the source layout changes
//! - **Interpolation**: nearest neighbour and inverse distance weighting,
//!   in process or through a `gdal_grid`-compatible command
//! - **Filtering**: [`DomainFilter`] for out-of-domain and out-of-range cells
//! - **Flag remapping**: [`LookupTable`] built from CF flag attributes
//! - **Pipeline**: [`Regridder`] chaining the steps per variable
//!
//! # Example
//!
//! ```
//! use geo_grid::{BboxSpec, GeoGrid};
//! use regrid::{GridInterpolator, InterpolationParams};
//!
//! let grid = GeoGrid::build_from_bbox(&BboxSpec::new(0.0, 0.0, 3.0, 3.0, 1.0, 1.0)).unwrap();
//! let field = GridInterpolator::native()
//!     .interpolate(&[10.0], &[2.0], &[2.0], &grid, &InterpolationParams::nearest(), None)
//!     .unwrap();
//! assert_eq!(field.shape(), grid.shape());
//! ```

pub mod attributes;
pub mod config;
pub mod error;
pub mod filter;
pub mod index;
pub mod interpolation;
pub mod lookup;
pub mod pipeline;
pub mod types;

pub use attributes::{CfTimeUnits, TimeUnit, VariableAttributes, VariableConventions};
pub use config::{GriddingBackend, InterpolationMethod, RegridConfig, SearchRadius};
pub use error::{RegridError, Result};
pub use filter::DomainFilter;
pub use index::{source_fingerprint, GeoIndexer, IndexCodec, InterpolationIndex};
pub use interpolation::{ExternalGridder, GridInterpolator, InterpolationParams};
pub use lookup::{FlagOutput, LookupTable, LutEntry, ValueRange};
pub use pipeline::Regridder;
pub use types::{Field, RegridOutcome, ScatterDataset};
