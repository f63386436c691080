//! Scattered-to-grid interpolation.
//!
//! [`GridInterpolator::interpolate`] resamples source samples onto a
//! target [`GeoGrid`] with either the in-process kernels ([`native`]) or a
//! `gdal_grid`-compatible command ([`external`]). A precomputed
//! [`InterpolationIndex`] bypasses both and gathers values directly.
//!
//! The returned field always has the target grid's shape with row 0 north.

pub mod external;
pub mod native;

use geo_grid::GeoGrid;
use tracing::{debug, warn};

use crate::config::{GriddingBackend, InterpolationMethod, RegridConfig, SearchRadius};
use crate::error::{RegridError, Result};
use crate::index::InterpolationIndex;
use crate::types::Field;

pub use external::ExternalGridder;

/// Kernel parameters for one interpolation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationParams {
    pub method: InterpolationMethod,
    pub radius_x: Option<f64>,
    pub radius_y: Option<f64>,
    pub no_data: f64,
}

impl Default for InterpolationParams {
    fn default() -> Self {
        Self {
            method: InterpolationMethod::Nearest,
            radius_x: None,
            radius_y: None,
            no_data: -9999.0,
        }
    }
}

impl InterpolationParams {
    /// Unbounded nearest neighbour.
    pub fn nearest() -> Self {
        Self::default()
    }

    /// Inverse distance weighting within the given radii.
    pub fn idw(radius_x: f64, radius_y: f64) -> Self {
        Self {
            method: InterpolationMethod::Idw,
            radius_x: Some(radius_x),
            radius_y: Some(radius_y),
            ..Self::default()
        }
    }

    pub fn with_radius(mut self, radius_x: f64, radius_y: f64) -> Self {
        self.radius_x = Some(radius_x);
        self.radius_y = Some(radius_y);
        self
    }

    pub fn with_no_data(mut self, no_data: f64) -> Self {
        self.no_data = no_data;
        self
    }

    /// Parameters configured in `config`.
    pub fn from_config(config: &RegridConfig) -> Self {
        Self {
            method: config.method,
            radius_x: config.radius_x,
            radius_y: config.radius_y,
            no_data: config.no_data,
        }
    }

    /// The search radius; a configuration error when IDW has none.
    pub fn search_radius(&self) -> Result<Option<SearchRadius>> {
        SearchRadius::from_options(self.method, self.radius_x, self.radius_y)
    }
}

/// Resamples scattered values onto a target grid.
#[derive(Debug, Clone, Default)]
pub struct GridInterpolator {
    backend: GriddingBackend,
    external: ExternalGridder,
}

impl GridInterpolator {
    /// Interpolator using the in-process kernels.
    pub fn native() -> Self {
        Self::default()
    }

    /// Interpolator delegating to an external gridding command.
    pub fn external(gridder: ExternalGridder) -> Self {
        Self {
            backend: GriddingBackend::External,
            external: gridder,
        }
    }

    pub fn from_config(config: &RegridConfig) -> Self {
        Self {
            backend: config.backend,
            external: ExternalGridder::from_config(config),
        }
    }

    pub fn backend(&self) -> GriddingBackend {
        self.backend
    }

    /// Interpolate `values` at `(src_x, src_y)` onto `dst_grid`.
    ///
    /// With an `index` the distance search is skipped and `values` are
    /// gathered through it; `values` must then have the length the index
    /// was built for. Samples with a non-finite value or coordinate are
    /// ignored. Fails with [`RegridError::NoValidSamples`] when nothing
    /// usable remains.
    pub fn interpolate(
        &self,
        values: &[f32],
        src_x: &[f64],
        src_y: &[f64],
        dst_grid: &GeoGrid,
        params: &InterpolationParams,
        index: Option<&InterpolationIndex>,
    ) -> Result<Field> {
        let radius = params.search_radius()?;

        if dst_grid.is_empty() {
            return Err(RegridError::EmptyDomain(
                "target grid has no cells".to_string(),
            ));
        }

        if let Some(index) = index {
            if index.shape() != dst_grid.shape() {
                return Err(RegridError::index_mismatch(format!(
                    "index is {}x{}, target grid is {}x{}",
                    index.rows(),
                    index.cols(),
                    dst_grid.rows(),
                    dst_grid.cols()
                )));
            }
            debug!(sources = values.len(), "Gathering through precomputed index");
            return index.gather(values, params.no_data as f32);
        }

        if values.len() != src_x.len() || values.len() != src_y.len() {
            return Err(RegridError::shape_mismatch(format!(
                "values ({}), src_x ({}) and src_y ({}) must have the same length",
                values.len(),
                src_x.len(),
                src_y.len()
            )));
        }

        let keep: Vec<usize> = (0..values.len())
            .filter(|&i| values[i].is_finite() && src_x[i].is_finite() && src_y[i].is_finite())
            .collect();
        if keep.is_empty() {
            warn!(
                rows = dst_grid.rows(),
                cols = dst_grid.cols(),
                "No valid samples to interpolate"
            );
            return Err(RegridError::NoValidSamples(format!(
                "{} source samples, none usable",
                values.len()
            )));
        }

        let (values, xs, ys): (Vec<f32>, Vec<f64>, Vec<f64>) = if keep.len() == values.len() {
            (values.to_vec(), src_x.to_vec(), src_y.to_vec())
        } else {
            debug!(
                dropped = values.len() - keep.len(),
                "Ignoring non-finite samples"
            );
            (
                keep.iter().map(|&i| values[i]).collect(),
                keep.iter().map(|&i| src_x[i]).collect(),
                keep.iter().map(|&i| src_y[i]).collect(),
            )
        };

        let samples = native::Samples {
            values: &values,
            x: &xs,
            y: &ys,
        };
        let field = match self.backend {
            GriddingBackend::Native => {
                native::grid(&samples, dst_grid, params.method, radius, params.no_data)?
            }
            GriddingBackend::External => {
                self.external
                    .grid(&samples, dst_grid, params.method, radius, params.no_data)?
            }
        };

        field.ensure_shape_of(dst_grid)?;
        debug!(
            method = %params.method,
            backend = ?self.backend,
            samples = values.len(),
            rows = field.rows,
            cols = field.cols,
            "Interpolated field"
        );
        Ok(field)
    }
}
