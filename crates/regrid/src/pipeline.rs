//! The per-variable regridding pipeline.
//!
//! ```text
//! source samples -> scale factor -> flag lookup table -> valid samples
//!                -> cached index / kernel -> domain filter -> outcome
//! ```

use std::path::PathBuf;

use geo_grid::GeoGrid;
use tracing::{debug, info, warn};

use crate::attributes::VariableAttributes;
use crate::config::{GriddingBackend, InterpolationMethod, RegridConfig};
use crate::error::{RegridError, Result};
use crate::filter::DomainFilter;
use crate::index::GeoIndexer;
use crate::interpolation::{GridInterpolator, InterpolationParams};
use crate::lookup::LookupTable;
use crate::types::{Field, RegridOutcome, ScatterDataset};

/// Regrids variables onto one fixed domain.
#[derive(Debug, Clone)]
pub struct Regridder {
    config: RegridConfig,
    grid: GeoGrid,
    interpolator: GridInterpolator,
}

impl Regridder {
    /// Create a regridder. The configuration is validated here.
    pub fn new(config: RegridConfig, grid: GeoGrid) -> Result<Self> {
        config.validate()?;
        if grid.is_empty() {
            return Err(RegridError::EmptyDomain("target grid has no cells".to_string()));
        }
        let interpolator = GridInterpolator::from_config(&config);
        Ok(Self {
            config,
            grid,
            interpolator,
        })
    }

    pub fn config(&self) -> &RegridConfig {
        &self.config
    }

    pub fn grid(&self) -> &GeoGrid {
        &self.grid
    }

    /// Where the index for `name` is cached, if caching is configured.
    pub fn index_path(&self, name: &str) -> Option<PathBuf> {
        self.config
            .cache_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.index.bin", name)))
    }

    /// Regrid scattered samples of variable `name`.
    ///
    /// `source.attributes` describe the input (sentinels, scale factor,
    /// flag table); `output` describes the written variable (fill,
    /// missing, valid range). Degenerate inputs yield
    /// [`RegridOutcome::Empty`] instead of an error.
    pub fn run(
        &self,
        name: &str,
        source: &ScatterDataset,
        output: &VariableAttributes,
    ) -> Result<RegridOutcome> {
        let filter = DomainFilter::from_attributes(output, self.config.no_data)?;
        let params = InterpolationParams::from_config(&self.config);
        let radius = params.search_radius()?;

        let mut dataset = source.clone();
        dataset.apply_scale_factor();
        if let Some(lut) = LookupTable::from_attributes(&dataset.attributes)? {
            lut.apply_in_place(&mut dataset.values)?;
        }

        let reach = radius.map(|r| self.grid.edge_bbox().expand(r.x, r.y));
        let samples = dataset.valid_samples(reach.as_ref());
        if samples.is_empty() {
            return Ok(self.empty(
                name,
                &filter,
                format!("none of {} source samples is usable", source.len()),
            ));
        }

        // The cached index reproduces the native nearest kernel only, so an
        // external gridder is always invoked.
        let index = match (self.index_path(name), self.config.method, self.config.backend) {
            (Some(path), InterpolationMethod::Nearest, GriddingBackend::Native) => {
                let indexer = radius.map_or_else(GeoIndexer::new, GeoIndexer::with_radius);
                Some(indexer.compute_index_cached(
                    &path,
                    self.config.refresh_ancillary,
                    &samples.x,
                    &samples.y,
                    &self.grid,
                )?)
            }
            (Some(_), InterpolationMethod::Nearest, GriddingBackend::External) => {
                debug!(variable = name, "External backend configured, index cache not used");
                None
            }
            _ => None,
        };

        let interpolated = match self.interpolator.interpolate(
            &samples.values,
            &samples.x,
            &samples.y,
            &self.grid,
            &params,
            index.as_ref(),
        ) {
            Ok(field) => field,
            Err(e) if e.is_degenerate_input() => {
                return Ok(self.empty(name, &filter, e.to_string()));
            }
            Err(e) => return Err(e),
        };

        let field = filter.apply(&interpolated, &self.grid)?;
        info!(
            variable = name,
            samples = samples.len(),
            rows = field.rows,
            cols = field.cols,
            "Regridded variable"
        );
        Ok(RegridOutcome::Field(field))
    }

    /// Regrid a field defined on `source`, a regular grid of its own.
    ///
    /// Each target cell takes the source cell containing its center.
    pub fn run_grid(
        &self,
        name: &str,
        source: &GeoGrid,
        values: &[f32],
        output: &VariableAttributes,
    ) -> Result<RegridOutcome> {
        let filter = DomainFilter::from_attributes(output, self.config.no_data)?;
        let indexer = GeoIndexer::new();
        let index = match self.index_path(name) {
            Some(path) => indexer.compute_grid_index_cached(
                &path,
                self.config.refresh_ancillary,
                source,
                &self.grid,
            )?,
            None => indexer.compute_grid_index(source, &self.grid)?,
        };

        if index.valid_count() == 0 {
            return Ok(self.empty(name, &filter, "source grid does not overlap the domain".to_string()));
        }

        let interpolated = index.gather(values, self.config.no_data as f32)?;
        let field = filter.apply(&interpolated, &self.grid)?;
        info!(
            variable = name,
            source_rows = source.rows(),
            source_cols = source.cols(),
            "Regridded grid variable"
        );
        Ok(RegridOutcome::Field(field))
    }

    fn empty(&self, name: &str, filter: &DomainFilter, reason: String) -> RegridOutcome {
        warn!(variable = name, reason = %reason, "Regrid produced no data");
        RegridOutcome::Empty {
            field: Field::filled_like(&self.grid, filter.fill_value as f32),
            reason,
        }
    }
}
