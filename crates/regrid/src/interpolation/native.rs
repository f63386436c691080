//! In-process gridding kernels.

use geo_grid::GeoGrid;

use crate::config::{InterpolationMethod, SearchRadius};
use crate::error::Result;
use crate::index::GeoIndexer;
use crate::types::Field;

/// IDW power parameter.
pub const IDW_POWER: f64 = 2.0;

/// Squared distance below which a sample coincides with a cell center.
const EXACT_HIT_D2: f64 = 1e-24;

/// Borrowed source samples with finite values and coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Samples<'a> {
    pub values: &'a [f32],
    pub x: &'a [f64],
    pub y: &'a [f64],
}

/// Grid `samples` onto `grid` with the requested kernel.
pub fn grid(
    samples: &Samples<'_>,
    grid: &GeoGrid,
    method: InterpolationMethod,
    radius: Option<SearchRadius>,
    no_data: f64,
) -> Result<Field> {
    match method {
        InterpolationMethod::Nearest => nearest(samples, grid, radius, no_data),
        InterpolationMethod::Idw => Ok(idw(samples, grid, radius, no_data)),
    }
}

/// Value of the nearest sample, or `no_data` when none lies in the
/// search ellipse.
pub fn nearest(
    samples: &Samples<'_>,
    grid: &GeoGrid,
    radius: Option<SearchRadius>,
    no_data: f64,
) -> Result<Field> {
    let indexer = match radius {
        Some(r) => GeoIndexer::with_radius(r),
        None => GeoIndexer::new(),
    };
    let index = indexer.compute_index(samples.x, samples.y, grid)?;
    index.gather(samples.values, no_data as f32)
}

/// Inverse distance weighting (power 2, no smoothing).
///
/// Without a radius every sample contributes. A sample sitting on a cell
/// center gives that cell its value directly.
pub fn idw(
    samples: &Samples<'_>,
    grid: &GeoGrid,
    radius: Option<SearchRadius>,
    no_data: f64,
) -> Field {
    let mut data = Vec::with_capacity(grid.len());

    for (&cx, &cy) in grid.coord_x().iter().zip(grid.coord_y()) {
        let mut weighted = 0.0_f64;
        let mut weights = 0.0_f64;
        let mut exact: Option<f32> = None;

        for ((&sx, &sy), &v) in samples.x.iter().zip(samples.y).zip(samples.values) {
            let dx = sx - cx;
            let dy = sy - cy;
            if let Some(r) = radius {
                if !r.contains(dx, dy) {
                    continue;
                }
            }
            let d2 = dx * dx + dy * dy;
            if d2 < EXACT_HIT_D2 {
                exact = Some(v);
                break;
            }
            let w = 1.0 / d2.powf(IDW_POWER / 2.0);
            weighted += w * v as f64;
            weights += w;
        }

        let value = match exact {
            Some(v) => v,
            None if weights > 0.0 => (weighted / weights) as f32,
            None => no_data as f32,
        };
        data.push(value);
    }

    Field {
        data,
        rows: grid.rows(),
        cols: grid.cols(),
    }
}
