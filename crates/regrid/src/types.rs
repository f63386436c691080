//! Core types for regridding.

use geo_grid::{BoundingBox, GeoGrid};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attributes::VariableAttributes;
use crate::error::{RegridError, Result};

/// A 2-D field on a regular grid, row-major with row 0 north.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub data: Vec<f32>,
    pub rows: usize,
    pub cols: usize,
}

impl Field {
    /// Wrap `data`, checking it holds `rows * cols` cells.
    pub fn new(data: Vec<f32>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(RegridError::shape_mismatch(format!(
                "field of {}x{} needs {} cells, got {}",
                rows,
                cols,
                rows * cols,
                data.len()
            )));
        }
        Ok(Self { data, rows, cols })
    }

    /// A field filled with one value.
    pub fn filled(rows: usize, cols: usize, value: f32) -> Self {
        Self {
            data: vec![value; rows * cols],
            rows,
            cols,
        }
    }

    /// A field shaped like `grid`, filled with one value.
    pub fn filled_like(grid: &GeoGrid, value: f32) -> Self {
        Self::filled(grid.rows(), grid.cols(), value)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    /// Reverse the row order in place (south-up to north-up and back).
    pub fn flip_vertical(&mut self) {
        if self.cols == 0 {
            return;
        }
        let rows = self.rows;
        for row in 0..rows / 2 {
            let (top, bottom) = self.data.split_at_mut((rows - 1 - row) * self.cols);
            top[row * self.cols..(row + 1) * self.cols].swap_with_slice(&mut bottom[..self.cols]);
        }
    }

    /// Fail unless this field has the shape of `grid`.
    pub fn ensure_shape_of(&self, grid: &GeoGrid) -> Result<()> {
        if self.shape() != grid.shape() {
            return Err(RegridError::shape_mismatch(format!(
                "field is {}x{}, grid is {}x{}",
                self.rows,
                self.cols,
                grid.rows(),
                grid.cols()
            )));
        }
        Ok(())
    }
}

/// Scattered source samples (stations or the cells of a source grid).
#[derive(Debug, Clone, Default)]
pub struct ScatterDataset {
    pub values: Vec<f32>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Elevation of each sample, when the variable regresses on it.
    pub z: Option<Vec<f32>>,
    pub attributes: VariableAttributes,
}

impl ScatterDataset {
    /// Create a dataset from parallel arrays.
    pub fn new(values: Vec<f32>, x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        if values.len() != x.len() || values.len() != y.len() {
            return Err(RegridError::shape_mismatch(format!(
                "values ({}), x ({}) and y ({}) must have the same length",
                values.len(),
                x.len(),
                y.len()
            )));
        }
        Ok(Self {
            values,
            x,
            y,
            z: None,
            attributes: VariableAttributes::default(),
        })
    }

    /// Every cell of a grid as a sample, at the cell centers.
    pub fn from_grid(grid: &GeoGrid, values: Vec<f32>) -> Result<Self> {
        if values.len() != grid.len() {
            return Err(RegridError::shape_mismatch(format!(
                "grid has {} cells, got {} values",
                grid.len(),
                values.len()
            )));
        }
        Self::new(values, grid.coord_x().to_vec(), grid.coord_y().to_vec())
    }

    /// Attach elevations.
    pub fn with_z(mut self, z: Vec<f32>) -> Result<Self> {
        if z.len() != self.values.len() {
            return Err(RegridError::shape_mismatch(format!(
                "z has {} entries, values have {}",
                z.len(),
                self.values.len()
            )));
        }
        self.z = Some(z);
        Ok(self)
    }

    pub fn with_attributes(mut self, attributes: VariableAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Multiply every non-sentinel value by the `ScaleFactor` attribute.
    pub fn apply_scale_factor(&mut self) {
        let factor = self.attributes.scale_factor();
        if factor == 1.0 {
            return;
        }
        for v in self.values.iter_mut() {
            if !self.attributes.is_sentinel(*v) {
                *v = (*v as f64 * factor) as f32;
            }
        }
    }

    /// Samples that carry a usable value and, when `bbox` is given, lie
    /// inside it.
    pub fn valid_samples(&self, bbox: Option<&BoundingBox>) -> ScatterDataset {
        let keep: Vec<usize> = (0..self.len())
            .filter(|&i| {
                let v = self.values[i];
                if !v.is_finite() || self.attributes.is_sentinel(v) {
                    return false;
                }
                if !self.x[i].is_finite() || !self.y[i].is_finite() {
                    return false;
                }
                bbox.map_or(true, |b| b.contains_point(self.x[i], self.y[i]))
            })
            .collect();

        debug!(
            total = self.len(),
            kept = keep.len(),
            "Filtered source samples"
        );

        ScatterDataset {
            values: keep.iter().map(|&i| self.values[i]).collect(),
            x: keep.iter().map(|&i| self.x[i]).collect(),
            y: keep.iter().map(|&i| self.y[i]).collect(),
            z: self
                .z
                .as_ref()
                .map(|z| keep.iter().map(|&i| z[i]).collect()),
            attributes: self.attributes.clone(),
        }
    }
}

/// Result of regridding one variable at one time step.
#[derive(Debug, Clone, PartialEq)]
pub enum RegridOutcome {
    /// The filtered field.
    Field(Field),
    /// No usable input; `field` holds only the fill value.
    Empty { field: Field, reason: String },
}

impl RegridOutcome {
    /// The output field, whichever variant.
    pub fn field(&self) -> &Field {
        match self {
            Self::Field(field) | Self::Empty { field, .. } => field,
        }
    }

    pub fn into_field(self) -> Field {
        match self {
            Self::Field(field) | Self::Empty { field, .. } => field,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }
}
