//! The reference grid (domain) that every product is resampled onto.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::bbox::{BboxSpec, BoundingBox};
use crate::cache::{get_or_compute, JsonCodec};
use crate::error::{GeoGridError, Result};
use crate::header::{AsciiRaster, GridHeader, DEFAULT_NO_DATA};

/// Name given to the primary layer of a grid built from a bounding box.
pub const DOMAIN_LAYER: &str = "domain";

/// Flattening order for cell indices.
///
/// The interpolation step works in row-major ("C") order, while some
/// binary consumers expect column-major ("F") order, so callers pick one
/// explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexOrder {
    #[default]
    RowMajor,
    ColumnMajor,
}

/// A regular lat/lon raster domain.
///
/// Extents are cell *centers*. Row 0 is the northernmost row, so
/// `coord_y` decreases down the rows while `coord_x` increases along them.
/// Everything except the attached layers is fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GeoGridRecord", into = "GeoGridRecord")]
pub struct GeoGrid {
    rows: usize,
    cols: usize,
    x_min: f64,
    y_min: f64,
    x_max: f64,
    y_max: f64,
    cell_size_x: f64,
    cell_size_y: f64,
    no_data_value: f64,
    layer_name: String,
    data: Vec<f32>,
    layers: BTreeMap<String, Vec<f32>>,

    // Derived from the fields above.
    mask_finite: Vec<bool>,
    index_finite: Vec<usize>,
    index_nan: Vec<usize>,
    coord_x: Vec<f64>,
    coord_y: Vec<f64>,
}

/// Persisted form of a [`GeoGrid`]; derived arrays are rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeoGridRecord {
    rows: usize,
    cols: usize,
    x_min: f64,
    y_min: f64,
    x_max: f64,
    y_max: f64,
    cell_size_x: f64,
    cell_size_y: f64,
    /// `None` stands for a NaN sentinel.
    no_data_value: Option<f64>,
    layer_name: String,
    data: CellValues,
    #[serde(default)]
    layers: BTreeMap<String, CellValues>,
}

/// Cell values with non-finite entries written as `null`, which JSON can
/// carry; they read back as NaN.
#[derive(Debug, Clone, PartialEq)]
struct CellValues(Vec<f32>);

impl Serialize for CellValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(|v| v.is_finite().then_some(*v)))
    }
}

impl<'de> Deserialize<'de> for CellValues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Vec::<Option<f32>>::deserialize(deserializer)?;
        Ok(Self(raw.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect()))
    }
}

impl From<GeoGrid> for GeoGridRecord {
    fn from(grid: GeoGrid) -> Self {
        Self {
            rows: grid.rows,
            cols: grid.cols,
            x_min: grid.x_min,
            y_min: grid.y_min,
            x_max: grid.x_max,
            y_max: grid.y_max,
            cell_size_x: grid.cell_size_x,
            cell_size_y: grid.cell_size_y,
            no_data_value: (!grid.no_data_value.is_nan()).then_some(grid.no_data_value),
            layer_name: grid.layer_name,
            data: CellValues(grid.data),
            layers: grid
                .layers
                .into_iter()
                .map(|(name, layer)| (name, CellValues(layer)))
                .collect(),
        }
    }
}

impl TryFrom<GeoGridRecord> for GeoGrid {
    type Error = GeoGridError;

    fn try_from(record: GeoGridRecord) -> Result<Self> {
        let mut grid = GeoGrid::assemble(
            record.rows,
            record.cols,
            (record.x_min, record.y_min, record.x_max, record.y_max),
            (record.cell_size_x, record.cell_size_y),
            record.no_data_value.unwrap_or(f64::NAN),
            record.layer_name,
            record.data.0,
        )?;
        for (name, CellValues(layer)) in record.layers {
            if layer.len() != grid.len() {
                return Err(GeoGridError::geo_data(format!(
                    "layer '{}' has {} cells, grid has {}",
                    name,
                    layer.len(),
                    grid.len()
                )));
            }
            grid.layers.insert(name, layer);
        }
        Ok(grid)
    }
}

impl GeoGrid {
    /// Build a grid from a decoded reference raster.
    ///
    /// Corner coordinates in the header are converted to cell centers.
    /// Cells equal to the header's no-data value (or NaN) form the
    /// no-data mask.
    pub fn from_header(
        header: GridHeader,
        values: Vec<f32>,
        layer_name: impl Into<String>,
    ) -> Result<Self> {
        header.validate()?;
        let (dx, dy) = (header.cell_size_x(), header.cell_size_y());
        let x_min = header.xllcorner + dx / 2.0;
        let y_min = header.yllcorner + dy / 2.0;
        let x_max = x_min + (header.ncols - 1) as f64 * dx;
        let y_max = y_min + (header.nrows - 1) as f64 * dy;

        Self::assemble(
            header.nrows,
            header.ncols,
            (x_min, y_min, x_max, y_max),
            (dx, dy),
            header.nodata_value,
            layer_name.into(),
            values,
        )
    }

    /// Build a grid from an ASCII reference raster on disk.
    pub fn build_from_raster<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raster = AsciiRaster::read(path)?;
        let layer_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(DOMAIN_LAYER)
            .to_string();
        let grid = Self::from_header(raster.header, raster.values, layer_name)?;
        info!(
            path = %path.display(),
            rows = grid.rows,
            cols = grid.cols,
            valid_cells = grid.index_finite.len(),
            "Built reference grid from raster"
        );
        Ok(grid)
    }

    /// Build an all-valid grid from a bounding box and cell sizes.
    ///
    /// Rows and columns are `round((max - min) / step + 1)`.
    pub fn build_from_bbox(spec: &BboxSpec) -> Result<Self> {
        spec.validate()?;
        let (rows, cols) = spec.shape();
        let bbox = spec.bbox;
        let grid = Self::assemble(
            rows,
            cols,
            (bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y),
            (spec.cell_size_x, spec.cell_size_y),
            DEFAULT_NO_DATA,
            DOMAIN_LAYER.to_string(),
            vec![1.0; rows * cols],
        )?;
        info!(rows, cols, "Built reference grid from bounding box");
        Ok(grid)
    }

    /// Like [`build_from_raster`](Self::build_from_raster), memoized at `cache_path`.
    pub fn build_from_raster_cached<P, Q>(path: P, cache_path: Q, refresh: bool) -> Result<Self>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        get_or_compute(cache_path, refresh, &JsonCodec, || {
            Self::build_from_raster(path.as_ref())
        })
    }

    /// Like [`build_from_bbox`](Self::build_from_bbox), memoized at `cache_path`.
    pub fn build_from_bbox_cached<Q: AsRef<Path>>(
        spec: &BboxSpec,
        cache_path: Q,
        refresh: bool,
    ) -> Result<Self> {
        get_or_compute(cache_path, refresh, &JsonCodec, || Self::build_from_bbox(spec))
    }

    fn assemble(
        rows: usize,
        cols: usize,
        (x_min, y_min, x_max, y_max): (f64, f64, f64, f64),
        (cell_size_x, cell_size_y): (f64, f64),
        no_data_value: f64,
        layer_name: String,
        data: Vec<f32>,
    ) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(GeoGridError::empty_domain(format!(
                "grid has {} rows and {} cols",
                rows, cols
            )));
        }
        if !(x_min < x_max || cols == 1) || !(y_min < y_max || rows == 1) {
            return Err(GeoGridError::geo_data(format!(
                "extent corners out of order: x {}..{}, y {}..{}",
                x_min, x_max, y_min, y_max
            )));
        }
        if !(cell_size_x > 0.0 && cell_size_y > 0.0) {
            return Err(GeoGridError::geo_data(format!(
                "cell sizes must be > 0, got ({}, {})",
                cell_size_x, cell_size_y
            )));
        }
        if no_data_value.is_infinite() {
            return Err(GeoGridError::geo_data(format!(
                "no-data value must be finite or NaN, got {}",
                no_data_value
            )));
        }
        if data.len() != rows * cols {
            return Err(GeoGridError::geo_data(format!(
                "data has {} cells, expected {}x{}",
                data.len(),
                rows,
                cols
            )));
        }

        let mask_finite: Vec<bool> = data
            .iter()
            .map(|&v| !is_no_data(v, no_data_value))
            .collect();
        let (index_finite, index_nan): (Vec<usize>, Vec<usize>) =
            (0..mask_finite.len()).partition(|&i| mask_finite[i]);

        let mut coord_x = Vec::with_capacity(rows * cols);
        let mut coord_y = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            let y = y_max - row as f64 * cell_size_y;
            for col in 0..cols {
                coord_x.push(x_min + col as f64 * cell_size_x);
                coord_y.push(y);
            }
        }

        debug!(
            rows,
            cols,
            finite = index_finite.len(),
            nan = index_nan.len(),
            "Derived grid masks"
        );

        Ok(Self {
            rows,
            cols,
            x_min,
            y_min,
            x_max,
            y_max,
            cell_size_x,
            cell_size_y,
            no_data_value,
            layer_name,
            data,
            layers: BTreeMap::new(),
            mask_finite,
            index_finite,
            index_nan,
            coord_x,
            coord_y,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Always false for a constructed grid; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    pub fn y_min(&self) -> f64 {
        self.y_min
    }

    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    pub fn y_max(&self) -> f64 {
        self.y_max
    }

    pub fn cell_size_x(&self) -> f64 {
        self.cell_size_x
    }

    pub fn cell_size_y(&self) -> f64 {
        self.cell_size_y
    }

    pub fn no_data_value(&self) -> f64 {
        self.no_data_value
    }

    /// Name of the primary data layer.
    pub fn layer_name(&self) -> &str {
        &self.layer_name
    }

    /// Primary data layer, row-major.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Look up a layer by name; the primary layer answers to its own name.
    pub fn layer(&self, name: &str) -> Option<&[f32]> {
        if name == self.layer_name {
            Some(&self.data)
        } else {
            self.layers.get(name).map(Vec::as_slice)
        }
    }

    /// Names of the layers attached through [`merge`](Self::merge).
    pub fn attached_layers(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    /// Cell-center longitudes, row-major.
    pub fn coord_x(&self) -> &[f64] {
        &self.coord_x
    }

    /// Cell-center latitudes, row-major, north row first.
    pub fn coord_y(&self) -> &[f64] {
        &self.coord_y
    }

    /// True for cells inside the physical domain.
    pub fn mask_finite(&self) -> &[bool] {
        &self.mask_finite
    }

    /// True for cells outside the physical domain.
    pub fn mask_nan(&self) -> Vec<bool> {
        self.mask_finite.iter().map(|&m| !m).collect()
    }

    /// Flattened positions of in-domain cells.
    pub fn index_finite(&self, order: IndexOrder) -> Vec<usize> {
        self.reorder(&self.index_finite, order)
    }

    /// Flattened positions of out-of-domain cells.
    pub fn index_nan(&self, order: IndexOrder) -> Vec<usize> {
        self.reorder(&self.index_nan, order)
    }

    /// Flattened index of `(row, col)` in the requested order.
    pub fn flat_index(&self, row: usize, col: usize, order: IndexOrder) -> usize {
        match order {
            IndexOrder::RowMajor => row * self.cols + col,
            IndexOrder::ColumnMajor => col * self.rows + row,
        }
    }

    fn reorder(&self, row_major: &[usize], order: IndexOrder) -> Vec<usize> {
        match order {
            IndexOrder::RowMajor => row_major.to_vec(),
            IndexOrder::ColumnMajor => {
                let mut out: Vec<usize> = row_major
                    .iter()
                    .map(|&i| self.flat_index(i / self.cols, i % self.cols, order))
                    .collect();
                out.sort_unstable();
                out
            }
        }
    }

    /// Center coordinates of a cell.
    pub fn cell_center(&self, row: usize, col: usize) -> Option<(f64, f64)> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some((
            self.x_min + col as f64 * self.cell_size_x,
            self.y_max - row as f64 * self.cell_size_y,
        ))
    }

    /// The cell whose footprint contains `(x, y)`.
    pub fn locate(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let col = ((x - self.x_min) / self.cell_size_x).round();
        let row = ((self.y_max - y) / self.cell_size_y).round();
        if col < 0.0 || row < 0.0 || !col.is_finite() || !row.is_finite() {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if row < self.rows && col < self.cols {
            Some((row, col))
        } else {
            None
        }
    }

    /// Extent of the cell centers.
    pub fn center_bbox(&self) -> BoundingBox {
        BoundingBox::new(self.x_min, self.y_min, self.x_max, self.y_max)
    }

    /// Extent of the cell edges.
    pub fn edge_bbox(&self) -> BoundingBox {
        self.center_bbox()
            .expand(self.cell_size_x / 2.0, self.cell_size_y / 2.0)
    }

    /// Re-derive the raster header. Non-square cells set `cellsize_y`.
    pub fn header(&self) -> GridHeader {
        GridHeader {
            ncols: self.cols,
            nrows: self.rows,
            xllcorner: self.x_min - self.cell_size_x / 2.0,
            yllcorner: self.y_min - self.cell_size_y / 2.0,
            cellsize: self.cell_size_x,
            cellsize_y: (self.cell_size_y != self.cell_size_x).then_some(self.cell_size_y),
            nodata_value: self.no_data_value,
        }
    }

    /// Check that `other` describes exactly the same domain.
    pub fn ensure_same_domain(&self, other: &GeoGrid) -> Result<()> {
        let ints = [("rows", self.rows, other.rows), ("cols", self.cols, other.cols)];
        for (field, left, right) in ints {
            if left != right {
                return Err(GeoGridError::domain_mismatch(field, left, right));
            }
        }
        let floats = [
            ("x_min", self.x_min, other.x_min),
            ("y_min", self.y_min, other.y_min),
            ("x_max", self.x_max, other.x_max),
            ("y_max", self.y_max, other.y_max),
            ("cell_size_x", self.cell_size_x, other.cell_size_x),
            ("cell_size_y", self.cell_size_y, other.cell_size_y),
            ("no_data_value", self.no_data_value, other.no_data_value),
        ];
        for (field, left, right) in floats {
            let same = left == right || (left.is_nan() && right.is_nan());
            if !same {
                return Err(GeoGridError::domain_mismatch(field, left, right));
            }
        }
        Ok(())
    }

    /// Attach `other`'s layers to a copy of this grid.
    ///
    /// Both headers must match field for field. The masks of `self` are kept.
    pub fn merge(&self, other: &GeoGrid) -> Result<GeoGrid> {
        self.ensure_same_domain(other)?;

        let mut merged = self.clone();
        let incoming = std::iter::once((other.layer_name.clone(), other.data.clone()))
            .chain(other.layers.clone());
        for (name, layer) in incoming {
            if name == merged.layer_name {
                warn!(layer = %name, "Merge skipped layer with the primary layer's name");
                continue;
            }
            if merged.layers.insert(name.clone(), layer).is_some() {
                warn!(layer = %name, "Merge replaced an existing layer");
            }
        }
        debug!(
            primary = %merged.layer_name,
            layers = merged.layers.len(),
            "Merged grid layers"
        );
        Ok(merged)
    }
}

/// True when `value` is not finite or equal to the no-data sentinel.
pub fn is_no_data(value: f32, no_data_value: f64) -> bool {
    !value.is_finite() || (value as f64) == no_data_value
}
