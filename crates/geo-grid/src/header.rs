//! ASCII reference raster header and codec.
//!
//! The static reference grid is an ESRI ASCII grid:
//!
//! ```text
//! ncols        4
//! nrows        3
//! xllcorner    6.5
//! yllcorner    43.5
//! cellsize     0.25
//! NODATA_value -9999
//! 1 2 3 4
//! ...
//! ```
//!
//! Rows are stored north first. Corners refer to the lower-left corner of
//! the lower-left cell; `xllcenter`/`yllcenter` are accepted and converted.
//! Non-square cells use `dx`/`dy` in place of `cellsize`, as GDAL's AAIGrid
//! driver writes them.

use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GeoGridError, Result};

/// Default no-data sentinel when a raster omits `NODATA_value`.
pub const DEFAULT_NO_DATA: f64 = -9999.0;

/// Header of a reference raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridHeader {
    pub ncols: usize,
    pub nrows: usize,
    pub xllcorner: f64,
    pub yllcorner: f64,
    /// Cell size, or the x cell size when `cellsize_y` is set.
    pub cellsize: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cellsize_y: Option<f64>,
    pub nodata_value: f64,
}

impl GridHeader {
    pub fn cell_size_x(&self) -> f64 {
        self.cellsize
    }

    pub fn cell_size_y(&self) -> f64 {
        self.cellsize_y.unwrap_or(self.cellsize)
    }

    pub fn is_square(&self) -> bool {
        self.cell_size_x() == self.cell_size_y()
    }

    /// Check the header describes a non-empty grid with positive cell sizes.
    pub fn validate(&self) -> Result<()> {
        if self.ncols == 0 || self.nrows == 0 {
            return Err(GeoGridError::geo_data(format!(
                "raster has {} rows and {} cols",
                self.nrows, self.ncols
            )));
        }
        for size in [self.cell_size_x(), self.cell_size_y()] {
            if !(size > 0.0) || !size.is_finite() {
                return Err(GeoGridError::geo_data(format!("invalid cellsize {}", size)));
            }
        }
        if !self.xllcorner.is_finite() || !self.yllcorner.is_finite() {
            return Err(GeoGridError::geo_data("lower-left corner is not finite"));
        }
        Ok(())
    }
}

/// A decoded reference raster: header plus row-major values (north row first).
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiRaster {
    pub header: GridHeader,
    pub values: Vec<f32>,
}

impl AsciiRaster {
    /// Read and parse an ASCII raster from disk.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            GeoGridError::geo_data(format!("cannot read raster {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    /// Parse an ASCII raster from text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut ncols = None;
        let mut nrows = None;
        let mut xll = None;
        let mut yll = None;
        let mut x_is_center = false;
        let mut y_is_center = false;
        let mut cellsize = None;
        let mut dx = None;
        let mut dy = None;
        let mut nodata = None;

        let mut lines = text.lines().peekable();
        while let Some(&line) = lines.peek() {
            let mut parts = line.split_whitespace();
            let key = match parts.next() {
                Some(key) => key.to_ascii_lowercase(),
                None => {
                    lines.next();
                    continue;
                }
            };
            if !key.starts_with(|c: char| c.is_ascii_alphabetic()) || key == "nan" {
                break;
            }
            let value = parts.next().ok_or_else(|| {
                GeoGridError::geo_data(format!("header key '{}' has no value", key))
            })?;
            match key.as_str() {
                "ncols" => ncols = Some(parse_count(&key, value)?),
                "nrows" => nrows = Some(parse_count(&key, value)?),
                "xllcorner" => xll = Some(parse_float(&key, value)?),
                "yllcorner" => yll = Some(parse_float(&key, value)?),
                "xllcenter" => {
                    xll = Some(parse_float(&key, value)?);
                    x_is_center = true;
                }
                "yllcenter" => {
                    yll = Some(parse_float(&key, value)?);
                    y_is_center = true;
                }
                "cellsize" => cellsize = Some(parse_float(&key, value)?),
                "dx" => dx = Some(parse_float(&key, value)?),
                "dy" => dy = Some(parse_float(&key, value)?),
                "nodata_value" => nodata = Some(parse_float(&key, value)?),
                other => {
                    return Err(GeoGridError::geo_data(format!(
                        "unknown header key '{}'",
                        other
                    )))
                }
            }
            lines.next();
        }

        let (size_x, size_y) = match (cellsize, dx, dy) {
            (Some(size), None, None) => (size, size),
            (None, Some(x), Some(y)) => (x, y),
            (None, None, None) => return Err(missing("cellsize")),
            (None, Some(_), None) => return Err(missing("dy")),
            (None, None, Some(_)) => return Err(missing("dx")),
            _ => {
                return Err(GeoGridError::geo_data(
                    "raster header has both cellsize and dx/dy",
                ))
            }
        };
        let mut xllcorner = xll.ok_or_else(|| missing("xllcorner"))?;
        let mut yllcorner = yll.ok_or_else(|| missing("yllcorner"))?;
        if x_is_center {
            xllcorner -= size_x / 2.0;
        }
        if y_is_center {
            yllcorner -= size_y / 2.0;
        }

        let header = GridHeader {
            ncols: ncols.ok_or_else(|| missing("ncols"))?,
            nrows: nrows.ok_or_else(|| missing("nrows"))?,
            xllcorner,
            yllcorner,
            cellsize: size_x,
            cellsize_y: (size_y != size_x).then_some(size_y),
            nodata_value: nodata.unwrap_or(DEFAULT_NO_DATA),
        };
        header.validate()?;

        let expected = header.nrows * header.ncols;
        let mut values = Vec::with_capacity(expected);
        for line in lines {
            for token in line.split_whitespace() {
                let value = token.parse::<f32>().map_err(|_| {
                    GeoGridError::geo_data(format!("invalid raster value '{}'", token))
                })?;
                values.push(value);
            }
        }

        if values.len() != expected {
            return Err(GeoGridError::geo_data(format!(
                "raster body has {} values, header expects {}x{} = {}",
                values.len(),
                header.nrows,
                header.ncols,
                expected
            )));
        }

        Ok(Self { header, values })
    }

    /// Render as ASCII raster text.
    pub fn to_ascii(&self) -> String {
        let h = &self.header;
        let mut out = String::with_capacity(h.nrows * h.ncols * 8 + 128);
        // Writing into a String cannot fail.
        let _ = writeln!(out, "ncols        {}", h.ncols);
        let _ = writeln!(out, "nrows        {}", h.nrows);
        let _ = writeln!(out, "xllcorner    {}", h.xllcorner);
        let _ = writeln!(out, "yllcorner    {}", h.yllcorner);
        if h.is_square() {
            let _ = writeln!(out, "cellsize     {}", h.cellsize);
        } else {
            let _ = writeln!(out, "dx           {}", h.cell_size_x());
            let _ = writeln!(out, "dy           {}", h.cell_size_y());
        }
        let _ = writeln!(out, "NODATA_value {}", h.nodata_value);
        for row in self.values.chunks(h.ncols.max(1)) {
            let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            let _ = writeln!(out, "{}", line.join(" "));
        }
        out
    }

    /// Write as ASCII raster text.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_ascii())?;
        Ok(())
    }
}

fn missing(key: &str) -> GeoGridError {
    GeoGridError::geo_data(format!("raster header is missing '{}'", key))
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value
        .parse::<usize>()
        .map_err(|_| GeoGridError::geo_data(format!("invalid {} '{}'", key, value)))
}

fn parse_float(key: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|_| GeoGridError::geo_data(format!("invalid {} '{}'", key, value)))
}
