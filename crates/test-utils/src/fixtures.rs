//! Common test fixtures for regridding tests.

/// Common extents as (min_x, min_y, max_x, max_y) in degrees.
pub mod bbox {
    /// Liguria region, the typical flood-forecasting domain
    pub const LIGURIA: (f64, f64, f64, f64) = (7.4, 43.7, 10.1, 44.7);

    /// Invalid extent (min > max)
    pub const INVALID: (f64, f64, f64, f64) = (10.0, 10.0, 5.0, 5.0);
}

/// Reference raster headers as (ncols, nrows, xllcorner, yllcorner, cellsize, nodata).
pub mod header {
    /// A 4x4 raster with unit cells anchored at the origin
    pub const UNIT_4X4: (usize, usize, f64, f64, f64, f64) = (4, 4, 0.0, 0.0, 1.0, -9999.0);

    /// A Liguria-like domain at 0.05 degree resolution
    pub const LIGURIA_005: (usize, usize, f64, f64, f64, f64) =
        (54, 20, 7.4, 43.7, 0.05, -9999.0);
}

/// Satellite QC flag tables as CF attribute strings.
pub mod flags {
    /// Snow cover product: values and target masks
    pub const SNOW_FLAG_VALUES: &str = "0, 1-100, 201, 237, 239, 250";
    pub const SNOW_FLAG_MASKS: &str = "0, 1, 201, 237, 239, 250";
    pub const SNOW_FLAG_MEANINGS: &str = "no_snow snow missing inland_water ocean cloud";
}

/// A variable conventions table in YAML form.
pub const CONVENTIONS_YAML: &str = r#"
air_temperature:
  long_name: air temperature
  units: C
  Missing_value: -9999.0
  _FillValue: -9999.0
  Valid_range: [-50.0, 50.0]
  ScaleFactor: 1
snow_cover:
  long_name: snow cover area
  units: "-"
  Missing_value: -7777.0
  _FillValue: -9999.0
  Valid_range: [0.0, 250.0]
  ScaleFactor: 1
  flag_values: "0, 1-100, 201, 237, 239, 250"
  flag_masks: "0, 1, 201, 237, 239, 250"
  flag_meanings: "no_snow snow missing inland_water ocean cloud"
"#;
