//! Configuration for regridding.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use geo_grid::IndexOrder;
use serde::{Deserialize, Serialize};

use crate::error::{RegridError, Result};

/// Interpolation kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMethod {
    /// Value of the nearest sample inside the search ellipse.
    #[default]
    Nearest,
    /// Inverse distance weighting, power 2, no smoothing.
    Idw,
}

impl InterpolationMethod {
    /// Canonical lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Idw => "idw",
        }
    }
}

impl FromStr for InterpolationMethod {
    type Err = RegridError;

    /// Parse from string (case-insensitive). Unknown names are an error.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "idw" | "invdist" => Ok(Self::Idw),
            other => Err(RegridError::config(format!(
                "unknown interpolation method '{}' (expected 'nearest' or 'idw')",
                other
            ))),
        }
    }
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where point-to-raster gridding runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GriddingBackend {
    /// In-process kernels.
    #[default]
    Native,
    /// A command-line gridding utility (`gdal_grid`-compatible).
    External,
}

impl FromStr for GriddingBackend {
    type Err = RegridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "external" => Ok(Self::External),
            other => Err(RegridError::config(format!(
                "unknown gridding backend '{}' (expected 'native' or 'external')",
                other
            ))),
        }
    }
}

/// Elliptical search neighborhood in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchRadius {
    pub x: f64,
    pub y: f64,
}

impl SearchRadius {
    /// Create a radius, rejecting non-positive or non-finite axes.
    pub fn new(x: f64, y: f64) -> Result<Self> {
        if !(x > 0.0 && y > 0.0 && x.is_finite() && y.is_finite()) {
            return Err(RegridError::config(format!(
                "search radius must be positive and finite, got ({}, {})",
                x, y
            )));
        }
        Ok(Self { x, y })
    }

    /// Build from the optional per-axis radii a caller supplied.
    ///
    /// Both or neither must be set. IDW requires both.
    pub fn from_options(
        method: InterpolationMethod,
        radius_x: Option<f64>,
        radius_y: Option<f64>,
    ) -> Result<Option<Self>> {
        match (radius_x, radius_y) {
            (Some(x), Some(y)) => Self::new(x, y).map(Some),
            (None, None) if method == InterpolationMethod::Nearest => Ok(None),
            (None, None) => Err(RegridError::config(format!(
                "method '{}' requires radius_x and radius_y",
                method
            ))),
            _ => Err(RegridError::config(
                "radius_x and radius_y must be given together",
            )),
        }
    }

    /// Normalized elliptical distance squared; inside when <= 1.
    #[inline]
    pub fn normalized_sq(&self, dx: f64, dy: f64) -> f64 {
        let nx = dx / self.x;
        let ny = dy / self.y;
        nx * nx + ny * ny
    }

    #[inline]
    pub fn contains(&self, dx: f64, dy: f64) -> bool {
        self.normalized_sq(dx, dy) <= 1.0
    }
}

/// Configuration for the regridding pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegridConfig {
    /// Interpolation kernel.
    pub method: InterpolationMethod,

    /// Search radius along x in degrees. Required for IDW.
    pub radius_x: Option<f64>,

    /// Search radius along y in degrees. Required for IDW.
    pub radius_y: Option<f64>,

    /// Sentinel written to cells that receive no sample.
    pub no_data: f64,

    /// Gridding backend.
    pub backend: GriddingBackend,

    /// Executable used by the external backend.
    pub gridder_command: String,

    /// Wait budget for the external command, in seconds.
    pub process_timeout_secs: u64,

    /// How often the external command is polled, in milliseconds.
    pub process_poll_ms: u64,

    /// Directory for ancillary files (interpolation indices).
    pub cache_dir: Option<PathBuf>,

    /// Ignore and overwrite existing ancillary files.
    pub refresh_ancillary: bool,

    /// Flattening order handed to binary consumers.
    pub index_order: IndexOrder,
}

impl Default for RegridConfig {
    fn default() -> Self {
        Self {
            method: InterpolationMethod::Nearest,
            radius_x: None,
            radius_y: None,
            no_data: -9999.0,
            backend: GriddingBackend::Native,
            gridder_command: "gdal_grid".to_string(),
            process_timeout_secs: 600,
            process_poll_ms: 200,
            cache_dir: None,
            refresh_ancillary: false,
            index_order: IndexOrder::RowMajor,
        }
    }
}

impl RegridConfig {
    /// Load configuration from environment variables on top of the defaults.
    ///
    /// Malformed values are errors rather than silently ignored.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("REGRID_METHOD") {
            config.method = val.parse()?;
        }
        if let Some(val) = lookup("REGRID_RADIUS_X") {
            config.radius_x = Some(parse_env("REGRID_RADIUS_X", &val)?);
        }
        if let Some(val) = lookup("REGRID_RADIUS_Y") {
            config.radius_y = Some(parse_env("REGRID_RADIUS_Y", &val)?);
        }
        if let Some(val) = lookup("REGRID_NO_DATA") {
            config.no_data = parse_env("REGRID_NO_DATA", &val)?;
        }
        if let Some(val) = lookup("REGRID_BACKEND") {
            config.backend = val.parse()?;
        }
        if let Some(val) = lookup("REGRID_GRIDDER") {
            config.gridder_command = val;
        }
        if let Some(val) = lookup("REGRID_PROCESS_TIMEOUT_SECS") {
            config.process_timeout_secs = parse_env("REGRID_PROCESS_TIMEOUT_SECS", &val)?;
        }
        if let Some(val) = lookup("REGRID_CACHE_DIR") {
            config.cache_dir = Some(PathBuf::from(val));
        }
        if let Some(val) = lookup("REGRID_REFRESH_ANCILLARY") {
            config.refresh_ancillary = val.to_lowercase() == "true" || val == "1";
        }

        Ok(config)
    }

    /// Parse a YAML document; missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| RegridError::config(format!("invalid YAML config: {}", e)))?;
        Ok(config)
    }

    /// Read and parse a YAML configuration file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.search_radius()?;

        if self.process_timeout_secs == 0 {
            return Err(RegridError::config("process_timeout_secs must be > 0"));
        }
        if self.process_poll_ms == 0 {
            return Err(RegridError::config("process_poll_ms must be > 0"));
        }
        if self.backend == GriddingBackend::External && self.gridder_command.trim().is_empty() {
            return Err(RegridError::config(
                "external backend requires a gridder_command",
            ));
        }

        Ok(())
    }

    /// The configured search radius; errors when the method requires one.
    pub fn search_radius(&self) -> Result<Option<SearchRadius>> {
        SearchRadius::from_options(self.method, self.radius_x, self.radius_y)
    }
}

fn parse_env<T: FromStr>(key: &str, val: &str) -> Result<T> {
    val.trim()
        .parse()
        .map_err(|_| RegridError::config(format!("{} has invalid value '{}'", key, val)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = RegridConfig::default();
        assert_eq!(config.method, InterpolationMethod::Nearest);
        assert_eq!(config.no_data, -9999.0);
        assert_eq!(config.backend, GriddingBackend::Native);
        assert_eq!(config.gridder_command, "gdal_grid");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_method_from_str_is_strict() {
        assert_eq!(
            "NEAREST".parse::<InterpolationMethod>().unwrap(),
            InterpolationMethod::Nearest
        );
        assert_eq!(
            "idw".parse::<InterpolationMethod>().unwrap(),
            InterpolationMethod::Idw
        );
        assert!(matches!(
            "bilinear".parse::<InterpolationMethod>(),
            Err(RegridError::Config(_))
        ));
    }

    #[test]
    fn test_idw_requires_radius() {
        let config = RegridConfig {
            method: InterpolationMethod::Idw,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RegridError::Config(_))));

        let config = RegridConfig {
            method: InterpolationMethod::Idw,
            radius_x: Some(0.1),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RegridConfig {
            method: InterpolationMethod::Idw,
            radius_x: Some(0.1),
            radius_y: Some(0.2),
            ..Default::default()
        };
        assert_eq!(
            config.search_radius().unwrap(),
            Some(SearchRadius { x: 0.1, y: 0.2 })
        );
    }

    #[test]
    fn test_radius_must_be_positive() {
        assert!(SearchRadius::new(0.0, 1.0).is_err());
        assert!(SearchRadius::new(1.0, f64::NAN).is_err());
        let r = SearchRadius::new(2.0, 1.0).unwrap();
        assert!(r.contains(2.0, 0.0));
        assert!(!r.contains(0.0, 1.5));
    }

    #[test]
    fn test_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("REGRID_METHOD", "idw"),
            ("REGRID_RADIUS_X", "0.25"),
            ("REGRID_RADIUS_Y", "0.5"),
            ("REGRID_BACKEND", "external"),
            ("REGRID_REFRESH_ANCILLARY", "1"),
        ]
        .into_iter()
        .collect();
        let config = RegridConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.method, InterpolationMethod::Idw);
        assert_eq!(config.radius_x, Some(0.25));
        assert_eq!(config.backend, GriddingBackend::External);
        assert!(config.refresh_ancillary);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let bad_method = RegridConfig::from_lookup(|k| {
            (k == "REGRID_METHOD").then(|| "spline".to_string())
        });
        assert!(bad_method.is_err());

        let bad_radius = RegridConfig::from_lookup(|k| {
            (k == "REGRID_RADIUS_X").then(|| "wide".to_string())
        });
        assert!(bad_radius.is_err());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = "method: idw\nradius_x: 0.1\nradius_y: 0.1\ncache_dir: /tmp/regrid\nindex_order: column_major\n";
        let config = RegridConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.method, InterpolationMethod::Idw);
        assert_eq!(config.index_order, IndexOrder::ColumnMajor);
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/regrid")));
        assert_eq!(config.process_timeout_secs, 600);

        assert!(RegridConfig::from_yaml_str("method: kriging\n").is_err());
    }
}
