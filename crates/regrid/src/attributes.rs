//! CF variable attributes, conventions tables and the time axis encoding.
//!
//! Attribute names follow the output NetCDF contract exactly
//! (`Missing_value`, `_FillValue`, `Valid_range`, `ScaleFactor`, ...), so a
//! conventions YAML file can be written with the same keys the writer emits.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RegridError, Result};

/// Attribute set of one output variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,

    #[serde(
        rename = "Missing_value",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub missing_value: Option<f64>,

    #[serde(rename = "_FillValue", default, skip_serializing_if = "Option::is_none")]
    pub fill_value: Option<f64>,

    #[serde(rename = "Valid_range", default, skip_serializing_if = "Option::is_none")]
    pub valid_range: Option<[f64; 2]>,

    #[serde(rename = "ScaleFactor", default, skip_serializing_if = "Option::is_none")]
    pub scale_factor: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag_values: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag_masks: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag_meanings: Option<String>,

    /// Raw palette-file text embedded as an attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colormap: Option<String>,
}

impl VariableAttributes {
    /// Valid range as `(lo, hi)`, rejecting an inverted pair.
    pub fn valid_range(&self) -> Result<Option<(f64, f64)>> {
        match self.valid_range {
            Some([lo, hi]) if lo > hi => Err(RegridError::attribute(format!(
                "Valid_range [{}, {}] is inverted",
                lo, hi
            ))),
            Some([lo, hi]) => Ok(Some((lo, hi))),
            None => Ok(None),
        }
    }

    /// Scale factor, 1.0 when absent.
    pub fn scale_factor(&self) -> f64 {
        self.scale_factor.unwrap_or(1.0)
    }

    /// True when the full flag triple is present.
    pub fn has_flags(&self) -> bool {
        self.flag_values.is_some() && self.flag_masks.is_some() && self.flag_meanings.is_some()
    }

    /// True when `value` equals the fill or missing sentinel, or is NaN.
    pub fn is_sentinel(&self, value: f32) -> bool {
        if value.is_nan() {
            return true;
        }
        let v = value as f64;
        self.fill_value == Some(v) || self.missing_value == Some(v)
    }
}

/// Immutable table of variable conventions, keyed by variable name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableConventions {
    variables: BTreeMap<String, VariableAttributes>,
}

impl VariableConventions {
    pub fn new(variables: BTreeMap<String, VariableAttributes>) -> Self {
        Self { variables }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    pub fn get(&self, name: &str) -> Option<&VariableAttributes> {
        self.variables.get(name)
    }

    /// Like [`get`](Self::get), but a missing variable is an error.
    pub fn require(&self, name: &str) -> Result<&VariableAttributes> {
        self.get(name).ok_or_else(|| {
            RegridError::attribute(format!("no conventions for variable '{}'", name))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// Unit of a CF time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn seconds(&self) -> i64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 3_600,
            Self::Days => 86_400,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
        }
    }
}

/// A CF `units` string for the time variable, e.g. `days since 1990-1-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfTimeUnits {
    pub unit: TimeUnit,
    pub epoch: DateTime<Utc>,
}

impl CfTimeUnits {
    /// Parse `<unit> since <date>[ <time>]`.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.trim().splitn(3, ' ');
        let unit = parts.next().unwrap_or_default();
        let since = parts.next().unwrap_or_default();
        let reference = parts.next().unwrap_or_default().trim();

        if !since.eq_ignore_ascii_case("since") || reference.is_empty() {
            return Err(RegridError::attribute(format!(
                "time units '{}' are not of the form '<unit> since <date>'",
                s
            )));
        }

        let unit = match unit.to_lowercase().as_str() {
            "seconds" | "second" | "s" => TimeUnit::Seconds,
            "minutes" | "minute" | "min" => TimeUnit::Minutes,
            "hours" | "hour" | "h" => TimeUnit::Hours,
            "days" | "day" | "d" => TimeUnit::Days,
            other => {
                return Err(RegridError::attribute(format!(
                    "unsupported time unit '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            unit,
            epoch: parse_reference(reference)?,
        })
    }

    /// Offset of `time` from the epoch, in this axis' unit.
    pub fn encode(&self, time: DateTime<Utc>) -> f64 {
        let elapsed = time.signed_duration_since(self.epoch);
        elapsed.num_seconds() as f64 / self.unit.seconds() as f64
    }

    /// Inverse of [`encode`](Self::encode), to the nearest second.
    pub fn decode(&self, value: f64) -> Result<DateTime<Utc>> {
        let seconds = (value * self.unit.seconds() as f64).round();
        if !seconds.is_finite() || seconds.abs() > i64::MAX as f64 {
            return Err(RegridError::attribute(format!(
                "time value {} is out of range",
                value
            )));
        }
        let delta = chrono::Duration::try_seconds(seconds as i64).ok_or_else(|| {
            RegridError::attribute(format!("time value {} is out of range", value))
        })?;
        self.epoch
            .checked_add_signed(delta)
            .ok_or_else(|| RegridError::attribute(format!("time value {} is out of range", value)))
    }
}

impl std::fmt::Display for CfTimeUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} since {}",
            self.unit.as_str(),
            self.epoch.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

fn parse_reference(reference: &str) -> Result<DateTime<Utc>> {
    let trimmed = reference.trim_end_matches('Z').trim_end_matches(" UTC");

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(RegridError::attribute(format!(
        "unparseable reference date '{}'",
        reference
    )))
}
