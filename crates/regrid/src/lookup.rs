//! Categorical flag reclassification.
//!
//! A [`LookupTable`] is built from the CF triple `flag_values`,
//! `flag_masks`, `flag_meanings`. Each value entry is a scalar or a
//! `min-max` range; the matching mask entry gives the code the range is
//! rewritten to. An entry whose mask equals its value range is an identity
//! and rewrites nothing.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attributes::VariableAttributes;
use crate::error::{RegridError, Result};

/// Closed interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    /// Build from one (`[v]`) or two (`[min, max]`) numbers.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let (min, max) = match values {
            [v] => (*v, *v),
            [min, max] => (*min, *max),
            other => {
                return Err(RegridError::attribute(format!(
                    "flag entry needs one or two numbers, got {}",
                    other.len()
                )))
            }
        };
        if min.is_nan() || max.is_nan() || min > max {
            return Err(RegridError::attribute(format!(
                "flag range [{}, {}] is invalid",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn is_scalar(&self) -> bool {
        self.min == self.max
    }
}

/// Rewrite target of a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FlagOutput {
    Scalar(f64),
    /// Present in flag tables but without defined semantics.
    Range(ValueRange),
}

/// One flag meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LutEntry {
    pub meaning: String,
    pub input: ValueRange,
    /// `None` when the entry is an identity.
    pub output: Option<FlagOutput>,
}

/// Ordered flag remapping table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupTable {
    entries: Vec<LutEntry>,
}

impl LookupTable {
    /// Build from parallel lists of value ranges, mask ranges and meanings.
    pub fn build(values: &[Vec<f64>], masks: &[Vec<f64>], meanings: &[String]) -> Result<Self> {
        if values.len() != masks.len() || values.len() != meanings.len() {
            return Err(RegridError::shape_mismatch(format!(
                "flag_values ({}), flag_masks ({}) and flag_meanings ({}) differ in length",
                values.len(),
                masks.len(),
                meanings.len()
            )));
        }

        let mut entries = Vec::with_capacity(values.len());
        for ((value, mask), meaning) in values.iter().zip(masks).zip(meanings) {
            let input = ValueRange::from_slice(value)?;
            let mask = ValueRange::from_slice(mask)?;
            let output = if input == mask {
                None
            } else if mask.is_scalar() {
                Some(FlagOutput::Scalar(mask.min))
            } else {
                Some(FlagOutput::Range(mask))
            };
            entries.push(LutEntry {
                meaning: meaning.clone(),
                input,
                output,
            });
        }

        Ok(Self { entries })
    }

    /// Build from CF flag attributes. `None` when the variable has no flags.
    pub fn from_attributes(attrs: &VariableAttributes) -> Result<Option<Self>> {
        let (values, masks, meanings) = match (
            attrs.flag_values.as_deref(),
            attrs.flag_masks.as_deref(),
            attrs.flag_meanings.as_deref(),
        ) {
            (Some(v), Some(m), Some(n)) => (v, m, n),
            (None, None, None) => return Ok(None),
            _ => {
                return Err(RegridError::attribute(
                    "flag_values, flag_masks and flag_meanings must be given together",
                ))
            }
        };

        let values = parse_flag_list(values)?;
        let masks = parse_flag_list(masks)?;
        let meanings: Vec<String> = meanings.split_whitespace().map(str::to_string).collect();
        Self::build(&values, &masks, &meanings).map(Some)
    }

    pub fn entries(&self) -> &[LutEntry] {
        &self.entries
    }

    pub fn get(&self, meaning: &str) -> Option<&LutEntry> {
        self.entries.iter().find(|e| e.meaning == meaning)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when no entry rewrites anything.
    pub fn is_identity(&self) -> bool {
        self.entries.iter().all(|e| e.output.is_none())
    }

    /// Remap `data`, returning a new array.
    pub fn apply(&self, data: &[f32]) -> Result<Vec<f32>> {
        let mut out = data.to_vec();
        self.apply_in_place(&mut out)?;
        Ok(out)
    }

    /// Remap `data` in place and return the number of rewritten cells.
    ///
    /// Each cell is matched on its original value against the entries in
    /// order; the first matching entry decides.
    pub fn apply_in_place(&self, data: &mut [f32]) -> Result<usize> {
        if let Some(entry) = self
            .entries
            .iter()
            .find(|e| matches!(e.output, Some(FlagOutput::Range(_))))
        {
            return Err(RegridError::UnsupportedRangeRemap(entry.meaning.clone()));
        }
        if self.is_identity() {
            return Ok(0);
        }

        let mut rewritten = 0;
        for v in data.iter_mut() {
            let value = *v as f64;
            let Some(entry) = self.entries.iter().find(|e| e.input.contains(value)) else {
                continue;
            };
            if let Some(FlagOutput::Scalar(code)) = entry.output {
                *v = code as f32;
                rewritten += 1;
            }
        }

        debug!(cells = data.len(), rewritten, "Applied flag lookup table");
        Ok(rewritten)
    }
}

/// Parse `"0, 1-100, 201"` into `[[0], [1, 100], [201]]`.
fn parse_flag_list(s: &str) -> Result<Vec<Vec<f64>>> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(parse_flag_token)
        .collect()
}

fn parse_flag_token(token: &str) -> Result<Vec<f64>> {
    let parse = |t: &str| {
        t.trim()
            .parse::<f64>()
            .map_err(|_| RegridError::attribute(format!("invalid flag value '{}'", token)))
    };
    // A leading '-' is a sign and a '-' after an exponent marker belongs to
    // the literal; neither separates a range.
    let mut prev = None;
    let mut separator = None;
    for (pos, c) in token.char_indices() {
        if c == '-' && !matches!(prev, None | Some('e') | Some('E')) {
            separator = Some(pos);
            break;
        }
        prev = Some(c);
    }
    match separator {
        Some(pos) => {
            let (lo, hi) = token.split_at(pos);
            Ok(vec![parse(lo)?, parse(&hi[1..])?])
        }
        None => Ok(vec![parse(token)?]),
    }
}
