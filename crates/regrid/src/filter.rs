//! Post-interpolation domain filtering.

use geo_grid::GeoGrid;
use tracing::debug;

use crate::attributes::VariableAttributes;
use crate::error::{RegridError, Result};
use crate::types::Field;

/// Masks out-of-domain cells and enforces a valid range.
///
/// `fill_value` marks cells outside the physical domain; `missing_value`
/// marks in-domain cells whose value is absent or implausible. Domain fill
/// runs first, so an out-of-domain cell is never flagged missing and an
/// in-domain cell never stays NaN. With a valid range, an in-domain cell
/// left at `fill_value` (unobserved or non-finite) is out of range like
/// any other value and becomes `missing_value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainFilter {
    pub fill_value: f64,
    pub missing_value: f64,
    pub valid_range: Option<(f64, f64)>,
}

impl DomainFilter {
    pub fn new(fill_value: f64, missing_value: f64) -> Self {
        Self {
            fill_value,
            missing_value,
            valid_range: None,
        }
    }

    /// Restrict in-domain values to `[lo, hi]`.
    pub fn with_valid_range(mut self, lo: f64, hi: f64) -> Result<Self> {
        if lo.is_nan() || hi.is_nan() || lo > hi {
            return Err(RegridError::config(format!(
                "valid range [{}, {}] is invalid",
                lo, hi
            )));
        }
        self.valid_range = Some((lo, hi));
        Ok(self)
    }

    /// Filter described by a variable's `_FillValue`, `Missing_value` and
    /// `Valid_range`. Absent sentinels default to `default_no_data`.
    pub fn from_attributes(attrs: &VariableAttributes, default_no_data: f64) -> Result<Self> {
        let fill = attrs.fill_value.unwrap_or(default_no_data);
        let missing = attrs.missing_value.unwrap_or(fill);
        let filter = Self::new(fill, missing);
        match attrs.valid_range()? {
            Some((lo, hi)) => filter.with_valid_range(lo, hi),
            None => Ok(filter),
        }
    }

    /// Filter `interpolated` against `grid`, returning a new field.
    pub fn apply(&self, interpolated: &Field, grid: &GeoGrid) -> Result<Field> {
        let mut out = interpolated.clone();
        self.apply_in_place(&mut out, grid)?;
        Ok(out)
    }

    /// Filter in place. Applying twice gives the same result as once.
    pub fn apply_in_place(&self, field: &mut Field, grid: &GeoGrid) -> Result<()> {
        field.ensure_shape_of(grid)?;

        let fill = self.fill_value as f32;
        let missing = self.missing_value as f32;
        let mut outside = 0usize;
        let mut non_finite = 0usize;
        let mut out_of_range = 0usize;

        for (v, &in_domain) in field.data.iter_mut().zip(grid.mask_finite()) {
            if !in_domain {
                *v = fill;
                outside += 1;
                continue;
            }
            if !v.is_finite() {
                *v = fill;
                non_finite += 1;
                continue;
            }
            if *v == missing {
                continue;
            }
            if let Some((lo, hi)) = self.valid_range {
                let value = *v as f64;
                if value < lo || value > hi {
                    *v = missing;
                    out_of_range += 1;
                }
            }
        }

        debug!(outside, non_finite, out_of_range, "Applied domain filter");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_grid::{AsciiRaster, IndexOrder};

    fn domain_3x3() -> GeoGrid {
        let raster = AsciiRaster::parse(
            "ncols 3\nnrows 3\nxllcorner 0\nyllcorner 0\ncellsize 1\nNODATA_value -9999\n\
             -9999 1 1\n1 1 1\n1 1 -9999\n",
        )
        .unwrap();
        GeoGrid::from_header(raster.header, raster.values, "domain").unwrap()
    }

    #[test]
    fn test_out_of_domain_and_range() {
        let grid = domain_3x3();
        let field = Field::new(
            vec![5.0, 150.0, f32::NAN, -3.0, 50.0, 100.0, 0.0, 1.0, 42.0],
            3,
            3,
        )
        .unwrap();
        let filter = DomainFilter::new(-9999.0, -7777.0)
            .with_valid_range(0.0, 100.0)
            .unwrap();
        let out = filter.apply(&field, &grid).unwrap();
        assert_eq!(
            out.data,
            vec![-9999.0, -7777.0, -7777.0, -7777.0, 50.0, 100.0, 0.0, 1.0, -9999.0]
        );
        for i in grid.index_nan(IndexOrder::RowMajor) {
            assert_eq!(out.data[i], -9999.0);
        }
    }

    #[test]
    fn test_idempotent() {
        let grid = domain_3x3();
        let field = Field::new(
            vec![1.0, -50.0, 7.0, f32::INFINITY, 300.0, 2.0, 3.0, -9999.0, 0.5],
            3,
            3,
        )
        .unwrap();
        let filter = DomainFilter::new(-9999.0, -7777.0)
            .with_valid_range(0.0, 10.0)
            .unwrap();
        let once = filter.apply(&field, &grid).unwrap();
        let twice = filter.apply(&once, &grid).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unobserved_in_domain_cells_become_missing() {
        let grid = GeoGrid::build_from_bbox(&geo_grid::BboxSpec::new(0.0, 0.0, 1.0, 1.0, 1.0, 1.0))
            .unwrap();
        let field = Field::new(vec![-9999.0, f32::NAN, 50.0, 150.0], 2, 2).unwrap();
        let filter = DomainFilter::new(-9999.0, -7777.0)
            .with_valid_range(0.0, 100.0)
            .unwrap();
        let out = filter.apply(&field, &grid).unwrap();
        assert_eq!(out.data, vec![-7777.0, -7777.0, 50.0, -7777.0]);
        assert_eq!(filter.apply(&out, &grid).unwrap(), out);
    }

    #[test]
    fn test_non_finite_without_range_is_fill() {
        let grid = domain_3x3();
        let field = Field::new(vec![1.0, f32::NAN, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], 3, 3).unwrap();
        let out = DomainFilter::new(-9999.0, -7777.0).apply(&field, &grid).unwrap();
        assert_eq!(out.data[1], -9999.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let grid = domain_3x3();
        let field = Field::filled(2, 3, 0.0);
        assert!(matches!(
            DomainFilter::new(-9999.0, -9999.0).apply(&field, &grid),
            Err(RegridError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_from_attributes_defaults() {
        let attrs = VariableAttributes {
            valid_range: Some([-50.0, 50.0]),
            ..Default::default()
        };
        let filter = DomainFilter::from_attributes(&attrs, -9999.0).unwrap();
        assert_eq!(filter.fill_value, -9999.0);
        assert_eq!(filter.missing_value, -9999.0);
        assert_eq!(filter.valid_range, Some((-50.0, 50.0)));
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(DomainFilter::new(0.0, 0.0).with_valid_range(5.0, 1.0).is_err());
    }
}
