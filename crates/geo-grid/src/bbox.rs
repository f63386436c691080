//! Bounding box types used to describe grid domains.

use serde::{Deserialize, Serialize};

use crate::error::{GeoGridError, Result};

/// A geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Parse a comma separated "minx,miny,maxx,maxy" string.
    pub fn parse(s: &str) -> Result<Self> {
        let values = parse_numbers(s)?;
        match values.as_slice() {
            [min_x, min_y, max_x, max_y] => Ok(Self::new(*min_x, *min_y, *max_x, *max_y)),
            _ => Err(GeoGridError::geo_data(format!(
                "bounding box '{}' must have 4 values, found {}",
                s,
                values.len()
            ))),
        }
    }

    /// Width of the bounding box in degrees.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in degrees.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True when min < max on both axes and every corner is finite.
    pub fn is_valid(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
            && self.min_x < self.max_x
            && self.min_y < self.max_y
    }

    /// Check if a point is contained within this bbox (edges inclusive).
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Check if this bbox intersects another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Grow the box by `dx` on both x edges and `dy` on both y edges.
    pub fn expand(&self, dx: f64, dy: f64) -> Self {
        Self {
            min_x: self.min_x - dx,
            min_y: self.min_y - dy,
            max_x: self.max_x + dx,
            max_y: self.max_y + dy,
        }
    }
}

/// A bounding box plus the grid step along each axis.
///
/// The corners are cell *centers*: a spec of `(0, 0, 10, 10, 1, 1)`
/// describes an 11x11 grid whose first center sits at (0, 0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BboxSpec {
    pub bbox: BoundingBox,
    pub cell_size_x: f64,
    pub cell_size_y: f64,
}

impl BboxSpec {
    pub fn new(
        x_min: f64,
        y_min: f64,
        x_max: f64,
        y_max: f64,
        cell_size_x: f64,
        cell_size_y: f64,
    ) -> Self {
        Self {
            bbox: BoundingBox::new(x_min, y_min, x_max, y_max),
            cell_size_x,
            cell_size_y,
        }
    }

    /// Parse "x_min,y_min,x_max,y_max,cell_size_x,cell_size_y".
    ///
    /// A five-value form with a single square cell size is also accepted.
    pub fn parse(s: &str) -> Result<Self> {
        let values = parse_numbers(s)?;
        match values.as_slice() {
            [x0, y0, x1, y1, cx, cy] => Ok(Self::new(*x0, *y0, *x1, *y1, *cx, *cy)),
            [x0, y0, x1, y1, c] => Ok(Self::new(*x0, *y0, *x1, *y1, *c, *c)),
            _ => Err(GeoGridError::geo_data(format!(
                "bbox spec '{}' must have 5 or 6 values, found {}",
                s,
                values.len()
            ))),
        }
    }

    /// Check corner ordering and cell sizes.
    pub fn validate(&self) -> Result<()> {
        if !self.bbox.is_valid() {
            return Err(GeoGridError::geo_data(format!(
                "bbox corners out of order or not finite: {:?}",
                self.bbox
            )));
        }
        if !(self.cell_size_x > 0.0 && self.cell_size_y > 0.0) {
            return Err(GeoGridError::geo_data(format!(
                "cell sizes must be > 0, got ({}, {})",
                self.cell_size_x, self.cell_size_y
            )));
        }
        Ok(())
    }

    /// Rows and columns derived as `round((max - min) / step + 1)`.
    pub fn shape(&self) -> (usize, usize) {
        let rows = (self.bbox.height() / self.cell_size_y + 1.0).round() as usize;
        let cols = (self.bbox.width() / self.cell_size_x + 1.0).round() as usize;
        (rows, cols)
    }
}

fn parse_numbers(s: &str) -> Result<Vec<f64>> {
    s.split(',')
        .map(|part| {
            let trimmed = part.trim();
            trimmed
                .parse::<f64>()
                .map_err(|_| GeoGridError::geo_data(format!("invalid number '{}'", trimmed)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        let bbox = BoundingBox::parse("6.5, 43.5, 9.5, 46.5").unwrap();
        assert_eq!(bbox.min_x, 6.5);
        assert_eq!(bbox.max_y, 46.5);
        assert!(bbox.is_valid());
        assert!(BoundingBox::parse("1,2,3").is_err());
        assert!(BoundingBox::parse("1,2,x,4").is_err());
    }

    #[test]
    fn test_bbox_spec_shape() {
        let spec = BboxSpec::parse("0,0,10,10,1,1").unwrap();
        assert_eq!(spec.shape(), (11, 11));

        let spec = BboxSpec::parse("0,0,10,5,0.5").unwrap();
        assert_eq!(spec.cell_size_y, 0.5);
        assert_eq!(spec.shape(), (11, 21));
    }

    #[test]
    fn test_bbox_spec_validate() {
        assert!(BboxSpec::new(0.0, 0.0, 1.0, 1.0, 0.1, 0.1).validate().is_ok());
        assert!(BboxSpec::new(1.0, 0.0, 0.0, 1.0, 0.1, 0.1).validate().is_err());
        assert!(BboxSpec::new(0.0, 0.0, 1.0, 1.0, 0.0, 0.1).validate().is_err());
    }

    #[test]
    fn test_contains_and_expand() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(bbox.contains_point(10.0, 0.0));
        assert!(!bbox.contains_point(10.1, 0.0));
        let grown = bbox.expand(0.5, 1.0);
        assert!(grown.contains_point(10.4, -0.9));
        assert!(grown.intersects(&bbox));
    }
}
