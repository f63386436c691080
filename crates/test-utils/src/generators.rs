//! Test data generators for synthetic domains and observations.
//!
//! These generators create predictable, verifiable patterns that can be
//! used across the test suite. Randomness comes from a fixed-seed LCG so
//! every run produces the same station layout.

/// Creates a domain layer shaped like a disc: cells whose center is
/// farther than `radius_cells` from the grid center hold `nodata`,
/// the rest hold an elevation-like ramp.
pub fn create_disc_domain(width: usize, height: usize, radius_cells: f64, nodata: f32) -> Vec<f32> {
    let cx = (width as f64 - 1.0) / 2.0;
    let cy = (height as f64 - 1.0) / 2.0;
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f64 - cx;
            let dy = row as f64 - cy;
            if (dx * dx + dy * dy).sqrt() > radius_cells {
                data.push(nodata);
            } else {
                data.push((100 + row * 10 + col) as f32);
            }
        }
    }
    data
}

/// Renders an ESRI ASCII grid.
pub fn ascii_raster_text(
    ncols: usize,
    nrows: usize,
    xllcorner: f64,
    yllcorner: f64,
    cellsize: f64,
    nodata: f64,
    values: &[f32],
) -> String {
    assert_eq!(values.len(), ncols * nrows, "values do not match header");
    let mut text = format!(
        "ncols {}\nnrows {}\nxllcorner {}\nyllcorner {}\ncellsize {}\nNODATA_value {}\n",
        ncols, nrows, xllcorner, yllcorner, cellsize, nodata
    );
    for row in values.chunks(ncols) {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        text.push_str(&line.join(" "));
        text.push('\n');
    }
    text
}

/// Deterministic pseudo-random generator (64-bit LCG).
#[derive(Debug, Clone)]
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(6364136223846793005).wrapping_add(1))
    }

    /// Next value in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Scattered station coordinates inside `(min_x, min_y, max_x, max_y)`.
pub fn scattered_stations(
    count: usize,
    bbox: (f64, f64, f64, f64),
    seed: u64,
) -> (Vec<f64>, Vec<f64>) {
    let (min_x, min_y, max_x, max_y) = bbox;
    let mut rng = Lcg::new(seed);
    let mut xs = Vec::with_capacity(count);
    let mut ys = Vec::with_capacity(count);
    for _ in 0..count {
        xs.push(min_x + rng.next_f64() * (max_x - min_x));
        ys.push(min_y + rng.next_f64() * (max_y - min_y));
    }
    (xs, ys)
}

/// A smooth temperature-like field in degrees Celsius sampled at `(x, y)`.
pub fn temperature_at(x: f64, y: f64) -> f32 {
    (20.0 - 0.6 * (y - 44.0) + 0.3 * (x - 8.0)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disc_domain_has_both_masks() {
        let data = create_disc_domain(9, 9, 3.0, -9999.0);
        assert!(data.iter().any(|&v| v == -9999.0));
        assert!(data.iter().any(|&v| v != -9999.0));
        // Center cell is inside the disc
        assert_ne!(data[4 * 9 + 4], -9999.0);
        // Corner is outside
        assert_eq!(data[0], -9999.0);
    }

    #[test]
    fn test_stations_are_deterministic_and_inside() {
        let bbox = (7.0, 43.5, 10.0, 45.0);
        let (xa, ya) = scattered_stations(50, bbox, 42);
        let (xb, yb) = scattered_stations(50, bbox, 42);
        assert_eq!(xa, xb);
        assert_eq!(ya, yb);
        for (x, y) in xa.iter().zip(ya.iter()) {
            assert!(*x >= 7.0 && *x < 10.0);
            assert!(*y >= 43.5 && *y < 45.0);
        }
    }

    #[test]
    fn test_ascii_raster_text() {
        let text = ascii_raster_text(2, 1, 0.0, 0.0, 1.0, -9999.0, &[1.0, 2.0]);
        assert!(text.starts_with("ncols 2\nnrows 1\n"));
        assert!(text.ends_with("1 2\n"));
    }
}
