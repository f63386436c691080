//! Precomputed nearest-source index.
//!
//! For every target cell an [`InterpolationIndex`] stores the position of
//! the nearest source sample, so repeated time steps over the same source
//! layout skip the distance search entirely and just gather values.
//!
//! Each index carries a SHA-256 fingerprint of the source coordinates it
//! was built from. A cached index whose fingerprint does not match the
//! current source layout is recomputed rather than reused.
//!
//! # Binary layout
//!
//! ```text
//! magic "RIDX" | version u32 | rows u64 | cols u64 | source_len u64
//! | fingerprint [u8; 32] | indices [u32; rows*cols] | valid bitmap [u64]
//! ```
//!
//! All integers are little-endian.

use std::path::Path;

use geo_grid::{get_or_compute_with, Codec, GeoGrid, GeoGridError};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::SearchRadius;
use crate::error::{RegridError, Result};
use crate::types::Field;

/// Magic bytes at the start of a serialized index.
pub const INDEX_MAGIC: &[u8; 4] = b"RIDX";

/// Current binary format version.
pub const INDEX_VERSION: u32 = 1;

const HEADER_LEN: usize = 4 + 4 + 8 + 8 + 8 + 32;

/// SHA-256 over a source coordinate set.
pub type Fingerprint = [u8; 32];

/// Fingerprint of `(x, y)`: sample count, then every coordinate's bits.
pub fn source_fingerprint(x: &[f64], y: &[f64]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update((x.len() as u64).to_le_bytes());
    for (xi, yi) in x.iter().zip(y) {
        hasher.update(xi.to_bits().to_le_bytes());
        hasher.update(yi.to_bits().to_le_bytes());
    }
    hasher.finalize().into()
}

/// Nearest-source position for each target cell.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationIndex {
    rows: usize,
    cols: usize,
    source_len: usize,
    fingerprint: Fingerprint,

    /// Source position per target cell, row-major.
    indices: Vec<u32>,

    /// Bit N is set when target cell N has a source within reach.
    valid_bitmap: Vec<u64>,
}

impl InterpolationIndex {
    /// An index with no valid cells.
    pub fn new(rows: usize, cols: usize, source_len: usize, fingerprint: Fingerprint) -> Self {
        let cells = rows * cols;
        Self {
            rows,
            cols,
            source_len,
            fingerprint,
            indices: vec![0; cells],
            valid_bitmap: vec![0u64; cells.div_ceil(64)],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of target cells.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of source samples the index was built against.
    pub fn source_len(&self) -> usize {
        self.source_len
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// True when built from exactly these source coordinates.
    pub fn matches_source(&self, x: &[f64], y: &[f64]) -> bool {
        x.len() == self.source_len && source_fingerprint(x, y) == self.fingerprint
    }

    #[inline]
    pub fn is_valid(&self, cell: usize) -> bool {
        let word = cell / 64;
        let bit = cell % 64;
        (self.valid_bitmap[word] & (1u64 << bit)) != 0
    }

    #[inline]
    pub fn set(&mut self, cell: usize, source: usize) {
        self.indices[cell] = source as u32;
        self.valid_bitmap[cell / 64] |= 1u64 << (cell % 64);
    }

    /// Source position for `cell`, or `None` when nothing was in reach.
    #[inline]
    pub fn get(&self, cell: usize) -> Option<usize> {
        if self.is_valid(cell) {
            Some(self.indices[cell] as usize)
        } else {
            None
        }
    }

    pub fn valid_count(&self) -> usize {
        self.valid_bitmap
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum()
    }

    /// Gather `values` onto the target grid. Cells with no source get
    /// `no_data`.
    pub fn gather(&self, values: &[f32], no_data: f32) -> Result<Field> {
        if values.len() != self.source_len {
            return Err(RegridError::index_mismatch(format!(
                "index built for {} source samples, got {} values",
                self.source_len,
                values.len()
            )));
        }
        let data = (0..self.len())
            .map(|cell| self.get(cell).map_or(no_data, |src| values[src]))
            .collect();
        Field::new(data, self.rows, self.cols)
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(HEADER_LEN + self.indices.len() * 4 + self.valid_bitmap.len() * 8);

        bytes.extend_from_slice(INDEX_MAGIC);
        bytes.extend_from_slice(&INDEX_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.rows as u64).to_le_bytes());
        bytes.extend_from_slice(&(self.cols as u64).to_le_bytes());
        bytes.extend_from_slice(&(self.source_len as u64).to_le_bytes());
        bytes.extend_from_slice(&self.fingerprint);

        for &i in &self.indices {
            bytes.extend_from_slice(&i.to_le_bytes());
        }
        for &word in &self.valid_bitmap {
            bytes.extend_from_slice(&word.to_le_bytes());
        }

        bytes
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(RegridError::Serialization(format!(
                "index truncated: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[0..4] != INDEX_MAGIC {
            return Err(RegridError::Serialization(
                "invalid index magic bytes".to_string(),
            ));
        }

        let mut reader = ByteReader::new(&bytes[4..]);
        let version = reader.u32()?;
        if version != INDEX_VERSION {
            return Err(RegridError::Serialization(format!(
                "unsupported index version: {}",
                version
            )));
        }
        let rows = reader.u64()? as usize;
        let cols = reader.u64()? as usize;
        let source_len = reader.u64()? as usize;
        let mut fingerprint = [0u8; 32];
        fingerprint.copy_from_slice(reader.take(32)?);

        let cells = rows
            .checked_mul(cols)
            .ok_or_else(|| RegridError::Serialization("index shape overflows".to_string()))?;
        let words = cells.div_ceil(64);
        let expected = HEADER_LEN + cells * 4 + words * 8;
        if bytes.len() != expected {
            return Err(RegridError::Serialization(format!(
                "invalid index size: expected {} bytes, got {}",
                expected,
                bytes.len()
            )));
        }

        let mut indices = Vec::with_capacity(cells);
        for _ in 0..cells {
            indices.push(reader.u32()?);
        }
        let mut valid_bitmap = Vec::with_capacity(words);
        for _ in 0..words {
            valid_bitmap.push(reader.u64()?);
        }

        let index = Self {
            rows,
            cols,
            source_len,
            fingerprint,
            indices,
            valid_bitmap,
        };
        if let Some(bad) = (0..cells).find(|&c| index.get(c).is_some_and(|s| s >= source_len)) {
            return Err(RegridError::Serialization(format!(
                "cell {} points past {} source samples",
                bad, source_len
            )));
        }
        Ok(index)
    }
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.offset + n;
        let slice = self
            .bytes
            .get(self.offset..end)
            .ok_or_else(|| RegridError::Serialization("index truncated".to_string()))?;
        self.offset = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }
}

/// Binary cache codec for [`InterpolationIndex`].
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexCodec;

impl Codec<InterpolationIndex> for IndexCodec {
    fn encode(&self, value: &InterpolationIndex) -> geo_grid::Result<Vec<u8>> {
        Ok(value.to_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> geo_grid::Result<InterpolationIndex> {
        InterpolationIndex::from_bytes(bytes)
            .map_err(|e| GeoGridError::cache("<memory>", e.to_string()))
    }
}

/// Builds [`InterpolationIndex`]es.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoIndexer {
    radius: Option<SearchRadius>,
}

impl GeoIndexer {
    /// Unbounded search: every cell takes its nearest source.
    pub fn new() -> Self {
        Self { radius: None }
    }

    /// Only sources inside the search ellipse around a cell center count.
    pub fn with_radius(radius: SearchRadius) -> Self {
        Self {
            radius: Some(radius),
        }
    }

    pub fn radius(&self) -> Option<SearchRadius> {
        self.radius
    }

    /// Nearest source sample for every cell of `target`.
    ///
    /// Ties go to the lower source position.
    pub fn compute_index(
        &self,
        source_x: &[f64],
        source_y: &[f64],
        target: &GeoGrid,
    ) -> Result<InterpolationIndex> {
        check_inputs(source_x, source_y, target)?;

        let mut index = InterpolationIndex::new(
            target.rows(),
            target.cols(),
            source_x.len(),
            source_fingerprint(source_x, source_y),
        );

        for (cell, (&cx, &cy)) in target.coord_x().iter().zip(target.coord_y()).enumerate() {
            let mut best: Option<(usize, f64)> = None;
            for (i, (&sx, &sy)) in source_x.iter().zip(source_y).enumerate() {
                let dx = sx - cx;
                let dy = sy - cy;
                if let Some(radius) = self.radius {
                    if !radius.contains(dx, dy) {
                        continue;
                    }
                }
                let d2 = dx * dx + dy * dy;
                if !d2.is_finite() {
                    continue;
                }
                if best.map_or(true, |(_, b)| d2 < b) {
                    best = Some((i, d2));
                }
            }
            if let Some((i, _)) = best {
                index.set(cell, i);
            }
        }

        info!(
            rows = target.rows(),
            cols = target.cols(),
            sources = source_x.len(),
            valid = index.valid_count(),
            "Computed interpolation index"
        );
        Ok(index)
    }

    /// Grid-to-grid index by direct row/col arithmetic: each target cell
    /// takes the source cell whose footprint contains its center.
    pub fn compute_grid_index(
        &self,
        source: &GeoGrid,
        target: &GeoGrid,
    ) -> Result<InterpolationIndex> {
        if source.is_empty() {
            return Err(RegridError::EmptyDomain("source grid has no cells".to_string()));
        }
        check_inputs(source.coord_x(), source.coord_y(), target)?;

        let mut index = InterpolationIndex::new(
            target.rows(),
            target.cols(),
            source.len(),
            source_fingerprint(source.coord_x(), source.coord_y()),
        );
        for (cell, (&cx, &cy)) in target.coord_x().iter().zip(target.coord_y()).enumerate() {
            if let Some((row, col)) = source.locate(cx, cy) {
                index.set(cell, row * source.cols() + col);
            }
        }

        info!(
            source_rows = source.rows(),
            source_cols = source.cols(),
            rows = target.rows(),
            cols = target.cols(),
            valid = index.valid_count(),
            "Computed grid-to-grid index"
        );
        Ok(index)
    }

    /// [`compute_index`](Self::compute_index) memoized at `path`.
    ///
    /// A cached index is reused only when its target shape and source
    /// fingerprint match the current call.
    pub fn compute_index_cached(
        &self,
        path: &Path,
        refresh: bool,
        source_x: &[f64],
        source_y: &[f64],
        target: &GeoGrid,
    ) -> Result<InterpolationIndex> {
        check_inputs(source_x, source_y, target)?;
        let fingerprint = source_fingerprint(source_x, source_y);

        get_or_compute_with(
            path,
            refresh,
            &IndexCodec,
            |cached: &InterpolationIndex| accept_cached(cached, &fingerprint, target),
            || self.compute_index(source_x, source_y, target),
        )
    }

    /// [`compute_grid_index`](Self::compute_grid_index) memoized at `path`.
    pub fn compute_grid_index_cached(
        &self,
        path: &Path,
        refresh: bool,
        source: &GeoGrid,
        target: &GeoGrid,
    ) -> Result<InterpolationIndex> {
        let fingerprint = source_fingerprint(source.coord_x(), source.coord_y());

        get_or_compute_with(
            path,
            refresh,
            &IndexCodec,
            |cached: &InterpolationIndex| accept_cached(cached, &fingerprint, target),
            || self.compute_grid_index(source, target),
        )
    }
}

fn accept_cached(cached: &InterpolationIndex, fingerprint: &Fingerprint, target: &GeoGrid) -> bool {
    if cached.shape() != target.shape() {
        warn!(
            cached_rows = cached.rows(),
            cached_cols = cached.cols(),
            rows = target.rows(),
            cols = target.cols(),
            "Cached index targets a different grid"
        );
        return false;
    }
    if cached.fingerprint() != fingerprint {
        warn!(
            cached_sources = cached.source_len(),
            "Cached index was built from a different source layout"
        );
        return false;
    }
    debug!(sources = cached.source_len(), "Cached index matches source layout");
    true
}

fn check_inputs(source_x: &[f64], source_y: &[f64], target: &GeoGrid) -> Result<()> {
    if target.is_empty() {
        return Err(RegridError::EmptyDomain("target grid has no cells".to_string()));
    }
    if source_x.is_empty() || source_y.is_empty() {
        return Err(RegridError::EmptyDomain(
            "source coordinates are empty".to_string(),
        ));
    }
    if source_x.len() != source_y.len() {
        return Err(RegridError::shape_mismatch(format!(
            "source x ({}) and y ({}) differ in length",
            source_x.len(),
            source_y.len()
        )));
    }
    if source_x.len() > u32::MAX as usize {
        return Err(RegridError::shape_mismatch(format!(
            "{} source samples exceed the index capacity",
            source_x.len()
        )));
    }
    Ok(())
}
