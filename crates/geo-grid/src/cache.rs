//! Ancillary file memoization.
//!
//! Expensive artifacts (reference grids, interpolation indices) are
//! persisted between runs. [`get_or_compute`] reuses the file at a path when
//! it exists and decodes cleanly, otherwise computes the value and writes it.
//!
//! Writes go to a temporary file in the destination directory and are then
//! renamed into place, so a concurrent reader sees either the old file, the
//! new file, or nothing.

use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{GeoGridError, Result};

/// Encodes and decodes a cached value.
pub trait Codec<T> {
    fn encode(&self, value: &T) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// serde_json codec for any serializable value.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for JsonCodec {
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value)
            .map_err(|e| GeoGridError::cache("<memory>", format!("json encode: {}", e)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes)
            .map_err(|e| GeoGridError::cache("<memory>", format!("json decode: {}", e)))
    }
}

/// Return the cached value at `path`, or compute and persist it.
///
/// With `refresh` set the cache file is ignored and overwritten.
pub fn get_or_compute<T, E, C, F>(
    path: impl AsRef<Path>,
    refresh: bool,
    codec: &C,
    compute: F,
) -> std::result::Result<T, E>
where
    C: Codec<T>,
    E: From<GeoGridError>,
    F: FnOnce() -> std::result::Result<T, E>,
{
    get_or_compute_with(path, refresh, codec, |_| true, compute)
}

/// Like [`get_or_compute`], but a loaded value is only reused if `accept`
/// returns true for it.
pub fn get_or_compute_with<T, E, C, A, F>(
    path: impl AsRef<Path>,
    refresh: bool,
    codec: &C,
    accept: A,
    compute: F,
) -> std::result::Result<T, E>
where
    C: Codec<T>,
    E: From<GeoGridError>,
    A: FnOnce(&T) -> bool,
    F: FnOnce() -> std::result::Result<T, E>,
{
    let path = path.as_ref();

    if refresh {
        info!(path = %path.display(), "Refreshing ancillary file");
    } else if path.exists() {
        match load(path, codec) {
            Ok(value) if accept(&value) => {
                debug!(path = %path.display(), "Ancillary cache hit");
                return Ok(value);
            }
            Ok(_) => {
                warn!(path = %path.display(), "Ancillary file rejected, recomputing");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ancillary file unreadable, recomputing");
            }
        }
    } else {
        debug!(path = %path.display(), "Ancillary cache miss");
    }

    let value = compute()?;
    save(path, codec, &value)?;
    Ok(value)
}

/// Decode the file at `path`.
pub fn load<T, C: Codec<T>>(path: &Path, codec: &C) -> Result<T> {
    let bytes = std::fs::read(path)?;
    codec
        .decode(&bytes)
        .map_err(|e| GeoGridError::cache(path, e.to_string()))
}

/// Encode `value` and atomically replace the file at `path`.
pub fn save<T, C: Codec<T>>(path: &Path, codec: &C, value: &T) -> Result<()> {
    let bytes = codec.encode(value)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| GeoGridError::Io(e.error))?;

    debug!(path = %path.display(), bytes = bytes.len(), "Wrote ancillary file");
    Ok(())
}
