//! Scratch directories and files for tests.

use std::path::{Path, PathBuf};

/// A fresh directory for rasters and ancillary files, removed on drop.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("regrid_test_")
        .tempdir()
        .expect("cannot create scratch directory")
}

/// Writes `contents` to `dir/name` and returns the full path.
pub fn write_scratch_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("cannot write scratch file");
    path
}
