//! Integration tests for reference grid construction, masks and caching.

use geo_grid::{AsciiRaster, BboxSpec, GeoGrid, GeoGridError, IndexOrder};
use test_utils::{
    ascii_raster_text, assert_approx_eq, assert_fields_eq, bbox, create_disc_domain, header,
    temp_test_dir, write_scratch_file,
};

fn assert_masks_exhaustive(grid: &GeoGrid) {
    let finite = grid.mask_finite();
    let nan = grid.mask_nan();
    assert_eq!(finite.len(), grid.len());
    for (f, n) in finite.iter().zip(nan.iter()) {
        assert!(f ^ n, "every cell must be in exactly one mask");
    }
    let idx_f = grid.index_finite(IndexOrder::RowMajor);
    let idx_n = grid.index_nan(IndexOrder::RowMajor);
    assert_eq!(idx_f.len() + idx_n.len(), grid.len());
}

// =============================================================================
// Raster construction
// =============================================================================

#[test]
fn test_header_rederived_after_build() {
    let (ncols, nrows, xll, yll, cs, _) = header::LIGURIA_005;
    let headers = [
        (4, 4, 0.0, 0.0, 1.0),
        (ncols, nrows, xll, yll, cs),
        (13, 7, -10.125, 35.5, 0.0083333),
        (1, 1, 100.0, -45.0, 2.5),
    ];
    let dir = temp_test_dir();
    for (i, (ncols, nrows, xll, yll, cs)) in headers.into_iter().enumerate() {
        let values = vec![1.0_f32; ncols * nrows];
        let text = ascii_raster_text(ncols, nrows, xll, yll, cs, -9999.0, &values);
        let path = write_scratch_file(dir.path(), &format!("dem_{}.txt", i), &text);

        let grid = GeoGrid::build_from_raster(&path).unwrap();
        let header = grid.header();
        assert_eq!(header.nrows, nrows);
        assert_eq!(header.ncols, ncols);
        assert_approx_eq!(header.xllcorner, xll, 1e-9);
        assert_approx_eq!(header.yllcorner, yll, 1e-9);
        assert_approx_eq!(header.cellsize, cs, 1e-12);
    }
}

#[test]
fn test_disc_domain_masks_exhaustive() {
    let values = create_disc_domain(15, 11, 4.5, -9999.0);
    let text = ascii_raster_text(15, 11, 8.0, 44.0, 0.1, -9999.0, &values);
    let dir = temp_test_dir();
    let path = write_scratch_file(dir.path(), "domain.txt", &text);

    let grid = GeoGrid::build_from_raster(&path).unwrap();
    assert_eq!(grid.layer_name(), "domain");
    assert_masks_exhaustive(&grid);

    let expected_nan = values.iter().filter(|&&v| v == -9999.0).count();
    assert_eq!(grid.index_nan(IndexOrder::RowMajor).len(), expected_nan);
    assert_eq!(grid.index_nan(IndexOrder::ColumnMajor).len(), expected_nan);
}

#[test]
fn test_coordinate_meshes_match_shape() {
    let values = vec![0.0_f32; 6 * 3];
    let text = ascii_raster_text(6, 3, 7.0, 44.0, 0.5, -9999.0, &values);
    let raster = AsciiRaster::parse(&text).unwrap();
    let grid = GeoGrid::from_header(raster.header, raster.values, "dem").unwrap();

    assert_eq!(grid.coord_x().len(), 18);
    assert_eq!(grid.coord_y().len(), 18);
    // North row first, west column first
    assert_approx_eq!(grid.coord_y()[0], 45.25, 1e-12);
    assert_approx_eq!(grid.coord_y()[17], 44.25, 1e-12);
    assert_approx_eq!(grid.coord_x()[0], 7.25, 1e-12);
    assert_approx_eq!(grid.coord_x()[5], 9.75, 1e-12);
}

#[test]
fn test_unparseable_raster_is_geo_data_error() {
    let dir = temp_test_dir();
    let path = write_scratch_file(dir.path(), "broken.txt", "ncols 2\nnrows two\n");
    assert!(matches!(
        GeoGrid::build_from_raster(&path),
        Err(GeoGridError::GeoData(_))
    ));
    assert!(matches!(
        GeoGrid::build_from_raster(dir.path().join("missing.txt")),
        Err(GeoGridError::GeoData(_))
    ));
}

// =============================================================================
// Bounding box construction
// =============================================================================

#[test]
fn test_bbox_grid_all_finite() {
    let grid = GeoGrid::build_from_bbox(&BboxSpec::new(0.0, 0.0, 10.0, 10.0, 1.0, 1.0)).unwrap();
    assert_eq!(grid.rows(), 11);
    assert_eq!(grid.cols(), 11);
    assert!(grid.mask_finite().iter().all(|&m| m));
    assert!(grid.index_nan(IndexOrder::RowMajor).is_empty());
    assert_masks_exhaustive(&grid);
}

#[test]
fn test_bbox_grid_rectangular_cells() {
    let spec = BboxSpec::new(7.0, 43.0, 9.0, 44.0, 0.5, 0.25);
    let grid = GeoGrid::build_from_bbox(&spec).unwrap();
    assert_eq!(grid.shape(), (5, 5));
    assert_eq!(grid.cell_center(4, 4), Some((9.0, 43.0)));
    let header = grid.header();
    assert_eq!((header.cell_size_x(), header.cell_size_y()), (0.5, 0.25));
    assert_approx_eq!(header.xllcorner, 6.75, 1e-12);
    assert_approx_eq!(header.yllcorner, 42.875, 1e-12);

    let text = AsciiRaster {
        header,
        values: vec![1.0; 25],
    }
    .to_ascii();
    assert!(text.contains("dx") && !text.contains("cellsize"));
    let raster = AsciiRaster::parse(&text).unwrap();
    let reloaded = GeoGrid::from_header(raster.header, raster.values, "domain").unwrap();
    assert_eq!(reloaded.coord_x(), grid.coord_x());
    assert_eq!(reloaded.coord_y(), grid.coord_y());
}

#[test]
fn test_bbox_invalid_rejected() {
    let (x0, y0, x1, y1) = bbox::INVALID;
    let spec = BboxSpec::new(x0, y0, x1, y1, 1.0, 1.0);
    assert!(matches!(
        GeoGrid::build_from_bbox(&spec),
        Err(GeoGridError::GeoData(_))
    ));
}

// =============================================================================
// Caching
// =============================================================================

#[test]
fn test_cached_raster_survives_source_removal() {
    let dir = temp_test_dir();
    let values = create_disc_domain(8, 8, 3.0, -9999.0);
    let text = ascii_raster_text(8, 8, 0.0, 0.0, 1.0, -9999.0, &values);
    let raster_path = write_scratch_file(dir.path(), "dem.txt", &text);
    let cache_path = dir.path().join("ancillary").join("dem.grid.json");

    let first = GeoGrid::build_from_raster_cached(&raster_path, &cache_path, false).unwrap();
    assert!(cache_path.exists());

    std::fs::remove_file(&raster_path).unwrap();
    let second = GeoGrid::build_from_raster_cached(&raster_path, &cache_path, false).unwrap();
    assert_eq!(first.shape(), second.shape());
    assert_fields_eq!(first.data(), second.data());
    assert_eq!(
        first.index_nan(IndexOrder::RowMajor),
        second.index_nan(IndexOrder::RowMajor)
    );

    // Refresh needs the source again
    assert!(GeoGrid::build_from_raster_cached(&raster_path, &cache_path, true).is_err());
}

#[test]
fn test_cached_bbox_grid() {
    let dir = temp_test_dir();
    let cache_path = dir.path().join("bbox.grid.json");
    let spec = BboxSpec::new(0.0, 0.0, 2.0, 2.0, 0.5, 0.5);
    let grid = GeoGrid::build_from_bbox_cached(&spec, &cache_path, false).unwrap();
    let again = GeoGrid::build_from_bbox_cached(&spec, &cache_path, false).unwrap();
    assert_eq!(grid.shape(), (5, 5));
    assert_eq!(grid.coord_x(), again.coord_x());
}

// =============================================================================
// Merging
// =============================================================================

#[test]
fn test_merge_requires_identical_header() {
    let dir = temp_test_dir();
    let dem = ascii_raster_text(3, 3, 0.0, 0.0, 1.0, -9999.0, &[1.0; 9]);
    let cn = ascii_raster_text(3, 3, 0.0, 0.0, 1.0, -9999.0, &[70.0; 9]);
    let shifted = ascii_raster_text(3, 3, 0.5, 0.0, 1.0, -9999.0, &[70.0; 9]);

    let dem = GeoGrid::build_from_raster(write_scratch_file(dir.path(), "dem.txt", &dem)).unwrap();
    let cn = GeoGrid::build_from_raster(write_scratch_file(dir.path(), "cn.txt", &cn)).unwrap();
    let shifted =
        GeoGrid::build_from_raster(write_scratch_file(dir.path(), "cn2.txt", &shifted)).unwrap();

    let merged = dem.merge(&cn).unwrap();
    assert_eq!(merged.layer("cn").map(|l| l[0]), Some(70.0));
    assert_eq!(merged.layer("dem").map(|l| l[0]), Some(1.0));

    match dem.merge(&shifted) {
        Err(GeoGridError::DomainMismatch { field, .. }) => assert_eq!(field, "x_min"),
        other => panic!("expected mismatch, got {:?}", other.map(|g| g.shape())),
    }
}
