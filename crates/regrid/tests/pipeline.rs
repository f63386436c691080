//! End-to-end tests of the regridding pipeline and the external gridder.

use geo_grid::{AsciiRaster, BboxSpec, GeoGrid, IndexOrder};
use regrid::{
    GridInterpolator, InterpolationMethod, InterpolationParams, RegridConfig, RegridOutcome,
    Regridder, ScatterDataset, VariableAttributes, VariableConventions,
};
use test_utils::{
    ascii_raster_text, bbox, create_disc_domain, scattered_stations, temp_test_dir,
    temperature_at, CONVENTIONS_YAML,
};

fn liguria_domain() -> GeoGrid {
    let (x0, y0, _, _) = bbox::LIGURIA;
    let values = create_disc_domain(27, 10, 6.0, -9999.0);
    let text = ascii_raster_text(27, 10, x0, y0, 0.1, -9999.0, &values);
    let raster = AsciiRaster::parse(&text).unwrap();
    GeoGrid::from_header(raster.header, raster.values, "domain").unwrap()
}

fn stations(count: usize, seed: u64) -> ScatterDataset {
    let (xs, ys) = scattered_stations(count, bbox::LIGURIA, seed);
    let values = xs.iter().zip(&ys).map(|(&x, &y)| temperature_at(x, y)).collect();
    ScatterDataset::new(values, xs, ys).unwrap()
}

fn conventions() -> VariableConventions {
    VariableConventions::from_yaml_str(CONVENTIONS_YAML).unwrap()
}

#[test]
fn test_nearest_pipeline_with_cached_index() {
    let dir = temp_test_dir();
    let config = RegridConfig {
        method: InterpolationMethod::Nearest,
        radius_x: Some(0.4),
        radius_y: Some(0.4),
        cache_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let regridder = Regridder::new(config, liguria_domain()).unwrap();
    let conventions = conventions();
    let attrs = conventions.require("air_temperature").unwrap();
    let source = stations(30, 5);

    let first = regridder.run("air_temperature", &source, attrs).unwrap();
    let index_path = regridder.index_path("air_temperature").unwrap();
    assert!(index_path.exists());

    let second = regridder.run("air_temperature", &source, attrs).unwrap();
    assert_eq!(first, second);

    let field = first.field();
    assert_eq!(field.shape(), regridder.grid().shape());
    for i in regridder.grid().index_nan(IndexOrder::RowMajor) {
        assert_eq!(field.data[i], -9999.0);
    }
    for i in regridder.grid().index_finite(IndexOrder::RowMajor) {
        let v = field.data[i];
        assert!(v == -9999.0 || (-50.0..=50.0).contains(&v));
    }
}

#[test]
fn test_idw_pipeline_applies_valid_range() {
    let config = RegridConfig {
        method: InterpolationMethod::Idw,
        radius_x: Some(0.5),
        radius_y: Some(0.5),
        ..Default::default()
    };
    let regridder = Regridder::new(config, liguria_domain()).unwrap();
    let attrs = VariableAttributes {
        fill_value: Some(-9999.0),
        missing_value: Some(-7777.0),
        valid_range: Some([0.0, 19.0]),
        ..Default::default()
    };

    let outcome = regridder.run("air_temperature", &stations(50, 8), &attrs).unwrap();
    let field = outcome.field();
    assert!(field.data.iter().any(|&v| v == -7777.0));
    for &v in &field.data {
        assert!(v == -9999.0 || v == -7777.0 || (0.0..=19.0).contains(&v));
    }
}

#[test]
fn test_flag_reclassification_before_interpolation() {
    let grid = GeoGrid::build_from_bbox(&BboxSpec::new(0.0, 0.0, 2.0, 2.0, 1.0, 1.0)).unwrap();
    let regridder = Regridder::new(RegridConfig::default(), grid).unwrap();
    let conventions = conventions();
    let attrs = conventions.require("snow_cover").unwrap().clone();

    let source = ScatterDataset::new(vec![73.0, 250.0], vec![0.0, 2.0], vec![2.0, 0.0])
        .unwrap()
        .with_attributes(attrs.clone());
    let outcome = regridder.run("snow_cover", &source, &attrs).unwrap();
    let field = outcome.field();
    assert_eq!(field.get(0, 0), Some(1.0));
    assert_eq!(field.get(2, 2), Some(250.0));
}

#[test]
fn test_no_usable_stations_is_empty_outcome() {
    let regridder = Regridder::new(RegridConfig::default(), liguria_domain()).unwrap();
    let attrs = VariableAttributes {
        missing_value: Some(-7777.0),
        ..Default::default()
    };
    let source = ScatterDataset::new(vec![-7777.0, -7777.0], vec![8.0, 9.0], vec![44.0, 44.2])
        .unwrap()
        .with_attributes(attrs.clone());

    match regridder.run("rain", &source, &attrs).unwrap() {
        RegridOutcome::Empty { field, reason } => {
            assert!(field.data.iter().all(|&v| v == -9999.0));
            assert!(!reason.is_empty());
        }
        RegridOutcome::Field(_) => panic!("expected an empty outcome"),
    }
}

#[test]
fn test_grid_to_grid_pipeline() {
    let dir = temp_test_dir();
    let source = GeoGrid::build_from_bbox(&BboxSpec::new(7.0, 43.5, 10.5, 45.0, 0.05, 0.05)).unwrap();
    let values: Vec<f32> = source
        .coord_x()
        .iter()
        .zip(source.coord_y())
        .map(|(&x, &y)| temperature_at(x, y))
        .collect();
    let config = RegridConfig {
        cache_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let regridder = Regridder::new(config, liguria_domain()).unwrap();

    let outcome = regridder
        .run_grid("model_t2m", &source, &values, &VariableAttributes::default())
        .unwrap();
    assert!(!outcome.is_empty());
    assert!(regridder.index_path("model_t2m").unwrap().exists());

    let grid = regridder.grid();
    for i in grid.index_finite(IndexOrder::RowMajor) {
        let expected = temperature_at(grid.coord_x()[i], grid.coord_y()[i]);
        assert!((outcome.field().data[i] - expected).abs() < 0.05);
    }
}

#[cfg(unix)]
mod external {
    use super::*;
    use regrid::{ExternalGridder, RegridError};
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use test_utils::write_scratch_file;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = write_scratch_file(dir, name, &format!("#!/bin/sh\n{}", body));
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn gridder(script: &Path) -> ExternalGridder {
        ExternalGridder {
            command: script.display().to_string(),
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(20),
        }
    }

    fn small_grid() -> GeoGrid {
        GeoGrid::build_from_bbox(&BboxSpec::new(0.0, 0.0, 2.0, 1.0, 1.0, 1.0)).unwrap()
    }

    #[test]
    fn test_output_is_flipped_north_up() {
        let dir = temp_test_dir();
        let copied_csv = dir.path().join("seen.csv");
        let body = format!(
            "for last in \"$@\"; do :; done\n\
             cp points.csv '{}'\n\
             printf 'ncols 3\\nnrows 2\\nxllcorner -0.5\\nyllcorner -0.5\\ncellsize 1\\nNODATA_value -9999\\n1 2 3\\n4 5 6\\n' > \"$last\"\n",
            copied_csv.display()
        );
        let script = write_script(dir.path(), "fake_grid.sh", &body);

        let field = GridInterpolator::external(gridder(&script))
            .interpolate(
                &[7.5],
                &[1.0],
                &[0.5],
                &small_grid(),
                &InterpolationParams::nearest(),
                None,
            )
            .unwrap();
        assert_eq!(field.data, vec![4.0, 5.0, 6.0, 1.0, 2.0, 3.0]);

        let csv = std::fs::read_to_string(&copied_csv).unwrap();
        assert_eq!(csv, "x,y,value\n1,0.5,7.5\n");
    }

    #[test]
    fn test_failing_command_reports_stderr() {
        let dir = temp_test_dir();
        let script = write_script(dir.path(), "fail.sh", "echo 'bad extent' >&2\nexit 3\n");
        let result = GridInterpolator::external(gridder(&script)).interpolate(
            &[1.0],
            &[1.0],
            &[0.5],
            &small_grid(),
            &InterpolationParams::nearest(),
            None,
        );
        match result {
            Err(RegridError::ExternalProcess { stderr, .. }) => assert_eq!(stderr, "bad extent"),
            other => panic!("expected ExternalProcess, got {:?}", other),
        }
    }

    #[test]
    fn test_hung_command_is_killed() {
        let dir = temp_test_dir();
        let script = write_script(dir.path(), "hang.sh", "sleep 30\n");
        let gridder = gridder(&script).with_timeout(Duration::from_millis(200));

        let started = std::time::Instant::now();
        let result = GridInterpolator::external(gridder).interpolate(
            &[1.0],
            &[1.0],
            &[0.5],
            &small_grid(),
            &InterpolationParams::nearest(),
            None,
        );
        assert!(matches!(result, Err(RegridError::ProcessTimeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_rectangular_cells_read_from_dx_dy_header() {
        let dir = temp_test_dir();
        let body = "for last in \"$@\"; do :; done\n\
                    printf 'ncols 3\\nnrows 3\\nxllcorner -0.5\\nyllcorner -0.25\\ndx 1\\ndy 0.5\\nNODATA_value -9999\\n1 2 3\\n4 5 6\\n7 8 9\\n' > \"$last\"\n";
        let script = write_script(dir.path(), "rect.sh", body);
        let grid = GeoGrid::build_from_bbox(&BboxSpec::new(0.0, 0.0, 2.0, 1.0, 1.0, 0.5)).unwrap();
        assert_eq!(grid.shape(), (3, 3));

        let field = GridInterpolator::external(gridder(&script))
            .interpolate(
                &[1.0],
                &[1.0],
                &[0.5],
                &grid,
                &InterpolationParams::nearest(),
                None,
            )
            .unwrap();
        assert_eq!(field.data, vec![7.0, 8.0, 9.0, 4.0, 5.0, 6.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_wrong_output_size_rejected() {
        let dir = temp_test_dir();
        let body = "for last in \"$@\"; do :; done\n\
                    printf 'ncols 1\\nnrows 1\\nxllcorner 0\\nyllcorner 0\\ncellsize 1\\nNODATA_value -9999\\n1\\n' > \"$last\"\n";
        let script = write_script(dir.path(), "tiny.sh", body);
        let result = GridInterpolator::external(gridder(&script)).interpolate(
            &[1.0],
            &[1.0],
            &[0.5],
            &small_grid(),
            &InterpolationParams::nearest(),
            None,
        );
        assert!(matches!(result, Err(RegridError::ShapeMismatch(_))));
    }
}
