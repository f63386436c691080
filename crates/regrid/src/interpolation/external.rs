//! Gridding through an external `gdal_grid`-compatible command.
//!
//! Each call writes the samples as a CSV point layer (plus the VRT that
//! exposes it as point geometries) into its own randomly named temporary
//! directory, runs the command with the target extent and size, and reads
//! the ESRI ASCII output back. The command rasterizes south-up, so the
//! result is flipped to put row 0 north.

use std::fmt::Write as _;
use std::fs::File;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use geo_grid::{AsciiRaster, GeoGrid};
use tracing::{debug, info, warn};

use super::native::Samples;
use crate::config::{InterpolationMethod, RegridConfig, SearchRadius};
use crate::error::{RegridError, Result};
use crate::types::Field;

const LAYER: &str = "points";

/// Runs the external gridding command.
#[derive(Debug, Clone)]
pub struct ExternalGridder {
    pub command: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ExternalGridder {
    fn default() -> Self {
        Self::from_config(&RegridConfig::default())
    }
}

impl ExternalGridder {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn from_config(config: &RegridConfig) -> Self {
        Self {
            command: config.gridder_command.clone(),
            timeout: Duration::from_secs(config.process_timeout_secs),
            poll_interval: Duration::from_millis(config.process_poll_ms),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Grid `samples` onto `grid`.
    pub fn grid(
        &self,
        samples: &Samples<'_>,
        grid: &GeoGrid,
        method: InterpolationMethod,
        radius: Option<SearchRadius>,
        no_data: f64,
    ) -> Result<Field> {
        let workdir = tempfile::Builder::new().prefix("regrid_").tempdir()?;
        let csv_path = workdir.path().join(format!("{}.csv", LAYER));
        let vrt_path = workdir.path().join(format!("{}.vrt", LAYER));
        let out_path = workdir.path().join("grid.asc");

        std::fs::write(&csv_path, points_csv(samples))?;
        std::fs::write(&vrt_path, points_vrt(&csv_path))?;

        let args = gridder_args(grid, method, radius, no_data, &vrt_path, &out_path);
        self.run(&args, workdir.path())?;

        let raster = AsciiRaster::read(&out_path)?;
        if (raster.header.nrows, raster.header.ncols) != grid.shape() {
            return Err(RegridError::shape_mismatch(format!(
                "gridder produced {}x{}, expected {}x{}",
                raster.header.nrows,
                raster.header.ncols,
                grid.rows(),
                grid.cols()
            )));
        }

        let mut field = Field::new(raster.values, raster.header.nrows, raster.header.ncols)?;
        field.flip_vertical();
        Ok(field)
    }

    /// Spawn the command and poll it until it exits or the wait budget runs
    /// out, in which case it is killed.
    fn run(&self, args: &[String], workdir: &Path) -> Result<()> {
        let command_line = format!("{} {}", self.command, args.join(" "));
        info!(command = %command_line, "Running external gridder");

        let stdout_path = workdir.join("stdout.log");
        let stderr_path = workdir.join("stderr.log");

        let mut child = Command::new(&self.command)
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(File::create(&stdout_path)?))
            .stderr(Stdio::from(File::create(&stderr_path)?))
            .spawn()
            .map_err(|e| RegridError::ExternalProcess {
                command: command_line.clone(),
                status: "not started".to_string(),
                stderr: e.to_string(),
            })?;

        let started = Instant::now();
        let status: ExitStatus = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                warn!(
                    command = %command_line,
                    seconds = self.timeout.as_secs(),
                    "External gridder exceeded its wait budget, killing"
                );
                if let Err(e) = child.kill() {
                    warn!(error = %e, "Failed to kill external gridder");
                }
                let _ = child.wait();
                return Err(RegridError::ProcessTimeout {
                    command: command_line,
                    seconds: self.timeout.as_secs(),
                });
            }
            std::thread::sleep(self.poll_interval);
        };

        let stdout = std::fs::read_to_string(&stdout_path).unwrap_or_default();
        let stderr = std::fs::read_to_string(&stderr_path).unwrap_or_default();
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            stdout = %stdout.trim(),
            "External gridder finished"
        );

        if !status.success() {
            return Err(RegridError::ExternalProcess {
                command: command_line,
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        if !stderr.trim().is_empty() {
            warn!(command = %command_line, stderr = %stderr.trim(), "External gridder wrote to stderr");
        }
        Ok(())
    }
}

/// `-a` algorithm string for the gridder.
pub fn algorithm_spec(
    method: InterpolationMethod,
    radius: Option<SearchRadius>,
    no_data: f64,
) -> String {
    // Zero radii make the gridder search the whole point set.
    let (rx, ry) = radius.map_or((0.0, 0.0), |r| (r.x, r.y));
    match method {
        InterpolationMethod::Nearest => format!(
            "nearest:radius1={}:radius2={}:nodata={}",
            rx, ry, no_data
        ),
        InterpolationMethod::Idw => format!(
            "invdist:power=2.0:smoothing=0.0:radius1={}:radius2={}:nodata={}",
            rx, ry, no_data
        ),
    }
}

/// Full argument list for gridding onto `grid`.
pub fn gridder_args(
    grid: &GeoGrid,
    method: InterpolationMethod,
    radius: Option<SearchRadius>,
    no_data: f64,
    input: &Path,
    output: &Path,
) -> Vec<String> {
    let extent = grid.edge_bbox();
    vec![
        "-zfield".to_string(),
        "value".to_string(),
        "-l".to_string(),
        LAYER.to_string(),
        "-a".to_string(),
        algorithm_spec(method, radius, no_data),
        "-txe".to_string(),
        extent.min_x.to_string(),
        extent.max_x.to_string(),
        "-tye".to_string(),
        extent.min_y.to_string(),
        extent.max_y.to_string(),
        "-outsize".to_string(),
        grid.cols().to_string(),
        grid.rows().to_string(),
        "-of".to_string(),
        "AAIGrid".to_string(),
        "-ot".to_string(),
        "Float32".to_string(),
        input.display().to_string(),
        output.display().to_string(),
    ]
}

fn points_csv(samples: &Samples<'_>) -> String {
    let mut csv = String::from("x,y,value\n");
    for ((x, y), v) in samples.x.iter().zip(samples.y).zip(samples.values) {
        let _ = writeln!(csv, "{},{},{}", x, y, v);
    }
    csv
}

fn points_vrt(csv_path: &Path) -> String {
    format!(
        r#"<OGRVRTDataSource>
    <OGRVRTLayer name="{layer}">
        <SrcDataSource>{src}</SrcDataSource>
        <GeometryType>wkbPoint</GeometryType>
        <LayerSRS>EPSG:4326</LayerSRS>
        <GeometryField encoding="PointFromColumns" x="x" y="y" z="value"/>
    </OGRVRTLayer>
</OGRVRTDataSource>
"#,
        layer = LAYER,
        src = csv_path.display()
    )
}
