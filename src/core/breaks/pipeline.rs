//! Break tables to a `YYYYMMDD` GeoTIFF, its QGIS style and an optional
//! point layer of the selected records.
use std::path::{Path, PathBuf};

use gdal::vector::{FieldValue, OGRFieldType};
use serde::Serialize;
use tracing::{error, info, warn};

use super::grid::RasterGrid;
use super::select::{DateWindow, select_file_breaks};
use super::style::break_palette;
use crate::core::dates::{date_from_millis, parse_flexible, yyyymmdd};
use crate::core::params::BreakRasterParams;
use crate::error::Result;
use crate::io::gdal::same_crs;
use crate::io::parquet::{BreakRecord, find_parquet_files, read_break_records};
use crate::io::vector::{Boundary, PointField, load_boundary, write_points_gpkg};
use crate::io::writers::qml::write_palette_qml;
use crate::io::writers::tiff::{TiffOptions, write_geotiff_band};
use crate::io::writers::warp::warp_to_crs;

/// Files produced by a break conversion
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BreakReport {
    pub files: usize,
    pub records: usize,
    pub raster: Option<PathBuf>,
    pub style: Option<PathBuf>,
    pub vector: Option<PathBuf>,
    pub width: usize,
    pub height: usize,
}

/// `{stem}_year_colors.qml` next to the raster
pub fn style_path(raster: &Path) -> PathBuf {
    let stem = raster
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    raster.with_file_name(format!("{}_year_colors.qml", stem))
}

fn date_window(params: &BreakRasterParams) -> Result<DateWindow> {
    let start = params.search_start.as_deref().map(parse_flexible).transpose()?;
    let end = params.search_end.as_deref().map(parse_flexible).transpose()?;
    Ok(DateWindow::new(start, end))
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Selected records of every break table in `input_dir`
pub fn collect_breaks(
    files: &[PathBuf],
    window: &DateWindow,
    boundary: Option<&Boundary>,
) -> Vec<BreakRecord> {
    let mut all = Vec::new();
    for (i, path) in files.iter().enumerate() {
        info!(
            "Processing file {}/{}: {:?}",
            i + 1,
            files.len(),
            path.file_name().unwrap_or_default()
        );
        match read_break_records(path) {
            Ok(records) => {
                let before = records.len();
                let selected = select_file_breaks(records, window, boundary);
                info!("{} records, {} pixels selected", before, selected.len());
                all.extend(selected);
            }
            Err(e) => error!("Error processing {:?}: {}", path, e),
        }
    }
    all
}

fn write_raster(
    grid: &RasterGrid,
    records: &[BreakRecord],
    params: &BreakRasterParams,
) -> Result<()> {
    let raster = grid.rasterize(records, params.nodata);
    let nodata = Some(params.nodata as f64);
    if same_crs(&params.source_crs, &params.target_crs) {
        write_geotiff_band(
            &params.output_raster,
            &raster,
            grid.geotransform(),
            &params.source_crs,
            nodata,
            TiffOptions::default(),
        )?;
        return Ok(());
    }
    let dir = tempfile::tempdir()?;
    let staged = dir.path().join("breaks_source.tif");
    // closed before gdalwarp reads it
    drop(write_geotiff_band(
        &staged,
        &raster,
        grid.geotransform(),
        &params.source_crs,
        nodata,
        TiffOptions::default(),
    )?);
    warp_to_crs(&staged, &params.output_raster, &params.target_crs, params.resampling)?;
    Ok(())
}

fn write_vector(path: &Path, records: &[BreakRecord], params: &BreakRasterParams) -> Result<usize> {
    let fields = [
        PointField {
            name: "tBreak",
            kind: OGRFieldType::OFTReal,
        },
        PointField {
            name: "tBreak_date",
            kind: OGRFieldType::OFTString,
        },
    ];
    let points: Vec<(f64, f64, Vec<FieldValue>)> = records
        .iter()
        .map(|r| {
            let date = r
                .t_break
                .and_then(date_from_millis)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            let millis = r.t_break.map(|t| t as f64).unwrap_or(f64::NAN);
            (
                r.x_coord,
                r.y_coord,
                vec![FieldValue::RealValue(millis), FieldValue::StringValue(date)],
            )
        })
        .collect();
    write_points_gpkg(
        path,
        "breaks",
        &params.source_crs,
        &params.target_crs,
        &fields,
        &points,
    )
}

/// Convert every break table of `params.input_dir` into the raster outputs
pub fn rasterize_breaks(params: &BreakRasterParams) -> Result<BreakReport> {
    create_parent(&params.output_raster)?;
    if let Some(vector) = &params.output_vector {
        create_parent(vector)?;
    }
    let window = date_window(params)?;

    let files = find_parquet_files(&params.input_dir)?;
    let mut report = BreakReport {
        files: files.len(),
        ..BreakReport::default()
    };
    if files.is_empty() {
        warn!("No parquet files found in {:?}", params.input_dir);
        return Ok(report);
    }
    info!("Found {} parquet files to process", files.len());
    if !window.is_open() {
        info!(
            "Date filtering: from {:?} to {:?}",
            params.search_start, params.search_end
        );
    }
    let boundary = match &params.boundary {
        Some(path) => {
            info!("Spatial filtering: using boundary from {:?}", path);
            Some(load_boundary(path, &params.source_crs)?)
        }
        None => None,
    };

    let records = collect_breaks(&files, &window, boundary.as_ref());
    report.records = records.len();
    let Some(grid) = RasterGrid::from_records(&records, params.resolution) else {
        warn!("No valid data found in any files (possibly due to filtering)");
        return Ok(report);
    };
    info!("Total points after all filtering: {}", records.len());

    let style = style_path(&params.output_raster);
    let dates = records
        .iter()
        .filter_map(|r| r.t_break.and_then(date_from_millis))
        .map(yyyymmdd);
    write_palette_qml(&style, &break_palette(dates, params.nodata))?;
    report.style = Some(style);

    info!(
        "Creating raster with dimensions: {} x {} at {} m",
        grid.width, grid.height, grid.resolution
    );
    write_raster(&grid, &records, params)?;
    report.raster = Some(params.output_raster.clone());
    report.width = grid.width;
    report.height = grid.height;

    if let Some(vector) = &params.output_vector {
        let saved = write_vector(vector, &records, params)?;
        info!("Vector points saved to {:?}: {}", vector, saved);
        report.vector = Some(vector.clone());
    }
    info!("Combined GeoTIFF saved to: {:?}", params.output_raster);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_sits_next_to_raster() {
        assert_eq!(
            style_path(Path::new("out/last_break_dates.tif")),
            PathBuf::from("out/last_break_dates_year_colors.qml")
        );
    }

    #[test]
    fn invalid_window_is_rejected() {
        let params = BreakRasterParams {
            search_start: Some("not a date".to_string()),
            ..BreakRasterParams::default()
        };
        assert!(date_window(&params).is_err());
    }

    #[test]
    fn empty_directory_produces_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let params = BreakRasterParams {
            input_dir: dir.path().to_path_buf(),
            output_raster: dir.path().join("out/breaks.tif"),
            ..BreakRasterParams::default()
        };
        let report = rasterize_breaks(&params).unwrap();
        assert_eq!(report.files, 0);
        assert!(report.raster.is_none());
        assert!(!params.output_raster.exists());
    }
}
