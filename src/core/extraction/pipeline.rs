//! Per-pixel observation extraction over reference events, one Parquet
//! table per run (year for yearly datasets).
use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};

use super::events::{ReferenceEvent, load_events, reference_path};
use super::table::{ObservationRow, observation_table};
use super::window::pixel_window;
use crate::core::params::ExtractionParams;
use crate::error::{Error, Result};
use crate::io::archive::{PixelArchive, find_archive, read_ordinal_dates};
use crate::io::parquet::write_table;

/// Summary of an extraction run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionReport {
    pub outputs: Vec<PathBuf>,
    pub rows: usize,
    /// Runs skipped for a missing archive or unreadable reference layer
    pub skipped_runs: Vec<String>,
}

/// Output table of a run
pub fn output_path(params: &ExtractionParams, year: Option<&str>) -> PathBuf {
    params.output_dir.join(&params.tile_id).join(format!(
        "{}_{}_{}.parquet",
        params.dataset.label(),
        params.tile_id,
        year.unwrap_or("UNICO")
    ))
}

fn id_order(id: &str) -> (Option<i64>, String) {
    (id.parse::<i64>().ok(), id.to_string())
}

/// Pixel centres sorted by x, so the pixels under a bounding box are found
/// with two binary searches instead of a full scan.
pub struct PixelIndex<'a> {
    xs: &'a [f64],
    ys: &'a [f64],
    order: Vec<usize>,
    sorted_xs: Vec<f64>,
}

impl<'a> PixelIndex<'a> {
    pub fn new(xs: &'a [f64], ys: &'a [f64]) -> Self {
        let n = xs.len().min(ys.len());
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| xs[a].total_cmp(&xs[b]));
        let sorted_xs = order.iter().map(|&i| xs[i]).collect();
        Self {
            xs,
            ys,
            order,
            sorted_xs,
        }
    }

    /// Pixels strictly within `event`, in ascending pixel order
    pub fn pixels_within(&self, event: &ReferenceEvent) -> Vec<usize> {
        let Some(bbox) = event.shape.bbox() else {
            return Vec::new();
        };
        let (min, max) = (bbox.min(), bbox.max());
        let lo = self.sorted_xs.partition_point(|&x| x < min.x);
        let hi = self.sorted_xs.partition_point(|&x| x <= max.x);
        let mut hits: Vec<usize> = self.order[lo..hi]
            .iter()
            .copied()
            .filter(|&i| {
                let y = self.ys[i];
                y >= min.y && y <= max.y && event.shape.within(self.xs[i], y)
            })
            .collect();
        hits.sort_unstable();
        hits
    }
}

/// Pixels strictly within each event, grouped by event id in id order. An id
/// shared by several polygons takes the dates of its first polygon.
pub fn join_pixels(
    events: &[ReferenceEvent],
    xs: &[f64],
    ys: &[f64],
) -> Vec<(usize, Vec<usize>)> {
    let index = PixelIndex::new(xs, ys);
    let hits: Vec<Vec<usize>> = events
        .par_iter()
        .map(|event| index.pixels_within(event))
        .collect();

    let mut groups: BTreeMap<(Option<i64>, String), (usize, Vec<usize>)> = BTreeMap::new();
    for (e, pixels) in hits.into_iter().enumerate() {
        let entry = groups
            .entry(id_order(&events[e].id))
            .or_insert_with(|| (e, Vec::new()));
        entry.1.extend(pixels);
    }
    for (_, pixels) in groups.values_mut() {
        pixels.sort_unstable();
    }

    let ignored: Vec<&str> = groups
        .iter()
        .filter(|(_, (_, p))| p.is_empty())
        .map(|(k, _)| k.1.as_str())
        .collect();
    if !ignored.is_empty() {
        info!("Ignored geometries: {:?}", ignored);
    }
    groups
        .into_values()
        .filter(|(_, pixels)| !pixels.is_empty())
        .collect()
}

/// Rows of every pixel of every event
pub fn extract_rows(
    archive: &PixelArchive,
    events: &[ReferenceEvent],
    dates: &[NaiveDate],
    params: &ExtractionParams,
) -> Result<Vec<ObservationRow>> {
    let (archive_dates, bands, _) = archive.shape;
    if archive_dates != dates.len() {
        warn!(
            "Archive has {} dates but the date file lists {}; using the first {}",
            archive_dates,
            dates.len(),
            archive_dates.min(dates.len())
        );
    }
    if bands != params.band_names.len() {
        return Err(Error::Processing(format!(
            "archive has {} bands, {} band names configured",
            bands,
            params.band_names.len()
        )));
    }
    let n = archive.num_pixels();
    let groups = join_pixels(events, &archive.xs[..n], &archive.ys[..n]);

    let mut rows = Vec::new();
    for (e, pixels) in groups {
        let event = &events[e];
        let mid = event.data_mid();
        info!(
            "Processing geometry ID: {}, buffer_ID: {}, number of pixels: {}",
            event.id,
            event.buffer_id,
            pixels.len()
        );
        for pixel in pixels {
            let series = archive.pixel_series(pixel)?;
            let window = pixel_window(series.view(), dates, mid, params.n_obs, params.nodata);
            rows.push(ObservationRow {
                x: archive.xs[pixel],
                y: archive.ys[pixel],
                idx_h5: pixel,
                data_0: event.data_0,
                data_1: event.data_1,
                data_mid: mid,
                window,
                id: event.id.clone(),
                buffer_id: event.buffer_id.clone(),
            });
        }
    }
    Ok(rows)
}

/// One run: `Ok(None)` when its inputs are missing
pub fn extract_run(params: &ExtractionParams, year: Option<&str>) -> Result<Option<(PathBuf, usize)>> {
    info!(
        "Processing {} | Year: {}",
        params.dataset,
        year.unwrap_or("N/A")
    );
    let tile_dir = params.archive_dir.join(&params.tile_id);
    let Some(h5_path) = find_archive(&tile_dir)? else {
        warn!("No .h5 file found in {:?}", tile_dir);
        return Ok(None);
    };
    info!("Selected HDF5: {:?}", h5_path);

    let shp = reference_path(params, year);
    let events = match load_events(&shp, params.dataset, params.crs_epsg) {
        Ok(events) => events,
        Err(e) => {
            error!("Error loading shapefile {:?}: {}", shp, e);
            return Ok(None);
        }
    };
    let dates = read_ordinal_dates(&tile_dir.join("tif_dates_ord.npy"))?;
    let archive = PixelArchive::open(&h5_path)?;
    let rows = extract_rows(&archive, &events, &dates, params)?;

    let table = observation_table(&rows, &params.band_names, params.n_obs);
    let output = output_path(params, year);
    write_table(table, &output)?;
    info!("Parquet file saved at: {:?} ({} rows)", output, rows.len());
    Ok(Some((output, rows.len())))
}

/// Every run of the configured dataset
pub fn run_extraction(params: &ExtractionParams) -> Result<ExtractionReport> {
    let mut report = ExtractionReport::default();
    for year in params.runs() {
        let label = year.clone().unwrap_or_else(|| "UNICO".to_string());
        match extract_run(params, year.as_deref())? {
            Some((path, rows)) => {
                report.outputs.push(path);
                report.rows += rows;
            }
            None => report.skipped_runs.push(label),
        }
    }
    Ok(report)
}
