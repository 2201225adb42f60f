//! Per-date mosaics: merge downloaded subtiles, clip to a boundary, turn
//! all-zero pixels into nodata and write the final GeoTIFF.
use std::path::{Path, PathBuf};

use ndarray::{Array3, Axis, s};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::io::gdal::{GdalError, GeoRasterReader, RasterStack};
use crate::io::vector::Boundary;
use crate::io::writers::tiff::{TiffOptions, write_geotiff_stack};

/// What happened to one acquisition date
#[derive(Debug, Clone, PartialEq)]
pub enum MosaicOutcome {
    Written { path: PathBuf, zeroed: usize },
    /// The date folder held no subtiles
    NoParts,
    /// Nothing valid remained after clipping; the date folder was removed
    OutsideBoundary,
}

/// `.tif` files of `dir` whose name contains `date_millis`, sorted by name
pub fn find_date_parts(dir: &Path, date_millis: i64) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let key = date_millis.to_string();
    let mut parts: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".tif") && n.contains(&key))
        })
        .collect();
    parts.sort();
    Ok(parts)
}

fn off_grid(offset: f64, step: f64) -> bool {
    let cells = offset / step;
    (cells - cells.round()).abs() > 1e-6
}

/// Same north-up pixel size as `reference`, origin a whole number of pixels away
fn check_alignment(reference: &RasterStack<u16>, stack: &RasterStack<u16>) -> Result<()> {
    let [x0, px, rx, y0, ry, py] = reference.geotransform;
    let gt = stack.geotransform;
    let same_size = (gt[1] - px).abs() <= px.abs() * 1e-9 && (gt[5] - py).abs() <= py.abs() * 1e-9;
    if !same_size || gt[2] != rx || gt[4] != ry {
        return Err(GdalError::GridMismatch(format!(
            "pixel size {}x{} differs from {}x{}",
            gt[1], gt[5], px, py
        ))
        .into());
    }
    if off_grid(gt[0] - x0, px) || off_grid(gt[3] - y0, py) {
        return Err(GdalError::GridMismatch(format!(
            "origin ({}, {}) is not aligned with ({}, {})",
            gt[0], gt[3], x0, y0
        ))
        .into());
    }
    Ok(())
}

/// Merge stacks onto their union extent; the first stack with a valid value
/// for a pixel wins. All stacks must share pixel size and band count.
pub fn merge_first(stacks: &[RasterStack<u16>], nodata: u16) -> Result<RasterStack<u16>> {
    let first = stacks
        .first()
        .ok_or_else(|| Error::Processing("nothing to merge".to_string()))?;
    let px = first.geotransform[1];
    let py = first.geotransform[5].abs();
    let bands = first.bands();

    let (mut min_x, mut min_y, mut max_x, mut max_y) = first.bounds();
    for stack in &stacks[1..] {
        if stack.bands() != bands {
            return Err(Error::Processing(format!(
                "cannot merge {} bands with {} bands",
                stack.bands(),
                bands
            )));
        }
        check_alignment(first, stack)?;
        let (x0, y0, x1, y1) = stack.bounds();
        min_x = min_x.min(x0);
        min_y = min_y.min(y0);
        max_x = max_x.max(x1);
        max_y = max_y.max(y1);
    }
    let cols = ((max_x - min_x) / px).round() as usize;
    let rows = ((max_y - min_y) / py).round() as usize;
    let mut data = Array3::<u16>::from_elem((bands, rows, cols), nodata);

    for stack in stacks {
        let col0 = ((stack.geotransform[0] - min_x) / px).round() as usize;
        let row0 = ((max_y - stack.geotransform[3]) / py).round() as usize;
        let (r, c) = (stack.rows(), stack.cols());
        if row0 + r > rows || col0 + c > cols {
            return Err(GdalError::DimensionMismatch(cols, rows, col0 + c, row0 + r).into());
        }
        let mut dst = data.slice_mut(s![.., row0..row0 + r, col0..col0 + c]);
        ndarray::Zip::from(&mut dst).and(&stack.data).for_each(|d, &v| {
            if *d == nodata && v != nodata {
                *d = v;
            }
        });
    }

    Ok(RasterStack {
        data,
        geotransform: [min_x, px, 0.0, max_y, 0.0, -py],
        projection: first.projection.clone(),
        nodata: Some(nodata as f64),
    })
}

/// Crop to the boundary's bounding box and blank pixels whose centre is not
/// within it. `None` when nothing valid remains.
pub fn clip_to_boundary(
    stack: &RasterStack<u16>,
    boundary: &Boundary,
    nodata: u16,
) -> Option<RasterStack<u16>> {
    let bbox = boundary.bbox()?;
    let gt = stack.geotransform;
    let (px, py) = (gt[1], gt[5].abs());
    let clamp = |v: f64, max: usize| v.max(0.0).min(max as f64) as usize;
    let col0 = clamp(((bbox.min().x - gt[0]) / px).floor(), stack.cols());
    let col1 = clamp(((bbox.max().x - gt[0]) / px).ceil(), stack.cols());
    let row0 = clamp(((gt[3] - bbox.max().y) / py).floor(), stack.rows());
    let row1 = clamp(((gt[3] - bbox.min().y) / py).ceil(), stack.rows());
    if col0 >= col1 || row0 >= row1 {
        return None;
    }

    let mut data = stack.data.slice(s![.., row0..row1, col0..col1]).to_owned();
    let origin_x = gt[0] + col0 as f64 * px;
    let origin_y = gt[3] - row0 as f64 * py;
    let mut valid = 0usize;
    for r in 0..row1 - row0 {
        let y = origin_y - (r as f64 + 0.5) * py;
        for c in 0..col1 - col0 {
            let x = origin_x + (c as f64 + 0.5) * px;
            if boundary.within(x, y) {
                if data.slice(s![.., r, c]).iter().any(|&v| v != nodata) {
                    valid += 1;
                }
            } else {
                data.slice_mut(s![.., r, c]).fill(nodata);
            }
        }
    }
    if valid == 0 {
        return None;
    }
    Some(RasterStack {
        data,
        geotransform: [origin_x, px, 0.0, origin_y, 0.0, -py],
        projection: stack.projection.clone(),
        nodata: Some(nodata as f64),
    })
}

/// Set pixels that are 0 in every band to `nodata`; returns how many changed
pub fn zero_to_nodata(stack: &mut RasterStack<u16>, nodata: u16) -> usize {
    let (_, rows, cols) = stack.data.dim();
    let mut changed = 0;
    for r in 0..rows {
        for c in 0..cols {
            let mut pixel = stack.data.slice_mut(s![.., r, c]);
            if pixel.iter().all(|&v| v == 0) {
                pixel.fill(nodata);
                changed += 1;
            }
        }
    }
    changed
}

/// Build the mosaic of one acquisition date from the subtiles in `date_dir`.
///
/// The date folder is removed once the mosaic is written, or when nothing
/// remains after clipping.
pub fn build_mosaic(
    date_dir: &Path,
    output: &Path,
    date_millis: i64,
    boundary: Option<&Boundary>,
    band_names: &[String],
    nodata: u16,
) -> Result<MosaicOutcome> {
    let parts = find_date_parts(date_dir, date_millis)?;
    if parts.is_empty() {
        warn!("No TIFF files found for date {}", date_millis);
        return Ok(MosaicOutcome::NoParts);
    }
    debug!("Merging {} subtiles for {}", parts.len(), date_millis);
    let mut stacks = Vec::with_capacity(parts.len());
    for part in &parts {
        stacks.push(GeoRasterReader::open(part)?.read_stack::<u16>()?);
    }
    let merged = merge_first(&stacks, nodata)?;
    drop(stacks);

    let mut mosaic = match boundary {
        Some(b) => match clip_to_boundary(&merged, b, nodata) {
            Some(clipped) => clipped,
            None => {
                info!(
                    "Image {} does not intersect the boundary or is entirely nodata; removing {:?}",
                    date_millis, date_dir
                );
                std::fs::remove_dir_all(date_dir)?;
                return Ok(MosaicOutcome::OutsideBoundary);
            }
        },
        None => merged,
    };

    let zeroed = zero_to_nodata(&mut mosaic, nodata);
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_geotiff_stack(output, &mosaic, band_names, TiffOptions { lzw: true })?;
    std::fs::remove_dir_all(date_dir)?;
    info!(
        "Mosaic written to {:?} ({} bands, {}x{}, {} all-zero pixels set to nodata)",
        output,
        mosaic.data.len_of(Axis(0)),
        mosaic.cols(),
        mosaic.rows(),
        zeroed
    );
    Ok(MosaicOutcome::Written {
        path: output.to_path_buf(),
        zeroed,
    })
}
