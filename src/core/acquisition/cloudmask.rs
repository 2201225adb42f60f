//! s2cloudless-style cloud and cloud-shadow masking computed on fetched pixels.
//!
//! Clouds come from the per-pixel cloud probability. Shadows are dark, non-water
//! pixels lying within the projection of a cloud away from the sun. The union
//! is opened (eroded, then dilated) with disk elements to drop speckle and
//! buffer the remaining objects.
use ndarray::{Array2, Array3, Axis, Zip};
use tracing::debug;

use crate::core::params::CloudMaskParams;

/// Scene classification value for water
pub const SCL_WATER: u16 = 6;

/// Inputs of the mask for one window, all on the same grid
pub struct MaskInputs<'a> {
    pub probability: &'a Array2<u16>,
    pub nir: &'a Array2<u16>,
    pub scl: &'a Array2<u16>,
    pub nodata: u16,
    /// Mean solar azimuth of the scene, degrees clockwise from north
    pub solar_azimuth: f64,
    /// Pixel size in metres
    pub pixel_size: f64,
}

/// Offsets of a disk of the given pixel radius
pub fn disk_offsets(radius: usize) -> Vec<(isize, isize)> {
    let r = radius as isize;
    let mut offsets = Vec::new();
    for dr in -r..=r {
        for dc in -r..=r {
            if dr * dr + dc * dc <= r * r {
                offsets.push((dr, dc));
            }
        }
    }
    offsets
}

fn in_bounds(r: isize, c: isize, rows: usize, cols: usize) -> bool {
    r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols
}

/// Minimum filter on a boolean image; out-of-image neighbours are ignored
pub fn erode(mask: &Array2<bool>, radius: usize) -> Array2<bool> {
    if radius == 0 {
        return mask.clone();
    }
    let (rows, cols) = mask.dim();
    let offsets = disk_offsets(radius);
    let mut out = Array2::<bool>::from_elem((rows, cols), false);
    Zip::indexed(&mut out).par_for_each(|(r, c), o| {
        if !mask[[r, c]] {
            return;
        }
        *o = offsets.iter().all(|&(dr, dc)| {
            let (rr, cc) = (r as isize + dr, c as isize + dc);
            !in_bounds(rr, cc, rows, cols) || mask[[rr as usize, cc as usize]]
        });
    });
    out
}

/// Maximum filter on a boolean image
pub fn dilate(mask: &Array2<bool>, radius: usize) -> Array2<bool> {
    if radius == 0 {
        return mask.clone();
    }
    let (rows, cols) = mask.dim();
    let offsets = disk_offsets(radius);
    let mut out = Array2::<bool>::from_elem((rows, cols), false);
    Zip::indexed(&mut out).par_for_each(|(r, c), o| {
        *o = offsets.iter().any(|&(dr, dc)| {
            let (rr, cc) = (r as isize + dr, c as isize + dc);
            in_bounds(rr, cc, rows, cols) && mask[[rr as usize, cc as usize]]
        });
    });
    out
}

/// Pixels reached by casting each `true` pixel of `clouds` up to `max_steps`
/// pixels away from the sun.
pub fn project_shadows(clouds: &Array2<bool>, solar_azimuth: f64, max_steps: usize) -> Array2<bool> {
    let (rows, cols) = clouds.dim();
    let az = solar_azimuth.to_radians();
    // walking from a candidate shadow pixel towards the sun until a cloud is met
    let step_col = az.sin();
    let step_row = -az.cos();
    let mut out = Array2::<bool>::from_elem((rows, cols), false);
    Zip::indexed(&mut out).par_for_each(|(r, c), o| {
        for k in 0..=max_steps {
            let rr = r as isize + (k as f64 * step_row).round() as isize;
            let cc = c as isize + (k as f64 * step_col).round() as isize;
            if !in_bounds(rr, cc, rows, cols) {
                break;
            }
            if clouds[[rr as usize, cc as usize]] {
                *o = true;
                break;
            }
        }
    });
    out
}

/// `(projection steps, erosion radius, dilation radius)` in pixels
fn mask_radii(params: &CloudMaskParams, pixel_size: f64) -> (usize, usize, usize) {
    let steps = (params.projection_distance_km * 1000.0 / pixel_size).round() as usize;
    let erode_px = (params.erosion_m / pixel_size).round() as usize;
    let dilate_px = (2.0 * params.buffer_m / pixel_size).round() as usize;
    (steps, erode_px, dilate_px)
}

/// Margin, in pixels, around a window whose content can still change the
/// mask inside it
pub fn mask_halo(params: &CloudMaskParams, pixel_size: f64) -> usize {
    let (steps, erode_px, dilate_px) = mask_radii(params, pixel_size);
    steps + erode_px + dilate_px
}

/// Combined cloud/shadow mask; `true` marks pixels to discard
pub fn cloud_shadow_mask(inputs: &MaskInputs<'_>, params: &CloudMaskParams) -> Array2<bool> {
    let nodata = inputs.nodata;
    let threshold = params.cloud_probability;
    let clouds = inputs
        .probability
        .mapv(|p| p != nodata && p > threshold);

    let dark_limit = params.nir_dark_threshold * params.reflectance_scale;
    let mut dark = Array2::<bool>::from_elem(inputs.nir.dim(), false);
    Zip::from(&mut dark)
        .and(inputs.nir)
        .and(inputs.scl)
        .for_each(|d, &nir, &scl| {
            *d = nir != nodata && (nir as f64) < dark_limit && scl != SCL_WATER;
        });

    let (steps, erode_px, dilate_px) = mask_radii(params, inputs.pixel_size);
    let projection = project_shadows(&clouds, inputs.solar_azimuth, steps);

    let mut combined = clouds;
    Zip::from(&mut combined)
        .and(&projection)
        .and(&dark)
        .for_each(|m, &p, &d| *m = *m || (p && d));

    let opened = dilate(&erode(&combined, erode_px), dilate_px);
    debug!(
        "Cloud/shadow mask: {} of {} pixels (erode {} px, dilate {} px, projection {} px)",
        opened.iter().filter(|&&m| m).count(),
        opened.len(),
        erode_px,
        dilate_px,
        steps
    );
    opened
}

/// Set every band of masked pixels to `nodata`
pub fn apply_mask(stack: &mut Array3<u16>, mask: &Array2<bool>, nodata: u16) {
    for mut band in stack.axis_iter_mut(Axis(0)) {
        Zip::from(&mut band).and(mask).for_each(|v, &m| {
            if m {
                *v = nodata;
            }
        });
    }
}
