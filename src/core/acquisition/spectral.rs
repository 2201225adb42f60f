use ndarray::{Array2, Zip};

/// Band name that triggers the locally computed index
pub const NDVI_BAND: &str = "ndvi";

/// Upper clamp of scaled NDVI values
pub const NDVI_MAX: i32 = 5000;

/// Scaled NDVI, `(nir - red) / (nir + red) * 10000` truncated and clamped to
/// `[0, 5000]`. Pixels where either input is nodata or the sum is zero get `nodata`.
pub fn ndvi(red: &Array2<u16>, nir: &Array2<u16>, nodata: u16) -> Array2<u16> {
    let mut out = Array2::<u16>::from_elem(red.dim(), nodata);
    Zip::from(&mut out)
        .and(red)
        .and(nir)
        .par_for_each(|o, &r, &n| {
            if r == nodata || n == nodata {
                return;
            }
            let sum = r as f64 + n as f64;
            if sum == 0.0 {
                return;
            }
            let v = ((n as f64 - r as f64) / sum * 10_000.0) as i32;
            *o = v.clamp(0, NDVI_MAX) as u16;
        });
    out
}
