//! Per-pixel time-series archives: an HDF5 file holding pixel centre
//! coordinates (`xs`, `ys`) and a `values[date, band, pixel]` cube, plus the
//! acquisition dates stored as proleptic ordinals in a `.npy` file.
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use hdf5::{Dataset, File as H5File};
use ndarray::{Array1, Array2, s};
use ndarray_npy::ReadNpyExt;
use tracing::{info, warn};

use crate::core::dates::date_from_ordinal;
use crate::error::{Error, Result};

/// Sentinel marking missing acquisition dates in the ordinal file
pub const MISSING_ORDINAL: i64 = 65535;

/// Read acquisition dates from a `.npy` array of Gregorian ordinals.
///
/// The array may be stored as any integer or float dtype; entries equal to
/// [`MISSING_ORDINAL`] are dropped.
pub fn read_ordinal_dates(path: &Path) -> Result<Vec<NaiveDate>> {
    let ordinals = read_npy_as_i64(path)?;
    let mut dates = Vec::with_capacity(ordinals.len());
    for ord in ordinals {
        if ord == MISSING_ORDINAL {
            continue;
        }
        let date = date_from_ordinal(ord).ok_or_else(|| Error::InvalidDate {
            value: ord.to_string(),
        })?;
        dates.push(date);
    }
    Ok(dates)
}

fn read_npy_as_i64(path: &Path) -> Result<Vec<i64>> {
    if let Ok(a) = Array1::<i64>::read_npy(File::open(path)?) {
        return Ok(a.to_vec());
    }
    if let Ok(a) = Array1::<i32>::read_npy(File::open(path)?) {
        return Ok(a.iter().map(|&v| v as i64).collect());
    }
    if let Ok(a) = Array1::<u16>::read_npy(File::open(path)?) {
        return Ok(a.iter().map(|&v| v as i64).collect());
    }
    if let Ok(a) = Array1::<u32>::read_npy(File::open(path)?) {
        return Ok(a.iter().map(|&v| v as i64).collect());
    }
    let a = Array1::<f64>::read_npy(File::open(path)?)?;
    Ok(a.iter().map(|&v| v as i64).collect())
}

/// First archive in `dir` whose name matches `s2_images-NDVI_*ROINAV.h5`
pub fn find_archive(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("s2_images-NDVI_") && n.ends_with("ROINAV.h5"))
        })
        .collect();
    candidates.sort();
    Ok(candidates.into_iter().next())
}

/// Open pixel archive
pub struct PixelArchive {
    pub path: PathBuf,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    values: Dataset,
    /// `(dates, bands, pixels)`
    pub shape: (usize, usize, usize),
}

impl PixelArchive {
    pub fn open(path: &Path) -> Result<Self> {
        let file = H5File::open(path)?;
        let xs = file.dataset("xs")?.read_raw::<f64>()?;
        let ys = file.dataset("ys")?.read_raw::<f64>()?;
        let values = file.dataset("values")?;
        let dims = values.shape();
        if dims.len() != 3 {
            return Err(Error::Processing(format!(
                "expected a 3-D `values` dataset, got shape {:?}",
                dims
            )));
        }
        let shape = (dims[0], dims[1], dims[2]);
        if xs.len() != shape.2 || ys.len() != shape.2 {
            warn!(
                "Coordinate count ({}, {}) differs from pixel count {}",
                xs.len(),
                ys.len(),
                shape.2
            );
        }
        info!(
            "Opened archive {:?}: {} dates, {} bands, {} pixels",
            path, shape.0, shape.1, shape.2
        );
        Ok(Self {
            path: path.to_path_buf(),
            xs,
            ys,
            values,
            shape,
        })
    }

    pub fn num_pixels(&self) -> usize {
        self.xs.len().min(self.ys.len()).min(self.shape.2)
    }

    /// Time series of one pixel as `(date, band)`
    pub fn pixel_series(&self, pixel: usize) -> Result<Array2<i64>> {
        if pixel >= self.shape.2 {
            return Err(Error::InvalidArgument {
                arg: "pixel",
                value: pixel.to_string(),
            });
        }
        Ok(self.values.read_slice_2d::<i64, _>(s![.., .., pixel])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, array};
    use ndarray_npy::WriteNpyExt;

    #[test]
    fn ordinal_dates_skip_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tif_dates_ord.npy");
        let ords: Array1<f64> = array![737_425.0, 65535.0, 737_430.0];
        ords.write_npy(File::create(&path).unwrap()).unwrap();
        let dates = read_ordinal_dates(&path).unwrap();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2020, 1, 6).unwrap(),
            ]
        );
    }

    #[test]
    fn archive_lookup_by_pattern() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_archive(dir.path()).unwrap(), None);
        std::fs::write(dir.path().join("other.h5"), b"").unwrap();
        std::fs::write(dir.path().join("s2_images-NDVI_T29TME_ROINAV.h5"), b"").unwrap();
        let found = find_archive(dir.path()).unwrap().unwrap();
        assert!(found.ends_with("s2_images-NDVI_T29TME_ROINAV.h5"));
    }

    #[test]
    fn pixel_series_slices_last_axis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.h5");
        let cube = Array3::from_shape_fn((3, 2, 4), |(d, b, p)| (d * 100 + b * 10 + p) as u16);
        {
            let file = H5File::create(&path).unwrap();
            file.new_dataset_builder()
                .with_data(&array![1.0f64, 2.0, 3.0, 4.0])
                .create("xs")
                .unwrap();
            file.new_dataset_builder()
                .with_data(&array![5.0f64, 6.0, 7.0, 8.0])
                .create("ys")
                .unwrap();
            file.new_dataset_builder()
                .with_data(&cube)
                .create("values")
                .unwrap();
        }
        let archive = PixelArchive::open(&path).unwrap();
        assert_eq!(archive.shape, (3, 2, 4));
        assert_eq!(archive.num_pixels(), 4);
        let series = archive.pixel_series(2).unwrap();
        assert_eq!(series, array![[2, 12], [102, 112], [202, 212]]);
        assert!(archive.pixel_series(4).is_err());
    }
}
