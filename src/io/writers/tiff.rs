use gdal::Dataset;
use gdal::DriverManager;
use gdal::Metadata;
use gdal::cpl::CslStringList;
use gdal::raster::{Buffer, ColorInterpretation, GdalType};
use gdal::spatial_ref::SpatialRef;
use ndarray::{Array2, Axis};
use std::path::Path;

use crate::io::gdal::{GdalError, RasterStack};

/// GeoTIFF creation settings
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffOptions {
    /// LZW-compress the output
    pub lzw: bool,
}

fn creation_options(opts: TiffOptions) -> Result<CslStringList, GdalError> {
    let mut list = CslStringList::new();
    if opts.lzw {
        list.set_name_value("COMPRESS", "LZW")?;
    }
    Ok(list)
}

fn georeference(ds: &mut Dataset, geotransform: [f64; 6], projection: &str) -> Result<(), GdalError> {
    ds.set_geo_transform(&geotransform)?;
    if !projection.is_empty() {
        let srs = SpatialRef::from_definition(projection)?;
        ds.set_spatial_ref(&srs)?;
    }
    Ok(())
}

/// Write a single-band georeferenced GeoTIFF
pub fn write_geotiff_band<T: GdalType + Copy>(
    output: &Path,
    data: &Array2<T>,
    geotransform: [f64; 6],
    projection: &str,
    nodata: Option<f64>,
    opts: TiffOptions,
) -> Result<Dataset, GdalError> {
    let (rows, cols) = data.dim();
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let options = creation_options(opts)?;
    let mut ds =
        driver.create_with_band_type_with_options::<T, _>(output, cols, rows, 1, &options)?;
    georeference(&mut ds, geotransform, projection)?;
    let mut band = ds.rasterband(1)?;
    band.set_no_data_value(nodata)?;
    let mut buf = Buffer::new((cols, rows), data.iter().copied().collect());
    band.write((0, 0), (cols, rows), &mut buf)?;
    Ok(ds)
}

/// Write every band of a stack to a georeferenced GeoTIFF, naming bands after `band_names`
pub fn write_geotiff_stack<T: GdalType + Copy>(
    output: &Path,
    stack: &RasterStack<T>,
    band_names: &[String],
    opts: TiffOptions,
) -> Result<Dataset, GdalError> {
    let (bands, rows, cols) = stack.data.dim();
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let options = creation_options(opts)?;
    let mut ds =
        driver.create_with_band_type_with_options::<T, _>(output, cols, rows, bands, &options)?;
    georeference(&mut ds, stack.geotransform, &stack.projection)?;

    for (b, plane) in stack.data.axis_iter(Axis(0)).enumerate() {
        let mut handle = ds.rasterband(b + 1)?;
        handle.set_color_interpretation(ColorInterpretation::GrayIndex)?;
        handle.set_no_data_value(stack.nodata)?;
        if let Some(name) = band_names.get(b) {
            handle.set_description(name)?;
        }
        let mut buf = Buffer::new((cols, rows), plane.iter().copied().collect());
        handle.write((0, 0), (cols, rows), &mut buf)?;
    }

    Ok(ds)
}
