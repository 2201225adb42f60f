use gdal::raster::GdalType;
use gdal::{Dataset, Metadata, errors::GdalError as GdalCrateError};
use ndarray::{Array2, Array3, Axis};
use std::path::Path;
use thiserror::Error;

/// Errors encountered when using GDAL reader
#[derive(Debug, Error)]
pub enum GdalError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Dimension mismatch: expected {0}x{1}, got {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),
    #[error("Grid mismatch: {0}")]
    GridMismatch(String),
    #[error("gdalwarp failed: {0}")]
    Warp(String),
}

/// Metadata extracted from a GDAL-supported dataset
#[derive(Debug, Clone)]
pub struct GdalMetadata {
    /// Width (pixels) of the raster
    pub size_x: usize,
    /// Height (lines) of the raster
    pub size_y: usize,
    /// Number of raster bands
    pub bands: usize,
    /// Affine geotransform coefficients ([origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height])
    pub geotransform: [f64; 6],
    /// Projection as `EPSG:XXXX` when an authority code is present, WKT otherwise
    pub projection: String,
    /// Nodata value of the first band
    pub nodata: Option<f64>,
}

/// Multi-band raster held in memory as `(band, row, col)`
#[derive(Debug, Clone)]
pub struct RasterStack<T> {
    pub data: Array3<T>,
    pub geotransform: [f64; 6],
    pub projection: String,
    pub nodata: Option<f64>,
}

impl<T> RasterStack<T> {
    pub fn bands(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn rows(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn cols(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// `(min_x, min_y, max_x, max_y)` of a north-up raster
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let gt = &self.geotransform;
        let x0 = gt[0];
        let x1 = gt[0] + gt[1] * self.cols() as f64;
        let y0 = gt[3];
        let y1 = gt[3] + gt[5] * self.rows() as f64;
        (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }
}

/// Reader for GeoTIFFs and other GDAL rasters
pub struct GeoRasterReader {
    pub dataset: Dataset,
    pub metadata: GdalMetadata,
}

/// Extract an `EPSG:XXXX` code from a WKT authority tag
pub fn parse_epsg(wkt: &str) -> Option<String> {
    for key in ["AUTHORITY[\"EPSG\",\"", "ID[\"EPSG\","] {
        if let Some(idx) = wkt.rfind(key) {
            let start = idx + key.len();
            let code: String = wkt[start..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if !code.is_empty() {
                return Some(format!("EPSG:{}", code));
            }
        }
    }
    None
}

/// Normalize a projection string to `EPSG:XXXX` when possible
pub fn normalize_projection(proj: &str) -> String {
    if proj.starts_with("EPSG:") {
        proj.to_string()
    } else if let Some(code) = parse_epsg(proj) {
        code
    } else {
        proj.to_string()
    }
}

/// Whether two CRS definitions name the same EPSG code
pub fn same_crs(a: &str, b: &str) -> bool {
    normalize_projection(a).eq_ignore_ascii_case(&normalize_projection(b))
}

impl GeoRasterReader {
    /// Open a GDAL-supported dataset (GeoTIFF, VRT, ...)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GdalError> {
        let dataset = Dataset::open(path.as_ref())?;
        let (size_x, size_y) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(GdalError::UnsupportedFormat("No raster bands found".into()));
        }
        let geotransform = match dataset.geo_transform() {
            Ok(gt) => gt,
            Err(_) => [0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        };
        let projection = normalize_projection(&dataset.projection());
        let nodata = dataset.rasterband(1)?.no_data_value();
        Ok(GeoRasterReader {
            dataset,
            metadata: GdalMetadata {
                size_x,
                size_y,
                bands,
                geotransform,
                projection,
                nodata,
            },
        })
    }

    /// Read a single band (1-based index) as an ndarray of shape (height, width)
    pub fn read_band<T: GdalType + Copy>(&self, index: usize) -> Result<Array2<T>, GdalError> {
        if index == 0 || index > self.metadata.bands {
            return Err(GdalError::UnsupportedFormat(format!(
                "Band index {} out of range",
                index
            )));
        }
        let band = self.dataset.rasterband(index)?;
        let window = (self.metadata.size_x, self.metadata.size_y);
        let buf = band.read_as::<T>((0, 0), window, window, None)?;
        Array2::from_shape_vec((self.metadata.size_y, self.metadata.size_x), buf.data().to_vec())
            .map_err(|_| {
                GdalError::DimensionMismatch(
                    self.metadata.size_x,
                    self.metadata.size_y,
                    self.metadata.size_x,
                    self.metadata.size_y,
                )
            })
    }

    /// Read every band into a `(band, row, col)` stack
    pub fn read_stack<T: GdalType + Copy + Default>(&self) -> Result<RasterStack<T>, GdalError> {
        let (rows, cols) = (self.metadata.size_y, self.metadata.size_x);
        let mut data = Array3::<T>::default((self.metadata.bands, rows, cols));
        for b in 0..self.metadata.bands {
            let band = self.read_band::<T>(b + 1)?;
            data.index_axis_mut(Axis(0), b).assign(&band);
        }
        Ok(RasterStack {
            data,
            geotransform: self.metadata.geotransform,
            projection: self.metadata.projection.clone(),
            nodata: self.metadata.nodata,
        })
    }

    /// Band descriptions, in band order (empty strings when unset)
    pub fn band_descriptions(&self) -> Result<Vec<String>, GdalError> {
        let mut names = Vec::with_capacity(self.metadata.bands);
        for b in 1..=self.metadata.bands {
            names.push(self.dataset.rasterband(b)?.description()?);
        }
        Ok(names)
    }
}
