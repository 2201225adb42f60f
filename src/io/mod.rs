//! I/O layer: GDAL-backed rasters and vectors, the imagery catalog client,
//! HDF5 pixel archives, Parquet tables and `writers` for GeoTIFF, warping
//! and QGIS styles.
pub mod archive;
pub mod earthengine;
pub use earthengine::{CatalogError, EarthEngineClient, ImageCatalog, SceneInfo};

pub mod gdal;
pub use gdal::{GdalError, GdalMetadata, GeoRasterReader, RasterStack};

pub mod parquet;
pub mod vector;
pub mod writers;
