#![doc = r#"
s2pipe: Sentinel-2 acquisition, per-pixel observation extraction and
change-break rasterization.

The crate bundles three independent load → transform → write pipelines used in
forest-disturbance studies:

1. **Acquisition**: list Sentinel-2 scenes of an MGRS tile through the imagery
   REST API, download each scene as `n × n` GeoTIFF subtiles with s2cloudless
   cloud/shadow masking, and assemble one mosaic per date clipped to a boundary.
2. **Extraction**: for every pixel of a dated reference polygon, read the pixel
   time series from an HDF5 archive and keep the observations just before and
   after the event, written as a Parquet table.
3. **Break rasters**: select one change-detection break per pixel from Parquet
   tables and burn its date into an `Int32` GeoTIFF with a QGIS year palette.

Requirements
------------
- GDAL (with PROJ) development headers and runtime, plus `gdalwarp` on `PATH`
  for reprojection.
- HDF5 libraries for the extraction pipeline.
- Rust 2024 edition toolchain.

Quick start: rasterize break tables
-----------------------------------
```rust,no_run
use std::path::PathBuf;
use s2pipe::{rasterize_breaks, BreakRasterParams};

fn main() -> s2pipe::Result<()> {
    let params = BreakRasterParams {
        input_dir: PathBuf::from("/data/ccd_breaks"),
        output_raster: PathBuf::from("/out/last_break_dates.tif"),
        search_start: Some("2020-01-01".to_string()),
        search_end: Some("2023-12-31".to_string()),
        ..BreakRasterParams::default()
    };
    let report = rasterize_breaks(&params)?;
    println!("{} pixels in a {}x{} raster", report.records, report.width, report.height);
    Ok(())
}
```

Extract observations around reference events
--------------------------------------------
```rust,no_run
use s2pipe::{extract_observations, ExtractionParams, ReferenceDataset};

fn main() -> s2pipe::Result<()> {
    let params = ExtractionParams {
        dataset: ReferenceDataset::Nvg,
        tile_id: "T29TNE".to_string(),
        ..ExtractionParams::default()
    };
    let report = extract_observations(&params)?;
    for path in &report.outputs {
        println!("wrote {}", path.display());
    }
    Ok(())
}
```

Download a tile
---------------
```rust,no_run
use s2pipe::{download_tile, DownloadParams};

fn main() -> s2pipe::Result<()> {
    let params = DownloadParams {
        tile: "T29SPD".to_string(),
        date_start: "2023-06-01".to_string(),
        date_end: "2023-07-01".to_string(),
        project: "my-cloud-project".to_string(),
        ..DownloadParams::default()
    };
    let token = std::env::var("EE_ACCESS_TOKEN").ok();
    let report = download_tile(&params, token)?;
    println!("{} mosaics", report.mosaics.len());
    Ok(())
}
```

Error handling
--------------
All public functions return `s2pipe::Result<T>`; match on `s2pipe::Error` for
specific cases.

```rust,no_run
use s2pipe::{rasterize_breaks, BreakRasterParams, Error};

fn main() {
    match rasterize_breaks(&BreakRasterParams::default()) {
        Ok(_) => {}
        Err(Error::Gdal(e)) => eprintln!("GDAL error: {e}"),
        Err(Error::MissingColumn { column, source_name }) => {
            eprintln!("{source_name} has no {column} column")
        }
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`]: high-level entry points.
- [`core`]: parameters, date helpers and the pipeline internals.
- [`io`]: GDAL rasters/vectors, imagery catalog, HDF5 archives, Parquet tables, writers.
- [`types`]: shared enums.
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use core::params::{BreakRasterParams, CloudMaskParams, DownloadParams, ExtractionParams};
pub use error::{Error, Result};
pub use types::{CloudFilter, ReferenceDataset, Resampling};

// Reports
pub use core::acquisition::DownloadReport;
pub use core::breaks::BreakReport;
pub use core::extraction::ExtractionReport;

// Readers and clients
pub use io::earthengine::{CatalogError, EarthEngineClient, ImageCatalog, SceneInfo};
pub use io::gdal::{GdalError, GdalMetadata, GeoRasterReader, RasterStack};

// High-level API re-exports
pub use api::{
    download_tile, download_tile_with, extract_observations, rasterize_breaks, save_report,
};
