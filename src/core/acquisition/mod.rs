//! Sentinel-2 tile acquisition: scene selection, subtile download with
//! s2cloudless masking, and per-date mosaics clipped to a boundary.
pub mod cloudmask;
pub mod grid;
pub mod mosaic;
pub mod pipeline;
pub mod spectral;

pub use grid::{PixelGrid, Subtile};
pub use mosaic::MosaicOutcome;
pub use pipeline::{DownloadReport, ScenePair, download_tile, select_scenes};
