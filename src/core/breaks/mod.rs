//! Change-detection break records to a dated raster: per-pixel selection,
//! rasterization, year-based styling and optional point output.
pub mod grid;
pub mod pipeline;
pub mod select;
pub mod style;

pub use grid::RasterGrid;
pub use pipeline::{BreakReport, rasterize_breaks};
pub use select::{DateWindow, select_break};
