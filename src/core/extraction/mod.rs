//! Per-pixel observation windows around dated reference events, read from
//! an HDF5 pixel archive and written as Parquet tables.
pub mod events;
pub mod pipeline;
pub mod table;
pub mod window;

pub use events::ReferenceEvent;
pub use pipeline::{ExtractionReport, extract_run, run_extraction};
pub use table::ObservationRow;
pub use window::{ObservationWindow, pixel_window};
