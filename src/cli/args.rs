use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use s2pipe::{CloudFilter, ReferenceDataset, Resampling};

#[derive(Parser)]
#[command(name = "s2pipe", version, about = "Sentinel-2 acquisition, extraction and break rasters")]
pub struct CliArgs {
    /// Enable logging
    #[arg(long, global = true, default_value_t = false)]
    pub log: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Download a Sentinel-2 tile as masked subtiles and per-date mosaics
    Download(DownloadArgs),
    /// Extract per-pixel observations around reference events
    Extract(ExtractArgs),
    /// Rasterize change-detection breaks into a dated GeoTIFF
    Breaks(BreaksArgs),
}

#[derive(Args)]
pub struct DownloadArgs {
    /// JSON parameter file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Tile id, e.g. T29SPD
    #[arg(long)]
    pub tile: Option<String>,

    /// First date (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,

    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<String>,

    /// Comma-separated band list, e.g. B3,B4,B8,B12
    #[arg(long, value_delimiter = ',')]
    pub bands: Option<Vec<String>>,

    /// Cloud filtering mode
    #[arg(long, value_enum)]
    pub cloud_filter: Option<CloudFilter>,

    /// Subtiles per side
    #[arg(long)]
    pub parts: Option<usize>,

    /// Parallel download workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Boundary polygons the mosaics are clipped to
    #[arg(long)]
    pub boundary: Option<PathBuf>,

    /// Cloud project billed for requests
    #[arg(long)]
    pub project: Option<String>,

    /// OAuth access token (falls back to EE_ACCESS_TOKEN)
    #[arg(long)]
    pub access_token: Option<String>,

    /// Write the run report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Args)]
pub struct ExtractArgs {
    /// JSON parameter file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Reference dataset
    #[arg(long, value_enum)]
    pub dataset: Option<ReferenceDataset>,

    /// Tile id, e.g. T29TME
    #[arg(long)]
    pub tile: Option<String>,

    /// Comma-separated years for yearly datasets
    #[arg(long, value_delimiter = ',')]
    pub years: Option<Vec<String>>,

    /// Observations kept on each side of the reference date
    #[arg(long)]
    pub n_obs: Option<usize>,

    /// Root of the reference shapefiles
    #[arg(long)]
    pub reference_dir: Option<PathBuf>,

    /// Root of the HDF5 archives
    #[arg(long)]
    pub archive_dir: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Write the run report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Args)]
pub struct BreaksArgs {
    /// JSON parameter file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory of break parquet files
    #[arg(short, long)]
    pub input_dir: Option<PathBuf>,

    /// Output GeoTIFF
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Optional GeoPackage of the selected points
    #[arg(long)]
    pub vector: Option<PathBuf>,

    /// CRS of the break coordinates
    #[arg(long)]
    pub source_crs: Option<String>,

    /// CRS of the outputs
    #[arg(long)]
    pub target_crs: Option<String>,

    /// Earliest break date kept (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,

    /// Latest break date kept (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<String>,

    /// Polygons the records must fall within
    #[arg(long)]
    pub boundary: Option<PathBuf>,

    /// Pixel size in source CRS units
    #[arg(long)]
    pub resolution: Option<f64>,

    /// Resampling used when reprojecting
    #[arg(long, value_enum)]
    pub resampling: Option<Resampling>,

    /// Write the run report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,
}
