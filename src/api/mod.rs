//! High-level library API: one entry point per pipeline, each taking its
//! parameter struct and returning a serialisable run report. Prefer these
//! over the low-level `core` modules when integrating s2pipe.
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::core::acquisition::{self, DownloadReport};
use crate::core::breaks::{self, BreakReport};
use crate::core::dates::parse_flexible;
use crate::core::extraction::{self, ExtractionReport};
use crate::core::params::{BreakRasterParams, DownloadParams, ExtractionParams};
use crate::error::{Error, Result};
use crate::io::earthengine::{EarthEngineClient, ImageCatalog};

/// Environment variable holding the imagery API access token
pub const ACCESS_TOKEN_ENV: &str = "EE_ACCESS_TOKEN";

fn validate_download(params: &DownloadParams) -> Result<()> {
    let start = parse_flexible(&params.date_start)?;
    let end = parse_flexible(&params.date_end)?;
    if end <= start {
        return Err(Error::InvalidArgument {
            arg: "date_end",
            value: params.date_end.clone(),
        });
    }
    if params.bands.is_empty() {
        return Err(Error::MissingArgument {
            arg: "bands".to_string(),
        });
    }
    if params.scale <= 0.0 {
        return Err(Error::InvalidArgument {
            arg: "scale",
            value: params.scale.to_string(),
        });
    }
    Ok(())
}

/// Download a tile through the imagery REST API
pub fn download_tile(params: &DownloadParams, access_token: Option<String>) -> Result<DownloadReport> {
    validate_download(params)?;
    if params.project.is_empty() {
        warn!("No cloud project configured; requests are not billed to a project");
    }
    let client = EarthEngineClient::new(&params.api_url, &params.project, access_token)?;
    download_tile_with(&client, params)
}

/// Download a tile from any catalog implementation
pub fn download_tile_with<C: ImageCatalog + ?Sized>(
    catalog: &C,
    params: &DownloadParams,
) -> Result<DownloadReport> {
    validate_download(params)?;
    info!(
        "Downloading tile {} from {} to {} ({} bands, {} filter)",
        params.tile,
        params.date_start,
        params.date_end,
        params.bands.len(),
        params.cloud_filter
    );
    acquisition::download_tile(catalog, params)
}

/// Extract per-pixel observation tables for every configured run
pub fn extract_observations(params: &ExtractionParams) -> Result<ExtractionReport> {
    if params.band_names.is_empty() {
        return Err(Error::MissingArgument {
            arg: "band_names".to_string(),
        });
    }
    if params.n_obs == 0 {
        return Err(Error::InvalidArgument {
            arg: "n_obs",
            value: "0".to_string(),
        });
    }
    extraction::run_extraction(params)
}

/// Convert break tables to the dated raster, its style and optional points
pub fn rasterize_breaks(params: &BreakRasterParams) -> Result<BreakReport> {
    if params.resolution <= 0.0 {
        return Err(Error::InvalidArgument {
            arg: "resolution",
            value: params.resolution.to_string(),
        });
    }
    if !params.input_dir.is_dir() {
        return Err(Error::InvalidArgument {
            arg: "input_dir",
            value: params.input_dir.display().to_string(),
        });
    }
    breaks::rasterize_breaks(params)
}

/// Write a run report as pretty JSON
pub fn save_report<T: Serialize>(report: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}
