use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use s2pipe::api::{self, ACCESS_TOKEN_ENV};
use s2pipe::core::params::load_params;
use s2pipe::{BreakRasterParams, DownloadParams, ExtractionParams};

use super::args::{BreaksArgs, CliArgs, Command, DownloadArgs, ExtractArgs};
use super::errors::AppError;

fn init_logging(verbose: bool) {
    if verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    }
}

fn base_params<T: DeserializeOwned + Default>(config: Option<&Path>) -> Result<T, AppError> {
    match config {
        Some(path) => {
            info!("Loading parameters from {:?}", path);
            Ok(load_params(path)?)
        }
        None => Ok(T::default()),
    }
}

fn finish<T: Serialize>(report: &T, path: Option<&Path>) -> Result<(), AppError> {
    if let Some(path) = path {
        api::save_report(report, path)?;
        info!("Report written to {:?}", path);
    }
    Ok(())
}

fn download_params(args: &DownloadArgs) -> Result<DownloadParams, AppError> {
    let mut params: DownloadParams = base_params(args.config.as_deref())?;
    if let Some(tile) = &args.tile {
        params.tile = tile.clone();
    }
    if let Some(start) = &args.start {
        params.date_start = start.clone();
    }
    if let Some(end) = &args.end {
        params.date_end = end.clone();
    }
    if let Some(bands) = &args.bands {
        params.bands = bands.clone();
    }
    if let Some(filter) = args.cloud_filter {
        params.cloud_filter = filter;
    }
    if let Some(parts) = args.parts {
        params.parts_per_side = parts;
    }
    if let Some(workers) = args.workers {
        params.max_workers = workers;
    }
    if let Some(dir) = &args.output_dir {
        params.output_dir = dir.clone();
    }
    if let Some(boundary) = &args.boundary {
        params.boundary = Some(boundary.clone());
    }
    if let Some(project) = &args.project {
        params.project = project.clone();
    }
    if params.parts_per_side == 0 {
        return Err(AppError::InvalidArgument {
            arg: "--parts".to_string(),
            value: "0".to_string(),
        });
    }
    if params.max_workers == 0 {
        return Err(AppError::InvalidArgument {
            arg: "--workers".to_string(),
            value: "0".to_string(),
        });
    }
    Ok(params)
}

fn extract_params(args: &ExtractArgs) -> Result<ExtractionParams, AppError> {
    let mut params: ExtractionParams = base_params(args.config.as_deref())?;
    if let Some(dataset) = args.dataset {
        params.dataset = dataset;
    }
    if let Some(tile) = &args.tile {
        params.tile_id = tile.clone();
    }
    if let Some(years) = &args.years {
        params.years = years.clone();
    }
    if let Some(n) = args.n_obs {
        params.n_obs = n;
    }
    if let Some(dir) = &args.reference_dir {
        params.reference_dir = dir.clone();
    }
    if let Some(dir) = &args.archive_dir {
        params.archive_dir = dir.clone();
    }
    if let Some(dir) = &args.output_dir {
        params.output_dir = dir.clone();
    }
    if params.dataset.is_yearly() && params.years.is_empty() {
        return Err(AppError::MissingArgument {
            arg: "--years".to_string(),
        });
    }
    Ok(params)
}

fn breaks_params(args: &BreaksArgs) -> Result<BreakRasterParams, AppError> {
    let mut params: BreakRasterParams = base_params(args.config.as_deref())?;
    if let Some(dir) = &args.input_dir {
        params.input_dir = dir.clone();
    }
    if let Some(output) = &args.output {
        params.output_raster = output.clone();
    }
    if let Some(vector) = &args.vector {
        params.output_vector = Some(vector.clone());
    }
    if let Some(crs) = &args.source_crs {
        params.source_crs = crs.clone();
    }
    if let Some(crs) = &args.target_crs {
        params.target_crs = crs.clone();
    }
    if let Some(start) = &args.start {
        params.search_start = Some(start.clone());
    }
    if let Some(end) = &args.end {
        params.search_end = Some(end.clone());
    }
    if let Some(boundary) = &args.boundary {
        params.boundary = Some(boundary.clone());
    }
    if let Some(resolution) = args.resolution {
        params.resolution = resolution;
    }
    if let Some(resampling) = args.resampling {
        params.resampling = resampling;
    }
    Ok(params)
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(args.log);

    match args.command {
        Command::Download(dl) => {
            let params = download_params(&dl)?;
            let token = dl
                .access_token
                .clone()
                .or_else(|| std::env::var(ACCESS_TOKEN_ENV).ok());
            if token.is_none() {
                return Err(AppError::MissingArgument {
                    arg: format!("--access-token (or {})", ACCESS_TOKEN_ENV),
                }
                .into());
            }
            let report = api::download_tile(&params, token).map_err(AppError::from)?;
            info!(
                "Download finished: {} scenes, {} subtiles written, {} failed, {} mosaics",
                report.scenes,
                report.parts_written,
                report.parts_failed,
                report.mosaics.len()
            );
            finish(&report, dl.report.as_deref())?;
        }
        Command::Extract(ex) => {
            let params = extract_params(&ex)?;
            let report = api::extract_observations(&params).map_err(AppError::from)?;
            info!(
                "Extraction finished: {} tables, {} rows, {} runs skipped",
                report.outputs.len(),
                report.rows,
                report.skipped_runs.len()
            );
            finish(&report, ex.report.as_deref())?;
        }
        Command::Breaks(br) => {
            let params = breaks_params(&br)?;
            let report = api::rasterize_breaks(&params).map_err(AppError::from)?;
            info!(
                "Break conversion finished: {} files, {} pixels",
                report.files, report.records
            );
            finish(&report, br.report.as_deref())?;
        }
    }
    Ok(())
}
