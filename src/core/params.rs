use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::types::{CloudFilter, ReferenceDataset, Resampling};

/// Load a parameter struct from a JSON file. Missing fields take their defaults.
pub fn load_params<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// s2cloudless masking thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudMaskParams {
    /// Scene-level cloudy pixel percentage above which a scene is dropped
    pub max_scene_cloud_pct: f64,
    /// Per-pixel cloud probability threshold (exclusive)
    pub cloud_probability: u16,
    /// NIR reflectance below which a non-water pixel counts as dark
    pub nir_dark_threshold: f64,
    /// Reflectance scale of SR bands
    pub reflectance_scale: f64,
    /// How far cloud shadows are projected, in km
    pub projection_distance_km: f64,
    /// Buffer around cloud/shadow objects, in m
    pub buffer_m: f64,
    /// Erosion radius removing speckle from the combined mask, in m
    pub erosion_m: f64,
}

impl Default for CloudMaskParams {
    fn default() -> Self {
        Self {
            max_scene_cloud_pct: 60.0,
            cloud_probability: 50,
            nir_dark_threshold: 0.2,
            reflectance_scale: 1e4,
            projection_distance_km: 1.0,
            buffer_m: 50.0,
            erosion_m: 40.0,
        }
    }
}

/// Sentinel-2 tile acquisition parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadParams {
    /// Tile id with its leading `T`, e.g. `T29SPD`
    pub tile: String,
    /// First acquisition date (`YYYY-MM-DD`, inclusive)
    pub date_start: String,
    /// Last acquisition date (`YYYY-MM-DD`, exclusive, as the catalog treats end times)
    pub date_end: String,
    /// Bands written to every subtile and mosaic, in order
    pub bands: Vec<String>,
    pub collection: String,
    pub cloud_collection: String,
    pub cloud_filter: CloudFilter,
    pub cloud_mask: CloudMaskParams,
    /// Output CRS of downloaded pixels
    pub crs: String,
    /// Output pixel size, in CRS units
    pub scale: f64,
    pub nodata: u16,
    /// Subtiles per side; each scene is fetched as `parts_per_side²` requests
    pub parts_per_side: usize,
    pub max_workers: usize,
    /// Pause after each request, in milliseconds
    pub request_delay_ms: u64,
    pub output_dir: PathBuf,
    /// Polygons the final mosaic is clipped to
    pub boundary: Option<PathBuf>,
    /// Cloud project billed for requests
    pub project: String,
    /// Base URL of the imagery REST API
    pub api_url: String,
}

impl Default for DownloadParams {
    fn default() -> Self {
        Self {
            tile: "T29SPD".to_string(),
            date_start: "2017-01-01".to_string(),
            date_end: "2024-12-31".to_string(),
            bands: ["B3", "B4", "B8", "B12"].iter().map(|b| b.to_string()).collect(),
            collection: "COPERNICUS/S2_SR_HARMONIZED".to_string(),
            cloud_collection: "COPERNICUS/S2_CLOUD_PROBABILITY".to_string(),
            cloud_filter: CloudFilter::S2Cloudless,
            cloud_mask: CloudMaskParams::default(),
            crs: "EPSG:32629".to_string(),
            scale: 10.0,
            nodata: 65535,
            parts_per_side: 6,
            max_workers: 24,
            request_delay_ms: 2000,
            output_dir: PathBuf::from("s2_images"),
            boundary: None,
            project: String::new(),
            api_url: "https://earthengine.googleapis.com".to_string(),
        }
    }
}

impl DownloadParams {
    /// MGRS tile code as stored in scene properties (`T29SPD` -> `29SPD`)
    pub fn mgrs_tile(&self) -> &str {
        self.tile.strip_prefix('T').unwrap_or(&self.tile)
    }
}

/// Per-pixel observation extraction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionParams {
    pub dataset: ReferenceDataset,
    pub tile_id: String,
    /// Years processed for yearly datasets; ignored otherwise
    pub years: Vec<String>,
    /// Short names of the archived bands, in archive order
    pub band_names: Vec<String>,
    /// Observations kept on each side of the reference date
    pub n_obs: usize,
    pub nodata: i64,
    /// Root of the reference shapefiles
    pub reference_dir: PathBuf,
    /// Root of the per-tile HDF5 archives and date files
    pub archive_dir: PathBuf,
    pub output_dir: PathBuf,
    pub crs_epsg: u32,
}

impl Default for ExtractionParams {
    fn default() -> Self {
        Self {
            dataset: ReferenceDataset::Icnf,
            tile_id: "T29TME".to_string(),
            years: ["2020", "2021", "2022", "2023", "2024"]
                .iter()
                .map(|y| y.to_string())
                .collect(),
            band_names: ["g", "r", "n", "s"].iter().map(|b| b.to_string()).collect(),
            n_obs: 10,
            nodata: 65535,
            reference_dir: PathBuf::from("ref_datasets"),
            archive_dir: PathBuf::from("hdf5"),
            output_dir: PathBuf::from("amostras_por_pixel"),
            crs_epsg: 32629,
        }
    }
}

impl ExtractionParams {
    /// Runs to perform: one per year for yearly datasets, a single unnamed one otherwise
    pub fn runs(&self) -> Vec<Option<String>> {
        if self.dataset.is_yearly() {
            self.years.iter().cloned().map(Some).collect()
        } else {
            vec![None]
        }
    }
}

/// Break-record rasterization parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakRasterParams {
    /// Directory holding the `*.parquet` break tables
    pub input_dir: PathBuf,
    pub output_raster: PathBuf,
    /// Optional GeoPackage of the selected points
    pub output_vector: Option<PathBuf>,
    pub source_crs: String,
    pub target_crs: String,
    /// Earliest break date kept (`YYYY-MM-DD`, inclusive)
    pub search_start: Option<String>,
    /// Latest break date kept (`YYYY-MM-DD`, inclusive)
    pub search_end: Option<String>,
    /// Polygons records must fall within
    pub boundary: Option<PathBuf>,
    pub resolution: f64,
    pub nodata: i32,
    pub resampling: Resampling,
}

impl Default for BreakRasterParams {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_raster: PathBuf::from("last_break_dates.tif"),
            output_vector: None,
            source_crs: "EPSG:32629".to_string(),
            target_crs: "EPSG:32629".to_string(),
            search_start: None,
            search_end: None,
            boundary: None,
            resolution: 10.0,
            nodata: -9999,
            resampling: Resampling::Nearest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let params: DownloadParams =
            serde_json::from_str(r#"{"tile": "T29TNE", "bands": ["B4", "B8"]}"#).unwrap();
        assert_eq!(params.tile, "T29TNE");
        assert_eq!(params.mgrs_tile(), "29TNE");
        assert_eq!(params.bands, vec!["B4", "B8"]);
        assert_eq!(params.nodata, 65535);
        assert_eq!(params.cloud_mask, CloudMaskParams::default());
    }

    #[test]
    fn extraction_runs_per_dataset() {
        let mut params = ExtractionParams::default();
        assert_eq!(params.runs().len(), 5);
        params.dataset = ReferenceDataset::Nvg;
        assert_eq!(params.runs(), vec![None]);
    }

    #[test]
    fn break_params_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("breaks.json");
        std::fs::write(
            &path,
            r#"{"input_dir": "/data/ccd", "search_start": "2020-01-01", "target_crs": "EPSG:4326"}"#,
        )
        .unwrap();
        let params: BreakRasterParams = load_params(&path).unwrap();
        assert_eq!(params.input_dir, PathBuf::from("/data/ccd"));
        assert_eq!(params.search_start.as_deref(), Some("2020-01-01"));
        assert_eq!(params.search_end, None);
        assert_eq!(params.target_crs, "EPSG:4326");
        assert_eq!(params.nodata, -9999);
    }
}
