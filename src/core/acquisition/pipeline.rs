//! Tile acquisition: scene selection, concurrent subtile export with local
//! cloud masking, then one mosaic per acquisition date.
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ndarray::{Array3, Axis, s};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::cloudmask::{MaskInputs, apply_mask, cloud_shadow_mask, mask_halo};
use super::grid::{PixelGrid, Subtile};
use super::mosaic::{MosaicOutcome, build_mosaic};
use super::spectral::{NDVI_BAND, ndvi};
use crate::core::params::{CloudMaskParams, DownloadParams};
use crate::error::{Error, Result};
use crate::io::earthengine::{ImageCatalog, SceneInfo};
use crate::io::gdal::{GdalError, GeoRasterReader, RasterStack};
use crate::io::vector::{Boundary, load_boundary};
use crate::io::writers::tiff::{TiffOptions, write_geotiff_stack};
use crate::types::CloudFilter;

/// A surface reflectance scene and, when masking, its cloud probability partner
#[derive(Debug, Clone, PartialEq)]
pub struct ScenePair {
    pub scene: SceneInfo,
    pub probability: Option<SceneInfo>,
}

/// Summary of a tile download
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DownloadReport {
    pub scenes: usize,
    pub parts_written: usize,
    pub parts_failed: usize,
    pub mosaics: Vec<PathBuf>,
    /// Dates dropped because nothing valid intersected the boundary
    pub outside_boundary: usize,
    /// Dates without any downloaded subtile
    pub empty_dates: usize,
}

/// Scenes of the tile in the date range, filtered and paired as the cloud
/// filter requires, sorted by acquisition time.
pub fn select_scenes<C: ImageCatalog + ?Sized>(
    catalog: &C,
    params: &DownloadParams,
) -> Result<Vec<ScenePair>> {
    let tile = params.mgrs_tile();
    let scenes: Vec<SceneInfo> = catalog
        .list_scenes(&params.collection, &params.date_start, &params.date_end, tile)?
        .into_iter()
        .filter(|s| s.mgrs_tile.as_deref() == Some(tile))
        .collect();

    let mut pairs = match params.cloud_filter {
        CloudFilter::NoFilter => scenes
            .into_iter()
            .map(|scene| ScenePair {
                scene,
                probability: None,
            })
            .collect::<Vec<_>>(),
        CloudFilter::S2Cloudless => {
            let max_pct = params.cloud_mask.max_scene_cloud_pct;
            let mut pairs = Vec::new();
            for scene in scenes
                .into_iter()
                .filter(|s| s.cloudy_pixel_percentage.is_some_and(|p| p <= max_pct))
            {
                // probability images share the index but carry no tile property
                match catalog.find_scene(&params.cloud_collection, &scene.index)? {
                    Some(p) => pairs.push(ScenePair {
                        scene,
                        probability: Some(p),
                    }),
                    None => debug!("No cloud probability image for {}", scene.index),
                }
            }
            pairs
        }
    };
    pairs.sort_by_key(|p| p.scene.date_millis);
    info!(
        "Selected {} scenes for tile {} ({} filter)",
        pairs.len(),
        params.tile,
        params.cloud_filter
    );
    Ok(pairs)
}

/// Bands to request from the reflectance collection, in request order
pub fn fetch_bands(params: &DownloadParams) -> Vec<String> {
    let mut bands: Vec<String> = Vec::new();
    let mut add = |b: &str| {
        if !bands.iter().any(|x| x == b) {
            bands.push(b.to_string());
        }
    };
    for b in &params.bands {
        if b != NDVI_BAND {
            add(b);
        }
    }
    if params.bands.iter().any(|b| b == NDVI_BAND) {
        add("B4");
        add("B8");
    }
    if params.cloud_filter == CloudFilter::S2Cloudless {
        add("B8");
        add("SCL");
    }
    bands
}

/// Directory holding the subtiles of one acquisition
pub fn date_dir(params: &DownloadParams, date_millis: i64) -> PathBuf {
    params
        .output_dir
        .join(&params.tile)
        .join(date_millis.to_string())
}

pub fn subtile_path(params: &DownloadParams, label: &str, date_millis: i64) -> PathBuf {
    date_dir(params, date_millis).join(format!(
        "S2SR_image_{}_{}_tile_{}.tif",
        label, date_millis, params.tile
    ))
}

pub fn mosaic_path(params: &DownloadParams, date_millis: i64) -> PathBuf {
    params
        .output_dir
        .join(&params.tile)
        .join(format!("S2SR_image_{}.tif", date_millis))
}

/// Decode GeoTIFF bytes returned by the catalog
fn decode_geotiff(bytes: &[u8]) -> Result<RasterStack<u16>> {
    let mut tmp = tempfile::Builder::new().suffix(".tif").tempfile()?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    Ok(GeoRasterReader::open(tmp.path())?.read_stack::<u16>()?)
}

fn band<'a>(stack: &'a RasterStack<u16>, names: &[String], name: &str) -> Result<ndarray::ArrayView2<'a, u16>> {
    let idx = names
        .iter()
        .position(|n| n == name)
        .ok_or_else(|| Error::Processing(format!("band {} was not fetched", name)))?;
    Ok(stack.data.index_axis(Axis(0), idx))
}

/// Mask, derive and reorder fetched bands into the requested output bands
pub fn assemble_output(
    fetched: &RasterStack<u16>,
    fetched_names: &[String],
    probability: Option<&RasterStack<u16>>,
    scene: &SceneInfo,
    params: &DownloadParams,
) -> Result<RasterStack<u16>> {
    let nodata = params.nodata;
    let (rows, cols) = (fetched.rows(), fetched.cols());
    let mut out = Array3::<u16>::from_elem((params.bands.len(), rows, cols), nodata);
    for (i, name) in params.bands.iter().enumerate() {
        let plane = if name == NDVI_BAND {
            let red = band(fetched, fetched_names, "B4")?.to_owned();
            let nir = band(fetched, fetched_names, "B8")?.to_owned();
            ndvi(&red, &nir, nodata)
        } else {
            band(fetched, fetched_names, name)?.to_owned()
        };
        out.index_axis_mut(Axis(0), i).assign(&plane);
    }

    if let Some(prob) = probability {
        let mask_params = match scene.mean_solar_azimuth {
            Some(_) => params.cloud_mask.clone(),
            None => {
                warn!("{} has no solar azimuth; shadows are not projected", scene.index);
                CloudMaskParams {
                    projection_distance_km: 0.0,
                    ..params.cloud_mask.clone()
                }
            }
        };
        let probability = prob.data.index_axis(Axis(0), 0).to_owned();
        let nir = band(fetched, fetched_names, "B8")?.to_owned();
        let scl = band(fetched, fetched_names, "SCL")?.to_owned();
        let inputs = MaskInputs {
            probability: &probability,
            nir: &nir,
            scl: &scl,
            nodata,
            solar_azimuth: scene.mean_solar_azimuth.unwrap_or(0.0),
            pixel_size: fetched.geotransform[1].abs(),
        };
        let mask = cloud_shadow_mask(&inputs, &mask_params);
        apply_mask(&mut out, &mask, nodata);
    }

    Ok(RasterStack {
        data: out,
        geotransform: fetched.geotransform,
        projection: fetched.projection.clone(),
        nodata: Some(nodata as f64),
    })
}

/// Cut the `halo` margin off a stack fetched on `grid.expanded(halo)`
pub fn crop_halo(stack: RasterStack<u16>, halo: usize, grid: &PixelGrid) -> Result<RasterStack<u16>> {
    if stack.rows() != grid.height + 2 * halo || stack.cols() != grid.width + 2 * halo {
        return Err(GdalError::DimensionMismatch(
            grid.width + 2 * halo,
            grid.height + 2 * halo,
            stack.cols(),
            stack.rows(),
        )
        .into());
    }
    if halo == 0 {
        return Ok(stack);
    }
    let data = stack
        .data
        .slice(s![.., halo..halo + grid.height, halo..halo + grid.width])
        .to_owned();
    Ok(RasterStack {
        data,
        geotransform: grid.geotransform(),
        projection: stack.projection,
        nodata: stack.nodata,
    })
}

/// Fetch, mask and write one subtile. When masking, pixels are fetched with a
/// margin wide enough for shadows and buffers cast from neighbouring parts.
pub fn export_subtile<C: ImageCatalog + ?Sized>(
    catalog: &C,
    pair: &ScenePair,
    subtile: &Subtile,
    params: &DownloadParams,
) -> Result<PathBuf> {
    let names = fetch_bands(params);
    let halo = match pair.probability {
        Some(_) => mask_halo(&params.cloud_mask, subtile.grid.pixel_size),
        None => 0,
    };
    let request = subtile.grid.expanded(halo);
    let bytes = catalog.fetch_pixels(&pair.scene.name, &names, &request)?;
    let fetched = decode_geotiff(&bytes)?;
    if fetched.bands() != names.len() {
        return Err(Error::Processing(format!(
            "expected {} bands, received {}",
            names.len(),
            fetched.bands()
        )));
    }
    let probability = match &pair.probability {
        Some(p) => {
            let bytes = catalog.fetch_pixels(&p.name, &["probability".to_string()], &request)?;
            Some(decode_geotiff(&bytes)?)
        }
        None => None,
    };
    let output = assemble_output(&fetched, &names, probability.as_ref(), &pair.scene, params)?;
    let output = crop_halo(output, halo, &subtile.grid)?;

    let path = subtile_path(params, &subtile.label, pair.scene.date_millis);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_geotiff_stack(&path, &output, &params.bands, TiffOptions::default())?;
    Ok(path)
}

/// Export every subtile of one scene, sleeping between requests. Returns
/// `(written, failed)`.
pub fn download_scene<C: ImageCatalog + ?Sized>(
    catalog: &C,
    pair: &ScenePair,
    params: &DownloadParams,
) -> (usize, usize) {
    let grid = match PixelGrid::from_footprint(&pair.scene.footprint, &params.crs, params.scale) {
        Ok(g) => g,
        Err(e) => {
            error!("Cannot build the pixel grid of {}: {}", pair.scene.index, e);
            return (0, 1);
        }
    };
    let delay = Duration::from_millis(params.request_delay_ms);
    let (mut written, mut failed) = (0, 0);
    for subtile in grid.split(params.parts_per_side) {
        match export_subtile(catalog, pair, &subtile, params) {
            Ok(path) => {
                debug!("Downloaded {:?}", path);
                written += 1;
            }
            Err(e) => {
                error!(
                    "Error downloading {} of {}: {}",
                    subtile.label, pair.scene.index, e
                );
                failed += 1;
            }
        }
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
    info!(
        "Scene {} done: {} parts written, {} failed",
        pair.scene.index, written, failed
    );
    (written, failed)
}

/// Download every selected scene of the tile, then build the per-date mosaics
pub fn download_tile<C: ImageCatalog + ?Sized>(
    catalog: &C,
    params: &DownloadParams,
) -> Result<DownloadReport> {
    if params.parts_per_side == 0 {
        return Err(Error::InvalidArgument {
            arg: "parts_per_side",
            value: "0".to_string(),
        });
    }
    let boundary: Option<Boundary> = match &params.boundary {
        Some(path) => Some(load_boundary(path, &params.crs)?),
        None => None,
    };
    let pairs = select_scenes(catalog, params)?;
    let mut report = DownloadReport {
        scenes: pairs.len(),
        ..DownloadReport::default()
    };
    if pairs.is_empty() {
        warn!("No scenes to download for tile {}", params.tile);
        return Ok(report);
    }
    std::fs::create_dir_all(params.output_dir.join(&params.tile))?;

    let written = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(params.max_workers.max(1))
        .build()
        .map_err(Error::external)?;
    pool.install(|| {
        pairs.par_iter().for_each(|pair| {
            let (w, f) = download_scene(catalog, pair, params);
            written.fetch_add(w, Ordering::Relaxed);
            failed.fetch_add(f, Ordering::Relaxed);
        });
    });
    report.parts_written = written.into_inner();
    report.parts_failed = failed.into_inner();

    for pair in &pairs {
        let millis = pair.scene.date_millis;
        let outcome = build_mosaic(
            &date_dir(params, millis),
            &mosaic_path(params, millis),
            millis,
            boundary.as_ref(),
            &params.bands,
            params.nodata,
        );
        match outcome {
            Ok(MosaicOutcome::Written { path, .. }) => report.mosaics.push(path),
            Ok(MosaicOutcome::OutsideBoundary) => report.outside_boundary += 1,
            Ok(MosaicOutcome::NoParts) => report.empty_dates += 1,
            Err(e) => error!("Mosaic of {} failed: {}", millis, e),
        }
    }
    info!(
        "Tile {}: {} mosaics from {} scenes",
        params.tile,
        report.mosaics.len(),
        report.scenes
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::earthengine::{CatalogError, LonLatBounds};
    use ndarray::Array3;

    struct FakeCatalog {
        scenes: Vec<SceneInfo>,
        probabilities: Vec<SceneInfo>,
    }

    impl ImageCatalog for FakeCatalog {
        // listing filters on the tile property like the REST API does
        fn list_scenes(
            &self,
            collection: &str,
            _start: &str,
            _end: &str,
            tile: &str,
        ) -> std::result::Result<Vec<SceneInfo>, CatalogError> {
            let source = if collection.contains("PROBABILITY") {
                &self.probabilities
            } else {
                &self.scenes
            };
            Ok(source
                .iter()
                .filter(|s| s.mgrs_tile.as_deref() == Some(tile))
                .cloned()
                .collect())
        }

        fn find_scene(
            &self,
            collection: &str,
            index: &str,
        ) -> std::result::Result<Option<SceneInfo>, CatalogError> {
            let source = if collection.contains("PROBABILITY") {
                &self.probabilities
            } else {
                &self.scenes
            };
            Ok(source.iter().find(|s| s.index == index).cloned())
        }

        fn fetch_pixels(
            &self,
            _name: &str,
            _bands: &[String],
            _grid: &PixelGrid,
        ) -> std::result::Result<Vec<u8>, CatalogError> {
            Err(CatalogError::Malformed("offline".to_string()))
        }
    }

    fn scene(index: &str, millis: i64, tile: &str, cloud: Option<f64>) -> SceneInfo {
        SceneInfo {
            name: format!("assets/{}", index),
            index: index.to_string(),
            date_millis: millis,
            footprint: LonLatBounds {
                west: -8.0,
                south: 38.0,
                east: -7.0,
                north: 39.0,
            },
            mgrs_tile: Some(tile.to_string()),
            cloudy_pixel_percentage: cloud,
            mean_solar_azimuth: Some(160.0),
        }
    }

    fn probability(index: &str, millis: i64) -> SceneInfo {
        SceneInfo {
            name: format!("COPERNICUS/S2_CLOUD_PROBABILITY/{}", index),
            mgrs_tile: None,
            cloudy_pixel_percentage: None,
            mean_solar_azimuth: None,
            ..scene(index, millis, "29SPD", None)
        }
    }

    #[test]
    fn probability_images_paired_by_index_without_tile_property() {
        let catalog = FakeCatalog {
            scenes: vec![scene("x", 1_000, "29SPD", Some(5.0))],
            probabilities: vec![probability("x", 1_000)],
        };
        let params = DownloadParams::default();
        // the tile-filtered listing of the probability collection is empty
        assert!(
            catalog
                .list_scenes(&params.cloud_collection, "", "", params.mgrs_tile())
                .unwrap()
                .is_empty()
        );
        let pairs = select_scenes(&catalog, &params).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(
            pairs[0].probability.as_ref().map(|p| p.name.as_str()),
            Some("COPERNICUS/S2_CLOUD_PROBABILITY/x")
        );
    }

    #[test]
    fn cloudless_selection_filters_pairs_and_sorts() {
        let catalog = FakeCatalog {
            scenes: vec![
                scene("c", 3_000, "29SPD", Some(10.0)),
                scene("a", 1_000, "29SPD", Some(60.0)),
                scene("b", 2_000, "29SPD", Some(75.0)),
                scene("d", 4_000, "29SNC", Some(5.0)),
                scene("e", 5_000, "29SPD", Some(1.0)),
            ],
            probabilities: vec![probability("a", 1_000), probability("c", 3_000)],
        };
        let params = DownloadParams::default();
        let pairs = select_scenes(&catalog, &params).unwrap();
        let ids: Vec<_> = pairs.iter().map(|p| p.scene.index.as_str()).collect();
        // b is too cloudy, d is another tile, e has no probability partner
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(pairs[0].probability.as_ref().unwrap().index, "a");
    }

    #[test]
    fn no_filter_keeps_cloudy_scenes() {
        let catalog = FakeCatalog {
            scenes: vec![scene("b", 2_000, "29SPD", Some(90.0)), scene("a", 1_000, "29SPD", None)],
            probabilities: vec![],
        };
        let params = DownloadParams {
            cloud_filter: CloudFilter::NoFilter,
            ..DownloadParams::default()
        };
        let pairs = select_scenes(&catalog, &params).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].scene.index, "a");
        assert!(pairs[0].probability.is_none());
    }

    #[test]
    fn fetched_bands_cover_mask_and_index() {
        let mut params = DownloadParams::default();
        assert_eq!(fetch_bands(&params), vec!["B3", "B4", "B8", "B12", "SCL"]);
        params.bands = vec!["ndvi".to_string()];
        params.cloud_filter = CloudFilter::NoFilter;
        assert_eq!(fetch_bands(&params), vec!["B4", "B8"]);
    }

    #[test]
    fn output_paths() {
        let params = DownloadParams {
            output_dir: PathBuf::from("out"),
            ..DownloadParams::default()
        };
        assert_eq!(
            subtile_path(&params, "part_3", 1_500),
            PathBuf::from("out/T29SPD/1500/S2SR_image_part_3_1500_tile_T29SPD.tif")
        );
        assert_eq!(mosaic_path(&params, 1_500), PathBuf::from("out/T29SPD/S2SR_image_1500.tif"));
    }

    #[test]
    fn output_keeps_requested_bands_and_masks_clouds() {
        let params = DownloadParams {
            bands: vec!["B4".to_string(), "ndvi".to_string()],
            cloud_mask: CloudMaskParams {
                buffer_m: 0.0,
                erosion_m: 0.0,
                projection_distance_km: 0.0,
                ..CloudMaskParams::default()
            },
            ..DownloadParams::default()
        };
        let names = fetch_bands(&params);
        assert_eq!(names, vec!["B4", "B8", "SCL"]);
        let mut data = Array3::<u16>::zeros((3, 2, 2));
        data.index_axis_mut(Axis(0), 0).fill(1000);
        data.index_axis_mut(Axis(0), 1).fill(3000);
        data.index_axis_mut(Axis(0), 2).fill(4);
        let fetched = RasterStack {
            data,
            geotransform: [0.0, 10.0, 0.0, 20.0, 0.0, -10.0],
            projection: "EPSG:32629".to_string(),
            nodata: None,
        };
        let mut prob = Array3::<u16>::zeros((1, 2, 2));
        prob[[0, 1, 1]] = 90;
        let probability = RasterStack {
            data: prob,
            ..fetched.clone()
        };
        let s = scene("a", 1, "29SPD", Some(1.0));
        let out = assemble_output(&fetched, &names, Some(&probability), &s, &params).unwrap();
        assert_eq!(out.data.dim(), (2, 2, 2));
        assert_eq!(out.data[[0, 0, 0]], 1000);
        assert_eq!(out.data[[1, 0, 0]], 5000);
        assert_eq!(out.data[[0, 1, 1]], 65535);
        assert_eq!(out.data[[1, 1, 1]], 65535);
    }

    /// Renders synthetic pixels for whatever grid is requested: a cloud just
    /// south of the test subtile and a dark patch inside it.
    struct RenderCatalog;

    impl RenderCatalog {
        fn value(band: &str, x: f64, y: f64) -> u16 {
            let cloud = (50.0..150.0).contains(&x) && (-50.0..-10.0).contains(&y);
            let dark = (50.0..150.0).contains(&x) && (0.0..50.0).contains(&y);
            match band {
                "probability" if cloud => 90,
                "probability" => 0,
                "SCL" => 4,
                "B8" if dark => 500,
                "B8" => 3000,
                _ => 1000,
            }
        }
    }

    impl ImageCatalog for RenderCatalog {
        fn list_scenes(
            &self,
            _collection: &str,
            _start: &str,
            _end: &str,
            _tile: &str,
        ) -> std::result::Result<Vec<SceneInfo>, CatalogError> {
            Ok(vec![])
        }

        fn find_scene(
            &self,
            _collection: &str,
            _index: &str,
        ) -> std::result::Result<Option<SceneInfo>, CatalogError> {
            Ok(None)
        }

        fn fetch_pixels(
            &self,
            _name: &str,
            bands: &[String],
            grid: &PixelGrid,
        ) -> std::result::Result<Vec<u8>, CatalogError> {
            let data = Array3::from_shape_fn((bands.len(), grid.height, grid.width), |(b, r, c)| {
                let x = grid.origin_x + (c as f64 + 0.5) * grid.pixel_size;
                let y = grid.origin_y - (r as f64 + 0.5) * grid.pixel_size;
                Self::value(&bands[b], x, y)
            });
            let stack = RasterStack {
                data,
                geotransform: grid.geotransform(),
                projection: grid.crs.clone(),
                nodata: Some(65535.0),
            };
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("pixels.tif");
            drop(write_geotiff_stack(&path, &stack, bands, TiffOptions::default()).unwrap());
            Ok(std::fs::read(&path).unwrap())
        }
    }

    #[test]
    fn shadow_cast_from_neighbouring_part_is_masked() {
        let dir = tempfile::tempdir().unwrap();
        let params = DownloadParams {
            scale: 10.0,
            output_dir: dir.path().to_path_buf(),
            cloud_mask: CloudMaskParams {
                projection_distance_km: 0.1,
                buffer_m: 0.0,
                erosion_m: 0.0,
                ..CloudMaskParams::default()
            },
            ..DownloadParams::default()
        };
        let mut sr = scene("a", 1_000, "29SPD", Some(1.0));
        sr.mean_solar_azimuth = Some(180.0);
        let pair = ScenePair {
            probability: Some(probability("a", 1_000)),
            scene: sr,
        };
        let subtile = Subtile {
            label: "part_1".to_string(),
            grid: PixelGrid {
                crs: "EPSG:32629".to_string(),
                origin_x: 0.0,
                origin_y: 200.0,
                pixel_size: 10.0,
                width: 20,
                height: 20,
            },
        };

        let path = export_subtile(&RenderCatalog, &pair, &subtile, &params).unwrap();
        let out = GeoRasterReader::open(&path).unwrap().read_stack::<u16>().unwrap();
        assert_eq!(out.data.dim(), (4, 20, 20));
        assert_eq!(out.geotransform, subtile.grid.geotransform());
        // the cloud lies outside this part; its shadow on the dark patch does not
        for b in 0..4 {
            assert_eq!(out.data[[b, 19, 10]], 65535);
            assert_eq!(out.data[[b, 15, 10]], 65535);
        }
        assert_eq!(out.data[[0, 10, 10]], 1000);
        assert_eq!(out.data[[0, 19, 2]], 1000);
        assert_eq!(out.data[[2, 19, 2]], 3000);
    }

    #[test]
    fn halo_crop_restores_the_subtile_grid() {
        let grid = PixelGrid {
            crs: "EPSG:32629".to_string(),
            origin_x: 100.0,
            origin_y: 500.0,
            pixel_size: 10.0,
            width: 3,
            height: 2,
        };
        let wide = grid.expanded(2);
        let stack = RasterStack {
            data: Array3::from_shape_fn((1, 6, 7), |(_, r, c)| (r * 10 + c) as u16),
            geotransform: wide.geotransform(),
            projection: "EPSG:32629".to_string(),
            nodata: Some(65535.0),
        };
        let cropped = crop_halo(stack.clone(), 2, &grid).unwrap();
        assert_eq!(cropped.data.dim(), (1, 2, 3));
        assert_eq!(cropped.data[[0, 0, 0]], 22);
        assert_eq!(cropped.data[[0, 1, 2]], 34);
        assert_eq!(cropped.geotransform, grid.geotransform());
        assert!(matches!(
            crop_halo(stack, 1, &grid),
            Err(Error::Gdal(GdalError::DimensionMismatch(..)))
        ));
    }

    #[test]
    fn failed_fetches_are_counted_not_fatal() {
        let catalog = FakeCatalog {
            scenes: vec![],
            probabilities: vec![],
        };
        let params = DownloadParams {
            parts_per_side: 2,
            request_delay_ms: 0,
            ..DownloadParams::default()
        };
        let pair = ScenePair {
            scene: scene("a", 1, "29SPD", Some(1.0)),
            probability: None,
        };
        let (written, failed) = download_scene(&catalog, &pair, &params);
        assert_eq!(written, 0);
        assert_eq!(failed, 4);
    }
}
