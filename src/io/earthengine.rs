//! Cloud imagery catalog client speaking the Earth Engine REST API:
//! scene listing (`:listImages`) and pixel export (`:getPixels`) as GeoTIFF.
use std::collections::HashMap;
use std::time::Duration;

use chrono::DateTime;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::acquisition::PixelGrid;

/// Errors returned by the imagery catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed catalog response: {0}")]
    Malformed(String),
}

/// Footprint bounding box in longitude/latitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLatBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

/// A catalog scene with the properties the acquisition pipeline needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneInfo {
    /// Full asset name, e.g. `projects/earthengine-public/assets/COPERNICUS/S2_SR_HARMONIZED/2017...`
    pub name: String,
    /// Image index shared by matching images of sibling collections
    pub index: String,
    /// Acquisition time, milliseconds since the Unix epoch
    pub date_millis: i64,
    pub footprint: LonLatBounds,
    pub mgrs_tile: Option<String>,
    pub cloudy_pixel_percentage: Option<f64>,
    pub mean_solar_azimuth: Option<f64>,
}

/// Source of scenes and pixels. Implemented over HTTP by [`EarthEngineClient`].
pub trait ImageCatalog: Sync {
    /// Scenes of `collection` acquired in `[start, end)` (RFC 3339 or `YYYY-MM-DD`)
    /// whose MGRS tile is `mgrs_tile`
    fn list_scenes(
        &self,
        collection: &str,
        start: &str,
        end: &str,
        mgrs_tile: &str,
    ) -> Result<Vec<SceneInfo>, CatalogError>;

    /// The image `index` of `collection`, `None` when the collection has no
    /// such image. Used to pair scenes across sibling collections, which do
    /// not all carry the tile property.
    fn find_scene(&self, collection: &str, index: &str) -> Result<Option<SceneInfo>, CatalogError>;

    /// GeoTIFF bytes of `bands` of the asset `name` resampled onto `grid`
    fn fetch_pixels(
        &self,
        name: &str,
        bands: &[String],
        grid: &PixelGrid,
    ) -> Result<Vec<u8>, CatalogError>;
}

/// REST client for the imagery API
pub struct EarthEngineClient {
    http: Client,
    base_url: String,
    project: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListImagesResponse {
    #[serde(default)]
    images: Vec<ImageResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResource {
    name: String,
    start_time: Option<String>,
    geometry: Option<Value>,
    #[serde(default)]
    properties: HashMap<String, Value>,
}

fn normalize_time(value: &str) -> String {
    if value.len() == 10 {
        format!("{}T00:00:00Z", value)
    } else {
        value.to_string()
    }
}

fn collect_coords(value: &Value, out: &mut Vec<(f64, f64)>) {
    match value {
        Value::Array(items) => {
            if items.len() >= 2 && items[0].is_number() && items[1].is_number() {
                if let (Some(x), Some(y)) = (items[0].as_f64(), items[1].as_f64()) {
                    out.push((x, y));
                }
            } else {
                for item in items {
                    collect_coords(item, out);
                }
            }
        }
        _ => {}
    }
}

fn footprint_bounds(geometry: &Value) -> Option<LonLatBounds> {
    let mut coords = Vec::new();
    collect_coords(geometry.get("coordinates")?, &mut coords);
    let first = coords.first()?;
    let mut b = LonLatBounds {
        west: first.0,
        south: first.1,
        east: first.0,
        north: first.1,
    };
    for &(x, y) in &coords {
        b.west = b.west.min(x);
        b.east = b.east.max(x);
        b.south = b.south.min(y);
        b.north = b.north.max(y);
    }
    Some(b)
}

fn parse_scene(image: ImageResource) -> Result<SceneInfo, CatalogError> {
    let index = image
        .name
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    let start = image
        .start_time
        .as_deref()
        .ok_or_else(|| CatalogError::Malformed(format!("{} has no startTime", image.name)))?;
    let date_millis = DateTime::parse_from_rfc3339(start)
        .map_err(|e| CatalogError::Malformed(format!("{}: {}", start, e)))?
        .timestamp_millis();
    let footprint = image
        .geometry
        .as_ref()
        .and_then(footprint_bounds)
        .ok_or_else(|| CatalogError::Malformed(format!("{} has no footprint", image.name)))?;
    let number = |key: &str| image.properties.get(key).and_then(Value::as_f64);
    Ok(SceneInfo {
        index,
        date_millis,
        footprint,
        mgrs_tile: image
            .properties
            .get("MGRS_TILE")
            .and_then(Value::as_str)
            .map(str::to_string),
        cloudy_pixel_percentage: number("CLOUDY_PIXEL_PERCENTAGE"),
        mean_solar_azimuth: number("MEAN_SOLAR_AZIMUTH_ANGLE"),
        name: image.name,
    })
}

/// Body of a `:getPixels` request
pub fn pixels_request_body(bands: &[String], grid: &PixelGrid) -> Value {
    json!({
        "fileFormat": "GEO_TIFF",
        "bandIds": bands,
        "grid": {
            "dimensions": { "width": grid.width, "height": grid.height },
            "affineTransform": {
                "scaleX": grid.pixel_size,
                "shearX": 0.0,
                "translateX": grid.origin_x,
                "shearY": 0.0,
                "scaleY": -grid.pixel_size,
                "translateY": grid.origin_y,
            },
            "crsCode": grid.crs,
        }
    })
}

impl EarthEngineClient {
    pub fn new(base_url: &str, project: &str, token: Option<String>) -> Result<Self, CatalogError> {
        let http = Client::builder().timeout(Duration::from_secs(300)).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
            token,
        })
    }

    /// Asset name of a public collection
    pub fn public_asset(collection: &str) -> String {
        format!("projects/earthengine-public/assets/{}", collection)
    }

    /// Asset name of image `index` in a public collection
    pub fn image_asset(collection: &str, index: &str) -> String {
        format!("{}/{}", Self::public_asset(collection), index)
    }

    fn authorize(
        &self,
        req: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        let req = if self.project.is_empty() {
            req
        } else {
            req.header("x-goog-user-project", &self.project)
        };
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    fn check(resp: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, CatalogError> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let body = resp.text().unwrap_or_default();
            Err(CatalogError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

impl ImageCatalog for EarthEngineClient {
    fn list_scenes(
        &self,
        collection: &str,
        start: &str,
        end: &str,
        mgrs_tile: &str,
    ) -> Result<Vec<SceneInfo>, CatalogError> {
        let url = format!(
            "{}/v1/{}:listImages",
            self.base_url,
            Self::public_asset(collection)
        );
        let filter = format!("properties.MGRS_TILE = \"{}\"", mgrs_tile);
        let mut scenes = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("startTime", normalize_time(start)),
                ("endTime", normalize_time(end)),
                ("filter", filter.clone()),
                ("pageSize", "1000".to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }
            let resp = self.authorize(self.http.get(&url).query(&query)).send()?;
            let page: ListImagesResponse = Self::check(resp)?.json()?;
            debug!("listImages page with {} images", page.images.len());
            for image in page.images {
                scenes.push(parse_scene(image)?);
            }
            match page.next_page_token {
                Some(t) if !t.is_empty() => page_token = Some(t),
                _ => break,
            }
        }
        info!("Catalog returned {} scenes for {}", scenes.len(), collection);
        Ok(scenes)
    }

    fn find_scene(&self, collection: &str, index: &str) -> Result<Option<SceneInfo>, CatalogError> {
        let url = format!("{}/v1/{}", self.base_url, Self::image_asset(collection, index));
        let resp = self.authorize(self.http.get(&url)).send()?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("{} has no image {}", collection, index);
            return Ok(None);
        }
        let image: ImageResource = Self::check(resp)?.json()?;
        parse_scene(image).map(Some)
    }

    fn fetch_pixels(
        &self,
        name: &str,
        bands: &[String],
        grid: &PixelGrid,
    ) -> Result<Vec<u8>, CatalogError> {
        let url = format!("{}/v1/{}:getPixels", self.base_url, name);
        let body = pixels_request_body(bands, grid);
        let resp = self.authorize(self.http.post(&url).json(&body)).send()?;
        Ok(Self::check(resp)?.bytes()?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_from_list_response() {
        let body = r#"{
          "images": [{
            "name": "projects/earthengine-public/assets/COPERNICUS/S2_SR_HARMONIZED/20170105T112442_20170105T112443_T29SPD",
            "startTime": "2017-01-05T11:27:16.461Z",
            "geometry": {"type": "Polygon", "coordinates": [[[-8.1, 37.8], [-6.9, 37.8], [-6.9, 38.8], [-8.1, 38.8], [-8.1, 37.8]]]},
            "properties": {"MGRS_TILE": "29SPD", "CLOUDY_PIXEL_PERCENTAGE": 12.5, "MEAN_SOLAR_AZIMUTH_ANGLE": 161.2}
          }],
          "nextPageToken": ""
        }"#;
        let page: ListImagesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some(""));
        let scene = parse_scene(page.images.into_iter().next().unwrap()).unwrap();
        assert_eq!(scene.index, "20170105T112442_20170105T112443_T29SPD");
        assert_eq!(scene.date_millis, 1_483_615_636_461);
        assert_eq!(scene.mgrs_tile.as_deref(), Some("29SPD"));
        assert_eq!(scene.cloudy_pixel_percentage, Some(12.5));
        assert_eq!(scene.mean_solar_azimuth, Some(161.2));
        assert_eq!(
            scene.footprint,
            LonLatBounds {
                west: -8.1,
                south: 37.8,
                east: -6.9,
                north: 38.8
            }
        );
    }

    #[test]
    fn scene_without_time_is_rejected() {
        let image = ImageResource {
            name: "a/b".to_string(),
            start_time: None,
            geometry: None,
            properties: HashMap::new(),
        };
        assert!(matches!(parse_scene(image), Err(CatalogError::Malformed(_))));
    }

    #[test]
    fn pixel_request_grid() {
        let grid = PixelGrid {
            crs: "EPSG:32629".to_string(),
            origin_x: 600_000.0,
            origin_y: 4_200_000.0,
            pixel_size: 10.0,
            width: 1830,
            height: 1830,
        };
        let body = pixels_request_body(&["B4".to_string(), "B8".to_string()], &grid);
        assert_eq!(body["fileFormat"], "GEO_TIFF");
        assert_eq!(body["bandIds"][1], "B8");
        assert_eq!(body["grid"]["dimensions"]["width"], 1830);
        assert_eq!(body["grid"]["affineTransform"]["scaleY"], -10.0);
        assert_eq!(body["grid"]["affineTransform"]["translateY"], 4_200_000.0);
        assert_eq!(body["grid"]["crsCode"], "EPSG:32629");
    }

    #[test]
    fn sibling_image_asset_names() {
        assert_eq!(
            EarthEngineClient::image_asset(
                "COPERNICUS/S2_CLOUD_PROBABILITY",
                "20170105T112442_20170105T112443_T29SPD"
            ),
            "projects/earthengine-public/assets/COPERNICUS/S2_CLOUD_PROBABILITY/20170105T112442_20170105T112443_T29SPD"
        );
    }

    #[test]
    fn probability_asset_without_tile_property_parses() {
        let body = r#"{
          "type": "IMAGE",
          "name": "projects/earthengine-public/assets/COPERNICUS/S2_CLOUD_PROBABILITY/20170105T112442_20170105T112443_T29SPD",
          "startTime": "2017-01-05T11:27:16.461Z",
          "geometry": {"type": "Polygon", "coordinates": [[[-8.1, 37.8], [-6.9, 37.8], [-6.9, 38.8], [-8.1, 37.8]]]},
          "bands": [{"id": "probability"}]
        }"#;
        let image: ImageResource = serde_json::from_str(body).unwrap();
        let scene = parse_scene(image).unwrap();
        assert_eq!(scene.index, "20170105T112442_20170105T112443_T29SPD");
        assert_eq!(scene.mgrs_tile, None);
        assert_eq!(scene.cloudy_pixel_percentage, None);
    }

    #[test]
    fn date_only_times_get_midnight() {
        assert_eq!(normalize_time("2017-01-01"), "2017-01-01T00:00:00Z");
        assert_eq!(normalize_time("2017-01-01T10:00:00Z"), "2017-01-01T10:00:00Z");
    }
}
