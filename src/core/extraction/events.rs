//! Reference events (burnt areas, clear-cuts) read from polygon layers.
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::core::dates::{midpoint, parse_flexible};
use crate::core::params::ExtractionParams;
use crate::error::Result;
use crate::io::vector::{Boundary, PolygonFeature, read_polygons};
use crate::types::ReferenceDataset;

/// A dated reference polygon
#[derive(Debug, Clone)]
pub struct ReferenceEvent {
    pub id: String,
    /// `id_gleba` of the feature, the id when absent
    pub buffer_id: String,
    pub shape: Boundary,
    pub data_0: NaiveDate,
    pub data_1: Option<NaiveDate>,
}

impl ReferenceEvent {
    /// Date observations are split around
    pub fn data_mid(&self) -> NaiveDate {
        match self.data_1 {
            Some(end) if end != self.data_0 => midpoint(self.data_0, end),
            _ => self.data_0,
        }
    }
}

/// Shapefile holding the events of a run
pub fn reference_path(params: &ExtractionParams, year: Option<&str>) -> PathBuf {
    let file = format!("{}.shp", params.tile_id);
    match year {
        Some(y) => params.reference_dir.join(y).join(file),
        None => params.reference_dir.join(file),
    }
}

fn date_fields(dataset: ReferenceDataset) -> (&'static str, &'static str) {
    match dataset {
        ReferenceDataset::Icnf => ("DH_Inicio", "DH_Fim"),
        ReferenceDataset::Nvg => ("data_0", "data_1"),
    }
}

/// Turn polygon features into events. Features without a parseable start
/// date are dropped; an unparseable end date is treated as missing.
pub fn events_from_features(
    dataset: ReferenceDataset,
    features: Vec<PolygonFeature>,
) -> Vec<ReferenceEvent> {
    let (start_field, end_field) = date_fields(dataset);
    let mut events = Vec::with_capacity(features.len());
    let mut dropped = 0usize;
    for feature in features {
        let id = feature
            .text("id")
            .unwrap_or_else(|| feature.index.to_string());
        let buffer_id = feature.text("id_gleba").unwrap_or_else(|| id.clone());
        let Some(start) = feature.text(start_field) else {
            dropped += 1;
            continue;
        };
        let data_0 = match parse_flexible(&start) {
            Ok(d) => d,
            Err(_) => {
                warn!("Skipping event {}: unreadable {} `{}`", id, start_field, start);
                dropped += 1;
                continue;
            }
        };
        let data_1 = feature
            .text(end_field)
            .and_then(|v| parse_flexible(&v).ok());
        events.push(ReferenceEvent {
            id,
            buffer_id,
            shape: Boundary::new(feature.geometry),
            data_0,
            data_1,
        });
    }
    if dropped > 0 {
        info!("{} features without a usable {} were dropped", dropped, start_field);
    }
    events
}

/// Read the events of a shapefile, reprojected to `EPSG:{crs_epsg}`
pub fn load_events(path: &Path, dataset: ReferenceDataset, crs_epsg: u32) -> Result<Vec<ReferenceEvent>> {
    let features = read_polygons(path, &format!("EPSG:{}", crs_epsg))?;
    Ok(events_from_features(dataset, features))
}
