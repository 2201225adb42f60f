//! Vector I/O over GDAL/OGR: reading polygon layers (shapefiles, GeoPackages)
//! into `geo` geometries in a requested CRS with their attributes, and writing
//! point layers to GeoPackage.
use std::collections::HashMap;
use std::path::Path;

use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::vector::{
    FieldValue, Geometry, LayerAccess, LayerOptions, OGRFieldType, OGRwkbGeometryType,
};
use gdal::{Dataset, DriverManager};
use geo::{BooleanOps, BoundingRect, Contains, MultiPolygon, Point, Rect};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// A polygon feature with its attributes as read from a layer
#[derive(Debug, Clone)]
pub struct PolygonFeature {
    /// Zero-based position of the feature in the layer
    pub index: usize,
    pub geometry: MultiPolygon<f64>,
    pub attributes: HashMap<String, FieldValue>,
}

impl PolygonFeature {
    /// Attribute rendered as text; dates are written as `YYYY-MM-DD`
    pub fn text(&self, name: &str) -> Option<String> {
        field_to_string(self.attributes.get(name)?)
    }
}

/// Point-in-polygon helper with a bounding-box prefilter
#[derive(Debug, Clone)]
pub struct Boundary {
    pub shape: MultiPolygon<f64>,
    bbox: Option<Rect<f64>>,
}

impl Boundary {
    pub fn new(shape: MultiPolygon<f64>) -> Self {
        let bbox = shape.bounding_rect();
        Self { shape, bbox }
    }

    /// Union of every feature geometry into a single boundary
    pub fn dissolve(features: &[PolygonFeature]) -> Self {
        let mut merged = MultiPolygon::<f64>::new(Vec::new());
        for f in features {
            merged = if merged.0.is_empty() {
                f.geometry.clone()
            } else {
                merged.union(&f.geometry)
            };
        }
        Self::new(merged)
    }

    /// Strictly inside: points on the boundary line are excluded
    pub fn within(&self, x: f64, y: f64) -> bool {
        match self.bbox {
            Some(b) if x >= b.min().x && x <= b.max().x && y >= b.min().y && y <= b.max().y => {
                self.shape.contains(&Point::new(x, y))
            }
            _ => false,
        }
    }

    pub fn bbox(&self) -> Option<Rect<f64>> {
        self.bbox
    }
}

fn field_to_string(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::StringValue(s) => {
            if s.trim().is_empty() {
                None
            } else {
                Some(s.clone())
            }
        }
        FieldValue::IntegerValue(v) => Some(v.to_string()),
        FieldValue::Integer64Value(v) => Some(v.to_string()),
        FieldValue::RealValue(v) => Some(v.to_string()),
        FieldValue::DateValue(d) => Some(d.format("%Y-%m-%d").to_string()),
        FieldValue::DateTimeValue(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        _ => None,
    }
}

/// Spatial reference with x/y axis order regardless of the authority definition
pub fn gis_srs(definition: &str) -> Result<SpatialRef> {
    let mut srs = SpatialRef::from_definition(definition)?;
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

fn to_multipolygon(geom: geo::Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geom {
        geo::Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::GeometryCollection(gc) => {
            let polys: Vec<_> = gc
                .0
                .into_iter()
                .filter_map(to_multipolygon)
                .flat_map(|mp| mp.0)
                .collect();
            if polys.is_empty() {
                None
            } else {
                Some(MultiPolygon::new(polys))
            }
        }
        _ => None,
    }
}

/// Read the polygons of the first layer of `path`, reprojected to `target_crs`.
///
/// Features without a polygonal geometry are skipped. A layer without a spatial
/// reference is assumed to already be in `target_crs`.
pub fn read_polygons(path: &Path, target_crs: &str) -> Result<Vec<PolygonFeature>> {
    let dataset = Dataset::open(path)?;
    let mut layer = dataset.layer(0)?;
    let target = gis_srs(target_crs)?;

    let transform = match layer.spatial_ref() {
        Some(mut src) => {
            src.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
            if src.auth_code().ok() == target.auth_code().ok() && src.auth_code().is_ok() {
                None
            } else {
                info!("Reprojecting {:?} to {}", path, target_crs);
                Some(CoordTransform::new(&src, &target)?)
            }
        }
        None => None,
    };

    let field_names: Vec<String> = layer.defn().fields().map(|f| f.name()).collect();
    let mut features = Vec::new();
    for (index, feature) in layer.features().enumerate() {
        let Some(geom) = feature.geometry() else {
            debug!("Feature {} has no geometry", index);
            continue;
        };
        let geom: Geometry = match &transform {
            Some(ct) => geom.transform(ct)?,
            None => geom.clone(),
        };
        let Some(shape) = to_multipolygon(geom.to_geo()?) else {
            debug!("Feature {} is not polygonal", index);
            continue;
        };

        let mut attributes = HashMap::new();
        for name in &field_names {
            let idx = feature.field_index(name)?;
            if let Some(value) = feature.field(idx)? {
                attributes.insert(name.clone(), value);
            }
        }
        features.push(PolygonFeature {
            index,
            geometry: shape,
            attributes,
        });
    }
    info!("Loaded {} polygon features from {:?}", features.len(), path);
    Ok(features)
}

/// Load a boundary layer and dissolve it into a single shape
pub fn load_boundary(path: &Path, target_crs: &str) -> Result<Boundary> {
    let features = read_polygons(path, target_crs)?;
    if features.is_empty() {
        return Err(Error::Processing(format!(
            "boundary {:?} contains no polygons",
            path
        )));
    }
    info!(
        "Number of boundary features: {} (dissolved to 1)",
        features.len()
    );
    Ok(Boundary::dissolve(&features))
}

/// Attribute column of a point layer
#[derive(Debug, Clone)]
pub struct PointField {
    pub name: &'static str,
    pub kind: OGRFieldType::Type,
}

/// Write points with attribute values to a GeoPackage, reprojecting from
/// `source_crs` to `target_crs` when they differ.
pub fn write_points_gpkg(
    path: &Path,
    layer_name: &str,
    source_crs: &str,
    target_crs: &str,
    fields: &[PointField],
    points: &[(f64, f64, Vec<FieldValue>)],
) -> Result<usize> {
    let source = gis_srs(source_crs)?;
    let target = gis_srs(target_crs)?;
    let transform = if source_crs.eq_ignore_ascii_case(target_crs) {
        None
    } else {
        Some(CoordTransform::new(&source, &target)?)
    };

    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let driver = DriverManager::get_driver_by_name("GPKG")?;
    let mut ds = driver.create_vector_only(path)?;
    let mut layer = ds.create_layer(LayerOptions {
        name: layer_name,
        srs: Some(&target),
        ty: OGRwkbGeometryType::wkbPoint,
        options: None,
    })?;
    let defs: Vec<(&str, OGRFieldType::Type)> = fields.iter().map(|f| (f.name, f.kind)).collect();
    layer.create_defn_fields(&defs)?;
    let names: Vec<&str> = fields.iter().map(|f| f.name).collect();

    for (x, y, values) in points {
        let mut geom = Geometry::from_wkt(&format!("POINT ({} {})", x, y))?;
        if let Some(ct) = &transform {
            geom = geom.transform(ct)?;
        }
        layer.create_feature_fields(geom, &names, values)?;
    }
    Ok(points.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Polygon, polygon};

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]
    }

    fn feature(index: usize, poly: Polygon<f64>) -> PolygonFeature {
        PolygonFeature {
            index,
            geometry: MultiPolygon::new(vec![poly]),
            attributes: HashMap::new(),
        }
    }

    #[test]
    fn within_excludes_edges_and_outside() {
        let b = Boundary::new(MultiPolygon::new(vec![square(0.0, 0.0, 10.0)]));
        assert!(b.within(5.0, 5.0));
        assert!(!b.within(0.0, 5.0));
        assert!(!b.within(11.0, 5.0));
    }

    #[test]
    fn dissolve_removes_shared_edges() {
        let features = vec![
            feature(0, square(0.0, 0.0, 10.0)),
            feature(1, square(10.0, 0.0, 10.0)),
        ];
        let b = Boundary::dissolve(&features);
        // on the shared edge of the two inputs, but inside the union
        assert!(b.within(10.0, 5.0));
        assert!(b.within(15.0, 5.0));
        assert!(!b.within(25.0, 5.0));
    }

    #[test]
    fn attribute_rendering() {
        let mut f = feature(0, square(0.0, 0.0, 1.0));
        f.attributes
            .insert("id".into(), FieldValue::Integer64Value(42));
        f.attributes
            .insert("blank".into(), FieldValue::StringValue("  ".into()));
        f.attributes.insert(
            "start".into(),
            FieldValue::DateValue(chrono::NaiveDate::from_ymd_opt(2021, 8, 3).unwrap()),
        );
        assert_eq!(f.text("id").as_deref(), Some("42"));
        assert_eq!(f.text("blank"), None);
        assert_eq!(f.text("start").as_deref(), Some("2021-08-03"));
        assert_eq!(f.text("missing"), None);
    }
}
