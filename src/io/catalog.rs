//! Geofence catalog loader
//!
//! The polygon catalog is owned externally and delivered as a GeoJSON
//! FeatureCollection; this module reads it into [`GeofenceFeature`]s for
//! the in-memory index. Any failure to load or parse the catalog is
//! [`EngineError::CatalogUnavailable`], which is fatal for the batch job
//! that needed it.

use crate::domain::error::EngineError;
use crate::services::geofence::GeofenceFeature;
use geo::{Coord as GeoCoord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Properties,
    geometry: Option<Geometry>,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    name: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    area: Option<String>,
}

/// GeoJSON positions may carry an altitude; only the first two components
/// are meaningful here
type Ring = Vec<Vec<f64>>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon { coordinates: Vec<Ring> },
    MultiPolygon { coordinates: Vec<Vec<Ring>> },
    /// Point/LineString/etc features are not geofences; skipped, not fatal
    #[serde(other)]
    Unsupported,
}

fn ring_to_line_string(ring: &[Vec<f64>]) -> Option<LineString<f64>> {
    let coords: Vec<GeoCoord<f64>> = ring
        .iter()
        .filter(|pos| pos.len() >= 2)
        .map(|pos| GeoCoord { x: pos[0], y: pos[1] })
        .collect();
    // A linear ring needs at least a triangle plus closure
    (coords.len() >= 4).then(|| LineString::new(coords))
}

fn rings_to_polygon(rings: &[Ring]) -> Option<Polygon<f64>> {
    let mut iter = rings.iter();
    let exterior = ring_to_line_string(iter.next()?)?;
    let interiors: Vec<LineString<f64>> =
        iter.filter_map(|ring| ring_to_line_string(ring)).collect();
    Some(Polygon::new(exterior, interiors))
}

fn to_multi_polygon(geometry: &Geometry) -> Option<MultiPolygon<f64>> {
    let polygons: Vec<Polygon<f64>> = match geometry {
        Geometry::Polygon { coordinates } => rings_to_polygon(coordinates).into_iter().collect(),
        Geometry::MultiPolygon { coordinates } => {
            coordinates.iter().filter_map(|rings| rings_to_polygon(rings)).collect()
        }
        Geometry::Unsupported => Vec::new(),
    };
    (!polygons.is_empty()).then(|| MultiPolygon::new(polygons))
}

/// Load every usable feature from a GeoJSON catalog file.
///
/// Features with no name or no usable polygon geometry are counted and
/// skipped; an unreadable or unparseable file is fatal.
pub fn load_geofences<P: AsRef<Path>>(path: P) -> Result<Vec<GeofenceFeature>, EngineError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        EngineError::CatalogUnavailable(format!("reading {}: {e}", path.display()))
    })?;
    let collection: FeatureCollection = serde_json::from_str(&content).map_err(|e| {
        EngineError::CatalogUnavailable(format!("parsing {}: {e}", path.display()))
    })?;

    let mut features = Vec::with_capacity(collection.features.len());
    let mut skipped = 0usize;
    for feature in &collection.features {
        let name = feature.properties.name.clone();
        let geometry = feature.geometry.as_ref().and_then(to_multi_polygon);
        match (name, geometry) {
            (Some(name), Some(geometry)) => features.push(GeofenceFeature {
                name,
                kind: feature.properties.kind.clone().unwrap_or_default(),
                group: feature.properties.area.clone(),
                geometry,
            }),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(file = %path.display(), skipped = %skipped, "catalog_features_skipped");
    }
    info!(file = %path.display(), loaded = %features.len(), "catalog_loaded");
    Ok(features)
}
