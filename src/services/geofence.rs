//! Named-polygon geofence catalog and containment queries
//!
//! The index holds every feature from the catalog (ports and finer-grained
//! sub-areas such as docks and terminals). Each resolve call targets one
//! geofencing domain via a [`FeatureSelector`]; overlapping polygons are
//! expected, and "no feature contains this point" is a normal outcome.

use crate::domain::types::Coord;
use geo::{Contains, MultiPolygon, Point};

/// One named polygon from the catalog. Read-only to this engine.
#[derive(Debug, Clone)]
pub struct GeofenceFeature {
    pub name: String,
    /// Raw `type` attribute ("Port", "Dock", "Ferry Terminal", ...)
    pub kind: String,
    /// Raw `area` group attribute ("Liverpool Dock Estate", ...), when present
    pub group: Option<String>,
    pub geometry: MultiPolygon<f64>,
}

/// Selects which catalog features belong to a geofencing domain.
///
/// Not every polygon of a category belongs to a served domain, so sub-area
/// resolution filters on the source labels as well as the type attribute.
#[derive(Debug, Clone)]
pub enum FeatureSelector {
    /// Exact match on the feature `type` attribute (e.g. "Port")
    Category(String),
    /// Feature group must be one of `groups` (case-insensitive) and the
    /// lowercased `type` must contain one of `kind_keywords`
    GroupedKinds {
        groups: Vec<String>,
        kind_keywords: Vec<String>,
    },
}

impl FeatureSelector {
    pub fn accepts(&self, feature: &GeofenceFeature) -> bool {
        match self {
            FeatureSelector::Category(category) => feature.kind == *category,
            FeatureSelector::GroupedKinds { groups, kind_keywords } => {
                let group = feature.group.as_deref().unwrap_or("").to_lowercase();
                let kind = feature.kind.to_lowercase();
                groups.iter().any(|g| g.to_lowercase() == group)
                    && kind_keywords.iter().any(|k| kind.contains(k.as_str()))
            }
        }
    }
}

/// One geofencing domain served by the engine (ports, sub-areas), carrying
/// everything the generic visit pipeline needs to be instantiated for it.
#[derive(Debug, Clone)]
pub struct DomainSpec {
    /// Short name for logs and store keyspaces ("ports", "areas")
    pub name: String,
    /// Deterministic record id prefix ("pc", "ac")
    pub id_prefix: String,
    pub selector: FeatureSelector,
}

/// In-memory containment index over the catalog features
pub struct GeofenceIndex {
    features: Vec<GeofenceFeature>,
}

impl GeofenceIndex {
    pub fn new(features: Vec<GeofenceFeature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// First feature (by index scan, deterministic) that contains `coord`
    /// and is accepted by the selector. `None` means the vessel is outside
    /// every governed area - a valid, expected outcome.
    pub fn resolve(&self, coord: Coord, selector: &FeatureSelector) -> Option<&GeofenceFeature> {
        let point = Point::new(coord.lon, coord.lat);
        self.features
            .iter()
            .find(|f| selector.accepts(f) && f.geometry.contains(&point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ]])
    }

    fn port(name: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> GeofenceFeature {
        GeofenceFeature {
            name: name.to_string(),
            kind: "Port".to_string(),
            group: None,
            geometry: square(x0, y0, x1, y1),
        }
    }

    fn dock(name: &str, group: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> GeofenceFeature {
        GeofenceFeature {
            name: name.to_string(),
            kind: "Dock".to_string(),
            group: Some(group.to_string()),
            geometry: square(x0, y0, x1, y1),
        }
    }

    fn ports_selector() -> FeatureSelector {
        FeatureSelector::Category("Port".to_string())
    }

    fn areas_selector() -> FeatureSelector {
        FeatureSelector::GroupedKinds {
            groups: vec!["Liverpool Dock Estate".to_string()],
            kind_keywords: vec!["dock".to_string(), "terminal".to_string()],
        }
    }

    #[test]
    fn test_resolve_point_inside_port() {
        let index = GeofenceIndex::new(vec![port("Harbor X", 0.0, 0.0, 1.0, 1.0)]);
        let hit = index.resolve(Coord::new(0.5, 0.5), &ports_selector());
        assert_eq!(hit.map(|f| f.name.as_str()), Some("Harbor X"));
    }

    #[test]
    fn test_resolve_point_outside_everything() {
        let index = GeofenceIndex::new(vec![port("Harbor X", 0.0, 0.0, 1.0, 1.0)]);
        assert!(index.resolve(Coord::new(2.0, 2.0), &ports_selector()).is_none());
    }

    #[test]
    fn test_resolve_filters_by_category() {
        // A dock polygon covering the same point must not satisfy a Port query
        let index = GeofenceIndex::new(vec![dock(
            "Royal Seaforth Dock",
            "Liverpool Dock Estate",
            0.0,
            0.0,
            1.0,
            1.0,
        )]);
        assert!(index.resolve(Coord::new(0.5, 0.5), &ports_selector()).is_none());
        assert!(index.resolve(Coord::new(0.5, 0.5), &areas_selector()).is_some());
    }

    #[test]
    fn test_overlapping_polygons_first_match_wins() {
        let index = GeofenceIndex::new(vec![
            port("Outer Port", -1.0, -1.0, 2.0, 2.0),
            port("Inner Port", 0.0, 0.0, 1.0, 1.0),
        ]);
        let hit = index.resolve(Coord::new(0.5, 0.5), &ports_selector());
        assert_eq!(hit.map(|f| f.name.as_str()), Some("Outer Port"));
    }

    #[test]
    fn test_grouped_selector_rejects_foreign_group() {
        let index = GeofenceIndex::new(vec![dock(
            "Some Dock",
            "Elsewhere Estate",
            0.0,
            0.0,
            1.0,
            1.0,
        )]);
        assert!(index.resolve(Coord::new(0.5, 0.5), &areas_selector()).is_none());
    }

    #[test]
    fn test_grouped_selector_matches_kind_keyword_substring() {
        let mut feature = dock("Ferry Landing", "Liverpool Dock Estate", 0.0, 0.0, 1.0, 1.0);
        feature.kind = "Ferry Terminal".to_string();
        let index = GeofenceIndex::new(vec![feature]);
        assert!(index.resolve(Coord::new(0.5, 0.5), &areas_selector()).is_some());
    }

    #[test]
    fn test_grouped_selector_is_case_insensitive_on_group() {
        let index = GeofenceIndex::new(vec![dock(
            "Canada Dock",
            "LIVERPOOL DOCK ESTATE",
            0.0,
            0.0,
            1.0,
            1.0,
        )]);
        assert!(index.resolve(Coord::new(0.5, 0.5), &areas_selector()).is_some());
    }

    #[test]
    fn test_point_in_port_and_sub_area_resolves_per_domain() {
        let index = GeofenceIndex::new(vec![
            port("Port of Liverpool", -1.0, -1.0, 2.0, 2.0),
            dock("Canada Dock", "Liverpool Dock Estate", 0.0, 0.0, 1.0, 1.0),
        ]);
        let p = Coord::new(0.5, 0.5);
        assert_eq!(
            index.resolve(p, &ports_selector()).map(|f| f.name.as_str()),
            Some("Port of Liverpool")
        );
        assert_eq!(
            index.resolve(p, &areas_selector()).map(|f| f.name.as_str()),
            Some("Canada Dock")
        );
    }
}
