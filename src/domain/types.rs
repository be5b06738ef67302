//! Shared types for the visit detection engine

use crate::domain::error::EngineError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Newtype wrapper for vessel identities (MMSI) to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct VesselId(pub i64);

impl std::fmt::Display for VesselId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A WGS84 longitude/latitude pair, longitude first (GeoJSON axis order)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

impl Coord {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Both components finite and within WGS84 bounds
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

/// One timestamped position report for a vessel.
///
/// Ephemeral input to the state machine; never persisted by this engine.
#[derive(Debug, Clone)]
pub struct Observation {
    pub vessel: VesselId,
    pub ts: DateTime<Utc>,
    pub coord: Coord,
    /// Speed over ground in knots, when the feed carried it
    pub sog: Option<f64>,
    /// AIS navigational status code (5 = moored), when the feed carried it
    pub nav_status: Option<i32>,
}

/// GeoJSON-style point payload: `{"type": "Point", "coordinates": [lon, lat]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

/// Raw position report as delivered by the upstream feed.
///
/// Every field except the vessel key may be missing or malformed, so
/// conversion into an [`Observation`] is fallible.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPosition {
    pub mmsi: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
    #[serde(default)]
    pub sog: Option<f64>,
    #[serde(default)]
    pub nav_status: Option<i32>,
}

/// Timestamps arrive as RFC 3339 strings from the AIS feed but as epoch
/// milliseconds from replay tooling; accept both.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct TimestampVisitor;

    impl<'de> Visitor<'de> for TimestampVisitor {
        type Value = Option<DateTime<Utc>>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("an RFC 3339 string or epoch-millisecond timestamp")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.with_timezone(&Utc)))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Utc.timestamp_millis_opt(value as i64).single())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Utc.timestamp_millis_opt(value).single())
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(TimestampVisitor)
}

impl RawPosition {
    /// Validate and convert into an [`Observation`].
    ///
    /// A report with no usable coordinate pair or no vessel key is skipped
    /// by callers; it never mutates any state. A missing timestamp falls
    /// back to `now` (the feed occasionally drops it on live reports).
    pub fn into_observation(self, now: DateTime<Utc>) -> Result<Observation, EngineError> {
        let vessel = self
            .mmsi
            .map(VesselId)
            .ok_or(EngineError::MalformedObservation("missing mmsi"))?;

        let point = self
            .coordinates
            .ok_or(EngineError::MalformedObservation("missing coordinates"))?;
        if point.coordinates.len() != 2 {
            return Err(EngineError::MalformedObservation("coordinate pair malformed"));
        }
        let coord = Coord::new(point.coordinates[0], point.coordinates[1]);
        if !coord.is_valid() {
            return Err(EngineError::MalformedObservation("coordinate out of range"));
        }

        Ok(Observation {
            vessel,
            ts: self.timestamp_utc.unwrap_or(now),
            coord,
            sog: self.sog,
            nav_status: self.nav_status,
        })
    }
}
