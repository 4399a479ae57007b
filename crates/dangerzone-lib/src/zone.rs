//! Zone records and their GeoJSON-shaped geometry.
//!
//! A [`Zone`] is a plain data value. Geometric behaviour (containment, area,
//! distance) lives in [`crate::geometry`] as free functions over the ring
//! returned by [`PolygonGeometry::outer_ring`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::geometry::{self, BoundingBox, Position};

/// Free-form zone properties.
pub type Properties = Map<String, Value>;

/// Opaque zone identifier, generated at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(Uuid);

impl ZoneId {
    /// Generate a new time-ordered identifier.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse a client-supplied identifier.
    ///
    /// A string that is not a UUID is an `InvalidArgument`, never `NotFound`.
    pub fn parse(raw: &str) -> Result<Self> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| Error::invalid_argument(format!("malformed zone id '{}'", raw)))
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ZoneId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// GeoJSON geometry type tag. Only polygons are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeometryType {
    #[default]
    Polygon,
}

/// GeoJSON polygon: `{"type": "Polygon", "coordinates": [[[lng, lat], ...]]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonGeometry {
    #[serde(rename = "type")]
    pub kind: GeometryType,
    pub coordinates: Vec<Vec<Position>>,
}

impl PolygonGeometry {
    /// Build a polygon from a single outer ring.
    pub fn from_ring(ring: Vec<Position>) -> Self {
        Self {
            kind: GeometryType::Polygon,
            coordinates: vec![ring],
        }
    }

    /// The outer ring, or an empty slice when no rings are present.
    pub fn outer_ring(&self) -> &[Position] {
        self.coordinates.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Axis-aligned bounds of the outer ring.
    pub fn bounds(&self) -> Option<BoundingBox> {
        geometry::ring_bounds(self.outer_ring())
    }

    /// Check the creation-time invariants.
    ///
    /// Exactly one ring is accepted. That ring must pass
    /// [`geometry::validate_polygon`] and contain only finite coordinates,
    /// with longitude in [-180, 180] and latitude in [-90, 90].
    pub fn validate(&self) -> Result<()> {
        match self.coordinates.len() {
            0 => return Err(Error::validation("geometry must contain an outer ring")),
            1 => {}
            n => {
                return Err(Error::validation(format!(
                    "geometry must contain exactly one ring, got {}",
                    n
                )))
            }
        }

        let ring = self.outer_ring();
        if ring.iter().flatten().any(|v| !v.is_finite()) {
            return Err(Error::validation("coordinates must be finite numbers"));
        }
        if let Some([lng, lat]) = ring
            .iter()
            .find(|[lng, lat]| !(-180.0..=180.0).contains(lng) || !(-90.0..=90.0).contains(lat))
        {
            return Err(Error::validation(format!(
                "coordinate [{}, {}] is out of range: longitude must be within +-180, latitude within +-90",
                lng, lat
            )));
        }
        if ring.len() < 4 {
            return Err(Error::validation(format!(
                "polygon must have at least 4 coordinate pairs, got {}",
                ring.len()
            )));
        }
        if !geometry::validate_polygon(ring) {
            return Err(Error::validation(
                "polygon must be closed: first and last coordinates must be identical",
            ));
        }
        Ok(())
    }
}

/// Request to create a zone.
#[derive(Debug, Clone, PartialEq)]
pub struct NewZone {
    pub name: String,
    pub geometry: PolygonGeometry,
    pub properties: Properties,
}

impl NewZone {
    pub fn new(name: impl Into<String>, geometry: PolygonGeometry) -> Self {
        Self {
            name: name.into(),
            geometry,
            properties: Properties::new(),
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }
}

/// A stored danger zone as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub geometry: PolygonGeometry,
    #[serde(default)]
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Zone {
    /// Validate a creation request and stamp identity and timestamps.
    ///
    /// The stored name is trimmed. Nothing is persisted here.
    pub fn from_new(new: NewZone, now: DateTime<Utc>) -> Result<Self> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(Error::validation("zone name is required"));
        }
        new.geometry.validate()?;

        Ok(Self {
            id: ZoneId::generate(),
            name: name.to_string(),
            geometry: new.geometry,
            properties: new.properties,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        self.geometry.bounds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square() -> PolygonGeometry {
        PolygonGeometry::from_ring(vec![
            [0.0, 0.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.0, 1.0],
            [0.0, 0.0],
        ])
    }

    #[test]
    fn zone_id_rejects_garbage() {
        let err = ZoneId::parse("not-an-id").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));

        let id = ZoneId::generate();
        assert_eq!(ZoneId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn from_new_trims_name_and_stamps_times() {
        let now = Utc::now();
        let zone = Zone::from_new(NewZone::new("  Harbour  ", square()), now).unwrap();
        assert_eq!(zone.name, "Harbour");
        assert_eq!(zone.created_at, now);
        assert_eq!(zone.updated_at, now);
        assert!(zone.properties.is_empty());
    }

    #[test]
    fn from_new_rejects_blank_name() {
        let err = Zone::from_new(NewZone::new("   ", square()), Utc::now()).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn validate_rejects_open_ring() {
        let geometry = PolygonGeometry::from_ring(vec![
            [0.0, 0.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.0, 1.0],
        ]);
        let err = geometry.validate().unwrap_err();
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn validate_rejects_short_and_multi_ring() {
        let short = PolygonGeometry::from_ring(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 0.0]]);
        assert!(short.validate().unwrap_err().to_string().contains("at least 4"));

        let mut holed = square();
        holed.coordinates.push(square().coordinates[0].clone());
        assert!(holed.validate().is_err());

        let empty = PolygonGeometry {
            kind: GeometryType::Polygon,
            coordinates: vec![],
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_coordinates() {
        let wild = PolygonGeometry::from_ring(vec![
            [0.0, 0.0],
            [500.0, 95.0],
            [1.0, 1.0],
            [0.0, 0.0],
        ]);
        let err = wild.validate().unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(err.to_string().contains("out of range"));

        let edge = PolygonGeometry::from_ring(vec![
            [-180.0, -90.0],
            [180.0, -90.0],
            [180.0, 90.0],
            [-180.0, -90.0],
        ]);
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn zone_serializes_as_camel_case_geojson() {
        let zone = Zone::from_new(NewZone::new("A", square()), Utc::now()).unwrap();
        let value = serde_json::to_value(&zone).unwrap();

        assert_eq!(value["geometry"]["type"], json!("Polygon"));
        assert_eq!(value["geometry"]["coordinates"][0][2], json!([1.0, 1.0]));
        assert!(value.get("createdAt").is_some());
        assert!(value.get("updatedAt").is_some());
        assert!(value["id"].is_string());
    }

    #[test]
    fn geometry_rejects_other_types() {
        let parsed: std::result::Result<PolygonGeometry, _> =
            serde_json::from_value(json!({"type": "Point", "coordinates": [[[0.0, 0.0]]]}));
        assert!(parsed.is_err());
    }
}
