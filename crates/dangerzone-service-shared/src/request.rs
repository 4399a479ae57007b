//! Request types and validation for HTTP endpoints.
//!
//! Query strings and bodies are captured loosely (strings and raw JSON
//! values) and converted to library types by [`Validate`], so a missing
//! parameter and a non-numeric one both produce the same `400` problem
//! instead of an extractor rejection.

use dangerzone_lib::{BoundingBox, NewZone, Point, PolygonGeometry, Properties};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProblemDetails;

/// Validation trait for request types.
///
/// Implementations check every field and convert the request into the typed
/// value the zone store expects.
pub trait Validate {
    /// The typed value produced by a successful validation.
    type Output;

    /// Validate the request.
    ///
    /// The `request_id` populates the `instance` field of any returned
    /// `ProblemDetails`, which is boxed to keep the `Err` variant small.
    fn validate(&self, request_id: &str) -> Result<Self::Output, Box<ProblemDetails>>;
}

fn bad_request(detail: impl Into<String>, request_id: &str) -> Box<ProblemDetails> {
    Box::new(ProblemDetails::bad_request(detail, request_id))
}

/// Parse a required numeric query parameter.
fn required_number(
    name: &str,
    raw: Option<&str>,
    request_id: &str,
) -> Result<f64, Box<ProblemDetails>> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request(format!("The '{}' parameter is required", name), request_id))?;
    finite(name, raw.parse::<f64>().ok(), request_id)
}

/// Read a number from a JSON body field. Numeric strings are accepted.
fn number_from_value(
    name: &str,
    value: Option<&Value>,
    request_id: &str,
) -> Result<f64, Box<ProblemDetails>> {
    let parsed = match value {
        None | Some(Value::Null) => {
            return Err(bad_request(
                format!("The '{}' field is required", name),
                request_id,
            ))
        }
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    finite(name, parsed, request_id)
}

fn finite(name: &str, value: Option<f64>, request_id: &str) -> Result<f64, Box<ProblemDetails>> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(bad_request(
            format!("The '{}' value must be a finite number", name),
            request_id,
        )),
    }
}

fn checked_point(lat: f64, lng: f64, request_id: &str) -> Result<Point, Box<ProblemDetails>> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(bad_request(
            "Latitude must be between -90 and 90",
            request_id,
        ));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(bad_request(
            "Longitude must be between -180 and 180",
            request_id,
        ));
    }
    Ok(Point::new(lng, lat))
}

/// Body of `POST /api/zones`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateZoneRequest {
    #[serde(default)]
    pub name: Option<String>,

    /// GeoJSON polygon, kept raw so shape errors become problem responses.
    #[serde(default)]
    pub geometry: Option<Value>,

    #[serde(default)]
    pub properties: Option<Value>,
}

impl Validate for CreateZoneRequest {
    type Output = NewZone;

    fn validate(&self, request_id: &str) -> Result<NewZone, Box<ProblemDetails>> {
        let name = match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => {
                return Err(bad_request(
                    "The 'name' field is required and cannot be empty",
                    request_id,
                ))
            }
        };

        let geometry = self
            .geometry
            .clone()
            .ok_or_else(|| bad_request("The 'geometry' field is required", request_id))?;
        let geometry: PolygonGeometry = serde_json::from_value(geometry).map_err(|e| {
            bad_request(
                format!("The 'geometry' field must be a GeoJSON Polygon: {}", e),
                request_id,
            )
        })?;

        let properties: Properties = match &self.properties {
            None | Some(Value::Null) => Properties::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(bad_request(
                    "The 'properties' field must be an object",
                    request_id,
                ))
            }
        };

        Ok(NewZone::new(name, geometry).with_properties(properties))
    }
}

/// Query of `GET /api/zones/nearby`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyQuery {
    pub lat: Option<String>,
    pub lng: Option<String>,
    /// Search radius in meters.
    pub max_distance: Option<String>,
}

impl Validate for NearbyQuery {
    type Output = (Point, Option<f64>);

    fn validate(&self, request_id: &str) -> Result<Self::Output, Box<ProblemDetails>> {
        if self.lat.is_none() || self.lng.is_none() {
            return Err(bad_request("Latitude and longitude are required", request_id));
        }
        let lat = required_number("lat", self.lat.as_deref(), request_id)?;
        let lng = required_number("lng", self.lng.as_deref(), request_id)?;
        let point = checked_point(lat, lng, request_id)?;

        let max_distance = match self.max_distance.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let meters = finite("maxDistance", raw.parse::<f64>().ok(), request_id)?;
                if meters < 0.0 {
                    return Err(bad_request(
                        "The 'maxDistance' value cannot be negative",
                        request_id,
                    ));
                }
                Some(meters)
            }
        };

        Ok((point, max_distance))
    }
}

/// Body of `POST /api/zones/check`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckPointRequest {
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub lng: Option<Value>,
}

impl Validate for CheckPointRequest {
    type Output = Point;

    fn validate(&self, request_id: &str) -> Result<Point, Box<ProblemDetails>> {
        let lat = number_from_value("lat", self.lat.as_ref(), request_id)?;
        let lng = number_from_value("lng", self.lng.as_ref(), request_id)?;
        checked_point(lat, lng, request_id)
    }
}

/// Query of `GET /api/zones/within`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithinQuery {
    pub min_lat: Option<String>,
    pub min_lng: Option<String>,
    pub max_lat: Option<String>,
    pub max_lng: Option<String>,
}

impl Validate for WithinQuery {
    type Output = BoundingBox;

    fn validate(&self, request_id: &str) -> Result<BoundingBox, Box<ProblemDetails>> {
        let min_lat = required_number("minLat", self.min_lat.as_deref(), request_id)?;
        let min_lng = required_number("minLng", self.min_lng.as_deref(), request_id)?;
        let max_lat = required_number("maxLat", self.max_lat.as_deref(), request_id)?;
        let max_lng = required_number("maxLng", self.max_lng.as_deref(), request_id)?;

        if min_lat > max_lat || min_lng > max_lng {
            return Err(bad_request(
                "Bounding box minimums must not exceed maximums",
                request_id,
            ));
        }

        Ok(BoundingBox::new(min_lng, min_lat, max_lng, max_lat))
    }
}
