//! Planar and spherical geometry helpers for danger zone polygons.
//!
//! All functions here are pure: they never allocate shared state, never
//! perform I/O and never panic on malformed input. Malformed input yields
//! `false`, `0.0` or `None`.
//!
//! Coordinates follow GeoJSON ordering: a position is `[longitude, latitude]`
//! in decimal degrees. A *ring* is a slice of positions describing the outer
//! boundary of a polygon.
//!
//! # Boundary convention
//!
//! [`point_in_polygon`] uses even-odd ray casting with a half-open crossing
//! rule: an edge counts as crossed when exactly one of its endpoints lies
//! strictly above the query latitude, and the crossing is counted only when
//! the query longitude is strictly less than the crossing longitude. For an
//! axis-aligned square this means points on the west and south edges are
//! inside while points on the east and north edges are outside.

use serde::{Deserialize, Serialize};

/// A single `[longitude, latitude]` pair.
pub type Position = [f64; 2];

/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A geographic point in decimal degrees.
///
/// Serialized as `{"lat": .., "lng": ..}`, the shape used by query payloads
/// and alert locations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lat, lng }
    }

    /// Both coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    fn position(&self) -> Position {
        [self.lng, self.lat]
    }
}

impl From<Position> for Point {
    fn from(position: Position) -> Self {
        Self::new(position[0], position[1])
    }
}

/// Axis-aligned box in longitude/latitude space. All bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Self {
        Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        }
    }

    /// Degenerate box covering exactly one point.
    pub fn around(point: Point) -> Self {
        Self::new(point.lng, point.lat, point.lng, point.lat)
    }

    /// All bounds are finite and each minimum does not exceed its maximum.
    pub fn is_well_formed(&self) -> bool {
        [self.min_lng, self.min_lat, self.max_lng, self.max_lat]
            .iter()
            .all(|v| v.is_finite())
            && self.min_lng <= self.max_lng
            && self.min_lat <= self.max_lat
    }

    /// True when the two boxes share at least one point (touching counts).
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lng <= other.max_lng
            && other.min_lng <= self.max_lng
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }

    /// True when `other` lies entirely inside `self`, boundaries included.
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        self.min_lng <= other.min_lng
            && self.min_lat <= other.min_lat
            && other.max_lng <= self.max_lng
            && other.max_lat <= self.max_lat
    }
}

/// True iff the ring has at least four vertices and is closed.
///
/// Closure is exact coordinate equality between the first and last vertex;
/// no tolerance is applied and open rings are never repaired.
pub fn validate_polygon(ring: &[Position]) -> bool {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() >= 4 => first[0] == last[0] && first[1] == last[1],
        _ => false,
    }
}

/// Even-odd containment test over the outer ring.
///
/// Works for closed and open rings alike (the closing edge is implied). See
/// the module docs for the boundary convention.
pub fn point_in_polygon(point: Point, ring: &[Position]) -> bool {
    if ring.len() < 3 || !point.is_finite() {
        return false;
    }

    let (x, y) = (point.lng, point.lat);
    let mut inside = false;
    let mut j = ring.len() - 1;

    for i in 0..ring.len() {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];

        if (yi > y) != (yj > y) {
            let crossing = (xj - xi) * (y - yi) / (yj - yi) + xi;
            if x < crossing {
                inside = !inside;
            }
        }
        j = i;
    }

    inside
}

/// Inclusive containment of a point in a bounding box.
pub fn bounding_box_contains(point: Point, bbox: &BoundingBox) -> bool {
    point.lng >= bbox.min_lng
        && point.lng <= bbox.max_lng
        && point.lat >= bbox.min_lat
        && point.lat <= bbox.max_lat
}

/// Great-circle distance between two points in meters.
pub fn haversine_distance(a: Point, b: Point) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Planar shoelace area of a ring in squared-degree units.
///
/// This is an approximation useful for relative comparisons only; it is not
/// a geodesic surface area. Orientation does not matter.
pub fn polygon_area(ring: &[Position]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }

    let mut twice_area = 0.0;
    for (i, a) in ring.iter().enumerate() {
        let b = ring[(i + 1) % ring.len()];
        twice_area += a[0] * b[1] - b[0] * a[1];
    }

    (twice_area / 2.0).abs()
}

/// Axis-aligned bounds of a ring, or `None` if the ring is empty.
pub fn ring_bounds(ring: &[Position]) -> Option<BoundingBox> {
    let first = ring.first()?;
    let mut bbox = BoundingBox::new(first[0], first[1], first[0], first[1]);
    for [lng, lat] in ring.iter().copied().skip(1) {
        bbox.min_lng = bbox.min_lng.min(lng);
        bbox.min_lat = bbox.min_lat.min(lat);
        bbox.max_lng = bbox.max_lng.max(lng);
        bbox.max_lat = bbox.max_lat.max(lat);
    }
    Some(bbox)
}

/// Distance in meters from a point to the nearest part of a polygon.
///
/// Returns `0.0` when the point is contained. Otherwise each edge is
/// projected into a local equirectangular plane centred on the point, the
/// closest location on the edge is found there and the haversine distance to
/// that location is returned. An empty ring is infinitely far away.
pub fn distance_to_polygon(point: Point, ring: &[Position]) -> f64 {
    if ring.is_empty() || !point.is_finite() {
        return f64::INFINITY;
    }
    if point_in_polygon(point, ring) {
        return 0.0;
    }

    let scale = point.lat.to_radians().cos();
    if scale.abs() < 1e-12 {
        // At a pole every meridian converges; vertex distances are exact enough.
        return ring
            .iter()
            .map(|v| haversine_distance(point, Point::from(*v)))
            .fold(f64::INFINITY, f64::min);
    }

    let project = |v: &Position| ((v[0] - point.lng) * scale, v[1] - point.lat);
    let origin = point.position();

    let mut best = f64::INFINITY;
    for (i, a) in ring.iter().enumerate() {
        let b = ring.get(i + 1).unwrap_or(&ring[0]);
        let (ax, ay) = project(a);
        let (bx, by) = project(b);
        let (dx, dy) = (bx - ax, by - ay);
        let len2 = dx * dx + dy * dy;
        let t = if len2 > 0.0 {
            (-(ax * dx + ay * dy) / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let closest = Point::new(
            origin[0] + (ax + t * dx) / scale,
            origin[1] + ay + t * dy,
        );
        best = best.min(haversine_distance(point, closest));
    }

    best
}

/// Bounding box covering every location within `meters` of `point`.
///
/// Returns `None` when that spherical cap touches a pole or crosses the
/// antimeridian; callers should fall back to scanning every zone.
pub fn expand_box(point: Point, meters: f64) -> Option<BoundingBox> {
    if !point.is_finite() || !meters.is_finite() || meters < 0.0 {
        return None;
    }

    // Widen slightly so floating point error never shrinks the cap.
    let angular = meters / EARTH_RADIUS_M * (1.0 + 1e-9) + 1e-12;
    let dlat = angular.to_degrees();
    if point.lat - dlat <= -90.0 || point.lat + dlat >= 90.0 {
        return None;
    }

    let ratio = angular.sin() / point.lat.to_radians().cos();
    if !(0.0..1.0).contains(&ratio) {
        return None;
    }
    let dlng = ratio.asin().to_degrees();
    if point.lng - dlng < -180.0 || point.lng + dlng > 180.0 {
        return None;
    }

    Some(BoundingBox::new(
        point.lng - dlng,
        point.lat - dlat,
        point.lng + dlng,
        point.lat + dlat,
    ))
}
