//! Region of interest: a validated, immutable lon/lat polygon.
//!
//! A [`Region`] can only be obtained through [`RegionCatalog`], which checks
//! the ring once. Every downstream component can then rely on:
//!
//! - the ring is closed (first vertex equals last vertex)
//! - the ring has at least three distinct vertices and a non-zero area
//! - no two edges cross or overlap

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, BoundingRect, Contains, Coord, Line, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bbox::BoundingBox;
use crate::error::{LandcoverError, LandcoverResult};

/// A lon/lat vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lon, lat): (f64, f64)) -> Self {
        Self { lon, lat }
    }
}

impl From<Coordinate> for Coord<f64> {
    fn from(c: Coordinate) -> Self {
        Coord { x: c.lon, y: c.lat }
    }
}

/// A validated region of interest.
#[derive(Debug, Clone)]
pub struct Region {
    polygon: Polygon<f64>,
    bbox: BoundingBox,
}

impl Region {
    /// `(minLon, minLat, maxLon, maxLat)` of the ring.
    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    /// True when the point lies strictly inside the polygon.
    ///
    /// Pixels are assigned to the region by their centre, so a centre that
    /// falls exactly on the boundary is outside.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.bbox.contains_point(lon, lat) && self.polygon.contains(&Point::new(lon, lat))
    }

    /// Closed ring, first vertex repeated at the end.
    pub fn ring(&self) -> Vec<Coordinate> {
        self.polygon
            .exterior()
            .coords()
            .map(|c| Coordinate::new(c.x, c.y))
            .collect()
    }

    /// Planar area in square degrees. Only useful as a sanity figure.
    pub fn area_deg2(&self) -> f64 {
        self.polygon.unsigned_area()
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }
}

/// Entry point for building regions from raw geometry sources.
pub struct RegionCatalog;

impl RegionCatalog {
    /// Validate a ring and build a [`Region`].
    ///
    /// Fails with `LandcoverError::Geometry` if the ring is not closed,
    /// has fewer than three distinct vertices, leaves the lon/lat domain,
    /// has zero area or self-intersects.
    pub fn validate(ring: &[Coordinate]) -> LandcoverResult<Region> {
        if ring.len() < 4 {
            return Err(LandcoverError::geometry(format!(
                "ring needs at least 4 positions (3 vertices + closing), got {}",
                ring.len()
            )));
        }

        for (i, c) in ring.iter().enumerate() {
            if !c.lon.is_finite() || !c.lat.is_finite() {
                return Err(LandcoverError::geometry(format!(
                    "vertex {} is not a finite coordinate",
                    i
                )));
            }
            if !(-180.0..=180.0).contains(&c.lon) || !(-90.0..=90.0).contains(&c.lat) {
                return Err(LandcoverError::geometry(format!(
                    "vertex {} ({}, {}) is outside the lon/lat domain",
                    i, c.lon, c.lat
                )));
            }
        }

        let first = ring[0];
        let last = ring[ring.len() - 1];
        if first != last {
            return Err(LandcoverError::geometry(format!(
                "ring is not closed: first vertex ({}, {}) != last vertex ({}, {})",
                first.lon, first.lat, last.lon, last.lat
            )));
        }

        // Repeated consecutive vertices carry no shape information.
        let mut vertices: Vec<Coordinate> = Vec::with_capacity(ring.len());
        for c in &ring[..ring.len() - 1] {
            if vertices.last() != Some(c) {
                vertices.push(*c);
            }
        }
        while vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }

        if vertices.len() < 3 {
            return Err(LandcoverError::geometry(format!(
                "ring has {} distinct vertices, need at least 3",
                vertices.len()
            )));
        }

        check_simple(&vertices)?;

        let coords: Vec<Coord<f64>> = vertices
            .iter()
            .chain(std::iter::once(&vertices[0]))
            .map(|c| Coord::from(*c))
            .collect();
        let polygon = Polygon::new(LineString::new(coords), vec![]);

        if polygon.unsigned_area() <= 0.0 {
            return Err(LandcoverError::geometry("ring encloses zero area"));
        }

        let rect = polygon
            .bounding_rect()
            .ok_or_else(|| LandcoverError::geometry("ring has no extent"))?;
        let bbox = BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y);

        Ok(Region { polygon, bbox })
    }

    /// Validate a list of `(lon, lat)` tuples.
    pub fn validate_tuples(ring: &[(f64, f64)]) -> LandcoverResult<Region> {
        let ring: Vec<Coordinate> = ring.iter().copied().map(Coordinate::from).collect();
        Self::validate(&ring)
    }

    /// Rectangle from a bounding box.
    pub fn from_bbox(bbox: &BoundingBox) -> LandcoverResult<Region> {
        if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            return Err(LandcoverError::geometry(format!(
                "bounding box {:?} has no extent",
                bbox.as_tuple()
            )));
        }

        Self::validate_tuples(&[
            (bbox.min_lon, bbox.min_lat),
            (bbox.max_lon, bbox.min_lat),
            (bbox.max_lon, bbox.max_lat),
            (bbox.min_lon, bbox.max_lat),
            (bbox.min_lon, bbox.min_lat),
        ])
    }

    /// Parse "minLon,minLat,maxLon,maxLat" into a rectangular region.
    pub fn from_bbox_csv(s: &str) -> LandcoverResult<Region> {
        let bbox = BoundingBox::from_csv(s).map_err(|e| LandcoverError::geometry(e.to_string()))?;
        Self::from_bbox(&bbox)
    }

    /// Parse "lon,lat lon,lat ..." (whitespace or ';' separated pairs).
    ///
    /// An unclosed list is closed automatically, since a literal coordinate
    /// list has no other way to express closure.
    pub fn from_coordinate_list(s: &str) -> LandcoverResult<Region> {
        let mut ring = Vec::new();
        for pair in s.split(|c: char| c.is_whitespace() || c == ';') {
            if pair.is_empty() {
                continue;
            }
            let (lon, lat) = pair.split_once(',').ok_or_else(|| {
                LandcoverError::geometry(format!("expected 'lon,lat', got '{}'", pair))
            })?;
            let lon: f64 = lon
                .trim()
                .parse()
                .map_err(|_| LandcoverError::geometry(format!("invalid longitude '{}'", lon)))?;
            let lat: f64 = lat
                .trim()
                .parse()
                .map_err(|_| LandcoverError::geometry(format!("invalid latitude '{}'", lat)))?;
            ring.push(Coordinate::new(lon, lat));
        }

        if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
            if first != last {
                ring.push(first);
            }
        }

        Self::validate(&ring)
    }

    /// Parse a GeoJSON `Polygon`, `Feature` or `FeatureCollection` (first feature).
    ///
    /// Only the outer ring is used; holes are ignored.
    pub fn from_geojson(s: &str) -> LandcoverResult<Region> {
        let value: Value = serde_json::from_str(s)
            .map_err(|e| LandcoverError::geometry(format!("invalid GeoJSON: {}", e)))?;
        let ring = outer_ring(&value)?;
        Self::validate(&ring)
    }
}

fn outer_ring(value: &Value) -> LandcoverResult<Vec<Coordinate>> {
    match value.get("type").and_then(Value::as_str) {
        Some("Polygon") => {
            let rings = value
                .get("coordinates")
                .and_then(Value::as_array)
                .ok_or_else(|| LandcoverError::geometry("Polygon without coordinates"))?;
            let outer = rings
                .first()
                .and_then(Value::as_array)
                .ok_or_else(|| LandcoverError::geometry("Polygon without an outer ring"))?;
            outer
                .iter()
                .map(|pos| {
                    let pair = pos.as_array().filter(|p| p.len() >= 2);
                    match pair.map(|p| (p[0].as_f64(), p[1].as_f64())) {
                        Some((Some(lon), Some(lat))) => Ok(Coordinate::new(lon, lat)),
                        _ => Err(LandcoverError::geometry(format!(
                            "invalid position: {}",
                            pos
                        ))),
                    }
                })
                .collect()
        }
        Some("Feature") => {
            let geometry = value
                .get("geometry")
                .ok_or_else(|| LandcoverError::geometry("Feature without geometry"))?;
            outer_ring(geometry)
        }
        Some("FeatureCollection") => {
            let feature = value
                .get("features")
                .and_then(Value::as_array)
                .and_then(|f| f.first())
                .ok_or_else(|| LandcoverError::geometry("FeatureCollection is empty"))?;
            outer_ring(feature)
        }
        Some(other) => Err(LandcoverError::geometry(format!(
            "unsupported geometry type '{}', expected Polygon",
            other
        ))),
        None => Err(LandcoverError::geometry("GeoJSON object has no type")),
    }
}

/// Reject rings whose edges cross, touch or overlap anywhere other than at
/// the vertex shared by two neighbouring edges.
fn check_simple(vertices: &[Coordinate]) -> LandcoverResult<()> {
    let n = vertices.len();
    let edges: Vec<Line<f64>> = (0..n)
        .map(|i| Line::new(Coord::from(vertices[i]), Coord::from(vertices[(i + 1) % n])))
        .collect();

    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            let Some(hit) = line_intersection(edges[i], edges[j]) else {
                continue;
            };

            let allowed = adjacent
                && matches!(hit, LineIntersection::SinglePoint { is_proper: false, .. });
            if !allowed {
                return Err(LandcoverError::geometry(format!(
                    "ring self-intersects between edge {} and edge {}",
                    i, j
                )));
            }
        }
    }

    Ok(())
}
