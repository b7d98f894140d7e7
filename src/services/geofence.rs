// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Region geofence: decides whether an activity started inside the
//! eligible metro area.

use geo::{BoundingRect, Coord, Geometry, Rect};
use geojson::GeoJson;
use std::fs;
use std::path::Path;

// Default region: the DC metro bounding box.
const DEFAULT_MIN_LAT: f64 = 38.8;
const DEFAULT_MAX_LAT: f64 = 39.2;
const DEFAULT_MIN_LNG: f64 = -77.5;
const DEFAULT_MAX_LNG: f64 = -76.9;

/// Axis-aligned bounding box classifier. Edges are inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geofence {
    bounds: Rect<f64>,
}

impl Default for Geofence {
    fn default() -> Self {
        Self::from_bounds(
            DEFAULT_MIN_LAT,
            DEFAULT_MIN_LNG,
            DEFAULT_MAX_LAT,
            DEFAULT_MAX_LNG,
        )
    }
}

impl Geofence {
    /// Build a geofence from explicit corner coordinates (degrees).
    pub fn from_bounds(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Self {
        Self {
            bounds: Rect::new(
                Coord {
                    x: min_lng,
                    y: min_lat,
                },
                Coord {
                    x: max_lng,
                    y: max_lat,
                },
            ),
        }
    }

    /// Load a region from a GeoJSON file; the region is its bounding box.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, GeofenceError> {
        let json_data =
            fs::read_to_string(path.as_ref()).map_err(|e| GeofenceError::IoError(e.to_string()))?;
        Self::load_from_json(&json_data)
    }

    /// Load a region from a GeoJSON string (Geometry, Feature or
    /// FeatureCollection of Polygon/MultiPolygon).
    pub fn load_from_json(json_data: &str) -> Result<Self, GeofenceError> {
        let geojson: GeoJson = json_data
            .parse()
            .map_err(|e: geojson::Error| GeofenceError::ParseError(e.to_string()))?;

        let geometries: Vec<geojson::Geometry> = match geojson {
            GeoJson::Geometry(g) => vec![g],
            GeoJson::Feature(f) => f.geometry.into_iter().collect(),
            GeoJson::FeatureCollection(c) => {
                c.features.into_iter().filter_map(|f| f.geometry).collect()
            }
        };

        let mut bounds: Option<Rect<f64>> = None;
        for geometry in geometries {
            let rect = Self::bounding_rect(geometry.value)?;
            bounds = Some(match bounds {
                None => rect,
                Some(acc) => Rect::new(
                    Coord {
                        x: acc.min().x.min(rect.min().x),
                        y: acc.min().y.min(rect.min().y),
                    },
                    Coord {
                        x: acc.max().x.max(rect.max().x),
                        y: acc.max().y.max(rect.max().y),
                    },
                ),
            });
        }

        let bounds = bounds.ok_or(GeofenceError::EmptyRegion)?;
        tracing::info!(
            min_lat = bounds.min().y,
            min_lng = bounds.min().x,
            max_lat = bounds.max().y,
            max_lng = bounds.max().x,
            "Loaded region geofence"
        );
        Ok(Self { bounds })
    }

    fn bounding_rect(value: geojson::Value) -> Result<Rect<f64>, GeofenceError> {
        let geometry: Geometry<f64> = value
            .try_into()
            .map_err(|e: geojson::Error| GeofenceError::ParseError(e.to_string()))?;

        match geometry {
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::Rect(_) => geometry
                .bounding_rect()
                .ok_or(GeofenceError::EmptyRegion),
            _ => Err(GeofenceError::UnsupportedGeometry),
        }
    }

    /// Whether a start point falls inside the region.
    ///
    /// Total over any input: out-of-range degrees are just compared against
    /// the box, and NaN is never inside.
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        let (min, max) = (self.bounds.min(), self.bounds.max());
        lat >= min.y && lat <= max.y && lng >= min.x && lng <= max.x
    }

    /// Classify optional start coordinates; missing coordinates are outside.
    pub fn classify(&self, lat: Option<f64>, lng: Option<f64>) -> bool {
        match (lat, lng) {
            (Some(lat), Some(lng)) => self.contains(lat, lng),
            _ => false,
        }
    }
}

/// Errors from loading a region definition.
#[derive(Debug, thiserror::Error)]
pub enum GeofenceError {
    #[error("Failed to read file: {0}")]
    IoError(String),

    #[error("Failed to parse GeoJSON: {0}")]
    ParseError(String),

    #[error("Unsupported geometry type (expected Polygon or MultiPolygon)")]
    UnsupportedGeometry,

    #[error("Region has no geometry")]
    EmptyRegion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_of_region() {
        assert!(Geofence::default().contains(39.0, -77.0));
    }

    #[test]
    fn test_north_of_region() {
        assert!(!Geofence::default().contains(39.3, -77.0));
    }

    #[test]
    fn test_edges_are_inside() {
        let fence = Geofence::default();
        assert!(fence.contains(38.8, -77.5));
        assert!(fence.contains(39.2, -76.9));
        assert!(fence.contains(38.8, -76.9));
        assert!(fence.contains(39.2, -77.5));
    }

    #[test]
    fn test_just_outside_each_edge() {
        let fence = Geofence::default();
        let eps = 1e-9;
        assert!(!fence.contains(38.8 - eps, -77.0));
        assert!(!fence.contains(39.2 + eps, -77.0));
        assert!(!fence.contains(39.0, -77.5 - eps));
        assert!(!fence.contains(39.0, -76.9 + eps));
    }

    #[test]
    fn test_out_of_range_and_nan_inputs() {
        let fence = Geofence::default();
        assert!(!fence.contains(200.0, -500.0));
        assert!(!fence.contains(f64::NAN, -77.0));
        assert!(!fence.contains(39.0, f64::NAN));
        assert!(!fence.contains(f64::INFINITY, f64::NEG_INFINITY));
    }

    #[test]
    fn test_missing_coordinates_are_outside() {
        let fence = Geofence::default();
        assert!(!fence.classify(None, None));
        assert!(!fence.classify(Some(39.0), None));
        assert!(fence.classify(Some(39.0), Some(-77.0)));
    }

    #[test]
    fn test_load_from_geojson_polygon() {
        let json = r#"{
            "type": "Feature",
            "properties": {"name": "Test Region"},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[-122.2, 37.3], [-122.0, 37.3], [-122.0, 37.5], [-122.2, 37.5], [-122.2, 37.3]]]
            }
        }"#;

        let fence = Geofence::load_from_json(json).unwrap();
        assert!(fence.contains(37.4, -122.1));
        assert!(fence.contains(37.3, -122.2));
        assert!(!fence.contains(39.0, -77.0));
    }

    #[test]
    fn test_load_rejects_point_geometry() {
        let json = r#"{"type": "Point", "coordinates": [-77.0, 39.0]}"#;
        assert!(matches!(
            Geofence::load_from_json(json),
            Err(GeofenceError::UnsupportedGeometry)
        ));
    }

    #[test]
    fn test_load_rejects_empty_collection() {
        let json = r#"{"type": "FeatureCollection", "features": []}"#;
        assert!(matches!(
            Geofence::load_from_json(json),
            Err(GeofenceError::EmptyRegion)
        ));
    }
}
