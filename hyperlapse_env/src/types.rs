//! Common types shared between the engines and their collaborators.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Creates a point from latitude and longitude in degrees.
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// One leg of a driving route (origin to destination or waypoint to waypoint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    /// Polyline vertices of the leg, in driving order
    pub path: Vec<GeoPoint>,

    /// Driving distance of the leg as reported by the routing service (m)
    pub distance_m: f64,
}

impl RouteLeg {
    pub fn new(path: Vec<GeoPoint>, distance_m: f64) -> Self {
        Self { path, distance_m }
    }
}

/// A driving route as returned by a [`crate::RouteService`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub legs: Vec<RouteLeg>,
}

impl Route {
    pub fn new(legs: Vec<RouteLeg>) -> Self {
        Self { legs }
    }

    /// Sum of the leg distances in meters.
    pub fn total_distance_m(&self) -> f64 {
        self.legs.iter().map(|leg| leg.distance_m).sum()
    }

    /// All vertices of the route in driving order.
    ///
    /// Consecutive legs usually share their joint vertex; it is emitted once.
    pub fn overview_path(&self) -> Vec<GeoPoint> {
        let mut path: Vec<GeoPoint> = Vec::new();
        for leg in &self.legs {
            for vertex in &leg.path {
                if path.last() != Some(vertex) {
                    path.push(*vertex);
                }
            }
        }
        path
    }

    pub fn is_empty(&self) -> bool {
        self.legs.iter().all(|leg| leg.path.is_empty())
    }
}

/// Answer of a panorama lookup: where the nearest capture actually is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanoramaLocation {
    /// Position of the capture (not the queried point)
    pub location: GeoPoint,

    /// Provider-specific panorama identity
    pub panorama_id: String,

    /// Heading of the panorama's center column, degrees clockwise from north
    pub heading_deg: f64,

    /// Pitch of the capture rig, degrees
    pub pitch_deg: f64,

    /// Attribution string required by the provider
    pub copyright: String,

    /// Capture date as reported by the provider (e.g. "2013-06")
    pub capture_date: Option<String>,
}

/// A decoded, composed equirectangular panorama texture.
///
/// Treated as an opaque handle by the engines; only the renderer reads pixels.
#[derive(Clone)]
pub struct PanoramaImage {
    pub panorama_id: String,
    pub width: u32,
    pub height: u32,

    /// RGBA8 pixels, row-major
    pub rgba: Arc<[u8]>,
}

impl PanoramaImage {
    pub fn new(panorama_id: impl Into<String>, width: u32, height: u32, rgba: Arc<[u8]>) -> Self {
        Self {
            panorama_id: panorama_id.into(),
            width,
            height,
            rgba,
        }
    }

    /// Returns the pixel buffer size in bytes.
    pub fn size(&self) -> usize {
        self.rgba.len()
    }
}

impl std::fmt::Debug for PanoramaImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanoramaImage")
            .field("panorama_id", &self.panorama_id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overview_path_merges_joints() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 0.001);
        let c = GeoPoint::new(0.0, 0.002);
        let route = Route::new(vec![
            RouteLeg::new(vec![a, b], 111.0),
            RouteLeg::new(vec![b, c], 111.0),
        ]);

        assert_eq!(route.overview_path(), vec![a, b, c]);
        assert_eq!(route.total_distance_m(), 222.0);
        assert!(!route.is_empty());
    }

    #[test]
    fn test_empty_route() {
        assert!(Route::default().is_empty());
        assert!(Route::new(vec![RouteLeg::new(vec![], 0.0)]).is_empty());
    }
}
