//! Geographic helpers.
//!
//! Interpolation is linear in latitude/longitude (a locally-planar
//! approximation, fine for the tens-of-meters segments a route is cut into);
//! distances and bearings are haversine, via the `geo` crate.

use geo::{HaversineBearing, HaversineDistance, Point};
use hyperlapse_env::GeoPoint;

/// Mean earth radius used by the haversine formulas (m).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

fn to_point(p: GeoPoint) -> Point<f64> {
    Point::new(p.lng, p.lat)
}

/// Point at fraction `t` of the way from `a` to `b`.
///
/// Each coordinate is interpolated independently in radians, so `t = 0`
/// returns `a` and `t = 1` returns `b`.
pub fn point_on_line(t: f64, a: GeoPoint, b: GeoPoint) -> GeoPoint {
    let (lat1, lng1) = (a.lat.to_radians(), a.lng.to_radians());
    let (lat2, lng2) = (b.lat.to_radians(), b.lng.to_radians());

    let lat = lat1 + t * (lat2 - lat1);
    let lng = lng1 + t * (lng2 - lng1);

    GeoPoint::new(lat.to_degrees(), lng.to_degrees())
}

/// Great-circle distance in meters.
pub fn distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    to_point(a).haversine_distance(&to_point(b))
}

/// Initial bearing from `a` to `b`, degrees clockwise from north in (-180, 180].
pub fn bearing_deg(a: GeoPoint, b: GeoPoint) -> f64 {
    to_point(a).haversine_bearing(to_point(b))
}

/// Sum of segment distances along a polyline.
pub fn path_length_m(path: &[GeoPoint]) -> f64 {
    path.windows(2).map(|pair| distance_m(pair[0], pair[1])).sum()
}

/// Moves `origin` by a local north/east offset in meters.
///
/// Equirectangular approximation, valid for offsets of a few kilometers.
pub fn offset_m(origin: GeoPoint, north_m: f64, east_m: f64) -> GeoPoint {
    let dlat = north_m / EARTH_RADIUS_M;
    let dlng = east_m / (EARTH_RADIUS_M * origin.lat.to_radians().cos());
    GeoPoint::new(origin.lat + dlat.to_degrees(), origin.lng + dlng.to_degrees())
}
