//! The ordered list of panoramas a hyperlapse plays through.

use hyperlapse_env::{GeoPoint, PanoramaImage, PanoramaLocation};
use serde::Serialize;

/// Elevation value of a point whose elevation was never resolved.
pub const UNKNOWN_ELEVATION: f64 = -1.0;

/// One frame of the hyperlapse.
#[derive(Debug, Clone, Serialize)]
pub struct HyperlapsePoint {
    /// Where the panorama was captured
    pub location: GeoPoint,

    pub panorama_id: String,

    /// Heading of the panorama's center column (degrees)
    pub heading_deg: f64,

    /// Pitch of the capture rig (degrees)
    pub pitch_deg: f64,

    /// Terrain elevation in meters, or [`UNKNOWN_ELEVATION`]
    pub elevation_m: f64,

    /// Texture, filled in by the image load pipeline
    #[serde(skip)]
    pub image: Option<PanoramaImage>,

    pub copyright: String,
    pub capture_date: Option<String>,
}

impl HyperlapsePoint {
    pub fn has_elevation(&self) -> bool {
        self.elevation_m != UNKNOWN_ELEVATION
    }
}

impl From<PanoramaLocation> for HyperlapsePoint {
    fn from(pano: PanoramaLocation) -> Self {
        Self {
            location: pano.location,
            panorama_id: pano.panorama_id,
            heading_deg: pano.heading_deg,
            pitch_deg: pano.pitch_deg,
            elevation_m: UNKNOWN_ELEVATION,
            image: None,
            copyright: pano.copyright,
            capture_date: pano.capture_date,
        }
    }
}

/// Ordered frames with no two adjacent entries sharing a panorama.
///
/// Points can only be appended through [`Sequence::push_unique`]; after
/// construction only images and elevations change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Sequence {
    points: Vec<HyperlapsePoint>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&HyperlapsePoint> {
        self.points.get(index)
    }

    pub fn points(&self) -> &[HyperlapsePoint] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &HyperlapsePoint> {
        self.points.iter()
    }

    pub fn locations(&self) -> Vec<GeoPoint> {
        self.points.iter().map(|p| p.location).collect()
    }

    /// Appends `point` unless the previous point is the same panorama.
    ///
    /// Returns whether the point was accepted.
    pub(crate) fn push_unique(&mut self, point: HyperlapsePoint) -> bool {
        let previous = self.points.last().map(|last| last.panorama_id.as_str());
        if previous == Some(point.panorama_id.as_str()) {
            return false;
        }
        self.points.push(point);
        true
    }

    pub(crate) fn set_image(&mut self, index: usize, image: PanoramaImage) -> bool {
        match self.points.get_mut(index) {
            Some(point) => {
                point.image = Some(image);
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_elevations(&mut self, elevations: &[f64]) {
        for (point, elevation) in self.points.iter_mut().zip(elevations) {
            point.elevation_m = *elevation;
        }
    }

    pub(crate) fn clear_elevations(&mut self) {
        for point in self.points.iter_mut() {
            point.elevation_m = UNKNOWN_ELEVATION;
        }
    }

    /// Number of frames that have a texture.
    pub fn loaded_count(&self) -> usize {
        self.points.iter().filter(|p| p.image.is_some()).count()
    }

    /// Index of the first point repeating its predecessor's panorama, if any.
    pub fn adjacent_duplicate(&self) -> Option<usize> {
        self.points
            .windows(2)
            .position(|pair| pair[0].panorama_id == pair[1].panorama_id)
            .map(|i| i + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str) -> HyperlapsePoint {
        HyperlapsePoint::from(PanoramaLocation {
            location: GeoPoint::new(0.0, 0.0),
            panorama_id: id.to_string(),
            heading_deg: 0.0,
            pitch_deg: 0.0,
            copyright: String::new(),
            capture_date: None,
        })
    }

    #[test]
    fn test_push_unique_rejects_adjacent_repeat() {
        let mut seq = Sequence::new();
        assert!(seq.push_unique(point("a")));
        assert!(!seq.push_unique(point("a")));
        assert!(seq.push_unique(point("b")));
        // Non-adjacent repeats are legitimate (a loop in the route)
        assert!(seq.push_unique(point("a")));

        assert_eq!(seq.len(), 3);
        assert_eq!(seq.adjacent_duplicate(), None);
    }

    #[test]
    fn test_new_points_have_unknown_elevation() {
        let p = point("a");
        assert_eq!(p.elevation_m, UNKNOWN_ELEVATION);
        assert!(!p.has_elevation());
        assert!(p.image.is_none());
    }

    #[test]
    fn test_elevations() {
        let mut seq = Sequence::new();
        seq.push_unique(point("a"));
        seq.push_unique(point("b"));

        seq.set_elevations(&[12.0, 15.5]);
        assert_eq!(seq.get(1).unwrap().elevation_m, 15.5);

        seq.clear_elevations();
        assert!(seq.iter().all(|p| !p.has_elevation()));
    }
}
