//! Construction-time configuration for a hyperlapse.

use crate::error::HyperlapseError;
use hyperlapse_env::GeoPoint;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the sequencer does when a raw sample has no panorama nearby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundPolicy {
    /// Stop the walk and keep the points accepted so far
    #[default]
    Truncate,

    /// Drop the sample and keep walking
    Skip,
}

/// Configuration for a hyperlapse.
///
/// Every field has a default, so a JSON config only needs the values it
/// changes:
///
/// ```json
/// { "max_points": 60, "lookat": { "lat": 37.8199, "lng": -122.4783 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HyperlapseConfig {
    /// Target spacing between raw samples in meters (default: 20)
    pub distance_between_points_m: f64,

    /// Upper bound on raw samples; spacing widens on long routes (default: 100)
    pub max_points: usize,

    /// Vertical field of view in degrees (default: 70)
    pub fov_deg: f64,

    /// Imagery zoom level (default: 1)
    pub zoom: u8,

    /// Frame-advance interval in milliseconds (default: 50)
    pub frame_interval_ms: u64,

    /// Render cadence of the animation driver in milliseconds (default: 16)
    pub render_interval_ms: u64,

    /// Panorama lookup radius in meters (default: 50)
    pub search_radius_m: f64,

    /// Apply elevation pitch correction (default: true)
    pub use_elevation: bool,

    /// Bias the heading toward `lookat` (default: true)
    pub use_lookat: bool,

    /// Landmark the camera keeps facing
    pub lookat: Option<GeoPoint>,

    /// Subtracted from every point elevation before the pitch correction
    pub elevation_offset_m: f64,

    /// Camera roll compensation in degrees
    pub tilt_deg: f64,

    /// Viewport width in pixels (default: 800)
    pub width: u32,

    /// Viewport height in pixels (default: 400)
    pub height: u32,

    /// Route origin used when `generate` is not handed a route
    pub start: Option<GeoPoint>,

    /// Route destination used when `generate` is not handed a route
    pub end: Option<GeoPoint>,

    pub not_found_policy: NotFoundPolicy,
}

impl Default for HyperlapseConfig {
    fn default() -> Self {
        Self {
            distance_between_points_m: 20.0,
            max_points: 100,
            fov_deg: 70.0,
            zoom: 1,
            frame_interval_ms: 50,
            render_interval_ms: 16,
            search_radius_m: 50.0,
            use_elevation: true,
            use_lookat: true,
            lookat: None,
            elevation_offset_m: 0.0,
            tilt_deg: 0.0,
            width: 800,
            height: 400,
            start: None,
            end: None,
            not_found_policy: NotFoundPolicy::Truncate,
        }
    }
}

impl HyperlapseConfig {
    /// Parses a JSON config; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, HyperlapseError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the engines cannot work with.
    pub fn validate(&self) -> Result<(), HyperlapseError> {
        if !(self.distance_between_points_m > 0.0) {
            return Err(HyperlapseError::config("distance_between_points_m must be positive"));
        }
        if self.max_points == 0 {
            return Err(HyperlapseError::config("max_points must be at least 1"));
        }
        if self.frame_interval_ms == 0 || self.render_interval_ms == 0 {
            return Err(HyperlapseError::config("frame and render intervals must be non-zero"));
        }
        if !(self.fov_deg > 0.0 && self.fov_deg < 180.0) {
            return Err(HyperlapseError::config("fov_deg must be within (0, 180)"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(HyperlapseError::config("viewport must be non-empty"));
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    /// Sets the target sample spacing.
    pub fn with_spacing(mut self, meters: f64) -> Self {
        self.distance_between_points_m = meters;
        self
    }

    /// Sets the sample budget.
    pub fn with_max_points(mut self, max_points: usize) -> Self {
        self.max_points = max_points;
        self
    }

    /// Sets the look-at landmark.
    pub fn with_lookat(mut self, target: GeoPoint) -> Self {
        self.lookat = Some(target);
        self
    }

    /// Sets the route endpoints resolved by `generate`.
    pub fn with_endpoints(mut self, start: GeoPoint, end: GeoPoint) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn with_zoom(mut self, zoom: u8) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_not_found_policy(mut self, policy: NotFoundPolicy) -> Self {
        self.not_found_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HyperlapseConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_interval(), Duration::from_millis(50));
        assert_eq!(config.max_points, 100);
    }

    #[test]
    fn test_partial_json() {
        let config = HyperlapseConfig::from_json_str(
            r#"{"max_points": 60, "not_found_policy": "skip", "lookat": {"lat": 1.5, "lng": 2.5}}"#,
        )
        .unwrap();

        assert_eq!(config.max_points, 60);
        assert_eq!(config.not_found_policy, NotFoundPolicy::Skip);
        assert_eq!(config.lookat, Some(GeoPoint::new(1.5, 2.5)));
        assert_eq!(config.distance_between_points_m, 20.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(HyperlapseConfig::default().with_max_points(0).validate().is_err());
        assert!(HyperlapseConfig::default().with_spacing(0.0).validate().is_err());
        assert!(HyperlapseConfig::from_json_str(r#"{ "frame_interval_ms": 0 }"#).is_err());
        assert!(matches!(
            HyperlapseConfig::from_json_str("{ not json"),
            Err(HyperlapseError::Config(_))
        ));
    }
}
