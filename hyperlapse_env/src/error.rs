//! Error types for the hyperlapse environment abstraction.

use crate::types::GeoPoint;
use thiserror::Error;

/// Errors reported by the external collaborators.
#[derive(Debug, Clone, Error)]
pub enum EnvError {
    /// The routing service could not produce a route
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    /// No panorama was captured near the requested point
    #[error("No panorama within {radius_m}m of {point}")]
    PanoramaNotFound { point: GeoPoint, radius_m: f64 },

    /// Imagery for a known panorama could not be retrieved or decoded
    #[error("Image fetch failed for panorama {panorama_id}: {reason}")]
    ImageFetch { panorama_id: String, reason: String },

    /// The elevation service returned an error status
    #[error("Elevation service error: {0}")]
    ElevationFailure(String),

    /// The service refused the request because of its quota
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Any other service-side failure
    #[error("Service error: {0}")]
    Service(String),
}

impl EnvError {
    /// Creates a route-not-found error.
    pub fn route_not_found(msg: impl Into<String>) -> Self {
        Self::RouteNotFound(msg.into())
    }

    /// Creates an image fetch error.
    pub fn image_fetch(panorama_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ImageFetch {
            panorama_id: panorama_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates an elevation failure.
    pub fn elevation(msg: impl Into<String>) -> Self {
        Self::ElevationFailure(msg.into())
    }

    /// True for the "nothing captured here" answer of a panorama lookup.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PanoramaNotFound { .. })
    }
}
