//! Error taxonomy of the hyperlapse engines.

use hyperlapse_env::{EnvError, GeoPoint};
use thiserror::Error;

/// Errors surfaced by `generate` and the engines.
///
/// Recoverable conditions (a missing panorama, an elevation outage) are
/// reported through the error event channel and degrade gracefully; the
/// variants returned as `Err` leave no partial sequence active.
#[derive(Debug, Error)]
pub enum HyperlapseError {
    /// The routing service failed or returned nothing usable
    #[error("Route resolution failed: {0}")]
    RouteResolution(String),

    /// No panorama was captured near a raw sample
    #[error("No panorama found near {0}")]
    PanoramaNotFound(GeoPoint),

    /// Elevation lookup failed; correction is disabled for the session
    #[error("Elevation service failed: {0}")]
    ElevationService(String),

    /// Imagery for a frame could not be fetched; the load was halted
    #[error("Image fetch failed at frame {index}: {source}")]
    ImageFetch {
        index: usize,
        #[source]
        source: EnvError,
    },

    /// The route has fewer than two vertices
    #[error("Route has fewer than two vertices")]
    EmptyRoute,

    /// Sequencing produced no panoramas at all
    #[error("No panoramas found along the route")]
    EmptySequence,

    /// `generate` was called without a route and without start/end points
    #[error("No start or end point")]
    MissingEndpoints,

    /// `generate` was called while a sequencing or load pass was running
    #[error("A generate pass is already running")]
    Busy,

    /// A configuration value is out of range or could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Any other collaborator failure
    #[error(transparent)]
    Env(#[from] EnvError),
}

impl HyperlapseError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<serde_json::Error> for HyperlapseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
