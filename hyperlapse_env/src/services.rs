//! Map-service abstractions consumed by the hyperlapse engines.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::{GeoPoint, PanoramaImage, PanoramaLocation, Route};

/// Driving directions between two points.
///
/// # Implementations
///
/// - **Production**: wraps a directions API client
/// - **Simulation**: synthesizes a road between the two points
#[async_trait]
pub trait RouteService: Send + Sync + 'static {
    /// Resolves a driving route from `origin` to `destination`.
    ///
    /// # Returns
    /// * `Ok(route)` - At least one leg with at least two vertices
    /// * `Err(EnvError::RouteNotFound)` - No drivable route
    async fn resolve_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<Route, EnvError>;
}

/// Lookup of the nearest captured panorama.
///
/// Callers must not issue overlapping requests: providers are not required
/// to be safe under concurrent use, and sequencing relies on answers coming
/// back in request order.
#[async_trait]
pub trait PanoramaService: Send + Sync + 'static {
    /// Finds the panorama closest to `point` within `search_radius_m`.
    ///
    /// # Returns
    /// * `Ok(location)` - The resolved capture point and its metadata
    /// * `Err(EnvError::PanoramaNotFound)` - Nothing captured within the radius
    async fn resolve_panorama(
        &self,
        point: GeoPoint,
        search_radius_m: f64,
    ) -> Result<PanoramaLocation, EnvError>;
}

/// Retrieval of the full equirectangular texture for a panorama.
#[async_trait]
pub trait ImageryService: Send + Sync + 'static {
    /// Fetches and composes every tile of `panorama_id` at `zoom`.
    ///
    /// Tile layout and composition are the provider's business; the caller
    /// only sees the finished texture.
    async fn fetch_panorama_image(
        &self,
        panorama_id: &str,
        zoom: u8,
    ) -> Result<PanoramaImage, EnvError>;
}

/// Batched terrain elevation lookup.
#[async_trait]
pub trait ElevationService: Send + Sync + 'static {
    /// Returns one elevation (meters) per input point, in input order.
    ///
    /// # Returns
    /// * `Err(EnvError::RateLimited)` - Quota exhausted
    /// * `Err(EnvError::ElevationFailure)` - Any other non-OK status
    async fn fetch_elevations(&self, points: &[GeoPoint]) -> Result<Vec<f64>, EnvError>;
}

/// Everything a hyperlapse needs from a map provider.
///
/// Blanket-implemented for any type providing all four services, so a single
/// client (or the simulated provider) can be handed to the orchestrator.
pub trait StreetViewProvider: RouteService + PanoramaService + ImageryService + ElevationService {}

impl<T> StreetViewProvider for T where
    T: RouteService + PanoramaService + ImageryService + ElevationService
{
}
