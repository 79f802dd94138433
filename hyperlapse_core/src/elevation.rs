//! Elevation correction.
//!
//! Fetches terrain elevation for every frame (plus the look-at target) in a
//! single batch. Any failure, rate limiting included, switches correction off
//! for the rest of the session; playback then applies no pitch correction.

use crate::error::HyperlapseError;
use crate::sequence::{Sequence, UNKNOWN_ELEVATION};
use hyperlapse_env::{ElevationService, GeoPoint};
use tracing::{debug, warn};

/// Result of a correction pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ElevationOutcome {
    /// Elevations assigned; the target's elevation when a target was given
    Applied { lookat_elevation_m: Option<f64> },

    /// The service failed and correction is now off
    Disabled { reason: String },

    /// Correction was already off; nothing was requested
    Skipped,
}

/// Session-wide elevation state.
#[derive(Debug, Clone)]
pub struct ElevationCorrector {
    enabled: bool,
    lookat_elevation_m: f64,
}

impl ElevationCorrector {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            lookat_elevation_m: UNKNOWN_ELEVATION,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Elevation of the look-at target, or [`UNKNOWN_ELEVATION`].
    pub fn lookat_elevation_m(&self) -> f64 {
        self.lookat_elevation_m
    }

    /// Assigns elevations to every point of `sequence` in one request.
    pub async fn correct<E>(
        &mut self,
        sequence: &mut Sequence,
        lookat: Option<GeoPoint>,
        service: &E,
    ) -> ElevationOutcome
    where
        E: ElevationService + ?Sized,
    {
        if !self.enabled || sequence.is_empty() {
            return ElevationOutcome::Skipped;
        }

        let mut locations = sequence.locations();
        if let Some(target) = lookat {
            locations.push(target);
        }

        let elevations = match self.fetch(&locations, service).await {
            Ok(elevations) => elevations,
            Err(reason) => {
                sequence.clear_elevations();
                return ElevationOutcome::Disabled { reason };
            }
        };

        sequence.set_elevations(&elevations[..sequence.len()]);
        let lookat_elevation_m = lookat.map(|_| elevations[sequence.len()]);
        if let Some(elevation) = lookat_elevation_m {
            self.lookat_elevation_m = elevation;
        }

        debug!("Assigned {} elevations (lookat: {:?})", sequence.len(), lookat_elevation_m);
        ElevationOutcome::Applied { lookat_elevation_m }
    }

    /// Re-resolves the elevation of a new look-at target on its own.
    pub async fn refresh_lookat<E>(&mut self, target: GeoPoint, service: &E) -> ElevationOutcome
    where
        E: ElevationService + ?Sized,
    {
        if !self.enabled {
            return ElevationOutcome::Skipped;
        }

        match self.fetch(&[target], service).await {
            Ok(elevations) => {
                self.lookat_elevation_m = elevations[0];
                ElevationOutcome::Applied {
                    lookat_elevation_m: Some(elevations[0]),
                }
            }
            Err(reason) => ElevationOutcome::Disabled { reason },
        }
    }

    async fn fetch<E>(&mut self, locations: &[GeoPoint], service: &E) -> Result<Vec<f64>, String>
    where
        E: ElevationService + ?Sized,
    {
        let result = match service.fetch_elevations(locations).await {
            Ok(elevations) if elevations.len() == locations.len() => Ok(elevations),
            Ok(elevations) => Err(format!(
                "expected {} elevations, got {}",
                locations.len(),
                elevations.len()
            )),
            Err(err) => Err(err.to_string()),
        };

        if let Err(reason) = &result {
            let message = HyperlapseError::ElevationService(reason.clone()).to_string();
            warn!("{}; elevation correction disabled", message);
            self.enabled = false;
            self.lookat_elevation_m = UNKNOWN_ELEVATION;
        }
        result
    }
}
