//! Panorama sequencing: raw samples to an ordered, de-duplicated sequence.
//!
//! Lookups are strictly sequential. Each sample is awaited before the next
//! one is issued, because providers do not promise to handle overlapping
//! requests and answers must stay in route order.

use crate::cancel::CancelFlag;
use crate::config::NotFoundPolicy;
use crate::error::HyperlapseError;
use crate::events::{ErrorEvent, EventChannel, RouteEvent};
use crate::sequence::{HyperlapsePoint, Sequence};
use hyperlapse_env::{GeoPoint, PanoramaService};
use tracing::{debug, info, warn};

/// How a sequencing pass ended.
#[derive(Debug)]
pub enum SequencingOutcome {
    /// Every sample was visited (or the walk was truncated at a gap)
    Complete(Sequence),

    /// A cancel request was observed; the points gathered so far
    Canceled(Sequence),
}

/// Resolves raw samples to panoramas, one at a time.
#[derive(Debug, Clone)]
pub struct PanoramaSequencer {
    search_radius_m: f64,
    policy: NotFoundPolicy,
}

impl PanoramaSequencer {
    pub fn new(search_radius_m: f64, policy: NotFoundPolicy) -> Self {
        Self {
            search_radius_m,
            policy,
        }
    }

    /// Walks `samples` in order and builds the sequence.
    ///
    /// `cancel` is polled after every lookup; once a request is seen no
    /// further points are appended and `RouteEvent::Canceled` fires in place
    /// of `RouteEvent::Complete`.
    pub async fn run<P>(
        &self,
        samples: &[GeoPoint],
        panoramas: &P,
        cancel: &CancelFlag,
        route_events: &mut EventChannel<RouteEvent>,
        error_events: &mut EventChannel<ErrorEvent>,
    ) -> Result<SequencingOutcome, HyperlapseError>
    where
        P: PanoramaService + ?Sized,
    {
        let total = samples.len();
        let mut sequence = Sequence::new();

        for (index, sample) in samples.iter().enumerate() {
            let resolved = panoramas.resolve_panorama(*sample, self.search_radius_m).await;

            if cancel.is_requested() {
                info!("Sequencing canceled after {}/{} samples", index, total);
                route_events.emit(&RouteEvent::Canceled { points: sequence.len() });
                return Ok(SequencingOutcome::Canceled(sequence));
            }

            match resolved {
                Ok(pano) => {
                    let id = pano.panorama_id.clone();
                    if !sequence.push_unique(HyperlapsePoint::from(pano)) {
                        debug!("Sample {} resolves to {} again, dropped", index, id);
                    }
                }
                Err(err) if err.is_not_found() => {
                    let message = HyperlapseError::PanoramaNotFound(*sample).to_string();
                    warn!("{} (sample {}/{})", message, index, total);
                    error_events.emit(&ErrorEvent::new(message));

                    if self.policy == NotFoundPolicy::Truncate {
                        break;
                    }
                }
                Err(err) => return Err(err.into()),
            }

            route_events.emit(&RouteEvent::Progress {
                sample: index + 1,
                total,
                accepted: sequence.len(),
            });
        }

        info!("Sequenced {} samples into {} panoramas", total, sequence.len());
        route_events.emit(&RouteEvent::Complete { points: sequence.len() });
        Ok(SequencingOutcome::Complete(sequence))
    }
}
