//! Hyperlapse Core - Street-level panorama flythroughs from driving routes
//!
//! This library turns a route into an animated camera flythrough in four stages:
//! 1. **Resampling**: evenly spaced sample points along the route, within a point budget
//! 2. **Sequencing**: one panorama per sample, consecutive duplicates dropped
//! 3. **Loading**: imagery fetched strictly in order, cancellable between frames
//! 4. **Playback**: a ping-pong frame loop with look-at and elevation-corrected pitch
//!
//! All I/O goes through the traits of `hyperlapse_env`, so the same engines run
//! against a real map service or the deterministic simulator.

pub mod camera;
pub mod cancel;
pub mod config;
pub mod elevation;
pub mod error;
pub mod events;
pub mod geometry;
pub mod loader;
pub mod playback;
pub mod resampler;
pub mod runtime;
pub mod sequence;
pub mod sequencer;

// Re-export key types for convenience
pub use camera::{CameraPose, CameraRig, RenderSink};
pub use cancel::{CancelFlag, CancelHandle};
pub use config::{HyperlapseConfig, NotFoundPolicy};
pub use elevation::{ElevationCorrector, ElevationOutcome};
pub use error::HyperlapseError;
pub use events::{
    ErrorEvent, EventChannel, FrameEvent, HyperlapseEvents, ListenerId, LoadEvent, PlaybackEvent,
    RouteEvent,
};
pub use loader::{ImageLoadPipeline, LoadOutcome, LoadStep};
pub use playback::{Direction, Orientation, PlaybackEngine, PlaybackState};
pub use resampler::{resample, RouteResampler};
pub use runtime::{GenerateOutcome, GenerateRequest, Hyperlapse};
pub use sequence::{HyperlapsePoint, Sequence, UNKNOWN_ELEVATION};
pub use sequencer::{PanoramaSequencer, SequencingOutcome};
