//! Hyperlapse Deterministic Simulation Harness
//!
//! Runs the whole hyperlapse pipeline (route, sequencing, elevation, image
//! loading and playback) against a synthetic street-view provider on a
//! virtual clock.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: a virtual clock that only moves when something sleeps
//! - **Services**: one seeded provider generates the road, the panorama
//!   captures, the imagery and the terrain
//! - **Randomness**: every RNG stream is derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        SimWorld                          │
//! │  ┌────────────────────┐      ┌────────────────────────┐  │
//! │  │ SimContext         │◄─────│ SyntheticStreetView    │  │
//! │  │ (virtual clock)    │      │ road · captures ·      │  │
//! │  └─────────▲──────────┘      │ imagery · terrain      │  │
//! │            │                 └───────────▲────────────┘  │
//! │  ┌─────────┴─────────────────────────────┴────────────┐  │
//! │  │ Hyperlapse<SyntheticStreetView>                    │  │
//! │  └─────────┬───────────────────────────┬──────────────┘  │
//! │            ▼                           ▼                 │
//! │       EventLog                   FrameRecorder           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use hyperlapse_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).with_duration(5.0).run(ScenarioId::Cruise);
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod exporter;
mod provider;
mod runner;
pub mod scenarios;
mod world;

pub use context::SimContext;
pub use error::SimError;
pub use exporter::{CameraTarget, SequenceEntry, SimEvent, SimExport, SimFrame};
pub use provider::{
    Capture, ElevationFault, FailurePlan, ProviderConfig, ProviderStats, SyntheticStreetView,
};
pub use runner::{RunSummary, ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{
    CancelTrigger, EventCounts, EventLog, FrameRecorder, FrameTrail, SimConfig, SimWorld,
    DEFAULT_START,
};
