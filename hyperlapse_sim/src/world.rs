//! SimWorld - The simulation harness container.

use crate::context::SimContext;
use crate::error::SimError;
use crate::exporter::SimFrame;
use crate::provider::{FailurePlan, ProviderConfig, ProviderStats, SyntheticStreetView};

use hyperlapse_core::geometry::offset_m;
use hyperlapse_core::{
    CameraPose, GenerateOutcome, GenerateRequest, Hyperlapse, HyperlapseConfig, HyperlapseError,
    HyperlapseEvents,
    LoadEvent, PlaybackEvent, RenderSink, RouteEvent,
};
use hyperlapse_env::{GeoPoint, HyperlapseContext, PanoramaImage};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Default route origin (Zurich main station).
pub const DEFAULT_START: GeoPoint = GeoPoint::new(47.3779, 8.5403);

/// When to fire a cancel during `generate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelTrigger {
    /// While the n-th panorama lookup (1-based) is in flight
    PanoramaRequest(usize),

    /// While the n-th image request (1-based) is in flight
    ImageRequest(usize),
}

impl CancelTrigger {
    fn is_due(&self, stats: ProviderStats) -> bool {
        match *self {
            CancelTrigger::PanoramaRequest(n) => stats.panorama_requests >= n,
            CancelTrigger::ImageRequest(n) => stats.image_requests >= n,
        }
    }
}

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Route endpoints
    pub start: GeoPoint,
    pub end: GeoPoint,

    /// Virtual seconds of playback after a successful generate
    pub playback_secs: f64,

    /// Configuration handed to the hyperlapse
    pub hyperlapse: HyperlapseConfig,

    /// Shape of the synthetic world
    pub provider: ProviderConfig,

    /// Injected faults
    pub failures: FailurePlan,

    pub cancel: Option<CancelTrigger>,
}

impl Default for SimConfig {
    fn default() -> Self {
        let start = DEFAULT_START;
        Self {
            seed: 42,
            start,
            end: offset_m(start, 1_200.0, 900.0),
            playback_secs: 10.0,
            hyperlapse: HyperlapseConfig::default().with_lookat(offset_m(start, 300.0, 900.0)),
            provider: ProviderConfig::default(),
            failures: FailurePlan::default(),
            cancel: None,
        }
    }
}

/// Everything the event channels reported during a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventCounts {
    pub resolved: usize,
    pub route_progress: usize,
    pub route_complete: usize,
    pub route_canceled: usize,
    pub load_progress: usize,
    pub load_complete: usize,
    pub load_canceled: usize,
    pub frames: usize,
    pub plays: usize,
    pub pauses: usize,
    pub errors: usize,

    pub frame_trail: FrameTrail,

    #[serde(skip)]
    pub error_messages: Vec<String>,
}

/// Running summary of frame positions, fixed-size however long playback runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameTrail {
    pub last: Option<usize>,
    pub highest: Option<usize>,

    /// Consecutive frames more than one position apart
    pub jumps: usize,
}

impl FrameTrail {
    pub fn record(&mut self, position: usize) {
        if let Some(last) = self.last {
            if last.abs_diff(position) > 1 {
                self.jumps += 1;
            }
        }
        self.last = Some(position);
        self.highest = Some(self.highest.map_or(position, |highest| highest.max(position)));
    }
}

/// Listener set that tallies every hyperlapse event.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    inner: Arc<Mutex<EventCounts>>,
}

impl EventLog {
    /// Subscribes to every channel of `events`.
    pub fn attach(events: &mut HyperlapseEvents) -> Self {
        let log = Self::default();

        let inner = log.inner.clone();
        events.route.subscribe(move |event| {
            if let Ok(mut counts) = inner.lock() {
                match event {
                    RouteEvent::Resolved { .. } => counts.resolved += 1,
                    RouteEvent::Progress { .. } => counts.route_progress += 1,
                    RouteEvent::Complete { .. } => counts.route_complete += 1,
                    RouteEvent::Canceled { .. } => counts.route_canceled += 1,
                }
            }
        });

        let inner = log.inner.clone();
        events.load.subscribe(move |event| {
            if let Ok(mut counts) = inner.lock() {
                match event {
                    LoadEvent::Progress { .. } => counts.load_progress += 1,
                    LoadEvent::Complete { .. } => counts.load_complete += 1,
                    LoadEvent::Canceled { .. } => counts.load_canceled += 1,
                }
            }
        });

        let inner = log.inner.clone();
        events.playback.subscribe(move |event| {
            if let Ok(mut counts) = inner.lock() {
                match event {
                    PlaybackEvent::Frame(frame) => {
                        counts.frames += 1;
                        counts.frame_trail.record(frame.position);
                    }
                    PlaybackEvent::Play => counts.plays += 1,
                    PlaybackEvent::Pause => counts.pauses += 1,
                }
            }
        });

        let inner = log.inner.clone();
        events.error.subscribe(move |event| {
            if let Ok(mut counts) = inner.lock() {
                counts.errors += 1;
                counts.error_messages.push(event.message.clone());
            }
        });

        log
    }

    pub fn snapshot(&self) -> EventCounts {
        self.inner.lock().map(|counts| counts.clone()).unwrap_or_default()
    }
}

/// Render sink that keeps pose statistics and samples frames for export.
pub struct FrameRecorder {
    ctx: Arc<SimContext>,

    /// Keep every n-th frame (0 keeps none)
    every: usize,

    rendered: usize,
    pitch_range: Option<(f64, f64)>,
    frames: Vec<SimFrame>,
}

impl FrameRecorder {
    pub fn new(ctx: Arc<SimContext>, every: usize) -> Self {
        Self {
            ctx,
            every,
            rendered: 0,
            pitch_range: None,
            frames: Vec::new(),
        }
    }

    pub fn rendered(&self) -> usize {
        self.rendered
    }

    /// Smallest and largest camera pitch rendered so far.
    pub fn pitch_range(&self) -> Option<(f64, f64)> {
        self.pitch_range
    }

    pub fn frames(&self) -> &[SimFrame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<SimFrame> {
        self.frames
    }
}

impl RenderSink for FrameRecorder {
    fn render(&mut self, pose: &CameraPose, texture: Option<&PanoramaImage>) {
        let pitch = pose.pitch_deg;
        self.pitch_range = Some(match self.pitch_range {
            Some((low, high)) => (low.min(pitch), high.max(pitch)),
            None => (pitch, pitch),
        });

        if self.every > 0 && self.rendered % self.every == 0 {
            let time = self.ctx.now().as_secs_f64();
            self.frames.push(SimFrame::from_pose(time, pose, texture));
        }
        self.rendered += 1;
    }
}

/// The SimWorld - a hyperlapse wired to a synthetic provider on a virtual clock.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    pub provider: Arc<SyntheticStreetView>,

    pub hyperlapse: Hyperlapse<SyntheticStreetView>,

    pub log: EventLog,
}

impl SimWorld {
    /// Creates a new simulation world.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        let context = SimContext::shared(config.seed);
        let provider = Arc::new(SyntheticStreetView::new(
            context.clone(),
            config.start,
            config.end,
            config.provider.clone(),
            config.failures.clone(),
        ));

        let hyperlapse_config = config.hyperlapse.clone().with_endpoints(config.start, config.end);
        let mut hyperlapse = Hyperlapse::new(provider.clone(), hyperlapse_config)?;
        let log = EventLog::attach(&mut hyperlapse.events);

        Ok(Self {
            config,
            context,
            provider,
            hyperlapse,
            log,
        })
    }

    /// Runs `generate` from the configured endpoints, firing the configured
    /// cancel trigger along the way.
    pub async fn generate(&mut self) -> Result<GenerateOutcome, HyperlapseError> {
        let handle = self.hyperlapse.cancel_handle();
        let provider = self.provider.clone();
        let trigger = self.config.cancel;

        let generate = self.hyperlapse.generate(GenerateRequest::default());
        tokio::pin!(generate);

        // Provider calls yield once per virtual sleep. The watcher is polled
        // first, so it looks at the counters while each call is in flight.
        let mut fired = false;
        loop {
            tokio::select! {
                biased;
                _ = tokio::task::yield_now() => {
                    if let Some(trigger) = trigger.filter(|_| !fired) {
                        if trigger.is_due(provider.stats()) {
                            fired = handle.cancel();
                            if fired {
                                debug!("Cancel fired at {:?}", trigger);
                            }
                        }
                    }
                }
                outcome = &mut generate => return outcome,
            }
        }
    }

    /// Plays the hyperlapse for the configured time. Returns frames rendered.
    pub async fn play(&mut self, recorder: &mut FrameRecorder) -> usize {
        if self.hyperlapse.is_empty() {
            return 0;
        }
        self.hyperlapse.play();
        let duration = Duration::from_secs_f64(self.config.playback_secs.max(0.0));
        self.hyperlapse.animate(&*self.context, recorder, duration).await
    }
}
