//! Hyperlapse runtime: wires the engines to a street-view provider.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Hyperlapse                           │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │           Provider: StreetViewProvider                  │  │
//! │  │  • resolve_route()      • fetch_panorama_image()        │  │
//! │  │  • resolve_panorama()   • fetch_elevations()            │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                             │                                │
//! │  ┌──────────┐ ┌───────────┐ ┌───────────┐ ┌──────────────┐   │
//! │  │ RESAMPLE │→│ SEQUENCE  │→│ ELEVATION │→│  LOAD IMAGES │   │
//! │  └──────────┘ └───────────┘ └───────────┘ └──────────────┘   │
//! │                                                  │           │
//! │                                    ┌─────────────▼────────┐  │
//! │                                    │  PLAYBACK + CAMERA   │  │
//! │                                    └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use hyperlapse_core::{Hyperlapse, HyperlapseConfig, GenerateRequest};
//! use hyperlapse_env::TokioContext;
//!
//! let config = HyperlapseConfig::default().with_endpoints(start, end).with_lookat(landmark);
//! let mut hyperlapse = Hyperlapse::new(provider, config)?;
//!
//! hyperlapse.generate(GenerateRequest::default()).await?;
//! hyperlapse.play();
//! hyperlapse.animate(&*TokioContext::shared(), &mut renderer, Duration::from_secs(30)).await;
//! ```

use crate::camera::{CameraPose, RenderSink};
use crate::cancel::{CancelFlag, CancelHandle};
use crate::config::HyperlapseConfig;
use crate::elevation::{ElevationCorrector, ElevationOutcome};
use crate::error::HyperlapseError;
use crate::events::{ErrorEvent, HyperlapseEvents, RouteEvent};
use crate::loader::{ImageLoadPipeline, LoadOutcome};
use crate::playback::{PlaybackEngine, PlaybackState};
use crate::resampler::resample;
use crate::sequence::{HyperlapsePoint, Sequence};
use crate::sequencer::{PanoramaSequencer, SequencingOutcome};
use hyperlapse_env::{GeoPoint, HyperlapseContext, PanoramaImage, Route, StreetViewProvider};

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Per-call overrides for [`Hyperlapse::generate`].
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// Use this route instead of resolving `config.start` → `config.end`
    pub route: Option<Route>,

    /// Overrides `config.distance_between_points_m`
    pub distance_between_points_m: Option<f64>,

    /// Overrides `config.max_points`
    pub max_points: Option<usize>,
}

impl GenerateRequest {
    pub fn with_route(route: Route) -> Self {
        Self {
            route: Some(route),
            ..Self::default()
        }
    }
}

/// How a successful `generate` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// Every frame is loaded and the animation is running
    Ready { frames: usize },

    /// A cancel request stopped sequencing or loading; nothing was kept
    Canceled,
}

/// A hyperlapse over one provider.
///
/// Generic over the provider so the same code runs against a real map
/// service or the simulated one.
pub struct Hyperlapse<P>
where
    P: StreetViewProvider + ?Sized,
{
    /// Configuration
    pub config: HyperlapseConfig,

    /// Event channels; subscribe before calling `generate`
    pub events: HyperlapseEvents,

    provider: Arc<P>,

    /// The active sequence; empty until a `generate` completes
    sequence: Sequence,

    sequencer: PanoramaSequencer,
    sequencing: CancelFlag,
    elevation: ElevationCorrector,
    pipeline: ImageLoadPipeline,
    engine: PlaybackEngine,
}

impl<P> Hyperlapse<P>
where
    P: StreetViewProvider + ?Sized,
{
    /// Creates a hyperlapse; fails if `config` does not validate.
    pub fn new(provider: Arc<P>, config: HyperlapseConfig) -> Result<Self, HyperlapseError> {
        config.validate()?;

        Ok(Self {
            events: HyperlapseEvents::default(),
            provider,
            sequence: Sequence::new(),
            sequencer: PanoramaSequencer::new(config.search_radius_m, config.not_found_policy),
            sequencing: CancelFlag::new(),
            elevation: ElevationCorrector::new(config.use_elevation),
            pipeline: ImageLoadPipeline::new(),
            engine: PlaybackEngine::new(&config),
            config,
        })
    }

    /// Handle that cancels a running `generate` from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            sequencing: self.sequencing.clone(),
            loading: self.pipeline.control(),
        }
    }

    /// Requests cancellation of whichever pass is running.
    pub fn cancel(&self) -> bool {
        self.cancel_handle().cancel()
    }

    /// Builds a new sequence and loads its imagery.
    ///
    /// The previous sequence is discarded up front. On any error or cancel
    /// the hyperlapse is left empty and idle.
    pub async fn generate(
        &mut self,
        request: GenerateRequest,
    ) -> Result<GenerateOutcome, HyperlapseError> {
        if self.sequencing.is_active() || self.pipeline.is_loading() {
            return Err(HyperlapseError::Busy);
        }
        self.engine.pause(&mut self.events.playback);

        let spacing = request
            .distance_between_points_m
            .unwrap_or(self.config.distance_between_points_m);
        let max_points = request.max_points.unwrap_or(self.config.max_points);

        let route = match request.route {
            Some(route) => route,
            None => self.resolve_route().await?,
        };
        self.reset();

        let samples = resample(&route, spacing, max_points).map_err(|err| self.report(err))?;
        info!(
            "Sequencing {} samples over {:.0}m of route",
            samples.len(),
            route.total_distance_m()
        );

        self.sequencing.activate();
        let sequenced = self
            .sequencer
            .run(
                &samples,
                &*self.provider,
                &self.sequencing,
                &mut self.events.route,
                &mut self.events.error,
            )
            .await;
        self.sequencing.finish();

        let mut sequence = match sequenced.map_err(|err| self.report(err))? {
            SequencingOutcome::Complete(sequence) => sequence,
            SequencingOutcome::Canceled(_) => return Ok(GenerateOutcome::Canceled),
        };
        if sequence.is_empty() {
            return Err(self.report(HyperlapseError::EmptySequence));
        }

        let lookat = self.engine.lookat();
        match self.elevation.correct(&mut sequence, lookat, &*self.provider).await {
            ElevationOutcome::Applied {
                lookat_elevation_m: Some(elevation),
            } => self.engine.set_lookat_elevation(elevation),
            ElevationOutcome::Disabled { reason } => self.elevation_failed(reason),
            ElevationOutcome::Applied { lookat_elevation_m: None } | ElevationOutcome::Skipped => {}
        }

        self.engine.reset(sequence.len());
        self.engine.set_loading(true);
        let loaded = self
            .pipeline
            .load_images(&mut sequence, &*self.provider, self.config.zoom, &mut self.events.load)
            .await;
        self.engine.set_loading(false);

        match loaded {
            Ok(LoadOutcome::Complete { frames }) => {
                self.sequence = sequence;
                self.engine.start_animation(&self.sequence, &mut self.events.playback);
                info!("Hyperlapse ready: {} frames", frames);
                Ok(GenerateOutcome::Ready { frames })
            }
            Ok(LoadOutcome::Canceled { .. }) => {
                self.engine.reset(0);
                Ok(GenerateOutcome::Canceled)
            }
            Err(err) => {
                self.engine.reset(0);
                Err(self.report(err))
            }
        }
    }

    async fn resolve_route(&mut self) -> Result<Route, HyperlapseError> {
        let (Some(start), Some(end)) = (self.config.start, self.config.end) else {
            return Err(self.report(HyperlapseError::MissingEndpoints));
        };

        match self.provider.resolve_route(start, end).await {
            Ok(route) if route.overview_path().len() >= 2 => {
                self.events.route.emit(&RouteEvent::Resolved {
                    legs: route.legs.len(),
                    distance_m: route.total_distance_m(),
                });
                Ok(route)
            }
            Ok(_) => Err(self.report(HyperlapseError::RouteResolution(
                "route has no drivable path".to_string(),
            ))),
            Err(err) => Err(self.report(HyperlapseError::RouteResolution(err.to_string()))),
        }
    }

    /// Logs `err`, forwards it to the error channel and hands it back.
    fn report(&mut self, err: HyperlapseError) -> HyperlapseError {
        error!("{}", err);
        self.events.error.emit(&ErrorEvent::new(err.to_string()));
        err
    }

    fn elevation_failed(&mut self, reason: String) {
        self.engine.disable_elevation();
        let message = HyperlapseError::ElevationService(reason).to_string();
        self.events.error.emit(&ErrorEvent::new(message));
    }

    /// Starts playback. Returns false while imagery is loading.
    pub fn play(&mut self) -> bool {
        self.engine.play(&mut self.events.playback)
    }

    pub fn pause(&mut self) {
        self.engine.pause(&mut self.events.playback);
    }

    pub fn next(&mut self) -> bool {
        self.engine.next(&self.sequence, &mut self.events.playback)
    }

    pub fn prev(&mut self) -> bool {
        self.engine.prev(&self.sequence, &mut self.events.playback)
    }

    /// Advances playback by `elapsed`; see [`PlaybackEngine::tick`].
    pub fn tick(&mut self, elapsed: Duration) -> Option<CameraPose> {
        self.engine.tick(elapsed, &self.sequence, &mut self.events.playback)
    }

    /// Renders on `ctx`'s clock for `duration`, one tick per render interval.
    ///
    /// Returns the number of frames handed to `sink`.
    pub async fn animate<C, S>(&mut self, ctx: &C, sink: &mut S, duration: Duration) -> usize
    where
        C: HyperlapseContext + ?Sized,
        S: RenderSink + ?Sized,
    {
        let start = ctx.now();
        let mut last = start;
        let mut rendered = 0;

        while ctx.now().saturating_sub(start) < duration {
            ctx.sleep(self.config.render_interval()).await;
            let now = ctx.now();
            let elapsed = now.saturating_sub(last);
            last = now;

            if let Some(pose) = self.tick(elapsed) {
                sink.render(&pose, self.current_image());
                rendered += 1;
            }
        }
        rendered
    }

    /// Points the camera at a new landmark and re-resolves its elevation.
    pub async fn set_lookat(&mut self, target: GeoPoint) -> ElevationOutcome {
        self.config.lookat = Some(target);
        self.engine.set_lookat(Some(target));

        let outcome = self.elevation.refresh_lookat(target, &*self.provider).await;
        match &outcome {
            ElevationOutcome::Applied {
                lookat_elevation_m: Some(elevation),
            } => self.engine.set_lookat_elevation(*elevation),
            ElevationOutcome::Disabled { reason } => self.elevation_failed(reason.clone()),
            _ => {}
        }

        if self.engine.is_animating() {
            self.engine.draw_frame(&self.sequence, &mut self.events.playback);
        }
        outcome
    }

    pub fn enable_lookat(&mut self) {
        self.config.use_lookat = true;
        self.engine.enable_lookat();
    }

    pub fn disable_lookat(&mut self) {
        self.config.use_lookat = false;
        self.engine.disable_lookat();
    }

    pub fn set_pitch(&mut self, pitch_deg: f64) {
        self.engine.set_pitch(pitch_deg);
    }

    pub fn set_fov(&mut self, fov_deg: f64) {
        self.engine.rig_mut().set_fov(fov_deg);
        self.config.fov_deg = self.engine.rig().fov_deg();
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.config.width = width;
        self.config.height = height;
        self.engine.rig_mut().set_size(width, height);
    }

    pub fn set_tilt(&mut self, tilt_deg: f64) {
        self.config.tilt_deg = tilt_deg;
        self.engine.rig_mut().set_tilt(tilt_deg);
    }

    pub fn set_elevation_offset(&mut self, offset_m: f64) {
        self.config.elevation_offset_m = offset_m;
        self.engine.set_elevation_offset(offset_m);
    }

    /// Drops the sequence and returns every state machine to idle.
    pub fn reset(&mut self) {
        self.sequencing.finish();
        self.pipeline.abort();
        self.sequence = Sequence::new();
        self.engine.reset(0);
        self.engine.stop_animation();
        self.engine.set_loading(false);
    }

    /// Number of frames in the active sequence.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_playing()
    }

    pub fn is_loading(&self) -> bool {
        self.pipeline.is_loading()
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    /// Snapshot of the playback state, load flags included.
    pub fn playback_state(&self) -> PlaybackState {
        let mut state = self.engine.state().clone();
        state.is_loading = self.pipeline.is_loading();
        state.cancel_requested =
            self.pipeline.is_cancel_requested() || self.sequencing.is_requested();
        state
    }

    pub fn current_point(&self) -> Option<&HyperlapsePoint> {
        self.sequence.get(self.engine.current_index())
    }

    pub fn current_image(&self) -> Option<&PanoramaImage> {
        self.current_point().and_then(|point| point.image.as_ref())
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{LoadEvent, PlaybackEvent};
    use crate::geometry::{distance_m, offset_m};
    use crate::loader::texture_size;
    use async_trait::async_trait;
    use hyperlapse_env::{
        ElevationService, EnvError, ImageryService, PanoramaLocation, PanoramaService, RouteLeg,
        RouteService, TokioContext,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::SystemTime;

    const START: GeoPoint = GeoPoint::new(45.0, 7.0);
    const GRID_M: f64 = 20.0;

    /// A straight 200 m road due north with a panorama every 20 m.
    #[derive(Default)]
    struct StraightRoad {
        panorama_calls: AtomicUsize,
        image_calls: AtomicUsize,
        broken_elevation: bool,
        broken_image: Option<String>,
        cancel_on_panorama: Mutex<Option<(usize, CancelHandle)>>,
        cancel_on_image: Mutex<Option<(usize, CancelHandle)>>,
    }

    fn end() -> GeoPoint {
        offset_m(START, 200.0, 0.0)
    }

    fn maybe_cancel(slot: &Mutex<Option<(usize, CancelHandle)>>, call: usize) {
        if let Some((at, handle)) = slot.lock().unwrap().as_ref() {
            if *at == call {
                handle.cancel();
            }
        }
    }

    #[async_trait]
    impl RouteService for StraightRoad {
        async fn resolve_route(
            &self,
            origin: GeoPoint,
            destination: GeoPoint,
        ) -> Result<Route, EnvError> {
            let path = vec![origin, offset_m(origin, 90.0, 0.0), destination];
            Ok(Route::new(vec![RouteLeg::new(path, distance_m(origin, destination))]))
        }
    }

    #[async_trait]
    impl PanoramaService for StraightRoad {
        async fn resolve_panorama(
            &self,
            point: GeoPoint,
            _radius_m: f64,
        ) -> Result<PanoramaLocation, EnvError> {
            let call = self.panorama_calls.fetch_add(1, Ordering::SeqCst) + 1;
            maybe_cancel(&self.cancel_on_panorama, call);

            let slot = (distance_m(START, point) / GRID_M).round();
            Ok(PanoramaLocation {
                location: offset_m(START, slot * GRID_M, 0.0),
                panorama_id: format!("pano-{slot}"),
                heading_deg: 0.0,
                pitch_deg: 0.0,
                copyright: "© test".to_string(),
                capture_date: None,
            })
        }
    }

    #[async_trait]
    impl ImageryService for StraightRoad {
        async fn fetch_panorama_image(
            &self,
            panorama_id: &str,
            zoom: u8,
        ) -> Result<PanoramaImage, EnvError> {
            let call = self.image_calls.fetch_add(1, Ordering::SeqCst) + 1;
            maybe_cancel(&self.cancel_on_image, call);

            if self.broken_image.as_deref() == Some(panorama_id) {
                return Err(EnvError::image_fetch(panorama_id, "404"));
            }
            let (width, height) = texture_size(zoom);
            Ok(PanoramaImage::new(panorama_id, width, height, Arc::from(vec![0u8; 16])))
        }
    }

    #[async_trait]
    impl ElevationService for StraightRoad {
        async fn fetch_elevations(&self, points: &[GeoPoint]) -> Result<Vec<f64>, EnvError> {
            if self.broken_elevation {
                return Err(EnvError::RateLimited("OVER_QUERY_LIMIT".to_string()));
            }
            Ok(points.iter().map(|p| 100.0 + distance_m(START, *p) * 0.1).collect())
        }
    }

    /// Virtual clock: `sleep` just moves time forward.
    #[derive(Default)]
    struct ManualClock {
        now: Mutex<Duration>,
    }

    #[async_trait]
    impl HyperlapseContext for ManualClock {
        fn now(&self) -> Duration {
            *self.now.lock().unwrap()
        }

        fn system_time(&self) -> SystemTime {
            SystemTime::UNIX_EPOCH + self.now()
        }

        async fn sleep(&self, duration: Duration) {
            *self.now.lock().unwrap() += duration;
        }

        fn seed(&self) -> u64 {
            0
        }
    }

    #[derive(Default)]
    struct CountingSink {
        frames: usize,
        textured: usize,
    }

    impl RenderSink for CountingSink {
        fn render(&mut self, _pose: &CameraPose, texture: Option<&PanoramaImage>) {
            self.frames += 1;
            if texture.is_some() {
                self.textured += 1;
            }
        }
    }

    fn hyperlapse(provider: StraightRoad) -> Hyperlapse<StraightRoad> {
        let config = HyperlapseConfig::default()
            .with_endpoints(START, end())
            .with_lookat(offset_m(START, 100.0, 300.0));
        Hyperlapse::new(Arc::new(provider), config).unwrap()
    }

    fn error_log(hyperlapse: &mut Hyperlapse<StraightRoad>) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        hyperlapse
            .events
            .error
            .subscribe(move |e: &ErrorEvent| sink.lock().unwrap().push(e.message.clone()));
        log
    }

    #[tokio::test]
    async fn test_generate_end_to_end() {
        let mut hyperlapse = hyperlapse(StraightRoad::default());
        let route_events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&route_events);
        hyperlapse
            .events
            .route
            .subscribe(move |e: &RouteEvent| sink.lock().unwrap().push(e.clone()));
        let loads = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&loads);
        hyperlapse
            .events
            .load
            .subscribe(move |e: &LoadEvent| sink.lock().unwrap().push(e.clone()));

        let outcome = hyperlapse.generate(GenerateRequest::default()).await.unwrap();

        assert_eq!(outcome, GenerateOutcome::Ready { frames: 11 });
        assert_eq!(hyperlapse.len(), 11);
        assert_eq!(hyperlapse.sequence().adjacent_duplicate(), None);
        assert_eq!(hyperlapse.sequence().loaded_count(), 11);
        assert!(hyperlapse.sequence().iter().all(|p| p.has_elevation()));
        assert!(matches!(route_events.lock().unwrap()[0], RouteEvent::Resolved { legs: 1, .. }));
        assert_eq!(loads.lock().unwrap().last(), Some(&LoadEvent::Complete { frames: 11 }));
        assert!(!hyperlapse.is_loading());
        assert!(hyperlapse.engine().is_animating());
        assert!(hyperlapse.current_image().is_some());
    }

    #[tokio::test]
    async fn test_given_route_skips_resolution() {
        let mut hyperlapse = hyperlapse(StraightRoad::default());
        let resolved = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&resolved);
        hyperlapse.events.route.subscribe(move |e: &RouteEvent| {
            if matches!(e, RouteEvent::Resolved { .. }) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let leg = RouteLeg::new(vec![START, offset_m(START, 100.0, 0.0)], 100.0);
        let route = Route::new(vec![leg]);
        let outcome = hyperlapse.generate(GenerateRequest::with_route(route)).await.unwrap();

        assert_eq!(outcome, GenerateOutcome::Ready { frames: 6 });
        assert_eq!(resolved.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_endpoints() {
        let provider = Arc::new(StraightRoad::default());
        let mut hyperlapse = Hyperlapse::new(provider, HyperlapseConfig::default()).unwrap();
        let errors = error_log(&mut hyperlapse);

        let result = hyperlapse.generate(GenerateRequest::default()).await;

        assert!(matches!(result, Err(HyperlapseError::MissingEndpoints)));
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_elevation_outage_degrades() {
        let mut hyperlapse = hyperlapse(StraightRoad {
            broken_elevation: true,
            ..StraightRoad::default()
        });
        let errors = error_log(&mut hyperlapse);

        let outcome = hyperlapse.generate(GenerateRequest::default()).await.unwrap();

        assert_eq!(outcome, GenerateOutcome::Ready { frames: 11 });
        assert!(hyperlapse.sequence().iter().all(|p| !p.has_elevation()));
        assert!(!hyperlapse.engine().uses_elevation());
        assert_eq!(errors.lock().unwrap().len(), 1);
        assert!(errors.lock().unwrap()[0].starts_with("Elevation service failed"));

        hyperlapse.play();
        for _ in 0..30 {
            let pose = hyperlapse.tick(Duration::from_millis(50)).unwrap();
            assert_eq!(pose.pitch_deg, 0.0);
        }
    }

    #[tokio::test]
    async fn test_image_failure_leaves_nothing_active() {
        let mut hyperlapse = hyperlapse(StraightRoad {
            broken_image: Some("pano-4".to_string()),
            ..StraightRoad::default()
        });
        let errors = error_log(&mut hyperlapse);

        let result = hyperlapse.generate(GenerateRequest::default()).await;

        assert!(matches!(result, Err(HyperlapseError::ImageFetch { index: 4, .. })));
        assert_eq!(hyperlapse.len(), 0);
        assert!(!hyperlapse.is_loading());
        assert!(hyperlapse.tick(Duration::from_millis(50)).is_none());
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_sequencing() {
        let mut hyperlapse = hyperlapse(StraightRoad::default());
        let handle = hyperlapse.cancel_handle();
        *hyperlapse.provider().cancel_on_panorama.lock().unwrap() = Some((4, handle));

        let outcome = hyperlapse.generate(GenerateRequest::default()).await.unwrap();

        assert_eq!(outcome, GenerateOutcome::Canceled);
        assert_eq!(hyperlapse.len(), 0);
        assert_eq!(hyperlapse.provider().panorama_calls.load(Ordering::SeqCst), 4);
        assert_eq!(hyperlapse.provider().image_calls.load(Ordering::SeqCst), 0);
        assert!(!hyperlapse.playback_state().cancel_requested);

        // Not left busy
        *hyperlapse.provider().cancel_on_panorama.lock().unwrap() = None;
        assert!(hyperlapse.generate(GenerateRequest::default()).await.is_ok());
        assert_eq!(hyperlapse.len(), 11);
    }

    #[tokio::test]
    async fn test_cancel_during_loading() {
        let mut hyperlapse = hyperlapse(StraightRoad::default());
        let handle = hyperlapse.cancel_handle();
        *hyperlapse.provider().cancel_on_image.lock().unwrap() = Some((3, handle));

        let outcome = hyperlapse.generate(GenerateRequest::default()).await.unwrap();

        assert_eq!(outcome, GenerateOutcome::Canceled);
        assert_eq!(hyperlapse.provider().image_calls.load(Ordering::SeqCst), 3);
        assert_eq!(hyperlapse.len(), 0);
        assert!(!hyperlapse.is_loading());
        assert!(!hyperlapse.cancel());
    }

    #[tokio::test]
    async fn test_play_and_step() {
        let mut hyperlapse = hyperlapse(StraightRoad::default());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        hyperlapse
            .events
            .playback
            .subscribe(move |e: &PlaybackEvent| sink.lock().unwrap().push(e.clone()));
        hyperlapse.generate(GenerateRequest::default()).await.unwrap();

        assert!(hyperlapse.play());
        assert!(hyperlapse.is_running());
        assert!(hyperlapse.next());
        assert!(!hyperlapse.is_running());
        assert_eq!(hyperlapse.playback_state().current_index, 1);
        assert!(hyperlapse.prev());
        assert!(!hyperlapse.prev());

        let events = events.lock().unwrap();
        assert!(events.contains(&PlaybackEvent::Play));
        assert!(events.contains(&PlaybackEvent::Pause));
    }

    #[tokio::test]
    async fn test_animate_on_virtual_clock() {
        let mut hyperlapse = hyperlapse(StraightRoad::default());
        hyperlapse.generate(GenerateRequest::default()).await.unwrap();
        hyperlapse.play();

        let clock = ManualClock::default();
        let mut sink = CountingSink::default();
        let rendered = hyperlapse.animate(&clock, &mut sink, Duration::from_millis(160)).await;

        // 10 renders at 16 ms; the 50 ms frame interval elapses twice
        assert_eq!(rendered, 10);
        assert_eq!(sink.textured, 10);
        assert_eq!(hyperlapse.playback_state().current_index, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_animate_on_tokio_clock_ping_pongs() {
        let mut hyperlapse = hyperlapse(StraightRoad::default());
        let positions = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&positions);
        hyperlapse.events.playback.subscribe(move |e: &PlaybackEvent| {
            if let PlaybackEvent::Frame(frame) = e {
                sink.lock().unwrap().push(frame.position);
            }
        });
        hyperlapse.generate(GenerateRequest::default()).await.unwrap();
        hyperlapse.play();

        let ctx = TokioContext::shared();
        let mut renderer = CountingSink::default();
        let rendered = hyperlapse.animate(&*ctx, &mut renderer, Duration::from_secs(2)).await;

        assert!(rendered >= 120);
        assert_eq!(renderer.textured, rendered);
        assert!(ctx.now() >= Duration::from_secs(2));

        let mut visited = positions.lock().unwrap().clone();
        visited.dedup();
        let mut expected: Vec<usize> = (0..=10).collect();
        expected.extend((0..10).rev());
        expected.push(1);
        assert!(visited.len() >= expected.len(), "visited {:?}", visited);
        assert_eq!(visited[..expected.len()], expected[..]);
    }

    #[tokio::test]
    async fn test_set_lookat_refreshes_elevation() {
        let mut hyperlapse = hyperlapse(StraightRoad::default());
        hyperlapse.generate(GenerateRequest::default()).await.unwrap();

        let outcome = hyperlapse.set_lookat(offset_m(START, 100.0, 0.0)).await;

        let ElevationOutcome::Applied {
            lookat_elevation_m: Some(elevation),
        } = outcome
        else {
            panic!("expected an elevation");
        };
        assert!((elevation - 110.0).abs() < 1e-6);
        assert_eq!(hyperlapse.engine().lookat_elevation_m(), elevation);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = HyperlapseConfig::default().with_max_points(0);
        assert!(Hyperlapse::new(Arc::new(StraightRoad::default()), config).is_err());
    }
}
