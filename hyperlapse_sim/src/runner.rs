//! Scenario runner - drives a hyperlapse through each scenario and checks it.

use crate::error::{ensure, SimError};
use crate::exporter::SimExport;
use crate::provider::{ElevationFault, ProviderStats};
use crate::scenarios::ScenarioId;
use crate::world::{CancelTrigger, EventCounts, FrameRecorder, SimConfig, SimWorld};

use hyperlapse_core::geometry::{distance_m, offset_m};
use hyperlapse_core::{
    resample, GenerateOutcome, HyperlapseConfig, HyperlapseError, NotFoundPolicy, RouteResampler,
};
use hyperlapse_env::HyperlapseContext;
use serde::Serialize;
use tracing::{debug, info};

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Frames in the generated sequence
    pub frames: usize,

    /// Final virtual time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

impl ScenarioResult {
    fn aborted(scenario: ScenarioId, seed: u64, err: SimError) -> Self {
        Self {
            scenario,
            seed,
            passed: false,
            frames: 0,
            final_time_secs: 0.0,
            failure_reason: Some(err.to_string()),
            metrics: ScenarioMetrics::default(),
        }
    }
}

/// Tally of a batch of scenario runs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<ScenarioResult>,
}

impl RunSummary {
    pub fn record(&mut self, result: ScenarioResult) {
        self.total += 1;
        if result.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|result| !result.passed)
    }
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Driving distance of the route (m)
    pub route_distance_m: f64,

    /// Spacing the resampler actually used (m)
    pub spacing_m: f64,

    /// Raw samples before sequencing
    pub raw_samples: usize,

    pub sequence_len: usize,

    /// Frames handed to the render sink
    pub frames_rendered: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch_min_deg: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch_max_deg: Option<f64>,

    pub provider: ProviderStats,

    pub events: EventCounts,
}

/// What a finished run left behind.
struct Run {
    world: SimWorld,
    outcome: Result<GenerateOutcome, HyperlapseError>,
    recorder: FrameRecorder,
    raw_samples: usize,
}

impl Run {
    fn sequence_len(&self) -> usize {
        self.world.hyperlapse.len()
    }

    fn stats(&self) -> ProviderStats {
        self.world.provider.stats()
    }

    fn expect_ready(&self) -> Result<usize, SimError> {
        match &self.outcome {
            Ok(GenerateOutcome::Ready { frames }) => Ok(*frames),
            other => Err(SimError::invariant(format!(
                "expected a ready sequence, got {:?}",
                other
            ))),
        }
    }

    fn expect_canceled(&self) -> Result<(), SimError> {
        ensure(matches!(self.outcome, Ok(GenerateOutcome::Canceled)), || {
            format!("expected a canceled generate, got {:?}", self.outcome)
        })
    }
}

/// Runs hyperlapse scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Virtual seconds of playback
    duration_secs: f64,

    spacing_m: Option<f64>,
    max_points: Option<usize>,

    /// Base hyperlapse configuration (scenario defaults otherwise)
    hyperlapse: Option<HyperlapseConfig>,

    /// Export every n-th rendered frame (0 = none)
    record_every: usize,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            duration_secs: 10.0,
            spacing_m: None,
            max_points: None,
            hyperlapse: None,
            record_every: 0,
        }
    }

    /// Sets the playback duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    /// Overrides the target spacing between samples.
    pub fn with_spacing(mut self, meters: f64) -> Self {
        self.spacing_m = Some(meters);
        self
    }

    /// Overrides the point budget.
    pub fn with_max_points(mut self, max_points: usize) -> Self {
        self.max_points = Some(max_points);
        self
    }

    /// Replaces the base hyperlapse configuration.
    pub fn with_config(mut self, config: HyperlapseConfig) -> Self {
        self.hyperlapse = Some(config);
        self
    }

    /// Keeps every n-th rendered frame for export.
    pub fn with_recording(mut self, every: usize) -> Self {
        self.record_every = every;
        self
    }

    /// Builds the world configuration for `scenario`.
    pub fn configure(&self, scenario: ScenarioId) -> SimConfig {
        let mut config = SimConfig {
            seed: self.seed,
            playback_secs: self.duration_secs,
            ..SimConfig::default()
        };
        if let Some(hyperlapse) = &self.hyperlapse {
            config.hyperlapse = hyperlapse.clone();
        }
        if let Some(spacing) = self.spacing_m {
            config.hyperlapse.distance_between_points_m = spacing;
        }
        if let Some(max_points) = self.max_points {
            config.hyperlapse.max_points = max_points;
        }

        let start = config.start;
        match scenario {
            ScenarioId::Cruise => {}
            ScenarioId::Winding => {
                config.end = offset_m(start, 2_000.0, 200.0);
                config.provider.road_vertices = 12;
                config.provider.road_wiggle_m = 120.0;
                config.provider.legs = 4;
            }
            ScenarioId::LongHaul => {
                config.end = offset_m(start, 20_000.0, 15_000.0);
                config.provider.road_vertices = 30;
                config.provider.road_wiggle_m = 300.0;
                config.hyperlapse.lookat = Some(offset_m(start, 10_000.0, 8_000.0));
            }
            ScenarioId::CoverageGap => {
                config.failures.coverage_gap = Some((0.6, 1.0));
                config.hyperlapse.not_found_policy = NotFoundPolicy::Truncate;
            }
            ScenarioId::ElevationOutage => {
                config.failures.elevation = Some(ElevationFault::RateLimited);
            }
            ScenarioId::CancelSequencing => {
                config.cancel = Some(CancelTrigger::PanoramaRequest(8));
            }
            ScenarioId::CancelLoading => {
                config.cancel = Some(CancelTrigger::ImageRequest(5));
            }
            ScenarioId::BrokenImagery => {
                config.failures.broken_image_request = Some(6);
            }
            ScenarioId::Hillclimb => {
                config.provider.terrain_amplitude_m = 120.0;
                config.provider.terrain_wavelength_m = 600.0;
                config.hyperlapse.lookat = Some(offset_m(start, 700.0, 300.0));
            }
        }
        config
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        match self.execute(scenario) {
            Ok((result, _)) => result,
            Err(err) => ScenarioResult::aborted(scenario, self.seed, err),
        }
    }

    /// Runs a scenario and also returns its frame export.
    pub fn run_with_export(
        &self,
        scenario: ScenarioId,
    ) -> Result<(ScenarioResult, SimExport), SimError> {
        let runner = Self {
            record_every: self.record_every.max(1),
            hyperlapse: self.hyperlapse.clone(),
            ..*self
        };
        runner.execute(scenario)
    }

    fn execute(&self, scenario: ScenarioId) -> Result<(ScenarioResult, SimExport), SimError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(SimError::Runtime)?;
        runtime.block_on(self.execute_async(scenario))
    }

    /// Runs `scenario` on the current runtime.
    pub async fn execute_async(
        &self,
        scenario: ScenarioId,
    ) -> Result<(ScenarioResult, SimExport), SimError> {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let mut world = SimWorld::new(self.configure(scenario))?;
        let raw_samples = {
            let config = &world.hyperlapse.config;
            let spacing = config.distance_between_points_m;
            resample(world.provider.route(), spacing, config.max_points)?.len()
        };

        let outcome = world.generate().await;
        debug!("generate returned {:?}", outcome);

        let mut recorder = FrameRecorder::new(world.context.clone(), self.record_every);
        if matches!(outcome, Ok(GenerateOutcome::Ready { .. })) {
            world.play(&mut recorder).await;
        }

        let run = Run {
            world,
            outcome,
            recorder,
            raw_samples,
        };
        let verdict = check_common(&run).and_then(|_| check_scenario(scenario, &run));
        let result = self.summarize(scenario, &run, verdict);

        let mut export = SimExport::new(scenario.name(), self.seed);
        export.set_sequence(run.world.hyperlapse.sequence().iter());
        for message in &result.metrics.events.error_messages {
            export.add_error(message.clone());
        }
        for frame in run.recorder.into_frames() {
            export.add_frame(frame);
        }
        export.finalize(result.passed, result.failure_reason.clone());

        Ok((result, export))
    }

    fn summarize(
        &self,
        scenario: ScenarioId,
        run: &Run,
        verdict: Result<(), SimError>,
    ) -> ScenarioResult {
        let config = &run.world.hyperlapse.config;
        let route_distance_m = run.world.provider.road_length_m();
        let (pitch_min_deg, pitch_max_deg) = match run.recorder.pitch_range() {
            Some((low, high)) => (Some(low), Some(high)),
            None => (None, None),
        };

        let metrics = ScenarioMetrics {
            route_distance_m,
            spacing_m: RouteResampler::effective_spacing(
                config.distance_between_points_m,
                config.max_points,
                route_distance_m,
            ),
            raw_samples: run.raw_samples,
            sequence_len: run.sequence_len(),
            frames_rendered: run.recorder.rendered(),
            pitch_min_deg,
            pitch_max_deg,
            provider: run.stats(),
            events: run.world.log.snapshot(),
        };

        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: verdict.is_ok(),
            frames: run.sequence_len(),
            final_time_secs: run.world.context.now().as_secs_f64(),
            failure_reason: verdict.err().map(|err| err.to_string()),
            metrics,
        }
    }
}

/// Checks that hold for every scenario.
fn check_common(run: &Run) -> Result<(), SimError> {
    let stats = run.stats();
    let hyperlapse = &run.world.hyperlapse;
    let config = &hyperlapse.config;
    let counts = run.world.log.snapshot();
    let len = run.sequence_len();

    ensure(stats.max_in_flight <= 1, || {
        format!("{} requests were in flight at once", stats.max_in_flight)
    })?;
    ensure(run.raw_samples <= config.max_points + 2, || {
        format!("{} raw samples for a budget of {}", run.raw_samples, config.max_points)
    })?;
    ensure(hyperlapse.sequence().adjacent_duplicate().is_none(), || {
        "adjacent frames share a panorama".to_string()
    })?;
    ensure(!hyperlapse.is_loading(), || "load still marked running".to_string())?;
    ensure(hyperlapse.sequence().loaded_count() == len, || {
        format!("{} of {} frames have imagery", hyperlapse.sequence().loaded_count(), len)
    })?;
    ensure(counts.frame_trail.highest.map_or(true, |highest| highest < len), || {
        format!("frame position outside 0..{}", len)
    })?;
    ensure(counts.frame_trail.jumps == 0, || {
        format!("playback skipped frames {} times", counts.frame_trail.jumps)
    })?;
    if let Some((low, high)) = run.recorder.pitch_range() {
        ensure(low >= -85.0 && high <= 85.0, || {
            format!("pitch range [{:.2}, {:.2}] leaves the clamp", low, high)
        })?;
    }
    Ok(())
}

/// Scenario-specific checks.
fn check_scenario(scenario: ScenarioId, run: &Run) -> Result<(), SimError> {
    let counts = run.world.log.snapshot();
    let stats = run.stats();
    let engine = run.world.hyperlapse.engine();
    let sequence = run.world.hyperlapse.sequence();

    match scenario {
        ScenarioId::Cruise => {
            let frames = run.expect_ready()?;
            ensure(frames >= 2, || format!("only {} frames", frames))?;
            ensure(counts.resolved == 1 && counts.load_complete == 1, || {
                format!("resolved={} load_complete={}", counts.resolved, counts.load_complete)
            })?;
            ensure(engine.uses_elevation() && sequence.iter().all(|p| p.has_elevation()), || {
                "elevation correction not applied".to_string()
            })?;
            // Enough loop steps to reach the far end means it was visited
            if counts.frames > frames {
                ensure(counts.frame_trail.highest == Some(frames - 1), || {
                    "ping-pong never reached the last frame".to_string()
                })?;
            }
            Ok(())
        }
        ScenarioId::Winding => {
            run.expect_ready()?;
            let config = &run.world.hyperlapse.config;
            let route = run.world.provider.route();
            let spacing = RouteResampler::effective_spacing(
                config.distance_between_points_m,
                config.max_points,
                route.total_distance_m(),
            );
            let samples = resample(route, config.distance_between_points_m, config.max_points)?;
            let gaps: Vec<f64> =
                samples.windows(2).map(|pair| distance_m(pair[0], pair[1])).collect();

            ensure(gaps.iter().all(|&gap| gap <= spacing * 1.001 + 0.01), || {
                "a sample gap exceeds the spacing".to_string()
            })?;
            let mean = gaps.iter().sum::<f64>() / gaps.len().max(1) as f64;
            ensure(mean >= 0.8 * spacing, || {
                format!("mean gap {:.1}m for spacing {:.1}m", mean, spacing)
            })
        }
        ScenarioId::LongHaul => {
            run.expect_ready()?;
            let metrics_spacing = RouteResampler::effective_spacing(
                run.world.hyperlapse.config.distance_between_points_m,
                run.world.hyperlapse.config.max_points,
                run.world.provider.road_length_m(),
            );
            ensure(metrics_spacing > run.world.hyperlapse.config.distance_between_points_m, || {
                "point budget did not widen the spacing".to_string()
            })?;
            ensure(run.sequence_len() <= run.raw_samples, || {
                "sequence longer than its samples".to_string()
            })
        }
        ScenarioId::CoverageGap => {
            run.expect_ready()?;
            let road = run.world.provider.road_length_m();
            let last_along = sequence
                .points()
                .last()
                .and_then(|point| run.world.provider.capture(&point.panorama_id))
                .map_or(0.0, |capture| capture.along_m);

            ensure(run.sequence_len() < run.raw_samples, || "walk was not truncated".to_string())?;
            ensure(counts.errors == 1 && counts.route_complete == 1, || {
                format!("errors={} route_complete={}", counts.errors, counts.route_complete)
            })?;
            ensure(last_along <= 0.6 * road, || {
                format!("last frame at {:.0}m of {:.0}m", last_along, road)
            })
        }
        ScenarioId::ElevationOutage => {
            run.expect_ready()?;
            ensure(!engine.uses_elevation(), || "elevation still in use".to_string())?;
            ensure(sequence.iter().all(|p| !p.has_elevation()), || {
                "a frame kept an elevation".to_string()
            })?;
            ensure(counts.error_messages.iter().any(|m| m.contains("Elevation")), || {
                "no elevation error reported".to_string()
            })?;
            if let Some((low, high)) = run.recorder.pitch_range() {
                ensure(low == 0.0 && high == 0.0, || {
                    format!("pitch [{:.2}, {:.2}] without elevation", low, high)
                })?;
            }
            Ok(())
        }
        ScenarioId::CancelSequencing => {
            run.expect_canceled()?;
            ensure(stats.panorama_requests == 8, || {
                format!("{} panorama requests after cancel on the 8th", stats.panorama_requests)
            })?;
            ensure(stats.image_requests == 0, || "imagery requested after cancel".to_string())?;
            ensure(counts.route_canceled == 1 && counts.route_complete == 0, || {
                format!(
                    "route_canceled={} route_complete={}",
                    counts.route_canceled, counts.route_complete
                )
            })?;
            ensure(run.sequence_len() == 0, || "canceled sequence kept".to_string())
        }
        ScenarioId::CancelLoading => {
            run.expect_canceled()?;
            ensure(stats.image_requests == 5, || {
                format!("{} image requests after cancel on the 5th", stats.image_requests)
            })?;
            ensure(counts.load_canceled == 1 && counts.load_complete == 0, || {
                format!(
                    "load_canceled={} load_complete={}",
                    counts.load_canceled, counts.load_complete
                )
            })?;
            ensure(run.sequence_len() == 0, || "canceled sequence kept".to_string())
        }
        ScenarioId::BrokenImagery => {
            ensure(
                matches!(run.outcome, Err(HyperlapseError::ImageFetch { index: 6, .. })),
                || format!("expected an image failure at frame 6, got {:?}", run.outcome),
            )?;
            ensure(stats.image_requests == 7, || {
                format!("{} image requests, load did not halt", stats.image_requests)
            })?;
            ensure(counts.errors >= 1 && counts.load_complete == 0, || {
                format!("errors={} load_complete={}", counts.errors, counts.load_complete)
            })?;
            ensure(run.sequence_len() == 0, || "failed sequence kept".to_string())
        }
        ScenarioId::Hillclimb => {
            run.expect_ready()?;
            ensure(engine.uses_elevation(), || "elevation correction disabled".to_string())?;
            if let Some((low, high)) = run.recorder.pitch_range() {
                ensure(high - low > 0.1, || {
                    format!("pitch stuck in [{:.2}, {:.2}] on steep terrain", low, high)
                })?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_scenario_passes() {
        let runner = ScenarioRunner::new(42).with_duration(2.0);

        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(result.passed, "{} failed: {:?}", scenario, result.failure_reason);
            assert_eq!(result.frames > 0, scenario.expects_sequence(), "{}", scenario);
        }
    }

    #[test]
    fn test_cruise_scenario() {
        let runner = ScenarioRunner::new(42).with_duration(1.0);

        let result = runner.run(ScenarioId::Cruise);

        assert!(result.passed);
        assert_eq!(result.metrics.sequence_len, result.frames);
        assert!(result.metrics.raw_samples >= result.frames);
        assert!(result.metrics.frames_rendered > 0);
        assert_eq!(result.metrics.provider.image_requests, result.frames);
        assert_eq!(result.metrics.provider.max_in_flight, 1);
    }

    #[test]
    fn test_summary_serializes_results() {
        let runner = ScenarioRunner::new(42).with_duration(0.5);
        let mut summary = RunSummary::default();
        summary.record(runner.run(ScenarioId::Cruise));
        summary.record(ScenarioResult::aborted(
            ScenarioId::CoverageGap,
            42,
            SimError::invariant("no route"),
        ));

        assert_eq!((summary.total, summary.passed, summary.failed), (2, 1, 1));
        assert!(!summary.all_passed());
        assert_eq!(summary.failures().count(), 1);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["results"][0]["scenario"], "cruise");
        assert!(json["results"][0].get("failure_reason").is_none());
        assert_eq!(json["results"][1]["scenario"], "coverage_gap");
        assert!(json["results"][1]["failure_reason"].as_str().unwrap().contains("no route"));
        assert!(json["results"][0]["metrics"]["events"]["frame_trail"]["highest"].is_u64());
    }

    #[test]
    fn test_long_haul_respects_budget() {
        let runner = ScenarioRunner::new(7).with_duration(0.5);

        let result = runner.run(ScenarioId::LongHaul);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.raw_samples <= 102);
        assert!(result.metrics.spacing_m > 200.0);
    }

    #[test]
    fn test_overrides_reach_the_hyperlapse() {
        let runner = ScenarioRunner::new(42).with_spacing(50.0).with_max_points(10);

        let config = runner.configure(ScenarioId::Cruise);

        assert_eq!(config.hyperlapse.distance_between_points_m, 50.0);
        assert_eq!(config.hyperlapse.max_points, 10);
        assert_eq!(config.playback_secs, 10.0);

        let result = runner.with_duration(0.5).run(ScenarioId::Cruise);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.raw_samples <= 12);
    }

    #[test]
    fn test_invalid_config_aborts() {
        let runner = ScenarioRunner::new(42).with_spacing(-1.0);

        let result = runner.run(ScenarioId::Cruise);

        assert!(!result.passed);
        assert!(result.failure_reason.unwrap().contains("distance_between_points_m"));
    }

    #[test]
    fn test_scenarios_deterministic() {
        // Same seed should give the same run
        let runner1 = ScenarioRunner::new(42).with_duration(1.0);
        let runner2 = ScenarioRunner::new(42).with_duration(1.0);

        for scenario in [ScenarioId::Winding, ScenarioId::CancelLoading] {
            let (result1, export1) = runner1.run_with_export(scenario).unwrap();
            let (result2, export2) = runner2.run_with_export(scenario).unwrap();

            assert_eq!(
                serde_json::to_value(&result1.metrics).unwrap(),
                serde_json::to_value(&result2.metrics).unwrap()
            );
            assert_eq!(export1.to_json().unwrap(), export2.to_json().unwrap());
        }
    }

    #[test]
    fn test_seeds_change_the_world() {
        let (_, export1) = ScenarioRunner::new(1)
            .with_duration(0.2)
            .run_with_export(ScenarioId::Cruise)
            .unwrap();
        let (_, export2) = ScenarioRunner::new(2)
            .with_duration(0.2)
            .run_with_export(ScenarioId::Cruise)
            .unwrap();

        assert_ne!(export1.sequence[0].panorama_id, export2.sequence[0].panorama_id);
    }

    #[test]
    fn test_export_samples_frames() {
        let runner = ScenarioRunner::new(42).with_duration(1.0).with_recording(4);

        let (result, export) = runner.run_with_export(ScenarioId::Hillclimb).unwrap();

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(export.sequence.len(), result.frames);
        assert_eq!(export.frames.len(), (result.metrics.frames_rendered + 3) / 4);
        assert!(export.frames.iter().all(|frame| frame.panorama_id.is_some()));
    }
}
