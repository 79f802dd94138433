//! Synthetic street-view provider.
//!
//! Implements every collaborator trait from `hyperlapse_env` over a road that
//! is generated once, deterministically, from the simulation seed:
//!
//! ```text
//!   start ●──┐      ┌──●──┐         ┌──● end
//!            └──●───┘     └───●─────┘
//!            ↑ captures every `capture_spacing_m`, jittered off the road
//! ```
//!
//! Every call sleeps `latency` on the [`SimContext`] clock and counts itself,
//! so scenarios can assert on request counts and on how many requests were
//! ever in flight at once.

use crate::context::SimContext;
use async_trait::async_trait;
use hyperlapse_core::geometry::{
    bearing_deg, distance_m, offset_m, path_length_m, point_on_line, EARTH_RADIUS_M,
};
use hyperlapse_core::loader::tile_grid;
use hyperlapse_env::{
    ElevationService, EnvError, GeoPoint, HyperlapseContext, ImageryService, PanoramaImage,
    PanoramaLocation,
    PanoramaService, Route, RouteLeg, RouteService,
};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use std::collections::HashMap;
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Builder;

/// RNG streams derived from the master seed.
const ROAD_STREAM: u64 = 1;
const CAPTURE_STREAM: u64 = 2;
const TERRAIN_STREAM: u64 = 3;

/// Endpoints farther than this from the road's ends get no route (m).
const ENDPOINT_TOLERANCE_M: f64 = 100.0;

/// Shape of the synthetic world.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Distance between panorama captures along the road (m)
    pub capture_spacing_m: f64,

    /// Standard deviation of a capture's offset from the road (m)
    pub position_jitter_m: f64,

    /// Standard deviation of the capture rig's pitch (degrees)
    pub pitch_noise_deg: f64,

    /// Interior road vertices between start and end
    pub road_vertices: usize,

    /// Maximum sideways displacement of an interior vertex (m)
    pub road_wiggle_m: f64,

    /// Number of legs the route is split into
    pub legs: usize,

    /// Terrain height at the mean (m)
    pub base_elevation_m: f64,

    /// Terrain undulation amplitude (m)
    pub terrain_amplitude_m: f64,

    /// Terrain undulation wavelength (m)
    pub terrain_wavelength_m: f64,

    /// Virtual time every request takes
    pub latency: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            capture_spacing_m: 12.0,
            position_jitter_m: 1.5,
            pitch_noise_deg: 0.8,
            road_vertices: 6,
            road_wiggle_m: 40.0,
            legs: 2,
            base_elevation_m: 120.0,
            terrain_amplitude_m: 25.0,
            terrain_wavelength_m: 900.0,
            latency: Duration::from_millis(30),
        }
    }
}

/// Elevation service faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationFault {
    /// The service reports its quota exhausted
    RateLimited,

    /// The service answers with a non-OK status
    Unavailable,
}

/// Faults injected into the provider.
#[derive(Debug, Clone, Default)]
pub struct FailurePlan {
    /// Directions requests find no route
    pub route_unavailable: bool,

    /// Every elevation request fails this way
    pub elevation: Option<ElevationFault>,

    /// The image request with this 0-based number fails
    pub broken_image_request: Option<usize>,

    /// Stretch of the road (fractions of its length) with no captures
    pub coverage_gap: Option<(f64, f64)>,
}

/// One captured panorama.
#[derive(Debug, Clone, Serialize)]
pub struct Capture {
    pub location: GeoPoint,
    pub panorama_id: String,
    pub heading_deg: f64,
    pub pitch_deg: f64,

    /// Distance along the road where the capture was taken (m)
    pub along_m: f64,

    pub capture_date: String,
}

/// Request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProviderStats {
    pub route_requests: usize,
    pub panorama_requests: usize,
    pub image_requests: usize,
    pub elevation_requests: usize,

    /// Most requests ever outstanding at the same time
    pub max_in_flight: usize,
}

#[derive(Debug, Default)]
struct Counters {
    route: AtomicUsize,
    panorama: AtomicUsize,
    image: AtomicUsize,
    elevation: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Decrements the in-flight count when a request finishes.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A seeded map provider: route, panoramas, imagery and terrain.
pub struct SyntheticStreetView {
    ctx: Arc<SimContext>,
    config: ProviderConfig,
    failures: FailurePlan,
    start: GeoPoint,
    end: GeoPoint,
    route: Route,
    captures: Vec<Capture>,
    by_id: HashMap<String, usize>,
    terrain_phase: (f64, f64),
    counters: Counters,
}

impl SyntheticStreetView {
    /// Builds the road from `start` to `end` and captures panoramas along it.
    pub fn new(
        ctx: Arc<SimContext>,
        start: GeoPoint,
        end: GeoPoint,
        config: ProviderConfig,
        failures: FailurePlan,
    ) -> Self {
        let mut road_rng = ctx.derive_rng(ROAD_STREAM);
        let vertices = build_road(&mut road_rng, start, end, &config);
        let route = split_legs(&vertices, config.legs);

        let mut capture_rng = ctx.derive_rng(CAPTURE_STREAM);
        let captures = capture_along(&mut capture_rng, &vertices, &config, failures.coverage_gap);
        let by_id = captures
            .iter()
            .enumerate()
            .map(|(i, capture)| (capture.panorama_id.clone(), i))
            .collect();

        let mut terrain_rng = ctx.derive_rng(TERRAIN_STREAM);
        let terrain_phase = (terrain_rng.gen_range(0.0..TAU), terrain_rng.gen_range(0.0..TAU));

        debug!(
            "Synthetic road: {} vertices, {} legs, {:.0}m, {} captures",
            vertices.len(),
            route.legs.len(),
            route.total_distance_m(),
            captures.len()
        );

        Self {
            ctx,
            config,
            failures,
            start,
            end,
            route,
            captures,
            by_id,
            terrain_phase,
            counters: Counters::default(),
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn captures(&self) -> &[Capture] {
        &self.captures
    }

    pub fn capture(&self, panorama_id: &str) -> Option<&Capture> {
        self.by_id.get(panorama_id).map(|&i| &self.captures[i])
    }

    pub fn road_length_m(&self) -> f64 {
        self.route.total_distance_m()
    }

    pub fn stats(&self) -> ProviderStats {
        ProviderStats {
            route_requests: self.counters.route.load(Ordering::SeqCst),
            panorama_requests: self.counters.panorama.load(Ordering::SeqCst),
            image_requests: self.counters.image.load(Ordering::SeqCst),
            elevation_requests: self.counters.elevation.load(Ordering::SeqCst),
            max_in_flight: self.counters.max_in_flight.load(Ordering::SeqCst),
        }
    }

    /// Terrain height at `point` (m).
    pub fn terrain_at(&self, point: GeoPoint) -> f64 {
        let (north, east) = local_offset_m(self.start, point);
        let k = TAU / self.config.terrain_wavelength_m;
        let (phase_n, phase_e) = self.terrain_phase;
        let wave = (k * north + phase_n).sin() * (k * east + phase_e).cos();
        self.config.base_elevation_m + self.config.terrain_amplitude_m * wave
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(&self.counters.in_flight)
    }

    async fn round_trip(&self) {
        self.ctx.sleep(self.config.latency).await;
    }
}

#[async_trait]
impl RouteService for SyntheticStreetView {
    async fn resolve_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<Route, EnvError> {
        let _in_flight = self.enter();
        self.counters.route.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;

        if self.failures.route_unavailable {
            return Err(EnvError::route_not_found("ZERO_RESULTS"));
        }
        if distance_m(origin, self.start) > ENDPOINT_TOLERANCE_M
            || distance_m(destination, self.end) > ENDPOINT_TOLERANCE_M
        {
            let reason = format!("no road between {} and {}", origin, destination);
            return Err(EnvError::route_not_found(reason));
        }
        Ok(self.route.clone())
    }
}

#[async_trait]
impl PanoramaService for SyntheticStreetView {
    async fn resolve_panorama(
        &self,
        point: GeoPoint,
        search_radius_m: f64,
    ) -> Result<PanoramaLocation, EnvError> {
        let _in_flight = self.enter();
        self.counters.panorama.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;

        let nearest = self
            .captures
            .iter()
            .map(|capture| (distance_m(point, capture.location), capture))
            .min_by(|a, b| a.0.total_cmp(&b.0));

        match nearest {
            Some((distance, capture)) if distance <= search_radius_m => Ok(PanoramaLocation {
                location: capture.location,
                panorama_id: capture.panorama_id.clone(),
                heading_deg: capture.heading_deg,
                pitch_deg: capture.pitch_deg,
                copyright: "© Hyperlapse Sim".to_string(),
                capture_date: Some(capture.capture_date.clone()),
            }),
            _ => Err(EnvError::PanoramaNotFound {
                point,
                radius_m: search_radius_m,
            }),
        }
    }
}

#[async_trait]
impl ImageryService for SyntheticStreetView {
    async fn fetch_panorama_image(
        &self,
        panorama_id: &str,
        zoom: u8,
    ) -> Result<PanoramaImage, EnvError> {
        let _in_flight = self.enter();
        let request = self.counters.image.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;

        if self.failures.broken_image_request == Some(request) {
            return Err(EnvError::image_fetch(panorama_id, "tile request failed"));
        }
        let Some(&index) = self.by_id.get(panorama_id) else {
            return Err(EnvError::image_fetch(panorama_id, "unknown panorama"));
        };

        // One texel per provider tile, shaded by capture and tile index
        let (columns, rows) = tile_grid(zoom);
        let rgba: Vec<u8> = (0..columns * rows)
            .flat_map(|tile| {
                let shade = (index as u32).wrapping_mul(37).wrapping_add(tile * 11);
                [shade as u8, (shade >> 3) as u8, (tile * 29) as u8, 255]
            })
            .collect();

        Ok(PanoramaImage::new(panorama_id, columns, rows, Arc::from(rgba)))
    }
}

#[async_trait]
impl ElevationService for SyntheticStreetView {
    async fn fetch_elevations(&self, points: &[GeoPoint]) -> Result<Vec<f64>, EnvError> {
        let _in_flight = self.enter();
        self.counters.elevation.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;

        match self.failures.elevation {
            Some(ElevationFault::RateLimited) => {
                Err(EnvError::RateLimited("OVER_QUERY_LIMIT".to_string()))
            }
            Some(ElevationFault::Unavailable) => Err(EnvError::elevation("UNKNOWN_ERROR")),
            None => Ok(points.iter().map(|p| self.terrain_at(*p)).collect()),
        }
    }
}

/// North/east offset of `point` from `origin` (m), equirectangular.
fn local_offset_m(origin: GeoPoint, point: GeoPoint) -> (f64, f64) {
    let north = (point.lat - origin.lat).to_radians() * EARTH_RADIUS_M;
    let east =
        (point.lng - origin.lng).to_radians() * EARTH_RADIUS_M * origin.lat.to_radians().cos();
    (north, east)
}

/// Straight line from start to end with interior vertices pushed sideways.
fn build_road(
    rng: &mut ChaCha8Rng,
    start: GeoPoint,
    end: GeoPoint,
    config: &ProviderConfig,
) -> Vec<GeoPoint> {
    let (north, east) = local_offset_m(start, end);
    let length = north.hypot(east);
    let (side_n, side_e) = if length > 0.0 { (-east / length, north / length) } else { (0.0, 0.0) };

    let mut vertices = vec![start];
    let n = config.road_vertices;
    for i in 1..=n {
        let t = i as f64 / (n + 1) as f64;
        let lateral = if config.road_wiggle_m > 0.0 {
            rng.gen_range(-config.road_wiggle_m..config.road_wiggle_m)
        } else {
            0.0
        };
        vertices.push(offset_m(start, north * t + side_n * lateral, east * t + side_e * lateral));
    }
    vertices.push(end);
    vertices
}

/// Splits a polyline into `legs` legs sharing their joint vertices.
fn split_legs(vertices: &[GeoPoint], legs: usize) -> Route {
    let segments = vertices.len().saturating_sub(1);
    let legs = legs.clamp(1, segments.max(1));

    let bounds: Vec<usize> = (0..=legs).map(|k| k * segments / legs).collect();
    let legs = bounds
        .windows(2)
        .filter(|pair| pair[1] > pair[0])
        .map(|pair| {
            let path = vertices[pair[0]..=pair[1]].to_vec();
            let distance = path_length_m(&path);
            RouteLeg::new(path, distance)
        })
        .collect();
    Route::new(legs)
}

/// Walks the road and drops a capture every `capture_spacing_m`.
fn capture_along(
    rng: &mut ChaCha8Rng,
    vertices: &[GeoPoint],
    config: &ProviderConfig,
    gap: Option<(f64, f64)>,
) -> Vec<Capture> {
    let total = path_length_m(vertices);
    let jitter = Normal::new(0.0, config.position_jitter_m).ok();
    let pitch = Normal::new(0.0, config.pitch_noise_deg).ok();
    let heading_noise = Normal::new(0.0, 2.0).ok();

    let mut captures = Vec::new();
    let mut segment_start = 0.0;
    let mut next = 0.0;

    for pair in vertices.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let d = distance_m(a, b);
        let heading = bearing_deg(a, b);

        while d > 0.0 && next <= segment_start + d {
            let on_road = point_on_line((next - segment_start) / d, a, b);
            let fraction = next / total;
            let (dn, de) = (
                jitter.as_ref().map_or(0.0, |n| n.sample(rng)),
                jitter.as_ref().map_or(0.0, |n| n.sample(rng)),
            );
            let noise = heading_noise.as_ref().map_or(0.0, |n| n.sample(rng));
            let rig_pitch = pitch.as_ref().map_or(0.0, |n| n.sample(rng));
            let id = Builder::from_random_bytes(rng.gen()).into_uuid();
            let date = format!("20{:02}-{:02}", rng.gen_range(8..16), rng.gen_range(1..=12));

            let in_gap = gap.is_some_and(|(from, to)| fraction >= from && fraction <= to);
            if !in_gap {
                captures.push(Capture {
                    location: offset_m(on_road, dn, de),
                    panorama_id: id.to_string(),
                    heading_deg: heading + noise,
                    pitch_deg: rig_pitch,
                    along_m: next,
                    capture_date: date,
                });
            }
            next += config.capture_spacing_m;
        }
        segment_start += d;
    }
    captures
}
