//! Ping-pong playback.
//!
//! The engine owns the frame pointer and the camera orientation. It is driven
//! from outside: [`PlaybackEngine::tick`] is called once per rendered frame
//! with the elapsed wall time, and advances the pointer whenever a full frame
//! interval has accumulated.
//!
//! ```text
//!   forward:   0 → 1 → … → len-1 ┐
//!                                 flip (no move)
//!   backward:  0 ← 1 ← … ← len-1 ┘
//!              └ flip (no move), forward again
//! ```

use crate::camera::{CameraPose, CameraRig};
use crate::config::HyperlapseConfig;
use crate::events::{EventChannel, FrameEvent, PlaybackEvent};
use crate::geometry::{bearing_deg, distance_m};
use crate::sequence::{HyperlapsePoint, Sequence, UNKNOWN_ELEVATION};
use hyperlapse_env::GeoPoint;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// Frame pointer and run flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaybackState {
    /// Always within `[0, len - 1]` for a non-empty sequence
    pub current_index: usize,

    pub direction: Direction,
    pub is_playing: bool,

    /// Mirrors the image load pipeline
    pub is_loading: bool,

    /// Mirrors the pending cancel request of a running pass
    pub cancel_requested: bool,
}

/// Camera orientation computed for the current frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Orientation {
    /// Stored heading of the current panorama (degrees)
    pub origin_heading_deg: f64,

    /// Stored pitch of the current panorama (degrees)
    pub origin_pitch_deg: f64,

    /// Bearing from the current point to the look-at target (degrees)
    pub lookat_heading_deg: Option<f64>,

    /// Camera pitch before clamping (degrees)
    pub pitch_deg: f64,
}

/// Frame-index state machine plus per-frame camera orientation.
#[derive(Debug, Clone)]
pub struct PlaybackEngine {
    state: PlaybackState,
    len: usize,

    frame_interval: Duration,
    accumulator: Duration,

    /// Set once the first sequence finished loading
    animating: bool,

    lookat: Option<GeoPoint>,
    lookat_enabled: bool,
    lookat_elevation_m: f64,

    use_elevation: bool,
    elevation_offset_m: f64,
    manual_pitch_deg: f64,

    orientation: Orientation,
    rig: CameraRig,
}

impl PlaybackEngine {
    pub fn new(config: &HyperlapseConfig) -> Self {
        let mut rig = CameraRig::new(config.fov_deg, config.width, config.height);
        rig.set_tilt(config.tilt_deg);

        Self {
            state: PlaybackState::default(),
            len: 0,
            frame_interval: config.frame_interval(),
            accumulator: Duration::ZERO,
            animating: false,
            lookat: config.lookat,
            lookat_enabled: config.use_lookat,
            lookat_elevation_m: UNKNOWN_ELEVATION,
            use_elevation: config.use_elevation,
            elevation_offset_m: config.elevation_offset_m,
            manual_pitch_deg: 0.0,
            orientation: Orientation::default(),
            rig,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn current_index(&self) -> usize {
        self.state.current_index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    pub fn orientation(&self) -> &Orientation {
        &self.orientation
    }

    pub fn rig(&self) -> &CameraRig {
        &self.rig
    }

    pub fn rig_mut(&mut self) -> &mut CameraRig {
        &mut self.rig
    }

    pub fn lookat(&self) -> Option<GeoPoint> {
        self.lookat
    }

    /// Back to frame 0, forward, stopped, for a sequence of `len` frames.
    pub fn reset(&mut self, len: usize) {
        self.state.current_index = 0;
        self.state.direction = Direction::Forward;
        self.state.is_playing = false;
        self.len = len;
        self.accumulator = Duration::ZERO;
        self.orientation = Orientation {
            pitch_deg: self.manual_pitch_deg,
            ..Orientation::default()
        };
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.state.is_loading = loading;
    }

    /// Starts ticking once a sequence is fully loaded; draws the first frame.
    pub fn start_animation(
        &mut self,
        sequence: &Sequence,
        events: &mut EventChannel<PlaybackEvent>,
    ) {
        self.len = sequence.len();
        self.state.current_index = 0;
        self.accumulator = Duration::ZERO;
        self.animating = !sequence.is_empty();
        self.draw_frame(sequence, events);
    }

    /// Stops ticking until the next sequence is loaded.
    pub fn stop_animation(&mut self) {
        self.animating = false;
    }

    /// Starts playback. Returns false while a load is running.
    pub fn play(&mut self, events: &mut EventChannel<PlaybackEvent>) -> bool {
        if self.state.is_loading {
            return false;
        }
        if !self.state.is_playing {
            self.state.is_playing = true;
            events.emit(&PlaybackEvent::Play);
        }
        true
    }

    pub fn pause(&mut self, events: &mut EventChannel<PlaybackEvent>) {
        if self.state.is_playing {
            self.state.is_playing = false;
            events.emit(&PlaybackEvent::Pause);
        }
    }

    /// Pauses and steps one frame forward. Returns false at the last frame.
    pub fn next(&mut self, sequence: &Sequence, events: &mut EventChannel<PlaybackEvent>) -> bool {
        self.pause(events);
        if self.state.current_index + 1 >= self.len {
            return false;
        }
        self.state.current_index += 1;
        self.draw_frame(sequence, events);
        true
    }

    /// Pauses and steps one frame back. Returns false at frame 0.
    pub fn prev(&mut self, sequence: &Sequence, events: &mut EventChannel<PlaybackEvent>) -> bool {
        self.pause(events);
        if self.state.current_index == 0 || self.len == 0 {
            return false;
        }
        self.state.current_index -= 1;
        self.draw_frame(sequence, events);
        true
    }

    /// Feeds elapsed time; returns the pose to render, or `None` before the
    /// first sequence has loaded.
    pub fn tick(
        &mut self,
        elapsed: Duration,
        sequence: &Sequence,
        events: &mut EventChannel<PlaybackEvent>,
    ) -> Option<CameraPose> {
        if !self.animating {
            return None;
        }

        self.accumulator += elapsed;
        if self.accumulator >= self.frame_interval {
            if self.state.is_playing {
                self.loop_step(sequence, events);
            }
            self.accumulator = Duration::ZERO;
        }

        Some(self.pose())
    }

    /// Draws the current frame, then moves the pointer one ping-pong step.
    pub fn loop_step(&mut self, sequence: &Sequence, events: &mut EventChannel<PlaybackEvent>) {
        if self.len == 0 {
            return;
        }
        self.draw_frame(sequence, events);

        let index = self.state.current_index;
        match self.state.direction {
            Direction::Forward if index + 1 >= self.len => {
                self.state.direction = Direction::Backward
            }
            Direction::Forward => self.state.current_index += 1,
            Direction::Backward if index == 0 => self.state.direction = Direction::Forward,
            Direction::Backward => self.state.current_index -= 1,
        }
    }

    /// Camera pose for the current orientation.
    pub fn pose(&self) -> CameraPose {
        self.rig
            .pose(
                self.heading_offset_deg(),
                self.orientation.pitch_deg,
                self.orientation.origin_pitch_deg,
            )
    }

    /// Heading relative to the panorama's center column; zero unless look-at
    /// is enabled and a target is set.
    pub fn heading_offset_deg(&self) -> f64 {
        match self.orientation.lookat_heading_deg {
            Some(lookat_heading) if self.lookat_enabled => {
                lookat_heading - self.orientation.origin_heading_deg
            }
            _ => 0.0,
        }
    }

    /// Recomputes the orientation for the current frame and emits it.
    pub fn draw_frame(&mut self, sequence: &Sequence, events: &mut EventChannel<PlaybackEvent>) {
        let index = self.state.current_index;
        let Some(point) = sequence.get(index) else {
            return;
        };

        self.orientation.origin_heading_deg = point.heading_deg;
        self.orientation.origin_pitch_deg = point.pitch_deg;
        self.orientation.lookat_heading_deg =
            self.lookat.map(|target| bearing_deg(point.location, target));
        self.orientation.pitch_deg =
            self.corrected_pitch_deg(point).unwrap_or(self.manual_pitch_deg);

        events.emit(&PlaybackEvent::Frame(FrameEvent {
            position: index,
            heading_deg: point.heading_deg,
            pitch_deg: point.pitch_deg,
            point: point.location,
        }));
    }

    /// Pitch that keeps the look-at target centered despite the elevation
    /// difference, when both elevations are known.
    fn corrected_pitch_deg(&self, point: &HyperlapsePoint) -> Option<f64> {
        if !self.use_elevation
            || !point.has_elevation()
            || self.lookat_elevation_m == UNKNOWN_ELEVATION
        {
            return None;
        }
        let target = self.lookat?;

        let elevation = point.elevation_m - self.elevation_offset_m;
        let difference = self.lookat_elevation_m - elevation;
        let horizontal = distance_m(point.location, target);
        let angle = difference.abs().atan2(horizontal).to_degrees();

        Some(if difference < 0.0 { -angle } else { angle })
    }

    pub fn set_lookat(&mut self, target: Option<GeoPoint>) {
        self.lookat = target;
        self.lookat_elevation_m = UNKNOWN_ELEVATION;
    }

    pub fn set_lookat_elevation(&mut self, elevation_m: f64) {
        self.lookat_elevation_m = elevation_m;
    }

    pub fn lookat_elevation_m(&self) -> f64 {
        self.lookat_elevation_m
    }

    pub fn enable_lookat(&mut self) {
        self.lookat_enabled = true;
    }

    pub fn disable_lookat(&mut self) {
        self.lookat_enabled = false;
    }

    pub fn is_lookat_enabled(&self) -> bool {
        self.lookat_enabled
    }

    /// Manual pitch, used whenever no elevation correction applies.
    pub fn set_pitch(&mut self, pitch_deg: f64) {
        self.manual_pitch_deg = pitch_deg;
        self.orientation.pitch_deg = pitch_deg;
    }

    pub fn set_elevation_offset(&mut self, offset_m: f64) {
        self.elevation_offset_m = offset_m;
    }

    /// Turns elevation pitch correction off for the rest of the session.
    pub fn disable_elevation(&mut self) {
        if self.use_elevation {
            debug!("Elevation pitch correction off");
        }
        self.use_elevation = false;
        self.lookat_elevation_m = UNKNOWN_ELEVATION;
    }

    pub fn uses_elevation(&self) -> bool {
        self.use_elevation
    }
}
