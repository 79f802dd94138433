//! JSON exporter for playback traces.
//!
//! Exports the generated sequence and the rendered camera poses as JSON so a
//! run can be inspected or replayed offline.

use crate::error::SimError;
use hyperlapse_core::{CameraPose, HyperlapsePoint};
use hyperlapse_env::PanoramaImage;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// A single rendered frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Virtual time in seconds
    pub time_sec: f64,

    /// Texture bound when the frame was rendered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panorama_id: Option<String>,

    pub heading_deg: f64,
    pub pitch_deg: f64,

    /// Camera look-at target on the panorama sphere
    pub target: CameraTarget,

    pub roll_deg: f64,
    pub panorama_roll_deg: f64,
}

impl SimFrame {
    pub fn from_pose(time_sec: f64, pose: &CameraPose, texture: Option<&PanoramaImage>) -> Self {
        Self {
            time_sec,
            panorama_id: texture.map(|image| image.panorama_id.clone()),
            heading_deg: pose.heading_deg,
            pitch_deg: pose.pitch_deg,
            target: CameraTarget::new(pose.target),
            roll_deg: pose.roll_deg,
            panorama_roll_deg: pose.panorama_roll_deg,
        }
    }
}

/// Camera target in scene coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CameraTarget {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl CameraTarget {
    pub fn new(v: Vector3<f64>) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }
}

/// One point of the generated sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceEntry {
    pub index: usize,
    pub panorama_id: String,
    pub lat: f64,
    pub lng: f64,
    pub heading_deg: f64,
    pub pitch_deg: f64,
    pub elevation_m: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_date: Option<String>,
}

impl SequenceEntry {
    pub fn new(index: usize, point: &HyperlapsePoint) -> Self {
        Self {
            index,
            panorama_id: point.panorama_id.clone(),
            lat: point.location.lat,
            lng: point.location.lng,
            heading_deg: point.heading_deg,
            pitch_deg: point.pitch_deg,
            elevation_m: point.elevation_m,
            capture_date: point.capture_date.clone(),
        }
    }
}

/// Simulation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Time of the last exported frame, in seconds
    pub duration_sec: f64,

    /// The sequence that was played
    pub sequence: Vec<SequenceEntry>,

    /// Sampled frames
    pub frames: Vec<SimFrame>,

    /// Errors reported during the run
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            sequence: Vec::new(),
            frames: Vec::new(),
            events: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Records the sequence.
    pub fn set_sequence<'a>(&mut self, points: impl IntoIterator<Item = &'a HyperlapsePoint>) {
        self.sequence = points
            .into_iter()
            .enumerate()
            .map(|(index, point)| SequenceEntry::new(index, point))
            .collect();
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Adds an error-level event.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.events.push(SimEvent {
            message: message.into(),
            level: Some("error".to_string()),
        });
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> Result<(), SimError> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperlapse_core::CameraRig;
    use hyperlapse_env::GeoPoint;

    fn point(id: &str) -> HyperlapsePoint {
        HyperlapsePoint {
            location: GeoPoint::new(47.0, 8.0),
            panorama_id: id.to_string(),
            heading_deg: 90.0,
            pitch_deg: 1.0,
            elevation_m: 410.0,
            image: None,
            copyright: String::new(),
            capture_date: Some("2014-05".to_string()),
        }
    }

    #[test]
    fn test_frames_track_duration() {
        let rig = CameraRig::new(70.0, 800, 400);
        let pose = rig.pose(90.0, 10.0, 0.0);
        let mut export = SimExport::new("cruise", 42);

        export.add_frame(SimFrame::from_pose(0.016, &pose, None));
        export.add_frame(SimFrame::from_pose(0.032, &pose, None));

        assert_eq!(export.frames.len(), 2);
        assert_eq!(export.duration_sec, 0.032);
        assert_eq!(export.frames[0].target.x, pose.target.x);
    }

    #[test]
    fn test_json_shape() {
        let mut export = SimExport::new("coverage_gap", 7);
        export.set_sequence(&[point("a"), point("b")]);
        export.add_error("No panorama found");
        export.finalize(false, Some("too short".to_string()));

        let value: serde_json::Value = serde_json::from_str(&export.to_json().unwrap()).unwrap();

        assert_eq!(value["scenario"], "coverage_gap");
        assert_eq!(value["sequence"][1]["index"], 1);
        assert_eq!(value["sequence"][1]["panorama_id"], "b");
        assert_eq!(value["events"][0]["level"], "error");
        assert_eq!(value["failure_reason"], "too short");
        assert!(value["frames"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_write_to_file() {
        let name = format!("hyperlapse-export-{}.json", std::process::id());
        let path = std::env::temp_dir().join(name);
        let path = path.to_str().unwrap().to_string();

        let mut export = SimExport::new("cruise", 1);
        export.finalize(true, None);
        export.write_to_file(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(written.contains("\"passed\": true"));
        assert!(!written.contains("failure_reason"));
    }
}
