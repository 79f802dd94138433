//! Camera rig: engine orientation to a look-at target on the panorama sphere.
//!
//! The panorama is an equirectangular texture wrapped on the inside of a
//! sphere of radius [`SPHERE_RADIUS`] centered on the camera. Heading maps to
//! longitude and pitch to latitude:
//!
//! ```text
//!        +Y (up)
//!         |   target = R·(sin φ cos θ, cos φ, sin φ sin θ)
//!         |  /        φ = 90° - pitch, θ = heading
//!         | /
//!         o------ +X (heading 0)
//!        /
//!      +Z
//! ```

use hyperlapse_env::PanoramaImage;
use nalgebra::{Isometry3, Perspective3, Point3, UnitQuaternion, Vector3};

/// Radius of the panorama sphere.
pub const SPHERE_RADIUS: f64 = 500.0;

/// Pitch is clamped to ±this many degrees before projection.
pub const MAX_LATITUDE_DEG: f64 = 85.0;

const NEAR_PLANE: f64 = 1.0;
const FAR_PLANE: f64 = 1100.0;

/// Where the camera looks for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPose {
    /// Heading offset from the panorama's center column (degrees)
    pub heading_deg: f64,

    /// Pitch after clamping to ±[`MAX_LATITUDE_DEG`] (degrees)
    pub pitch_deg: f64,

    /// Look-at point on the panorama sphere
    pub target: Vector3<f64>,

    /// Camera roll compensating the configured tilt (degrees)
    pub roll_deg: f64,

    /// Roll of the panorama sphere: the capture rig's stored pitch (degrees)
    pub panorama_roll_deg: f64,
}

impl CameraPose {
    /// View transform: camera at the sphere center looking at `target`, rolled.
    pub fn view(&self) -> Isometry3<f64> {
        let look = Isometry3::look_at_rh(
            &Point3::origin(),
            &Point3::from(self.target),
            &Vector3::y(),
        );
        let roll = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), self.roll_deg.to_radians());
        Isometry3::from_parts(look.translation, roll * look.rotation)
    }
}

/// Field of view, viewport and tilt of the virtual camera.
#[derive(Debug, Clone)]
pub struct CameraRig {
    fov_deg: f64,
    width: u32,
    height: u32,
    tilt_deg: f64,
}

impl CameraRig {
    pub fn new(fov_deg: f64, width: u32, height: u32) -> Self {
        Self {
            fov_deg: fov_deg.floor(),
            width,
            height,
            tilt_deg: 0.0,
        }
    }

    pub fn fov_deg(&self) -> f64 {
        self.fov_deg
    }

    /// Sets the vertical field of view; fractional degrees are dropped.
    pub fn set_fov(&mut self, fov_deg: f64) {
        self.fov_deg = fov_deg.floor();
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn tilt_deg(&self) -> f64 {
        self.tilt_deg
    }

    pub fn set_tilt(&mut self, tilt_deg: f64) {
        self.tilt_deg = tilt_deg;
    }

    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }

    /// Perspective projection for the current viewport.
    pub fn projection(&self) -> Perspective3<f64> {
        Perspective3::new(self.aspect(), self.fov_deg.to_radians(), NEAR_PLANE, FAR_PLANE)
    }

    /// Pose for a heading offset and pitch, on a panorama captured at
    /// `panorama_pitch_deg`.
    pub fn pose(&self, heading_deg: f64, pitch_deg: f64, panorama_pitch_deg: f64) -> CameraPose {
        let pitch_deg = pitch_deg.clamp(-MAX_LATITUDE_DEG, MAX_LATITUDE_DEG);
        let phi = (90.0 - pitch_deg).to_radians();
        let theta = heading_deg.to_radians();

        let target = Vector3::new(
            SPHERE_RADIUS * phi.sin() * theta.cos(),
            SPHERE_RADIUS * phi.cos(),
            SPHERE_RADIUS * phi.sin() * theta.sin(),
        );

        CameraPose {
            heading_deg,
            pitch_deg,
            target,
            roll_deg: -self.tilt_deg,
            panorama_roll_deg: panorama_pitch_deg,
        }
    }
}

/// Consumer of camera poses, typically a renderer.
pub trait RenderSink {
    /// Draws one tick. `texture` is the current frame's panorama, if loaded.
    fn render(&mut self, pose: &CameraPose, texture: Option<&PanoramaImage>);
}
