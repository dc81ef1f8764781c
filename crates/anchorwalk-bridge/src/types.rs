use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Device orientation in degrees, as reported by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    /// Compass heading around the vertical axis.
    pub alpha: f32,
    /// Front-back tilt.
    pub beta: f32,
    /// Left-right tilt.
    pub gamma: f32,
    /// Whether sensor events are subscribed and flowing.
    pub available: bool,
}

impl Orientation {
    /// Angles in radians mapped onto scene axes: x = beta, y = alpha, z = gamma.
    pub fn scene_radians(&self) -> Vec3 {
        Vec3::new(
            self.beta.to_radians(),
            self.alpha.to_radians(),
            self.gamma.to_radians(),
        )
    }
}

/// Acceleration including gravity (m/s^2). Display only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccelerationSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// What the device bridge reported it can do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub orientation: bool,
    pub motion: bool,
    /// Sensor access sits behind an explicit permission prompt.
    pub permission_api: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PermissionState {
    #[default]
    Unknown,
    Granted,
    Denied,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrackerStatus {
    #[default]
    Idle,
    Starting,
    Started,
    Failed(String),
}

/// A rigid pose as reported by the bridge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    /// False for degenerate input, e.g. a zero quaternion normalized to NaN.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite()
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Raw optical tracker callbacks, one variant family per backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackerSignal {
    TargetFound,
    TargetLost,
    TargetPose(Pose),
    MarkerFound,
    MarkerLost,
    /// Column-major camera transform of the marker.
    MarkerMatrix(Mat4),
}

/// Touch drag on the on-screen joystick, in pixels from the base centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JoystickSignal {
    Start,
    Move { dx: f32, dy: f32 },
    End,
}

/// User pressed a retry affordance on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryRequest {
    Tracker,
    Sensors,
}
