use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Desktop (keyboard, follow camera) or AR (joystick, bridge-driven anchor).
    pub mode: SessionMode,
    pub character: CharacterConfig,
    pub camera: CameraConfig,
    pub world: WorldConfig,
    /// Dead-reckoning fallback tuning.
    pub sensors: SensorConfig,
    /// Optical tracker backend selection.
    pub tracker: TrackerConfig,
    /// Device bridge connection.
    pub bridge: BridgeConfig,
    pub debug: DebugConfig,
}

/// Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    #[default]
    Desktop,
    Ar,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterConfig {
    /// World units moved per frame at full input.
    pub speed: f32,
    /// Character radius, used to keep the body inside the world edge.
    pub size: f32,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            speed: 0.05,
            size: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Distance behind the character (+Z).
    pub distance: f32,
    /// Height above the character.
    pub height: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            distance: 8.0,
            height: 6.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Edge length of the square play area.
    pub size: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self { size: 5.0 }
    }
}

impl WorldConfig {
    /// Largest coordinate the character centre may reach on either axis.
    ///
    /// Never negative: a character larger than the world is pinned to the centre.
    pub fn half_size(&self, character_size: f32) -> f32 {
        (self.size / 2.0 - character_size).max(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Scale applied to orientation angles (radians) during dead reckoning.
    pub damping: f32,
    pub fallback: FallbackPolicy,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            damping: 0.1,
            fallback: FallbackPolicy::default(),
        }
    }
}

/// How the dead-reckoning rotation offset is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Offset measured from the last tracked rotation. Bounded.
    #[default]
    ReferenceRelative,
    /// Offset re-added to the previous frame's rotation every frame. Drifts.
    Accumulate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub backend: TrackerBackend,
    /// Multiplier applied to image-target positions (tracker reports ~mm).
    pub pose_scale: f32,
    /// World anchor pose before the tracker has ever found the target.
    #[serde(with = "vec3_serde")]
    pub initial_position: Vec3,
    #[serde(with = "quat_serde")]
    pub initial_rotation: Quat,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            backend: TrackerBackend::default(),
            pose_scale: 0.001,
            initial_position: Vec3::ZERO,
            initial_rotation: Quat::IDENTITY,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerBackend {
    /// Natural-image target with found/lost callbacks and a position+quaternion pose.
    #[default]
    ImageTarget,
    /// Fiducial marker reporting a camera transform matrix.
    Marker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// TCP address of the device bridge.
    pub addr: String,
    /// AR frame loop rate.
    pub frame_rate_hz: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:47800".to_string(),
            frame_rate_hz: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Send a debug snapshot to the bridge every N frames (0 disables).
    pub interval_frames: u64,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            interval_frames: 10,
        }
    }
}

// Serde helpers for glam types so TOML stores them as plain arrays.

mod vec3_serde {
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Vec3, s: S) -> Result<S::Ok, S::Error> {
        [v.x, v.y, v.z].serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec3, D::Error> {
        let [x, y, z] = <[f32; 3]>::deserialize(d)?;
        Ok(Vec3::new(x, y, z))
    }
}

mod quat_serde {
    use glam::Quat;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(q: &Quat, s: S) -> Result<S::Ok, S::Error> {
        [q.x, q.y, q.z, q.w].serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Quat, D::Error> {
        let [x, y, z, w] = <[f32; 4]>::deserialize(d)?;
        Ok(Quat::from_xyzw(x, y, z, w).normalize())
    }
}
