use crate::scene::{NodeId, SceneGraph};
use anchorwalk_config::{CameraConfig, SessionMode};
use glam::{Mat4, Quat, Vec3};
use serde::Serialize;

/// Camera placement for the debug snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub rotation: Quat,
}

/// Follow camera placement for the desktop scene.
pub struct Camera {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
        }
    }

    /// Rotate so the camera's -Z axis points at `target`.
    pub fn look_at(&mut self, target: Vec3) {
        let view = Mat4::look_at_rh(self.position, target, Vec3::Y);
        self.orientation = Quat::from_mat4(&view).conjugate().normalize();
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose {
            position: self.position,
            rotation: self.orientation,
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

/// Decides where the camera (or, in AR, the world) goes each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraRig {
    /// Rigid offset behind and above the character, no smoothing.
    Follow { height: f32, distance: f32 },
    /// Camera pose belongs to the tracker; only the world group moves.
    Ar,
}

impl CameraRig {
    pub fn from_config(mode: SessionMode, camera: &CameraConfig) -> Self {
        match mode {
            SessionMode::Desktop => CameraRig::Follow {
                height: camera.height,
                distance: camera.distance,
            },
            SessionMode::Ar => CameraRig::Ar,
        }
    }

    /// Place the camera for this frame. No-op in AR.
    pub fn update_camera(&self, camera: &mut Camera, target: Vec3) {
        if let CameraRig::Follow { height, distance } = *self {
            camera.position = target + Vec3::new(0.0, height, distance);
            camera.look_at(target);
        }
    }

    /// Put the world content where the anchor says. No-op for the follow rig.
    pub fn place_world(
        &self,
        scene: &mut SceneGraph,
        world: NodeId,
        position: Vec3,
        rotation: Quat,
    ) {
        if let CameraRig::Ar = self {
            scene.set_transform(world, position, rotation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_rig_offsets_and_looks_at_target() {
        let rig = CameraRig::from_config(SessionMode::Desktop, &CameraConfig::default());
        let mut camera = Camera::new();
        let target = Vec3::new(1.0, 0.0, -2.0);

        rig.update_camera(&mut camera, target);

        assert!(camera
            .position
            .abs_diff_eq(Vec3::new(1.0, 6.0, 6.0), 1e-6));
        let forward = camera.orientation * Vec3::NEG_Z;
        let to_target = (target - camera.position).normalize();
        assert!(forward.abs_diff_eq(to_target, 1e-5));
        // Level camera: no roll.
        let right = camera.orientation * Vec3::X;
        assert!(right.y.abs() < 1e-5);
    }

    #[test]
    fn ar_rig_moves_world_not_camera() {
        let rig = CameraRig::from_config(SessionMode::Ar, &CameraConfig::default());
        let mut camera = Camera::new();
        let mut scene = SceneGraph::new();
        let world = scene.add_group("world");

        rig.update_camera(&mut camera, Vec3::new(2.0, 0.0, 2.0));
        assert_eq!(camera.position, Vec3::ZERO);

        let rotation = Quat::from_rotation_x(0.3);
        rig.place_world(&mut scene, world, Vec3::new(0.0, 0.0, -1.0), rotation);
        assert_eq!(scene.node(world).position, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(scene.node(world).rotation, rotation);
    }

    #[test]
    fn follow_rig_leaves_world_group_alone() {
        let rig = CameraRig::Follow {
            height: 6.0,
            distance: 8.0,
        };
        let mut scene = SceneGraph::new();
        let world = scene.add_group("world");
        rig.place_world(&mut scene, world, Vec3::ONE, Quat::from_rotation_y(1.0));
        assert_eq!(scene.node(world).position, Vec3::ZERO);
    }
}
