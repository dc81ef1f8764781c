pub mod camera;
pub mod movement;
pub mod scene;

pub use camera::{Camera, CameraPose, CameraRig};
pub use movement::{Character, CharacterPosition, MovementController};
pub use scene::{NodeId, SceneGraph, SceneNode};
