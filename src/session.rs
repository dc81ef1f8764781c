use anchorwalk_anchor::{AnchorStateMachine, AnchorStatus, OpticalAnchor};
use anchorwalk_bridge::types::{AccelerationSample, JoystickSignal, Orientation, Pose};
use anchorwalk_config::{AppConfig, SessionMode};
use anchorwalk_input::joystick::Joystick;
use anchorwalk_input::keyboard::KeyboardState;
use anchorwalk_input::InputSource;
use anchorwalk_world::{
    Camera, CameraPose, CameraRig, Character, CharacterPosition, MovementController, NodeId,
    SceneGraph,
};
use glam::{Quat, Vec2, Vec3};
use serde::Serialize;

/// Platform readings sampled at the start of a frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameInputs {
    pub orientation: Orientation,
    pub acceleration: AccelerationSample,
    /// AR camera pose reported by the external renderer.
    pub camera_pose: Option<Pose>,
}

/// Read-only view of a frame for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct DebugSnapshot {
    pub frame: u64,
    /// `None` outside AR.
    pub status: Option<AnchorStatus>,
    pub orientation: Orientation,
    pub acceleration: AccelerationSample,
    pub camera: Option<CameraPose>,
    pub character: CharacterPosition,
    pub facing: f32,
}

struct AnchorRuntime {
    machine: AnchorStateMachine,
    optical: Box<dyn OpticalAnchor>,
}

/// Everything a frame touches, passed explicitly instead of living in globals.
pub struct Session {
    mode: SessionMode,
    scene: SceneGraph,
    world_node: NodeId,
    character_node: NodeId,
    character: Character,
    movement: MovementController,
    input: InputSource,
    rig: CameraRig,
    camera: Camera,
    anchor: Option<AnchorRuntime>,
    frame: u64,
}

impl Session {
    /// Keyboard-driven session with a follow camera.
    pub fn desktop(config: &AppConfig) -> Self {
        Self::build(
            config,
            SessionMode::Desktop,
            InputSource::Keyboard(KeyboardState::new()),
            None,
        )
    }

    /// Joystick-driven session whose world group follows the optical anchor.
    pub fn ar(config: &AppConfig, optical: Box<dyn OpticalAnchor>) -> Self {
        let machine = AnchorStateMachine::from_config(&config.tracker, &config.sensors);
        Self::build(
            config,
            SessionMode::Ar,
            InputSource::Joystick(Joystick::default()),
            Some(AnchorRuntime { machine, optical }),
        )
    }

    fn build(
        config: &AppConfig,
        mode: SessionMode,
        input: InputSource,
        anchor: Option<AnchorRuntime>,
    ) -> Self {
        let mut scene = SceneGraph::new();
        let world_node = scene.add_group("world");
        let character_node = scene.add_to_group(world_node, "character");

        if let Some(runtime) = &anchor {
            let initial = runtime.machine.transform();
            scene.set_transform(world_node, initial.position, initial.rotation);
        }

        let rig = CameraRig::from_config(mode, &config.camera);
        let mut camera = Camera::new();
        rig.update_camera(&mut camera, Vec3::ZERO);

        tracing::info!(
            ?mode,
            half_size = MovementController::from_config(&config.character, &config.world).half_size(),
            "Session created"
        );

        Self {
            mode,
            scene,
            world_node,
            character_node,
            character: Character::default(),
            movement: MovementController::from_config(&config.character, &config.world),
            input,
            rig,
            camera,
            anchor,
            frame: 0,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn input_mut(&mut self) -> &mut InputSource {
        &mut self.input
    }

    /// Apply a joystick drag signal. Ignored when the keyboard drives movement.
    pub fn on_joystick(&mut self, signal: JoystickSignal) {
        let Some(stick) = self.input.joystick_mut() else {
            return;
        };
        match signal {
            JoystickSignal::Start => stick.on_start(),
            JoystickSignal::Move { dx, dy } => stick.on_move(dx, dy),
            JoystickSignal::End => stick.on_end(),
        }
    }

    /// Run one frame.
    pub fn tick(&mut self, inputs: &FrameInputs) -> DebugSnapshot {
        let input = self.input.vector();
        let position = self.movement.step(&mut self.character, input);
        self.scene.set_transform(
            self.character_node,
            Vec3::new(position.x, 0.0, position.z),
            Quat::from_rotation_y(self.character.facing),
        );

        let status = match &mut self.anchor {
            Some(runtime) => {
                let transform = runtime
                    .machine
                    .update(runtime.optical.as_mut(), &inputs.orientation);
                self.rig.place_world(
                    &mut self.scene,
                    self.world_node,
                    transform.position,
                    transform.rotation,
                );
                Some(runtime.machine.status())
            }
            None => None,
        };

        let target = self.scene.world_position(self.character_node);
        self.rig.update_camera(&mut self.camera, target);

        let camera = match self.rig {
            CameraRig::Follow { .. } => Some(self.camera.pose()),
            CameraRig::Ar => inputs.camera_pose.map(|pose| CameraPose {
                position: pose.position,
                rotation: pose.rotation,
            }),
        };

        self.frame += 1;
        if self.frame % 300 == 0 {
            tracing::debug!(frames = self.frame, ?status, "Frame heartbeat");
        }

        DebugSnapshot {
            frame: self.frame,
            status,
            orientation: inputs.orientation,
            acceleration: inputs.acceleration,
            camera,
            character: position,
            facing: self.character.facing,
        }
    }

    /// World group transform (the anchor in AR, identity on desktop).
    pub fn world_transform(&self) -> (Vec3, Quat) {
        let node = self.scene.node(self.world_node);
        (node.position, node.rotation)
    }

    pub fn character(&self) -> Character {
        self.character
    }

    /// Joystick knob display offset; `None` when the keyboard drives movement.
    pub fn knob_offset(&self) -> Option<Vec2> {
        match &self.input {
            InputSource::Joystick(stick) => Some(stick.knob_offset()),
            InputSource::Keyboard(_) => None,
        }
    }
}
