use crate::InputVector;
use glam::Vec2;

/// Drag radius of the on-screen joystick, in pixels.
pub const DEFAULT_MAX_DISTANCE: f32 = 35.0;

/// On-screen joystick driven by touch (or mouse) drags.
///
/// Drag offsets are measured from the base centre in screen pixels, so +y is
/// toward the bottom of the screen (world +Z).
#[derive(Debug)]
pub struct Joystick {
    max_distance: f32,
    active: bool,
    vector: InputVector,
    knob: Vec2,
}

impl Joystick {
    pub fn new(max_distance: f32) -> Self {
        Self {
            max_distance,
            active: false,
            vector: InputVector::ZERO,
            knob: Vec2::ZERO,
        }
    }

    pub fn on_start(&mut self) {
        self.active = true;
    }

    pub fn on_move(&mut self, dx: f32, dy: f32) {
        if !self.active {
            return;
        }

        let delta = Vec2::new(dx, dy);
        // Knob stays within the base circle.
        self.knob = delta.clamp_length_max(self.max_distance);
        self.vector = InputVector::clamped(dx / self.max_distance, dy / self.max_distance);
    }

    pub fn on_end(&mut self) {
        self.active = false;
        self.knob = Vec2::ZERO;
        self.vector = InputVector::ZERO;
    }

    pub fn vector(&self) -> InputVector {
        self.vector
    }

    /// Knob display offset in pixels.
    pub fn knob_offset(&self) -> Vec2 {
        self.knob
    }
}

impl Default for Joystick {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DISTANCE)
    }
}
