pub mod joystick;
pub mod keyboard;

use joystick::Joystick;
use keyboard::KeyboardState;
use serde::Serialize;

/// Planar movement intent for one frame. `x` maps to world X, `y` to world Z.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct InputVector {
    pub x: f32,
    pub y: f32,
}

impl InputVector {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Build a vector with each axis clamped to [-1, 1].
    pub fn clamped(x: f32, y: f32) -> Self {
        Self {
            x: x.clamp(-1.0, 1.0),
            y: y.clamp(-1.0, 1.0),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// The one input device driving movement, fixed at session start.
pub enum InputSource {
    Keyboard(KeyboardState),
    Joystick(Joystick),
}

impl InputSource {
    pub fn vector(&self) -> InputVector {
        match self {
            InputSource::Keyboard(keys) => keys.vector(),
            InputSource::Joystick(stick) => stick.vector(),
        }
    }

    pub fn keyboard_mut(&mut self) -> Option<&mut KeyboardState> {
        match self {
            InputSource::Keyboard(keys) => Some(keys),
            InputSource::Joystick(_) => None,
        }
    }

    pub fn joystick_mut(&mut self) -> Option<&mut Joystick> {
        match self {
            InputSource::Joystick(stick) => Some(stick),
            InputSource::Keyboard(_) => None,
        }
    }
}
