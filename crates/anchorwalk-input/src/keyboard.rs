use crate::InputVector;
use std::collections::HashSet;
use winit::event::ElementState;
use winit::keyboard::KeyCode;

/// Held movement keys. WASD and the arrow keys are interchangeable.
#[derive(Debug, Default)]
pub struct KeyboardState {
    held: HashSet<KeyCode>,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_key(&mut self, key: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                self.held.insert(key);
            }
            ElementState::Released => {
                self.held.remove(&key);
            }
        }
    }

    /// Drop all held keys, e.g. when the window loses focus.
    pub fn clear(&mut self) {
        self.held.clear();
    }

    fn any(&self, keys: [KeyCode; 2]) -> bool {
        keys.iter().any(|k| self.held.contains(k))
    }

    /// Union of the held keys. Opposite directions cancel.
    pub fn vector(&self) -> InputVector {
        let mut x = 0.0;
        let mut y = 0.0;
        if self.any([KeyCode::KeyW, KeyCode::ArrowUp]) {
            y -= 1.0;
        }
        if self.any([KeyCode::KeyS, KeyCode::ArrowDown]) {
            y += 1.0;
        }
        if self.any([KeyCode::KeyA, KeyCode::ArrowLeft]) {
            x -= 1.0;
        }
        if self.any([KeyCode::KeyD, KeyCode::ArrowRight]) {
            x += 1.0;
        }
        InputVector { x, y }
    }
}
