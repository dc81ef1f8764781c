use anchorwalk_config::{CharacterConfig, WorldConfig};
use anchorwalk_input::InputVector;
use serde::Serialize;
use std::f32::consts::FRAC_1_SQRT_2;

/// Character position on the ground plane (y is always 0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CharacterPosition {
    pub x: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Character {
    pub position: CharacterPosition,
    /// Yaw in radians; sticky when input stops.
    pub facing: f32,
}

/// Fixed-speed-per-frame planar movement, clamped to the world square.
#[derive(Debug, Clone, Copy)]
pub struct MovementController {
    speed: f32,
    half_size: f32,
}

impl MovementController {
    pub fn new(speed: f32, half_size: f32) -> Self {
        // `clamp` needs a non-empty range.
        Self {
            speed,
            half_size: half_size.max(0.0),
        }
    }

    pub fn from_config(character: &CharacterConfig, world: &WorldConfig) -> Self {
        Self::new(character.speed, world.half_size(character.size))
    }

    pub fn half_size(&self) -> f32 {
        self.half_size
    }

    /// Advance one frame. Not scaled by elapsed time.
    pub fn step(&self, character: &mut Character, input: InputVector) -> CharacterPosition {
        let mut move_x = input.x;
        let mut move_z = input.y;

        // Diagonals move no faster than a single axis.
        if move_x != 0.0 && move_z != 0.0 {
            move_x *= FRAC_1_SQRT_2;
            move_z *= FRAC_1_SQRT_2;
        }

        let new_x = character.position.x + move_x * self.speed;
        let new_z = character.position.z + move_z * self.speed;
        character.position = CharacterPosition {
            x: new_x.clamp(-self.half_size, self.half_size),
            z: new_z.clamp(-self.half_size, self.half_size),
        };

        if move_x != 0.0 || move_z != 0.0 {
            character.facing = move_x.atan2(move_z);
        }

        character.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> MovementController {
        MovementController::from_config(&CharacterConfig::default(), &WorldConfig::default())
    }

    #[test]
    fn diagonal_speed_matches_axis_speed() {
        let movement = controller();

        let mut straight = Character::default();
        movement.step(&mut straight, InputVector { x: 1.0, y: 0.0 });
        let mut diagonal = Character::default();
        movement.step(&mut diagonal, InputVector { x: 1.0, y: 1.0 });

        let straight_len = straight.position.x.hypot(straight.position.z);
        let diagonal_len = diagonal.position.x.hypot(diagonal.position.z);
        assert!((straight_len - 0.05).abs() < 1e-6);
        assert!((diagonal_len - straight_len).abs() < 1e-6);
    }

    #[test]
    fn clamps_at_world_edge() {
        let movement = controller();
        let mut character = Character::default();
        for _ in 0..1000 {
            movement.step(&mut character, InputVector { x: -1.0, y: 1.0 });
        }
        assert!((character.position.x + 2.2).abs() < 1e-5);
        assert!((character.position.z - 2.2).abs() < 1e-5);
    }

    #[test]
    fn world_smaller_than_character_pins_to_centre() {
        let world = WorldConfig { size: 0.5 };
        let movement = MovementController::from_config(&CharacterConfig::default(), &world);
        assert_eq!(movement.half_size(), 0.0);

        let mut character = Character::default();
        movement.step(&mut character, InputVector { x: 1.0, y: 0.0 });
        assert_eq!(character.position, CharacterPosition::default());

        let movement = MovementController::new(0.05, f32::NAN);
        movement.step(&mut character, InputVector { x: 0.0, y: -1.0 });
        assert_eq!(character.position, CharacterPosition::default());
    }

    #[test]
    fn facing_follows_movement_and_sticks() {
        let movement = controller();
        let mut character = Character::default();

        movement.step(&mut character, InputVector { x: 1.0, y: 0.0 });
        assert!((character.facing - std::f32::consts::FRAC_PI_2).abs() < 1e-6);

        movement.step(&mut character, InputVector { x: 0.0, y: -1.0 });
        assert!((character.facing - std::f32::consts::PI).abs() < 1e-6);

        let before = character;
        movement.step(&mut character, InputVector::ZERO);
        assert_eq!(character, before);
    }
}
