// Character motion - a lightweight velocity integrator
//
// Velocity components are in character space: x lateral, y vertical,
// z forward. Integration projects them onto the character's world-space
// axes using its rotation.

use super::model::Transform;
use crate::core::math::approx_equal;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Velocities closer to zero than this snap to rest
const REST_EPSILON: f32 = 1e-4;

/// Motion constants for a character
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Velocity gained per second of full input, per axis
    pub acceleration: Vec3,
    /// Per-axis drag, applied as `velocity * deceleration` per second
    pub deceleration: Vec3,
}

/// Default motion constants for a walking character
pub const BASE_PHYSICS: PhysicsConfig = PhysicsConfig {
    acceleration: Vec3::new(1.0, 0.25, 50.0),
    deceleration: Vec3::new(-0.0005, -0.0001, -5.0),
};

impl Default for PhysicsConfig {
    fn default() -> Self {
        BASE_PHYSICS
    }
}

/// Per-character motion state, mutated once per frame by the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsState {
    pub velocity: Vec3,
    pub acceleration: Vec3,
    pub deceleration: Vec3,
}

impl PhysicsState {
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            velocity: Vec3::ZERO,
            acceleration: config.acceleration,
            deceleration: config.deceleration,
        }
    }

    /// Add velocity along the given character-space axes.
    ///
    /// `input` is typically in `[-1, 1]` per axis.
    pub fn accelerate(&mut self, input: Vec3, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.velocity += input * self.acceleration * dt;
    }

    /// Apply drag without letting the forward axis reverse direction
    pub fn decelerate(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        let mut drag = self.velocity * self.deceleration * dt;
        drag.z = drag.z.signum() * drag.z.abs().min(self.velocity.z.abs());
        self.velocity += drag;

        for axis in 0..3 {
            if approx_equal(self.velocity[axis], 0.0, REST_EPSILON) {
                self.velocity[axis] = 0.0;
            }
        }
    }

    /// Decelerate, then move `transform` by the velocity in world space
    pub fn integrate(&mut self, transform: &mut Transform, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        self.decelerate(dt);

        let (forward, lateral) = world_axes(transform.rotation);
        transform.position += forward * self.velocity.z * dt;
        transform.position += lateral * self.velocity.x * dt;
        transform.position.y += self.velocity.y * dt;
    }

    pub fn is_at_rest(&self) -> bool {
        self.velocity == Vec3::ZERO
    }

    pub fn stop(&mut self) {
        self.velocity = Vec3::ZERO;
    }
}

impl Default for PhysicsState {
    fn default() -> Self {
        Self::new(BASE_PHYSICS)
    }
}

/// Forward (+Z) and lateral (+X) unit vectors for a rotation
fn world_axes(rotation: Quat) -> (Vec3, Vec3) {
    let forward = (rotation * Vec3::Z).normalize_or_zero();
    let lateral = (rotation * Vec3::X).normalize_or_zero();
    (forward, lateral)
}
