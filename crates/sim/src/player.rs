//! Player controller: drives a capsule body from key state and camera facing.

use crate::config::PlayerConfig;
use glam::{Vec2, Vec3};
use input::InputState;
use physics::{ColliderHandle, PhysicsResult, PhysicsWorld, RaycastHit, RigidBodyHandle};
use scene::Camera;

/// Movement state. Grounded/Airborne are re-derived every query, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Grounded,
    Airborne,
    Flight,
}

/// What the player asked for this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveIntent {
    /// x = strafe, y = forward, already normalized.
    pub movement: Vec2,
    pub jump: bool,
    /// Flight only: +1 ascend, -1 descend.
    pub vertical: f32,
}

impl MoveIntent {
    pub fn from_input(input: &InputState) -> Self {
        Self {
            movement: input.get_movement_input(),
            jump: input.is_jump_pressed(),
            vertical: input.get_vertical_input(),
        }
    }
}

/// Player controller handling movement on a physics body.
pub struct PlayerController {
    body: RigidBodyHandle,
    collider: ColliderHandle,
    config: PlayerConfig,
    flight: bool,
}

impl PlayerController {
    /// Create the player capsule at the configured spawn point.
    pub fn spawn(physics: &mut PhysicsWorld, config: &PlayerConfig) -> PhysicsResult<Self> {
        let (body, collider) =
            physics.add_player_body(Vec3::from(config.spawn), config.half_height, config.radius)?;
        log::debug!("player body {:?} at {:?}", body, config.spawn);
        Ok(Self {
            body,
            collider,
            config: config.clone(),
            flight: false,
        })
    }

    pub fn body(&self) -> RigidBodyHandle {
        self.body
    }

    pub fn collider(&self) -> ColliderHandle {
        self.collider
    }

    pub fn is_flying(&self) -> bool {
        self.flight
    }

    /// Probe length below the body centre.
    pub fn probe_length(&self) -> f32 {
        self.config.half_height + self.config.radius + self.config.ground_margin
    }

    /// Downward ray from the body centre, ignoring the player's own collider.
    pub fn ground_probe(&self, physics: &PhysicsWorld) -> PhysicsResult<Option<RaycastHit>> {
        let position = physics.translation(self.body)?;
        Ok(physics.raycast_excluding(position, Vec3::NEG_Y, self.probe_length(), self.body))
    }

    pub fn state(&self, physics: &PhysicsWorld) -> PhysicsResult<PlayerState> {
        if self.flight {
            return Ok(PlayerState::Flight);
        }
        let hit = self.ground_probe(physics)?;
        let vertical_speed = physics.linear_velocity(self.body)?.y;
        Ok(
            if evaluate_ground(hit.as_ref(), vertical_speed, self.probe_length(), &self.config) {
                PlayerState::Grounded
            } else {
                PlayerState::Airborne
            },
        )
    }

    /// Turn the frame's intent into a body velocity. Returns the state it was
    /// evaluated in.
    pub fn apply_intent(
        &mut self,
        physics: &mut PhysicsWorld,
        intent: &MoveIntent,
        camera: &Camera,
    ) -> PhysicsResult<PlayerState> {
        let state = self.state(physics)?;
        let (forward, right) = camera.flat_basis();
        let current = physics.linear_velocity(self.body)?;

        let velocity = match state {
            PlayerState::Flight => {
                horizontal_velocity(intent.movement, forward, right, self.config.flight_speed)
                    + Vec3::Y * intent.vertical.clamp(-1.0, 1.0) * self.config.flight_speed
            }
            PlayerState::Grounded | PlayerState::Airborne => {
                let mut v = horizontal_velocity(intent.movement, forward, right, self.config.move_speed);
                // Gravity owns the vertical axis unless a jump starts.
                v.y = if intent.jump && state == PlayerState::Grounded {
                    self.config.jump_speed
                } else {
                    current.y
                };
                v
            }
        };
        physics.set_linear_velocity(self.body, velocity)?;
        Ok(state)
    }

    /// Jump if grounded. Returns whether the jump happened.
    pub fn jump(&mut self, physics: &mut PhysicsWorld) -> PhysicsResult<bool> {
        if self.state(physics)? != PlayerState::Grounded {
            return Ok(false);
        }
        let mut v = physics.linear_velocity(self.body)?;
        v.y = self.config.jump_speed;
        physics.set_linear_velocity(self.body, v)?;
        Ok(true)
    }

    /// Enter or leave flight. Entering zeroes velocity and disables gravity.
    pub fn toggle_flight(&mut self, physics: &mut PhysicsWorld) -> PhysicsResult<bool> {
        let flight = !self.flight;
        if flight {
            physics.set_gravity_scale(self.body, 0.0)?;
            physics.set_linear_velocity(self.body, Vec3::ZERO)?;
        } else {
            physics.set_gravity_scale(self.body, 1.0)?;
        }
        self.flight = flight;
        log::info!("flight mode {}", if flight { "on" } else { "off" });
        Ok(flight)
    }

    pub fn position(&self, physics: &PhysicsWorld) -> PhysicsResult<Vec3> {
        physics.translation(self.body)
    }

    pub fn eye_position(&self, physics: &PhysicsWorld) -> PhysicsResult<Vec3> {
        Ok(self.position(physics)? + Vec3::Y * self.config.eye_height)
    }
}

/// Standing support test on a probe result.
pub fn evaluate_ground(
    hit: Option<&RaycastHit>,
    vertical_speed: f32,
    probe_length: f32,
    config: &PlayerConfig,
) -> bool {
    match hit {
        Some(hit) => {
            hit.distance <= probe_length
                && hit.normal.y > config.min_ground_normal_y
                && vertical_speed <= config.max_grounded_upward_speed
        }
        None => false,
    }
}

/// Normalized directional input projected on the camera's horizontal basis.
pub fn horizontal_velocity(movement: Vec2, forward: Vec3, right: Vec3, speed: f32) -> Vec3 {
    (forward * movement.y + right * movement.x).normalize_or_zero() * speed
}
