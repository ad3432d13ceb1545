//! Grab controller: hold a dynamic body in front of the camera, rotate it,
//! drop it or launch it.

use crate::config::GrabConfig;
use glam::{EulerRot, Quat, Vec3};
use physics::{PhysicsError, PhysicsResult, PhysicsWorld, RigidBodyHandle};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GrabState {
    Empty,
    /// Accumulated rotation in radians, reset on every transition.
    Holding {
        body: RigidBodyHandle,
        pitch: f32,
        yaw: f32,
        roll: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabTransition {
    Grabbed(RigidBodyHandle),
    Released(RigidBodyHandle),
    Launched(RigidBodyHandle),
    Unchanged,
}

pub struct GrabController {
    state: GrabState,
    config: GrabConfig,
}

impl GrabController {
    pub fn new(config: GrabConfig) -> Self {
        Self {
            state: GrabState::Empty,
            config,
        }
    }

    pub fn state(&self) -> GrabState {
        self.state
    }

    pub fn held(&self) -> Option<RigidBodyHandle> {
        match self.state {
            GrabState::Holding { body, .. } => Some(body),
            GrabState::Empty => None,
        }
    }

    /// Primary action. Holding releases (and never grabs the new target in the
    /// same press); empty grabs the hover target if there is one.
    pub fn trigger(&mut self, physics: &mut PhysicsWorld, target: Option<RigidBodyHandle>) -> GrabTransition {
        match self.state {
            GrabState::Holding { body, .. } => {
                self.state = GrabState::Empty;
                stop(physics, body);
                log::debug!("released {:?}", body);
                GrabTransition::Released(body)
            }
            GrabState::Empty => match target {
                Some(body) if physics.contains_body(body) => {
                    self.state = GrabState::Holding {
                        body,
                        pitch: 0.0,
                        yaw: 0.0,
                        roll: 0.0,
                    };
                    log::debug!("grabbed {:?}", body);
                    GrabTransition::Grabbed(body)
                }
                _ => GrabTransition::Unchanged,
            },
        }
    }

    /// Release with a forced velocity along `forward`.
    pub fn launch(&mut self, physics: &mut PhysicsWorld, forward: Vec3) -> PhysicsResult<GrabTransition> {
        let GrabState::Holding { body, .. } = self.state else {
            return Ok(GrabTransition::Unchanged);
        };
        self.state = GrabState::Empty;
        physics.set_angular_velocity(body, Vec3::ZERO)?;
        physics.set_linear_velocity(body, forward.normalize_or_zero() * self.config.launch_speed)?;
        log::debug!("launched {:?}", body);
        Ok(GrabTransition::Launched(body))
    }

    /// Per sub-step: accumulate rotation, zero velocities and pin the body in
    /// front of the camera. A held body that vanished just empties the hand.
    pub fn sync(
        &mut self,
        physics: &mut PhysicsWorld,
        camera_position: Vec3,
        forward: Vec3,
        rotate_input: Vec3,
        dt: f32,
    ) -> PhysicsResult<()> {
        let GrabState::Holding {
            body,
            mut pitch,
            mut yaw,
            mut roll,
        } = self.state
        else {
            return Ok(());
        };

        let step = self.config.rotate_speed * dt;
        pitch += rotate_input.x * step;
        yaw += rotate_input.y * step;
        roll += rotate_input.z * step;
        self.state = GrabState::Holding { body, pitch, yaw, roll };

        let target = camera_position + forward.normalize_or_zero() * self.config.hold_distance;
        let result = physics
            .set_linear_velocity(body, Vec3::ZERO)
            .and_then(|_| physics.set_angular_velocity(body, Vec3::ZERO))
            .and_then(|_| physics.set_pose(body, target, hold_rotation(pitch, yaw, roll)));
        match result {
            Err(PhysicsError::StaleBody(_)) => {
                log::warn!("held body {:?} disappeared", body);
                self.state = GrabState::Empty;
                Ok(())
            }
            other => other,
        }
    }

    /// Drop the hold without touching physics if it refers to `body`.
    pub fn forget(&mut self, body: RigidBodyHandle) {
        if self.held() == Some(body) {
            self.state = GrabState::Empty;
        }
    }
}

/// Held-object orientation: intrinsic X (pitch), then Y (yaw), then Z (roll).
pub fn hold_rotation(pitch: f32, yaw: f32, roll: f32) -> Quat {
    Quat::from_euler(EulerRot::XYZ, pitch, yaw, roll)
}

fn stop(physics: &mut PhysicsWorld, body: RigidBodyHandle) {
    let result = physics
        .set_linear_velocity(body, Vec3::ZERO)
        .and_then(|_| physics.set_angular_velocity(body, Vec3::ZERO));
    if let Err(e) = result {
        log::debug!("release of {:?}: {}", body, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use physics::{CollisionGroup, ColliderMaterial, DynamicBodyDesc};

    fn world_with_two_props() -> (PhysicsWorld, RigidBodyHandle, RigidBodyHandle) {
        let mut physics = PhysicsWorld::new();
        let mut add = |x: f32| {
            let body = physics.add_dynamic_body(DynamicBodyDesc::at(Vec3::new(x, 1.0, -3.0))).unwrap();
            physics
                .add_box_collider(body, Vec3::splat(0.25), Vec3::ZERO, CollisionGroup::Prop, ColliderMaterial::default())
                .unwrap();
            body
        };
        let a = add(-1.0);
        let b = add(1.0);
        (physics, a, b)
    }

    #[test]
    fn trigger_while_holding_releases_and_does_not_regrab() {
        let (mut physics, a, b) = world_with_two_props();
        let mut grab = GrabController::new(GrabConfig::default());

        assert_eq!(grab.trigger(&mut physics, Some(a)), GrabTransition::Grabbed(a));
        assert_eq!(grab.trigger(&mut physics, Some(b)), GrabTransition::Released(a));
        assert_eq!(grab.held(), None);
        assert_eq!(grab.trigger(&mut physics, None), GrabTransition::Unchanged);
    }

    #[test]
    fn sync_pins_body_and_zeroes_velocity() {
        let (mut physics, a, _) = world_with_two_props();
        physics.set_linear_velocity(a, Vec3::new(3.0, 3.0, 3.0)).unwrap();
        let mut grab = GrabController::new(GrabConfig::default());
        grab.trigger(&mut physics, Some(a));

        let camera = Vec3::new(0.0, 1.6, 0.0);
        grab.sync(&mut physics, camera, -Vec3::Z, Vec3::new(0.0, 1.0, 0.0), 0.5).unwrap();

        let pose = physics.pose(a).unwrap();
        assert!((pose.position - Vec3::new(0.0, 1.6, -2.0)).length() < 1e-5);
        assert_eq!(physics.linear_velocity(a).unwrap(), Vec3::ZERO);
        let expected = hold_rotation(0.0, 1.0, 0.0);
        assert!(pose.rotation.angle_between(expected) < 1e-4);
        match grab.state() {
            GrabState::Holding { yaw, .. } => assert!((yaw - 1.0).abs() < 1e-6),
            GrabState::Empty => panic!("should still hold"),
        }
    }

    #[test]
    fn accumulator_resets_between_holds() {
        let (mut physics, a, _) = world_with_two_props();
        let mut grab = GrabController::new(GrabConfig::default());
        grab.trigger(&mut physics, Some(a));
        grab.sync(&mut physics, Vec3::ZERO, -Vec3::Z, Vec3::ONE, 1.0).unwrap();
        grab.trigger(&mut physics, None);
        grab.trigger(&mut physics, Some(a));
        assert_eq!(
            grab.state(),
            GrabState::Holding { body: a, pitch: 0.0, yaw: 0.0, roll: 0.0 }
        );
    }

    #[test]
    fn launch_sets_forward_velocity() {
        let (mut physics, a, _) = world_with_two_props();
        let mut grab = GrabController::new(GrabConfig::default());
        assert_eq!(grab.launch(&mut physics, -Vec3::Z).unwrap(), GrabTransition::Unchanged);

        grab.trigger(&mut physics, Some(a));
        assert_eq!(grab.launch(&mut physics, Vec3::new(0.0, 0.0, -2.0)).unwrap(), GrabTransition::Launched(a));
        assert!((physics.linear_velocity(a).unwrap() - Vec3::new(0.0, 0.0, -15.0)).length() < 1e-4);
        assert_eq!(grab.held(), None);
    }

    #[test]
    fn stale_held_body_empties_hand() {
        let (mut physics, a, _) = world_with_two_props();
        let mut grab = GrabController::new(GrabConfig::default());
        grab.trigger(&mut physics, Some(a));
        physics.remove_body(a).unwrap();
        grab.sync(&mut physics, Vec3::ZERO, -Vec3::Z, Vec3::ZERO, 0.016).unwrap();
        assert_eq!(grab.held(), None);

        grab.trigger(&mut physics, Some(a));
        assert_eq!(grab.held(), None);
    }

    #[test]
    fn teardown_propagates_from_sync() {
        let (mut physics, a, _) = world_with_two_props();
        let mut grab = GrabController::new(GrabConfig::default());
        grab.trigger(&mut physics, Some(a));
        physics.teardown();
        assert_eq!(
            grab.sync(&mut physics, Vec3::ZERO, -Vec3::Z, Vec3::ZERO, 0.016),
            Err(PhysicsError::TornDown)
        );
    }
}
