//! A physics body whose carrier node follows it every sub-step.

use glam::Vec3;
use hecs::Entity;
use physics::{PhysicsError, PhysicsResult, PhysicsWorld, RigidBodyHandle};
use scene::Scene;

/// Body + carrier node + the velocity seen at the previous sub-step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedBody {
    pub root: Entity,
    pub body: RigidBodyHandle,
    pub last_velocity: Vec3,
}

impl TrackedBody {
    pub fn new(root: Entity, body: RigidBodyHandle, velocity: Vec3) -> Self {
        Self {
            root,
            body,
            last_velocity: velocity,
        }
    }

    /// Copy the body pose onto the carrier node.
    pub fn sync_pose(&self, physics: &PhysicsWorld, scene: &mut Scene) -> PhysicsResult<()> {
        let pose = physics.pose(self.body)?;
        scene.set_pose(self.root, pose.position, pose.rotation);
        Ok(())
    }
}

/// Per-entity error policy: a stale body is recorded and skipped, teardown
/// stops the whole pass.
pub(crate) fn guard(
    result: PhysicsResult<()>,
    body: RigidBodyHandle,
    stale: &mut Vec<RigidBodyHandle>,
) -> PhysicsResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(PhysicsError::StaleBody(_)) => {
            log::warn!("dropping entity with stale body {:?}", body);
            if !stale.contains(&body) {
                stale.push(body);
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Remove a body, tolerating one that is already gone.
pub(crate) fn release_body(physics: &mut PhysicsWorld, body: RigidBodyHandle) {
    match physics.remove_body(body) {
        Ok(()) | Err(PhysicsError::StaleBody(_)) => {}
        Err(PhysicsError::TornDown) => log::debug!("body {:?} left to the torn-down world", body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::Transform;
    use physics::DynamicBodyDesc;

    #[test]
    fn guard_records_stale_and_passes_teardown() {
        let mut physics = PhysicsWorld::new();
        let body = physics.add_dynamic_body(DynamicBodyDesc::at(Vec3::ZERO)).unwrap();
        let mut stale = Vec::new();

        assert!(guard(Err(PhysicsError::StaleBody(body)), body, &mut stale).is_ok());
        assert!(guard(Err(PhysicsError::StaleBody(body)), body, &mut stale).is_ok());
        assert_eq!(stale, vec![body]);
        assert_eq!(
            guard(Err(PhysicsError::TornDown), body, &mut stale),
            Err(PhysicsError::TornDown)
        );
    }

    #[test]
    fn sync_copies_body_pose() {
        let mut physics = PhysicsWorld::new();
        let body = physics
            .add_dynamic_body(DynamicBodyDesc::at(Vec3::new(1.0, 2.0, 3.0)))
            .unwrap();
        let mut scene = Scene::new();
        let root = scene.spawn_root("carrier", Transform::default().with_scale(2.0));
        let tracked = TrackedBody::new(root, body, Vec3::ZERO);

        tracked.sync_pose(&physics, &mut scene).unwrap();
        let t = scene.transform(root).unwrap();
        assert_eq!(t.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.scale, Vec3::splat(2.0));

        physics.remove_body(body).unwrap();
        assert_eq!(
            tracked.sync_pose(&physics, &mut scene),
            Err(PhysicsError::StaleBody(body))
        );
    }
}
