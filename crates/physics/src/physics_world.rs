//! Physics world management with Rapier3D.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::collision::CollisionGroup;
use crate::error::{PhysicsError, PhysicsResult};
use engine_core::{Quat, Transform, Vec3};
use rapier3d::na::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use rapier3d::prelude::*;

/// Shared teardown flag. Once killed, every guarded accessor fails with
/// [`PhysicsError::TornDown`] instead of touching the engine.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Default for Liveness {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }
}

impl Liveness {
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn kill(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Description of a dynamic body to create.
#[derive(Debug, Clone, Copy)]
pub struct DynamicBodyDesc {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    /// Continuous collision detection for small fast bodies.
    pub ccd: bool,
}

impl DynamicBodyDesc {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            ccd: false,
        }
    }
}

/// Material parameters for a collider.
#[derive(Debug, Clone, Copy)]
pub struct ColliderMaterial {
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
}

impl Default for ColliderMaterial {
    fn default() -> Self {
        Self {
            density: 1.0,
            friction: 0.7,
            restitution: 0.2,
        }
    }
}

/// World-space wire box for the debug overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugShape {
    pub center: Vec3,
    pub half_extents: Vec3,
    pub rotation: Quat,
}

/// Main physics world containing all simulation state.
pub struct PhysicsWorld {
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub gravity: Vector<Real>,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub query_pipeline: QueryPipeline,
    liveness: Liveness,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

pub(crate) fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

pub(crate) fn to_rotation(q: Quat) -> UnitQuaternion<Real> {
    UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z))
}

pub(crate) fn from_rotation(rot: &UnitQuaternion<Real>) -> Quat {
    Quat::from_xyzw(rot.i, rot.j, rot.k, rot.w)
}

fn isometry(position: Vec3, rotation: Quat) -> Isometry3<Real> {
    Isometry3::from_parts(
        Translation3::new(position.x, position.y, position.z),
        to_rotation(rotation),
    )
}

impl PhysicsWorld {
    /// Create a new physics world with default gravity.
    pub fn new() -> Self {
        Self::with_gravity(Vec3::new(0.0, -9.81, 0.0))
    }

    pub fn with_gravity(gravity: Vec3) -> Self {
        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            gravity: to_vector(gravity),
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            liveness: Liveness::default(),
        }
    }

    /// Handle to the teardown flag, for hosts that cancel from outside the loop.
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    /// Mark the world dead. Nothing is freed here; later calls simply fail.
    pub fn teardown(&self) {
        self.liveness.kill();
    }

    fn ensure_alive(&self) -> PhysicsResult<()> {
        if self.liveness.is_alive() {
            Ok(())
        } else {
            Err(PhysicsError::TornDown)
        }
    }

    fn body(&self, handle: RigidBodyHandle) -> PhysicsResult<&RigidBody> {
        self.ensure_alive()?;
        self.rigid_body_set
            .get(handle)
            .ok_or(PhysicsError::StaleBody(handle))
    }

    fn body_mut(&mut self, handle: RigidBodyHandle) -> PhysicsResult<&mut RigidBody> {
        self.ensure_alive()?;
        self.rigid_body_set
            .get_mut(handle)
            .ok_or(PhysicsError::StaleBody(handle))
    }

    /// Set the fixed integration timestep (seconds).
    pub fn set_timestep(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
    }

    /// Advance the simulation by one fixed timestep.
    pub fn step(&mut self) -> PhysicsResult<()> {
        self.ensure_alive()?;
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
        Ok(())
    }

    /// Update query pipeline for raycasting (needed before the first step).
    pub fn update_query_pipeline(&mut self) {
        self.query_pipeline.update(&self.collider_set);
    }

    /// Add a dynamic rigid body and return its handle.
    pub fn add_dynamic_body(&mut self, desc: DynamicBodyDesc) -> PhysicsResult<RigidBodyHandle> {
        self.ensure_alive()?;
        let rigid_body = RigidBodyBuilder::dynamic()
            .position(isometry(desc.position, desc.rotation))
            .linvel(to_vector(desc.linear_velocity))
            .ccd_enabled(desc.ccd)
            .build();
        Ok(self.rigid_body_set.insert(rigid_body))
    }

    /// Player capsule: dynamic, rotation-locked, never sleeps.
    pub fn add_player_body(
        &mut self,
        position: Vec3,
        half_height: f32,
        radius: f32,
    ) -> PhysicsResult<(RigidBodyHandle, ColliderHandle)> {
        self.ensure_alive()?;
        let rigid_body = RigidBodyBuilder::dynamic()
            .translation(to_vector(position))
            .lock_rotations()
            .can_sleep(false)
            .build();
        let body = self.rigid_body_set.insert(rigid_body);
        let collider = ColliderBuilder::capsule_y(half_height, radius)
            .friction(0.0)
            .collision_groups(CollisionGroup::Player.interaction_groups())
            .build();
        let collider = self
            .collider_set
            .insert_with_parent(collider, body, &mut self.rigid_body_set);
        Ok((body, collider))
    }

    /// Add a box collider to a rigid body, offset from the body origin.
    pub fn add_box_collider(
        &mut self,
        body_handle: RigidBodyHandle,
        half_extents: Vec3,
        offset: Vec3,
        group: CollisionGroup,
        material: ColliderMaterial,
    ) -> PhysicsResult<ColliderHandle> {
        self.body(body_handle)?;
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .translation(to_vector(offset))
            .density(material.density)
            .friction(material.friction)
            .restitution(material.restitution)
            .collision_groups(group.interaction_groups())
            .build();
        Ok(self
            .collider_set
            .insert_with_parent(collider, body_handle, &mut self.rigid_body_set))
    }

    /// Add a sphere collider to a rigid body.
    pub fn add_sphere_collider(
        &mut self,
        body_handle: RigidBodyHandle,
        radius: f32,
        group: CollisionGroup,
        material: ColliderMaterial,
    ) -> PhysicsResult<ColliderHandle> {
        self.body(body_handle)?;
        let collider = ColliderBuilder::ball(radius)
            .density(material.density)
            .friction(material.friction)
            .restitution(material.restitution)
            .collision_groups(group.interaction_groups())
            .build();
        Ok(self
            .collider_set
            .insert_with_parent(collider, body_handle, &mut self.rigid_body_set))
    }

    /// Add a static cuboid collider (floor, scene proxies). No parent body; collider is fixed in world.
    /// `translation`: world position of center. `rotation_y_rad`: rotation around Y axis in radians.
    /// `half_extents`: half sizes in local X, Y, Z (after rotation).
    pub fn add_static_cuboid(
        &mut self,
        translation: Vec3,
        rotation_y_rad: f32,
        half_extents: Vec3,
    ) -> PhysicsResult<ColliderHandle> {
        self.ensure_alive()?;
        let tra = to_vector(translation);
        let axisangle = Vector3::y_axis().into_inner() * (rotation_y_rad as Real);
        let position = Isometry3::new(tra, axisangle);
        let collider = ColliderBuilder::cuboid(
            half_extents.x as Real,
            half_extents.y as Real,
            half_extents.z as Real,
        )
        .position(position)
        .collision_groups(CollisionGroup::Environment.interaction_groups())
        .build();
        Ok(self.collider_set.insert(collider))
    }

    /// Get the transform of a rigid body.
    pub fn pose(&self, handle: RigidBodyHandle) -> PhysicsResult<Transform> {
        let body = self.body(handle)?;
        Ok(Transform::from_position_rotation(
            from_vector(body.translation()),
            from_rotation(body.rotation()),
        ))
    }

    pub fn translation(&self, handle: RigidBodyHandle) -> PhysicsResult<Vec3> {
        Ok(from_vector(self.body(handle)?.translation()))
    }

    pub fn linear_velocity(&self, handle: RigidBodyHandle) -> PhysicsResult<Vec3> {
        Ok(from_vector(self.body(handle)?.linvel()))
    }

    pub fn angular_velocity(&self, handle: RigidBodyHandle) -> PhysicsResult<Vec3> {
        Ok(from_vector(self.body(handle)?.angvel()))
    }

    pub fn set_linear_velocity(&mut self, handle: RigidBodyHandle, velocity: Vec3) -> PhysicsResult<()> {
        self.body_mut(handle)?.set_linvel(to_vector(velocity), true);
        Ok(())
    }

    pub fn set_angular_velocity(&mut self, handle: RigidBodyHandle, velocity: Vec3) -> PhysicsResult<()> {
        self.body_mut(handle)?.set_angvel(to_vector(velocity), true);
        Ok(())
    }

    /// Teleport a body to a pose.
    pub fn set_pose(&mut self, handle: RigidBodyHandle, position: Vec3, rotation: Quat) -> PhysicsResult<()> {
        let body = self.body_mut(handle)?;
        body.set_translation(to_vector(position), true);
        body.set_rotation(to_rotation(rotation), true);
        Ok(())
    }

    pub fn set_gravity_scale(&mut self, handle: RigidBodyHandle, scale: f32) -> PhysicsResult<()> {
        self.body_mut(handle)?.set_gravity_scale(scale, true);
        Ok(())
    }

    pub fn gravity_scale(&self, handle: RigidBodyHandle) -> PhysicsResult<f32> {
        Ok(self.body(handle)?.gravity_scale())
    }

    pub fn contains_body(&self, handle: RigidBodyHandle) -> bool {
        self.rigid_body_set.contains(handle)
    }

    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    /// Remove a rigid body and its colliders.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> PhysicsResult<()> {
        self.ensure_alive()?;
        let removed = self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
        match removed {
            Some(_) => Ok(()),
            None => {
                log::debug!("remove of unknown body {:?}", handle);
                Err(PhysicsError::StaleBody(handle))
            }
        }
    }

    /// One wire box per collider: oriented for cuboids, world AABB for other shapes.
    pub fn debug_shapes(&self) -> Vec<DebugShape> {
        if !self.is_alive() {
            return Vec::new();
        }
        self.collider_set
            .iter()
            .filter_map(|(_, collider)| {
                let pose = collider.position();
                if let Some(cuboid) = collider.shape().as_cuboid() {
                    return Some(DebugShape {
                        center: from_vector(&pose.translation.vector),
                        half_extents: from_vector(&cuboid.half_extents),
                        rotation: from_rotation(&pose.rotation),
                    });
                }
                let aabb = collider.compute_aabb();
                let center = aabb.center();
                let half = aabb.half_extents();
                let half = Vec3::new(half.x, half.y, half.z);
                half.is_finite().then(|| DebugShape {
                    center: Vec3::new(center.x, center.y, center.z),
                    half_extents: half,
                    rotation: Quat::IDENTITY,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_body_falls_under_gravity() {
        let mut world = PhysicsWorld::new();
        let body = world.add_dynamic_body(DynamicBodyDesc::at(Vec3::new(0.0, 5.0, 0.0))).unwrap();
        world
            .add_box_collider(body, Vec3::splat(0.5), Vec3::ZERO, CollisionGroup::Prop, ColliderMaterial::default())
            .unwrap();
        for _ in 0..10 {
            world.step().unwrap();
        }
        assert!(world.translation(body).unwrap().y < 5.0);
        assert!(world.linear_velocity(body).unwrap().y < 0.0);
    }

    #[test]
    fn removed_body_reports_stale() {
        let mut world = PhysicsWorld::new();
        let body = world.add_dynamic_body(DynamicBodyDesc::at(Vec3::ZERO)).unwrap();
        world.remove_body(body).unwrap();
        assert_eq!(world.pose(body), Err(PhysicsError::StaleBody(body)));
        assert_eq!(world.remove_body(body), Err(PhysicsError::StaleBody(body)));
    }

    #[test]
    fn teardown_blocks_every_call() {
        let mut world = PhysicsWorld::new();
        let body = world.add_dynamic_body(DynamicBodyDesc::at(Vec3::ZERO)).unwrap();
        let liveness = world.liveness();
        liveness.kill();
        assert_eq!(world.step(), Err(PhysicsError::TornDown));
        assert_eq!(world.linear_velocity(body), Err(PhysicsError::TornDown));
        assert!(world.add_dynamic_body(DynamicBodyDesc::at(Vec3::ZERO)).is_err());
        assert!(world.debug_shapes().is_empty());
    }

    #[test]
    fn debug_shapes_cover_static_cuboids() {
        let mut world = PhysicsWorld::new();
        world
            .add_static_cuboid(Vec3::new(0.0, -0.5, 0.0), 0.0, Vec3::new(10.0, 0.5, 10.0))
            .unwrap();
        let shapes = world.debug_shapes();
        assert_eq!(shapes.len(), 1);
        assert!((shapes[0].half_extents - Vec3::new(10.0, 0.5, 10.0)).length() < 1e-5);
    }
}
