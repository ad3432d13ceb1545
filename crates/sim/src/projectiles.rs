//! Bounded pool of thrown balls. The oldest ball is evicted at capacity.

use crate::config::ProjectileConfig;
use crate::impacts::ImpactCues;
use crate::registry::EntityRegistry;
use crate::tracked::{guard, release_body, TrackedBody};
use engine_core::{Aabb, Appearance, MeshInstance, Transform};
use glam::Vec3;
use physics::{
    CollisionGroup, ColliderMaterial, DynamicBodyDesc, PhysicsResult, PhysicsWorld, RigidBodyHandle,
};
use scene::Scene;
use std::collections::VecDeque;

pub struct ProjectilePool {
    config: ProjectileConfig,
    entries: VecDeque<TrackedBody>,
    /// Geometry and material shared by every ball.
    mesh: MeshInstance,
}

impl ProjectilePool {
    pub fn new(config: ProjectileConfig, scene: &mut Scene) -> Self {
        let mesh_id = scene.mesh_id("projectile");
        Self {
            config,
            entries: VecDeque::new(),
            mesh: MeshInstance::new(mesh_id, mesh_id),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedBody> {
        self.entries.iter()
    }

    /// Overwrite the velocity snapshot of a ball whose velocity was forced.
    pub fn reset_snapshot(&mut self, body: RigidBodyHandle, velocity: Vec3) -> bool {
        match self.entries.iter_mut().find(|e| e.body == body) {
            Some(entry) => {
                entry.last_velocity = velocity;
                true
            }
            None => false,
        }
    }

    /// Throw a ball from the camera. At capacity the oldest ball is fully
    /// released before the new one exists.
    pub fn spawn(
        &mut self,
        physics: &mut PhysicsWorld,
        scene: &mut Scene,
        registry: &mut EntityRegistry,
        camera_position: Vec3,
        forward: Vec3,
    ) -> PhysicsResult<RigidBodyHandle> {
        while self.entries.len() >= self.config.capacity.max(1) {
            if let Some(oldest) = self.entries.pop_front() {
                log::debug!("evicting projectile {:?}", oldest.body);
                release(physics, scene, registry, &oldest);
            }
        }

        let forward = forward.normalize_or_zero();
        let position = camera_position + forward * self.config.spawn_offset;
        let velocity = forward * self.config.launch_speed;
        let body = physics.add_dynamic_body(DynamicBodyDesc {
            linear_velocity: velocity,
            ccd: true,
            ..DynamicBodyDesc::at(position)
        })?;
        let material = ColliderMaterial {
            restitution: self.config.restitution,
            ..ColliderMaterial::default()
        };
        if let Err(e) = physics.add_sphere_collider(body, self.config.radius, CollisionGroup::Projectile, material) {
            release_body(physics, body);
            return Err(e);
        }

        let root = scene.spawn_root("projectile", Transform::from_position(position));
        scene.spawn_part(
            root,
            "projectile",
            Transform::default(),
            self.mesh,
            Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(self.config.radius)),
            Appearance {
                color: self.config.color,
                emissive: [0.0; 3],
            },
        );
        registry.link(body, root);
        self.entries.push_back(TrackedBody::new(root, body, velocity));
        Ok(body)
    }

    /// Copy every ball's pose onto its node.
    pub fn sync_poses(
        &mut self,
        physics: &PhysicsWorld,
        scene: &mut Scene,
        registry: &mut EntityRegistry,
    ) -> PhysicsResult<()> {
        let mut stale = Vec::new();
        for entry in &self.entries {
            guard(entry.sync_pose(physics, scene), entry.body, &mut stale)?;
        }
        self.drop_stale(scene, registry, &stale);
        Ok(())
    }

    /// Bounce cues, then the velocity snapshot. Returns how many fired.
    pub fn check_impacts(
        &mut self,
        physics: &PhysicsWorld,
        scene: &mut Scene,
        registry: &mut EntityRegistry,
        cues: &mut ImpactCues,
        listener: Vec3,
    ) -> PhysicsResult<usize> {
        let mut stale = Vec::new();
        let mut fired = 0;
        for entry in self.entries.iter_mut() {
            let body = entry.body;
            let result = cues
                .check_tracked(physics, entry, listener, Some(self.config.sound.as_str()))
                .map(|hit| fired += hit as usize);
            guard(result, body, &mut stale)?;
        }
        self.drop_stale(scene, registry, &stale);
        Ok(fired)
    }

    /// Release every ball.
    pub fn clear(&mut self, physics: &mut PhysicsWorld, scene: &mut Scene, registry: &mut EntityRegistry) {
        for entry in self.entries.drain(..) {
            release(physics, scene, registry, &entry);
        }
    }

    fn drop_stale(&mut self, scene: &mut Scene, registry: &mut EntityRegistry, stale: &[RigidBodyHandle]) {
        if stale.is_empty() {
            return;
        }
        self.entries.retain(|entry| {
            if stale.contains(&entry.body) {
                registry.unlink_body(entry.body);
                scene.despawn_tree(entry.root);
                false
            } else {
                true
            }
        });
    }
}

fn release(physics: &mut PhysicsWorld, scene: &mut Scene, registry: &mut EntityRegistry, entry: &TrackedBody) {
    release_body(physics, entry.body);
    scene.despawn_tree(entry.root);
    registry.unlink_body(entry.body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio::{CueConfig, SilentPlayer};

    struct Fixture {
        physics: PhysicsWorld,
        scene: Scene,
        registry: EntityRegistry,
        pool: ProjectilePool,
    }

    fn fixture(capacity: usize) -> Fixture {
        let mut scene = Scene::new();
        let config = ProjectileConfig {
            capacity,
            ..ProjectileConfig::default()
        };
        let pool = ProjectilePool::new(config, &mut scene);
        Fixture {
            physics: PhysicsWorld::new(),
            scene,
            registry: EntityRegistry::new(),
            pool,
        }
    }

    impl Fixture {
        fn throw(&mut self) -> RigidBodyHandle {
            self.pool
                .spawn(&mut self.physics, &mut self.scene, &mut self.registry, Vec3::Y, -Vec3::Z)
                .unwrap()
        }
    }

    #[test]
    fn overflow_evicts_oldest_completely() {
        let mut f = fixture(3);
        let first = f.throw();
        let first_root = f.registry.renderable_for(first).unwrap();
        f.throw();
        f.throw();
        f.throw();

        assert_eq!(f.pool.len(), 3);
        assert!(!f.physics.contains_body(first));
        assert!(!f.registry.references_body(first));
        assert!(!f.scene.contains(first_root));
        assert!(f.pool.iter().all(|e| e.body != first));
        assert_eq!(f.registry.linked_bodies(), 3);
        assert_eq!(f.physics.body_count(), 3);
    }

    #[test]
    fn spawn_in_front_with_launch_velocity_and_ccd() {
        let mut f = fixture(5);
        let body = f.throw();
        let pose = f.physics.pose(body).unwrap();
        assert!((pose.position - Vec3::new(0.0, 1.0, -0.6)).length() < 1e-5);
        assert!((f.physics.linear_velocity(body).unwrap() - Vec3::new(0.0, 0.0, -20.0)).length() < 1e-4);
        assert!(f.physics.rigid_body_set[body].is_ccd_enabled());
        // Balls are not grabbable.
        assert!(f.registry.grabbable_meshes().is_empty());
    }

    #[test]
    fn balls_share_geometry() {
        let mut f = fixture(5);
        f.throw();
        f.throw();
        let draws = f.scene.draw_list();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].mesh_id, draws[1].mesh_id);
    }

    #[test]
    fn stale_ball_is_dropped_without_failing_the_pass() {
        let mut f = fixture(5);
        let gone = f.throw();
        let kept = f.throw();
        f.physics.remove_body(gone).unwrap();

        f.pool.sync_poses(&f.physics, &mut f.scene, &mut f.registry).unwrap();
        assert_eq!(f.pool.len(), 1);
        assert!(!f.registry.references_body(gone));
        assert!(f.registry.references_body(kept));
    }

    #[test]
    fn first_check_after_throw_is_quiet() {
        let mut f = fixture(5);
        f.throw();
        let mut cues = ImpactCues::new(CueConfig::default(), Box::new(SilentPlayer::new()), 3);
        let fired = f
            .pool
            .check_impacts(&f.physics, &mut f.scene, &mut f.registry, &mut cues, Vec3::ZERO)
            .unwrap();
        assert_eq!(fired, 0);
    }

    #[test]
    fn clear_releases_everything() {
        let mut f = fixture(5);
        f.throw();
        f.throw();
        f.pool.clear(&mut f.physics, &mut f.scene, &mut f.registry);
        assert!(f.pool.is_empty());
        assert!(f.registry.is_empty());
        assert_eq!(f.scene.node_count(), 0);
        assert_eq!(f.physics.body_count(), 0);
    }
}
