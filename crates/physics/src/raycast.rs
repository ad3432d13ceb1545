//! Raycasting for ground probes and world queries.

use crate::PhysicsWorld;
use engine_core::Vec3;
use rapier3d::prelude::*;

/// Result of a raycast query.
#[derive(Debug, Clone, Copy)]
pub struct RaycastHit {
    /// The collider that was hit.
    pub collider: ColliderHandle,
    /// Body owning the collider, if any.
    pub body: Option<RigidBodyHandle>,
    /// Distance along the ray to the hit point (time of impact for a unit direction).
    pub distance: f32,
    /// World position of the hit.
    pub point: Vec3,
    /// Surface normal at the hit point.
    pub normal: Vec3,
}

impl PhysicsWorld {
    /// Cast a ray and return the first hit.
    pub fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RaycastHit> {
        self.cast(origin, direction, max_distance, QueryFilter::default())
    }

    /// Cast a ray ignoring every collider attached to `exclude`.
    pub fn raycast_excluding(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        exclude: RigidBodyHandle,
    ) -> Option<RaycastHit> {
        let filter = QueryFilter::default().exclude_rigid_body(exclude);
        self.cast(origin, direction, max_distance, filter)
    }

    fn cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        filter: QueryFilter,
    ) -> Option<RaycastHit> {
        if !self.is_alive() {
            return None;
        }
        let ray = Ray::new(
            point![origin.x, origin.y, origin.z],
            vector![direction.x, direction.y, direction.z],
        );

        self.query_pipeline
            .cast_ray_and_get_normal(
                &self.rigid_body_set,
                &self.collider_set,
                &ray,
                max_distance,
                true,
                filter,
            )
            .map(|(collider, intersection)| {
                let point = ray.point_at(intersection.time_of_impact);
                RaycastHit {
                    collider,
                    body: self.collider_set.get(collider).and_then(|c| c.parent()),
                    distance: intersection.time_of_impact,
                    point: Vec3::new(point.x, point.y, point.z),
                    normal: Vec3::new(
                        intersection.normal.x,
                        intersection.normal.y,
                        intersection.normal.z,
                    ),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downward_ray_finds_floor_top() {
        let mut world = PhysicsWorld::new();
        world
            .add_static_cuboid(Vec3::new(0.0, -0.5, 0.0), 0.0, Vec3::new(10.0, 0.5, 10.0))
            .unwrap();
        world.update_query_pipeline();
        let hit = world.raycast(Vec3::new(0.0, 2.0, 0.0), -Vec3::Y, 5.0).unwrap();
        assert!((hit.distance - 2.0).abs() < 1e-4);
        assert!(hit.normal.y > 0.99);
        assert!(hit.body.is_none());
    }

    #[test]
    fn excluded_body_is_not_hit() {
        let mut world = PhysicsWorld::new();
        let (player, _) = world.add_player_body(Vec3::new(0.0, 0.8, 0.0), 0.5, 0.3).unwrap();
        world.update_query_pipeline();
        assert!(world.raycast(Vec3::new(0.0, 0.8, 0.0), -Vec3::Y, 2.0).is_some());
        assert!(world
            .raycast_excluding(Vec3::new(0.0, 0.8, 0.0), -Vec3::Y, 2.0, player)
            .is_none());
    }
}
