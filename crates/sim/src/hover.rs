//! Periodic pick against the grabbable meshes with an emissive highlight on
//! whatever the camera is aimed at.

use crate::config::HoverConfig;
use crate::registry::EntityRegistry;
use glam::Vec3;
use hecs::Entity;
use physics::RigidBodyHandle;
use scene::Scene;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Highlight {
    mesh: Entity,
    body: RigidBodyHandle,
    /// Emissive the mesh had before we touched it.
    saved: [f32; 3],
}

pub struct HoverDetector {
    config: HoverConfig,
    frame: u64,
    current: Option<Highlight>,
}

impl HoverDetector {
    pub fn new(config: HoverConfig) -> Self {
        Self {
            config,
            frame: 0,
            current: None,
        }
    }

    /// Run once per frame. Only every `interval_frames`-th call picks; the
    /// others return `false` and leave the highlight alone.
    ///
    /// A pick always restores the previous highlight first, so at most one
    /// mesh is ever lit.
    pub fn update(
        &mut self,
        scene: &mut Scene,
        registry: &EntityRegistry,
        origin: Vec3,
        forward: Vec3,
        aim_active: bool,
    ) -> bool {
        let due = self.frame % self.config.interval_frames.max(1) == 0;
        self.frame = self.frame.wrapping_add(1);
        if !due {
            return false;
        }

        self.restore(scene);
        let candidates = registry.grabbable_meshes();
        if !aim_active || candidates.is_empty() {
            return true;
        }

        let Some(hit) = scene.pick(origin, forward, self.config.max_distance, candidates.iter().copied()) else {
            return true;
        };
        let (Some(body), Some(saved)) = (registry.body_for_mesh(hit.node), scene.emissive(hit.node)) else {
            return true;
        };
        scene.set_emissive(hit.node, self.config.highlight);
        self.current = Some(Highlight {
            mesh: hit.node,
            body,
            saved,
        });
        true
    }

    /// Put the lit mesh back the way it was.
    pub fn restore(&mut self, scene: &mut Scene) {
        if let Some(highlight) = self.current.take() {
            scene.set_emissive(highlight.mesh, highlight.saved);
        }
    }

    /// The body went away; drop the record without touching its nodes.
    pub fn forget_body(&mut self, body: RigidBodyHandle) {
        if self.target() == Some(body) {
            self.current = None;
        }
    }

    /// Body behind the highlighted mesh.
    pub fn target(&self) -> Option<RigidBodyHandle> {
        self.current.map(|h| h.body)
    }

    pub fn highlighted(&self) -> Option<Entity> {
        self.current.map(|h| h.mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::{Aabb, Appearance, MeshInstance, Transform};
    use physics::{DynamicBodyDesc, PhysicsWorld};

    struct Fixture {
        scene: Scene,
        registry: EntityRegistry,
        a: Entity,
        b: Entity,
    }

    fn fixture() -> Fixture {
        let mut physics = PhysicsWorld::new();
        let mut scene = Scene::new();
        let mut registry = EntityRegistry::new();
        let mut add = |x: f32, emissive: [f32; 3]| {
            let position = Vec3::new(x, 0.0, -3.0);
            let body = physics.add_dynamic_body(DynamicBodyDesc::at(position)).unwrap();
            let root = scene.spawn_root("box", Transform::from_position(position));
            let mesh = scene.spawn_part(
                root,
                "box",
                Transform::default(),
                MeshInstance::new(0, 0),
                Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5)),
                Appearance {
                    emissive,
                    ..Appearance::default()
                },
            );
            registry.link(body, root);
            registry.register_grabbable(mesh, body);
            mesh
        };
        let a = add(0.0, [0.1, 0.0, 0.0]);
        let b = add(3.0, [0.0, 0.0, 0.0]);
        Fixture { scene, registry, a, b }
    }

    fn config() -> HoverConfig {
        HoverConfig {
            interval_frames: 5,
            max_distance: 10.0,
            highlight: [1.0, 1.0, 0.0],
        }
    }

    #[test]
    fn moving_aim_restores_previous_mesh() {
        let mut f = fixture();
        let mut hover = HoverDetector::new(config());

        assert!(hover.update(&mut f.scene, &f.registry, Vec3::ZERO, -Vec3::Z, true));
        assert_eq!(hover.highlighted(), Some(f.a));
        assert_eq!(f.scene.emissive(f.a), Some([1.0, 1.0, 0.0]));

        let at_b = (Vec3::new(3.0, 0.0, -3.0)).normalize();
        for _ in 0..4 {
            assert!(!hover.update(&mut f.scene, &f.registry, Vec3::ZERO, at_b, true));
        }
        assert_eq!(hover.highlighted(), Some(f.a));

        assert!(hover.update(&mut f.scene, &f.registry, Vec3::ZERO, at_b, true));
        assert_eq!(hover.highlighted(), Some(f.b));
        assert_eq!(f.scene.emissive(f.a), Some([0.1, 0.0, 0.0]));
        assert_eq!(f.scene.emissive(f.b), Some([1.0, 1.0, 0.0]));
    }

    #[test]
    fn inactive_aim_clears_highlight() {
        let mut f = fixture();
        let mut hover = HoverDetector::new(HoverConfig {
            interval_frames: 1,
            ..config()
        });
        hover.update(&mut f.scene, &f.registry, Vec3::ZERO, -Vec3::Z, true);
        assert!(hover.target().is_some());

        hover.update(&mut f.scene, &f.registry, Vec3::ZERO, -Vec3::Z, false);
        assert_eq!(hover.target(), None);
        assert_eq!(f.scene.emissive(f.a), Some([0.1, 0.0, 0.0]));
    }

    #[test]
    fn aiming_at_nothing_lights_nothing() {
        let mut f = fixture();
        let mut hover = HoverDetector::new(config());
        hover.update(&mut f.scene, &f.registry, Vec3::ZERO, Vec3::Z, true);
        assert_eq!(hover.highlighted(), None);
    }

    #[test]
    fn forgotten_body_is_not_restored() {
        let mut f = fixture();
        let mut hover = HoverDetector::new(config());
        hover.update(&mut f.scene, &f.registry, Vec3::ZERO, -Vec3::Z, true);
        let body = hover.target().unwrap();
        hover.forget_body(body);
        assert_eq!(hover.highlighted(), None);
        // Forgetting skips the restore; the mesh keeps the highlight value.
        assert_eq!(f.scene.emissive(f.a), Some([1.0, 1.0, 0.0]));
    }
}
