//! Stacked block towers: layers of three grabbable blocks, each layer turned
//! 90 degrees from the one below.

use crate::config::PropsConfig;
use crate::impacts::ImpactCues;
use crate::registry::EntityRegistry;
use crate::tracked::{guard, release_body, TrackedBody};
use engine_core::{Aabb, Appearance, MeshInstance, Transform};
use glam::{Quat, Vec3};
use physics::{CollisionGroup, ColliderMaterial, DynamicBodyDesc, PhysicsResult, PhysicsWorld, RigidBodyHandle};
use scene::Scene;

const BLOCKS_PER_LAYER: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropBlock {
    pub tracked: TrackedBody,
    pub mesh: hecs::Entity,
}

pub struct PropTower {
    blocks: Vec<PropBlock>,
    sound: String,
}

impl PropTower {
    /// Stack `layers` layers on `config.base`. Blocks are dynamic, linked and grabbable.
    pub fn build(
        physics: &mut PhysicsWorld,
        scene: &mut Scene,
        registry: &mut EntityRegistry,
        config: &PropsConfig,
        layers: u32,
    ) -> PhysicsResult<Self> {
        let [length, height, width] = config.block_size;
        let half_extents = Vec3::new(length, height, width) * 0.5;
        let base = Vec3::from(config.base);
        let mesh_id = scene.mesh_id("prop_block");
        let mesh = MeshInstance::new(mesh_id, mesh_id);

        let mut tower = Self {
            blocks: Vec::with_capacity(layers as usize * BLOCKS_PER_LAYER),
            sound: config.sound.clone(),
        };

        for layer in 0..layers {
            let turned = layer % 2 == 1;
            let rotation = if turned {
                Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)
            } else {
                Quat::IDENTITY
            };
            // Blocks lie side by side across their width.
            let across = if turned { Vec3::X } else { Vec3::Z };
            let y = base.y + height * (layer as f32 + 0.5);

            for slot in 0..BLOCKS_PER_LAYER {
                let offset = (slot as f32 - 1.0) * width;
                let position = Vec3::new(base.x, y, base.z) + across * offset;

                let body = match physics.add_dynamic_body(DynamicBodyDesc {
                    rotation,
                    ..DynamicBodyDesc::at(position)
                }) {
                    Ok(body) => body,
                    Err(e) => {
                        tower.clear(physics, scene, registry);
                        return Err(e);
                    }
                };
                if let Err(e) = physics.add_box_collider(
                    body,
                    half_extents,
                    Vec3::ZERO,
                    CollisionGroup::Prop,
                    ColliderMaterial {
                        friction: 0.8,
                        restitution: 0.05,
                        ..ColliderMaterial::default()
                    },
                ) {
                    release_body(physics, body);
                    tower.clear(physics, scene, registry);
                    return Err(e);
                }

                let root = scene.spawn_root("prop_block", Transform::from_position_rotation(position, rotation));
                let part = scene.spawn_part(
                    root,
                    "prop_block",
                    Transform::default(),
                    mesh,
                    Aabb::from_center_half_extents(Vec3::ZERO, half_extents),
                    Appearance {
                        color: config.color,
                        emissive: [0.0; 3],
                    },
                );
                registry.link(body, root);
                registry.register_grabbable(part, body);
                tower.blocks.push(PropBlock {
                    tracked: TrackedBody::new(root, body, Vec3::ZERO),
                    mesh: part,
                });
            }
        }

        log::info!("built prop tower: {} layers, {} blocks", layers, tower.blocks.len());
        Ok(tower)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[PropBlock] {
        &self.blocks
    }

    pub fn contains_body(&self, body: RigidBodyHandle) -> bool {
        self.blocks.iter().any(|b| b.tracked.body == body)
    }

    pub fn reset_snapshot(&mut self, body: RigidBodyHandle, velocity: Vec3) -> bool {
        match self.blocks.iter_mut().find(|b| b.tracked.body == body) {
            Some(block) => {
                block.tracked.last_velocity = velocity;
                true
            }
            None => false,
        }
    }

    pub fn sync_poses(
        &mut self,
        physics: &PhysicsWorld,
        scene: &mut Scene,
        registry: &mut EntityRegistry,
    ) -> PhysicsResult<()> {
        let mut stale = Vec::new();
        for block in &self.blocks {
            guard(block.tracked.sync_pose(physics, scene), block.tracked.body, &mut stale)?;
        }
        self.drop_stale(scene, registry, &stale);
        Ok(())
    }

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
        for block in self.blocks.iter_mut() {
            let body = block.tracked.body;
            let result = cues
                .check_tracked(physics, &mut block.tracked, listener, Some(self.sound.as_str()))
                .map(|hit| fired += hit as usize);
            guard(result, body, &mut stale)?;
        }
        self.drop_stale(scene, registry, &stale);
        Ok(fired)
    }

    /// Remove every block from physics, scene and registry.
    pub fn clear(&mut self, physics: &mut PhysicsWorld, scene: &mut Scene, registry: &mut EntityRegistry) {
        for block in self.blocks.drain(..) {
            release_body(physics, block.tracked.body);
            scene.despawn_tree(block.tracked.root);
            registry.unregister_mesh(block.mesh);
            registry.unlink_body(block.tracked.body);
        }
    }

    fn drop_stale(&mut self, scene: &mut Scene, registry: &mut EntityRegistry, stale: &[RigidBodyHandle]) {
        if stale.is_empty() {
            return;
        }
        self.blocks.retain(|block| {
            if stale.contains(&block.tracked.body) {
                registry.unlink_body(block.tracked.body);
                scene.despawn_tree(block.tracked.root);
                false
            } else {
                true
            }
        });
    }
}
