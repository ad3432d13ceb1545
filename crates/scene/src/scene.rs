//! Render scene graph backed by a `hecs` world.
//!
//! Dynamic assets become a carrier node (root) plus one child node per mesh
//! part. The carrier's transform is what the physics sync writes; children
//! keep their local offsets.

use crate::asset::ParsedAsset;
use crate::render::DrawInstance;
use engine_core::{Aabb, Appearance, Children, LocalBounds, MeshInstance, Name, Parent, Transform};
use glam::{Mat4, Quat, Vec3};
use hecs::{Entity, World};
use std::collections::HashMap;

/// Nodes created for one asset instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub root: Entity,
    pub meshes: Vec<Entity>,
}

/// Closest mesh hit by a pick ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub node: Entity,
    pub distance: f32,
}

/// The render scene.
pub struct Scene {
    world: World,
    mesh_ids: HashMap<String, u32>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            mesh_ids: HashMap::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> u32 {
        self.world.len()
    }

    pub fn contains(&self, node: Entity) -> bool {
        self.world.contains(node)
    }

    /// Stable geometry id for a key. Instances of the same part share it.
    pub fn mesh_id(&mut self, key: &str) -> u32 {
        let next = self.mesh_ids.len() as u32;
        *self.mesh_ids.entry(key.to_string()).or_insert(next)
    }

    /// Create a carrier node with no geometry of its own.
    pub fn spawn_root(&mut self, name: &str, transform: Transform) -> Entity {
        self.world
            .spawn((transform, Children::default(), Name(name.to_string())))
    }

    /// Attach a mesh node under `root`.
    pub fn spawn_part(
        &mut self,
        root: Entity,
        name: &str,
        local: Transform,
        mesh: MeshInstance,
        bounds: Aabb,
        appearance: Appearance,
    ) -> Entity {
        let node = self.world.spawn((
            local,
            mesh,
            LocalBounds(bounds),
            appearance,
            Parent(root),
            Name(name.to_string()),
        ));
        if let Ok(mut children) = self.world.get::<&mut Children>(root) {
            children.0.push(node);
        }
        node
    }

    /// Instantiate fresh nodes for every part of a parsed asset.
    pub fn instantiate(&mut self, asset: &ParsedAsset, transform: Transform) -> Instance {
        let root = self.spawn_root(&asset.reference, transform);
        let meshes = asset
            .parts
            .iter()
            .enumerate()
            .map(|(index, part)| {
                let mesh_id = self.mesh_id(&format!("{}#{}", asset.reference, index));
                self.spawn_part(
                    root,
                    &part.name,
                    part.local,
                    MeshInstance::new(mesh_id, mesh_id),
                    part.bounds,
                    part.appearance,
                )
            })
            .collect();
        Instance { root, meshes }
    }

    /// Remove a node and all of its descendants. Returns how many nodes went away.
    pub fn despawn_tree(&mut self, node: Entity) -> usize {
        let children = self
            .world
            .get::<&Children>(node)
            .map(|c| c.0.clone())
            .unwrap_or_default();
        let mut removed = 0;
        for child in children {
            removed += self.despawn_tree(child);
        }
        if self.world.despawn(node).is_ok() {
            removed += 1;
        }
        removed
    }

    pub fn transform(&self, node: Entity) -> Option<Transform> {
        self.world.get::<&Transform>(node).ok().map(|t| *t)
    }

    /// Overwrite position and rotation, keeping scale.
    pub fn set_pose(&mut self, node: Entity, position: Vec3, rotation: Quat) -> bool {
        match self.world.get::<&mut Transform>(node) {
            Ok(mut transform) => {
                transform.position = position;
                transform.rotation = rotation;
                true
            }
            Err(_) => false,
        }
    }

    /// World matrix of a node, composing parent transforms.
    pub fn world_matrix(&self, node: Entity) -> Option<Mat4> {
        let local = self.transform(node)?.to_matrix();
        match self.world.get::<&Parent>(node).ok().map(|p| p.0) {
            Some(parent) => Some(self.world_matrix(parent)? * local),
            None => Some(local),
        }
    }

    pub fn emissive(&self, node: Entity) -> Option<[f32; 3]> {
        self.world.get::<&Appearance>(node).ok().map(|a| a.emissive)
    }

    pub fn set_emissive(&mut self, node: Entity, emissive: [f32; 3]) -> bool {
        match self.world.get::<&mut Appearance>(node) {
            Ok(mut appearance) => {
                appearance.emissive = emissive;
                true
            }
            Err(_) => false,
        }
    }

    /// Nearest candidate mesh whose bounds the ray enters within `max_distance`.
    ///
    /// The ray is tested against each mesh's local bounds in the mesh's own
    /// space, so rotated props pick by their oriented box.
    pub fn pick(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        candidates: impl IntoIterator<Item = Entity>,
    ) -> Option<PickHit> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return None;
        }

        let mut best: Option<PickHit> = None;
        for node in candidates {
            let Ok(bounds) = self.world.get::<&LocalBounds>(node).map(|b| b.0) else {
                continue;
            };
            let Some(matrix) = self.world_matrix(node) else {
                continue;
            };
            if matrix.determinant().abs() < 1e-12 {
                continue;
            }
            let inverse = matrix.inverse();
            let local_origin = inverse.transform_point3(origin);
            let local_direction = inverse.transform_vector3(direction);
            // Affine maps keep the ray parameter, so `t` is already a world distance.
            let Some(distance) = bounds.ray_intersection(local_origin, local_direction) else {
                continue;
            };
            if distance <= max_distance && best.map_or(true, |b| distance < b.distance) {
                best = Some(PickHit { node, distance });
            }
        }
        best
    }

    /// Flattened per-mesh draw data.
    pub fn draw_list(&self) -> Vec<DrawInstance> {
        let mut query = self.world.query::<(&MeshInstance, &Appearance)>();
        query
            .iter()
            .filter_map(|(node, (mesh, appearance))| {
                let model = self.world_matrix(node)?;
                Some(DrawInstance::new(*mesh, model, appearance))
            })
            .collect()
    }
}
