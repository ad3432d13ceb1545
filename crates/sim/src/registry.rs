//! Entity registry: which renderable a body drives, and which body a
//! grabbable mesh belongs to.

use hecs::Entity;
use physics::RigidBodyHandle;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct EntityRegistry {
    body_to_renderable: HashMap<RigidBodyHandle, Entity>,
    mesh_to_body: HashMap<Entity, RigidBodyHandle>,
    /// Insertion-ordered so picking is deterministic.
    grabbable: Vec<Entity>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `body` drives the carrier node `renderable`.
    pub fn link(&mut self, body: RigidBodyHandle, renderable: Entity) {
        if let Some(previous) = self.body_to_renderable.insert(body, renderable) {
            log::warn!("body {:?} relinked from {:?} to {:?}", body, previous, renderable);
        }
    }

    /// Make `mesh` pickable; picking it resolves to `body`.
    pub fn register_grabbable(&mut self, mesh: Entity, body: RigidBodyHandle) {
        self.mesh_to_body.insert(mesh, body);
        if !self.grabbable.contains(&mesh) {
            self.grabbable.push(mesh);
        }
    }

    pub fn renderable_for(&self, body: RigidBodyHandle) -> Option<Entity> {
        self.body_to_renderable.get(&body).copied()
    }

    pub fn body_for_mesh(&self, mesh: Entity) -> Option<RigidBodyHandle> {
        self.mesh_to_body.get(&mesh).copied()
    }

    pub fn grabbable_meshes(&self) -> &[Entity] {
        &self.grabbable
    }

    /// Drop one mesh from the grabbable list and the mesh→body map.
    pub fn unregister_mesh(&mut self, mesh: Entity) {
        self.mesh_to_body.remove(&mesh);
        self.grabbable.retain(|m| *m != mesh);
    }

    /// Remove every entry that mentions `body`. Returns its renderable.
    pub fn unlink_body(&mut self, body: RigidBodyHandle) -> Option<Entity> {
        let meshes: Vec<Entity> = self
            .mesh_to_body
            .iter()
            .filter(|(_, b)| **b == body)
            .map(|(m, _)| *m)
            .collect();
        for mesh in meshes {
            self.unregister_mesh(mesh);
        }
        self.body_to_renderable.remove(&body)
    }

    /// True if any map still points at `body`.
    pub fn references_body(&self, body: RigidBodyHandle) -> bool {
        self.body_to_renderable.contains_key(&body) || self.mesh_to_body.values().any(|b| *b == body)
    }

    pub fn linked_bodies(&self) -> usize {
        self.body_to_renderable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body_to_renderable.is_empty() && self.mesh_to_body.is_empty() && self.grabbable.is_empty()
    }
}
