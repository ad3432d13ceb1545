//! Common ECS components used by the render scene graph.

use crate::Aabb;

/// Mesh reference component - links a scene node to shared geometry and base material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshInstance {
    pub mesh_id: u32,
    pub material_id: u32,
}

impl MeshInstance {
    pub fn new(mesh_id: u32, material_id: u32) -> Self {
        Self { mesh_id, material_id }
    }
}

impl Default for MeshInstance {
    fn default() -> Self {
        Self {
            mesh_id: 0,
            material_id: 0,
        }
    }
}

/// Per-node colour state. Highlighting only ever touches `emissive`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Appearance {
    pub color: [f32; 4],
    pub emissive: [f32; 3],
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            color: [0.8, 0.8, 0.8, 1.0],
            emissive: [0.0; 3],
        }
    }
}

/// Local-space bounds of a mesh node's geometry.
#[derive(Debug, Clone, Copy)]
pub struct LocalBounds(pub Aabb);

/// Parent link for nodes that are not direct children of the scene root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent(pub hecs::Entity);

/// Child nodes of a carrier/root node.
#[derive(Debug, Clone, Default)]
pub struct Children(pub Vec<hecs::Entity>);

/// Debug name of a node.
#[derive(Debug, Clone)]
pub struct Name(pub String);
