//! Parsed mesh assets and the loader contract.
//!
//! An asset is parsed once into a flat list of mesh parts (local transform,
//! geometry bounds, resolved material). Every spawn instantiates fresh scene
//! nodes from that parse, so instances never share mutable state.

use anyhow::Result;
use engine_core::{Aabb, Appearance, Transform};

/// Material description as found in the source file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialDesc {
    /// Metallic-roughness material with an emissive term.
    Standard { base_color: [f32; 4], emissive: [f32; 3] },
    /// Plain colour, no lighting terms.
    Flat { color: [f32; 4] },
    /// Primitive without a material.
    Default,
}

impl MaterialDesc {
    /// Collapse into the fixed numeric form the simulation works with.
    pub fn resolve(&self) -> Appearance {
        match *self {
            MaterialDesc::Standard { base_color, emissive } => Appearance {
                color: base_color,
                emissive,
            },
            MaterialDesc::Flat { color } => Appearance {
                color,
                emissive: [0.0; 3],
            },
            MaterialDesc::Default => Appearance::default(),
        }
    }
}

/// One renderable primitive of an asset.
#[derive(Debug, Clone)]
pub struct AssetPart {
    pub name: String,
    /// Transform relative to the asset root.
    pub local: Transform,
    /// Geometry bounds in the part's own space.
    pub bounds: Aabb,
    pub appearance: Appearance,
}

/// Animation clip metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// Seconds.
    pub duration: f32,
}

/// A parsed asset, shared read-only between instances.
#[derive(Debug, Clone)]
pub struct ParsedAsset {
    pub reference: String,
    pub parts: Vec<AssetPart>,
    pub animations: Vec<AnimationClip>,
}

impl ParsedAsset {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            parts: Vec::new(),
            animations: Vec::new(),
        }
    }

    /// Bounds of all parts in root-local space, `None` when there is no geometry.
    pub fn local_bounds(&self) -> Option<Aabb> {
        self.parts
            .iter()
            .map(|part| part.bounds.transformed(&part.local.to_matrix()))
            .reduce(|a, b| a.union(&b))
    }
}

/// Loads assets by reference. Implementations run on a loader thread.
pub trait AssetLoader: Send + Sync {
    fn load(&self, reference: &str) -> Result<ParsedAsset>;
}
