//! glTF/GLB asset loader.
//!
//! Only the scene structure is needed here: node transforms, primitive bounds
//! (taken from the POSITION accessor's min/max, so vertex buffers are never
//! read), materials and animation clip lengths.

use crate::asset::{AnimationClip, AssetLoader, AssetPart, MaterialDesc, ParsedAsset};
use anyhow::{Context, Result};
use engine_core::{Aabb, Transform};
use glam::{Mat4, Vec3};
use std::collections::HashSet;
use std::path::PathBuf;

/// Loads `.gltf`/`.glb` files relative to a root directory.
#[derive(Debug, Clone)]
pub struct GltfLoader {
    root: PathBuf,
}

impl GltfLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetLoader for GltfLoader {
    fn load(&self, reference: &str) -> Result<ParsedAsset> {
        let path = self.root.join(reference);
        log::debug!("Loading glTF asset: {}", path.display());
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read asset {}", path.display()))?;
        parse_gltf(reference, &bytes)
    }
}

/// Parse glTF JSON or GLB bytes.
pub fn parse_gltf(reference: &str, bytes: &[u8]) -> Result<ParsedAsset> {
    let gltf = gltf::Gltf::from_slice(bytes)
        .with_context(|| format!("failed to parse glTF asset {reference}"))?;
    let document = &gltf.document;

    let mut asset = ParsedAsset::new(reference);
    match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => {
            for node in scene.nodes() {
                visit_node(&node, Mat4::IDENTITY, &mut asset.parts);
            }
        }
        None => {
            // No scene: treat every node that is nobody's child as a root.
            let children: HashSet<usize> = document
                .nodes()
                .flat_map(|n| n.children().map(|c| c.index()).collect::<Vec<_>>())
                .collect();
            for node in document.nodes().filter(|n| !children.contains(&n.index())) {
                visit_node(&node, Mat4::IDENTITY, &mut asset.parts);
            }
        }
    }

    for (index, animation) in document.animations().enumerate() {
        let duration = animation
            .channels()
            .filter_map(|channel| channel.sampler().input().max())
            .filter_map(|max| max.as_array().and_then(|a| a.first()).and_then(|v| v.as_f64()))
            .fold(0.0f64, f64::max) as f32;
        asset.animations.push(AnimationClip {
            name: animation
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("clip{index}")),
            duration,
        });
    }

    log::debug!(
        "Parsed {}: {} parts, {} clips",
        reference,
        asset.parts.len(),
        asset.animations.len()
    );
    Ok(asset)
}

fn visit_node(node: &gltf::Node, parent: Mat4, parts: &mut Vec<AssetPart>) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let base_name = mesh.name().or(node.name()).unwrap_or("mesh");
        for (i, primitive) in mesh.primitives().enumerate() {
            let Some(bounds) = primitive
                .get(&gltf::Semantic::Positions)
                .and_then(|accessor| accessor_bounds(&accessor))
            else {
                log::debug!("primitive {base_name}#{i} has no position bounds, skipped");
                continue;
            };
            parts.push(AssetPart {
                name: format!("{base_name}#{i}"),
                local: Transform::from_matrix(world),
                bounds,
                appearance: material_desc(&primitive.material()).resolve(),
            });
        }
    }

    for child in node.children() {
        visit_node(&child, world, parts);
    }
}

fn accessor_bounds(accessor: &gltf::Accessor) -> Option<Aabb> {
    let min = vec3_from_json(&accessor.min()?)?;
    let max = vec3_from_json(&accessor.max()?)?;
    Some(Aabb::new(min, max))
}

fn vec3_from_json(value: &serde_json::Value) -> Option<Vec3> {
    let values = value.as_array()?;
    let component = |i: usize| values.get(i).and_then(|v| v.as_f64()).map(|v| v as f32);
    Some(Vec3::new(component(0)?, component(1)?, component(2)?))
}

fn material_desc(material: &gltf::Material) -> MaterialDesc {
    if material.index().is_none() {
        return MaterialDesc::Default;
    }
    if material.unlit() {
        return MaterialDesc::Flat {
            color: material.pbr_metallic_roughness().base_color_factor(),
        };
    }
    MaterialDesc::Standard {
        base_color: material.pbr_metallic_roughness().base_color_factor(),
        emissive: material.emissive_factor(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRATE_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [ { "nodes": [0] } ],
        "nodes": [
            { "name": "crate", "mesh": 0, "translation": [0.0, 1.0, 0.0], "children": [1] },
            { "name": "lid", "mesh": 0, "translation": [0.0, 1.0, 0.0] }
        ],
        "meshes": [ { "name": "box", "primitives": [ { "attributes": { "POSITION": 0 }, "material": 0 } ] } ],
        "materials": [ { "pbrMetallicRoughness": { "baseColorFactor": [1.0, 0.5, 0.25, 1.0] }, "emissiveFactor": [0.1, 0.0, 0.0] } ],
        "accessors": [ { "componentType": 5126, "count": 8, "type": "VEC3", "min": [-0.5, -0.5, -0.5], "max": [0.5, 0.5, 0.5] } ]
    }"#;

    const UNLIT_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "extensionsUsed": ["KHR_materials_unlit"],
        "scene": 0,
        "scenes": [ { "nodes": [0] } ],
        "nodes": [ { "name": "sign", "mesh": 0 } ],
        "meshes": [ { "primitives": [ { "attributes": { "POSITION": 0 }, "material": 0 } ] } ],
        "materials": [ {
            "pbrMetallicRoughness": { "baseColorFactor": [0.2, 0.8, 0.2, 1.0] },
            "emissiveFactor": [1.0, 1.0, 1.0],
            "extensions": { "KHR_materials_unlit": {} }
        } ],
        "accessors": [ { "componentType": 5126, "count": 8, "type": "VEC3", "min": [-0.5, -0.5, -0.5], "max": [0.5, 0.5, 0.5] } ]
    }"#;

    const EMPTY_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "nodes": [ { "name": "empty" } ]
    }"#;

    #[test]
    fn parses_nested_parts_with_world_offsets() {
        let asset = parse_gltf("crate.gltf", CRATE_GLTF.as_bytes()).unwrap();
        assert_eq!(asset.parts.len(), 2);
        assert!((asset.parts[1].local.position.y - 2.0).abs() < 1e-5);
        assert_eq!(asset.parts[0].appearance.color, [1.0, 0.5, 0.25, 1.0]);
        assert_eq!(asset.parts[0].appearance.emissive, [0.1, 0.0, 0.0]);

        let bounds = asset.local_bounds().unwrap();
        assert!((bounds.min.y - 0.5).abs() < 1e-5);
        assert!((bounds.max.y - 2.5).abs() < 1e-5);
    }

    #[test]
    fn unlit_material_keeps_colour_only() {
        let asset = parse_gltf("sign.gltf", UNLIT_GLTF.as_bytes()).unwrap();
        assert_eq!(asset.parts.len(), 1);
        assert_eq!(asset.parts[0].appearance.color, [0.2, 0.8, 0.2, 1.0]);
        assert_eq!(asset.parts[0].appearance.emissive, [0.0; 3]);
    }

    #[test]
    fn asset_without_meshes_has_no_parts() {
        let asset = parse_gltf("empty.gltf", EMPTY_GLTF.as_bytes()).unwrap();
        assert!(asset.parts.is_empty());
        assert!(asset.local_bounds().is_none());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_gltf("bad.glb", b"not a gltf file").is_err());
    }

    #[test]
    fn loader_reads_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("crate.gltf"), CRATE_GLTF).unwrap();
        let loader = GltfLoader::new(dir.path());
        assert_eq!(loader.load("crate.gltf").unwrap().parts.len(), 2);
        assert!(loader.load("missing.gltf").is_err());
    }
}
