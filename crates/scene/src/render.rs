//! Renderer-facing frame data and the backend contract.
//!
//! The simulation never talks to a GPU directly. Each frame it hands a
//! [`FrameView`] to whatever [`RenderBackend`] is plugged in.

use crate::{camera::Camera, scene::Scene};
use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use engine_core::{Appearance, MeshInstance};
use glam::{Mat4, Quat, Vec3};

/// Per-mesh instance data, laid out for direct upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DrawInstance {
    /// Model matrix (4x4, column-major)
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// rgb = emissive, w unused
    pub emissive: [f32; 4],
    pub mesh_id: u32,
    pub material_id: u32,
    _pad: [u32; 2],
}

impl DrawInstance {
    pub fn new(mesh: MeshInstance, model: Mat4, appearance: &Appearance) -> Self {
        let [r, g, b] = appearance.emissive;
        Self {
            model: model.to_cols_array_2d(),
            color: appearance.color,
            emissive: [r, g, b, 0.0],
            mesh_id: mesh.mesh_id,
            material_id: mesh.material_id,
            _pad: [0; 2],
        }
    }
}

/// Wireframe box for the collider overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugBox {
    pub center: Vec3,
    pub half_extents: Vec3,
    pub rotation: Quat,
}

/// Everything a backend needs to draw one frame.
pub struct FrameView<'a> {
    pub scene: &'a Scene,
    pub camera: &'a Camera,
    /// Empty unless the overlay is switched on.
    pub debug_boxes: &'a [DebugBox],
}

impl FrameView<'_> {
    pub fn instances(&self) -> Vec<DrawInstance> {
        self.scene.draw_list()
    }
}

/// Draws frames. Implemented by a windowed renderer or [`NullRenderer`].
pub trait RenderBackend {
    fn render(&mut self, frame: &FrameView) -> Result<()>;
}

/// Backend that draws nothing but keeps the numbers a real one would upload.
#[derive(Debug, Default)]
pub struct NullRenderer {
    pub frames: u64,
    pub last_instance_count: usize,
    pub last_upload_bytes: usize,
    pub last_debug_boxes: usize,
    /// Camera uniform a GPU backend would have written.
    pub last_view_projection: Mat4,
}

impl NullRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderBackend for NullRenderer {
    fn render(&mut self, frame: &FrameView) -> Result<()> {
        let instances = frame.instances();
        self.frames += 1;
        self.last_instance_count = instances.len();
        self.last_upload_bytes = bytemuck::cast_slice::<DrawInstance, u8>(&instances).len();
        self.last_debug_boxes = frame.debug_boxes.len();
        self.last_view_projection = frame.camera.view_projection_matrix();
        log::trace!(
            "frame {}: {} instances, {} debug boxes",
            self.frames,
            self.last_instance_count,
            self.last_debug_boxes
        );
        Ok(())
    }
}
