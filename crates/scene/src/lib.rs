//! Render scene for splatwalk: scene graph, camera, asset parsing and the
//! backend contract.

pub mod asset;
pub mod camera;
pub mod gltf_loader;
pub mod render;
pub mod scene;

pub use asset::*;
pub use camera::*;
pub use gltf_loader::*;
pub use render::*;
pub use scene::*;
