//! Core engine types and utilities for splatwalk.
//!
//! This crate provides the foundational types used across all simulation systems:
//! - Transform and bounding boxes
//! - Frame timing and the fixed-timestep stepper
//! - Scene-graph components for the ECS-backed render scene

pub mod bounds;
pub mod components;
pub mod time;
pub mod transform;

pub use bounds::*;
pub use components::*;
pub use time::*;
pub use transform::*;

// Re-export commonly used types
pub use glam::{EulerRot, Mat4, Quat, Vec2, Vec3, Vec4};
pub use hecs::{Entity, World};
