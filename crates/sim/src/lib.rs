//! Real-time physics and interaction loop for walking around a scanned scene:
//! player movement, grabbing and throwing props, pooled projectiles, impact
//! sounds and runtime-spawned assets.
//!
//! Build a [`Simulation`] with [`Simulation::new`], keep the returned
//! [`SimCommands`] for the host UI, and call [`Simulation::frame`] then
//! [`Simulation::render`] once per rendered frame.

pub mod animation;
pub mod commands;
pub mod config;
pub mod error;
pub mod grab;
pub mod hover;
pub mod impacts;
pub mod player;
pub mod projectiles;
pub mod props;
pub mod registry;
pub mod simulation;
pub mod spawner;
pub mod tracked;

pub use commands::{Command, SimCommands, SimEvent, SpawnId, SpawnRequest};
pub use config::SimConfig;
pub use error::{InitError, SpawnError};
pub use grab::{GrabController, GrabState, GrabTransition};
pub use hover::HoverDetector;
pub use player::{MoveIntent, PlayerController, PlayerState};
pub use registry::EntityRegistry;
pub use simulation::{FrameReport, SimContext, Simulation};
pub use spawner::{derive_collider, AssetSpawner, DerivedCollider, DynamicModel};
