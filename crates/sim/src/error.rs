//! Simulation error types.

use physics::PhysicsError;
use thiserror::Error;

/// Fatal: the simulation could not be built. No partial simulation exists.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("physics world could not be set up: {0}")]
    Physics(#[from] PhysicsError),
    #[error("asset loader thread could not start: {0}")]
    Loader(#[from] std::io::Error),
}

/// A single spawn attempt was abandoned. Other entities are unaffected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpawnError {
    #[error("asset load failed: {0}")]
    Load(String),
    #[error("sound load failed: {0}")]
    Sound(String),
    #[error(transparent)]
    Physics(#[from] PhysicsError),
}
