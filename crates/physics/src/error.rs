//! Errors raised by guarded physics accessors.

use rapier3d::prelude::RigidBodyHandle;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PhysicsError {
    /// The world was torn down; no further engine calls are issued.
    #[error("physics world has been torn down")]
    TornDown,
    /// The handle no longer refers to a live body.
    #[error("rigid body {0:?} is no longer in the physics world")]
    StaleBody(RigidBodyHandle),
}

pub type PhysicsResult<T> = Result<T, PhysicsError>;
