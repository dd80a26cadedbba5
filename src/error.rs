use thiserror::Error;

use crate::BodyId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    /// A body with this id is already live
    #[error("body {0} already exists")]
    DuplicateId(BodyId),

    /// No live body has this id
    #[error("body {0} not found")]
    NotFound(BodyId),

    /// A body or world was configured with nonsensical values
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Time steps must be finite and strictly positive
    #[error("invalid time step: {0}")]
    InvalidTimeStep(f32),
}

pub type Result<T> = std::result::Result<T, PhysicsError>;

pub(crate) fn invalid(msg: impl Into<String>) -> PhysicsError {
    PhysicsError::InvalidConfiguration(msg.into())
}
