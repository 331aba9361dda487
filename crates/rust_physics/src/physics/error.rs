//! Error taxonomy for the physics kernel
//!
//! Only [`PhysicsError`] is ever returned from world calls. Failures that happen
//! inside a step are reported as events carrying [`SimulationError`] or
//! [`SimulationWarning`] instead.

use crate::config::ConfigError;
use crate::foundation::collections::{BodyHandle, ConstraintHandle};

/// Malformed body, collider, constraint or settings data
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A field required by the shape variant is absent
    #[error("{shape} collider is missing required field `{field}`")]
    MissingField {
        /// Shape variant being built
        shape: &'static str,
        /// Name of the missing field
        field: &'static str,
    },

    /// A field is present but out of range
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Offending field
        field: &'static str,
        /// Human readable explanation
        reason: String,
    },

    /// A mesh index points past the vertex buffer
    #[error("mesh index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// Offending index
        index: u32,
        /// Number of vertices available
        vertex_count: usize,
    },

    /// A constraint references a body that does not exist
    #[error("constraint references unknown body {0:?}")]
    UnknownBody(BodyHandle),

    /// A constraint joins a body to itself
    #[error("constraint joins body {0:?} to itself")]
    SelfConstraint(BodyHandle),
}

impl ValidationError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors returned by [`PhysicsWorld`](crate::physics::PhysicsWorld) calls
#[derive(thiserror::Error, Debug)]
pub enum PhysicsError {
    /// Rejected input; nothing was added
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Settings could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `step` was entered while a previous call had not finished
    #[error("step() called while a step is already in progress")]
    Reentrant,

    /// The world was disposed
    #[error("physics world has been disposed")]
    Disposed,

    /// Handle does not refer to a live body
    #[error("unknown body {0:?}")]
    UnknownBody(BodyHandle),

    /// Handle does not refer to a live constraint
    #[error("unknown constraint {0:?}")]
    UnknownConstraint(ConstraintHandle),

    /// Negative or non-finite delta time
    #[error("invalid time step {0}")]
    InvalidTimeStep(f32),
}

/// Result alias for world calls
pub type PhysicsResult<T> = Result<T, PhysicsError>;

/// Per-body failure detected during a step, delivered as an `Error` event
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// Integration produced NaN or infinity; the body was frozen
    #[error("body {body:?} produced a non-finite {quantity}; body frozen")]
    NumericDegeneracy {
        /// Frozen body
        body: BodyHandle,
        /// Which quantity went bad
        quantity: &'static str,
    },
}

/// Recoverable condition delivered as a `Warning` event
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SimulationWarning {
    /// A constraint lost one of its bodies and was removed
    #[error("constraint {constraint:?} removed because body {body:?} was removed")]
    ConstraintUnsatisfiable {
        /// Removed constraint
        constraint: ConstraintHandle,
        /// Body whose removal invalidated it
        body: BodyHandle,
    },
}
