//! Rigid-body dynamics
//!
//! Bodies, collision geometry, narrow-phase detection, contact and joint
//! solvers, and the [`PhysicsWorld`] that steps them.

pub mod body;
pub mod collision;
pub mod collision_layers;
pub mod constraint;
pub mod contact_solver;
pub mod detector;
pub mod error;
pub mod material;
pub mod settings;
pub mod world;

#[cfg(test)]
mod tests;

pub use body::{BodyType, RigidBody, RigidBodyConfig};
pub use collision::{
    BoundingSphere,
    ColliderDesc,
    ColliderShape,
    CollisionMesh,
    Ray,
    RaycastHit,
    ShapeKind,
    ShapeType,
    Triangle,
};
pub use collision_layers::CollisionLayers;
pub use constraint::{Constraint, ConstraintConfig, ConstraintKind};
pub use detector::{CollisionDetector, Contact};
pub use error::{PhysicsError, PhysicsResult, SimulationError, SimulationWarning, ValidationError};
pub use material::{CombineRule, Material};
pub use settings::PhysicsSettings;
pub use world::PhysicsWorld;
