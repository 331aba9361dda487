//! Collision geometry
//!
//! Shapes are stored in body space and transformed to world space only while a
//! test runs.
//!
//! # Module Organization
//!
//! - [`primitives`] - Rays, spheres and triangles with their intersection tests
//! - [`mesh`] - Triangle mesh and convex point-cloud geometry
//! - [`shape`] - Collider shapes attached to bodies, plus the loader-facing
//!   [`ColliderDesc`]

pub mod mesh;
pub mod primitives;
pub mod shape;

pub use mesh::CollisionMesh;
pub use primitives::{BoundingSphere, Ray, RaycastHit, ShapeHit, Triangle};
pub use shape::{ColliderDesc, ColliderShape, ShapeKind, ShapeType};
