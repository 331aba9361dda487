//! # Rust Physics
//!
//! A fixed-timestep rigid-body physics kernel.
//!
//! ## Features
//!
//! - **Collision Geometry**: boxes, spheres, capsules, cylinders, planes and meshes
//! - **Detection**: pluggable broad-phase plus per-shape-pair narrow-phase tests
//! - **Resolution**: sequential impulses with friction, restitution and joints
//! - **Queries**: nearest-hit and all-hits raycasts with layer masks
//! - **Events**: collision, sleep and lifecycle notifications
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rust_physics::prelude::*;
//!
//! fn main() -> Result<(), PhysicsError> {
//!     let mut world = PhysicsWorld::new(PhysicsSettings::default())?;
//!     world.add_body(RigidBodyConfig::static_body(), ColliderShape::plane())?;
//!     let ball = world.add_body(
//!         RigidBodyConfig::dynamic(1.0).with_position(Vec3::new(0.0, 5.0, 0.0)),
//!         ColliderShape::sphere(1.0),
//!     )?;
//!
//!     world.on(EventType::CollisionStart, |event| println!("{event:?}"));
//!     for _ in 0..120 {
//!         world.step(1.0 / 60.0)?;
//!     }
//!     println!("{:?}", world.body(ball).map(RigidBody::position));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod events;
pub mod foundation;
pub mod physics;
pub mod spatial;

/// Common imports for kernel users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, ConfigFormat},
        events::{CollisionEvent, EventHandler, EventType, PhysicsEvent},
        foundation::{
            collections::{BodyHandle, ConstraintHandle},
            math::{Quat, Transform, Vec3},
            time::StepStats,
        },
        physics::{
            BodyType, ColliderDesc, ColliderShape, CollisionLayers, CombineRule, ConstraintConfig,
            ConstraintKind, Contact, Material, PhysicsError, PhysicsResult, PhysicsSettings,
            PhysicsWorld, RaycastHit, RigidBody, RigidBodyConfig,
        },
        spatial::{BroadphaseStrategy, AABB},
    };
}
