//! Spatial partitioning and bounding volumes
//!
//! Provides the bounding boxes and broad-phase strategies used to cull body
//! pairs before the exact shape tests run.

pub mod aabb;
pub mod broadphase;

pub use aabb::AABB;
pub use broadphase::{
    BroadPhase, BroadphaseStrategy, GridBroadPhase, NaiveBroadPhase, SweepAndPrune,
};
