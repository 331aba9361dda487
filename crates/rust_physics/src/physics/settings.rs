//! World-wide simulation settings

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};
use crate::foundation::math::{utils, Vec3};
use crate::physics::contact_solver::ContactSolverSettings;
use crate::physics::material::CombineRule;
use crate::spatial::BroadphaseStrategy;

/// Tunables for a [`PhysicsWorld`](crate::physics::PhysicsWorld)
///
/// Missing fields take their defaults when loaded from a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    /// World gravity
    pub gravity: Vec3,
    /// Length of one substep in seconds
    pub fixed_time_step: f32,
    /// Most substeps run by one `step` call
    pub max_sub_steps: u32,
    /// Broad-phase algorithm
    pub broadphase: BroadphaseStrategy,
    /// Cell edge for the grid broad-phase
    pub grid_cell_size: f32,
    /// Gauss-Seidel passes per substep
    pub solver_iterations: u32,
    /// World-level switch for sleeping
    pub allow_sleep: bool,
    /// Linear and angular speed below which a body starts to doze
    pub sleep_threshold: f32,
    /// Seconds below the threshold before a body sleeps
    pub sleep_time: f32,
    /// Approach speed below which contacts do not bounce
    pub restitution_threshold: f32,
    /// Fraction of penetration removed per substep
    pub position_correction: f32,
    /// Penetration left uncorrected
    pub penetration_slop: f32,
    /// Baumgarte factor for joints
    pub constraint_bias: f32,
    /// Slop added to every AABB
    pub aabb_margin: f32,
    /// Rule for combining friction
    pub friction_combine: CombineRule,
    /// Rule for combining restitution
    pub restitution_combine: CombineRule,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            fixed_time_step: 1.0 / 60.0,
            max_sub_steps: 10,
            broadphase: BroadphaseStrategy::Naive,
            grid_cell_size: 4.0,
            solver_iterations: 10,
            allow_sleep: true,
            sleep_threshold: 0.1,
            sleep_time: 0.5,
            restitution_threshold: 0.5,
            position_correction: 0.8,
            penetration_slop: 0.01,
            constraint_bias: 0.2,
            aabb_margin: 0.01,
            friction_combine: CombineRule::GeometricMean,
            restitution_combine: CombineRule::GeometricMean,
        }
    }
}

impl PhysicsSettings {
    /// Set gravity
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the broad-phase algorithm
    pub fn with_broadphase(mut self, broadphase: BroadphaseStrategy) -> Self {
        self.broadphase = broadphase;
        self
    }

    /// Contact solver tuning derived from these settings
    pub fn contact_solver(&self) -> ContactSolverSettings {
        ContactSolverSettings {
            restitution_threshold: self.restitution_threshold,
            position_correction: self.position_correction,
            penetration_slop: self.penetration_slop,
            friction_combine: self.friction_combine,
            restitution_combine: self.restitution_combine,
        }
    }
}

impl Config for PhysicsSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid(message));

        if !utils::is_finite(&self.gravity) {
            return invalid(format!("gravity must be finite, got {:?}", self.gravity));
        }
        if !(self.fixed_time_step.is_finite() && self.fixed_time_step > 0.0) {
            return invalid(format!(
                "fixed_time_step must be positive, got {}",
                self.fixed_time_step
            ));
        }
        if self.max_sub_steps == 0 {
            return invalid("max_sub_steps must be at least 1".to_owned());
        }
        if self.solver_iterations == 0 {
            return invalid("solver_iterations must be at least 1".to_owned());
        }
        if !(self.grid_cell_size.is_finite() && self.grid_cell_size > 0.0) {
            return invalid(format!("grid_cell_size must be positive, got {}", self.grid_cell_size));
        }

        let non_negative = [
            ("sleep_threshold", self.sleep_threshold),
            ("sleep_time", self.sleep_time),
            ("restitution_threshold", self.restitution_threshold),
            ("penetration_slop", self.penetration_slop),
            ("aabb_margin", self.aabb_margin),
        ];
        if let Some((name, value)) = non_negative
            .iter()
            .find(|(_, v)| !(v.is_finite() && *v >= 0.0))
        {
            return invalid(format!("{name} must be non-negative, got {value}"));
        }

        let fractions = [
            ("position_correction", self.position_correction),
            ("constraint_bias", self.constraint_bias),
        ];
        if let Some((name, value)) = fractions.iter().find(|(_, v)| !(0.0..=1.0).contains(v)) {
            return invalid(format!("{name} must be within [0, 1], got {value}"));
        }
        Ok(())
    }
}
