//! Rigid bodies
//!
//! A [`RigidBody`] couples an immutable [`RigidBodyConfig`] and collider with
//! the mutable state the step pipeline advances: transform, velocities,
//! accumulated forces, derived bounds and sleep bookkeeping.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{utils, Mat3, Quat, Transform, Vec3};
use crate::physics::collision::ColliderShape;
use crate::physics::collision_layers::CollisionLayers;
use crate::physics::error::ValidationError;
use crate::physics::material::Material;
use crate::spatial::AABB;

/// How a body takes part in the simulation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyType {
    /// Moved by forces, gravity and contacts
    #[default]
    Dynamic,
    /// Never moves
    Static,
    /// Moved only by the velocity the caller sets; infinite mass
    Kinematic,
}

/// Creation parameters for a rigid body
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBodyConfig {
    /// Simulation role
    pub body_type: BodyType,
    /// Mass; ignored for static and kinematic bodies
    pub mass: f32,
    /// Surface response
    pub material: Material,
    /// Fraction of linear velocity removed per substep, in [0, 1]
    pub linear_damping: f32,
    /// Fraction of angular velocity removed per substep, in [0, 1]
    pub angular_damping: f32,
    /// Initial position
    pub position: Vec3,
    /// Initial orientation
    pub rotation: Quat,
    /// Initial linear velocity
    pub linear_velocity: Vec3,
    /// Initial angular velocity (radians per second)
    pub angular_velocity: Vec3,
    /// Whether the body may be put to sleep
    pub allow_sleep: bool,
    /// Report contacts but apply no impulses
    pub is_trigger: bool,
    /// Layers this body lives on
    pub collision_group: CollisionLayers,
    /// Layers this body collides with
    pub collision_mask: CollisionLayers,
    /// Lock orientation (infinite inertia)
    pub fixed_rotation: bool,
    /// Multiplier on world gravity
    pub gravity_scale: f32,
}

impl Default for RigidBodyConfig {
    fn default() -> Self {
        Self {
            body_type: BodyType::Dynamic,
            mass: 1.0,
            material: Material::default(),
            linear_damping: 0.01,
            angular_damping: 0.01,
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            allow_sleep: true,
            is_trigger: false,
            collision_group: CollisionLayers::DEFAULT,
            collision_mask: CollisionLayers::all(),
            fixed_rotation: false,
            gravity_scale: 1.0,
        }
    }
}

impl RigidBodyConfig {
    /// Dynamic body with the given mass
    pub fn dynamic(mass: f32) -> Self {
        Self {
            mass,
            ..Self::default()
        }
    }

    /// Static body
    pub fn static_body() -> Self {
        Self {
            body_type: BodyType::Static,
            mass: 0.0,
            ..Self::default()
        }
    }

    /// Kinematic body
    pub fn kinematic() -> Self {
        Self {
            body_type: BodyType::Kinematic,
            mass: 0.0,
            ..Self::default()
        }
    }

    /// Set the initial position
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Set the initial orientation
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the initial linear velocity
    pub fn with_linear_velocity(mut self, velocity: Vec3) -> Self {
        self.linear_velocity = velocity;
        self
    }

    /// Set the initial angular velocity
    pub fn with_angular_velocity(mut self, velocity: Vec3) -> Self {
        self.angular_velocity = velocity;
        self
    }

    /// Set the surface material
    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    /// Set both damping factors
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    /// Set group and mask
    pub fn with_layers(mut self, group: CollisionLayers, mask: CollisionLayers) -> Self {
        self.collision_group = group;
        self.collision_mask = mask;
        self
    }

    /// Mark as trigger volume
    pub fn as_trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }

    /// Check ranges and finiteness
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.body_type == BodyType::Dynamic && !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(ValidationError::invalid(
                "mass",
                format!("dynamic body mass must be finite and positive, got {}", self.mass),
            ));
        }
        for (field, damping) in [
            ("linear_damping", self.linear_damping),
            ("angular_damping", self.angular_damping),
        ] {
            if !(0.0..=1.0).contains(&damping) {
                return Err(ValidationError::invalid(
                    field,
                    format!("must be within [0, 1], got {damping}"),
                ));
            }
        }
        for (field, v) in [
            ("position", &self.position),
            ("linear_velocity", &self.linear_velocity),
            ("angular_velocity", &self.angular_velocity),
        ] {
            if !utils::is_finite(v) {
                return Err(ValidationError::invalid(field, "must be finite"));
            }
        }
        if !self.rotation.coords.iter().all(|c| c.is_finite()) {
            return Err(ValidationError::invalid("rotation", "must be finite"));
        }
        if !self.gravity_scale.is_finite() {
            return Err(ValidationError::invalid("gravity_scale", "must be finite"));
        }
        if !self.material.is_valid() {
            return Err(ValidationError::invalid(
                "material",
                "coefficients must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

/// Simulated rigid body
#[derive(Debug, Clone)]
pub struct RigidBody {
    config: RigidBodyConfig,
    collider: ColliderShape,

    pub(crate) position: Vec3,
    pub(crate) rotation: Quat,
    pub(crate) linear_velocity: Vec3,
    pub(crate) angular_velocity: Vec3,
    force: Vec3,
    torque: Vec3,

    aabb: AABB,
    inverse_mass: f32,
    inverse_inertia_local: Vec3,
    inverse_inertia_world: Mat3,

    sleeping: bool,
    sleep_timer: f32,
    last_valid: Transform,
}

impl RigidBody {
    /// Validate and build a body from its config and collider
    pub fn new(config: RigidBodyConfig, collider: ColliderShape) -> Result<Self, ValidationError> {
        config.validate()?;
        collider.validate()?;

        let (inverse_mass, inverse_inertia_local) = match config.body_type {
            BodyType::Dynamic => {
                let inertia = collider.inertia_diagonal(config.mass);
                let inverse_inertia = if config.fixed_rotation {
                    Vec3::zeros()
                } else {
                    inertia.map(|i| if i > 0.0 { 1.0 / i } else { 0.0 })
                };
                (1.0 / config.mass, inverse_inertia)
            }
            BodyType::Static | BodyType::Kinematic => (0.0, Vec3::zeros()),
        };

        let (linear_velocity, angular_velocity) = match config.body_type {
            BodyType::Static => (Vec3::zeros(), Vec3::zeros()),
            _ => (config.linear_velocity, config.angular_velocity),
        };

        let transform = Transform::new(config.position, config.rotation);
        let mut body = Self {
            position: config.position,
            rotation: config.rotation,
            linear_velocity,
            angular_velocity,
            force: Vec3::zeros(),
            torque: Vec3::zeros(),
            aabb: collider.compute_aabb(&transform),
            inverse_mass,
            inverse_inertia_local,
            inverse_inertia_world: Mat3::zeros(),
            sleeping: false,
            sleep_timer: 0.0,
            last_valid: transform,
            config,
            collider,
        };
        body.update_inertia_world();
        Ok(body)
    }

    /// Creation parameters
    pub fn config(&self) -> &RigidBodyConfig {
        &self.config
    }

    /// Collision geometry
    pub fn collider(&self) -> &ColliderShape {
        &self.collider
    }

    /// Surface material
    pub fn material(&self) -> &Material {
        &self.config.material
    }

    /// Simulation role
    pub fn body_type(&self) -> BodyType {
        self.config.body_type
    }

    /// Dynamic body
    pub fn is_dynamic(&self) -> bool {
        self.config.body_type == BodyType::Dynamic
    }

    /// Static body
    pub fn is_static(&self) -> bool {
        self.config.body_type == BodyType::Static
    }

    /// Kinematic body
    pub fn is_kinematic(&self) -> bool {
        self.config.body_type == BodyType::Kinematic
    }

    /// Awake and not static
    pub fn is_active(&self) -> bool {
        !self.sleeping && !self.is_static()
    }

    /// Trigger volume
    pub fn is_trigger(&self) -> bool {
        self.config.is_trigger
    }

    /// Layers this body lives on
    pub fn collision_group(&self) -> CollisionLayers {
        self.config.collision_group
    }

    /// Layers this body collides with
    pub fn collision_mask(&self) -> CollisionLayers {
        self.config.collision_mask
    }

    /// World position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// World orientation
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Position and orientation
    pub fn transform(&self) -> Transform {
        Transform::new(self.position, self.rotation)
    }

    /// Linear velocity
    pub fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    /// Angular velocity
    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    /// Bounds from the last AABB update
    pub fn aabb(&self) -> &AABB {
        &self.aabb
    }

    /// 1 / mass, zero for static and kinematic bodies
    pub fn inverse_mass(&self) -> f32 {
        self.inverse_mass
    }

    /// World-space inverse inertia tensor
    pub fn inverse_inertia_world(&self) -> &Mat3 {
        &self.inverse_inertia_world
    }

    /// Asleep
    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    /// Forces accumulated since the last substep
    pub fn accumulated_force(&self) -> Vec3 {
        self.force
    }

    /// Kinetic energy, linear plus angular
    pub fn kinetic_energy(&self) -> f32 {
        if self.inverse_mass == 0.0 {
            return 0.0;
        }
        let linear = 0.5 * self.linear_velocity.norm_squared() / self.inverse_mass;
        let angular = match self.inverse_inertia_world.try_inverse() {
            Some(inertia) => 0.5 * self.angular_velocity.dot(&(inertia * self.angular_velocity)),
            None => 0.0,
        };
        linear + angular
    }

    /// Velocity of a world-space point attached to the body
    pub fn velocity_at(&self, point: &Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(&(point - self.position))
    }

    pub(crate) fn update_inertia_world(&mut self) {
        let frame = (self.rotation * self.collider.rotation).to_rotation_matrix().into_inner();
        self.inverse_inertia_world =
            frame * Mat3::from_diagonal(&self.inverse_inertia_local) * frame.transpose();
    }

    pub(crate) fn update_aabb(&mut self, margin: f32, dt: f32) {
        self.aabb = self.collider.compute_aabb(&self.transform());
        self.aabb.expand(margin + self.linear_velocity.norm() * dt);
    }

    /// Accumulate a force, optionally at a world point (adds torque)
    pub(crate) fn apply_force(&mut self, force: Vec3, point: Option<Vec3>) {
        if !self.is_dynamic() {
            return;
        }
        self.force += force;
        if let Some(point) = point {
            self.torque += (point - self.position).cross(&force);
        }
    }

    pub(crate) fn apply_torque(&mut self, torque: Vec3) {
        if self.is_dynamic() {
            self.torque += torque;
        }
    }

    /// Instant velocity change, optionally at a world point
    pub(crate) fn apply_impulse(&mut self, impulse: Vec3, point: Option<Vec3>) {
        self.linear_velocity += impulse * self.inverse_mass;
        if let Some(point) = point {
            self.apply_angular_impulse((point - self.position).cross(&impulse));
        }
    }

    pub(crate) fn apply_angular_impulse(&mut self, impulse: Vec3) {
        self.angular_velocity += self.inverse_inertia_world * impulse;
    }

    pub(crate) fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.last_valid.position = position;
    }

    pub(crate) fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.last_valid.rotation = rotation;
        self.update_inertia_world();
    }

    pub(crate) fn set_linear_velocity(&mut self, velocity: Vec3) {
        if !self.is_static() {
            self.linear_velocity = velocity;
        }
    }

    pub(crate) fn set_angular_velocity(&mut self, velocity: Vec3) {
        if !self.is_static() && !self.config.fixed_rotation {
            self.angular_velocity = velocity;
        }
    }

    /// Gravity, accumulated forces, then damping; clears the accumulators
    pub(crate) fn integrate_velocities(&mut self, gravity: &Vec3, dt: f32) {
        if self.is_dynamic() && !self.sleeping {
            let acceleration = gravity * self.config.gravity_scale + self.force * self.inverse_mass;
            self.linear_velocity += acceleration * dt;
            self.angular_velocity += self.inverse_inertia_world * self.torque * dt;

            self.linear_velocity *= 1.0 - self.config.linear_damping;
            self.angular_velocity *= 1.0 - self.config.angular_damping;
        }
        self.force = Vec3::zeros();
        self.torque = Vec3::zeros();
    }

    /// Advance the transform by the current velocities
    pub(crate) fn integrate_positions(&mut self, dt: f32) {
        let moves = match self.config.body_type {
            BodyType::Dynamic => !self.sleeping,
            BodyType::Kinematic => true,
            BodyType::Static => false,
        };
        if !moves {
            return;
        }

        self.position += self.linear_velocity * dt;
        if !self.config.fixed_rotation && self.angular_velocity.norm_squared() > 0.0 {
            self.rotation = Quat::from_scaled_axis(self.angular_velocity * dt) * self.rotation;
            self.rotation.renormalize();
        }
        self.update_inertia_world();
    }

    /// Name of the first non-finite state quantity, if any
    pub(crate) fn non_finite_quantity(&self) -> Option<&'static str> {
        if !utils::is_finite(&self.linear_velocity) {
            Some("linear velocity")
        } else if !utils::is_finite(&self.angular_velocity) {
            Some("angular velocity")
        } else if !utils::is_finite(&self.position) {
            Some("position")
        } else if !self.rotation.coords.iter().all(|c| c.is_finite()) {
            Some("rotation")
        } else {
            None
        }
    }

    /// Remember the current transform as the last good one
    pub(crate) fn commit_transform(&mut self) {
        self.last_valid = self.transform();
    }

    /// Restore the last good transform, zero motion and force sleep
    pub(crate) fn freeze(&mut self) {
        self.position = self.last_valid.position;
        self.rotation = self.last_valid.rotation;
        self.linear_velocity = Vec3::zeros();
        self.angular_velocity = Vec3::zeros();
        self.force = Vec3::zeros();
        self.torque = Vec3::zeros();
        self.sleeping = true;
        self.sleep_timer = 0.0;
        self.update_inertia_world();
    }

    /// Accumulate time below the sleep threshold; returns true on falling asleep
    pub(crate) fn update_sleep(&mut self, threshold: f32, sleep_time: f32, dt: f32) -> bool {
        if !self.is_dynamic() || self.sleeping || !self.config.allow_sleep {
            return false;
        }
        if self.linear_velocity.norm() < threshold && self.angular_velocity.norm() < threshold {
            self.sleep_timer += dt;
            if self.sleep_timer >= sleep_time {
                self.sleep();
                return true;
            }
        } else {
            self.sleep_timer = 0.0;
        }
        false
    }

    pub(crate) fn sleep(&mut self) {
        self.sleeping = true;
        self.sleep_timer = 0.0;
        self.linear_velocity = Vec3::zeros();
        self.angular_velocity = Vec3::zeros();
    }

    /// Wake the body; returns true if it was asleep
    pub(crate) fn wake(&mut self) -> bool {
        self.sleep_timer = 0.0;
        std::mem::replace(&mut self.sleeping, false)
    }
}
