//! Joints between two bodies, or between a body and the world
//!
//! Every joint is solved at the velocity level with a Baumgarte bias that feeds
//! a fraction of the position error back each substep. A missing `body_b`
//! anchors the joint to the world: `pivot_b` is then a world-space point.

use std::f32::consts::PI;

use crate::foundation::collections::{BodyHandle, ConstraintHandle, HandleMap};
use crate::foundation::math::{utils, Mat3, Quat, Vec3};
use crate::physics::body::RigidBody;
use crate::physics::error::ValidationError;

/// Joint type and its parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstraintKind {
    /// No relative motion at all
    Fixed,
    /// Rotation about the axis only
    Hinge {
        /// Lowest allowed twist (radians) relative to the creation pose
        lower_limit: Option<f32>,
        /// Highest allowed twist (radians) relative to the creation pose
        upper_limit: Option<f32>,
    },
    /// Translation along the axis only
    Slider {
        /// Lowest allowed offset along the axis
        lower_limit: Option<f32>,
        /// Highest allowed offset along the axis
        upper_limit: Option<f32>,
    },
    /// Pivots held together, rotation free
    Ball,
    /// Soft spring between the pivots
    Spring {
        /// Force per unit of stretch
        stiffness: f32,
        /// Force per unit of separation speed
        damping: f32,
        /// Length at which the spring exerts no force
        rest_length: f32,
    },
    /// Pivot distance kept inside `[min_distance, max_distance]`
    Distance {
        /// Shortest allowed distance
        min_distance: f32,
        /// Longest allowed distance
        max_distance: f32,
    },
}

impl ConstraintKind {
    /// Hinge without limits
    pub fn hinge() -> Self {
        Self::Hinge { lower_limit: None, upper_limit: None }
    }

    /// Slider without limits
    pub fn slider() -> Self {
        Self::Slider { lower_limit: None, upper_limit: None }
    }

    /// Kinds that need `axis_a`
    pub fn needs_axis(&self) -> bool {
        matches!(self, Self::Hinge { .. } | Self::Slider { .. })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let limits = |field: &'static str, lower: Option<f32>, upper: Option<f32>| {
            if lower.into_iter().chain(upper).any(|l| !l.is_finite()) {
                return Err(ValidationError::invalid(field, "limits must be finite"));
            }
            if let (Some(lower), Some(upper)) = (lower, upper) {
                if lower > upper {
                    return Err(ValidationError::invalid(
                        field,
                        format!("lower limit {lower} exceeds upper limit {upper}"),
                    ));
                }
            }
            Ok(())
        };
        let non_negative = |field: &'static str, value: f32| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ValidationError::invalid(
                    field,
                    format!("must be finite and non-negative, got {value}"),
                ))
            }
        };

        match *self {
            Self::Fixed | Self::Ball => Ok(()),
            Self::Hinge {
                lower_limit,
                upper_limit,
            } => limits("hinge limits", lower_limit, upper_limit),
            Self::Slider {
                lower_limit,
                upper_limit,
            } => limits("slider limits", lower_limit, upper_limit),
            Self::Spring { stiffness, damping, rest_length } => {
                non_negative("stiffness", stiffness)?;
                non_negative("damping", damping)?;
                non_negative("rest_length", rest_length)
            }
            Self::Distance { min_distance, max_distance } => {
                non_negative("min_distance", min_distance)?;
                non_negative("max_distance", max_distance)?;
                if min_distance > max_distance {
                    return Err(ValidationError::invalid(
                        "min_distance",
                        format!("{min_distance} exceeds max_distance {max_distance}"),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Creation parameters for a joint
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintConfig {
    /// Joint type
    pub kind: ConstraintKind,
    /// First body
    pub body_a: BodyHandle,
    /// Second body; `None` anchors to the world
    pub body_b: Option<BodyHandle>,
    /// Anchor in `body_a` local space
    pub pivot_a: Vec3,
    /// Anchor in `body_b` local space, or a world point without `body_b`
    pub pivot_b: Vec3,
    /// Joint axis in `body_a` local space
    pub axis_a: Option<Vec3>,
    /// Joint axis in `body_b` local space; derived from `axis_a` when absent
    pub axis_b: Option<Vec3>,
}

impl ConstraintConfig {
    /// Joint of `kind` with both pivots at the body origins
    pub fn new(kind: ConstraintKind, body_a: BodyHandle, body_b: Option<BodyHandle>) -> Self {
        Self {
            kind,
            body_a,
            body_b,
            pivot_a: Vec3::zeros(),
            pivot_b: Vec3::zeros(),
            axis_a: None,
            axis_b: None,
        }
    }

    /// Set both pivots
    pub fn with_pivots(mut self, pivot_a: Vec3, pivot_b: Vec3) -> Self {
        self.pivot_a = pivot_a;
        self.pivot_b = pivot_b;
        self
    }

    /// Set `axis_a`
    pub fn with_axis(mut self, axis_a: Vec3) -> Self {
        self.axis_a = Some(axis_a);
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.body_b == Some(self.body_a) {
            return Err(ValidationError::SelfConstraint(self.body_a));
        }
        if !utils::is_finite(&self.pivot_a) || !utils::is_finite(&self.pivot_b) {
            return Err(ValidationError::invalid("pivot", "must be finite"));
        }
        for axis in self.axis_a.iter().chain(self.axis_b.iter()) {
            if axis.try_normalize(f32::EPSILON).is_none() || !utils::is_finite(axis) {
                return Err(ValidationError::invalid("axis", "must be finite and non-zero"));
            }
        }
        if self.kind.needs_axis() && self.axis_a.is_none() {
            return Err(ValidationError::invalid("axis_a", "hinge and slider joints need an axis"));
        }
        self.kind.validate()
    }
}

/// A live joint owned by the world
#[derive(Debug, Clone)]
pub struct Constraint {
    config: ConstraintConfig,
    enabled: bool,
    axis_a: Vec3,
    axis_b: Vec3,
    /// `qA⁻¹ qB` at creation
    reference_rotation: Quat,
    limit_impulse: f32,
}

impl Constraint {
    /// Validate `config` against the live bodies and capture the rest pose
    pub fn new(
        config: ConstraintConfig,
        bodies: &HandleMap<BodyHandle, RigidBody>,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        let a = bodies.get(config.body_a).ok_or(ValidationError::UnknownBody(config.body_a))?;
        let rotation_b = match config.body_b {
            Some(handle) => bodies
                .get(handle)
                .ok_or(ValidationError::UnknownBody(handle))?
                .rotation(),
            None => Quat::identity(),
        };

        let axis_a = config
            .axis_a
            .and_then(|axis| axis.try_normalize(f32::EPSILON))
            .unwrap_or_else(Vec3::y);
        let axis_b = config
            .axis_b
            .and_then(|axis| axis.try_normalize(f32::EPSILON))
            .unwrap_or_else(|| rotation_b.inverse_transform_vector(&(a.rotation() * axis_a)));

        Ok(Self {
            reference_rotation: a.rotation().inverse() * rotation_b,
            axis_a,
            axis_b,
            enabled: true,
            limit_impulse: 0.0,
            config,
        })
    }

    /// Creation parameters
    pub fn config(&self) -> &ConstraintConfig {
        &self.config
    }

    /// Joint type
    pub fn kind(&self) -> &ConstraintKind {
        &self.config.kind
    }

    /// First body
    pub fn body_a(&self) -> BodyHandle {
        self.config.body_a
    }

    /// Second body, if not anchored to the world
    pub fn body_b(&self) -> Option<BodyHandle> {
        self.config.body_b
    }

    /// Whether the joint references `body`
    pub fn involves(&self, body: BodyHandle) -> bool {
        self.config.body_a == body || self.config.body_b == Some(body)
    }

    /// Whether the joint is solved
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Twist of `body_b` relative to `body_a` about the joint axis, measured
    /// from the creation pose
    pub fn twist_angle(&self, bodies: &HandleMap<BodyHandle, RigidBody>) -> Option<f32> {
        let a = bodies.get(self.config.body_a)?;
        let rotation_b = match self.config.body_b {
            Some(handle) => bodies.get(handle)?.rotation(),
            None => Quat::identity(),
        };
        Some(twist(&a.rotation(), &rotation_b, &self.reference_rotation, &self.axis_a))
    }
}

fn twist(rotation_a: &Quat, rotation_b: &Quat, reference: &Quat, axis: &Vec3) -> f32 {
    let relative = rotation_a.inverse() * rotation_b * reference.inverse();
    let q = relative.quaternion();
    let mut angle = 2.0 * q.imag().dot(axis).atan2(q.w);
    if angle > PI {
        angle -= 2.0 * PI;
    } else if angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Velocity-level copy of one side of a joint
#[derive(Debug, Clone, Copy)]
struct JointBody {
    inverse_mass: f32,
    inverse_inertia: Mat3,
    position: Vec3,
    rotation: Quat,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
}

impl JointBody {
    /// Immovable anchor at the world origin
    fn world() -> Self {
        Self {
            inverse_mass: 0.0,
            inverse_inertia: Mat3::zeros(),
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
        }
    }

    fn of(body: &RigidBody) -> Self {
        let (inverse_mass, inverse_inertia) = if body.is_sleeping() {
            (0.0, Mat3::zeros())
        } else {
            (body.inverse_mass(), *body.inverse_inertia_world())
        };
        Self {
            inverse_mass,
            inverse_inertia,
            position: body.position(),
            rotation: body.rotation(),
            linear_velocity: body.linear_velocity(),
            angular_velocity: body.angular_velocity(),
        }
    }

    fn store(&self, body: &mut RigidBody) {
        body.linear_velocity = self.linear_velocity;
        body.angular_velocity = self.angular_velocity;
    }

    fn velocity_at(&self, arm: &Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(arm)
    }

    fn apply_impulse(&mut self, impulse: &Vec3, arm: &Vec3) {
        self.linear_velocity += impulse * self.inverse_mass;
        self.angular_velocity += self.inverse_inertia * arm.cross(impulse);
    }

    fn apply_angular_impulse(&mut self, impulse: &Vec3) {
        self.angular_velocity += self.inverse_inertia * impulse;
    }

    fn inverse_effective_mass(&self, arm: &Vec3, direction: &Vec3) -> f32 {
        let rxd = arm.cross(direction);
        self.inverse_mass + rxd.dot(&(self.inverse_inertia * rxd))
    }
}

/// World-space pivot data for one joint evaluation
struct Anchors {
    arm_a: Vec3,
    arm_b: Vec3,
    /// `pB - pA`
    separation: Vec3,
}

impl Anchors {
    fn new(config: &ConstraintConfig, a: &JointBody, b: &JointBody) -> Self {
        let arm_a = a.rotation * config.pivot_a;
        let arm_b = b.rotation * config.pivot_b;
        Self {
            separation: (b.position + arm_b) - (a.position + arm_a),
            arm_a,
            arm_b,
        }
    }

    fn relative_velocity(&self, a: &JointBody, b: &JointBody) -> Vec3 {
        b.velocity_at(&self.arm_b) - a.velocity_at(&self.arm_a)
    }

    fn inverse_mass_along(&self, a: &JointBody, b: &JointBody, direction: &Vec3) -> f32 {
        a.inverse_effective_mass(&self.arm_a, direction)
            + b.inverse_effective_mass(&self.arm_b, direction)
    }

    fn apply(&self, a: &mut JointBody, b: &mut JointBody, impulse: &Vec3) {
        a.apply_impulse(&-impulse, &self.arm_a);
        b.apply_impulse(impulse, &self.arm_b);
    }
}

/// Iterative solver for all joints in a world
#[derive(Debug, Clone, Copy)]
pub struct ConstraintSolver {
    bias_factor: f32,
}

impl ConstraintSolver {
    /// Solver feeding back `bias_factor` of the position error per substep
    pub fn new(bias_factor: f32) -> Self {
        Self { bias_factor }
    }

    /// Whether a joint is solved this substep
    pub fn is_active(constraint: &Constraint, bodies: &HandleMap<BodyHandle, RigidBody>) -> bool {
        if !constraint.enabled {
            return false;
        }
        let active_a = bodies.get(constraint.config.body_a).is_some_and(RigidBody::is_active);
        let active_b = constraint
            .config
            .body_b
            .and_then(|handle| bodies.get(handle))
            .is_some_and(RigidBody::is_active);
        active_a || active_b
    }

    /// Reset per-substep accumulators and apply spring impulses
    pub fn prepare(
        &self,
        constraints: &mut HandleMap<ConstraintHandle, Constraint>,
        bodies: &mut HandleMap<BodyHandle, RigidBody>,
        dt: f32,
    ) {
        for constraint in constraints.values_mut() {
            constraint.limit_impulse = 0.0;
            if let ConstraintKind::Spring {
                stiffness,
                damping,
                rest_length,
            } = constraint.config.kind
            {
                if Self::is_active(constraint, bodies) {
                    self.with_bodies(constraint, bodies, |config, a, b| {
                        apply_spring(config, a, b, stiffness, damping, rest_length, dt);
                    });
                }
            }
        }
    }

    /// One Gauss-Seidel pass over every active joint
    pub fn solve_velocities(
        &self,
        constraints: &mut HandleMap<ConstraintHandle, Constraint>,
        bodies: &mut HandleMap<BodyHandle, RigidBody>,
        dt: f32,
    ) {
        let beta = if dt > 0.0 { self.bias_factor / dt } else { 0.0 };
        for constraint in constraints.values_mut() {
            if !Self::is_active(constraint, bodies) {
                continue;
            }
            let axis_a = constraint.axis_a;
            let axis_b = constraint.axis_b;
            let reference = constraint.reference_rotation;
            let mut limit_impulse = constraint.limit_impulse;

            self.with_bodies(constraint, bodies, |config, a, b| match config.kind {
                ConstraintKind::Ball => solve_point(config, a, b, beta),
                ConstraintKind::Fixed => {
                    solve_point(config, a, b, beta);
                    solve_angular_lock(a, b, &reference, beta);
                }
                ConstraintKind::Hinge { lower_limit, upper_limit } => {
                    solve_point(config, a, b, beta);
                    solve_hinge_axis(a, b, &axis_a, &axis_b, beta);
                    let world_axis = a.rotation * axis_a;
                    let angle = twist(&a.rotation, &b.rotation, &reference, &axis_a);
                    let k = world_axis.dot(&((a.inverse_inertia + b.inverse_inertia) * world_axis));
                    let speed = world_axis.dot(&(b.angular_velocity - a.angular_velocity));
                    if let Some(lambda) = limit_lambda(
                        angle,
                        speed,
                        k,
                        lower_limit,
                        upper_limit,
                        beta,
                        &mut limit_impulse,
                    ) {
                        a.apply_angular_impulse(&(world_axis * -lambda));
                        b.apply_angular_impulse(&(world_axis * lambda));
                    }
                }
                ConstraintKind::Slider { lower_limit, upper_limit } => {
                    let world_axis = a.rotation * axis_a;
                    let anchors = Anchors::new(config, a, b);
                    let (t1, t2) = utils::orthonormal_basis(&world_axis);
                    for direction in [t1, t2] {
                        let error = anchors.separation.dot(&direction);
                        solve_linear_row(&anchors, a, b, &direction, error, beta);
                    }
                    solve_angular_lock(a, b, &reference, beta);

                    let anchors = Anchors::new(config, a, b);
                    let offset = anchors.separation.dot(&world_axis);
                    let k = anchors.inverse_mass_along(a, b, &world_axis);
                    let speed = anchors.relative_velocity(a, b).dot(&world_axis);
                    if let Some(lambda) = limit_lambda(
                        offset,
                        speed,
                        k,
                        lower_limit,
                        upper_limit,
                        beta,
                        &mut limit_impulse,
                    ) {
                        anchors.apply(a, b, &(world_axis * lambda));
                    }
                }
                ConstraintKind::Distance { min_distance, max_distance } => {
                    let anchors = Anchors::new(config, a, b);
                    let length = anchors.separation.norm();
                    let Some(direction) = anchors.separation.try_normalize(f32::EPSILON) else {
                        return;
                    };
                    let k = anchors.inverse_mass_along(a, b, &direction);
                    let speed = anchors.relative_velocity(a, b).dot(&direction);
                    if let Some(lambda) = limit_lambda(
                        length,
                        speed,
                        k,
                        Some(min_distance),
                        Some(max_distance),
                        beta,
                        &mut limit_impulse,
                    ) {
                        anchors.apply(a, b, &(direction * lambda));
                    }
                }
                // applied once per substep in prepare
                ConstraintKind::Spring { .. } => {}
            });
            constraint.limit_impulse = limit_impulse;
        }
    }

    /// Run `solve` on velocity copies of the joint's bodies and store the results
    fn with_bodies(
        &self,
        constraint: &Constraint,
        bodies: &mut HandleMap<BodyHandle, RigidBody>,
        solve: impl FnOnce(&ConstraintConfig, &mut JointBody, &mut JointBody),
    ) {
        let config = &constraint.config;
        match config.body_b {
            Some(handle_b) => {
                let Some([body_a, body_b]) = bodies.get_disjoint_mut([config.body_a, handle_b])
                else {
                    return;
                };
                let mut a = JointBody::of(body_a);
                let mut b = JointBody::of(body_b);
                solve(config, &mut a, &mut b);
                a.store(body_a);
                b.store(body_b);
            }
            None => {
                let Some(body_a) = bodies.get_mut(config.body_a) else {
                    return;
                };
                let mut a = JointBody::of(body_a);
                let mut world = JointBody::world();
                solve(config, &mut a, &mut world);
                a.store(body_a);
            }
        }
    }
}

/// Pivots coincide: full 3x3 block solve
fn solve_point(config: &ConstraintConfig, a: &mut JointBody, b: &mut JointBody, beta: f32) {
    let anchors = Anchors::new(config, a, b);
    let skew_a = utils::skew(&anchors.arm_a);
    let skew_b = utils::skew(&anchors.arm_b);
    let k = Mat3::identity() * (a.inverse_mass + b.inverse_mass)
        - skew_a * a.inverse_inertia * skew_a
        - skew_b * b.inverse_inertia * skew_b;
    let Some(k_inverse) = k.try_inverse() else {
        return;
    };
    let velocity_error = anchors.relative_velocity(a, b) + anchors.separation * beta;
    anchors.apply(a, b, &(k_inverse * -velocity_error));
}

/// Relative orientation held at its creation value
fn solve_angular_lock(a: &mut JointBody, b: &mut JointBody, reference: &Quat, beta: f32) {
    let k = a.inverse_inertia + b.inverse_inertia;
    let Some(k_inverse) = k.try_inverse() else {
        return;
    };
    // rotation carrying the target orientation of B onto its actual one
    let error_rotation = b.rotation * (a.rotation * reference).inverse();
    let q = error_rotation.quaternion();
    let sign = if q.w < 0.0 { -1.0 } else { 1.0 };
    let error = q.imag() * (2.0 * sign);

    let velocity_error = (b.angular_velocity - a.angular_velocity) + error * beta;
    let impulse = k_inverse * -velocity_error;
    a.apply_angular_impulse(&-impulse);
    b.apply_angular_impulse(&impulse);
}

/// Keep the bodies' hinge axes aligned: two angular rows perpendicular to the axis
fn solve_hinge_axis(a: &mut JointBody, b: &mut JointBody, axis_a: &Vec3, axis_b: &Vec3, beta: f32) {
    let world_a = a.rotation * axis_a;
    let world_b = b.rotation * axis_b;
    let misalignment = world_a.cross(&world_b);
    let (t1, t2) = utils::orthonormal_basis(&world_a);

    for direction in [t1, t2] {
        let k = direction.dot(&((a.inverse_inertia + b.inverse_inertia) * direction));
        if k <= f32::EPSILON {
            continue;
        }
        let speed = direction.dot(&(b.angular_velocity - a.angular_velocity));
        let lambda = -(speed + misalignment.dot(&direction) * beta) / k;
        a.apply_angular_impulse(&(direction * -lambda));
        b.apply_angular_impulse(&(direction * lambda));
    }
}

/// Zero the relative velocity along `direction`, correcting `error`
fn solve_linear_row(
    anchors: &Anchors,
    a: &mut JointBody,
    b: &mut JointBody,
    direction: &Vec3,
    error: f32,
    beta: f32,
) {
    let k = anchors.inverse_mass_along(a, b, direction);
    if k <= f32::EPSILON {
        return;
    }
    let speed = anchors.relative_velocity(a, b).dot(direction);
    let lambda = -(speed + error * beta) / k;
    anchors.apply(a, b, &(direction * lambda));
}

/// One-sided impulse for a coordinate that must stay within `[lower, upper]`
///
/// Returns the impulse increment to apply along the coordinate's positive
/// direction, or `None` when the coordinate is inside its range.
fn limit_lambda(
    value: f32,
    speed: f32,
    k: f32,
    lower: Option<f32>,
    upper: Option<f32>,
    beta: f32,
    accumulated: &mut f32,
) -> Option<f32> {
    if k <= f32::EPSILON {
        return None;
    }
    let (error, pushes_positive) = match (lower, upper) {
        (Some(lower), _) if value < lower => (value - lower, true),
        (_, Some(upper)) if value > upper => (value - upper, false),
        _ => return None,
    };
    let lambda = -(speed + error * beta) / k;
    let total = if pushes_positive {
        (*accumulated + lambda).max(0.0)
    } else {
        (*accumulated + lambda).min(0.0)
    };
    let delta = total - *accumulated;
    *accumulated = total;
    Some(delta)
}

fn apply_spring(
    config: &ConstraintConfig,
    a: &mut JointBody,
    b: &mut JointBody,
    stiffness: f32,
    damping: f32,
    rest_length: f32,
    dt: f32,
) {
    let anchors = Anchors::new(config, a, b);
    let length = anchors.separation.norm();
    let Some(direction) = anchors.separation.try_normalize(f32::EPSILON) else {
        return;
    };
    let speed = anchors.relative_velocity(a, b).dot(&direction);
    let force = stiffness * (length - rest_length) + damping * speed;
    // stretched springs pull A toward B and B toward A
    anchors.apply(a, b, &(direction * (-force * dt)));
}
