//! Sequential-impulse contact resolution
//!
//! Contacts are prepared once per substep, then solved for a number of
//! Gauss-Seidel passes with accumulated impulses. Penetration left over after
//! the passes is removed by a linear positional correction.

use crate::foundation::collections::{BodyHandle, HandleMap};
use crate::foundation::math::{utils, Mat3, Vec3};
use crate::physics::body::RigidBody;
use crate::physics::detector::Contact;
use crate::physics::material::{CombineRule, CombinedMaterial};

/// Contacts produced for one body pair during a substep
#[derive(Debug, Clone, PartialEq)]
pub struct ContactManifold {
    /// First body; contact normals point away from it
    pub body_a: BodyHandle,
    /// Second body
    pub body_b: BodyHandle,
    /// Range of this pair's contacts in the shared contact buffer
    pub contacts: std::ops::Range<usize>,
    /// Either body is a trigger; no impulses are applied
    pub is_trigger: bool,
}

/// Tuning for [`ContactSolver`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactSolverSettings {
    /// Approach speed below which contacts do not bounce
    pub restitution_threshold: f32,
    /// Fraction of penetration removed per substep
    pub position_correction: f32,
    /// Penetration left uncorrected
    pub penetration_slop: f32,
    /// Rule for friction and rolling friction
    pub friction_combine: CombineRule,
    /// Rule for restitution
    pub restitution_combine: CombineRule,
}

/// Mass properties of one side of a contact as seen by the solver
///
/// Sleeping bodies take part with infinite mass.
#[derive(Debug, Clone, Copy)]
struct SolverBody {
    inverse_mass: f32,
    inverse_inertia: Mat3,
}

impl SolverBody {
    fn of(body: &RigidBody) -> Self {
        if body.is_sleeping() {
            Self {
                inverse_mass: 0.0,
                inverse_inertia: Mat3::zeros(),
            }
        } else {
            Self {
                inverse_mass: body.inverse_mass(),
                inverse_inertia: *body.inverse_inertia_world(),
            }
        }
    }

    fn apply(&self, body: &mut RigidBody, impulse: &Vec3, arm: &Vec3) {
        body.linear_velocity += impulse * self.inverse_mass;
        body.angular_velocity += self.inverse_inertia * arm.cross(impulse);
    }

    /// Inverse effective mass along `direction` at lever arm `arm`
    fn inverse_effective_mass(&self, arm: &Vec3, direction: &Vec3) -> f32 {
        let angular = (self.inverse_inertia * arm.cross(direction)).cross(arm);
        self.inverse_mass + direction.dot(&angular)
    }
}

fn inverse_or_zero(k: f32) -> f32 {
    if k > f32::EPSILON { 1.0 / k } else { 0.0 }
}

#[derive(Debug, Clone)]
struct ContactConstraint {
    body_a: BodyHandle,
    body_b: BodyHandle,
    solver_a: SolverBody,
    solver_b: SolverBody,
    contact_index: usize,

    normal: Vec3,
    tangents: [Vec3; 2],
    arm_a: Vec3,
    arm_b: Vec3,

    normal_mass: f32,
    tangent_mass: [f32; 2],
    rolling_axis: Option<Vec3>,
    rolling_mass: f32,
    velocity_bias: f32,
    material: CombinedMaterial,

    normal_impulse: f32,
    tangent_impulse: [f32; 2],
    rolling_impulse: f32,
}

/// Solver for non-penetration, friction and rolling resistance
#[derive(Debug, Default)]
pub struct ContactSolver {
    constraints: Vec<ContactConstraint>,
}

impl ContactSolver {
    /// Create an empty solver
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of contacts that will receive impulses
    pub fn active_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Build solver rows for every approaching, non-trigger contact
    pub fn prepare(
        &mut self,
        bodies: &HandleMap<BodyHandle, RigidBody>,
        manifolds: &[ContactManifold],
        contacts: &[Contact],
        settings: &ContactSolverSettings,
    ) {
        self.constraints.clear();

        for manifold in manifolds.iter().filter(|m| !m.is_trigger) {
            let (Some(a), Some(b)) = (bodies.get(manifold.body_a), bodies.get(manifold.body_b))
            else {
                continue;
            };
            let solver_a = SolverBody::of(a);
            let solver_b = SolverBody::of(b);
            let material = CombinedMaterial::new(
                a.material(),
                b.material(),
                settings.friction_combine,
                settings.restitution_combine,
            );

            for index in manifold.contacts.clone() {
                let contact = &contacts[index];
                let normal = contact.normal;
                let arm_a = contact.point - a.position();
                let arm_b = contact.point - b.position();

                let relative = b.velocity_at(&contact.point) - a.velocity_at(&contact.point);
                let normal_speed = relative.dot(&normal);
                if normal_speed > 0.0 {
                    // already separating
                    continue;
                }

                let normal_mass = inverse_or_zero(
                    solver_a.inverse_effective_mass(&arm_a, &normal)
                        + solver_b.inverse_effective_mass(&arm_b, &normal),
                );
                if normal_mass == 0.0 {
                    continue;
                }

                let (t1, t2) = utils::orthonormal_basis(&normal);
                let tangent_mass = [t1, t2].map(|t| {
                    inverse_or_zero(
                        solver_a.inverse_effective_mass(&arm_a, &t)
                            + solver_b.inverse_effective_mass(&arm_b, &t),
                    )
                });

                let relative_spin = b.angular_velocity() - a.angular_velocity();
                let rolling_axis = relative_spin.try_normalize(f32::EPSILON);
                let rolling_mass = rolling_axis.map_or(0.0, |axis| {
                    inverse_or_zero(
                        axis.dot(&(solver_a.inverse_inertia * axis))
                            + axis.dot(&(solver_b.inverse_inertia * axis)),
                    )
                });

                let velocity_bias = if -normal_speed > settings.restitution_threshold {
                    -material.restitution * normal_speed
                } else {
                    0.0
                };

                self.constraints.push(ContactConstraint {
                    body_a: manifold.body_a,
                    body_b: manifold.body_b,
                    solver_a,
                    solver_b,
                    contact_index: index,
                    normal,
                    tangents: [t1, t2],
                    arm_a,
                    arm_b,
                    normal_mass,
                    tangent_mass,
                    rolling_axis,
                    rolling_mass,
                    velocity_bias,
                    material,
                    normal_impulse: 0.0,
                    tangent_impulse: [0.0; 2],
                    rolling_impulse: 0.0,
                });
            }
        }
    }

    /// One Gauss-Seidel pass over every prepared contact
    pub fn solve_velocities(&mut self, bodies: &mut HandleMap<BodyHandle, RigidBody>) {
        for c in &mut self.constraints {
            let Some([a, b]) = bodies.get_disjoint_mut([c.body_a, c.body_b]) else {
                continue;
            };

            // normal
            let relative = relative_velocity(a, b, &c.arm_a, &c.arm_b);
            let lambda = (c.velocity_bias - relative.dot(&c.normal)) * c.normal_mass;
            let accumulated = (c.normal_impulse + lambda).max(0.0);
            let lambda = accumulated - c.normal_impulse;
            c.normal_impulse = accumulated;
            apply_pair(c, a, b, &(c.normal * lambda));

            // friction, bounded by the normal impulse
            let max_friction = c.material.friction * c.normal_impulse;
            for k in 0..2 {
                let tangent = c.tangents[k];
                let relative = relative_velocity(a, b, &c.arm_a, &c.arm_b);
                let lambda = -relative.dot(&tangent) * c.tangent_mass[k];
                let accumulated =
                    (c.tangent_impulse[k] + lambda).clamp(-max_friction, max_friction);
                let lambda = accumulated - c.tangent_impulse[k];
                c.tangent_impulse[k] = accumulated;
                apply_pair(c, a, b, &(tangent * lambda));
            }

            // rolling resistance
            if let Some(axis) = c.rolling_axis {
                let max_rolling = c.material.rolling_friction * c.normal_impulse;
                let spin = (b.angular_velocity - a.angular_velocity).dot(&axis);
                let lambda = -spin * c.rolling_mass;
                let accumulated = (c.rolling_impulse + lambda).clamp(-max_rolling, max_rolling);
                let lambda = accumulated - c.rolling_impulse;
                c.rolling_impulse = accumulated;
                let angular = axis * lambda;
                a.angular_velocity -= c.solver_a.inverse_inertia * angular;
                b.angular_velocity += c.solver_b.inverse_inertia * angular;
            }
        }
    }

    /// Copy the accumulated normal impulses back onto the contacts
    pub fn store_impulses(&self, contacts: &mut [Contact]) {
        for c in &self.constraints {
            if let Some(contact) = contacts.get_mut(c.contact_index) {
                contact.impulse = c.normal_impulse;
            }
        }
    }

    /// Push overlapping bodies apart by a fraction of their deepest penetration
    pub fn correct_positions(
        bodies: &mut HandleMap<BodyHandle, RigidBody>,
        manifolds: &[ContactManifold],
        contacts: &[Contact],
        settings: &ContactSolverSettings,
    ) {
        for manifold in manifolds.iter().filter(|m| !m.is_trigger) {
            let Some([a, b]) = bodies.get_disjoint_mut([manifold.body_a, manifold.body_b]) else {
                continue;
            };
            let inverse_a = SolverBody::of(a).inverse_mass;
            let inverse_b = SolverBody::of(b).inverse_mass;
            let total = inverse_a + inverse_b;
            if total <= 0.0 {
                continue;
            }

            // deepest point only, so multi-point manifolds are not over-corrected
            let Some(deepest) = contacts[manifold.contacts.clone()]
                .iter()
                .max_by(|x, y| x.penetration.total_cmp(&y.penetration))
            else {
                continue;
            };
            let depth = (deepest.penetration - settings.penetration_slop).max(0.0);
            if depth == 0.0 {
                continue;
            }
            let correction = deepest.normal * (settings.position_correction * depth / total);
            a.position -= correction * inverse_a;
            b.position += correction * inverse_b;
        }
    }
}

fn relative_velocity(a: &RigidBody, b: &RigidBody, arm_a: &Vec3, arm_b: &Vec3) -> Vec3 {
    (b.linear_velocity + b.angular_velocity.cross(arm_b))
        - (a.linear_velocity + a.angular_velocity.cross(arm_a))
}

fn apply_pair(c: &ContactConstraint, a: &mut RigidBody, b: &mut RigidBody, impulse: &Vec3) {
    c.solver_a.apply(a, &-impulse, &c.arm_a);
    c.solver_b.apply(b, impulse, &c.arm_b);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body::RigidBodyConfig;
    use crate::physics::collision::ColliderShape;
    use crate::physics::detector::CollisionDetector;
    use crate::physics::material::Material;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-4;

    fn settings() -> ContactSolverSettings {
        ContactSolverSettings {
            restitution_threshold: 0.5,
            position_correction: 0.8,
            penetration_slop: 0.01,
            friction_combine: CombineRule::GeometricMean,
            restitution_combine: CombineRule::GeometricMean,
        }
    }

    fn solve_pair(
        bodies: &mut HandleMap<BodyHandle, RigidBody>,
        a: BodyHandle,
        b: BodyHandle,
        iterations: usize,
    ) -> Vec<Contact> {
        let mut contacts =
            CollisionDetector::detect_collision(&bodies[a], &bodies[b]).expect("bodies overlap");
        let manifolds = [ContactManifold {
            body_a: a,
            body_b: b,
            contacts: 0..contacts.len(),
            is_trigger: false,
        }];
        let mut solver = ContactSolver::new();
        solver.prepare(bodies, &manifolds, &contacts, &settings());
        for _ in 0..iterations {
            solver.solve_velocities(bodies);
        }
        solver.store_impulses(&mut contacts);
        contacts
    }

    fn ball(position: Vec3, velocity: Vec3, material: Material) -> RigidBody {
        RigidBody::new(
            RigidBodyConfig::dynamic(1.0)
                .with_position(position)
                .with_linear_velocity(velocity)
                .with_material(material),
            ColliderShape::sphere(1.0),
        )
        .expect("valid body")
    }

    fn floor() -> RigidBody {
        RigidBody::new(RigidBodyConfig::static_body(), ColliderShape::plane()).expect("valid plane")
    }

    #[test]
    fn test_elastic_head_on_swaps_velocities() {
        let mut bodies = HandleMap::with_key();
        let elastic = Material::elastic();
        let a = bodies.insert(ball(Vec3::new(-0.95, 0.0, 0.0), Vec3::x() * 2.0, elastic));
        let b = bodies.insert(ball(Vec3::new(0.95, 0.0, 0.0), -Vec3::x() * 2.0, elastic));
        let before = bodies[a].kinetic_energy() + bodies[b].kinetic_energy();

        let contacts = solve_pair(&mut bodies, a, b, 10);

        assert_relative_eq!(bodies[a].linear_velocity(), -Vec3::x() * 2.0, epsilon = EPSILON);
        assert_relative_eq!(bodies[b].linear_velocity(), Vec3::x() * 2.0, epsilon = EPSILON);
        let after = bodies[a].kinetic_energy() + bodies[b].kinetic_energy();
        assert_relative_eq!(before, after, epsilon = EPSILON);
        assert_relative_eq!(contacts[0].impulse, 4.0, epsilon = EPSILON);
    }

    #[test]
    fn test_slow_contact_does_not_bounce() {
        let mut bodies = HandleMap::with_key();
        let floor = bodies.insert(floor());
        let bouncy = Material { restitution: 1.0, ..Material::default() };
        let ball = bodies.insert(ball(Vec3::new(0.0, 0.99, 0.0), -Vec3::y() * 0.3, bouncy));

        solve_pair(&mut bodies, ball, floor, 10);
        assert_relative_eq!(bodies[ball].linear_velocity().y, 0.0, epsilon = EPSILON);
        assert_eq!(bodies[floor].linear_velocity(), Vec3::zeros());
    }

    #[test]
    fn test_friction_is_bounded_by_normal_impulse() {
        let mut bodies = HandleMap::with_key();
        let floor = bodies.insert(floor());
        let sliding = Material {
            friction: 0.1,
            restitution: 0.0,
            rolling_friction: 0.0,
            ..Material::default()
        };
        let ball = bodies.insert(ball(Vec3::y() * 0.99, Vec3::new(5.0, -1.0, 0.0), sliding));

        let contacts = solve_pair(&mut bodies, ball, floor, 10);
        let velocity = bodies[ball].linear_velocity();
        assert_relative_eq!(velocity.y, 0.0, epsilon = EPSILON);
        // combined friction sqrt(0.1 * 0.5); the slide is slowed but not stopped
        assert!(velocity.x < 5.0 && velocity.x > 4.0);
        assert!(contacts[0].impulse > 0.0);
    }

    #[test]
    fn test_separating_contacts_are_skipped() {
        let mut bodies = HandleMap::with_key();
        let a = bodies.insert(ball(Vec3::new(-0.9, 0.0, 0.0), -Vec3::x(), Material::default()));
        let b = bodies.insert(ball(Vec3::new(0.9, 0.0, 0.0), Vec3::x(), Material::default()));

        solve_pair(&mut bodies, a, b, 4);
        assert_relative_eq!(bodies[a].linear_velocity(), -Vec3::x());
        assert_relative_eq!(bodies[b].linear_velocity(), Vec3::x());
    }

    #[test]
    fn test_position_correction_splits_by_inverse_mass() {
        let mut bodies = HandleMap::with_key();
        let floor = bodies.insert(floor());
        let ball = bodies.insert(ball(Vec3::y() * 0.5, Vec3::zeros(), Material::default()));

        let contacts =
            CollisionDetector::detect_collision(&bodies[ball], &bodies[floor]).expect("overlap");
        let manifolds = [ContactManifold {
            body_a: ball,
            body_b: floor,
            contacts: 0..1,
            is_trigger: false,
        }];
        ContactSolver::correct_positions(&mut bodies, &manifolds, &contacts, &settings());

        // 0.8 * (0.5 - 0.01) moved entirely onto the dynamic body
        assert_relative_eq!(bodies[ball].position().y, 0.5 + 0.8 * 0.49, epsilon = EPSILON);
        assert_eq!(bodies[floor].position(), Vec3::zeros());
    }
}
