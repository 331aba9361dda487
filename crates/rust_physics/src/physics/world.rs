//! Simulation world and fixed-step pipeline
//!
//! Each substep runs, in order: velocity integration, AABB refresh,
//! broad-phase, narrow-phase, contact and joint solving, positional
//! correction, position integration, sleep management and collision events.
//! Bodies that turn non-finite are frozen straight after either integration,
//! and the bounds are refreshed once more at the end so queries between steps
//! see the final poses. Events are queued while the step runs and delivered
//! when it returns.

use std::collections::BTreeSet;

use crate::config::Config;
use crate::events::{CollisionEvent, EventHandler, EventSystem, EventType, PhysicsEvent};
use crate::foundation::collections::{BodyHandle, BodyPair, ConstraintHandle, HandleMap};
use crate::foundation::logging::{debug, trace, warn};
use crate::foundation::math::{utils, Quat, Transform, Vec3};
use crate::foundation::time::{Stopwatch, StepStats};
use crate::physics::body::{RigidBody, RigidBodyConfig};
use crate::physics::collision::{ColliderShape, Ray, RaycastHit};
use crate::physics::collision_layers::CollisionLayers;
use crate::physics::constraint::{Constraint, ConstraintConfig, ConstraintSolver};
use crate::physics::contact_solver::{ContactManifold, ContactSolver};
use crate::physics::detector::{CollisionDetector, Contact};
use crate::physics::error::{PhysicsError, PhysicsResult, SimulationError, SimulationWarning};
use crate::physics::settings::PhysicsSettings;
use crate::spatial::broadphase::{self, BroadPhase};
use crate::spatial::AABB;

/// Fraction of a substep the accumulator may fall short and still run it
const ACCUMULATOR_TOLERANCE: f32 = 1.0e-4;

/// Owns every body and joint and advances them in fixed substeps
pub struct PhysicsWorld {
    settings: PhysicsSettings,
    bodies: HandleMap<BodyHandle, RigidBody>,
    constraints: HandleMap<ConstraintHandle, Constraint>,

    broadphase: Box<dyn BroadPhase>,
    contact_solver: ContactSolver,
    constraint_solver: ConstraintSolver,
    events: EventSystem,

    accumulator: f32,
    stepping: bool,
    disposed: bool,
    stats: StepStats,

    // per-substep scratch, reused
    handles: Vec<BodyHandle>,
    aabbs: Vec<AABB>,
    candidate_pairs: Vec<(usize, usize)>,
    contacts: Vec<Contact>,
    manifolds: Vec<ContactManifold>,
    current_pairs: BTreeSet<BodyPair>,
    previous_pairs: BTreeSet<BodyPair>,
}

impl PhysicsWorld {
    /// Empty world with validated settings
    pub fn new(settings: PhysicsSettings) -> PhysicsResult<Self> {
        settings.validate()?;
        Ok(Self::build(settings))
    }

    fn build(settings: PhysicsSettings) -> Self {
        Self {
            broadphase: broadphase::create(settings.broadphase, settings.grid_cell_size),
            constraint_solver: ConstraintSolver::new(settings.constraint_bias),
            contact_solver: ContactSolver::new(),
            events: EventSystem::new(),
            bodies: HandleMap::with_key(),
            constraints: HandleMap::with_key(),
            accumulator: 0.0,
            stepping: false,
            disposed: false,
            stats: StepStats::default(),
            handles: Vec::new(),
            aabbs: Vec::new(),
            candidate_pairs: Vec::new(),
            contacts: Vec::new(),
            manifolds: Vec::new(),
            current_pairs: BTreeSet::new(),
            previous_pairs: BTreeSet::new(),
            settings,
        }
    }

    /// Active settings
    pub fn settings(&self) -> &PhysicsSettings {
        &self.settings
    }

    /// Replace world gravity
    pub fn set_gravity(&mut self, gravity: Vec3) -> PhysicsResult<()> {
        self.ensure_live()?;
        self.settings.gravity = gravity;
        Ok(())
    }

    fn ensure_live(&self) -> PhysicsResult<()> {
        if self.disposed {
            Err(PhysicsError::Disposed)
        } else {
            Ok(())
        }
    }

    // ----------------------------------------------------------------------
    // Bodies
    // ----------------------------------------------------------------------

    /// Validate and add a body
    pub fn add_body(
        &mut self,
        config: RigidBodyConfig,
        collider: ColliderShape,
    ) -> PhysicsResult<BodyHandle> {
        self.ensure_live()?;
        let body = RigidBody::new(config, collider)?;
        let shape = body.collider().shape_type();
        let handle = self.bodies.insert(body);
        debug!("Added {:?} {} body {:?}", self.bodies[handle].body_type(), shape.name(), handle);
        self.events.send(PhysicsEvent::BodyAdded(handle));
        Ok(handle)
    }

    /// Remove a body together with every joint that references it
    ///
    /// Each removed joint is reported with a `Warning` event. Bodies that were
    /// touching the removed one are woken.
    pub fn remove_body(&mut self, handle: BodyHandle) -> PhysicsResult<RigidBody> {
        self.ensure_live()?;
        let body = self.bodies.remove(handle).ok_or(PhysicsError::UnknownBody(handle))?;

        let orphaned: Vec<ConstraintHandle> = self
            .constraints
            .iter()
            .filter(|(_, constraint)| constraint.involves(handle))
            .map(|(constraint, _)| constraint)
            .collect();
        for constraint in orphaned {
            self.constraints.remove(constraint);
            warn!("Constraint {constraint:?} removed with body {handle:?}");
            self.events.send(PhysicsEvent::Warning(SimulationWarning::ConstraintUnsatisfiable {
                constraint,
                body: handle,
            }));
        }

        let touching: Vec<BodyHandle> = self
            .current_pairs
            .iter()
            .filter(|pair| pair.contains(handle))
            .map(|pair| if pair.first == handle { pair.second } else { pair.first })
            .collect();
        self.current_pairs.retain(|pair| !pair.contains(handle));
        for other in touching {
            self.wake_body(other);
        }

        debug!("Removed body {handle:?}");
        self.events.send(PhysicsEvent::BodyRemoved(handle));
        Ok(body)
    }

    /// Body behind `handle`
    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    /// Every live body
    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &RigidBody)> {
        self.bodies.iter()
    }

    /// Number of live bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn wake_body(&mut self, handle: BodyHandle) {
        if let Some(body) = self.bodies.get_mut(handle) {
            if body.wake() {
                self.events.send(PhysicsEvent::Wake(handle));
            }
        }
    }

    /// Look up a body for an explicit mutation, waking it
    fn touch(&mut self, handle: BodyHandle) -> PhysicsResult<&mut RigidBody> {
        self.ensure_live()?;
        let body = self.bodies.get_mut(handle).ok_or(PhysicsError::UnknownBody(handle))?;
        if body.wake() {
            self.events.send(PhysicsEvent::Wake(handle));
        }
        Ok(body)
    }

    /// Wake a sleeping body
    pub fn wake(&mut self, handle: BodyHandle) -> PhysicsResult<()> {
        self.touch(handle).map(|_| ())
    }

    /// Accumulate a force for the next substep, optionally at a world point
    pub fn apply_force(
        &mut self,
        handle: BodyHandle,
        force: Vec3,
        point: Option<Vec3>,
    ) -> PhysicsResult<()> {
        self.touch(handle)?.apply_force(force, point);
        Ok(())
    }

    /// Change velocity instantly, optionally at a world point
    pub fn apply_impulse(
        &mut self,
        handle: BodyHandle,
        impulse: Vec3,
        point: Option<Vec3>,
    ) -> PhysicsResult<()> {
        self.touch(handle)?.apply_impulse(impulse, point);
        Ok(())
    }

    /// Accumulate a torque for the next substep
    pub fn apply_torque(&mut self, handle: BodyHandle, torque: Vec3) -> PhysicsResult<()> {
        self.touch(handle)?.apply_torque(torque);
        Ok(())
    }

    /// Teleport a body
    pub fn set_position(&mut self, handle: BodyHandle, position: Vec3) -> PhysicsResult<()> {
        let margin = self.settings.aabb_margin;
        let body = self.touch(handle)?;
        body.set_position(position);
        body.update_aabb(margin, 0.0);
        Ok(())
    }

    /// Reorient a body
    pub fn set_rotation(&mut self, handle: BodyHandle, rotation: Quat) -> PhysicsResult<()> {
        let margin = self.settings.aabb_margin;
        let body = self.touch(handle)?;
        body.set_rotation(rotation);
        body.update_aabb(margin, 0.0);
        Ok(())
    }

    /// Overwrite the linear velocity; ignored for static bodies
    pub fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec3) -> PhysicsResult<()> {
        self.touch(handle)?.set_linear_velocity(velocity);
        Ok(())
    }

    /// Overwrite the angular velocity; ignored for static and fixed-rotation bodies
    pub fn set_angular_velocity(
        &mut self,
        handle: BodyHandle,
        velocity: Vec3,
    ) -> PhysicsResult<()> {
        self.touch(handle)?.set_angular_velocity(velocity);
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Constraints
    // ----------------------------------------------------------------------

    /// Validate and add a joint
    pub fn add_constraint(&mut self, config: ConstraintConfig) -> PhysicsResult<ConstraintHandle> {
        self.ensure_live()?;
        let constraint = Constraint::new(config, &self.bodies)?;
        let (a, b) = (constraint.body_a(), constraint.body_b());
        let handle = self.constraints.insert(constraint);
        debug!("Added {:?} constraint {handle:?}", self.constraints[handle].kind());
        self.wake_body(a);
        if let Some(b) = b {
            self.wake_body(b);
        }
        Ok(handle)
    }

    /// Remove a joint
    pub fn remove_constraint(&mut self, handle: ConstraintHandle) -> PhysicsResult<Constraint> {
        self.ensure_live()?;
        self.constraints.remove(handle).ok_or(PhysicsError::UnknownConstraint(handle))
    }

    /// Turn a joint on or off without removing it
    pub fn set_constraint_enabled(
        &mut self,
        handle: ConstraintHandle,
        enabled: bool,
    ) -> PhysicsResult<()> {
        self.ensure_live()?;
        let constraint = self
            .constraints
            .get_mut(handle)
            .ok_or(PhysicsError::UnknownConstraint(handle))?;
        constraint.set_enabled(enabled);
        Ok(())
    }

    /// Joint behind `handle`
    pub fn constraint(&self, handle: ConstraintHandle) -> Option<&Constraint> {
        self.constraints.get(handle)
    }

    /// Number of live joints
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Hinge twist of a joint, see [`Constraint::twist_angle`]
    pub fn constraint_twist(&self, handle: ConstraintHandle) -> Option<f32> {
        self.constraints.get(handle)?.twist_angle(&self.bodies)
    }

    // ----------------------------------------------------------------------
    // Events
    // ----------------------------------------------------------------------

    /// Call `handler` for every event of `event_type`
    pub fn on(&mut self, event_type: EventType, handler: impl FnMut(&PhysicsEvent) + 'static) {
        self.events.on(event_type, handler);
    }

    /// Register a handler object; it may consume events to stop forwarding
    pub fn register_handler(&mut self, event_type: EventType, handler: Box<dyn EventHandler>) {
        self.events.register_handler(event_type, handler);
    }

    /// Events delivered by the most recent `step`
    pub fn events(&self) -> &[PhysicsEvent] {
        self.events.delivered()
    }

    // ----------------------------------------------------------------------
    // Queries
    // ----------------------------------------------------------------------

    /// Nearest body hit by the ray whose group intersects `mask`
    ///
    /// Zero or non-finite directions and negative distances yield `None`.
    pub fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: CollisionLayers,
    ) -> Option<RaycastHit> {
        let ray = Ray::new(origin, direction)?;
        if max_distance.is_nan() || max_distance < 0.0 {
            return None;
        }
        CollisionDetector::raycast(&ray, max_distance, self.bodies.iter(), mask)
    }

    /// Every body hit by the ray, nearest first
    pub fn raycast_all(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: CollisionLayers,
    ) -> Vec<RaycastHit> {
        match Ray::new(origin, direction) {
            Some(ray) if max_distance >= 0.0 => {
                CollisionDetector::raycast_all(&ray, max_distance, self.bodies.iter(), mask)
            }
            _ => Vec::new(),
        }
    }

    /// First body whose collider contains `point` and whose group intersects `mask`
    pub fn point_query(&self, point: Vec3, mask: CollisionLayers) -> Option<BodyHandle> {
        if !utils::is_finite(&point) {
            return None;
        }
        self.bodies
            .iter()
            .filter(|(_, body)| body.collision_group().intersects(mask))
            .filter(|(_, body)| body.aabb().contains_point(point))
            .find(|(_, body)| CollisionDetector::contains_point(body, &point))
            .map(|(handle, _)| handle)
    }

    /// Bodies a collider placed at `pose` would touch, filtered by `mask`
    ///
    /// The shape is validated like a body's collider. Pairs without a
    /// narrow-phase test never overlap.
    pub fn overlap_shape(
        &self,
        pose: Transform,
        shape: &ColliderShape,
        mask: CollisionLayers,
    ) -> PhysicsResult<Vec<BodyHandle>> {
        let config = RigidBodyConfig::kinematic()
            .with_position(pose.position)
            .with_rotation(pose.rotation);
        let query = RigidBody::new(config, shape.clone())?;

        let mut scratch = Vec::new();
        let overlapping = self
            .bodies
            .iter()
            .filter(|(_, body)| body.collision_group().intersects(mask))
            .filter(|(_, body)| {
                scratch.clear();
                CollisionDetector::detect_into(&query, body, &mut scratch)
            })
            .map(|(handle, _)| handle)
            .collect();
        Ok(overlapping)
    }

    /// Pairs touching after the last substep, including dormant ones
    pub fn touching_pairs(&self) -> impl Iterator<Item = &BodyPair> {
        self.current_pairs.iter()
    }

    /// Leftover accumulator as a fraction of one substep, for render interpolation
    pub fn interpolation_alpha(&self) -> f32 {
        (self.accumulator / self.settings.fixed_time_step).clamp(0.0, 1.0)
    }

    /// Counters from the most recent `step`
    pub fn last_step_stats(&self) -> &StepStats {
        &self.stats
    }

    // ----------------------------------------------------------------------
    // Lifecycle
    // ----------------------------------------------------------------------

    /// Remove every body, joint and pending event; handlers stay registered
    pub fn clear(&mut self) -> PhysicsResult<()> {
        self.ensure_live()?;
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.bodies.clear();
        self.constraints.clear();
        self.events.clear();
        self.current_pairs.clear();
        self.previous_pairs.clear();
        self.accumulator = 0.0;
        self.stats = StepStats::default();
    }

    /// Release everything; later mutating calls fail with `Disposed`
    pub fn dispose(&mut self) {
        if !self.disposed {
            self.reset();
            self.disposed = true;
            debug!("Physics world disposed");
        }
    }

    /// Whether `dispose` was called
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // ----------------------------------------------------------------------
    // Stepping
    // ----------------------------------------------------------------------

    /// Advance by `delta_time` seconds in whole fixed substeps
    ///
    /// Returns the number of substeps run. Time beyond `max_sub_steps`
    /// substeps is dropped. Queued events are delivered before returning.
    /// A step that panicked leaves the world locked: every later call fails
    /// with [`PhysicsError::Reentrant`].
    pub fn step(&mut self, delta_time: f32) -> PhysicsResult<u32> {
        self.ensure_live()?;
        if self.stepping {
            return Err(PhysicsError::Reentrant);
        }
        if !(delta_time.is_finite() && delta_time >= 0.0) {
            return Err(PhysicsError::InvalidTimeStep(delta_time));
        }
        self.stepping = true;
        let mut stopwatch = Stopwatch::start_new();

        let fixed = self.settings.fixed_time_step;
        let mut stats = StepStats::default();
        self.accumulator += delta_time;

        while self.accumulator >= fixed * (1.0 - ACCUMULATOR_TOLERANCE)
            && stats.substeps < self.settings.max_sub_steps
        {
            self.accumulator = (self.accumulator - fixed).max(0.0);
            self.substep(fixed, &mut stats);
            stats.substeps += 1;
        }

        if self.accumulator >= fixed {
            let dropped = (self.accumulator / fixed).floor();
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                stats.dropped_substeps = dropped as u32;
            }
            self.accumulator -= dropped * fixed;
            debug!(
                "Dropped {} substeps after reaching max_sub_steps = {}",
                stats.dropped_substeps, self.settings.max_sub_steps
            );
        }

        stats.duration = stopwatch.stop();
        self.stats = stats;
        self.events.dispatch();
        self.stepping = false;
        Ok(stats.substeps)
    }

    fn substep(&mut self, dt: f32, stats: &mut StepStats) {
        // 1. forces, gravity and damping
        let gravity = self.settings.gravity;
        for body in self.bodies.values_mut() {
            body.integrate_velocities(&gravity, dt);
        }
        // a blown-up velocity must not reach the broad-phase or the solvers
        self.freeze_degenerate_bodies();

        // 2. bounds
        self.handles.clear();
        self.aabbs.clear();
        for (handle, body) in &mut self.bodies {
            body.update_aabb(self.settings.aabb_margin, dt);
            self.handles.push(handle);
            self.aabbs.push(*body.aabb());
        }

        // 3-4. candidate pairs and contacts
        self.broadphase.find_pairs(&self.aabbs, &mut self.candidate_pairs);
        self.narrow_phase(stats);
        self.wake_touched_sleepers();

        // 5-6. impulses
        let solver_settings = self.settings.contact_solver();
        self.contact_solver
            .prepare(&self.bodies, &self.manifolds, &self.contacts, &solver_settings);
        self.constraint_solver.prepare(&mut self.constraints, &mut self.bodies, dt);
        for _ in 0..self.settings.solver_iterations {
            self.contact_solver.solve_velocities(&mut self.bodies);
            self.constraint_solver.solve_velocities(&mut self.constraints, &mut self.bodies, dt);
        }
        self.contact_solver.store_impulses(&mut self.contacts);

        // 7. push overlapping bodies apart
        ContactSolver::correct_positions(
            &mut self.bodies,
            &self.manifolds,
            &self.contacts,
            &solver_settings,
        );

        // 8. move
        for body in self.bodies.values_mut() {
            body.integrate_positions(dt);
        }
        self.freeze_degenerate_bodies();

        // 9. sleep
        if self.settings.allow_sleep {
            for (handle, body) in &mut self.bodies {
                if body.update_sleep(self.settings.sleep_threshold, self.settings.sleep_time, dt) {
                    trace!("Body {handle:?} fell asleep");
                    self.events.send(PhysicsEvent::Sleep(handle));
                }
            }
        }

        // 10. collision events
        self.emit_collision_events();

        // bounds for queries between steps
        for body in self.bodies.values_mut() {
            body.update_aabb(self.settings.aabb_margin, 0.0);
        }

        trace!(
            "Substep: {} bodies, {} manifolds, {} contacts, {} solved",
            self.bodies.len(),
            self.manifolds.len(),
            self.contacts.len(),
            self.contact_solver.active_constraints()
        );
    }

    fn narrow_phase(&mut self, stats: &mut StepStats) {
        self.contacts.clear();
        self.manifolds.clear();

        for &(i, j) in &self.candidate_pairs {
            let (handle_a, handle_b) = (self.handles[i], self.handles[j]);
            let (Some(a), Some(b)) = (self.bodies.get(handle_a), self.bodies.get(handle_b)) else {
                continue;
            };
            if !a.is_dynamic() && !b.is_dynamic() {
                continue;
            }
            if !a.is_active() && !b.is_active() {
                continue;
            }
            if !CollisionLayers::should_collide(
                a.collision_group(),
                a.collision_mask(),
                b.collision_group(),
                b.collision_mask(),
            ) {
                continue;
            }
            stats.candidate_pairs += 1;

            let start = self.contacts.len();
            if !CollisionDetector::detect_into(a, b, &mut self.contacts) {
                self.contacts.truncate(start);
                continue;
            }
            self.manifolds.push(ContactManifold {
                body_a: handle_a,
                body_b: handle_b,
                contacts: start..self.contacts.len(),
                is_trigger: a.is_trigger() || b.is_trigger(),
            });
        }
        stats.contacts += self.contacts.len();
    }

    /// Whether `body` is awake and moving fast enough to disturb a sleeper
    fn is_moving(body: &RigidBody, threshold: f32) -> bool {
        body.is_active()
            && (body.linear_velocity().norm() >= threshold
                || body.angular_velocity().norm() >= threshold)
    }

    fn wake_touched_sleepers(&mut self) {
        let threshold = self.settings.sleep_threshold;
        let mut to_wake = Vec::new();

        for manifold in self.manifolds.iter().filter(|m| !m.is_trigger) {
            let (Some(a), Some(b)) =
                (self.bodies.get(manifold.body_a), self.bodies.get(manifold.body_b))
            else {
                continue;
            };
            if a.is_sleeping() && Self::is_moving(b, threshold) {
                to_wake.push(manifold.body_a);
            }
            if b.is_sleeping() && Self::is_moving(a, threshold) {
                to_wake.push(manifold.body_b);
            }
        }

        for constraint in self.constraints.values().filter(|c| c.is_enabled()) {
            let Some(a) = self.bodies.get(constraint.body_a()) else {
                continue;
            };
            let Some(b) = constraint.body_b().and_then(|handle| self.bodies.get(handle)) else {
                continue;
            };
            if a.is_sleeping() && Self::is_moving(b, threshold) {
                to_wake.push(constraint.body_a());
            }
            if b.is_sleeping() && Self::is_moving(a, threshold) {
                to_wake.extend(constraint.body_b());
            }
        }

        for handle in to_wake {
            self.wake_body(handle);
        }
    }

    fn freeze_degenerate_bodies(&mut self) {
        for (handle, body) in &mut self.bodies {
            match body.non_finite_quantity() {
                Some(quantity) => {
                    body.freeze();
                    warn!("Body {handle:?} produced a non-finite {quantity}; frozen");
                    let error = SimulationError::NumericDegeneracy {
                        body: handle,
                        quantity,
                    };
                    self.events.send(PhysicsEvent::Error(error));
                }
                None => body.commit_transform(),
            }
        }
    }

    fn emit_collision_events(&mut self) {
        std::mem::swap(&mut self.previous_pairs, &mut self.current_pairs);
        self.current_pairs.clear();

        for manifold in &self.manifolds {
            let pair = BodyPair::new(manifold.body_a, manifold.body_b);
            if !self.current_pairs.insert(pair) {
                continue;
            }
            let event = CollisionEvent {
                body_a: manifold.body_a,
                body_b: manifold.body_b,
                contacts: self.contacts[manifold.contacts.clone()].to_vec(),
                is_trigger: manifold.is_trigger,
            };
            self.events.send(if self.previous_pairs.contains(&pair) {
                PhysicsEvent::CollisionStay(event)
            } else {
                PhysicsEvent::CollisionStart(event)
            });
        }

        for pair in &self.previous_pairs {
            if self.current_pairs.contains(pair) {
                continue;
            }
            let (a, b) = (self.bodies.get(pair.first), self.bodies.get(pair.second));
            if let (Some(a), Some(b)) = (a, b) {
                // both bodies asleep or static: the contact still holds, silently
                if !a.is_active() && !b.is_active() {
                    self.current_pairs.insert(*pair);
                    continue;
                }
            }
            self.events.send(PhysicsEvent::CollisionEnd(CollisionEvent {
                body_a: pair.first,
                body_b: pair.second,
                contacts: Vec::new(),
                is_trigger: a.is_some_and(RigidBody::is_trigger)
                    || b.is_some_and(RigidBody::is_trigger),
            }));
        }
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::build(PhysicsSettings::default())
    }
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("bodies", &self.bodies.len())
            .field("constraints", &self.constraints.len())
            .field("broadphase", &self.broadphase.strategy())
            .field("accumulator", &self.accumulator)
            .field("pending_events", &self.events.pending())
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}
