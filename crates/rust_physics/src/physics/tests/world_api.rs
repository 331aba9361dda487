use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use approx::assert_relative_eq;

use super::{record, run, world_with, zero_gravity_world, DT};
use crate::events::{EventHandler, EventType, PhysicsEvent};
use crate::foundation::math::{Transform, Vec3};
use crate::physics::{
    ColliderShape, CollisionLayers, ConstraintConfig, ConstraintKind, PhysicsError, PhysicsSettings,
    RigidBodyConfig, SimulationWarning, ValidationError,
};

#[test]
fn test_invalid_bodies_are_rejected() {
    let mut world = zero_gravity_world();

    let massless = world.add_body(RigidBodyConfig::dynamic(0.0), ColliderShape::sphere(1.0));
    assert!(matches!(
        massless,
        Err(PhysicsError::Validation(ValidationError::InvalidValue { .. }))
    ));

    let flat = world.add_body(RigidBodyConfig::dynamic(1.0), ColliderShape::sphere(-1.0));
    assert!(matches!(flat, Err(PhysicsError::Validation(_))));

    assert_eq!(world.body_count(), 0);
}

#[test]
fn test_invalid_settings_are_rejected() {
    let settings = PhysicsSettings { max_sub_steps: 0, ..PhysicsSettings::default() };
    assert!(matches!(crate::physics::PhysicsWorld::new(settings), Err(PhysicsError::Config(_))));
}

#[test]
fn test_unknown_handles() {
    let mut world = zero_gravity_world();
    let body = world
        .add_body(RigidBodyConfig::dynamic(1.0), ColliderShape::sphere(1.0))
        .expect("body");
    world.remove_body(body).expect("remove");

    assert!(matches!(
        world.apply_force(body, Vec3::x(), None),
        Err(PhysicsError::UnknownBody(h)) if h == body
    ));
    assert!(matches!(world.remove_body(body), Err(PhysicsError::UnknownBody(_))));
    assert!(world.body(body).is_none());
}

#[test]
fn test_invalid_time_step() {
    let mut world = zero_gravity_world();
    assert!(matches!(world.step(-1.0), Err(PhysicsError::InvalidTimeStep(_))));
    assert!(matches!(world.step(f32::NAN), Err(PhysicsError::InvalidTimeStep(_))));
    assert_eq!(world.step(0.0).expect("zero step"), 0);
}

#[test]
fn test_panicked_step_locks_world() {
    let mut world = zero_gravity_world();
    world.on(EventType::BodyAdded, |_| panic!("handler failure"));
    world.add_body(RigidBodyConfig::dynamic(1.0), ColliderShape::sphere(1.0)).expect("body");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| world.step(DT)));
    assert!(outcome.is_err());
    assert!(matches!(world.step(DT), Err(PhysicsError::Reentrant)));
}

#[test]
fn test_disposed_world_rejects_mutation() {
    let mut world = zero_gravity_world();
    let body = world
        .add_body(RigidBodyConfig::dynamic(1.0), ColliderShape::sphere(1.0))
        .expect("body");
    world.dispose();

    assert!(world.is_disposed());
    assert_eq!(world.body_count(), 0);
    assert!(matches!(world.step(DT), Err(PhysicsError::Disposed)));
    assert!(matches!(
        world.add_body(RigidBodyConfig::dynamic(1.0), ColliderShape::sphere(1.0)),
        Err(PhysicsError::Disposed)
    ));
    assert!(matches!(world.wake(body), Err(PhysicsError::Disposed)));
    assert!(matches!(world.set_gravity(Vec3::zeros()), Err(PhysicsError::Disposed)));
}

#[test]
fn test_removing_body_removes_its_constraints() {
    let mut world = zero_gravity_world();
    let a = world.add_body(RigidBodyConfig::dynamic(1.0), ColliderShape::sphere(0.5)).expect("a");
    let b = world
        .add_body(
            RigidBodyConfig::dynamic(1.0).with_position(Vec3::new(2.0, 0.0, 0.0)),
            ColliderShape::sphere(0.5),
        )
        .expect("b");
    let joint = world
        .add_constraint(ConstraintConfig::new(ConstraintKind::Ball, a, Some(b)))
        .expect("joint");
    let warnings = record(&mut world, EventType::Warning);
    let removed = record(&mut world, EventType::BodyRemoved);

    world.remove_body(b).expect("remove");
    assert_eq!(world.constraint_count(), 0);
    assert!(world.constraint(joint).is_none());
    assert!(matches!(world.remove_constraint(joint), Err(PhysicsError::UnknownConstraint(_))));

    world.step(DT).expect("step");
    assert_eq!(
        *warnings.borrow(),
        vec![PhysicsEvent::Warning(SimulationWarning::ConstraintUnsatisfiable {
            constraint: joint,
            body: b
        })]
    );
    assert_eq!(*removed.borrow(), vec![PhysicsEvent::BodyRemoved(b)]);
}

#[test]
fn test_constraint_validation_surfaces_as_error() {
    let mut world = zero_gravity_world();
    let a = world.add_body(RigidBodyConfig::dynamic(1.0), ColliderShape::sphere(0.5)).expect("a");
    let joint = world.add_constraint(ConstraintConfig::new(ConstraintKind::Ball, a, Some(a)));
    assert!(matches!(joint, Err(PhysicsError::Validation(ValidationError::SelfConstraint(_)))));
}

#[test]
fn test_disabled_constraint_is_not_solved() {
    let mut world = world_with(PhysicsSettings::default());
    let bob = world
        .add_body(
            RigidBodyConfig::dynamic(1.0).with_position(Vec3::new(0.0, -1.0, 0.0)),
            ColliderShape::sphere(0.25),
        )
        .expect("bob");
    let config = ConstraintConfig::new(ConstraintKind::Ball, bob, None)
        .with_pivots(Vec3::new(0.0, 1.0, 0.0), Vec3::zeros());
    let joint = world.add_constraint(config).expect("joint");

    world.set_constraint_enabled(joint, false).expect("disable");
    run(&mut world, 30);
    assert!(world.body(bob).expect("bob").position().y < -1.5);
    assert!(!world.constraint(joint).expect("joint").is_enabled());
}

#[test]
fn test_substeps_are_capped_and_leftover_interpolates() {
    let mut world = zero_gravity_world();
    assert_eq!(world.step(1.0).expect("step"), 10);
    let stats = *world.last_step_stats();
    assert_eq!(stats.substeps, 10);
    assert!((49..=50).contains(&stats.dropped_substeps));

    let mut world = zero_gravity_world();
    assert_eq!(world.step(DT * 0.5).expect("half step"), 0);
    assert_relative_eq!(world.interpolation_alpha(), 0.5, epsilon = 1e-4);
    assert_eq!(world.step(DT * 0.5).expect("second half"), 1);
}

#[test]
fn test_events_are_delivered_after_step() {
    let mut world = zero_gravity_world();
    let added = record(&mut world, EventType::BodyAdded);
    let body = world
        .add_body(RigidBodyConfig::dynamic(1.0), ColliderShape::sphere(1.0))
        .expect("body");
    assert!(added.borrow().is_empty());

    world.step(DT).expect("step");
    assert_eq!(*added.borrow(), vec![PhysicsEvent::BodyAdded(body)]);
    assert_eq!(world.events(), &[PhysicsEvent::BodyAdded(body)]);

    world.step(DT).expect("step");
    assert!(world.events().is_empty());
}

struct Swallow(Rc<RefCell<usize>>);

impl EventHandler for Swallow {
    fn on_event(&mut self, _event: &PhysicsEvent) -> bool {
        *self.0.borrow_mut() += 1;
        true
    }
}

#[test]
fn test_consuming_handler_stops_forwarding() {
    let mut world = zero_gravity_world();
    let swallowed = Rc::new(RefCell::new(0));
    world.register_handler(EventType::BodyAdded, Box::new(Swallow(Rc::clone(&swallowed))));
    let later = record(&mut world, EventType::BodyAdded);

    world.add_body(RigidBodyConfig::dynamic(1.0), ColliderShape::sphere(1.0)).expect("body");
    world.step(DT).expect("step");

    assert_eq!(*swallowed.borrow(), 1);
    assert!(later.borrow().is_empty());
    assert_eq!(world.events().len(), 1);
}

#[test]
fn test_kinematic_body_follows_its_velocity_only() {
    let mut world = world_with(PhysicsSettings::default());
    let platform = world
        .add_body(
            RigidBodyConfig::kinematic().with_linear_velocity(Vec3::new(1.0, 0.0, 0.0)),
            ColliderShape::cuboid(Vec3::new(1.0, 0.2, 1.0)),
        )
        .expect("platform");
    world.apply_force(platform, Vec3::new(0.0, 100.0, 0.0), None).expect("ignored force");

    run(&mut world, 60);
    let body = world.body(platform).expect("platform");
    assert_relative_eq!(body.position(), Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-3);
    assert!(!body.is_sleeping());
}

#[test]
fn test_explicit_setters_wake_and_teleport() {
    let mut world = world_with(PhysicsSettings::default());
    world.add_body(RigidBodyConfig::static_body(), ColliderShape::plane()).expect("ground");
    let ball = world
        .add_body(
            RigidBodyConfig::dynamic(1.0).with_position(Vec3::new(0.0, 1.0, 0.0)),
            ColliderShape::sphere(1.0),
        )
        .expect("ball");
    run(&mut world, 600);
    assert!(world.body(ball).expect("ball").is_sleeping());

    world.set_position(ball, Vec3::new(0.0, 10.0, 0.0)).expect("teleport");
    let body = world.body(ball).expect("ball");
    assert!(!body.is_sleeping());
    assert!(body.aabb().contains_point(Vec3::new(0.0, 10.0, 0.0)));

    world.set_linear_velocity(ball, Vec3::new(0.0, 5.0, 0.0)).expect("velocity");
    world.step(DT).expect("step");
    assert!(world.body(ball).expect("ball").position().y > 10.0);
}

#[test]
fn test_clear_keeps_world_usable() {
    let mut world = zero_gravity_world();
    world.add_body(RigidBodyConfig::dynamic(1.0), ColliderShape::sphere(1.0)).expect("body");
    world.clear().expect("clear");
    assert_eq!(world.body_count(), 0);
    world
        .add_body(RigidBodyConfig::dynamic(1.0), ColliderShape::sphere(1.0))
        .expect("body after clear");
    assert_eq!(world.step(DT).expect("step"), 1);
}

#[test]
fn test_point_query_finds_containing_body() {
    let mut world = zero_gravity_world();
    let ground = world
        .add_body(RigidBodyConfig::static_body(), ColliderShape::plane())
        .expect("ground");
    let crate_box = world
        .add_body(
            RigidBodyConfig::static_body()
                .with_position(Vec3::new(0.0, 3.0, 0.0))
                .with_layers(CollisionLayers::ENVIRONMENT, CollisionLayers::all()),
            ColliderShape::cuboid(Vec3::new(1.0, 1.0, 1.0)),
        )
        .expect("box");

    let inside = Vec3::new(0.5, 3.5, -0.5);
    assert_eq!(world.point_query(inside, CollisionLayers::all()), Some(crate_box));
    assert_eq!(world.point_query(inside, CollisionLayers::ACTOR), None);
    assert_eq!(world.point_query(Vec3::new(2.0, 3.0, 0.0), CollisionLayers::all()), None);
    assert_eq!(world.point_query(Vec3::new(7.0, -0.5, 7.0), CollisionLayers::all()), Some(ground));
    assert_eq!(world.point_query(Vec3::new(f32::NAN, 0.0, 0.0), CollisionLayers::all()), None);
}

#[test]
fn test_overlap_shape_lists_touching_bodies() {
    let mut world = zero_gravity_world();
    let near = world
        .add_body(RigidBodyConfig::dynamic(1.0), ColliderShape::sphere(1.0))
        .expect("near");
    let debris = world
        .add_body(
            RigidBodyConfig::dynamic(1.0)
                .with_position(Vec3::new(0.0, 0.0, 2.5))
                .with_layers(CollisionLayers::DEBRIS, CollisionLayers::all()),
            ColliderShape::cuboid(Vec3::new(0.5, 0.5, 0.5)),
        )
        .expect("debris");
    world
        .add_body(
            RigidBodyConfig::dynamic(1.0).with_position(Vec3::new(10.0, 0.0, 0.0)),
            ColliderShape::sphere(1.0),
        )
        .expect("far");

    let query = ColliderShape::sphere(1.5);
    let pose = Transform::from_position(Vec3::new(0.0, 0.0, 1.0));

    let mut found = world.overlap_shape(pose, &query, CollisionLayers::all()).expect("valid query");
    found.sort();
    let mut expected = vec![near, debris];
    expected.sort();
    assert_eq!(found, expected);

    let only_debris = world
        .overlap_shape(pose, &query, CollisionLayers::DEBRIS)
        .expect("valid query");
    assert_eq!(only_debris, vec![debris]);

    let invalid = world.overlap_shape(pose, &ColliderShape::sphere(-1.0), CollisionLayers::all());
    assert!(matches!(invalid, Err(PhysicsError::Validation(_))));
}
