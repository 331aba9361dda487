use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;

use super::{record, run, world_with, zero_gravity_world, DT};
use crate::events::{EventType, PhysicsEvent};
use crate::physics::SimulationError;
use crate::foundation::collections::BodyHandle;
use crate::foundation::math::{Quat, Vec3};
use crate::physics::{
    ColliderShape, CollisionLayers, ConstraintConfig, ConstraintKind, Material, PhysicsSettings,
    PhysicsWorld, RigidBodyConfig,
};
use crate::spatial::BroadphaseStrategy;

fn bouncy() -> Material {
    Material { restitution: 0.5, ..Material::default() }
}

/// Sphere of radius 1 dropped from y = 5 onto a static ground plane
fn drop_scene(world: &mut PhysicsWorld) -> (BodyHandle, BodyHandle) {
    let ground = world
        .add_body(RigidBodyConfig::static_body().with_material(bouncy()), ColliderShape::plane())
        .expect("ground");
    let ball = world
        .add_body(
            RigidBodyConfig::dynamic(1.0)
                .with_position(Vec3::new(0.0, 5.0, 0.0))
                .with_material(bouncy()),
            ColliderShape::sphere(1.0),
        )
        .expect("ball");
    (ground, ball)
}

#[test]
fn test_sphere_comes_to_rest_on_plane_and_sleeps() {
    let mut world = world_with(PhysicsSettings::default().with_gravity(Vec3::new(0.0, -9.8, 0.0)));
    let (_, ball) = drop_scene(&mut world);
    let sleeps = record(&mut world, EventType::Sleep);

    run(&mut world, 600);

    let body = world.body(ball).expect("ball alive");
    assert_relative_eq!(body.position().y, 1.0, epsilon = 0.02);
    assert_relative_eq!(body.position().x, 0.0, epsilon = 1e-4);
    assert!(body.is_sleeping());
    assert_eq!(*sleeps.borrow(), vec![PhysicsEvent::Sleep(ball)]);
}

#[test]
fn test_sleeping_body_leaves_broadphase_until_woken() {
    let mut world = world_with(PhysicsSettings::default());
    let (ground, ball) = drop_scene(&mut world);
    run(&mut world, 600);
    assert!(world.body(ball).is_some_and(|b| b.is_sleeping()));

    // pair is dormant, not ended
    let ends = record(&mut world, EventType::CollisionEnd);
    run(&mut world, 30);
    assert_eq!(world.last_step_stats().candidate_pairs, 0);
    assert!(ends.borrow().is_empty());
    assert!(world.touching_pairs().any(|pair| pair.contains(ball) && pair.contains(ground)));

    let wakes = record(&mut world, EventType::Wake);
    world.wake(ball).expect("wake");
    world.step(DT).expect("step");
    assert_eq!(world.last_step_stats().candidate_pairs, 1);
    assert_eq!(*wakes.borrow(), vec![PhysicsEvent::Wake(ball)]);
}

#[test]
fn test_boxes_overlapping_along_x_separate_along_x() {
    let mut world = zero_gravity_world();
    let slick = Material {
        friction: 0.0,
        rolling_friction: 0.0,
        ..Material::default()
    };
    let a = world
        .add_body(
            RigidBodyConfig::dynamic(1.0).with_material(slick),
            ColliderShape::cuboid(Vec3::new(1.0, 1.0, 1.0)),
        )
        .expect("box a");
    let b = world
        .add_body(
            RigidBodyConfig::dynamic(1.0)
                .with_position(Vec3::new(1.5, 0.0, 0.0))
                .with_material(slick),
            ColliderShape::cuboid(Vec3::new(1.0, 1.0, 1.0)),
        )
        .expect("box b");
    let starts = record(&mut world, EventType::CollisionStart);

    world.step(DT).expect("step");

    let starts = starts.borrow();
    let collision = starts.first().and_then(PhysicsEvent::collision).expect("collision started");
    assert_eq!((collision.body_a, collision.body_b), (a, b));
    for contact in &collision.contacts {
        assert_relative_eq!(contact.normal, Vec3::x(), epsilon = 1e-5);
    }

    let (body_a, body_b) = (world.body(a).expect("a"), world.body(b).expect("b"));
    assert!(body_a.position().x < 0.0);
    assert!(body_b.position().x > 1.5);
    for body in [body_a, body_b] {
        assert_relative_eq!(body.position().y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(body.position().z, 0.0, epsilon = 1e-5);
        assert_relative_eq!(body.linear_velocity().y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(body.linear_velocity().z, 0.0, epsilon = 1e-5);
    }
}

#[test]
fn test_elastic_head_on_collision_conserves_energy() {
    let mut world = zero_gravity_world();
    let ball = |x: f32, vx: f32| {
        RigidBodyConfig::dynamic(1.0)
            .with_position(Vec3::new(x, 0.0, 0.0))
            .with_linear_velocity(Vec3::new(vx, 0.0, 0.0))
            .with_material(Material::elastic())
            .with_damping(0.0, 0.0)
    };
    let a = world.add_body(ball(-3.0, 2.0), ColliderShape::sphere(1.0)).expect("a");
    let b = world.add_body(ball(3.0, -2.0), ColliderShape::sphere(1.0)).expect("b");
    let energy = |world: &PhysicsWorld| {
        let kinetic = |handle| world.body(handle).map_or(0.0, |body| body.kinetic_energy());
        kinetic(a) + kinetic(b)
    };
    let before = energy(&world);

    run(&mut world, 120);

    assert_relative_eq!(energy(&world), before, epsilon = 1e-3);
    assert_relative_eq!(
        world.body(a).expect("a").linear_velocity(),
        Vec3::new(-2.0, 0.0, 0.0),
        epsilon = 1e-3
    );
    assert_relative_eq!(
        world.body(b).expect("b").linear_velocity(),
        Vec3::new(2.0, 0.0, 0.0),
        epsilon = 1e-3
    );
}

#[test]
fn test_static_bodies_never_move() {
    let mut world = world_with(PhysicsSettings::default());
    let wall = world
        .add_body(
            RigidBodyConfig::static_body().with_position(Vec3::new(0.0, 1.0, 0.0)),
            ColliderShape::cuboid(Vec3::new(2.0, 1.0, 2.0)),
        )
        .expect("wall");
    world
        .add_body(
            RigidBodyConfig::dynamic(5.0).with_position(Vec3::new(0.3, 4.0, 0.0)),
            ColliderShape::sphere(0.5),
        )
        .expect("ball");

    for _ in 0..120 {
        world.apply_force(wall, Vec3::new(100.0, 0.0, 0.0), None).expect("force");
        world
            .apply_impulse(wall, Vec3::new(0.0, 50.0, 0.0), Some(Vec3::new(1.0, 1.0, 0.0)))
            .expect("impulse");
        world.apply_torque(wall, Vec3::new(0.0, 10.0, 0.0)).expect("torque");
        world.step(DT).expect("step");
    }

    let wall = world.body(wall).expect("wall");
    assert_eq!(wall.position(), Vec3::new(0.0, 1.0, 0.0));
    assert_eq!(wall.rotation(), Quat::identity());
    assert_eq!(wall.linear_velocity(), Vec3::zeros());
    assert_eq!(wall.angular_velocity(), Vec3::zeros());
}

#[test]
fn test_raycast_against_axis_aligned_box() {
    let mut world = zero_gravity_world();
    let target = world
        .add_body(
            RigidBodyConfig::static_body().with_position(Vec3::new(0.0, 0.0, 5.0)),
            ColliderShape::cuboid(Vec3::new(1.0, 1.0, 1.0)),
        )
        .expect("box");

    let hit = world
        .raycast(Vec3::zeros(), Vec3::new(0.0, 0.0, 2.0), 100.0, CollisionLayers::all())
        .expect("hit");
    assert_eq!(hit.body, target);
    assert_relative_eq!(hit.distance, 4.0, epsilon = 1e-5);
    assert_relative_eq!(hit.point, Vec3::new(0.0, 0.0, 4.0), epsilon = 1e-5);
    assert_relative_eq!(hit.normal, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-5);

    assert!(world.raycast(Vec3::zeros(), Vec3::z(), 3.0, CollisionLayers::all()).is_none());
    assert!(world.raycast(Vec3::zeros(), Vec3::z(), 100.0, CollisionLayers::PROJECTILE).is_none());
    assert!(world.raycast(Vec3::zeros(), Vec3::zeros(), 100.0, CollisionLayers::all()).is_none());
}

#[test]
fn test_raycast_all_orders_hits() {
    let mut world = zero_gravity_world();
    let near = world
        .add_body(
            RigidBodyConfig::static_body().with_position(Vec3::new(3.0, 0.0, 0.0)),
            ColliderShape::sphere(1.0),
        )
        .expect("near");
    let far = world
        .add_body(
            RigidBodyConfig::static_body().with_position(Vec3::new(8.0, 0.0, 0.0)),
            ColliderShape::sphere(1.0),
        )
        .expect("far");

    let hits = world.raycast_all(Vec3::zeros(), Vec3::x(), 20.0, CollisionLayers::all());
    let order: Vec<_> = hits.iter().map(|hit| hit.body).collect();
    assert_eq!(order, vec![near, far]);
    assert_relative_eq!(hits[0].distance, 2.0, epsilon = 1e-5);
    assert_relative_eq!(hits[1].distance, 7.0, epsilon = 1e-5);
}

#[test]
fn test_broadphase_strategies_simulate_identically() {
    let simulate = |strategy: BroadphaseStrategy| {
        let mut world = world_with(PhysicsSettings::default().with_broadphase(strategy));
        world.add_body(RigidBodyConfig::static_body(), ColliderShape::plane()).expect("ground");
        let mut handles = Vec::new();
        for i in 0..4_u8 {
            for j in 0..4_u8 {
                let position = Vec3::new(
                    f32::from(i) * 1.1,
                    1.0 + f32::from(i + j) * 0.6,
                    f32::from(j) * 1.1,
                );
                let shape = if (i + j) % 2 == 0 {
                    ColliderShape::sphere(0.5)
                } else {
                    ColliderShape::cuboid(Vec3::new(0.5, 0.5, 0.5))
                };
                let config = RigidBodyConfig::dynamic(1.0).with_position(position);
                handles.push(world.add_body(config, shape).expect("body"));
            }
        }
        run(&mut world, 90);
        handles
            .iter()
            .filter_map(|&handle| world.body(handle).map(|body| (body.position(), body.rotation())))
            .collect::<Vec<_>>()
    };

    let naive = simulate(BroadphaseStrategy::Naive);
    assert_eq!(naive.len(), 16);
    assert_eq!(simulate(BroadphaseStrategy::SweepAndPrune), naive);
    assert_eq!(simulate(BroadphaseStrategy::Grid), naive);
}

#[test]
fn test_trigger_reports_without_impulses() {
    let mut world = zero_gravity_world();
    let sensor = world
        .add_body(
            RigidBodyConfig::static_body().as_trigger(),
            ColliderShape::cuboid(Vec3::new(2.0, 2.0, 2.0)),
        )
        .expect("sensor");
    let ball = world
        .add_body(
            RigidBodyConfig::dynamic(1.0)
                .with_position(Vec3::new(-2.5, 0.0, 0.0))
                .with_linear_velocity(Vec3::new(3.0, 0.0, 0.0))
                .with_damping(0.0, 0.0),
            ColliderShape::sphere(1.0),
        )
        .expect("ball");
    let starts = record(&mut world, EventType::CollisionStart);

    run(&mut world, 30);

    assert_relative_eq!(
        world.body(ball).expect("ball").linear_velocity(),
        Vec3::new(3.0, 0.0, 0.0),
        epsilon = 1e-5
    );
    let starts = starts.borrow();
    let collision = starts.first().and_then(PhysicsEvent::collision).expect("entered sensor");
    assert!(collision.is_trigger);
    assert!(collision.body_a == sensor || collision.body_b == sensor);
}

#[test]
fn test_pendulum_keeps_its_length() {
    let mut world = world_with(PhysicsSettings::default());
    let bob = world
        .add_body(
            RigidBodyConfig::dynamic(1.0).with_position(Vec3::new(2.0, 0.0, 0.0)),
            ColliderShape::sphere(0.25),
        )
        .expect("bob");
    let joint = ConstraintConfig::new(ConstraintKind::Ball, bob, None)
        .with_pivots(Vec3::new(-2.0, 0.0, 0.0), Vec3::zeros());
    world.add_constraint(joint).expect("joint");

    let mut lowest = f32::MAX;
    for _ in 0..180 {
        world.step(DT).expect("step");
        let position = world.body(bob).expect("bob").position();
        assert_relative_eq!(position.norm(), 2.0, epsilon = 0.05);
        lowest = lowest.min(position.y);
    }
    // swung through the bottom of the arc
    assert!(lowest < -1.5, "lowest point {lowest}");
}

#[test]
fn test_hinge_limit_stops_rotation() {
    let mut world = zero_gravity_world();
    let door = world
        .add_body(
            RigidBodyConfig::dynamic(1.0)
                .with_angular_velocity(Vec3::new(0.0, 5.0, 0.0))
                .with_damping(0.0, 0.0),
            ColliderShape::cuboid(Vec3::new(0.5, 1.0, 0.05)),
        )
        .expect("door");
    let hinge = ConstraintKind::Hinge { lower_limit: Some(-0.5), upper_limit: None };
    let config = ConstraintConfig::new(hinge, door, None).with_axis(Vec3::y());
    let handle = world.add_constraint(config).expect("hinge");

    run(&mut world, 60);

    let twist = world.constraint_twist(handle).expect("twist");
    assert!(twist > -0.65, "twist {twist}");
    // only spin about the hinge axis survives
    let spin = world.body(door).expect("door").angular_velocity();
    assert_relative_eq!(spin.x, 0.0, epsilon = 1e-3);
    assert_relative_eq!(spin.z, 0.0, epsilon = 1e-3);
}

#[test]
fn test_distance_joint_acts_as_rope() {
    let mut world = world_with(PhysicsSettings::default());
    let weight = world
        .add_body(
            RigidBodyConfig::dynamic(1.0).with_position(Vec3::new(0.0, -1.0, 0.0)),
            ColliderShape::sphere(0.25),
        )
        .expect("weight");
    let rope = ConstraintKind::Distance { min_distance: 0.0, max_distance: 3.0 };
    world.add_constraint(ConstraintConfig::new(rope, weight, None)).expect("rope");

    run(&mut world, 120);
    let y = world.body(weight).expect("weight").position().y;
    assert!(y < -2.8 && y > -3.1, "y = {y}");
}

#[test]
fn test_numeric_blowup_freezes_body() {
    let mut world = zero_gravity_world();
    let body = world
        .add_body(
            RigidBodyConfig::dynamic(1.0).with_position(Vec3::new(1.0, 2.0, 3.0)),
            ColliderShape::sphere(1.0),
        )
        .expect("body");
    let errors = record(&mut world, EventType::Error);

    world.apply_force(body, Vec3::new(f32::NAN, 0.0, 0.0), None).expect("force");
    world.step(DT).expect("step continues");

    let body_state = world.body(body).expect("body");
    assert!(body_state.is_sleeping());
    assert_eq!(body_state.position(), Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(body_state.linear_velocity(), Vec3::zeros());
    assert_eq!(errors.borrow().len(), 1);
}

#[test]
fn test_numeric_blowup_does_not_spread_to_neighbours() {
    let mut world = zero_gravity_world();
    let a = world
        .add_body(RigidBodyConfig::dynamic(1.0), ColliderShape::sphere(1.0))
        .expect("a");
    let b = world
        .add_body(
            RigidBodyConfig::dynamic(1.0).with_position(Vec3::new(1.95, 0.0, 0.0)),
            ColliderShape::sphere(1.0),
        )
        .expect("b");
    let errors = record(&mut world, EventType::Error);

    world.apply_impulse(a, Vec3::new(f32::MAX, 0.0, 0.0), None).expect("impulse");
    world.apply_impulse(a, Vec3::new(f32::MAX, 0.0, 0.0), None).expect("impulse");
    world.step(DT).expect("step continues");

    let errors = errors.borrow();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        PhysicsEvent::Error(SimulationError::NumericDegeneracy { body, .. }) if body == a
    ));
    assert_eq!(world.body(a).expect("a").position(), Vec3::zeros());

    let neighbour = world.body(b).expect("b");
    assert!(!neighbour.is_sleeping());
    assert!(neighbour.linear_velocity().iter().all(|v| v.is_finite()));
    assert!(neighbour.position().iter().all(|v| v.is_finite()));
}

#[test]
fn test_raycast_sees_pose_after_fast_impact() {
    let mut world = zero_gravity_world();
    let target = world
        .add_body(
            RigidBodyConfig::dynamic(1.0).with_material(Material::elastic()).with_damping(0.0, 0.0),
            ColliderShape::sphere(1.0),
        )
        .expect("target");
    world
        .add_body(
            RigidBodyConfig::dynamic(1.0)
                .with_position(Vec3::new(-1.99, 0.0, 0.0))
                .with_linear_velocity(Vec3::new(100.0, 0.0, 0.0))
                .with_material(Material::elastic())
                .with_damping(0.0, 0.0),
            ColliderShape::sphere(1.0),
        )
        .expect("striker");

    world.step(DT).expect("step");

    let centre = world.body(target).expect("target").position();
    assert!(centre.x > 1.0, "target at {centre:?}");
    let hit = world
        .raycast(centre + Vec3::new(0.0, 10.0, 0.0), -Vec3::y(), 20.0, CollisionLayers::all())
        .expect("ray through the new centre hits");
    assert_eq!(hit.body, target);
    assert_relative_eq!(hit.point.y, centre.y + 1.0, epsilon = 1e-3);
}

#[test]
fn test_moving_body_wakes_sleeper() {
    let mut world = zero_gravity_world();
    let sleeper = world
        .add_body(RigidBodyConfig::dynamic(1.0), ColliderShape::sphere(0.5))
        .expect("sleeper");
    run(&mut world, 60);
    assert!(world.body(sleeper).expect("sleeper").is_sleeping());

    let wakes = record(&mut world, EventType::Wake);
    world
        .add_body(
            RigidBodyConfig::dynamic(1.0)
                .with_position(Vec3::new(-3.0, 0.0, 0.0))
                .with_linear_velocity(Vec3::new(10.0, 0.0, 0.0)),
            ColliderShape::sphere(0.5),
        )
        .expect("striker");
    run(&mut world, 30);

    assert!(wakes.borrow().contains(&PhysicsEvent::Wake(sleeper)));
    let body = world.body(sleeper).expect("sleeper");
    assert!(body.position().x > 0.0);
}

#[test]
fn test_collision_start_stay_end_sequence() {
    let mut world = zero_gravity_world();
    world
        .add_body(
            RigidBodyConfig::dynamic(1.0)
                .as_trigger()
                .with_position(Vec3::new(3.0, 0.0, 0.0))
                .with_linear_velocity(Vec3::new(-3.0, 0.0, 0.0))
                .with_damping(0.0, 0.0),
            ColliderShape::sphere(1.0),
        )
        .expect("sensor");
    world
        .add_body(
            RigidBodyConfig::dynamic(1.0)
                .with_position(Vec3::new(-3.0, 0.0, 0.0))
                .with_linear_velocity(Vec3::new(3.0, 0.0, 0.0))
                .with_damping(0.0, 0.0),
            ColliderShape::sphere(1.0),
        )
        .expect("ball");

    let seen = Rc::new(RefCell::new(Vec::new()));
    for event_type in [
        EventType::CollisionStart,
        EventType::CollisionStay,
        EventType::CollisionEnd,
    ] {
        let sink = Rc::clone(&seen);
        world.on(event_type, move |event| sink.borrow_mut().push(event.event_type()));
    }

    run(&mut world, 120);

    let mut phases = seen.borrow().clone();
    assert!(phases.len() > 3);
    phases.dedup();
    assert_eq!(
        phases,
        vec![EventType::CollisionStart, EventType::CollisionStay, EventType::CollisionEnd]
    );
}
