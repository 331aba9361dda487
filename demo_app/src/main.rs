//! Headless physics demo
//!
//! Builds a small scene (ground plane, a box stack, falling spheres and a
//! pendulum), runs it for a few simulated seconds and logs what happens.
//! Settings are read from the file given as the first argument, or from
//! `physics.toml` when it exists.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use rust_physics::foundation::logging;
use rust_physics::prelude::*;

const FRAME_TIME: f32 = 1.0 / 60.0;
const FRAMES: u32 = 600;
const DEFAULT_SETTINGS: &str = "physics.toml";

#[derive(Debug, Default)]
struct Tally {
    collisions: usize,
    sleeps: usize,
    wakes: usize,
}

fn load_settings() -> Result<PhysicsSettings, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => PhysicsSettings::load_from_file(path),
        None if Path::new(DEFAULT_SETTINGS).exists() => {
            PhysicsSettings::load_from_file(DEFAULT_SETTINGS)
        }
        None => Ok(PhysicsSettings::default()),
    }
}

fn build_scene(world: &mut PhysicsWorld) -> PhysicsResult<Vec<BodyHandle>> {
    let mut tracked = Vec::new();

    world.add_body(
        RigidBodyConfig::static_body().with_material(Material::new(0.6, 0.1)),
        ColliderShape::plane(),
    )?;

    // Box stack
    for level in 0..4u8 {
        let y = 0.5 + f32::from(level);
        tracked.push(world.add_body(
            RigidBodyConfig::dynamic(1.0).with_position(Vec3::new(-3.0, y, 0.0)),
            ColliderShape::cuboid(Vec3::new(0.5, 0.5, 0.5)),
        )?);
    }

    // Bouncy spheres
    for i in 0..3u8 {
        let x = f32::from(i) * 1.5;
        tracked.push(world.add_body(
            RigidBodyConfig::dynamic(2.0)
                .with_position(Vec3::new(x, 4.0 + f32::from(i), 0.0))
                .with_material(Material::new(0.4, 0.7)),
            ColliderShape::sphere(0.5),
        )?);
    }

    // Pendulum hanging from a world pivot
    let bob = world.add_body(
        RigidBodyConfig::dynamic(1.0).with_position(Vec3::new(5.0, 6.0, 0.0)),
        ColliderShape::capsule(0.25, 0.5),
    )?;
    world.add_constraint(
        ConstraintConfig::new(ConstraintKind::Ball, bob, None)
            .with_pivots(Vec3::new(-2.0, 0.0, 0.0), Vec3::new(3.0, 6.0, 0.0)),
    )?;
    tracked.push(bob);

    Ok(tracked)
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_settings()?;
    log::info!("Broad-phase: {:?}, fixed step: {}s", settings.broadphase, settings.fixed_time_step);

    let mut world = PhysicsWorld::new(settings)?;
    let tracked = build_scene(&mut world)?;
    log::info!(
        "Scene built with {} bodies and {} joints",
        world.body_count(),
        world.constraint_count()
    );

    let tally = Rc::new(RefCell::new(Tally::default()));
    for event_type in [EventType::CollisionStart, EventType::Sleep, EventType::Wake] {
        let tally = Rc::clone(&tally);
        world.on(event_type, move |event| {
            let mut tally = tally.borrow_mut();
            match event {
                PhysicsEvent::CollisionStart(_) => tally.collisions += 1,
                PhysicsEvent::Sleep(_) => tally.sleeps += 1,
                PhysicsEvent::Wake(_) => tally.wakes += 1,
                _ => {}
            }
        });
    }
    world.on(EventType::Error, |event| log::warn!("Simulation error: {event:?}"));

    for frame in 1..=FRAMES {
        world.step(FRAME_TIME)?;
        if frame % 60 == 0 {
            let stats = world.last_step_stats();
            log::info!(
                "t = {:.1}s: {} pairs, {} contacts, {:?} per step",
                f64::from(frame) * f64::from(FRAME_TIME),
                stats.candidate_pairs,
                stats.contacts,
                stats.duration
            );
        }
    }

    log::info!("Events: {:?}", tally.borrow());
    for handle in tracked {
        if let Some(body) = world.body(handle) {
            log::info!(
                "{:?} {:?} at {:.2?} (sleeping: {})",
                handle,
                body.collider().shape_type(),
                body.position(),
                body.is_sleeping()
            );
        }
    }

    let top = world.raycast(
        Vec3::new(-3.0, 20.0, 0.0),
        Vec3::new(0.0, -1.0, 0.0),
        100.0,
        CollisionLayers::all(),
    );
    match top {
        Some(hit) => log::info!("Top of the stack at y = {:.2}", hit.point.y),
        None => log::warn!("Raycast missed the box stack"),
    }

    let base = Transform::from_position(Vec3::new(-3.0, 0.5, 0.0));
    let around_base =
        world.overlap_shape(base, &ColliderShape::sphere(1.0), CollisionLayers::all())?;
    log::info!("{} bodies around the base of the stack", around_base.len());
    if let Some(handle) = world.point_query(Vec3::new(-3.0, 0.5, 0.0), CollisionLayers::all()) {
        log::info!("Bottom box is {handle:?}");
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("RUST_LOG").is_some() {
        logging::init();
    } else {
        env_logger::Builder::new().filter_level(log::LevelFilter::Info).init();
    }

    log::info!("Starting physics demo");
    run().map_err(|e| {
        log::error!("Physics demo failed: {e}");
        e
    })
}
