//! End-to-end tests driving a whole `PhysicsWorld`

mod scenarios;
mod world_api;

use std::cell::RefCell;
use std::rc::Rc;

use crate::events::{EventType, PhysicsEvent};
use crate::foundation::math::Vec3;
use crate::physics::{PhysicsSettings, PhysicsWorld};

const DT: f32 = 1.0 / 60.0;

fn world_with(settings: PhysicsSettings) -> PhysicsWorld {
    crate::foundation::logging::init_for_tests();
    PhysicsWorld::new(settings).expect("valid settings")
}

fn zero_gravity_world() -> PhysicsWorld {
    world_with(PhysicsSettings::default().with_gravity(Vec3::zeros()))
}

/// Record every event of `event_type` delivered from now on
fn record(world: &mut PhysicsWorld, event_type: EventType) -> Rc<RefCell<Vec<PhysicsEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    world.on(event_type, move |event| sink.borrow_mut().push(event.clone()));
    log
}

fn run(world: &mut PhysicsWorld, steps: usize) {
    for _ in 0..steps {
        world.step(DT).expect("step succeeds");
    }
}
