//! Simulation event queue and observer registry
//!
//! Key principles:
//! - Events are queued while a step runs and delivered once it finishes
//! - Handler returns bool (true = consumed, stops forwarding)
//! - Registration system (only notify interested handlers)
//! - Delivered events stay readable until the next dispatch

use std::collections::HashMap;

use crate::foundation::collections::BodyHandle;
use crate::physics::detector::Contact;
use crate::physics::error::{SimulationError, SimulationWarning};

/// Event type identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Two bodies started touching
    CollisionStart,
    /// Two bodies are still touching
    CollisionStay,
    /// Two bodies stopped touching
    CollisionEnd,
    /// A body fell asleep
    Sleep,
    /// A body woke up
    Wake,
    /// A body was frozen after a numeric failure
    Error,
    /// Recoverable problem, e.g. an auto-removed constraint
    Warning,
    /// A body was added to the world
    BodyAdded,
    /// A body was removed from the world
    BodyRemoved,
}

/// Pair data carried by the collision events
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionEvent {
    /// First body of the pair (smaller handle)
    pub body_a: BodyHandle,
    /// Second body of the pair
    pub body_b: BodyHandle,
    /// Contacts with normals from `body_a` toward `body_b`; empty for `CollisionEnd`
    pub contacts: Vec<Contact>,
    /// Whether either body is a trigger
    pub is_trigger: bool,
}

/// Event emitted by the world
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicsEvent {
    /// Pair touching this substep but not the previous one
    CollisionStart(CollisionEvent),
    /// Pair touching in both substeps
    CollisionStay(CollisionEvent),
    /// Pair touching in the previous substep only
    CollisionEnd(CollisionEvent),
    /// Body fell asleep
    Sleep(BodyHandle),
    /// Body woke up
    Wake(BodyHandle),
    /// Per-body failure
    Error(SimulationError),
    /// Recoverable condition
    Warning(SimulationWarning),
    /// Body added
    BodyAdded(BodyHandle),
    /// Body removed
    BodyRemoved(BodyHandle),
}

impl PhysicsEvent {
    /// Type tag used for handler registration
    pub fn event_type(&self) -> EventType {
        match self {
            Self::CollisionStart(_) => EventType::CollisionStart,
            Self::CollisionStay(_) => EventType::CollisionStay,
            Self::CollisionEnd(_) => EventType::CollisionEnd,
            Self::Sleep(_) => EventType::Sleep,
            Self::Wake(_) => EventType::Wake,
            Self::Error(_) => EventType::Error,
            Self::Warning(_) => EventType::Warning,
            Self::BodyAdded(_) => EventType::BodyAdded,
            Self::BodyRemoved(_) => EventType::BodyRemoved,
        }
    }

    /// Collision payload, if this is a collision event
    pub fn collision(&self) -> Option<&CollisionEvent> {
        match self {
            Self::CollisionStart(c) | Self::CollisionStay(c) | Self::CollisionEnd(c) => Some(c),
            _ => None,
        }
    }
}

/// Event handler trait
/// Returns true if event was consumed (stops forwarding)
/// Returns false to allow forwarding to other handlers
pub trait EventHandler {
    /// Handle an event, return true if consumed
    fn on_event(&mut self, event: &PhysicsEvent) -> bool;
}

/// Adapter for closures registered through [`EventSystem::on`]; never consumes
struct FnHandler<F>(F);

impl<F: FnMut(&PhysicsEvent)> EventHandler for FnHandler<F> {
    fn on_event(&mut self, event: &PhysicsEvent) -> bool {
        (self.0)(event);
        false
    }
}

/// Event queue with per-type handler chains
#[derive(Default)]
pub struct EventSystem {
    queue: Vec<PhysicsEvent>,
    delivered: Vec<PhysicsEvent>,
    handlers: HashMap<EventType, Vec<Box<dyn EventHandler>>>,
}

impl EventSystem {
    /// Create a new empty event system
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a specific event type
    /// Only handlers registered for this type will be notified
    pub fn register_handler(&mut self, event_type: EventType, handler: Box<dyn EventHandler>) {
        self.handlers.entry(event_type).or_default().push(handler);
    }

    /// Register a closure for a specific event type
    pub fn on(&mut self, event_type: EventType, handler: impl FnMut(&PhysicsEvent) + 'static) {
        self.register_handler(event_type, Box::new(FnHandler(handler)));
    }

    /// Queue an event for the next dispatch
    pub fn send(&mut self, event: PhysicsEvent) {
        self.queue.push(event);
    }

    /// Number of queued, undelivered events
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Deliver every queued event in order
    ///
    /// The delivered batch replaces the previous one in [`delivered`](Self::delivered).
    pub fn dispatch(&mut self) {
        self.delivered.clear();
        std::mem::swap(&mut self.queue, &mut self.delivered);

        for event in &self.delivered {
            if let Some(handlers) = self.handlers.get_mut(&event.event_type()) {
                for handler in handlers.iter_mut() {
                    if handler.on_event(event) {
                        // Event consumed, stop forwarding
                        break;
                    }
                }
            }
        }
    }

    /// Events delivered by the most recent dispatch
    pub fn delivered(&self) -> &[PhysicsEvent] {
        &self.delivered
    }

    /// Drop queued and delivered events; handlers stay registered
    pub fn clear(&mut self) {
        self.queue.clear();
        self.delivered.clear();
    }
}

impl std::fmt::Debug for EventSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSystem")
            .field("queued", &self.queue.len())
            .field("delivered", &self.delivered.len())
            .field("handler_types", &self.handlers.len())
            .finish()
    }
}
