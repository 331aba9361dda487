//! Handle types for world-owned objects

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Opaque, generational handle to a rigid body owned by a `PhysicsWorld`
    pub struct BodyHandle;

    /// Opaque, generational handle to a constraint owned by a `PhysicsWorld`
    pub struct ConstraintHandle;
}

/// Handle-based map using slot map for stable references
pub type HandleMap<K, T> = SlotMap<K, T>;

/// Unordered pair of bodies, stored with the smaller handle first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyPair {
    /// Smaller handle of the pair
    pub first: BodyHandle,
    /// Larger handle of the pair
    pub second: BodyHandle,
}

impl BodyPair {
    /// Create a new pair (always stores the smaller handle first for consistency)
    pub fn new(a: BodyHandle, b: BodyHandle) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    /// Whether the pair references `body`
    pub fn contains(&self, body: BodyHandle) -> bool {
        self.first == body || self.second == body
    }
}
