//! Collision layer system for filtering collision detection and raycasts
//!
//! Every body carries a `collision_group` (the layers it lives on) and a
//! `collision_mask` (the layers it is willing to touch).

use bitflags::bitflags;

bitflags! {
    /// Collision layer bitmask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CollisionLayers: u32 {
        /// Default layer for new bodies
        const DEFAULT = 1 << 0;
        /// Static environment geometry
        const ENVIRONMENT = 1 << 1;
        /// Characters and other gameplay actors
        const ACTOR = 1 << 2;
        /// Projectiles
        const PROJECTILE = 1 << 3;
        /// Trigger volumes
        const TRIGGER = 1 << 4;
        /// Debris and small props
        const DEBRIS = 1 << 5;
        /// User-defined layers occupy the remaining bits
        const CUSTOM = 0xFFFF_FFC0;
    }
}

impl Default for CollisionLayers {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl CollisionLayers {
    /// Layer for bit `index` (0..32)
    pub fn layer(index: u32) -> Option<Self> {
        1u32.checked_shl(index).map(Self::from_bits_retain)
    }

    /// Check if two bodies should collide based on their groups and masks
    ///
    /// A's group must be in B's mask AND B's group must be in A's mask.
    pub fn should_collide(group_a: Self, mask_a: Self, group_b: Self, mask_b: Self) -> bool {
        group_a.intersects(mask_b) && group_b.intersects(mask_a)
    }
}
