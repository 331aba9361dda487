//! Surface materials and the rules for combining two of them at a contact

use serde::{Deserialize, Serialize};

/// Physical response coefficients of a body's surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    /// Coulomb friction coefficient
    pub friction: f32,
    /// Bounciness; 0 absorbs, 1 is perfectly elastic
    pub restitution: f32,
    /// Mass per unit volume
    pub density: f32,
    /// Resistance to rolling, applied as an angular impulse
    pub rolling_friction: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            friction: 0.5,
            restitution: 0.3,
            density: 1.0,
            rolling_friction: 0.1,
        }
    }
}

impl Material {
    /// Material with the given friction and restitution; other fields default
    pub fn new(friction: f32, restitution: f32) -> Self {
        Self {
            friction,
            restitution,
            ..Self::default()
        }
    }

    /// Frictionless, perfectly elastic surface
    pub fn elastic() -> Self {
        Self {
            friction: 0.0,
            restitution: 1.0,
            rolling_friction: 0.0,
            ..Self::default()
        }
    }

    /// All coefficients finite and non-negative
    pub fn is_valid(&self) -> bool {
        [self.friction, self.restitution, self.density, self.rolling_friction]
            .iter()
            .all(|c| c.is_finite() && *c >= 0.0)
    }
}

/// How two coefficients are merged at a contact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineRule {
    /// `sqrt(a * b)`
    #[default]
    GeometricMean,
    /// `(a + b) / 2`
    Average,
    /// `min(a, b)`
    Min,
    /// `max(a, b)`
    Max,
    /// `a * b`
    Multiply,
}

impl CombineRule {
    /// Combine two coefficients; symmetric in its arguments
    pub fn combine(self, a: f32, b: f32) -> f32 {
        match self {
            Self::GeometricMean => (a * b).max(0.0).sqrt(),
            Self::Average => (a + b) * 0.5,
            Self::Min => a.min(b),
            Self::Max => a.max(b),
            Self::Multiply => a * b,
        }
    }
}

/// Coefficients resolved for one contact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombinedMaterial {
    /// Friction coefficient
    pub friction: f32,
    /// Restitution coefficient
    pub restitution: f32,
    /// Rolling friction coefficient
    pub rolling_friction: f32,
}

impl CombinedMaterial {
    /// Merge two materials
    pub fn new(
        a: &Material,
        b: &Material,
        friction: CombineRule,
        restitution: CombineRule,
    ) -> Self {
        Self {
            friction: friction.combine(a.friction, b.friction),
            restitution: restitution.combine(a.restitution, b.restitution),
            rolling_friction: friction.combine(a.rolling_friction, b.rolling_friction),
        }
    }
}
