//! Collider shapes
//!
//! Shapes are stored relative to their owning body: an `offset` and `rotation`
//! place the shape in body space, and the body transform places it in the
//! world. World-space data is derived on demand during tests.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::foundation::math::{utils, Quat, Transform, Vec3};
use crate::physics::error::ValidationError;
use crate::spatial::AABB;
use super::mesh::CollisionMesh;

/// Tag identifying a shape variant; used to key narrow-phase dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeType {
    /// Oriented box
    Box,
    /// Sphere
    Sphere,
    /// Capsule along local Y
    Capsule,
    /// Cylinder along local Y
    Cylinder,
    /// Infinite plane with local +Y normal
    Plane,
    /// Triangle mesh
    Mesh,
    /// Convex point cloud
    Convex,
}

impl ShapeType {
    /// Lowercase name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            Self::Box => "box",
            Self::Sphere => "sphere",
            Self::Capsule => "capsule",
            Self::Cylinder => "cylinder",
            Self::Plane => "plane",
            Self::Mesh => "mesh",
            Self::Convex => "convex",
        }
    }
}

/// Shape-specific geometry
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    /// Box with half extents along each local axis
    Box {
        /// Half size along each axis
        half_extents: Vec3,
    },
    /// Sphere
    Sphere {
        /// Radius
        radius: f32,
    },
    /// Capsule; `height` is the tip-to-tip length
    Capsule {
        /// Radius of the cylinder and caps
        radius: f32,
        /// Full length including both caps
        height: f32,
    },
    /// Cylinder
    Cylinder {
        /// Radius
        radius: f32,
        /// Full length
        height: f32,
    },
    /// Plane through the collider origin
    Plane,
    /// Triangle mesh (shared, immutable)
    Mesh(Arc<CollisionMesh>),
    /// Convex point cloud, optionally with hull triangles
    Convex(Arc<CollisionMesh>),
}

impl ShapeKind {
    /// Variant tag
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Self::Box { .. } => ShapeType::Box,
            Self::Sphere { .. } => ShapeType::Sphere,
            Self::Capsule { .. } => ShapeType::Capsule,
            Self::Cylinder { .. } => ShapeType::Cylinder,
            Self::Plane => ShapeType::Plane,
            Self::Mesh(_) => ShapeType::Mesh,
            Self::Convex(_) => ShapeType::Convex,
        }
    }
}

/// A body's collision geometry in body space
#[derive(Debug, Clone, PartialEq)]
pub struct ColliderShape {
    /// Geometry
    pub kind: ShapeKind,
    /// Position relative to the body origin
    pub offset: Vec3,
    /// Rotation relative to the body
    pub rotation: Quat,
}

fn positive(field: &'static str, value: f32) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::invalid(field, format!("must be finite and positive, got {value}")))
    }
}

impl ColliderShape {
    /// Shape centered on the body with no local rotation
    pub fn new(kind: ShapeKind) -> Self {
        Self {
            kind,
            offset: Vec3::zeros(),
            rotation: Quat::identity(),
        }
    }

    /// Box collider
    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::new(ShapeKind::Box { half_extents })
    }

    /// Sphere collider
    pub fn sphere(radius: f32) -> Self {
        Self::new(ShapeKind::Sphere { radius })
    }

    /// Capsule collider aligned with local Y
    pub fn capsule(radius: f32, height: f32) -> Self {
        Self::new(ShapeKind::Capsule { radius, height })
    }

    /// Cylinder collider aligned with local Y
    pub fn cylinder(radius: f32, height: f32) -> Self {
        Self::new(ShapeKind::Cylinder { radius, height })
    }

    /// Plane collider with local +Y normal
    pub fn plane() -> Self {
        Self::new(ShapeKind::Plane)
    }

    /// Triangle mesh collider
    pub fn mesh(vertices: Vec<Vec3>, indices: Vec<u32>) -> Result<Self, ValidationError> {
        Ok(Self::new(ShapeKind::Mesh(Arc::new(CollisionMesh::from_triangles(vertices, indices)?))))
    }

    /// Convex collider
    pub fn convex(vertices: Vec<Vec3>, indices: Option<Vec<u32>>) -> Result<Self, ValidationError> {
        Ok(Self::new(ShapeKind::Convex(Arc::new(CollisionMesh::from_points(vertices, indices)?))))
    }

    /// Set the body-space offset
    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    /// Set the body-space rotation
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Variant tag
    pub fn shape_type(&self) -> ShapeType {
        self.kind.shape_type()
    }

    /// Check dimensions and local placement
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !utils::is_finite(&self.offset) {
            return Err(ValidationError::invalid("offset", "must be finite"));
        }
        if !self.rotation.coords.iter().all(|c| c.is_finite()) {
            return Err(ValidationError::invalid("rotation", "must be finite"));
        }
        match &self.kind {
            ShapeKind::Box { half_extents } => {
                for &h in half_extents.iter() {
                    positive("half_extents", h)?;
                }
                Ok(())
            }
            ShapeKind::Sphere { radius } => positive("radius", *radius),
            ShapeKind::Capsule { radius, height } => {
                positive("radius", *radius)?;
                positive("height", *height)?;
                if *height < 2.0 * radius {
                    return Err(ValidationError::invalid(
                        "height",
                        format!(
                            "capsule height {height} is shorter than its diameter {}",
                            2.0 * radius
                        ),
                    ));
                }
                Ok(())
            }
            ShapeKind::Cylinder { radius, height } => {
                positive("radius", *radius)?;
                positive("height", *height)
            }
            // mesh buffers are checked when the mesh is built
            ShapeKind::Plane | ShapeKind::Mesh(_) | ShapeKind::Convex(_) => Ok(()),
        }
    }

    /// World placement of the shape given its body's transform
    pub fn world_transform(&self, body: &Transform) -> Transform {
        body.combine(&Transform::new(self.offset, self.rotation))
    }

    /// World-space bounding box given the body transform
    pub fn compute_aabb(&self, body: &Transform) -> AABB {
        let world = self.world_transform(body);
        let rotation = utils::abs_matrix(&world.rotation.to_rotation_matrix().into_inner());
        match &self.kind {
            ShapeKind::Sphere { radius } => {
                AABB::from_center_extents(world.position, Vec3::repeat(*radius))
            }
            ShapeKind::Box { half_extents } => {
                AABB::from_center_extents(world.position, rotation * half_extents)
            }
            ShapeKind::Capsule { radius, height } => {
                let segment = rotation * Vec3::new(0.0, (height * 0.5 - radius).max(0.0), 0.0);
                AABB::from_center_extents(world.position, segment + Vec3::repeat(*radius))
            }
            ShapeKind::Cylinder { radius, height } => {
                let extents = rotation * Vec3::new(*radius, height * 0.5, *radius);
                AABB::from_center_extents(world.position, extents)
            }
            ShapeKind::Plane => AABB::unbounded(),
            ShapeKind::Mesh(mesh) | ShapeKind::Convex(mesh) => {
                let local = mesh.local_bounds();
                AABB::from_center_extents(
                    world.transform_point(local.center()),
                    rotation * local.extents(),
                )
            }
        }
    }

    /// Principal moments of inertia for the given mass, about the shape axes
    pub fn inertia_diagonal(&self, mass: f32) -> Vec3 {
        let box_inertia = |size: Vec3| {
            let (x2, y2, z2) = (size.x * size.x, size.y * size.y, size.z * size.z);
            Vec3::new(y2 + z2, x2 + z2, x2 + y2) * (mass / 12.0)
        };
        match &self.kind {
            ShapeKind::Box { half_extents } => box_inertia(half_extents * 2.0),
            ShapeKind::Sphere { radius } => Vec3::repeat(0.4 * mass * radius * radius),
            ShapeKind::Capsule { radius, height } | ShapeKind::Cylinder { radius, height } => {
                let lateral = mass / 12.0 * (3.0 * radius * radius + height * height);
                Vec3::new(lateral, 0.5 * mass * radius * radius, lateral)
            }
            ShapeKind::Mesh(mesh) | ShapeKind::Convex(mesh) => {
                box_inertia(mesh.local_bounds().size())
            }
            ShapeKind::Plane => Vec3::repeat(mass),
        }
    }
}

/// Loosely typed collider description as produced by an asset or level loader
///
/// Every field is optional; conversion into a [`ColliderShape`] reports the
/// first field the chosen shape requires but lacks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColliderDesc {
    /// Shape variant
    pub shape: Option<ShapeType>,
    /// Body-space offset
    pub offset: Option<Vec3>,
    /// Body-space rotation
    pub rotation: Option<Quat>,
    /// Box half extents
    pub half_extents: Option<Vec3>,
    /// Sphere, capsule or cylinder radius
    pub radius: Option<f32>,
    /// Capsule or cylinder height
    pub height: Option<f32>,
    /// Mesh or convex vertices
    pub vertices: Option<Vec<Vec3>>,
    /// Mesh or convex triangle indices
    pub indices: Option<Vec<u32>>,
}

impl TryFrom<ColliderDesc> for ColliderShape {
    type Error = ValidationError;

    fn try_from(desc: ColliderDesc) -> Result<Self, Self::Error> {
        let shape_type = desc.shape.ok_or(ValidationError::MissingField {
            shape: "collider",
            field: "shape",
        })?;
        let shape = shape_type.name();
        let missing = |field: &'static str| ValidationError::MissingField { shape, field };
        let require = |value: Option<f32>, field: &'static str| value.ok_or_else(|| missing(field));

        let kind = match shape_type {
            ShapeType::Box => ShapeKind::Box {
                half_extents: desc.half_extents.ok_or_else(|| missing("half_extents"))?,
            },
            ShapeType::Sphere => ShapeKind::Sphere {
                radius: require(desc.radius, "radius")?,
            },
            ShapeType::Capsule => ShapeKind::Capsule {
                radius: require(desc.radius, "radius")?,
                height: require(desc.height, "height")?,
            },
            ShapeType::Cylinder => ShapeKind::Cylinder {
                radius: require(desc.radius, "radius")?,
                height: require(desc.height, "height")?,
            },
            ShapeType::Plane => ShapeKind::Plane,
            ShapeType::Mesh => {
                let vertices = desc.vertices.ok_or_else(|| missing("vertices"))?;
                let indices = desc.indices.ok_or_else(|| missing("indices"))?;
                ShapeKind::Mesh(Arc::new(CollisionMesh::from_triangles(vertices, indices)?))
            }
            ShapeType::Convex => {
                let vertices = desc.vertices.ok_or_else(|| missing("vertices"))?;
                ShapeKind::Convex(Arc::new(CollisionMesh::from_points(vertices, desc.indices)?))
            }
        };

        let collider = ColliderShape {
            kind,
            offset: desc.offset.unwrap_or_else(Vec3::zeros),
            rotation: desc.rotation.unwrap_or_else(Quat::identity),
        };
        collider.validate()?;
        Ok(collider)
    }
}
